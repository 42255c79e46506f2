//! Item reference data and display strategies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

use crate::types::UnknownVariant;
use crate::units::{self, DisplayUnit, QuantityDisplay, UnitError};

/// Pieces per egg tray
pub const EGG_TRAY_SIZE: u32 = 30;

/// Unit family of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Weight,
    Volume,
    Count,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Weight => "weight",
            Metric::Volume => "volume",
            Metric::Count => "count",
        }
    }

    /// Label of one canonical unit
    pub fn base_label(&self) -> &'static str {
        match self {
            Metric::Weight => "kg",
            Metric::Volume => "litre",
            Metric::Count => "piece",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = UnknownVariant;

    /// Accepts the canonical names plus the unit spellings found in item lists
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weight" | "kg" | "kgs" => Ok(Metric::Weight),
            "volume" | "litre" | "litres" | "liter" | "liters" | "l" => Ok(Metric::Volume),
            "count" | "piece" | "pieces" | "pcs" => Ok(Metric::Count),
            _ => Err(UnknownVariant::new("metric", s)),
        }
    }
}

/// How canonical quantities of an item are presented and entered
///
/// Deserializing rejects a packed strategy with a zero pack size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "kind",
    rename_all = "snake_case",
    try_from = "StoredDisplayStrategy"
)]
pub enum DisplayStrategy {
    Weight,
    Volume,
    /// Discrete pieces grouped into packs of `size` (trays, packets)
    Packed { label: String, size: u32 },
    /// Discrete pieces without packs
    Unpacked,
}

/// Wire shape of [`DisplayStrategy`] before the pack size is checked
#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum StoredDisplayStrategy {
    Weight,
    Volume,
    Packed { label: String, size: u32 },
    Unpacked,
}

impl TryFrom<StoredDisplayStrategy> for DisplayStrategy {
    type Error = String;

    fn try_from(stored: StoredDisplayStrategy) -> Result<Self, Self::Error> {
        Ok(match stored {
            StoredDisplayStrategy::Weight => DisplayStrategy::Weight,
            StoredDisplayStrategy::Volume => DisplayStrategy::Volume,
            StoredDisplayStrategy::Packed { size: 0, .. } => {
                return Err("pack size must be at least 1".to_string())
            }
            StoredDisplayStrategy::Packed { label, size } => DisplayStrategy::Packed { label, size },
            StoredDisplayStrategy::Unpacked => DisplayStrategy::Unpacked,
        })
    }
}

impl DisplayStrategy {
    /// Resolve the strategy from item reference data.
    ///
    /// Runs once when the item is registered. An explicit `pack_label` wins;
    /// otherwise egg items get trays of [`EGG_TRAY_SIZE`] and everything else
    /// packed is a packet.
    pub fn resolve(
        name: &str,
        metric: Metric,
        pack_size: Option<u32>,
        pack_label: Option<&str>,
    ) -> Self {
        match metric {
            Metric::Weight => DisplayStrategy::Weight,
            Metric::Volume => DisplayStrategy::Volume,
            Metric::Count => {
                let egg = is_egg_item(name);
                let size = pack_size
                    .filter(|size| *size > 0)
                    .or(if egg { Some(EGG_TRAY_SIZE) } else { None });

                match size {
                    Some(size) => {
                        let label = pack_label
                            .map(str::trim)
                            .filter(|label| !label.is_empty())
                            .map(str::to_string)
                            .unwrap_or_else(|| if egg { "tray" } else { "packet" }.to_string());
                        DisplayStrategy::Packed { label, size }
                    }
                    None => DisplayStrategy::Unpacked,
                }
            }
        }
    }

    /// Fallback used when no reference data exists for an item
    pub fn for_metric(metric: Metric) -> Self {
        match metric {
            Metric::Weight => DisplayStrategy::Weight,
            Metric::Volume => DisplayStrategy::Volume,
            Metric::Count => DisplayStrategy::Unpacked,
        }
    }

    pub fn metric(&self) -> Metric {
        match self {
            DisplayStrategy::Weight => Metric::Weight,
            DisplayStrategy::Volume => Metric::Volume,
            DisplayStrategy::Packed { .. } | DisplayStrategy::Unpacked => Metric::Count,
        }
    }

    pub fn pack_size(&self) -> Option<u32> {
        match self {
            DisplayStrategy::Packed { size, .. } => Some(*size),
            _ => None,
        }
    }

    pub fn base_label(&self) -> &'static str {
        self.metric().base_label()
    }
}

fn is_egg_item(name: &str) -> bool {
    name.to_lowercase().contains("egg")
}

/// A stocked item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub name: String,
    pub metric: Metric,
    pub pack_size: Option<u32>,
    pub display_strategy: DisplayStrategy,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn new(
        name: impl Into<String>,
        metric: Metric,
        pack_size: Option<u32>,
        pack_label: Option<&str>,
    ) -> Self {
        let name = name.into();
        let display_strategy = DisplayStrategy::resolve(&name, metric, pack_size, pack_label);
        Self {
            pack_size: display_strategy.pack_size(),
            name,
            metric,
            display_strategy,
            updated_at: Utc::now(),
        }
    }

    pub fn to_display(&self, canonical: i64) -> QuantityDisplay {
        units::to_display(&self.display_strategy, canonical)
    }

    pub fn to_canonical(&self, value: &str, unit: DisplayUnit) -> Result<i64, UnitError> {
        units::to_canonical(&self.display_strategy, value, unit)
    }

    pub fn to_canonical_combined(&self, packs: &str, pieces: &str) -> Result<i64, UnitError> {
        units::to_canonical_combined(&self.display_strategy, packs, pieces)
    }
}

/// Input for registering or updating an item's reference data
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterItemInput {
    pub metric: Metric,
    #[validate(range(min = 1, message = "Pack size must be at least 1"))]
    pub pack_size: Option<u32>,
    #[validate(length(min = 1, max = 32, message = "Pack label must be 1-32 characters"))]
    pub pack_label: Option<String>,
}
