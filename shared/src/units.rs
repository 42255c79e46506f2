//! Unit conversion between canonical quantities and display units
//!
//! Every ledger quantity is an integer count of the item's smallest unit.
//! Trays, packets and pieces are a presentation concern and are converted
//! here, and only here, using the item's resolved [`DisplayStrategy`].

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::models::DisplayStrategy;

/// Unit a quantity is entered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayUnit {
    /// One tray or packet
    Pack,
    /// One piece
    Piece,
    /// The item's base unit (kg, litre or piece)
    Base,
}

/// Unit conversion failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UnitError {
    #[error("'{0}' is not a number")]
    NotANumber(String),

    #[error("quantity cannot be negative: {0}")]
    Negative(String),

    #[error("quantity must be a whole number: {0}")]
    Fractional(String),

    #[error("item has no pack size")]
    NoPackSize,

    #[error("{unit:?} is not a valid unit for {metric} items")]
    UnitMismatch { unit: DisplayUnit, metric: &'static str },

    #[error("quantity is too large")]
    Overflow,
}

/// A canonical quantity decomposed for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityDisplay {
    pub primary_count: i64,
    pub primary_label: String,
    pub remainder_count: i64,
    pub remainder_label: String,
}

impl QuantityDisplay {
    /// Inverse of [`to_display`]
    pub fn to_canonical(&self, strategy: &DisplayStrategy) -> i64 {
        match strategy {
            DisplayStrategy::Packed { size, .. } => {
                self.primary_count * i64::from(*size) + self.remainder_count
            }
            _ => self.primary_count,
        }
    }
}

impl std::fmt::Display for QuantityDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}",
            self.primary_count,
            plural(&self.primary_label, self.primary_count)
        )?;
        if self.remainder_count != 0 {
            write!(
                f,
                " + {} {}",
                self.remainder_count,
                plural(&self.remainder_label, self.remainder_count)
            )?;
        }
        Ok(())
    }
}

fn plural(label: &str, count: i64) -> String {
    if count == 1 || label == "kg" {
        label.to_string()
    } else {
        format!("{}s", label)
    }
}

/// Decompose a canonical quantity for display
pub fn to_display(strategy: &DisplayStrategy, canonical: i64) -> QuantityDisplay {
    let base = strategy.base_label().to_string();
    match strategy {
        DisplayStrategy::Packed { label, size } => {
            let size = i64::from(*size);
            QuantityDisplay {
                primary_count: canonical.div_euclid(size),
                primary_label: label.clone(),
                remainder_count: canonical.rem_euclid(size),
                remainder_label: base,
            }
        }
        DisplayStrategy::Weight | DisplayStrategy::Volume | DisplayStrategy::Unpacked => {
            QuantityDisplay {
                primary_count: canonical,
                primary_label: base.clone(),
                remainder_count: 0,
                remainder_label: base,
            }
        }
    }
}

/// Convert a single manually entered quantity into canonical units
pub fn to_canonical(
    strategy: &DisplayStrategy,
    value: &str,
    unit: DisplayUnit,
) -> Result<i64, UnitError> {
    let count = parse_count(value)?;
    match (strategy, unit) {
        (DisplayStrategy::Packed { size, .. }, DisplayUnit::Pack) => count
            .checked_mul(i64::from(*size))
            .ok_or(UnitError::Overflow),
        (DisplayStrategy::Unpacked, DisplayUnit::Pack) => Err(UnitError::NoPackSize),
        (DisplayStrategy::Weight | DisplayStrategy::Volume, DisplayUnit::Pack | DisplayUnit::Piece) => {
            Err(UnitError::UnitMismatch {
                unit,
                metric: strategy.metric().as_str(),
            })
        }
        _ => Ok(count),
    }
}

/// Convert a combined "N packs + M pieces" entry into canonical units
pub fn to_canonical_combined(
    strategy: &DisplayStrategy,
    packs: &str,
    pieces: &str,
) -> Result<i64, UnitError> {
    let size = strategy.pack_size().ok_or(UnitError::NoPackSize)?;
    let packs = parse_count(packs)?;
    let pieces = parse_count(pieces)?;

    packs
        .checked_mul(i64::from(size))
        .and_then(|total| total.checked_add(pieces))
        .ok_or(UnitError::Overflow)
}

/// Parse a non-negative whole count from user input.
///
/// Blank input is an error, not zero.
pub fn parse_count(value: &str) -> Result<i64, UnitError> {
    let trimmed = value.trim();
    if let Ok(count) = trimmed.parse::<i64>() {
        return if count < 0 {
            Err(UnitError::Negative(trimmed.to_string()))
        } else {
            Ok(count)
        };
    }

    match Decimal::from_str(trimmed) {
        Ok(number) if number.is_sign_negative() && !number.is_zero() => {
            Err(UnitError::Negative(trimmed.to_string()))
        }
        Ok(number) if number.fract().is_zero() => number.to_i64().ok_or(UnitError::Overflow),
        Ok(_) => Err(UnitError::Fractional(trimmed.to_string())),
        Err(_) => Err(UnitError::NotANumber(trimmed.to_string())),
    }
}

/// How a quantity arrives from a form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum QuantityEntry {
    Canonical { quantity: i64 },
    Display { value: String, display_unit: DisplayUnit },
    Combined { packs: String, pieces: String },
}

impl QuantityEntry {
    pub fn resolve(&self, strategy: &DisplayStrategy) -> Result<i64, UnitError> {
        match self {
            QuantityEntry::Canonical { quantity } if *quantity < 0 => {
                Err(UnitError::Negative(quantity.to_string()))
            }
            QuantityEntry::Canonical { quantity } => Ok(*quantity),
            QuantityEntry::Display {
                value,
                display_unit,
            } => to_canonical(strategy, value, *display_unit),
            QuantityEntry::Combined { packs, pieces } => {
                to_canonical_combined(strategy, packs, pieces)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Item, Metric};
    use proptest::prelude::*;

    fn eggs() -> Item {
        Item::new("Eggs (Grade)", Metric::Count, Some(30), None)
    }

    #[test]
    fn test_egg_display_splits_trays_and_pieces() {
        let display = eggs().to_display(45);

        assert_eq!(display.primary_count, 1);
        assert_eq!(display.primary_label, "tray");
        assert_eq!(display.remainder_count, 15);
        assert_eq!(display.remainder_label, "piece");
        assert_eq!(display.to_string(), "1 tray + 15 pieces");
    }

    #[test]
    fn test_weight_is_not_decomposed() {
        let flour = Item::new("Flour", Metric::Weight, None, None);
        let display = flour.to_display(100);

        assert_eq!(display.primary_count, 100);
        assert_eq!(display.primary_label, "kg");
        assert_eq!(display.remainder_count, 0);
        assert_eq!(display.to_string(), "100 kg");
    }

    #[test]
    fn test_unpacked_items_show_pieces() {
        let soap = Item::new("Soap", Metric::Count, None, None);
        assert_eq!(soap.to_display(7).to_string(), "7 pieces");
    }

    #[test]
    fn test_combined_entry() {
        assert_eq!(eggs().to_canonical_combined("2", "5").unwrap(), 65);
        assert_eq!(eggs().to_canonical_combined(" 0 ", "29").unwrap(), 29);
        assert_eq!(eggs().to_canonical_combined("1.0", "0").unwrap(), 30);
    }

    #[test]
    fn test_combined_entry_rejects_bad_input() {
        let item = eggs();
        assert!(matches!(
            item.to_canonical_combined("-1", "5"),
            Err(UnitError::Negative(_))
        ));
        assert!(matches!(
            item.to_canonical_combined("1.5", "0"),
            Err(UnitError::Fractional(_))
        ));
        assert!(matches!(
            item.to_canonical_combined("one", "0"),
            Err(UnitError::NotANumber(_))
        ));
        assert!(matches!(
            item.to_canonical_combined("", "0"),
            Err(UnitError::NotANumber(_))
        ));
    }

    #[test]
    fn test_combined_entry_needs_pack_size() {
        let soap = Item::new("Soap", Metric::Count, None, None);
        assert_eq!(
            soap.to_canonical_combined("1", "1"),
            Err(UnitError::NoPackSize)
        );
    }

    #[test]
    fn test_pack_unit_on_weight_is_rejected() {
        let flour = Item::new("Flour", Metric::Weight, None, None);
        assert!(matches!(
            flour.to_canonical("3", DisplayUnit::Pack),
            Err(UnitError::UnitMismatch { .. })
        ));
        assert_eq!(flour.to_canonical("3", DisplayUnit::Base).unwrap(), 3);
    }

    #[test]
    fn test_pack_unit_multiplies() {
        assert_eq!(eggs().to_canonical("4", DisplayUnit::Pack).unwrap(), 120);
        assert_eq!(eggs().to_canonical("4", DisplayUnit::Piece).unwrap(), 4);
    }

    #[test]
    fn test_overflow_is_reported() {
        assert_eq!(
            eggs().to_canonical(&i64::MAX.to_string(), DisplayUnit::Pack),
            Err(UnitError::Overflow)
        );
        assert_eq!(parse_count("99999999999999999999"), Err(UnitError::Overflow));
    }

    #[test]
    fn test_negative_canonical_entry_is_rejected() {
        let entry = QuantityEntry::Canonical { quantity: -3 };
        assert!(entry.resolve(&eggs().display_strategy).is_err());
    }

    fn strategy_strategy() -> impl Strategy<Value = DisplayStrategy> {
        prop_oneof![
            Just(DisplayStrategy::Weight),
            Just(DisplayStrategy::Volume),
            Just(DisplayStrategy::Unpacked),
            (1u32..500).prop_map(|size| DisplayStrategy::Packed {
                label: "packet".to_string(),
                size
            }),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_display_round_trips(strategy in strategy_strategy(), q in 0i64..10_000_000) {
            let display = to_display(&strategy, q);
            prop_assert_eq!(display.to_canonical(&strategy), q);
        }

        #[test]
        fn prop_remainder_is_below_pack_size(size in 1u32..500, q in 0i64..10_000_000) {
            let strategy = DisplayStrategy::Packed { label: "tray".to_string(), size };
            let display = to_display(&strategy, q);
            prop_assert!(display.remainder_count >= 0);
            prop_assert!(display.remainder_count < i64::from(size));
        }

        #[test]
        fn prop_combined_entry_matches_display(size in 1u32..500, q in 0i64..10_000_000) {
            let strategy = DisplayStrategy::Packed { label: "tray".to_string(), size };
            let display = to_display(&strategy, q);
            let entered = to_canonical_combined(
                &strategy,
                &display.primary_count.to_string(),
                &display.remainder_count.to_string(),
            );
            prop_assert_eq!(entered, Ok(q));
        }
    }
}
