//! WebAssembly bindings for the shop stock forms
//!
//! Provides client-side computation for:
//! - Display strategy resolution from item reference data
//! - Canonical <-> display quantity conversion
//! - Transfer form checks before submission

use serde::Serialize;
use shared::{DisplayStrategy, DisplayUnit, Metric};
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::units::*;
pub use shared::validation::*;

/// Largest integer a JavaScript number holds exactly
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn js_error(message: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&message.to_string())
}

fn parse_strategy(strategy_json: &str) -> Result<DisplayStrategy, JsValue> {
    serde_json::from_str(strategy_json)
        .map_err(|e| js_error(format!("Invalid display strategy JSON: {}", e)))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(js_error)
}

fn canonical_from_js(quantity: f64) -> Result<i64, JsValue> {
    if !quantity.is_finite() || quantity.fract() != 0.0 || quantity.abs() > MAX_SAFE_INTEGER {
        return Err(js_error(format!("{} is not a whole quantity", quantity)));
    }
    Ok(quantity as i64)
}

/// Resolve an item's display strategy, returned as JSON
#[wasm_bindgen]
pub fn resolve_display_strategy(
    name: &str,
    metric: &str,
    pack_size: Option<u32>,
    pack_label: Option<String>,
) -> Result<String, JsValue> {
    let metric: Metric = metric.parse().map_err(js_error)?;
    let strategy = DisplayStrategy::resolve(name, metric, pack_size, pack_label.as_deref());
    to_json(&strategy)
}

/// Decompose a canonical quantity, returned as `QuantityDisplay` JSON
#[wasm_bindgen]
pub fn quantity_display(strategy_json: &str, canonical: f64) -> Result<String, JsValue> {
    let strategy = parse_strategy(strategy_json)?;
    to_json(&shared::to_display(&strategy, canonical_from_js(canonical)?))
}

/// Human readable quantity, e.g. "1 tray + 15 pieces"
#[wasm_bindgen]
pub fn format_quantity(strategy_json: &str, canonical: f64) -> Result<String, JsValue> {
    let strategy = parse_strategy(strategy_json)?;
    Ok(shared::to_display(&strategy, canonical_from_js(canonical)?).to_string())
}

/// Convert one entered value (`pack`, `piece` or `base`) into canonical units
#[wasm_bindgen]
pub fn to_canonical_quantity(strategy_json: &str, value: &str, unit: &str) -> Result<f64, JsValue> {
    let strategy = parse_strategy(strategy_json)?;
    let unit: DisplayUnit = serde_json::from_value(serde_json::Value::String(unit.to_string()))
        .map_err(|_| js_error(format!("Unknown unit '{}'", unit)))?;
    let canonical = shared::to_canonical(&strategy, value, unit).map_err(js_error)?;
    Ok(canonical as f64)
}

/// Convert a combined "packs + pieces" entry into canonical units
#[wasm_bindgen]
pub fn combined_to_canonical(strategy_json: &str, packs: &str, pieces: &str) -> Result<f64, JsValue> {
    let strategy = parse_strategy(strategy_json)?;
    let canonical = shared::to_canonical_combined(&strategy, packs, pieces).map_err(js_error)?;
    Ok(canonical as f64)
}

/// Check a transfer quantity against the selected batch before submitting
#[wasm_bindgen]
pub fn check_transfer_quantity(requested: f64, available: f64) -> Result<(), JsValue> {
    validate_within_available(canonical_from_js(requested)?, canonical_from_js(available)?)
        .map_err(js_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn egg_strategy() -> String {
        resolve_display_strategy("Eggs (Grade)", "count", None, None).unwrap()
    }

    #[test]
    fn test_egg_items_default_to_trays_of_thirty() {
        let strategy: DisplayStrategy = serde_json::from_str(&egg_strategy()).unwrap();
        assert_eq!(
            strategy,
            DisplayStrategy::Packed {
                label: "tray".to_string(),
                size: 30
            }
        );
    }

    #[test]
    fn test_format_quantity() {
        assert_eq!(format_quantity(&egg_strategy(), 45.0).unwrap(), "1 tray + 15 pieces");

        let weight = resolve_display_strategy("Flour", "kg", None, None).unwrap();
        assert_eq!(format_quantity(&weight, 12.0).unwrap(), "12 kg");
    }

    #[test]
    fn test_entries_convert_to_canonical() {
        let strategy = egg_strategy();
        assert_eq!(to_canonical_quantity(&strategy, "2", "pack").unwrap(), 60.0);
        assert_eq!(to_canonical_quantity(&strategy, "7", "piece").unwrap(), 7.0);
        assert_eq!(combined_to_canonical(&strategy, "1", "15").unwrap(), 45.0);
    }

    #[test]
    fn test_display_round_trips_through_canonical() {
        let strategy = egg_strategy();
        let parsed: DisplayStrategy = serde_json::from_str(&strategy).unwrap();
        let display: QuantityDisplay =
            serde_json::from_str(&quantity_display(&strategy, 61.0).unwrap()).unwrap();
        assert_eq!(display.to_canonical(&parsed), 61);
    }

    #[test]
    fn test_transfer_quantity_check() {
        assert!(check_transfer_quantity(5.0, 10.0).is_ok());
        assert_eq!(canonical_from_js(30.0).unwrap(), 30);
    }
}
