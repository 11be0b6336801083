//! Testing utilities for tradecfg workspace
//!
//! Shared document fixtures and leaf helpers.

#![allow(missing_docs)]

use serde_json::{json, Value as JsonValue};
use tradecfg_model::{ConfigDocument, EngineId, GroupId, LeafPath};

pub const LOGICS: [&str; 3] = ["POWER", "REPOWER", "SCALPER"];

fn logic(name: &str) -> JsonValue {
    json!({
        "logic_name": name,
        "enabled": true,
        "initial_lot": 0.02,
        "multiplier": 1.0,
        "grid": 600,
        "trail_value": 300,
        "trail_start": 500,
        "trail_step": 100,
        "trail_method": "Trail",
        "tp_value": 1000,
        "sl_value": 2000,
        "use_tp": false,
        "use_sl": false,
        "reverse_enabled": false,
        "hedge_enabled": false,
    })
}

fn group(number: u8) -> JsonValue {
    json!({
        "group_number": number,
        "logics": LOGICS.iter().map(|name| logic(name)).collect::<Vec<_>>(),
    })
}

/// Engines A and B, groups 1-3, logics POWER/REPOWER/SCALPER
///
/// Every logic starts at `multiplier` 1.0, `initial_lot` 0.02, `grid` 600.
pub fn sample_document() -> ConfigDocument {
    let engines: Vec<JsonValue> = ["A", "B"]
        .iter()
        .map(|id| {
            json!({
                "engine_id": id,
                "groups": (1..=3).map(group).collect::<Vec<_>>(),
            })
        })
        .collect();
    ConfigDocument::new(json!({ "engines": engines })).unwrap()
}

/// One engine, one group, one logic
pub fn single_logic_document() -> ConfigDocument {
    ConfigDocument::new(json!({
        "engines": [{
            "engine_id": "A",
            "groups": [{ "group_number": 1, "logics": [logic("POWER")] }],
        }]
    }))
    .unwrap()
}

/// Engine A with groups 1..=count
pub fn document_with_groups(count: u8) -> ConfigDocument {
    ConfigDocument::new(json!({
        "engines": [{
            "engine_id": "A",
            "groups": (1..=count).map(group).collect::<Vec<_>>(),
        }]
    }))
    .unwrap()
}

pub fn group_id(n: u8) -> GroupId {
    GroupId::new(n).unwrap()
}

pub fn engine_id(id: &str) -> EngineId {
    EngineId::new(id).unwrap()
}

/// Leaf path from parts, e.g. `leaf("A", 1, "POWER", "grid")`
pub fn leaf(engine: &str, group: u8, logic: &str, field: &str) -> LeafPath {
    LeafPath::new(engine_id(engine), group_id(group), logic, field)
}

pub fn number_at(document: &ConfigDocument, path: &LeafPath) -> f64 {
    document
        .get_f64(path)
        .unwrap_or_else(|| panic!("no number at {path}"))
}
