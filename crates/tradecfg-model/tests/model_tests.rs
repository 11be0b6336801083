use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;
use tradecfg_model::fields::{all_fields, round};
use tradecfg_model::{field_spec, ConfigDocument, GroupId, LeafPath};

fn two_engine_doc() -> ConfigDocument {
    ConfigDocument::new(json!({
        "engines": [
            { "engine_id": "A", "groups": [
                { "group_number": 1, "logics": [
                    { "logic_name": "POWER", "grid": 600, "multiplier": 1.0 }
                ]}
            ]},
            { "engine_id": "B", "groups": [
                { "group_number": 1, "logics": [
                    { "logic_name": "POWER", "grid": 800, "multiplier": 2.0 }
                ]},
                { "group_number": "4", "logics": [
                    { "logic_name": "scalper", "grid": 250 }
                ]}
            ]}
        ]
    }))
    .unwrap()
}

#[test]
fn test_leaves_follow_document_order() {
    let leaves: Vec<String> = two_engine_doc()
        .leaves()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        leaves,
        vec![
            "A/G1/POWER/grid",
            "A/G1/POWER/multiplier",
            "B/G1/POWER/grid",
            "B/G1/POWER/multiplier",
            "B/G4/SCALPER/grid",
        ]
    );
}

#[test]
fn test_textual_group_numbers_are_accepted() {
    let doc = two_engine_doc();
    let b = "B".parse().unwrap();
    assert_eq!(doc.group_ids(&b), vec![GroupId::new(1).unwrap(), GroupId::new(4).unwrap()]);
}

#[test]
fn test_serde_validates_shape() {
    let doc = two_engine_doc();
    let text = serde_json::to_string(&doc).unwrap();
    let back: ConfigDocument = serde_json::from_str(&text).unwrap();
    assert_eq!(back, doc);
    assert!(serde_json::from_str::<ConfigDocument>(r#"{"engines": 5}"#).is_err());
}

#[test]
fn test_set_only_touches_addressed_leaf() {
    let mut doc = two_engine_doc();
    let before = doc.flatten();
    let leaf: LeafPath = "B/G1/POWER/grid".parse().unwrap();
    doc.set(&leaf, json!(900)).unwrap();

    let after = doc.flatten();
    let changed: Vec<&String> = after
        .iter()
        .filter(|(path, value)| before.get(*path) != Some(*value))
        .map(|(path, _)| path)
        .collect();
    assert_eq!(changed, vec!["engines/B/groups/1/logics/POWER/grid"]);
}

proptest! {
    #[test]
    fn prop_clamp_stays_in_bounds(value in -1.0e6f64..1.0e6f64, index in 0usize..11) {
        let spec = &all_fields()[index];
        let (min, max) = spec.bounds().unwrap();
        let (clamped, _) = spec.clamp(value);
        prop_assert!(clamped >= min && clamped <= max);
    }

    #[test]
    fn prop_clamp_is_idempotent(value in -1.0e5f64..1.0e5f64) {
        let grid = field_spec("grid").unwrap();
        let (once, _) = grid.clamp(value);
        let (twice, adjusted) = grid.clamp(once);
        prop_assert_eq!(once, twice);
        prop_assert!(!adjusted);
    }

    #[test]
    fn prop_round_is_stable(value in -1.0e4f64..1.0e4f64) {
        prop_assert_eq!(round(round(value)), round(value));
    }
}
