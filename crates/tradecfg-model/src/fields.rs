//! Field registry
//!
//! Declares every field the engine knows how to edit: its kind, clamping
//! bounds, reset default and risk classification, plus the trader vocabulary
//! that maps onto canonical names.

use crate::ids::FieldName;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Decimal places kept after numeric arithmetic
pub const NUMERIC_PRECISION: i32 = 6;

/// Value kind of a field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Numeric field with inclusive bounds
    Number {
        /// Lower bound
        min: f64,
        /// Upper bound
        max: f64,
    },
    /// Boolean switch
    Flag,
    /// Free-form text / enumeration
    Text,
}

/// How a field participates in risk scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskClass {
    /// Increases directly raise exposure (lot size, martingale multiplier)
    Sensitive,
    /// Decreases remove safety margin (grid spacing, trail start)
    Safety,
    /// Not scored
    Neutral,
}

/// Declaration of one editable field
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Canonical name
    pub name: &'static str,
    /// Value kind and bounds
    pub kind: FieldKind,
    /// Value used by reset commands
    pub default: JsonValue,
    /// Risk classification
    pub risk: RiskClass,
}

impl FieldSpec {
    fn number(name: &'static str, min: f64, max: f64, default: f64, risk: RiskClass) -> Self {
        Self {
            name,
            kind: FieldKind::Number { min, max },
            default: JsonValue::from(default),
            risk,
        }
    }

    fn flag(name: &'static str, default: bool) -> Self {
        Self {
            name,
            kind: FieldKind::Flag,
            default: JsonValue::Bool(default),
            risk: RiskClass::Neutral,
        }
    }

    fn text(name: &'static str, default: &str) -> Self {
        Self {
            name,
            kind: FieldKind::Text,
            default: JsonValue::String(default.to_string()),
            risk: RiskClass::Neutral,
        }
    }

    /// Check if the field is numeric
    #[inline]
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, FieldKind::Number { .. })
    }

    /// Bounds of a numeric field
    #[inline]
    #[must_use]
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match self.kind {
            FieldKind::Number { min, max } => Some((min, max)),
            _ => None,
        }
    }

    /// Clamp a candidate value into bounds
    ///
    /// Returns the clamped value and whether clamping changed it.
    #[must_use]
    pub fn clamp(&self, value: f64) -> (f64, bool) {
        match self.bounds() {
            Some((min, max)) => {
                let clamped = round(value.clamp(min, max));
                (clamped, (clamped - round(value)).abs() > f64::EPSILON)
            }
            None => (round(value), false),
        }
    }
}

/// Round to [`NUMERIC_PRECISION`] decimals
#[inline]
#[must_use]
pub fn round(value: f64) -> f64 {
    let scale = 10f64.powi(NUMERIC_PRECISION);
    let scaled = value * scale;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / scale
}

/// Document value for a number, rounded; integral values stay integers
///
/// Infinities saturate to `±f64::MAX` so field bounds can still clamp them.
/// NaN has no JSON form and becomes `null`.
#[must_use]
pub fn number_value(value: f64) -> JsonValue {
    let value = round(value);
    let value = if value.is_infinite() {
        f64::MAX.copysign(value)
    } else {
        value
    };
    #[allow(clippy::cast_possible_truncation)]
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        JsonValue::from(value as i64)
    } else {
        JsonValue::from(value)
    }
}

static REGISTRY: Lazy<Vec<FieldSpec>> = Lazy::new(|| {
    use RiskClass::{Neutral, Safety, Sensitive};
    vec![
        FieldSpec::number("initial_lot", 0.01, 100.0, 0.01, Sensitive),
        FieldSpec::number("multiplier", 1.0, 10.0, 1.5, Sensitive),
        FieldSpec::number("grid", 50.0, 10_000.0, 500.0, Safety),
        FieldSpec::number("trail_value", 0.0, 10_000.0, 300.0, Neutral),
        FieldSpec::number("trail_start", 0.0, 10_000.0, 500.0, Safety),
        FieldSpec::number("trail_step", 0.0, 10_000.0, 100.0, Neutral),
        FieldSpec::number("tp_value", 0.0, 100_000.0, 1000.0, Neutral),
        FieldSpec::number("sl_value", 0.0, 100_000.0, 2000.0, Neutral),
        FieldSpec::number("close_partial", 0.0, 100.0, 0.0, Neutral),
        FieldSpec::number("reverse_scale", 0.0, 1000.0, 100.0, Neutral),
        FieldSpec::number("hedge_scale", 0.0, 1000.0, 50.0, Neutral),
        FieldSpec::flag("reverse_enabled", false),
        FieldSpec::flag("hedge_enabled", false),
        FieldSpec::flag("use_tp", false),
        FieldSpec::flag("use_sl", false),
        FieldSpec::flag("enabled", true),
        FieldSpec::text("trail_method", "Trail"),
        FieldSpec::text("trading_mode", "Trending"),
        FieldSpec::text("tp_mode", "TPSL_Points"),
        FieldSpec::text("sl_mode", "TPSL_Points"),
    ]
});

/// Trader vocabulary → canonical field, longest phrases first
static ALIASES: &[(&str, &str)] = &[
    ("initial lot", "initial_lot"),
    ("lot size", "initial_lot"),
    ("take profit", "tp_value"),
    ("stop loss", "sl_value"),
    ("trail start", "trail_start"),
    ("trail step", "trail_step"),
    ("trail method", "trail_method"),
    ("close partial", "close_partial"),
    ("reverse scale", "reverse_scale"),
    ("hedge scale", "hedge_scale"),
    ("trading mode", "trading_mode"),
    ("lots", "initial_lot"),
    ("lot", "initial_lot"),
    ("mult", "multiplier"),
    ("spacing", "grid"),
    ("trail", "trail_value"),
    ("tp", "tp_value"),
    ("sl", "sl_value"),
    ("reverse", "reverse_enabled"),
    ("hedge", "hedge_enabled"),
    ("mode", "trading_mode"),
];

/// Look up a field declaration by canonical name
#[must_use]
pub fn field_spec(name: &str) -> Option<&'static FieldSpec> {
    REGISTRY.iter().find(|spec| spec.name.eq_ignore_ascii_case(name))
}

/// Every declared field, in registry order
#[must_use]
pub fn all_fields() -> &'static [FieldSpec] {
    &REGISTRY
}

/// Alias table, longest phrases first
#[must_use]
pub fn field_aliases() -> &'static [(&'static str, &'static str)] {
    ALIASES
}

/// Resolve a canonical name or alias to a field name
#[must_use]
pub fn canonical_field(word: &str) -> Option<FieldName> {
    let word = word.trim().to_ascii_lowercase();
    if let Some(spec) = field_spec(&word) {
        return Some(FieldName::new(spec.name));
    }
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == word)
        .map(|(_, name)| FieldName::new(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_saturates_then_clamps() {
        assert_eq!(number_value(f64::INFINITY), JsonValue::from(f64::MAX));
        assert_eq!(number_value(f64::NEG_INFINITY), JsonValue::from(-f64::MAX));
        assert!(number_value(f64::NAN).is_null());
        assert_eq!(round(1.0e300), 1.0e300);

        let grid = field_spec("grid").unwrap();
        let saturated = number_value(600.0 * f64::MAX).as_f64().unwrap();
        assert_eq!(grid.clamp(saturated), (10_000.0, true));
        assert_eq!(grid.clamp(-saturated), (50.0, true));
    }

    #[test]
    fn number_value_keeps_integers() {
        assert_eq!(number_value(500.0), JsonValue::from(500));
        assert_eq!(number_value(461.538_461_2), JsonValue::from(461.538_461));
        assert!(number_value(0.026).is_f64());
    }

    #[test]
    fn declared_bounds() {
        let lot = field_spec("initial_lot").unwrap();
        assert_eq!(lot.bounds(), Some((0.01, 100.0)));
        assert_eq!(field_spec("multiplier").unwrap().bounds(), Some((1.0, 10.0)));
        assert_eq!(field_spec("grid").unwrap().bounds(), Some((50.0, 10_000.0)));
        assert_eq!(field_spec("tp_value").unwrap().bounds(), Some((0.0, 100_000.0)));
        assert_eq!(field_spec("close_partial").unwrap().bounds(), Some((0.0, 100.0)));
        assert_eq!(field_spec("hedge_scale").unwrap().bounds(), Some((0.0, 1000.0)));
        assert!(field_spec("trail_method").unwrap().bounds().is_none());
    }

    #[test]
    fn clamp_reports_adjustment() {
        let lot = field_spec("initial_lot").unwrap();
        assert_eq!(lot.clamp(250.0), (100.0, true));
        assert_eq!(lot.clamp(0.0), (0.01, true));
        assert_eq!(lot.clamp(0.5), (0.5, false));
    }

    #[test]
    fn clamp_removes_float_noise() {
        let lot = field_spec("initial_lot").unwrap();
        let (value, clamped) = lot.clamp(0.02 * 1.3);
        assert!((value - 0.026).abs() < f64::EPSILON);
        assert!(!clamped);
    }

    #[test]
    fn aliases_resolve_to_canonical_names() {
        assert_eq!(canonical_field("lot").unwrap().as_str(), "initial_lot");
        assert_eq!(canonical_field("Mult").unwrap().as_str(), "multiplier");
        assert_eq!(canonical_field("spacing").unwrap().as_str(), "grid");
        assert_eq!(canonical_field("grid").unwrap().as_str(), "grid");
        assert_eq!(canonical_field("hedge").unwrap().as_str(), "hedge_enabled");
        assert!(canonical_field("banana").is_none());
    }

    #[test]
    fn every_alias_targets_a_declared_field() {
        for (alias, name) in field_aliases() {
            assert!(field_spec(name).is_some(), "alias '{alias}' → unknown '{name}'");
        }
    }

    #[test]
    fn defaults_sit_inside_bounds() {
        for spec in all_fields() {
            if let (Some((min, max)), Some(default)) = (spec.bounds(), spec.default.as_f64()) {
                assert!((min..=max).contains(&default), "{} default out of range", spec.name);
            }
        }
    }
}
