//! Semantic Rule Engine
//!
//! Deterministic mapping from idiomatic trader phrases ("30% more
//! aggressive", "double the lot") to field operations. Rules are held in an
//! ordered list, most specific first; the first pattern that matches wins.
//! New rules are appended, never reordered.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::command::{FieldOperation, FieldValue, SemanticCommand};

/// A tagged rule: name, pattern and a total extractor
pub struct SemanticRule {
    /// Stable rule name
    pub name: &'static str,
    /// Case-insensitive pattern, matched against lower-cased input
    pub pattern: Regex,
    /// Builds the command from the captures
    pub extract: fn(&Captures<'_>) -> SemanticCommand,
}

impl SemanticRule {
    fn new(name: &'static str, pattern: &str, extract: fn(&Captures<'_>) -> SemanticCommand) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("semantic rule pattern is valid"),
            extract,
        }
    }
}

impl std::fmt::Debug for SemanticRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticRule")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

const FIELD_WORD: &str = r"(lots?|initial[_ ]lot|grid|multiplier|mult|trail)";
const NUMBER: &str = r"(\d+(?:\.\d+)?)";
const LEAD_IN: &str = r"(?:make\s+(?:it\s+)?|go\s+|play\s+(?:it\s+)?|be\s+)(?:more\s+)?";

static RULES: Lazy<Vec<SemanticRule>> = Lazy::new(|| {
    vec![
        SemanticRule::new(
            "hedge_mode",
            r"(?:^|\b(?:set\s*up|setup|enable|activate|use|switch\s+to)\s+)(?:a\s+)?hedg(?:e|ing)\s+mode\b",
            hedge_mode,
        ),
        SemanticRule::new(
            "percent_more_aggressive",
            &format!(r"{NUMBER}\s*%\s*more\s+(?:aggressive|risky|stronger|faster)"),
            percent_more_aggressive,
        ),
        SemanticRule::new(
            "percent_safer",
            &format!(r"{NUMBER}\s*%\s*(?:safer|more\s+conservative|more\s+defensive)"),
            percent_safer,
        ),
        SemanticRule::new(
            "double_field",
            &format!(r"\bdouble\s+(?:the\s+)?{FIELD_WORD}\b"),
            double_field,
        ),
        SemanticRule::new(
            "halve_field",
            &format!(r"\b(?:half|halve)\s+(?:the\s+)?{FIELD_WORD}\b"),
            halve_field,
        ),
        SemanticRule::new(
            "tighten_grid",
            &format!(r"\btighten\s+(?:the\s+)?grid(?:\s+(?:by\s+)?{NUMBER})?"),
            tighten_grid,
        ),
        SemanticRule::new(
            "loosen_grid",
            &format!(r"\b(?:loosen|widen)\s+(?:the\s+)?grid(?:\s+(?:by\s+)?{NUMBER})?"),
            loosen_grid,
        ),
        SemanticRule::new(
            "aggressive_preset",
            &format!(r"(?:{LEAD_IN}(?:aggressive|risky)\b|\baggressive\s+(?:preset|mode|profile)\b)"),
            aggressive_preset,
        ),
        SemanticRule::new(
            "conservative_preset",
            &format!(
                r"(?:{LEAD_IN}(?:conservative|safe|safer|defensive)\b|\b(?:conservative|safe)\s+(?:preset|mode|profile)\b)"
            ),
            conservative_preset,
        ),
        SemanticRule::new(
            "balanced_preset",
            &format!(r"(?:{LEAD_IN}balanced\b|\bbalanced\s+(?:preset|mode|profile)\b)"),
            balanced_preset,
        ),
    ]
});

/// Rules in evaluation order
#[must_use]
pub fn rules() -> &'static [SemanticRule] {
    &RULES
}

/// Match text against the rule list; first match wins
#[must_use]
pub fn match_semantic(text: &str) -> Option<SemanticCommand> {
    let lower = text.to_lowercase();
    RULES.iter().find_map(|rule| {
        rule.pattern.captures(&lower).map(|caps| {
            tracing::debug!(rule = rule.name, "semantic rule matched");
            (rule.extract)(&caps)
        })
    })
}

fn number(caps: &Captures<'_>, index: usize) -> Option<f64> {
    caps.get(index).and_then(|m| m.as_str().parse().ok())
}

fn canonical(word: &str) -> &'static str {
    match word {
        "grid" => "grid",
        "multiplier" | "mult" => "multiplier",
        "trail" => "trail_value",
        _ => "initial_lot",
    }
}

fn hedge_mode(_: &Captures<'_>) -> SemanticCommand {
    SemanticCommand::new(
        "hedge_mode",
        "Hedge mode: hedging on at 50% scale, stop loss 1500, multiplier 1.2",
        vec![
            FieldOperation::set("trading_mode", FieldValue::Text("Hedge".to_string())),
            FieldOperation::set("hedge_enabled", FieldValue::Bool(true)),
            FieldOperation::set("hedge_scale", FieldValue::Number(50.0)),
            FieldOperation::set("use_sl", FieldValue::Bool(true)),
            FieldOperation::set("sl_value", FieldValue::Number(1500.0)),
            FieldOperation::set("multiplier", FieldValue::Number(1.2)),
        ],
    )
}

fn percent_more_aggressive(caps: &Captures<'_>) -> SemanticCommand {
    let percent = number(caps, 1).unwrap_or(0.0);
    let factor = 1.0 + percent / 100.0;
    SemanticCommand::new(
        "percent_more_aggressive",
        format!("{percent}% more aggressive: larger lots and multiplier, tighter grid"),
        vec![
            FieldOperation::scale("multiplier", factor),
            FieldOperation::scale("initial_lot", factor),
            FieldOperation::scale("grid", 1.0 / factor),
        ],
    )
}

fn percent_safer(caps: &Captures<'_>) -> SemanticCommand {
    let percent = number(caps, 1).unwrap_or(0.0);
    let reduce = 1.0 - percent / 200.0;
    SemanticCommand::new(
        "percent_safer",
        format!("{percent}% safer: wider grid, smaller lots and multiplier"),
        vec![
            FieldOperation::scale("grid", 1.0 + percent / 100.0),
            FieldOperation::scale("multiplier", reduce),
            FieldOperation::scale("initial_lot", reduce),
        ],
    )
}

fn double_field(caps: &Captures<'_>) -> SemanticCommand {
    let field = canonical(caps.get(1).map_or("lot", |m| m.as_str()));
    SemanticCommand::new(
        "double_field",
        format!("Double {field}"),
        vec![FieldOperation::scale(field, 2.0)],
    )
}

fn halve_field(caps: &Captures<'_>) -> SemanticCommand {
    let field = canonical(caps.get(1).map_or("lot", |m| m.as_str()));
    SemanticCommand::new(
        "halve_field",
        format!("Halve {field}"),
        vec![FieldOperation::scale(field, 0.5)],
    )
}

fn tighten_grid(caps: &Captures<'_>) -> SemanticCommand {
    match number(caps, 1) {
        Some(amount) => SemanticCommand::new(
            "tighten_grid",
            format!("Tighten grid by {amount}"),
            vec![FieldOperation::subtract("grid", amount)],
        ),
        None => SemanticCommand::new(
            "tighten_grid",
            "Tighten grid by 20%",
            vec![FieldOperation::scale("grid", 0.8)],
        ),
    }
}

fn loosen_grid(caps: &Captures<'_>) -> SemanticCommand {
    match number(caps, 1) {
        Some(amount) => SemanticCommand::new(
            "loosen_grid",
            format!("Widen grid by {amount}"),
            vec![FieldOperation::add("grid", amount)],
        ),
        None => SemanticCommand::new(
            "loosen_grid",
            "Widen grid by 25%",
            vec![FieldOperation::scale("grid", 1.25)],
        ),
    }
}

fn aggressive_preset(_: &Captures<'_>) -> SemanticCommand {
    SemanticCommand::new(
        "aggressive_preset",
        "Aggressive preset: multiplier ×1.3, lot ×1.2, grid ×0.75",
        vec![
            FieldOperation::scale("multiplier", 1.3),
            FieldOperation::scale("initial_lot", 1.2),
            FieldOperation::scale("grid", 0.75),
        ],
    )
}

fn conservative_preset(_: &Captures<'_>) -> SemanticCommand {
    SemanticCommand::new(
        "conservative_preset",
        "Conservative preset: multiplier ×0.7, lot ×0.8, grid ×1.4",
        vec![
            FieldOperation::scale("multiplier", 0.7),
            FieldOperation::scale("initial_lot", 0.8),
            FieldOperation::scale("grid", 1.4),
        ],
    )
}

fn balanced_preset(_: &Captures<'_>) -> SemanticCommand {
    SemanticCommand::new(
        "balanced_preset",
        "Balanced preset: multiplier 1.5, grid 600, trail start 500",
        vec![
            FieldOperation::set("multiplier", FieldValue::Number(1.5)),
            FieldOperation::set("grid", FieldValue::Number(600.0)),
            FieldOperation::set("trail_start", FieldValue::Number(500.0)),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::OpKind;
    use pretty_assertions::assert_eq;

    fn matched(text: &str) -> SemanticCommand {
        match_semantic(text).unwrap_or_else(|| panic!("'{text}' should match a rule"))
    }

    #[test]
    fn rule_order_is_fixed() {
        let names: Vec<&str> = rules().iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "hedge_mode",
                "percent_more_aggressive",
                "percent_safer",
                "double_field",
                "halve_field",
                "tighten_grid",
                "loosen_grid",
                "aggressive_preset",
                "conservative_preset",
                "balanced_preset",
            ]
        );
    }

    #[test]
    fn percent_aggressive_scales_three_fields() {
        let cmd = matched("30% more aggressive");
        assert_eq!(cmd.rule, "percent_more_aggressive");
        let factors: Vec<(&str, f64)> = cmd
            .operations
            .iter()
            .map(|op| (op.field.as_str(), op.factor.unwrap()))
            .collect();
        assert_eq!(factors[0], ("multiplier", 1.3));
        assert_eq!(factors[1], ("initial_lot", 1.3));
        assert_eq!(factors[2].0, "grid");
        assert!((factors[2].1 - 1.0 / 1.3).abs() < 1e-12);
    }

    #[test]
    fn percent_rule_beats_preset() {
        assert_eq!(matched("make it 20% more aggressive").rule, "percent_more_aggressive");
        assert_eq!(matched("make it aggressive").rule, "aggressive_preset");
        assert_eq!(matched("40% more conservative").rule, "percent_safer");
        assert_eq!(matched("go safe").rule, "conservative_preset");
    }

    #[test]
    fn percent_safer_factors() {
        let cmd = matched("50% safer");
        let ops = &cmd.operations;
        assert_eq!(ops[0].field.as_str(), "grid");
        assert_eq!(ops[0].factor, Some(1.5));
        assert_eq!(ops[1].factor, Some(0.75));
        assert_eq!(ops[2].factor, Some(0.75));
    }

    #[test]
    fn double_and_halve_map_aliases() {
        let double = matched("Double the lot");
        assert_eq!(double.operations, vec![FieldOperation::scale("initial_lot", 2.0)]);
        let half = matched("halve the trail");
        assert_eq!(half.operations, vec![FieldOperation::scale("trail_value", 0.5)]);
        let mult = matched("double mult");
        assert_eq!(mult.operations[0].field.as_str(), "multiplier");
    }

    #[test]
    fn tighten_with_and_without_amount() {
        let by = matched("tighten the grid by 100");
        assert_eq!(by.operations, vec![FieldOperation::subtract("grid", 100.0)]);
        let pct = matched("tighten grid");
        assert_eq!(pct.operations, vec![FieldOperation::scale("grid", 0.8)]);
        let widen = matched("widen the grid 50");
        assert_eq!(widen.operations, vec![FieldOperation::add("grid", 50.0)]);
        assert_eq!(matched("loosen grid").operations[0].factor, Some(1.25));
    }

    #[test]
    fn hedge_mode_bundle() {
        let cmd = matched("setup hedge mode for high volatility");
        assert_eq!(cmd.operations.len(), 6);
        assert_eq!(cmd.operations[0].value, Some(FieldValue::Text("Hedge".into())));
        assert!(cmd.operations.iter().all(|op| op.op == OpKind::Set));
    }

    #[test]
    fn balanced_preset_sets_values() {
        let cmd = matched("make it balanced");
        assert_eq!(
            cmd.operations,
            vec![
                FieldOperation::set("multiplier", FieldValue::Number(1.5)),
                FieldOperation::set("grid", FieldValue::Number(600.0)),
                FieldOperation::set("trail_start", FieldValue::Number(500.0)),
            ]
        );
    }

    #[test]
    fn literal_commands_do_not_match() {
        assert!(match_semantic("set grid to 500 for G1").is_none());
        assert!(match_semantic("show lot for POWER").is_none());
        assert!(match_semantic("copy G1 to G2").is_none());
    }

    #[test]
    fn preview_lists_each_operation() {
        let cmd = matched("aggressive preset");
        assert_eq!(cmd.preview.len(), cmd.operations.len());
    }
}
