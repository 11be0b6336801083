//! Plain-text rendering of command results

use std::fmt::Write as _;

use serde_json::Value as JsonValue;
use tradecfg_engine::{CommandResult, QueryResult};

/// Render a result for the terminal
#[must_use]
pub fn render(result: &CommandResult) -> String {
    let mut out = String::new();
    let status = if result.success { "ok" } else { "error" };
    let _ = write!(out, "[{status}] {}", result.message);

    for notice in &result.notices {
        let _ = write!(out, "\n  note: {}", notice.message());
    }

    if let Some(plan) = &result.pending_plan {
        let _ = write!(out, "\n  risk: {} ({})", plan.risk.level, plan.risk.score);
        for reason in &plan.risk.reasons {
            let _ = write!(out, "\n    - {reason}");
        }
        for row in &plan.preview {
            let _ = write!(
                out,
                "\n  {}/{}/{} {}: {} -> {}{}",
                row.engine,
                row.group,
                row.logic,
                row.field,
                value(&row.current_value),
                value(&row.new_value),
                if row.clamped { " (clamped)" } else { "" }
            );
        }
        for skipped in &plan.skipped {
            let _ = write!(out, "\n  skipped {}: {}", skipped.leaf, skipped.reason);
        }
    }

    for change in &result.changes {
        let _ = write!(
            out,
            "\n  {}: {} -> {}",
            change.leaf,
            value(&change.before),
            value(&change.after)
        );
    }
    for failure in &result.failures {
        let _ = write!(out, "\n  failed {}: {}", failure.leaf, failure.error);
    }

    match &result.query_result {
        Some(QueryResult::Values { rows, .. }) => {
            for row in rows {
                let _ = write!(
                    out,
                    "\n  {}/{}/{} {} = {}",
                    row.engine,
                    row.group,
                    row.logic,
                    row.field,
                    value(&row.value)
                );
            }
        }
        Some(QueryResult::Comparison {
            left,
            right,
            rows,
            identical,
        }) => {
            let _ = write!(out, "\n  {left} | {right} ({identical} identical)");
            for row in rows {
                let _ = write!(
                    out,
                    "\n  {} {}: {} | {}",
                    row.key,
                    row.field,
                    row.left.as_ref().map_or_else(|| "-".to_string(), value),
                    row.right.as_ref().map_or_else(|| "-".to_string(), value)
                );
            }
        }
        None => {}
    }
    out
}

fn value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tradecfg_engine::AppliedChange;
    use tradecfg_model::LeafPath;

    #[test]
    fn renders_failure() {
        let text = render(&CommandResult::failure("Nothing to undo"));
        assert_eq!(text, "[error] Nothing to undo");
    }

    #[test]
    fn renders_changes_without_quotes() {
        let mut result = CommandResult::success("Applied");
        result.changes.push(AppliedChange {
            leaf: "A/G1/POWER/trail_method".parse::<LeafPath>().unwrap(),
            before: json!("Trail"),
            after: json!("Hybrid"),
        });
        assert_eq!(
            render(&result),
            "[ok] Applied\n  A/G1/POWER/trail_method: Trail -> Hybrid"
        );
    }
}
