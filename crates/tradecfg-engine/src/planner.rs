//! Transaction Planner
//!
//! Expands a resolved target against the document and computes, for every
//! concrete leaf, the value a command would write. Nothing is mutated here;
//! the resulting [`TransactionPlan`] is what the executor previews, asks to
//! confirm and finally applies.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;
use ulid::Ulid;

use tradecfg_command::{Command, CommandKind, FieldOperation, Target};
use tradecfg_model::fields::{all_fields, round};
use tradecfg_model::{
    field_spec, number_value, ConfigDocument, ContentHash, EngineId, FieldKind, FieldName,
    GroupId, LeafPath,
};

use crate::error::PlanError;
use crate::risk::RiskAssessment;
use crate::settings::RiskSettings;

/// One previewed change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePreview {
    /// Engine
    pub engine: EngineId,
    /// Group
    pub group: GroupId,
    /// Logic name
    pub logic: String,
    /// Field
    pub field: FieldName,
    /// Value in the document now
    pub current_value: JsonValue,
    /// Value the plan writes (after clamping)
    pub new_value: JsonValue,
    /// `new - current` for numbers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
    /// Relative change; absent when the current value is zero
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_percent: Option<f64>,
    /// The requested value was outside the field bounds
    pub clamped: bool,
}

impl ChangePreview {
    /// Build a row, deriving the deltas
    #[must_use]
    pub fn new(leaf: LeafPath, current_value: JsonValue, new_value: JsonValue, clamped: bool) -> Self {
        let (delta, delta_percent) = match (current_value.as_f64(), new_value.as_f64()) {
            (Some(current), Some(new)) => {
                let percent =
                    (current != 0.0).then(|| round((new - current) / current.abs() * 100.0));
                (Some(round(new - current)), percent)
            }
            _ => (None, None),
        };
        Self {
            engine: leaf.engine,
            group: leaf.group,
            logic: leaf.logic,
            field: leaf.field,
            current_value,
            new_value,
            delta,
            delta_percent,
            clamped,
        }
    }

    /// Leaf this row writes
    #[must_use]
    pub fn leaf(&self) -> LeafPath {
        LeafPath::new(
            self.engine.clone(),
            self.group,
            &self.logic,
            self.field.clone(),
        )
    }
}

/// Leaf an operation could not be applied to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedLeaf {
    /// Leaf
    pub leaf: LeafPath,
    /// Why it was skipped
    pub reason: String,
}

/// Planned, not yet applied, set of changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionPlan {
    /// Plan id, shared by the history operations it produces
    pub id: Ulid,
    /// Operations applied to every targeted logic; empty for plans whose
    /// values come from elsewhere (progression, copy, reset)
    pub changes: Vec<FieldOperation>,
    /// One row per leaf that changes, in document order
    pub preview: Vec<ChangePreview>,
    /// Risk of applying
    pub risk: RiskAssessment,
    /// Summary line
    pub description: String,
    /// Hash of the document the plan was computed against
    pub base_hash: ContentHash,
    /// Leaves an operation could not apply to
    pub skipped: Vec<SkippedLeaf>,
}

impl TransactionPlan {
    /// Check whether the plan changes nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.preview.is_empty()
    }

    /// Number of leaves the plan writes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.preview.len()
    }
}

/// Progression shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressionKind {
    /// Even steps
    Linear,
    /// Steps growing with the Fibonacci sequence
    Fibonacci,
    /// Constant ratio between neighbours
    Exponential,
}

impl ProgressionKind {
    fn from_param(text: Option<&str>) -> Self {
        match text {
            Some("fibonacci") => Self::Fibonacci,
            Some("exponential") => Self::Exponential,
            _ => Self::Linear,
        }
    }

    /// `count` values from `start` to `end` inclusive
    #[must_use]
    pub fn values(self, start: f64, end: f64, count: usize) -> Vec<f64> {
        if count == 0 {
            return Vec::new();
        }
        if count == 1 {
            return vec![round(start)];
        }
        #[allow(clippy::cast_precision_loss)]
        let last = (count - 1) as f64;
        let fractions: Vec<f64> = match self {
            Self::Linear => (0..count).map(|i| i as f64 / last).collect(),
            Self::Fibonacci => {
                let mut cumulative = Vec::with_capacity(count);
                let (mut a, mut b, mut sum) = (1.0_f64, 1.0_f64, 0.0_f64);
                for _ in 0..count {
                    sum += a;
                    cumulative.push(sum);
                    (a, b) = (b, a + b);
                }
                let (first, span) = (cumulative[0], cumulative[count - 1] - cumulative[0]);
                cumulative.iter().map(|c| (c - first) / span).collect()
            }
            Self::Exponential if start > 0.0 && end > 0.0 => {
                let ratio = end / start;
                return (0..count)
                    .map(|i| round(start * ratio.powf(i as f64 / last)))
                    .collect();
            }
            Self::Exponential => (0..count).map(|i| i as f64 / last).collect(),
        };
        fractions
            .into_iter()
            .map(|t| round(start + (end - start) * t))
            .collect()
    }
}

/// Computes plans against a document
#[derive(Debug, Clone, Default)]
pub struct TransactionPlanner {
    risk: RiskSettings,
}

impl TransactionPlanner {
    /// Planner with default risk thresholds
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With risk thresholds
    #[inline]
    #[must_use]
    pub fn with_risk(mut self, risk: RiskSettings) -> Self {
        self.risk = risk;
        self
    }

    /// Plan any mutating command
    ///
    /// # Errors
    /// Returns error if the command kind is read-only or its parameters are
    /// incomplete
    pub fn plan_command(
        &self,
        command: &Command,
        resolved: &Target,
        document: &ConfigDocument,
    ) -> Result<TransactionPlan, PlanError> {
        match command.kind {
            CommandKind::Set | CommandKind::Semantic => {
                let operations = command.field_operations();
                if operations.is_empty() {
                    return Err(PlanError::NoOperations(command.kind.to_string()));
                }
                let mut plan = self.plan(operations, resolved, document);
                if let Some(semantic) = &command.semantic {
                    plan.description.clone_from(&semantic.description);
                }
                Ok(plan)
            }
            CommandKind::Progression => self.plan_progression(command, resolved, document),
            CommandKind::Copy => self.plan_copy(command, resolved, document),
            CommandKind::Reset => Ok(self.plan_reset(resolved, document)),
            other => Err(PlanError::NoOperations(other.to_string())),
        }
    }

    /// Apply operations to every targeted logic
    #[must_use]
    pub fn plan(
        &self,
        operations: Vec<FieldOperation>,
        resolved: &Target,
        document: &ConfigDocument,
    ) -> TransactionPlan {
        let mut staged = Staging::default();
        for (engine, group, logic) in select_logics(resolved, document) {
            let mut working: IndexMap<FieldName, JsonValue> = IndexMap::new();
            for operation in &operations {
                let leaf = LeafPath::new(engine.clone(), group, &logic, operation.field.clone());
                let Some(current) = working
                    .get(&operation.field)
                    .cloned()
                    .or_else(|| document.get(&leaf).cloned())
                else {
                    staged.skip(leaf, "field not present");
                    continue;
                };
                match operation.apply(&current) {
                    Some(candidate) => {
                        if let Some(value) = staged.stage(&leaf, document, candidate) {
                            working.insert(operation.field.clone(), value);
                        }
                    }
                    None => staged.skip(leaf, "operation does not apply to this value"),
                }
            }
        }

        let description = describe_operations(&operations, resolved);
        self.finish(staged, operations, description, document)
    }

    /// Write explicit per-leaf values
    #[must_use]
    pub fn plan_values(
        &self,
        values: Vec<(LeafPath, JsonValue)>,
        description: impl Into<String>,
        document: &ConfigDocument,
    ) -> TransactionPlan {
        let mut staged = Staging::default();
        for (leaf, candidate) in values {
            if document.get(&leaf).is_none() {
                staged.skip(leaf, "field not present");
                continue;
            }
            staged.stage(&leaf, document, candidate);
        }
        self.finish(staged, Vec::new(), description.into(), document)
    }

    fn plan_progression(
        &self,
        command: &Command,
        resolved: &Target,
        document: &ConfigDocument,
    ) -> Result<TransactionPlan, PlanError> {
        let start = command
            .param_f64("start")
            .ok_or_else(|| PlanError::MissingParameter("start".into()))?;
        let end = command
            .param_f64("end")
            .ok_or_else(|| PlanError::MissingParameter("end".into()))?;
        let kind = ProgressionKind::from_param(command.param_str("progression"));
        let fields = target_fields(resolved, || vec![FieldName::new("grid")]);

        let logics = select_logics(resolved, document);
        let mut groups: Vec<GroupId> = Vec::new();
        for (_, group, _) in &logics {
            if !groups.contains(group) {
                groups.push(*group);
            }
        }
        groups.sort_unstable();
        if groups.is_empty() {
            return Err(PlanError::NoGroups);
        }
        let steps = kind.values(start, end, groups.len());

        let mut values = Vec::new();
        for (engine, group, logic) in &logics {
            let Some(step) = groups.iter().position(|g| g == group).map(|i| steps[i]) else {
                continue;
            };
            for field in &fields {
                let leaf = LeafPath::new(engine.clone(), *group, logic, field.clone());
                values.push((leaf, number_value(step)));
            }
        }

        let description = format!(
            "{kind:?} progression of {} from {start} to {end} across {} group(s)",
            join(&fields),
            groups.len()
        )
        .to_lowercase();
        Ok(self.plan_values(values, description, document))
    }

    fn plan_copy(
        &self,
        command: &Command,
        resolved: &Target,
        document: &ConfigDocument,
    ) -> Result<TransactionPlan, PlanError> {
        let source_group = command
            .param_str("source_group")
            .map(str::parse::<GroupId>)
            .transpose()
            .map_err(|_| PlanError::MissingParameter("source_group".into()))?;
        let source_engine = command
            .param_str("source_engine")
            .map(EngineId::new)
            .transpose()
            .map_err(|_| PlanError::MissingParameter("source_engine".into()))?;

        let source_label = match (&source_group, &source_engine) {
            (Some(group), _) => {
                let exists = document
                    .engine_ids()
                    .iter()
                    .any(|e| document.group_ids(e).contains(group));
                if !exists {
                    return Err(PlanError::SourceNotFound(group.to_string()));
                }
                group.to_string()
            }
            (None, Some(engine)) => {
                if !document.engine_ids().contains(engine) {
                    return Err(PlanError::SourceNotFound(format!("engine {engine}")));
                }
                format!("engine {engine}")
            }
            (None, None) => return Err(PlanError::MissingParameter("source_group".into())),
        };

        let mut values = Vec::new();
        for (engine, group, logic) in select_logics(resolved, document) {
            let source_engine = source_engine.clone().unwrap_or_else(|| engine.clone());
            let source_group = source_group.unwrap_or(group);
            if source_engine == engine && source_group == group {
                continue;
            }
            let fields = target_fields(resolved, || {
                document.field_names(&source_engine, source_group, &logic)
            });
            for field in fields {
                let source = LeafPath::new(source_engine.clone(), source_group, &logic, field.clone());
                let destination = LeafPath::new(engine.clone(), group, &logic, field);
                if let Some(value) = document.get(&source) {
                    values.push((destination, value.clone()));
                }
            }
        }

        let fields = resolved
            .fields
            .as_ref()
            .map_or_else(|| "all fields".to_string(), |f| join(f));
        Ok(self.plan_values(values, format!("copy {fields} from {source_label}"), document))
    }

    fn plan_reset(&self, resolved: &Target, document: &ConfigDocument) -> TransactionPlan {
        let fields = target_fields(resolved, || {
            all_fields().iter().map(|spec| FieldName::new(spec.name)).collect()
        });
        let mut values = Vec::new();
        for (engine, group, logic) in select_logics(resolved, document) {
            for field in &fields {
                let Some(spec) = field_spec(field.as_str()) else {
                    continue;
                };
                let leaf = LeafPath::new(engine.clone(), group, &logic, field.clone());
                if document.get(&leaf).is_some() {
                    values.push((leaf, spec.default.clone()));
                }
            }
        }
        self.plan_values(values, format!("reset {} to defaults", join(&fields)), document)
    }

    fn finish(
        &self,
        staged: Staging,
        changes: Vec<FieldOperation>,
        description: String,
        document: &ConfigDocument,
    ) -> TransactionPlan {
        let (preview, skipped) = staged.into_parts();
        let risk = RiskAssessment::assess(&preview, &self.risk);
        debug!(
            rows = preview.len(),
            skipped = skipped.len(),
            score = risk.score,
            "plan computed"
        );
        TransactionPlan {
            id: Ulid::new(),
            changes,
            preview,
            risk,
            description,
            base_hash: document.content_hash(),
            skipped,
        }
    }
}

/// Candidate rows keyed by leaf, in first-staged order
#[derive(Default)]
struct Staging {
    rows: IndexMap<LeafPath, ChangePreview>,
    skipped: Vec<SkippedLeaf>,
}

impl Staging {
    fn skip(&mut self, leaf: LeafPath, reason: &str) {
        self.skipped.push(SkippedLeaf {
            leaf,
            reason: reason.to_string(),
        });
    }

    /// Validate and clamp a candidate and record it against its leaf
    ///
    /// Returns the value the leaf would hold, or `None` if skipped.
    fn stage(
        &mut self,
        leaf: &LeafPath,
        document: &ConfigDocument,
        candidate: JsonValue,
    ) -> Option<JsonValue> {
        let (value, clamped) = match field_spec(leaf.field.as_str()).map(|spec| (spec, &spec.kind)) {
            Some((spec, FieldKind::Number { .. })) => {
                let Some(number) = candidate.as_f64() else {
                    self.skip(leaf.clone(), "field expects a number");
                    return None;
                };
                let (value, clamped) = spec.clamp(number);
                (number_value(value), clamped)
            }
            Some((_, FieldKind::Flag)) if !candidate.is_boolean() => {
                self.skip(leaf.clone(), "field expects true or false");
                return None;
            }
            Some((_, FieldKind::Text)) if !candidate.is_string() => {
                self.skip(leaf.clone(), "field expects text");
                return None;
            }
            _ => (candidate, false),
        };

        let original = match self.rows.get(leaf) {
            Some(row) => row.current_value.clone(),
            None => document.get(leaf).cloned().unwrap_or(JsonValue::Null),
        };
        // insert keeps the position of a leaf staged earlier
        self.rows.insert(
            leaf.clone(),
            ChangePreview::new(leaf.clone(), original, value.clone(), clamped),
        );
        Some(value)
    }

    /// Rows that change their leaf, plus the skipped leaves
    fn into_parts(self) -> (Vec<ChangePreview>, Vec<SkippedLeaf>) {
        let rows = self
            .rows
            .into_values()
            .filter(|row| !same_value(&row.current_value, &row.new_value))
            .collect();
        (rows, self.skipped)
    }
}

fn same_value(a: &JsonValue, b: &JsonValue) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => (x - y).abs() < 1e-9,
        _ => a == b,
    }
}

/// Every (engine, group, logic) the target selects
///
/// Constrained dimensions follow the target's selection order; the
/// unconstrained ones follow document order.
#[must_use]
pub fn select_logics(target: &Target, document: &ConfigDocument) -> Vec<(EngineId, GroupId, String)> {
    let mut selected = Vec::new();
    for engine in in_selection_order(document.engine_ids(), target.engines.as_ref()) {
        for group in in_selection_order(document.group_ids(&engine), target.groups.as_ref()) {
            let logics = document.logic_names(&engine, group);
            match &target.logics {
                None => selected.extend(logics.into_iter().map(|l| (engine.clone(), group, l))),
                Some(refs) => {
                    let mut chosen: IndexSet<&String> = IndexSet::new();
                    for r in refs {
                        chosen.extend(logics.iter().filter(|l| r.selects(&engine, l.as_str())));
                    }
                    selected.extend(chosen.into_iter().map(|l| (engine.clone(), group, l.clone())));
                }
            }
        }
    }
    selected
}

fn in_selection_order<T: Clone + Eq + std::hash::Hash>(
    present: Vec<T>,
    selection: Option<&IndexSet<T>>,
) -> Vec<T> {
    match selection {
        Some(selection) => selection
            .iter()
            .filter(|item| present.contains(*item))
            .cloned()
            .collect(),
        None => present,
    }
}

fn target_fields(target: &Target, fallback: impl FnOnce() -> Vec<FieldName>) -> Vec<FieldName> {
    target
        .fields
        .as_ref()
        .filter(|fields| !fields.is_empty())
        .map_or_else(fallback, |fields| fields.iter().cloned().collect())
}

fn join<'a>(fields: impl IntoIterator<Item = &'a FieldName>) -> String {
    fields
        .into_iter()
        .map(FieldName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_operations(operations: &[FieldOperation], target: &Target) -> String {
    let ops = operations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let scope = Target {
        fields: None,
        ..target.clone()
    };
    format!("{ops} on {scope}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tradecfg_command::{parse_local, FieldValue};
    use tradecfg_test_utils::{group_id, leaf, sample_document};

    #[test]
    fn linear_progression_is_even() {
        assert_eq!(
            ProgressionKind::Linear.values(100.0, 400.0, 4),
            vec![100.0, 200.0, 300.0, 400.0]
        );
        assert_eq!(ProgressionKind::Linear.values(100.0, 400.0, 1), vec![100.0]);
    }

    #[test]
    fn fibonacci_progression_hits_both_ends() {
        let values = ProgressionKind::Fibonacci.values(100.0, 500.0, 5);
        // cumulative 1,2,4,7,12 normalised over 11
        assert_eq!(values.first(), Some(&100.0));
        assert_eq!(values.last(), Some(&500.0));
        assert!((values[1] - 136.363_636).abs() < 1e-6);
        assert!(values.windows(2).all(|w| w[1] - w[0] >= 0.0));
    }

    #[test]
    fn exponential_progression_has_constant_ratio() {
        let values = ProgressionKind::Exponential.values(100.0, 800.0, 4);
        assert_eq!(values, vec![100.0, 200.0, 400.0, 800.0]);
    }

    #[test]
    fn set_plan_orders_and_skips_unchanged() {
        let doc = sample_document();
        let command = parse_local("set grid to 600 for G1");
        let plan = TransactionPlanner::new()
            .plan_command(&command, &command.target, &doc)
            .unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.risk, RiskAssessment::none());
    }

    #[test]
    fn operations_stack_on_the_same_field() {
        let doc = sample_document();
        let target = Target::new()
            .with_engines([EngineId::new("A").unwrap()])
            .with_groups([group_id(2)])
            .with_logics([tradecfg_model::LogicRef::named("POWER").unwrap()]);
        let plan = TransactionPlanner::new().plan(
            vec![
                FieldOperation::scale("grid", 2.0),
                FieldOperation::add("grid", 100.0),
            ],
            &target,
            &doc,
        );
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.preview[0].current_value, json!(600));
        assert_eq!(plan.preview[0].new_value, json!(1300));
    }

    #[test]
    fn preview_follows_selection_order() {
        let doc = sample_document();
        let command = parse_local("set grid to 500");
        let target = Target::new()
            .with_engines([EngineId::new("B").unwrap(), EngineId::new("A").unwrap()])
            .with_groups([group_id(3), group_id(2)])
            .with_logics([
                tradecfg_model::LogicRef::named("SCALPER").unwrap(),
                tradecfg_model::LogicRef::named("POWER").unwrap(),
            ]);
        let plan = TransactionPlanner::new()
            .plan_command(&command, &target, &doc)
            .unwrap();
        let order: Vec<_> = plan
            .preview
            .iter()
            .map(|row| format!("{}/{}/{}", row.engine, row.group.get(), row.logic))
            .collect();
        assert_eq!(
            order,
            vec![
                "B/3/SCALPER", "B/3/POWER", "B/2/SCALPER", "B/2/POWER",
                "A/3/SCALPER", "A/3/POWER", "A/2/SCALPER", "A/2/POWER",
            ]
        );
    }

    #[test]
    fn unconstrained_dimensions_keep_document_order() {
        let doc = sample_document();
        let target = Target::new().with_groups([group_id(3), group_id(2)]);
        let plan = TransactionPlanner::new().plan(
            vec![FieldOperation::set("grid", FieldValue::Number(500.0))],
            &target,
            &doc,
        );
        let order: Vec<_> = plan
            .preview
            .iter()
            .map(|row| format!("{}/{}/{}", row.engine, row.group.get(), row.logic))
            .collect();
        assert_eq!(&order[..4], ["A/3/POWER", "A/3/REPOWER", "A/3/SCALPER", "A/2/POWER"]);
        assert_eq!(order.len(), 12);
    }

    #[test]
    fn restaged_leaf_keeps_its_row_and_original() {
        let doc = sample_document();
        let target = Target::new()
            .with_engines([EngineId::new("A").unwrap()])
            .with_groups([group_id(2)]);
        let plan = TransactionPlanner::new().plan(
            vec![
                FieldOperation::add("grid", 100.0),
                FieldOperation::set("multiplier", FieldValue::Number(2.0)),
                FieldOperation::subtract("grid", 100.0),
                FieldOperation::add("grid", 50.0),
            ],
            &target,
            &doc,
        );
        let first: Vec<_> = plan.preview.iter().take(2).map(|row| row.field.as_str()).collect();
        assert_eq!(first, ["grid", "multiplier"]);
        assert_eq!(plan.preview[0].current_value, json!(600));
        assert_eq!(plan.preview[0].new_value, json!(650));
        assert_eq!(plan.preview[0].delta, Some(50.0));
    }

    #[test]
    fn edits_that_cancel_out_leave_no_row() {
        let doc = sample_document();
        let target = Target::new().with_groups([group_id(1)]);
        let plan = TransactionPlanner::new().plan(
            vec![
                FieldOperation::add("grid", 100.0),
                FieldOperation::subtract("grid", 100.0),
            ],
            &target,
            &doc,
        );
        assert!(plan.is_empty());
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn clamping_is_flagged() {
        let doc = sample_document();
        let target = Target::new().with_groups([group_id(3)]);
        let plan = TransactionPlanner::new().plan(
            vec![FieldOperation::set("multiplier", FieldValue::Number(25.0))],
            &target,
            &doc,
        );
        assert_eq!(plan.len(), 6);
        assert!(plan.preview.iter().all(|row| row.clamped && row.new_value == json!(10)));
    }

    #[test]
    fn overflowing_operations_clamp_to_bounds() {
        let doc = sample_document();
        let target = Target::new()
            .with_engines([EngineId::new("A").unwrap()])
            .with_groups([group_id(1)]);
        let plan = TransactionPlanner::new().plan(
            vec![
                FieldOperation::scale("grid", f64::MAX),
                FieldOperation::set("tp_value", FieldValue::Number(f64::NEG_INFINITY)),
            ],
            &target,
            &doc,
        );
        assert!(plan.skipped.is_empty());
        assert_eq!(plan.len(), 6);
        let grid: Vec<_> = plan.preview.iter().filter(|r| r.field.as_str() == "grid").collect();
        assert!(grid.iter().all(|row| row.clamped && row.new_value == json!(10_000)));
        let tp: Vec<_> = plan.preview.iter().filter(|r| r.field.as_str() == "tp_value").collect();
        assert!(tp.iter().all(|row| row.clamped && row.new_value == json!(0)));
    }

    #[test]
    fn type_mismatch_is_skipped() {
        let doc = sample_document();
        let target = Target::new().with_groups([group_id(1)]);
        let plan = TransactionPlanner::new().plan(
            vec![FieldOperation::scale("trail_method", 2.0)],
            &target,
            &doc,
        );
        assert!(plan.is_empty());
        assert_eq!(plan.skipped.len(), 6);
    }

    #[test]
    fn zero_current_has_no_percent() {
        let row = ChangePreview::new(leaf("A", 1, "POWER", "close_partial"), json!(0), json!(10), false);
        assert_eq!(row.delta, Some(10.0));
        assert_eq!(row.delta_percent, None);
    }

    #[test]
    fn reset_writes_registry_defaults() {
        let doc = sample_document();
        let command = parse_local("reset grid for G2");
        let plan = TransactionPlanner::new()
            .plan_command(&command, &command.target, &doc)
            .unwrap();
        assert_eq!(plan.len(), 6);
        assert!(plan.preview.iter().all(|row| row.new_value == json!(500)));
    }

    #[test]
    fn copy_from_missing_group_fails() {
        let doc = sample_document();
        let command = parse_local("copy G9 to G2");
        let err = TransactionPlanner::new()
            .plan_command(&command, &command.target, &doc)
            .unwrap_err();
        assert_eq!(err, PlanError::SourceNotFound("G9".into()));
    }

    #[test]
    fn query_kind_cannot_be_planned() {
        let doc = sample_document();
        let command = parse_local("show grid for G1");
        assert!(matches!(
            TransactionPlanner::new().plan_command(&command, &command.target, &doc),
            Err(PlanError::NoOperations(_))
        ));
    }
}
