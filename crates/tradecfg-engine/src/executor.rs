//! Command Executor
//!
//! Owns the live document and drives a command through scope resolution,
//! planning, optional confirmation and application. Every applied write is
//! recorded in the undo/redo history.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};
use ulid::Ulid;

use tradecfg_command::{resolve, Command, CommandKind, EditingScope, ParseNotice, FORMAT_HINT};
use tradecfg_model::{ConfigDocument, EngineId, FieldName, GroupId, LeafPath};

use crate::error::EngineError;
use crate::history::{ChangeOperation, ReplayGuard, UndoRedoManager};
use crate::planner::{select_logics, TransactionPlan, TransactionPlanner};
use crate::settings::EngineSettings;

/// Called with the document after every mutation
pub type ConfigChangedCallback = Box<dyn Fn(&ConfigDocument) + Send + Sync>;

/// Called after a plan is applied
pub type ClearSelectionCallback = Box<dyn Fn() + Send + Sync>;

/// One written value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedChange {
    /// Leaf
    pub leaf: LeafPath,
    /// Value before
    pub before: JsonValue,
    /// Value after
    pub after: JsonValue,
}

/// One value that could not be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedLeaf {
    /// Leaf
    pub leaf: LeafPath,
    /// Error text
    pub error: String,
}

/// Value of one leaf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRow {
    /// Engine
    pub engine: EngineId,
    /// Group
    pub group: GroupId,
    /// Logic
    pub logic: String,
    /// Field
    pub field: FieldName,
    /// Current value
    pub value: JsonValue,
}

/// A field that differs between two compared sides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    /// `engine/logic` for group comparisons, `group/logic` for engines
    pub key: String,
    /// Field
    pub field: FieldName,
    /// Left side value
    pub left: Option<JsonValue>,
    /// Right side value
    pub right: Option<JsonValue>,
}

/// Read-only answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryResult {
    /// Values of the targeted leaves
    Values {
        /// Rows in document order
        rows: Vec<ValueRow>,
        /// Groups with at least one row (filtered queries)
        matching_groups: Vec<GroupId>,
    },
    /// Differences between two groups or engines
    Comparison {
        /// Left side label
        left: String,
        /// Right side label
        right: String,
        /// Differing fields
        rows: Vec<ComparisonRow>,
        /// Fields with equal values on both sides
        identical: usize,
    },
}

/// Outcome of executing, confirming or replaying
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Whether the request succeeded
    pub success: bool,
    /// Summary
    pub message: String,
    /// Values written
    pub changes: Vec<AppliedChange>,
    /// Values that could not be written
    pub failures: Vec<FailedLeaf>,
    /// Plan awaiting confirmation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_plan: Option<TransactionPlan>,
    /// Read-only answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_result: Option<QueryResult>,
    /// Parser notices carried through
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<ParseNotice>,
}

impl CommandResult {
    /// Successful result
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            changes: Vec::new(),
            failures: Vec::new(),
            pending_plan: None,
            query_result: None,
            notices: Vec::new(),
        }
    }

    /// Failed result
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::success(message)
        }
    }

    /// With notices
    #[must_use]
    pub fn with_notices(mut self, notices: Vec<ParseNotice>) -> Self {
        self.notices = notices;
        self
    }

    /// Check whether a plan awaits confirmation
    #[inline]
    #[must_use]
    pub fn needs_confirmation(&self) -> bool {
        self.pending_plan.is_some()
    }
}

/// A logic on one side of a comparison
type LogicAt = (EngineId, GroupId, String);

/// Executes commands against the live document
pub struct CommandExecutor {
    document: ConfigDocument,
    settings: EngineSettings,
    scope: EditingScope,
    planner: TransactionPlanner,
    history: UndoRedoManager,
    pending: Option<TransactionPlan>,
    on_config_changed: Option<ConfigChangedCallback>,
    on_clear_selection: Option<ClearSelectionCallback>,
}

impl std::fmt::Debug for CommandExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("scope", &self.scope)
            .field("auto_approve", &self.settings.auto_approve)
            .field("pending", &self.pending.as_ref().map(|p| p.id))
            .field("undo_len", &self.history.undo_len())
            .finish_non_exhaustive()
    }
}

impl CommandExecutor {
    /// Executor with default settings
    #[must_use]
    pub fn new(document: ConfigDocument) -> Self {
        Self::with_settings(document, EngineSettings::default())
    }

    /// Executor with explicit settings
    #[must_use]
    pub fn with_settings(document: ConfigDocument, settings: EngineSettings) -> Self {
        let history = UndoRedoManager::new(settings.history).with_context(settings.context.clone());
        let planner = TransactionPlanner::new().with_risk(settings.risk);
        Self {
            document,
            settings,
            scope: EditingScope::new(),
            planner,
            history,
            pending: None,
            on_config_changed: None,
            on_clear_selection: None,
        }
    }

    /// With document-changed callback
    #[must_use]
    pub fn on_config_changed(mut self, callback: impl Fn(&ConfigDocument) + Send + Sync + 'static) -> Self {
        self.on_config_changed = Some(Box::new(callback));
        self
    }

    /// With selection-cleared callback
    #[must_use]
    pub fn on_clear_selection(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_clear_selection = Some(Box::new(callback));
        self
    }

    /// Live document
    #[inline]
    #[must_use]
    pub fn document(&self) -> &ConfigDocument {
        &self.document
    }

    /// Active editing scope
    #[inline]
    #[must_use]
    pub fn scope(&self) -> &EditingScope {
        &self.scope
    }

    /// Plan awaiting confirmation
    #[inline]
    #[must_use]
    pub fn pending_plan(&self) -> Option<&TransactionPlan> {
        self.pending.as_ref()
    }

    /// Undo/redo history
    #[inline]
    #[must_use]
    pub fn history(&self) -> &UndoRedoManager {
        &self.history
    }

    /// Settings in effect
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Toggle auto-approve
    pub fn set_auto_approve(&mut self, auto_approve: bool) {
        self.settings.auto_approve = auto_approve;
    }

    /// Replace the editing scope
    pub fn set_scope(&mut self, scope: EditingScope) {
        debug!(%scope, "scope changed");
        self.scope = scope;
    }

    /// Install a new document
    ///
    /// Any pending plan and the active context's history are dropped.
    pub fn replace_document(&mut self, document: ConfigDocument) {
        self.pending = None;
        let context = self.history.context().to_string();
        self.history.clear(&context);
        self.document = document;
        info!(hash = %self.document.content_hash().short(), "document replaced");
        self.notify_changed();
    }

    /// Execute a parsed command
    pub fn execute(&mut self, command: &Command) -> CommandResult {
        let notices = command.notices.clone();
        let result = match command.kind {
            CommandKind::Unknown => CommandResult::failure(
                command
                    .notices
                    .iter()
                    .find(|n| !matches!(n, ParseNotice::RouterUnavailable { .. }))
                    .map_or(FORMAT_HINT, ParseNotice::message),
            ),
            CommandKind::Query => self.query(command),
            CommandKind::Compare => self.compare(command),
            _ => self.plan_and_maybe_apply(command),
        };
        result.with_notices(notices)
    }

    /// Apply the pending plan
    pub fn confirm(&mut self) -> CommandResult {
        match self.pending.take() {
            Some(plan) => self.apply(&plan),
            None => CommandResult::failure("No pending changes to confirm"),
        }
    }

    /// Discard the pending plan
    pub fn cancel(&mut self) -> CommandResult {
        match self.pending.take() {
            Some(plan) => {
                info!(plan = %plan.id, "pending plan cancelled");
                CommandResult::success("Pending changes discarded")
            }
            None => CommandResult::failure("No pending changes to cancel"),
        }
    }

    /// Undo the most recent operation
    ///
    /// # Errors
    /// Returns `Busy` if a replay is already in progress
    pub fn undo(&mut self) -> Result<CommandResult, EngineError> {
        let guard = self.history.undo()?;
        Ok(self.replay(guard, "Nothing to undo", "Undid"))
    }

    /// Redo the most recently undone operation
    ///
    /// # Errors
    /// Returns `Busy` if a replay is already in progress
    pub fn redo(&mut self) -> Result<CommandResult, EngineError> {
        let guard = self.history.redo()?;
        Ok(self.replay(guard, "Nothing to redo", "Redid"))
    }

    /// Undo every operation of the most recent transaction
    ///
    /// # Errors
    /// Returns `Busy` if a replay is already in progress
    pub fn undo_transaction(&mut self) -> Result<CommandResult, EngineError> {
        let guard = self.history.undo_transaction()?;
        Ok(self.replay(guard, "Nothing to undo", "Undid"))
    }

    /// Redo every operation of the most recently undone transaction
    ///
    /// # Errors
    /// Returns `Busy` if a replay is already in progress
    pub fn redo_transaction(&mut self) -> Result<CommandResult, EngineError> {
        let guard = self.history.redo_transaction()?;
        Ok(self.replay(guard, "Nothing to redo", "Redid"))
    }

    /// Undo specific operations
    ///
    /// # Errors
    /// Returns error if an id is not on the undo stack or a replay is in
    /// progress
    pub fn selective_undo(&mut self, ids: &[Ulid]) -> Result<CommandResult, EngineError> {
        let guard = self.history.selective_undo(ids)?;
        Ok(self.replay(Some(guard), "Nothing to undo", "Undid"))
    }

    fn plan_and_maybe_apply(&mut self, command: &Command) -> CommandResult {
        let resolved = match resolve(&command.target, &self.scope) {
            Ok(target) => target,
            Err(conflict) => return CommandResult::failure(conflict.to_string()),
        };
        let plan = match self.planner.plan_command(command, &resolved, &self.document) {
            Ok(plan) => plan,
            Err(err) => return CommandResult::failure(err.to_string()),
        };

        if plan.is_empty() {
            debug!(skipped = plan.skipped.len(), "plan is a no-op");
            return CommandResult::success("No changes required");
        }
        if self.settings.auto_approve {
            return self.apply(&plan);
        }

        if let Some(previous) = self.pending.replace(plan.clone()) {
            debug!(replaced = %previous.id, "pending plan replaced");
        }
        let message = format!(
            "{}: {} change(s), {} risk. Confirm to apply.",
            plan.description,
            plan.len(),
            plan.risk.level
        );
        CommandResult {
            pending_plan: Some(plan),
            ..CommandResult::success(message)
        }
    }

    fn apply(&mut self, plan: &TransactionPlan) -> CommandResult {
        if plan.base_hash != self.document.content_hash() {
            warn!(plan = %plan.id, "document changed since the plan was computed");
        }

        let mut changes = Vec::with_capacity(plan.len());
        let mut failures = Vec::new();
        for row in &plan.preview {
            let leaf = row.leaf();
            match self.document.set(&leaf, row.new_value.clone()) {
                Ok(before) => {
                    self.history.add_operation(
                        ChangeOperation::update(&leaf, before.clone(), row.new_value.clone())
                            .with_transaction(plan.id)
                            .with_description(plan.description.clone()),
                    );
                    changes.push(AppliedChange {
                        leaf,
                        before,
                        after: row.new_value.clone(),
                    });
                }
                Err(err) => failures.push(FailedLeaf {
                    leaf,
                    error: err.to_string(),
                }),
            }
        }

        if !failures.is_empty() {
            warn!(plan = %plan.id, failed = failures.len(), "plan partially applied");
        }
        info!(plan = %plan.id, applied = changes.len(), "plan applied");

        if !changes.is_empty() {
            self.notify_changed();
            if let Some(callback) = &self.on_clear_selection {
                callback();
            }
        }

        let message = with_failures(format!("Applied {} change(s)", changes.len()), &failures);
        CommandResult {
            success: failures.is_empty(),
            changes,
            failures,
            ..CommandResult::success(message)
        }
    }

    fn replay(&mut self, guard: Option<ReplayGuard>, empty: &str, verb: &str) -> CommandResult {
        let Some(guard) = guard else {
            return CommandResult::failure(empty);
        };
        let mut changes = Vec::new();
        let mut failures = Vec::new();
        for (target, value) in guard.writes() {
            let Some(leaf) = target.to_leaf() else {
                continue;
            };
            match self.document.set(&leaf, value.clone()) {
                Ok(before) => changes.push(AppliedChange {
                    leaf,
                    before,
                    after: value.clone(),
                }),
                Err(err) => failures.push(FailedLeaf {
                    leaf,
                    error: err.to_string(),
                }),
            }
        }
        drop(guard);

        if !failures.is_empty() {
            warn!(failed = failures.len(), "replay partially applied");
        }
        if !changes.is_empty() {
            self.notify_changed();
        }
        CommandResult {
            success: failures.is_empty(),
            message: with_failures(format!("{verb} {} change(s)", changes.len()), &failures),
            changes,
            failures,
            ..CommandResult::success("")
        }
    }

    fn notify_changed(&self) {
        if let Some(callback) = &self.on_config_changed {
            callback(&self.document);
        }
    }

    fn query(&self, command: &Command) -> CommandResult {
        let resolved = match resolve(&command.target, &self.scope) {
            Ok(target) => target,
            Err(conflict) => return CommandResult::failure(conflict.to_string()),
        };
        let filter = command
            .param_str("filter_op")
            .zip(command.param_f64("filter_value"));

        let mut rows = Vec::new();
        for (engine, group, logic) in select_logics(&resolved, &self.document) {
            let fields = resolved.fields.as_ref().map_or_else(
                || self.document.field_names(&engine, group, &logic),
                |f| f.iter().cloned().collect(),
            );
            for field in fields {
                let leaf = LeafPath::new(engine.clone(), group, &logic, field.clone());
                let Some(value) = self.document.get(&leaf) else {
                    continue;
                };
                if let Some((op, threshold)) = filter {
                    if !value.as_f64().is_some_and(|v| compare_number(v, op, threshold)) {
                        continue;
                    }
                }
                rows.push(ValueRow {
                    engine: engine.clone(),
                    group,
                    logic: logic.clone(),
                    field,
                    value: value.clone(),
                });
            }
        }

        let mut matching_groups: Vec<GroupId> = Vec::new();
        if filter.is_some() {
            for row in &rows {
                if !matching_groups.contains(&row.group) {
                    matching_groups.push(row.group);
                }
            }
            matching_groups.sort_unstable();
        }

        let message = if filter.is_some() {
            let names: Vec<String> = matching_groups.iter().map(ToString::to_string).collect();
            format!("Found {} group(s): {}", names.len(), names.join(", "))
        } else {
            format!("{} value(s)", rows.len())
        };
        CommandResult {
            query_result: Some(QueryResult::Values {
                rows,
                matching_groups,
            }),
            ..CommandResult::success(message)
        }
    }

    fn compare(&self, command: &Command) -> CommandResult {
        let (Some(left), Some(right)) = (command.param_str("left"), command.param_str("right"))
        else {
            return CommandResult::failure(FORMAT_HINT);
        };
        let fields = command.target.fields.as_ref();
        let comparison = match command.param_str("dimension") {
            Some("engine") => match (EngineId::new(left), EngineId::new(right)) {
                (Ok(a), Ok(b)) => self.compare_engines(&a, &b, fields),
                _ => return CommandResult::failure(FORMAT_HINT),
            },
            _ => match (left.parse::<GroupId>(), right.parse::<GroupId>()) {
                (Ok(a), Ok(b)) => self.compare_groups(a, b, fields),
                _ => return CommandResult::failure(FORMAT_HINT),
            },
        };
        let (rows, identical) = comparison;
        let message = format!("{left} vs {right}: {} difference(s)", rows.len());
        CommandResult {
            query_result: Some(QueryResult::Comparison {
                left: left.to_string(),
                right: right.to_string(),
                rows,
                identical,
            }),
            ..CommandResult::success(message)
        }
    }

    fn compare_groups(
        &self,
        a: GroupId,
        b: GroupId,
        fields: Option<&IndexSet<FieldName>>,
    ) -> (Vec<ComparisonRow>, usize) {
        let mut pairs = Vec::new();
        for engine in self.document.engine_ids() {
            if !self.scope.engines().is_empty() && !self.scope.engines().contains(&engine) {
                continue;
            }
            for logic in union(
                self.document.logic_names(&engine, a),
                self.document.logic_names(&engine, b),
            ) {
                if !self.scope_selects_logic(&engine, &logic) {
                    continue;
                }
                pairs.push((
                    format!("{engine}/{logic}"),
                    (engine.clone(), a, logic.clone()),
                    (engine.clone(), b, logic),
                ));
            }
        }
        self.diff_pairs(pairs, fields)
    }

    fn compare_engines(
        &self,
        a: &EngineId,
        b: &EngineId,
        fields: Option<&IndexSet<FieldName>>,
    ) -> (Vec<ComparisonRow>, usize) {
        let mut pairs = Vec::new();
        for group in union(self.document.group_ids(a), self.document.group_ids(b)) {
            if !self.scope.groups().is_empty() && !self.scope.groups().contains(&group) {
                continue;
            }
            for logic in union(
                self.document.logic_names(a, group),
                self.document.logic_names(b, group),
            ) {
                if !self.scope_selects_logic(a, &logic) && !self.scope_selects_logic(b, &logic) {
                    continue;
                }
                pairs.push((
                    format!("{group}/{logic}"),
                    (a.clone(), group, logic.clone()),
                    (b.clone(), group, logic),
                ));
            }
        }
        self.diff_pairs(pairs, fields)
    }

    fn scope_selects_logic(&self, engine: &EngineId, logic: &str) -> bool {
        let logics = self.scope.logics();
        logics.is_empty() || logics.iter().any(|r| r.selects(engine, logic))
    }

    fn diff_pairs(
        &self,
        pairs: Vec<(String, LogicAt, LogicAt)>,
        fields: Option<&IndexSet<FieldName>>,
    ) -> (Vec<ComparisonRow>, usize) {
        let value = |(engine, group, logic): &LogicAt, field: &FieldName| {
            self.document
                .get(&LeafPath::new(engine.clone(), *group, logic, field.clone()))
                .cloned()
        };
        let mut rows = Vec::new();
        let mut identical = 0;
        for (key, left, right) in pairs {
            let names = fields.map_or_else(
                || {
                    union(
                        self.document.field_names(&left.0, left.1, &left.2),
                        self.document.field_names(&right.0, right.1, &right.2),
                    )
                },
                |f| f.iter().cloned().collect(),
            );
            for field in names {
                let l = value(&left, &field);
                let r = value(&right, &field);
                if l.is_none() && r.is_none() {
                    continue;
                }
                if l == r {
                    identical += 1;
                } else {
                    rows.push(ComparisonRow {
                        key: key.clone(),
                        field,
                        left: l,
                        right: r,
                    });
                }
            }
        }
        (rows, identical)
    }
}

/// Merge two lists keeping first-seen order
fn union<T: PartialEq>(first: Vec<T>, second: Vec<T>) -> Vec<T> {
    let mut out = first;
    for item in second {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// Summary with the leaves that could not be written
fn with_failures(summary: String, failures: &[FailedLeaf]) -> String {
    if failures.is_empty() {
        return summary;
    }
    let leaves = failures
        .iter()
        .map(|failure| failure.leaf.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("{summary}, {} failed: {leaves}", failures.len())
}

fn compare_number(value: f64, op: &str, threshold: f64) -> bool {
    const EPS: f64 = 1e-9;
    match op {
        ">" => value > threshold,
        ">=" => value >= threshold - EPS,
        "<" => value < threshold,
        "<=" => value <= threshold + EPS,
        "!=" => (value - threshold).abs() > EPS,
        _ => (value - threshold).abs() <= EPS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tradecfg_command::parse_local;
    use tradecfg_model::LogicRef;
    use tradecfg_test_utils::{leaf, sample_document, single_logic_document};

    fn executor() -> CommandExecutor {
        CommandExecutor::new(sample_document())
    }

    #[test]
    fn partial_apply_reports_failure() {
        let mut exec = executor();
        let pending = exec.execute(&parse_local("set grid to 500 for G1"));
        assert!(pending.needs_confirmation());
        exec.document = single_logic_document();

        let result = exec.confirm();
        assert!(!result.success);
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.failures.len(), 5);
        assert!(result.message.starts_with("Applied 1 change(s), 5 failed: "), "{}", result.message);
        assert!(result.message.contains("B/G1/SCALPER/grid"), "{}", result.message);
        assert_eq!(exec.history().undo_len(), 1);
    }

    #[test]
    fn unknown_command_fails_with_hint() {
        let mut exec = executor();
        let result = exec.execute(&parse_local("purple monkey dishwasher"));
        assert!(!result.success);
        assert_eq!(result.message, FORMAT_HINT);
        assert_eq!(exec.document(), &sample_document());
    }

    #[test]
    fn plan_waits_for_confirmation() {
        let mut exec = executor();
        let result = exec.execute(&parse_local("set grid to 500 for G1"));
        assert!(result.success);
        assert!(result.needs_confirmation());
        assert_eq!(result.pending_plan.as_ref().unwrap().len(), 6);
        assert_eq!(exec.document().get_f64(&leaf("A", 1, "POWER", "grid")), Some(600.0));

        let applied = exec.confirm();
        assert_eq!(applied.changes.len(), 6);
        assert_eq!(exec.document().get_f64(&leaf("A", 1, "POWER", "grid")), Some(500.0));
        assert!(!exec.confirm().success, "plan must not apply twice");
    }

    #[test]
    fn cancel_has_no_side_effects() {
        let mut exec = executor();
        exec.execute(&parse_local("set grid to 500 for G1"));
        assert!(exec.cancel().success);
        assert!(exec.pending_plan().is_none());
        assert_eq!(exec.document(), &sample_document());
        assert!(!exec.history().can_undo());
    }

    #[test]
    fn newer_plan_replaces_pending() {
        let mut exec = executor();
        exec.execute(&parse_local("set grid to 500 for G1"));
        exec.execute(&parse_local("set grid to 700 for G2"));
        exec.confirm();
        assert_eq!(exec.document().get_f64(&leaf("A", 1, "POWER", "grid")), Some(600.0));
        assert_eq!(exec.document().get_f64(&leaf("A", 2, "POWER", "grid")), Some(700.0));
    }

    #[test]
    fn no_op_plan_is_not_pending() {
        let mut exec = executor();
        let result = exec.execute(&parse_local("set grid to 600 for G1"));
        assert_eq!(result.message, "No changes required");
        assert!(exec.pending_plan().is_none());
    }

    #[test]
    fn scope_conflict_fails_without_mutation() {
        let mut exec = executor();
        exec.set_scope(EditingScope::new().with_groups([GroupId::new(2).unwrap()]).unwrap());
        let result = exec.execute(&parse_local("set grid to 500 for G3"));
        assert!(!result.success);
        assert!(result.message.starts_with("Scope excludes all targets"));
    }

    #[test]
    fn callbacks_fire_on_apply() {
        let changed = Arc::new(AtomicUsize::new(0));
        let cleared = Arc::new(AtomicUsize::new(0));
        let (c1, c2) = (Arc::clone(&changed), Arc::clone(&cleared));
        let mut exec = executor()
            .on_config_changed(move |_| {
                c1.fetch_add(1, Ordering::SeqCst);
            })
            .on_clear_selection(move || {
                c2.fetch_add(1, Ordering::SeqCst);
            });
        exec.set_auto_approve(true);
        exec.execute(&parse_local("set grid to 500 for G1"));
        assert_eq!(changed.load(Ordering::SeqCst), 1);
        assert_eq!(cleared.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn query_reads_values() {
        let mut exec = executor();
        let result = exec.execute(&parse_local("show grid for G2"));
        let Some(QueryResult::Values { rows, .. }) = result.query_result else {
            panic!("expected values");
        };
        assert_eq!(rows.len(), 6);
        assert!(rows.iter().all(|r| r.value == json!(600)));
    }

    #[test]
    fn find_filters_groups() {
        let mut exec = executor();
        exec.set_auto_approve(true);
        exec.execute(&parse_local("set grid to 900 for G3"));
        let result = exec.execute(&parse_local("find groups with grid > 700"));
        let Some(QueryResult::Values { matching_groups, .. }) = result.query_result else {
            panic!("expected values");
        };
        assert_eq!(matching_groups, vec![GroupId::new(3).unwrap()]);
    }

    #[test]
    fn compare_lists_differences() {
        let mut exec = executor();
        exec.set_auto_approve(true);
        exec.execute(&parse_local("set grid to 450 for G2"));
        let result = exec.execute(&parse_local("compare G1 and G2"));
        assert!(result.success);
        let Some(QueryResult::Comparison { rows, identical, .. }) = result.query_result else {
            panic!("expected comparison");
        };
        assert_eq!(rows.len(), 6);
        assert!(rows.iter().all(|r| r.field.as_str() == "grid"));
        assert!(identical > 0);
    }

    #[test]
    fn compare_honours_scope_logics() {
        let mut exec = executor();
        exec.set_auto_approve(true);
        exec.execute(&parse_local("set grid to 450 for G2"));
        exec.set_scope(EditingScope::new().with_logics([LogicRef::named("POWER").unwrap()]));

        let result = exec.execute(&parse_local("compare G1 and G2"));
        let Some(QueryResult::Comparison { rows, .. }) = result.query_result else {
            panic!("expected comparison");
        };
        let keys: Vec<_> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["A/POWER", "B/POWER"]);

        let result = exec.execute(&parse_local("compare A vs B"));
        let Some(QueryResult::Comparison { rows, identical, .. }) = result.query_result else {
            panic!("expected comparison");
        };
        assert!(rows.is_empty());
        assert!(identical > 0);
    }

    #[test]
    fn undo_nothing_is_failure() {
        let mut exec = executor();
        assert!(!exec.undo().unwrap().success);
        assert!(!exec.redo_transaction().unwrap().success);
    }
}
