//! Undo/Redo Manager
//!
//! Bounded per-context undo and redo stacks of [`ChangeOperation`]s.
//!
//! # Core Concepts
//!
//! - **Debounced merge**: an edit of a leaf already edited within the
//!   trailing burst (`debounce_ms`) updates that operation in place, keeping
//!   its original `before`
//! - **Transactions**: operations recorded by one applied plan share a
//!   transaction id and can be undone as one step
//! - **Replay guard**: undo, redo and selective undo hand back a
//!   [`ReplayGuard`]; while one is alive further replays fail with `Busy`

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info};
use ulid::Ulid;

use tradecfg_model::{EngineId, FieldName, GroupId, LeafPath};

use crate::error::HistoryError;
use crate::settings::{HistorySettings, DEFAULT_CONTEXT};

/// What an operation did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Node created
    Create,
    /// Value changed
    Update,
    /// Node removed
    Delete,
    /// Node moved
    Move,
    /// Group-wide change
    GroupUpdate,
}

/// Node an operation touched
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationTarget {
    /// Engine
    pub engine_id: EngineId,
    /// Group, if narrower than the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    /// Logic, if narrower than the group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic_name: Option<String>,
    /// Field, if a single value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<FieldName>,
}

impl OperationTarget {
    /// Target naming one leaf
    #[must_use]
    pub fn leaf(leaf: &LeafPath) -> Self {
        Self {
            engine_id: leaf.engine.clone(),
            group_id: Some(leaf.group),
            logic_name: Some(leaf.logic.clone()),
            parameter: Some(leaf.field.clone()),
        }
    }

    /// Leaf path, when the target names a single value
    #[must_use]
    pub fn to_leaf(&self) -> Option<LeafPath> {
        Some(LeafPath::new(
            self.engine_id.clone(),
            self.group_id?,
            self.logic_name.as_ref()?,
            self.parameter.clone()?,
        ))
    }
}

/// One recorded, reversible change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeOperation {
    /// Operation id
    pub id: Ulid,
    /// Kind
    pub kind: OperationKind,
    /// Touched node
    pub target: OperationTarget,
    /// Value before
    pub before: JsonValue,
    /// Value after
    pub after: JsonValue,
    /// When recorded (or last merged)
    pub timestamp: DateTime<Utc>,
    /// Summary
    pub description: String,
    /// Plan that produced it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<Ulid>,
}

impl ChangeOperation {
    /// New operation stamped now
    #[must_use]
    pub fn new(kind: OperationKind, target: OperationTarget, before: JsonValue, after: JsonValue) -> Self {
        Self {
            id: Ulid::new(),
            kind,
            target,
            before,
            after,
            timestamp: Utc::now(),
            description: String::new(),
            transaction_id: None,
        }
    }

    /// Value update of one leaf
    #[must_use]
    pub fn update(leaf: &LeafPath, before: JsonValue, after: JsonValue) -> Self {
        Self::new(OperationKind::Update, OperationTarget::leaf(leaf), before, after)
    }

    /// With timestamp
    #[inline]
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With transaction id
    #[inline]
    #[must_use]
    pub fn with_transaction(mut self, transaction_id: Ulid) -> Self {
        self.transaction_id = Some(transaction_id);
        self
    }

    /// Operation that reverts this one
    #[must_use]
    pub fn inverse(&self) -> Self {
        Self {
            before: self.after.clone(),
            after: self.before.clone(),
            ..self.clone()
        }
    }

    fn merges_with(&self, other: &Self) -> bool {
        self.kind == other.kind && self.target == other.target
    }
}

/// Replay direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayDirection {
    /// Restore `before` values
    Undo,
    /// Restore `after` values
    Redo,
}

/// Operations to replay; holds the manager's replay lock until dropped
#[derive(Debug)]
#[must_use = "the replay lock is released when the guard drops"]
pub struct ReplayGuard {
    lock: Arc<AtomicBool>,
    direction: ReplayDirection,
    operations: Vec<ChangeOperation>,
}

impl ReplayGuard {
    /// Replay direction
    #[inline]
    pub fn direction(&self) -> ReplayDirection {
        self.direction
    }

    /// Operations moved, in the order they must be replayed
    #[inline]
    pub fn operations(&self) -> &[ChangeOperation] {
        &self.operations
    }

    /// Inverse operations (for undo) or the originals (for redo)
    pub fn effective(&self) -> Vec<ChangeOperation> {
        match self.direction {
            ReplayDirection::Undo => self.operations.iter().map(ChangeOperation::inverse).collect(),
            ReplayDirection::Redo => self.operations.clone(),
        }
    }

    /// Value to write per target, in replay order
    pub fn writes(&self) -> impl Iterator<Item = (&OperationTarget, &JsonValue)> {
        self.operations.iter().map(move |op| {
            let value = match self.direction {
                ReplayDirection::Undo => &op.before,
                ReplayDirection::Redo => &op.after,
            };
            (&op.target, value)
        })
    }
}

impl Drop for ReplayGuard {
    fn drop(&mut self) {
        self.lock.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct Stacks {
    undo: VecDeque<ChangeOperation>,
    redo: VecDeque<ChangeOperation>,
}

/// Per-context undo/redo history
#[derive(Debug)]
pub struct UndoRedoManager {
    contexts: HashMap<String, Stacks>,
    context: String,
    max_stack_size: usize,
    debounce: TimeDelta,
    replaying: Arc<AtomicBool>,
}

impl Default for UndoRedoManager {
    fn default() -> Self {
        Self::new(HistorySettings::default())
    }
}

impl UndoRedoManager {
    /// Manager recording into the default context
    #[must_use]
    pub fn new(settings: HistorySettings) -> Self {
        let debounce_ms = i64::try_from(settings.debounce_ms).unwrap_or(i64::MAX);
        Self {
            contexts: HashMap::new(),
            context: DEFAULT_CONTEXT.to_string(),
            max_stack_size: settings.max_stack_size.max(1),
            debounce: TimeDelta::try_milliseconds(debounce_ms)
                .unwrap_or_else(|| TimeDelta::days(365)),
            replaying: Arc::new(AtomicBool::new(false)),
        }
    }

    /// With active context
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Switch the active context
    pub fn set_context(&mut self, context: impl Into<String>) {
        self.context = context.into();
    }

    /// Active context
    #[inline]
    #[must_use]
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Record an operation
    ///
    /// Returns `true` if it was merged into an operation already on the
    /// stack.
    pub fn add_operation(&mut self, operation: ChangeOperation) -> bool {
        let debounce = self.debounce;
        let max = self.max_stack_size;
        let stacks = self.contexts.entry(self.context.clone()).or_default();
        stacks.redo.clear();

        for existing in stacks.undo.iter_mut().rev() {
            let gap = operation.timestamp.signed_duration_since(existing.timestamp);
            if gap > debounce || gap < -debounce {
                break;
            }
            if existing.merges_with(&operation) {
                debug!(id = %existing.id, target = ?existing.target, "merged debounced edit");
                existing.after = operation.after;
                existing.timestamp = operation.timestamp;
                return true;
            }
        }

        stacks.undo.push_back(operation);
        while stacks.undo.len() > max {
            stacks.undo.pop_front();
        }
        false
    }

    /// Undo the most recent operation
    ///
    /// # Errors
    /// Returns `Busy` while another replay guard is alive
    pub fn undo(&mut self) -> Result<Option<ReplayGuard>, HistoryError> {
        self.replay(ReplayDirection::Undo, false)
    }

    /// Redo the most recently undone operation
    ///
    /// # Errors
    /// Returns `Busy` while another replay guard is alive
    pub fn redo(&mut self) -> Result<Option<ReplayGuard>, HistoryError> {
        self.replay(ReplayDirection::Redo, false)
    }

    /// Undo every top operation sharing the top operation's transaction
    ///
    /// # Errors
    /// Returns `Busy` while another replay guard is alive
    pub fn undo_transaction(&mut self) -> Result<Option<ReplayGuard>, HistoryError> {
        self.replay(ReplayDirection::Undo, true)
    }

    /// Redo every top operation sharing the top operation's transaction
    ///
    /// # Errors
    /// Returns `Busy` while another replay guard is alive
    pub fn redo_transaction(&mut self) -> Result<Option<ReplayGuard>, HistoryError> {
        self.replay(ReplayDirection::Redo, true)
    }

    /// Undo specific operations wherever they sit on the undo stack
    ///
    /// All ids are validated before anything moves. The removed operations
    /// are returned newest first; the redo stack is cleared.
    ///
    /// # Errors
    /// Returns `Busy` while another replay guard is alive, or
    /// `UnknownOperation` if an id is not on the undo stack
    pub fn selective_undo(&mut self, ids: &[Ulid]) -> Result<ReplayGuard, HistoryError> {
        self.lock()?;
        let stacks = self.contexts.entry(self.context.clone()).or_default();
        if let Some(missing) = ids
            .iter()
            .find(|id| !stacks.undo.iter().any(|op| op.id == **id))
        {
            self.replaying.store(false, Ordering::Release);
            return Err(HistoryError::UnknownOperation(missing.to_string()));
        }

        let wanted: HashSet<Ulid> = ids.iter().copied().collect();
        let mut removed = Vec::new();
        stacks.undo.retain(|op| {
            if wanted.contains(&op.id) {
                removed.push(op.clone());
                false
            } else {
                true
            }
        });
        removed.reverse();
        stacks.redo.clear();
        info!(count = removed.len(), "selective undo");
        Ok(self.guard(ReplayDirection::Undo, removed))
    }

    /// Check if undo is possible
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.undo_len() > 0
    }

    /// Check if redo is possible
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.redo_len() > 0
    }

    /// Undo stack depth in the active context
    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.contexts.get(&self.context).map_or(0, |s| s.undo.len())
    }

    /// Redo stack depth in the active context
    #[must_use]
    pub fn redo_len(&self) -> usize {
        self.contexts.get(&self.context).map_or(0, |s| s.redo.len())
    }

    /// Undo stack of a context, oldest first
    #[must_use]
    pub fn history(&self, context: &str) -> Vec<&ChangeOperation> {
        self.contexts
            .get(context)
            .map(|s| s.undo.iter().collect())
            .unwrap_or_default()
    }

    /// Drop both stacks of a context
    pub fn clear(&mut self, context: &str) {
        self.contexts.remove(context);
    }

    fn lock(&self) -> Result<(), HistoryError> {
        self.replaying
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| HistoryError::Busy)
    }

    fn guard(&self, direction: ReplayDirection, operations: Vec<ChangeOperation>) -> ReplayGuard {
        ReplayGuard {
            lock: Arc::clone(&self.replaying),
            direction,
            operations,
        }
    }

    fn replay(
        &mut self,
        direction: ReplayDirection,
        whole_transaction: bool,
    ) -> Result<Option<ReplayGuard>, HistoryError> {
        self.lock()?;
        let stacks = self.contexts.entry(self.context.clone()).or_default();
        let (from, to) = match direction {
            ReplayDirection::Undo => (&mut stacks.undo, &mut stacks.redo),
            ReplayDirection::Redo => (&mut stacks.redo, &mut stacks.undo),
        };

        let Some(first) = from.pop_back() else {
            self.replaying.store(false, Ordering::Release);
            return Ok(None);
        };
        let transaction = first.transaction_id;
        let mut moved = vec![first];
        if whole_transaction && transaction.is_some() {
            while from
                .back()
                .is_some_and(|op| op.transaction_id == transaction)
            {
                if let Some(op) = from.pop_back() {
                    moved.push(op);
                }
            }
        }

        // pushed in replay order, so the opposite replay pops them reversed
        to.extend(moved.iter().cloned());
        while to.len() > self.max_stack_size {
            to.pop_front();
        }

        info!(?direction, count = moved.len(), "history replay");
        Ok(Some(self.guard(direction, moved)))
    }
}
