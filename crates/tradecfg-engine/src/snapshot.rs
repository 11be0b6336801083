//! Snapshot/Version Manager
//!
//! Named, diffed, immutable copies of the document. Snapshots live in one
//! bounded list; branches are named pointers into it.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info};
use ulid::Ulid;

use tradecfg_model::{ConfigDocument, ContentHash};

use crate::error::SnapshotError;
use crate::settings::SnapshotSettings;

/// Branch every manager starts on
pub const MAIN_BRANCH: &str = "main";

const AUTO_COMMIT_MESSAGE: &str = "Auto-save";

/// Kind of difference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Present only after
    Added,
    /// Present on both sides with different values
    Modified,
    /// Present only before
    Removed,
}

/// One differing value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Id-keyed slash path, e.g. `engines/A/groups/1/logics/POWER/grid`
    pub path: String,
    /// Kind
    pub kind: ChangeKind,
    /// Value before
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<JsonValue>,
    /// Value after
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<JsonValue>,
}

/// Snapshot metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Commit time
    pub timestamp: DateTime<Utc>,
    /// Author
    pub author: String,
    /// Message
    pub message: String,
    /// Free-form tags
    pub tags: Vec<String>,
    /// Branch head this snapshot was diffed against
    pub parent_snapshot_id: Option<Ulid>,
    /// Number of change records
    pub change_count: usize,
    /// Engines with changes
    pub affected_engines: Vec<String>,
    /// Groups with changes, as `A/G1`
    pub affected_groups: Vec<String>,
    /// Logics with changes, as `A/G1/POWER`
    pub affected_logics: Vec<String>,
    /// Hash of the stored document
    pub content_hash: ContentHash,
}

/// Immutable document copy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Id
    pub id: Ulid,
    /// Deep copy of the document
    pub config: ConfigDocument,
    /// Metadata
    pub metadata: SnapshotMetadata,
    /// Differences from the parent
    pub changes: Vec<ChangeRecord>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Diff two flattened documents, ordered by path
#[must_use]
pub fn diff(before: &BTreeMap<String, JsonValue>, after: &BTreeMap<String, JsonValue>) -> Vec<ChangeRecord> {
    let paths: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    paths
        .into_iter()
        .filter_map(|path| {
            let (kind, old, new) = match (before.get(path), after.get(path)) {
                (None, Some(new)) => (ChangeKind::Added, None, Some(new)),
                (Some(old), None) => (ChangeKind::Removed, Some(old), None),
                (Some(old), Some(new)) if old != new => (ChangeKind::Modified, Some(old), Some(new)),
                _ => return None,
            };
            Some(ChangeRecord {
                path: path.clone(),
                kind,
                before: old.cloned(),
                after: new.cloned(),
            })
        })
        .collect()
}

/// Engines, groups and logics named by change paths
fn affected(changes: &[ChangeRecord]) -> (Vec<String>, Vec<String>, Vec<String>) {
    let mut engines = IndexSet::new();
    let mut groups = IndexSet::new();
    let mut logics = IndexSet::new();
    for change in changes {
        let segments: Vec<&str> = change.path.split('/').collect();
        if let ["engines", engine, rest @ ..] = segments.as_slice() {
            engines.insert((*engine).to_string());
            if let ["groups", group, rest @ ..] = rest {
                groups.insert(format!("{engine}/G{group}"));
                if let ["logics", logic, ..] = rest {
                    logics.insert(format!("{engine}/G{group}/{logic}"));
                }
            }
        }
    }
    (
        engines.into_iter().collect(),
        groups.into_iter().collect(),
        logics.into_iter().collect(),
    )
}

/// Snapshot store with branches and auto-commit
#[derive(Debug)]
pub struct SnapshotManager {
    settings: SnapshotSettings,
    snapshots: VecDeque<Arc<Snapshot>>,
    branches: IndexMap<String, Option<Ulid>>,
    current_branch: String,
    recording: bool,
    last_activity: Option<DateTime<Utc>>,
}

impl Default for SnapshotManager {
    fn default() -> Self {
        Self::new(SnapshotSettings::default())
    }
}

impl SnapshotManager {
    /// Empty store on the main branch
    #[must_use]
    pub fn new(settings: SnapshotSettings) -> Self {
        let mut branches = IndexMap::new();
        branches.insert(MAIN_BRANCH.to_string(), None);
        Self {
            settings,
            snapshots: VecDeque::new(),
            branches,
            current_branch: MAIN_BRANCH.to_string(),
            recording: false,
            last_activity: None,
        }
    }

    /// Snapshot the document onto the current branch
    pub fn create_snapshot(
        &mut self,
        document: &ConfigDocument,
        message: impl Into<String>,
        author: Option<&str>,
        tags: Vec<String>,
    ) -> Arc<Snapshot> {
        self.commit(document, message.into(), author, tags, Utc::now())
    }

    /// Fresh copy of a snapshot's document
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown or evicted id
    pub fn restore_from_snapshot(&self, id: Ulid) -> Result<ConfigDocument, SnapshotError> {
        let snapshot = self.require(id)?;
        info!(%id, message = %snapshot.metadata.message, "restoring snapshot");
        Ok(snapshot.config.clone())
    }

    /// Differences from `a` to `b`
    ///
    /// # Errors
    /// Returns `NotFound` if either id is unknown
    pub fn compare_snapshots(&self, a: Ulid, b: Ulid) -> Result<Vec<ChangeRecord>, SnapshotError> {
        let (a, b) = (self.require(a)?, self.require(b)?);
        Ok(diff(&a.config.flatten(), &b.config.flatten()))
    }

    /// Create a branch at `from`, or at the current head
    ///
    /// # Errors
    /// Returns error if the name is empty or taken, or `from` is unknown
    pub fn create_branch(&mut self, name: &str, from: Option<Ulid>) -> Result<(), SnapshotError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SnapshotError::InvalidBranchName);
        }
        if self.branches.contains_key(name) {
            return Err(SnapshotError::BranchExists(name.to_string()));
        }
        let head = match from {
            Some(id) => Some(self.require(id)?.id),
            None => self.head_id(),
        };
        self.branches.insert(name.to_string(), head);
        info!(branch = name, head = ?head, "branch created");
        Ok(())
    }

    /// Make `name` the current branch; returns its head
    ///
    /// # Errors
    /// Returns `BranchNotFound` for an unknown name
    pub fn switch_branch(&mut self, name: &str) -> Result<Option<Arc<Snapshot>>, SnapshotError> {
        let head = *self
            .branches
            .get(name)
            .ok_or_else(|| SnapshotError::BranchNotFound(name.to_string()))?;
        self.current_branch = name.to_string();
        info!(branch = name, "switched branch");
        Ok(head.and_then(|id| self.get(id)))
    }

    /// Branch names with their heads, in creation order
    #[must_use]
    pub fn branches(&self) -> Vec<(&str, Option<Ulid>)> {
        self.branches
            .iter()
            .map(|(name, head)| (name.as_str(), *head))
            .collect()
    }

    /// Current branch name
    #[inline]
    #[must_use]
    pub fn current_branch(&self) -> &str {
        &self.current_branch
    }

    /// Begin auto-commit tracking
    pub fn start_recording(&mut self, now: DateTime<Utc>) {
        self.recording = true;
        self.last_activity = Some(now);
    }

    /// Note document activity; restarts the idle clock
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = Some(now);
    }

    /// Stop auto-commit tracking
    pub fn stop_recording(&mut self) {
        self.recording = false;
    }

    /// Check whether auto-commit tracking is on
    #[inline]
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Snapshot the document if recording and idle long enough
    ///
    /// Nothing is stored when the document matches the current head.
    pub fn maybe_auto_commit(
        &mut self,
        document: &ConfigDocument,
        now: DateTime<Utc>,
    ) -> Option<Arc<Snapshot>> {
        if !self.recording {
            return None;
        }
        let idle_secs = i64::try_from(self.settings.auto_commit_idle_secs).unwrap_or(i64::MAX);
        let idle = TimeDelta::try_seconds(idle_secs).unwrap_or_else(|| TimeDelta::days(365));
        let last = self.last_activity?;
        if now.signed_duration_since(last) <= idle {
            return None;
        }
        let head_hash = self.head().map(|s| s.metadata.content_hash);
        if head_hash == Some(document.content_hash()) {
            debug!("auto-commit skipped, document unchanged");
            self.last_activity = Some(now);
            return None;
        }
        let author = self.settings.default_author.clone();
        Some(self.commit(
            document,
            AUTO_COMMIT_MESSAGE.to_string(),
            Some(&author),
            vec!["auto".to_string()],
            now,
        ))
    }

    /// Snapshot by id
    #[must_use]
    pub fn get(&self, id: Ulid) -> Option<Arc<Snapshot>> {
        self.snapshots.iter().find(|s| s.id == id).cloned()
    }

    /// All stored snapshots, oldest first
    #[must_use]
    pub fn list(&self) -> Vec<Arc<Snapshot>> {
        self.snapshots.iter().cloned().collect()
    }

    /// Most recently created snapshot
    #[must_use]
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.snapshots.back().cloned()
    }

    /// Head of the current branch
    #[must_use]
    pub fn head(&self) -> Option<Arc<Snapshot>> {
        self.head_id().and_then(|id| self.get(id))
    }

    fn head_id(&self) -> Option<Ulid> {
        self.branches.get(&self.current_branch).copied().flatten()
    }

    fn require(&self, id: Ulid) -> Result<Arc<Snapshot>, SnapshotError> {
        self.get(id).ok_or_else(|| SnapshotError::NotFound(id.to_string()))
    }

    fn commit(
        &mut self,
        document: &ConfigDocument,
        message: String,
        author: Option<&str>,
        tags: Vec<String>,
        now: DateTime<Utc>,
    ) -> Arc<Snapshot> {
        let parent = self.head();
        let previous = parent
            .as_ref()
            .map(|p| p.config.flatten())
            .unwrap_or_default();
        let changes = diff(&previous, &document.flatten());
        let (affected_engines, affected_groups, affected_logics) = affected(&changes);

        let snapshot = Arc::new(Snapshot {
            id: Ulid::new(),
            config: document.clone(),
            metadata: SnapshotMetadata {
                timestamp: now,
                author: author.unwrap_or(&self.settings.default_author).to_string(),
                message,
                tags,
                parent_snapshot_id: parent.map(|p| p.id),
                change_count: changes.len(),
                affected_engines,
                affected_groups,
                affected_logics,
                content_hash: document.content_hash(),
            },
            changes,
            created_at: now,
        });

        self.snapshots.push_back(Arc::clone(&snapshot));
        while self.snapshots.len() > self.settings.max_snapshots.max(1) {
            if let Some(evicted) = self.snapshots.pop_front() {
                debug!(id = %evicted.id, "snapshot evicted");
            }
        }
        self.branches
            .insert(self.current_branch.clone(), Some(snapshot.id));
        self.last_activity = Some(now);

        info!(
            id = %snapshot.id,
            branch = %self.current_branch,
            changes = snapshot.metadata.change_count,
            message = %snapshot.metadata.message,
            "snapshot created"
        );
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tradecfg_test_utils::{leaf, sample_document, single_logic_document};

    #[test]
    fn first_snapshot_diffs_against_nothing() {
        let mut store = SnapshotManager::default();
        let doc = single_logic_document();
        let snap = store.create_snapshot(&doc, "initial", None, vec![]);
        assert!(snap.changes.iter().all(|c| c.kind == ChangeKind::Added));
        assert_eq!(snap.metadata.author, "trader");
        assert_eq!(snap.metadata.parent_snapshot_id, None);
        assert_eq!(snap.metadata.affected_logics, vec!["A/G1/POWER".to_string()]);
    }

    #[test]
    fn later_snapshot_records_modifications() {
        let mut store = SnapshotManager::default();
        let mut doc = sample_document();
        let first = store.create_snapshot(&doc, "before", Some("alice"), vec![]);
        doc.set(&leaf("B", 2, "SCALPER", "grid"), json!(450)).unwrap();
        let second = store.create_snapshot(&doc, "after", Some("alice"), vec!["tuning".into()]);

        assert_eq!(second.metadata.parent_snapshot_id, Some(first.id));
        assert_eq!(
            second.changes,
            vec![ChangeRecord {
                path: "engines/B/groups/2/logics/SCALPER/grid".into(),
                kind: ChangeKind::Modified,
                before: Some(json!(600)),
                after: Some(json!(450)),
            }]
        );
        assert_eq!(second.metadata.affected_engines, vec!["B".to_string()]);
        assert_eq!(second.metadata.affected_groups, vec!["B/G2".to_string()]);
    }

    #[test]
    fn snapshot_is_isolated_from_later_edits() {
        let mut store = SnapshotManager::default();
        let mut doc = sample_document();
        let snap = store.create_snapshot(&doc, "v1", None, vec![]);
        doc.set(&leaf("A", 1, "POWER", "grid"), json!(100)).unwrap();
        let restored = store.restore_from_snapshot(snap.id).unwrap();
        assert_eq!(restored.get(&leaf("A", 1, "POWER", "grid")), Some(&json!(600)));
    }

    #[test]
    fn oldest_snapshot_is_evicted() {
        let mut store = SnapshotManager::new(SnapshotSettings {
            max_snapshots: 2,
            ..SnapshotSettings::default()
        });
        let doc = single_logic_document();
        let first = store.create_snapshot(&doc, "1", None, vec![]);
        store.create_snapshot(&doc, "2", None, vec![]);
        store.create_snapshot(&doc, "3", None, vec![]);
        assert_eq!(store.list().len(), 2);
        assert!(matches!(
            store.restore_from_snapshot(first.id),
            Err(SnapshotError::NotFound(_))
        ));
        assert_eq!(store.latest().unwrap().metadata.message, "3");
    }

    #[test]
    fn branches_track_their_own_heads() {
        let mut store = SnapshotManager::default();
        let mut doc = single_logic_document();
        let base = store.create_snapshot(&doc, "base", None, vec![]);
        store.create_branch("experiment", None).unwrap();
        assert_eq!(
            store.create_branch("experiment", None),
            Err(SnapshotError::BranchExists("experiment".into()))
        );

        store.switch_branch("experiment").unwrap();
        doc.set(&leaf("A", 1, "POWER", "grid"), json!(300)).unwrap();
        let tip = store.create_snapshot(&doc, "tighter grid", None, vec![]);
        assert_eq!(tip.metadata.parent_snapshot_id, Some(base.id));

        let main_head = store.switch_branch(MAIN_BRANCH).unwrap().unwrap();
        assert_eq!(main_head.id, base.id);
        assert_eq!(store.compare_snapshots(base.id, tip.id).unwrap().len(), 1);
        assert_eq!(
            store.branches(),
            vec![(MAIN_BRANCH, Some(base.id)), ("experiment", Some(tip.id))]
        );
        assert!(matches!(
            store.switch_branch("nope"),
            Err(SnapshotError::BranchNotFound(_))
        ));
    }

    #[test]
    fn auto_commit_waits_for_idle_and_changes() {
        let mut store = SnapshotManager::default();
        let mut doc = single_logic_document();
        let start = Utc::now();
        assert!(store.maybe_auto_commit(&doc, start).is_none());

        store.start_recording(start);
        assert!(store
            .maybe_auto_commit(&doc, start + TimeDelta::seconds(60))
            .is_none());
        let snap = store
            .maybe_auto_commit(&doc, start + TimeDelta::seconds(301))
            .unwrap();
        assert_eq!(snap.metadata.tags, vec!["auto".to_string()]);

        // unchanged document: nothing new
        assert!(store
            .maybe_auto_commit(&doc, start + TimeDelta::seconds(700))
            .is_none());

        doc.set(&leaf("A", 1, "POWER", "grid"), json!(450)).unwrap();
        assert!(store
            .maybe_auto_commit(&doc, start + TimeDelta::seconds(1_100))
            .is_some());
        store.stop_recording();
        assert!(!store.is_recording());
    }

    #[test]
    fn touch_restarts_idle_clock() {
        let mut store = SnapshotManager::default();
        let start = Utc::now();
        store.start_recording(start);
        store.touch(start + TimeDelta::seconds(200));
        assert!(store
            .maybe_auto_commit(&sample_document(), start + TimeDelta::seconds(400))
            .is_none());
        assert!(store
            .maybe_auto_commit(&sample_document(), start + TimeDelta::seconds(501))
            .is_some());
    }
}
