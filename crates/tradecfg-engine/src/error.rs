//! Error types for the engine
//!
//! - plan construction against a document
//! - undo/redo history misuse
//! - snapshot lookup and branching
//! - settings loading

use tradecfg_command::ScopeConflict;
use tradecfg_model::DocumentError;

/// Umbrella engine error
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Plan could not be built
    #[error("plan failed: {0}")]
    Plan(#[from] PlanError),

    /// History misuse
    #[error("history error: {0}")]
    History(#[from] HistoryError),

    /// Snapshot failure
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Scope could not be resolved
    #[error(transparent)]
    Scope(#[from] ScopeConflict),

    /// Document access failed
    #[error("document error: {0}")]
    Document(#[from] DocumentError),
}

impl EngineError {
    /// Check if the error is a concurrent replay attempt
    #[inline]
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::History(HistoryError::Busy))
    }
}

/// Transaction planning errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    /// Command carries no operations to plan
    #[error("nothing to plan for {0} command")]
    NoOperations(String),

    /// A required command parameter is absent or malformed
    #[error("missing or invalid parameter '{0}'")]
    MissingParameter(String),

    /// Copy source does not exist in the document
    #[error("copy source {0} not found")]
    SourceNotFound(String),

    /// Progression needs at least one group to spread over
    #[error("progression needs at least one target group")]
    NoGroups,
}

/// Undo/redo errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// A replay guard is still alive
    #[error("undo/redo already in progress")]
    Busy,

    /// Selective undo named an id not on the undo stack
    #[error("operation {0} is not on the undo stack")]
    UnknownOperation(String),
}

/// Snapshot errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    /// No snapshot with that id
    #[error("snapshot {0} not found")]
    NotFound(String),

    /// No branch with that name
    #[error("branch '{0}' not found")]
    BranchNotFound(String),

    /// Branch name already taken
    #[error("branch '{0}' already exists")]
    BranchExists(String),

    /// Branch name is empty
    #[error("branch name must not be empty")]
    InvalidBranchName,
}

/// Settings errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// File could not be read
    #[error("cannot read settings file {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// TOML is malformed or has unknown keys
    #[error("invalid settings: {0}")]
    Parse(#[from] toml::de::Error),

    /// Value out of range
    #[error("invalid settings: {0}")]
    Invalid(String),

    /// Serialization failed
    #[error("cannot serialize settings: {0}")]
    Serialize(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_is_detected() {
        assert!(EngineError::from(HistoryError::Busy).is_busy());
        assert!(!EngineError::from(PlanError::NoGroups).is_busy());
    }

    #[test]
    fn scope_conflict_message_is_kept() {
        let err = EngineError::from(ScopeConflict::GroupOneExclusive);
        assert!(err.to_string().starts_with("Group 1"));
    }
}
