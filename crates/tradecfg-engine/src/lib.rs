//! tradecfg engine
//!
//! Turns parsed commands into previewed, confirmable and reversible edits
//! of a configuration document.
//!
//! # Core Concepts
//!
//! - **TransactionPlan**: clamped before/after preview with a risk score
//! - **CommandExecutor**: owns the live document; plans, holds one pending
//!   plan, applies it exactly once
//! - **UndoRedoManager**: per-context history with debounced merging and
//!   selective undo
//! - **SnapshotManager**: immutable, diffed document copies with branches
//!
//! # Example
//!
//! ```rust,ignore
//! let mut executor = CommandExecutor::new(document);
//! let result = executor.execute(&parse_local("set grid to 500 for G1"));
//! if result.needs_confirmation() {
//!     executor.confirm();
//! }
//! executor.undo_transaction()?;
//! ```

#![warn(unreachable_pub)]

mod error;
mod executor;
mod history;
mod planner;
mod risk;
mod settings;
mod snapshot;

pub use error::{EngineError, HistoryError, PlanError, SettingsError, SnapshotError};
pub use executor::{
    AppliedChange, ClearSelectionCallback, CommandExecutor, CommandResult, ComparisonRow,
    ConfigChangedCallback, FailedLeaf, QueryResult, ValueRow,
};
pub use history::{
    ChangeOperation, OperationKind, OperationTarget, ReplayDirection, ReplayGuard,
    UndoRedoManager,
};
pub use planner::{
    select_logics, ChangePreview, ProgressionKind, SkippedLeaf, TransactionPlan,
    TransactionPlanner,
};
pub use risk::{RiskAssessment, RiskLevel};
pub use settings::{
    EngineSettings, HistorySettings, RiskSettings, RouterSettings, SnapshotSettings,
    DEFAULT_CONTEXT,
};
pub use snapshot::{
    diff, ChangeKind, ChangeRecord, Snapshot, SnapshotManager, SnapshotMetadata, MAIN_BRANCH,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
