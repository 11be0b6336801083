//! Engine settings
//!
//! Loaded from TOML; every section and key is optional.
//!
//! ```toml
//! auto_approve = false
//! context = "global"
//!
//! [history]
//! max_stack_size = 100
//! debounce_ms = 500
//!
//! [router]
//! endpoint = "http://127.0.0.1:8787/route"
//! timeout_ms = 1500
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// Default history context
pub const DEFAULT_CONTEXT: &str = "global";

/// Top-level engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    /// Apply plans without asking for confirmation
    pub auto_approve: bool,
    /// Editing context the history records into
    pub context: String,
    /// Undo/redo limits
    pub history: HistorySettings,
    /// Snapshot store limits
    pub snapshots: SnapshotSettings,
    /// Risk thresholds
    pub risk: RiskSettings,
    /// External command router
    pub router: RouterSettings,
}

impl EngineSettings {
    /// Default settings
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With auto-approve
    #[inline]
    #[must_use]
    pub fn with_auto_approve(mut self, auto_approve: bool) -> Self {
        self.auto_approve = auto_approve;
        self
    }

    /// With history context
    #[inline]
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// With history limits
    #[inline]
    #[must_use]
    pub fn with_history(mut self, history: HistorySettings) -> Self {
        self.history = history;
        self
    }

    /// With snapshot limits
    #[inline]
    #[must_use]
    pub fn with_snapshots(mut self, snapshots: SnapshotSettings) -> Self {
        self.snapshots = snapshots;
        self
    }

    /// With risk thresholds
    #[inline]
    #[must_use]
    pub fn with_risk(mut self, risk: RiskSettings) -> Self {
        self.risk = risk;
        self
    }

    /// With router settings
    #[inline]
    #[must_use]
    pub fn with_router(mut self, router: RouterSettings) -> Self {
        self.router = router;
        self
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// Returns error on malformed TOML, unknown keys or invalid values
    pub fn from_toml_str(text: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Serialize to TOML
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_toml_string(&self) -> Result<String, SettingsError> {
        toml::to_string_pretty(self).map_err(|e| SettingsError::Serialize(e.to_string()))
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.context.trim().is_empty() {
            return Err(SettingsError::Invalid("context must not be empty".into()));
        }
        if self.history.max_stack_size == 0 {
            return Err(SettingsError::Invalid(
                "history.max_stack_size must be at least 1".into(),
            ));
        }
        if self.snapshots.max_snapshots == 0 {
            return Err(SettingsError::Invalid(
                "snapshots.max_snapshots must be at least 1".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.risk.max_safe_cut_percent) {
            return Err(SettingsError::Invalid(
                "risk.max_safe_cut_percent must be within 0-100".into(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            auto_approve: false,
            context: DEFAULT_CONTEXT.to_string(),
            history: HistorySettings::default(),
            snapshots: SnapshotSettings::default(),
            risk: RiskSettings::default(),
            router: RouterSettings::default(),
        }
    }
}

/// Undo/redo limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistorySettings {
    /// Operations kept per stack
    pub max_stack_size: usize,
    /// Window for merging repeated edits of one leaf
    pub debounce_ms: u64,
}

impl HistorySettings {
    /// Debounce window as a duration
    #[inline]
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            max_stack_size: 100,
            debounce_ms: 500,
        }
    }
}

/// Snapshot store limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SnapshotSettings {
    /// Snapshots kept before the oldest is evicted
    pub max_snapshots: usize,
    /// Idle seconds before an auto-commit
    pub auto_commit_idle_secs: u64,
    /// Author recorded on auto-commits
    pub default_author: String,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            max_snapshots: 50,
            auto_commit_idle_secs: 300,
            default_author: "trader".to_string(),
        }
    }
}

/// Thresholds used by risk scoring
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskSettings {
    /// Grid below this is tightening
    pub min_safe_grid: f64,
    /// Trail start below this is tightening
    pub min_safe_trail_start: f64,
    /// A safety field cut by more than this percentage is tightening
    pub max_safe_cut_percent: f64,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            min_safe_grid: 200.0,
            min_safe_trail_start: 100.0,
            max_safe_cut_percent: 30.0,
        }
    }
}

/// External router settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterSettings {
    /// Router URL; local parsing only when absent
    pub endpoint: Option<String>,
    /// Deadline per routing call
    pub timeout_ms: u64,
}

impl RouterSettings {
    /// Deadline as a duration
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: 1500,
        }
    }
}
