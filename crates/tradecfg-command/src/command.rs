//! Command data model
//!
//! Everything the parser produces and the executor consumes: [`Command`],
//! its [`Target`], the per-field [`FieldOperation`]s and the notices that
//! travel alongside a parse.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tradecfg_model::fields::number_value;
use tradecfg_model::{EngineId, FieldName, GroupId, LogicRef};

/// Hint returned for input nothing understands
pub const FORMAT_HINT: &str =
    "Unknown command. Try: 'set grid to 500 for G1', 'add 30% to grid for G1', 'show lot for POWER'";

/// Kind of parsed command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Set / scale / shift a field
    Set,
    /// Spread values across groups
    Progression,
    /// Copy values from one group or engine to others
    Copy,
    /// Side-by-side comparison (read-only)
    Compare,
    /// Restore registry defaults
    Reset,
    /// Read values (read-only)
    Query,
    /// Matched by a semantic rule
    Semantic,
    /// Not understood
    Unknown,
}

impl CommandKind {
    /// Check if the command never mutates the document
    #[inline]
    #[must_use]
    pub const fn is_read_only(self) -> bool {
        matches!(self, Self::Query | Self::Compare)
    }
}

impl Display for CommandKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Set => "set",
            Self::Progression => "progression",
            Self::Copy => "copy",
            Self::Compare => "compare",
            Self::Reset => "reset",
            Self::Query => "query",
            Self::Semantic => "semantic",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Addressed subset of the configuration
///
/// `None` in a dimension means unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Engines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engines: Option<IndexSet<EngineId>>,
    /// Groups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<IndexSet<GroupId>>,
    /// Logics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logics: Option<IndexSet<LogicRef>>,
    /// Fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<IndexSet<FieldName>>,
}

impl Target {
    /// Unconstrained target
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrain engines
    #[must_use]
    pub fn with_engines(mut self, engines: impl IntoIterator<Item = EngineId>) -> Self {
        self.engines = Some(engines.into_iter().collect());
        self
    }

    /// Constrain groups
    #[must_use]
    pub fn with_groups(mut self, groups: impl IntoIterator<Item = GroupId>) -> Self {
        self.groups = Some(groups.into_iter().collect());
        self
    }

    /// Constrain logics
    #[must_use]
    pub fn with_logics(mut self, logics: impl IntoIterator<Item = LogicRef>) -> Self {
        self.logics = Some(logics.into_iter().collect());
        self
    }

    /// Constrain fields
    #[must_use]
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldName>) -> Self {
        self.fields = Some(fields.into_iter().collect());
        self
    }

    /// Check if no dimension is constrained
    #[inline]
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        self.engines.is_none() && self.groups.is_none() && self.logics.is_none() && self.fields.is_none()
    }

    /// Single field, if exactly one is targeted
    #[must_use]
    pub fn single_field(&self) -> Option<&FieldName> {
        match &self.fields {
            Some(fields) if fields.len() == 1 => fields.first(),
            _ => None,
        }
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        fn join<T: Display>(items: &IndexSet<T>) -> String {
            items.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
        }
        let mut parts = Vec::new();
        if let Some(engines) = &self.engines {
            parts.push(format!("engines={}", join(engines)));
        }
        if let Some(groups) = &self.groups {
            parts.push(format!("groups={}", join(groups)));
        }
        if let Some(logics) = &self.logics {
            parts.push(format!("logics={}", join(logics)));
        }
        if let Some(fields) = &self.fields {
            parts.push(format!("fields={}", join(fields)));
        }
        if parts.is_empty() {
            f.write_str("everything")
        } else {
            f.write_str(&parts.join(" "))
        }
    }
}

/// Literal value carried by a set operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Numeric value
    Number(f64),
    /// Flag value
    Bool(bool),
    /// Text value
    Text(String),
}

impl FieldValue {
    /// Convert to a document value
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Number(n) => number_value(*n),
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Text(s) => JsonValue::String(s.clone()),
        }
    }

    /// Numeric view
    #[inline]
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Arithmetic applied by a [`FieldOperation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    /// Multiply by `factor`
    Scale,
    /// Replace with `value`
    Set,
    /// Add `value`
    Add,
    /// Subtract `value`
    Subtract,
}

/// One field mutation, independent of where it is applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOperation {
    /// Field to mutate
    pub field: FieldName,
    /// Operation
    pub op: OpKind,
    /// Multiplier for [`OpKind::Scale`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor: Option<f64>,
    /// Operand for set / add / subtract
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<FieldValue>,
}

impl FieldOperation {
    /// `field *= factor`
    #[must_use]
    pub fn scale(field: impl Into<FieldName>, factor: f64) -> Self {
        Self {
            field: field.into(),
            op: OpKind::Scale,
            factor: Some(factor),
            value: None,
        }
    }

    /// `field = value`
    #[must_use]
    pub fn set(field: impl Into<FieldName>, value: FieldValue) -> Self {
        Self {
            field: field.into(),
            op: OpKind::Set,
            factor: None,
            value: Some(value),
        }
    }

    /// `field += amount`
    #[must_use]
    pub fn add(field: impl Into<FieldName>, amount: f64) -> Self {
        Self {
            field: field.into(),
            op: OpKind::Add,
            factor: None,
            value: Some(FieldValue::Number(amount)),
        }
    }

    /// `field -= amount`
    #[must_use]
    pub fn subtract(field: impl Into<FieldName>, amount: f64) -> Self {
        Self {
            field: field.into(),
            op: OpKind::Subtract,
            factor: None,
            value: Some(FieldValue::Number(amount)),
        }
    }

    /// Apply to a current value, before clamping
    ///
    /// Returns `None` when the operation does not apply: arithmetic on a
    /// non-numeric value, or a missing operand.
    #[must_use]
    pub fn apply(&self, current: &JsonValue) -> Option<JsonValue> {
        match self.op {
            OpKind::Set => self.value.as_ref().map(FieldValue::to_json),
            OpKind::Scale => {
                let current = current.as_f64()?;
                Some(number_value(current * self.factor?))
            }
            OpKind::Add | OpKind::Subtract => {
                let current = current.as_f64()?;
                let amount = self.value.as_ref()?.as_f64()?;
                let next = if self.op == OpKind::Add {
                    current + amount
                } else {
                    current - amount
                };
                Some(number_value(next))
            }
        }
    }
}

impl Display for FieldOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match (self.op, self.factor, &self.value) {
            (OpKind::Scale, Some(factor), _) => write!(f, "{} ×{factor}", self.field),
            (OpKind::Set, _, Some(value)) => write!(f, "{} = {value}", self.field),
            (OpKind::Add, _, Some(value)) => write!(f, "{} +{value}", self.field),
            (OpKind::Subtract, _, Some(value)) => write!(f, "{} -{value}", self.field),
            _ => write!(f, "{} (incomplete)", self.field),
        }
    }
}

/// Output of a semantic rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticCommand {
    /// Name of the rule that matched
    pub rule: String,
    /// Operations to apply to every targeted logic
    pub operations: Vec<FieldOperation>,
    /// Human-readable summary
    pub description: String,
    /// One line per operation
    pub preview: Vec<String>,
}

impl SemanticCommand {
    /// Create from rule name, description and operations
    #[must_use]
    pub fn new(
        rule: impl Into<String>,
        description: impl Into<String>,
        operations: Vec<FieldOperation>,
    ) -> Self {
        let preview = operations.iter().map(ToString::to_string).collect();
        Self {
            rule: rule.into(),
            operations,
            description: description.into(),
            preview,
        }
    }
}

/// Side information produced while parsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseNotice {
    /// Input was not understood; shows accepted forms
    FormatHint {
        /// Hint text
        message: String,
    },
    /// Router proposed an unconfirmed interpretation
    Clarification {
        /// Proposed interpretation
        suggestion: String,
        /// Question to show the user
        prompt: String,
    },
    /// Router is still learning this phrasing
    PendingInference {
        /// Banner text
        message: String,
    },
    /// Router could not be reached; local rules were used
    RouterUnavailable {
        /// Failure description
        reason: String,
    },
}

impl ParseNotice {
    /// Format hint with the default text
    #[must_use]
    pub fn format_hint() -> Self {
        Self::FormatHint {
            message: FORMAT_HINT.to_string(),
        }
    }

    /// Text to show the user
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::FormatHint { message } | Self::PendingInference { message } => message,
            Self::Clarification { prompt, .. } => prompt,
            Self::RouterUnavailable { reason } => reason,
        }
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Command kind
    pub kind: CommandKind,
    /// Parsed target, before scope merging
    pub target: Target,
    /// Kind-specific parameters
    #[serde(default)]
    pub params: BTreeMap<String, JsonValue>,
    /// Input as typed
    pub raw: String,
    /// Present when a semantic rule matched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<SemanticCommand>,
    /// Hints, prompts and warnings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<ParseNotice>,
}

impl Command {
    /// Create new command
    #[must_use]
    pub fn new(kind: CommandKind, raw: impl Into<String>) -> Self {
        Self {
            kind,
            target: Target::default(),
            params: BTreeMap::new(),
            raw: raw.into(),
            semantic: None,
            notices: Vec::new(),
        }
    }

    /// Unknown command carrying the default format hint
    #[must_use]
    pub fn unknown(raw: impl Into<String>) -> Self {
        Self::new(CommandKind::Unknown, raw).with_notice(ParseNotice::format_hint())
    }

    /// Semantic command
    #[must_use]
    pub fn semantic(raw: impl Into<String>, semantic: SemanticCommand) -> Self {
        let mut command = Self::new(CommandKind::Semantic, raw);
        command.semantic = Some(semantic);
        command
    }

    /// Set target
    #[must_use]
    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    /// Add parameter
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add notice
    #[must_use]
    pub fn with_notice(mut self, notice: ParseNotice) -> Self {
        self.notices.push(notice);
        self
    }

    /// Numeric parameter
    #[inline]
    #[must_use]
    pub fn param_f64(&self, key: &str) -> Option<f64> {
        self.params.get(key).and_then(JsonValue::as_f64)
    }

    /// Text parameter
    #[inline]
    #[must_use]
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(JsonValue::as_str)
    }

    /// Field operations this command applies to every targeted logic
    ///
    /// Semantic commands carry their own list; set commands build one
    /// operation per targeted field from `op` / `value` / `factor`. Other
    /// kinds produce values through dedicated planners and return nothing.
    #[must_use]
    pub fn field_operations(&self) -> Vec<FieldOperation> {
        match self.kind {
            CommandKind::Semantic => self
                .semantic
                .as_ref()
                .map(|s| s.operations.clone())
                .unwrap_or_default(),
            CommandKind::Set => {
                let Some(fields) = &self.target.fields else {
                    return Vec::new();
                };
                fields
                    .iter()
                    .filter_map(|field| self.set_operation(field.clone()))
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    fn set_operation(&self, field: FieldName) -> Option<FieldOperation> {
        let value = self.params.get("value").and_then(json_to_field_value);
        match self.param_str("op").unwrap_or("set") {
            "scale" => Some(FieldOperation::scale(field, self.param_f64("factor")?)),
            "add" => Some(FieldOperation::add(field, value?.as_f64()?)),
            "subtract" => Some(FieldOperation::subtract(field, value?.as_f64()?)),
            _ => Some(FieldOperation::set(field, value?)),
        }
    }

    /// First notice text, if any
    #[must_use]
    pub fn notice_text(&self) -> Option<&str> {
        self.notices.first().map(ParseNotice::message)
    }
}

/// Convert a scalar document value to a field value
#[must_use]
pub fn json_to_field_value(value: &JsonValue) -> Option<FieldValue> {
    match value {
        JsonValue::Number(n) => n.as_f64().map(FieldValue::Number),
        JsonValue::Bool(b) => Some(FieldValue::Bool(*b)),
        JsonValue::String(s) => Some(FieldValue::Text(s.clone())),
        _ => None,
    }
}
