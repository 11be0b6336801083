//! Identifiers for the engine → group → logic → field hierarchy

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Highest group number a configuration may carry
pub const MAX_GROUP: u8 = 20;

/// Engine identifier (`A`, `B`, `C`, ...)
///
/// Always stored upper-case so `engine a` and `A` address the same engine.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineId(String);

impl EngineId {
    /// Create engine id, normalising case
    ///
    /// # Errors
    /// Returns error if the id is empty or not alphanumeric
    pub fn new(id: impl AsRef<str>) -> Result<Self, IdError> {
        let id = id.as_ref().trim();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(IdError::InvalidEngine(id.to_string()));
        }
        Ok(Self(id.to_ascii_uppercase()))
    }

    /// Id as text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for EngineId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EngineId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Group number, 1 through [`MAX_GROUP`]
///
/// Displayed as `G<n>`; parsed from `G3`, `g3` or `3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct GroupId(u8);

impl GroupId {
    /// Create group id
    ///
    /// # Errors
    /// Returns error if `n` is outside `1..=MAX_GROUP`
    pub fn new(n: u8) -> Result<Self, IdError> {
        if (1..=MAX_GROUP).contains(&n) {
            Ok(Self(n))
        } else {
            Err(IdError::GroupOutOfRange(u32::from(n)))
        }
    }

    /// Numeric value
    #[inline]
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Group 1 is the power group; it never shares a selection with 2..=20
    #[inline]
    #[must_use]
    pub const fn is_group_one(self) -> bool {
        self.0 == 1
    }
}

impl TryFrom<u8> for GroupId {
    type Error = IdError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Self::new(n)
    }
}

impl From<GroupId> for u8 {
    fn from(id: GroupId) -> Self {
        id.0
    }
}

impl Display for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "G{}", self.0)
    }
}

impl FromStr for GroupId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('G')
            .or_else(|| trimmed.strip_prefix('g'))
            .unwrap_or(trimmed);
        let n: u32 = digits
            .parse()
            .map_err(|_| IdError::InvalidGroup(trimmed.to_string()))?;
        let n = u8::try_from(n).map_err(|_| IdError::GroupOutOfRange(n))?;
        Self::new(n)
    }
}

/// Reference to a logic, optionally qualified by engine (`A:POWER`)
///
/// An unqualified reference matches the logic of that name in every engine.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogicRef {
    engine: Option<EngineId>,
    name: String,
}

impl LogicRef {
    /// Unqualified reference
    ///
    /// # Errors
    /// Returns error if the name is empty or contains separators
    pub fn named(name: impl AsRef<str>) -> Result<Self, IdError> {
        Ok(Self {
            engine: None,
            name: normalise_logic_name(name.as_ref())?,
        })
    }

    /// Engine-qualified reference
    ///
    /// # Errors
    /// Returns error if the name is invalid
    pub fn qualified(engine: EngineId, name: impl AsRef<str>) -> Result<Self, IdError> {
        Ok(Self {
            engine: Some(engine),
            name: normalise_logic_name(name.as_ref())?,
        })
    }

    /// Engine qualifier, if any
    #[inline]
    #[must_use]
    pub fn engine(&self) -> Option<&EngineId> {
        self.engine.as_ref()
    }

    /// Logic name (upper-case)
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check whether two references can denote the same logic
    ///
    /// Names must agree; engines only have to agree when both sides carry one.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        if self.name != other.name {
            return false;
        }
        match (&self.engine, &other.engine) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }

    /// Check whether this reference selects `name` inside `engine`
    #[must_use]
    pub fn selects(&self, engine: &EngineId, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) && self.engine.as_ref().map_or(true, |e| e == engine)
    }

    /// The more specific of two matching references
    #[must_use]
    pub fn most_specific<'a>(&'a self, other: &'a Self) -> &'a Self {
        if self.engine.is_none() && other.engine.is_some() {
            other
        } else {
            self
        }
    }
}

fn normalise_logic_name(name: &str) -> Result<String, IdError> {
    let name = name.trim();
    if name.is_empty() || name.contains(':') || name.contains('/') {
        return Err(IdError::InvalidLogic(name.to_string()));
    }
    Ok(name.to_ascii_uppercase())
}

impl Display for LogicRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.engine {
            Some(engine) => write!(f, "{}:{}", engine, self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for LogicRef {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((engine, name)) => Self::qualified(EngineId::new(engine)?, name),
            None => Self::named(s),
        }
    }
}

impl Serialize for LogicRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for LogicRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Canonical field name (`grid`, `initial_lot`, ...)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldName(String);

impl FieldName {
    /// Create field name (lower-cased)
    #[inline]
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_ascii_lowercase())
    }

    /// Name as text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FieldName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Identifier errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// Engine id is empty or has invalid characters
    #[error("invalid engine id: '{0}'")]
    InvalidEngine(String),

    /// Group text is not a number
    #[error("invalid group: '{0}'")]
    InvalidGroup(String),

    /// Group number outside 1..=20
    #[error("group {0} is out of range (1-{max})", max = MAX_GROUP)]
    GroupOutOfRange(u32),

    /// Logic name is empty or malformed
    #[error("invalid logic name: '{0}'")]
    InvalidLogic(String),
}
