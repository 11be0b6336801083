//! Leaf addressing
//!
//! Provides [`LeafPath`], the (engine, group, logic, field) tuple that names a
//! single readable/writable value in a configuration document.

use crate::ids::{EngineId, FieldName, GroupId, IdError};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Address of one field value inside a configuration document
///
/// # Examples
/// - `A/G1/POWER/grid`
/// - `B/G7/SCALPER/initial_lot`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LeafPath {
    /// Engine
    pub engine: EngineId,
    /// Group within the engine
    pub group: GroupId,
    /// Logic name within the group (upper-case)
    pub logic: String,
    /// Field within the logic
    pub field: FieldName,
}

impl LeafPath {
    /// Create new leaf path
    #[inline]
    #[must_use]
    pub fn new(
        engine: EngineId,
        group: GroupId,
        logic: impl AsRef<str>,
        field: impl Into<FieldName>,
    ) -> Self {
        Self {
            engine,
            group,
            logic: logic.as_ref().to_ascii_uppercase(),
            field: field.into(),
        }
    }

    /// Same logic, different field
    #[inline]
    #[must_use]
    pub fn with_field(&self, field: impl Into<FieldName>) -> Self {
        Self {
            field: field.into(),
            ..self.clone()
        }
    }

    /// Check whether two paths address the same logic (ignoring the field)
    #[inline]
    #[must_use]
    pub fn same_logic(&self, other: &Self) -> bool {
        self.engine == other.engine && self.group == other.group && self.logic == other.logic
    }
}

impl Display for LeafPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.engine, self.group, self.logic, self.field)
    }
}

impl FromStr for LeafPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = s.split('/').collect();
        let [engine, group, logic, field] = segments.as_slice() else {
            return Err(PathError::SegmentCount(segments.len()));
        };
        if segments.iter().any(|seg| seg.trim().is_empty()) {
            return Err(PathError::EmptySegment);
        }
        Ok(Self::new(
            engine.parse()?,
            group.parse()?,
            logic,
            FieldName::new(field),
        ))
    }
}

/// Errors parsing a leaf path
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// Path does not have exactly four segments
    #[error("leaf path needs 4 segments (engine/group/logic/field), got {0}")]
    SegmentCount(usize),

    /// Empty segment in path
    #[error("leaf path contains an empty segment")]
    EmptySegment,

    /// Segment is not a valid identifier
    #[error(transparent)]
    Id(#[from] IdError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(text: &str) -> LeafPath {
        text.parse().unwrap()
    }

    #[test]
    fn display_and_parse() {
        let path = leaf("a/g2/power/Grid");
        assert_eq!(path.engine.as_str(), "A");
        assert_eq!(path.group.get(), 2);
        assert_eq!(path.logic, "POWER");
        assert_eq!(path.field.as_str(), "grid");
        assert_eq!(path.to_string(), "A/G2/POWER/grid");
    }

    #[test]
    fn parse_rejects_wrong_shape() {
        assert!(matches!(
            "A/G1/POWER".parse::<LeafPath>(),
            Err(PathError::SegmentCount(3))
        ));
        assert!(matches!(
            "A//POWER/grid".parse::<LeafPath>(),
            Err(PathError::EmptySegment)
        ));
        assert!(matches!(
            "A/G99/POWER/grid".parse::<LeafPath>(),
            Err(PathError::Id(IdError::GroupOutOfRange(99)))
        ));
    }

    #[test]
    fn with_field_keeps_logic() {
        let grid = leaf("A/G1/POWER/grid");
        let lot = grid.with_field("initial_lot");
        assert!(grid.same_logic(&lot));
        assert_ne!(grid, lot);
    }

    #[test]
    fn ordering_is_engine_group_logic_field() {
        let mut paths = vec![
            leaf("B/G1/POWER/grid"),
            leaf("A/G2/POWER/grid"),
            leaf("A/G1/SCALPER/grid"),
            leaf("A/G1/POWER/multiplier"),
            leaf("A/G1/POWER/grid"),
        ];
        paths.sort();
        let rendered: Vec<String> = paths.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "A/G1/POWER/grid",
                "A/G1/POWER/multiplier",
                "A/G1/SCALPER/grid",
                "A/G2/POWER/grid",
                "B/G1/POWER/grid",
            ]
        );
    }
}
