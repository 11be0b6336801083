//! Scope Resolver
//!
//! Merges the target a command names with the user's active editing scope.
//! Each dimension is intersected independently; a dimension constrained on
//! only one side takes that side. Group 1 never shares a selection with
//! groups 2..=20.

use std::fmt::{self, Display, Formatter};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tradecfg_model::{EngineId, GroupId, LogicRef};

use crate::command::Target;

/// Selection the user made before typing a command
///
/// Empty sets are unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditingScope {
    engines: IndexSet<EngineId>,
    groups: IndexSet<GroupId>,
    logics: IndexSet<LogicRef>,
}

impl EditingScope {
    /// Empty scope
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an engine to the selection
    pub fn select_engine(&mut self, engine: EngineId) {
        self.engines.insert(engine);
    }

    /// Add a group to the selection
    ///
    /// # Errors
    /// Returns `GroupOneExclusive` when the selection would mix Group 1 with
    /// any of Groups 2..=20; the selection is left unchanged.
    pub fn select_group(&mut self, group: GroupId) -> Result<(), ScopeConflict> {
        let conflicts = if group.is_group_one() {
            self.groups.iter().any(|g| !g.is_group_one())
        } else {
            self.groups.iter().any(|g| g.is_group_one())
        };
        if conflicts {
            return Err(ScopeConflict::GroupOneExclusive);
        }
        self.groups.insert(group);
        Ok(())
    }

    /// Add a logic to the selection
    pub fn select_logic(&mut self, logic: LogicRef) {
        self.logics.insert(logic);
    }

    /// Remove a group from the selection
    pub fn deselect_group(&mut self, group: GroupId) {
        self.groups.shift_remove(&group);
    }

    /// Clear every dimension
    pub fn clear(&mut self) {
        self.engines.clear();
        self.groups.clear();
        self.logics.clear();
    }

    /// Builder: select engines
    #[must_use]
    pub fn with_engines(mut self, engines: impl IntoIterator<Item = EngineId>) -> Self {
        self.engines.extend(engines);
        self
    }

    /// Builder: select groups
    ///
    /// # Errors
    /// Returns `GroupOneExclusive` on a mixed selection
    pub fn with_groups(
        mut self,
        groups: impl IntoIterator<Item = GroupId>,
    ) -> Result<Self, ScopeConflict> {
        for group in groups {
            self.select_group(group)?;
        }
        Ok(self)
    }

    /// Builder: select logics
    #[must_use]
    pub fn with_logics(mut self, logics: impl IntoIterator<Item = LogicRef>) -> Self {
        self.logics.extend(logics);
        self
    }

    /// Selected engines
    #[inline]
    #[must_use]
    pub fn engines(&self) -> &IndexSet<EngineId> {
        &self.engines
    }

    /// Selected groups
    #[inline]
    #[must_use]
    pub fn groups(&self) -> &IndexSet<GroupId> {
        &self.groups
    }

    /// Selected logics
    #[inline]
    #[must_use]
    pub fn logics(&self) -> &IndexSet<LogicRef> {
        &self.logics
    }

    /// Check if nothing is selected
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.engines.is_empty() && self.groups.is_empty() && self.logics.is_empty()
    }

    /// Scope as a target (fields unconstrained)
    #[must_use]
    pub fn as_target(&self) -> Target {
        fn constrained<T: Clone + std::hash::Hash + Eq>(set: &IndexSet<T>) -> Option<IndexSet<T>> {
            (!set.is_empty()).then(|| set.clone())
        }
        Target {
            engines: constrained(&self.engines),
            groups: constrained(&self.groups),
            logics: constrained(&self.logics),
            fields: None,
        }
    }
}

impl Display for EditingScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("no selection")
        } else {
            write!(f, "{}", self.as_target())
        }
    }
}

/// Target dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Engines
    Engines,
    /// Groups
    Groups,
    /// Logics
    Logics,
}

impl Display for Dimension {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Engines => "engines",
            Self::Groups => "groups",
            Self::Logics => "logics",
        })
    }
}

/// Scope resolution failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeConflict {
    /// Intersection on a dimension constrained on both sides is empty
    #[error("Scope excludes all targets ({dimension} do not overlap)")]
    Empty {
        /// Dimension that came out empty
        dimension: Dimension,
    },

    /// Group 1 selected together with any of Groups 2..=20
    #[error("Group 1 cannot be selected together with Groups 2-20")]
    GroupOneExclusive,
}

fn check_group_one(groups: Option<&IndexSet<GroupId>>) -> Result<(), ScopeConflict> {
    if let Some(groups) = groups {
        let has_one = groups.iter().any(|g| g.is_group_one());
        let has_other = groups.iter().any(|g| !g.is_group_one());
        if has_one && has_other {
            return Err(ScopeConflict::GroupOneExclusive);
        }
    }
    Ok(())
}

fn intersect<T, F>(
    scope: Option<&IndexSet<T>>,
    parsed: Option<&IndexSet<T>>,
    dimension: Dimension,
    merge: F,
) -> Result<Option<IndexSet<T>>, ScopeConflict>
where
    T: Clone + Eq + std::hash::Hash,
    F: Fn(&T, &T) -> Option<T>,
{
    match (scope, parsed) {
        (Some(scope), Some(parsed)) => {
            let merged: IndexSet<T> = scope
                .iter()
                .flat_map(|s| parsed.iter().filter_map(|p| merge(s, p)).collect::<Vec<_>>())
                .collect();
            if merged.is_empty() {
                Err(ScopeConflict::Empty { dimension })
            } else {
                Ok(Some(merged))
            }
        }
        (Some(only), None) | (None, Some(only)) => Ok(Some(only.clone())),
        (None, None) => Ok(None),
    }
}

fn same<T: PartialEq + Clone>(a: &T, b: &T) -> Option<T> {
    (a == b).then(|| a.clone())
}

fn logic_merge(a: &LogicRef, b: &LogicRef) -> Option<LogicRef> {
    a.matches(b).then(|| a.most_specific(b).clone())
}

/// Merge two targets dimension by dimension
///
/// Intersections keep the order of `scope`; fields come from `parsed`.
///
/// # Errors
/// Returns `GroupOneExclusive` if either side mixes Group 1 with other
/// groups, or `Empty` if a dimension constrained on both sides has no overlap
pub fn resolve_targets(parsed: &Target, scope: &Target) -> Result<Target, ScopeConflict> {
    check_group_one(scope.groups.as_ref())?;
    check_group_one(parsed.groups.as_ref())?;

    Ok(Target {
        engines: intersect(scope.engines.as_ref(), parsed.engines.as_ref(), Dimension::Engines, same)?,
        groups: intersect(scope.groups.as_ref(), parsed.groups.as_ref(), Dimension::Groups, same)?,
        logics: intersect(
            scope.logics.as_ref(),
            parsed.logics.as_ref(),
            Dimension::Logics,
            logic_merge,
        )?,
        fields: parsed.fields.clone(),
    })
}

/// Merge a parsed target with the active editing scope
///
/// # Errors
/// See [`resolve_targets`]
pub fn resolve(parsed: &Target, scope: &EditingScope) -> Result<Target, ScopeConflict> {
    let resolved = resolve_targets(parsed, &scope.as_target());
    if let Err(conflict) = &resolved {
        tracing::debug!(%conflict, target = %parsed, %scope, "scope conflict");
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn g(n: u8) -> GroupId {
        GroupId::new(n).unwrap()
    }

    fn logic(text: &str) -> LogicRef {
        text.parse().unwrap()
    }

    #[test]
    fn empty_scope_passes_target_through() {
        let parsed = Target::new().with_groups([g(1)]);
        assert_eq!(resolve(&parsed, &EditingScope::new()).unwrap(), parsed);
    }

    #[test]
    fn scope_fills_unconstrained_dimensions() {
        let scope = EditingScope::new().with_groups([g(3), g(4)]).unwrap();
        let parsed = Target::new().with_logics([logic("POWER")]);
        let resolved = resolve(&parsed, &scope).unwrap();
        assert_eq!(resolved.groups, Some([g(3), g(4)].into_iter().collect()));
        assert_eq!(resolved.logics, parsed.logics);
    }

    #[test]
    fn intersection_keeps_scope_order() {
        let scope = EditingScope::new().with_groups([g(5), g(3), g(2)]).unwrap();
        let parsed = Target::new().with_groups([g(2), g(3), g(9)]);
        let resolved = resolve(&parsed, &scope).unwrap();
        assert_eq!(
            resolved.groups.unwrap().into_iter().collect::<Vec<_>>(),
            vec![g(3), g(2)]
        );
    }

    #[test]
    fn disjoint_dimension_is_conflict() {
        let scope = EditingScope::new().with_groups([g(2)]).unwrap();
        let parsed = Target::new().with_groups([g(4)]);
        let err = resolve(&parsed, &scope).unwrap_err();
        assert_eq!(
            err,
            ScopeConflict::Empty {
                dimension: Dimension::Groups
            }
        );
        assert!(err.to_string().starts_with("Scope excludes all targets"));
    }

    #[test]
    fn qualified_logic_is_kept() {
        let scope = EditingScope::new().with_logics([logic("POWER")]);
        let parsed = Target::new().with_logics([logic("A:POWER")]);
        let resolved = resolve(&parsed, &scope).unwrap();
        assert_eq!(resolved.logics, Some([logic("A:POWER")].into_iter().collect()));

        let other_engine = EditingScope::new().with_logics([logic("B:POWER")]);
        assert!(matches!(
            resolve(&parsed, &other_engine),
            Err(ScopeConflict::Empty {
                dimension: Dimension::Logics
            })
        ));
    }

    #[test]
    fn group_one_selection_is_exclusive() {
        let mut scope = EditingScope::new();
        scope.select_group(g(1)).unwrap();
        assert_eq!(scope.select_group(g(5)), Err(ScopeConflict::GroupOneExclusive));
        assert_eq!(scope.groups().len(), 1);

        let mut others = EditingScope::new();
        others.select_group(g(2)).unwrap();
        others.select_group(g(7)).unwrap();
        assert_eq!(others.select_group(g(1)), Err(ScopeConflict::GroupOneExclusive));
    }

    #[test]
    fn mixed_target_is_rejected_not_fixed() {
        let parsed = Target::new().with_groups([g(1), g(2)]);
        assert_eq!(
            resolve(&parsed, &EditingScope::new()),
            Err(ScopeConflict::GroupOneExclusive)
        );
    }

    #[test]
    fn fields_come_from_parsed_target() {
        let scope = EditingScope::new().with_engines([EngineId::new("A").unwrap()]);
        let parsed = Target::new().with_fields([tradecfg_model::FieldName::new("grid")]);
        let resolved = resolve(&parsed, &scope).unwrap();
        assert_eq!(resolved.fields, parsed.fields);
        assert!(resolved.engines.is_some());
    }
}
