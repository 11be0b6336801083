//! Session control lines (`:confirm`, `:scope ...`)

use std::str::FromStr;

use tradecfg_command::{EditingScope, ScopeConflict};
use tradecfg_model::{EngineId, GroupId, IdError, LogicRef};
use ulid::Ulid;

/// A parsed `:` line
#[derive(Debug, Clone, PartialEq)]
pub enum MetaCommand {
    /// Apply the pending plan
    Confirm,
    /// Drop the pending plan
    Cancel,
    /// Undo the last transaction, or the listed operations when non-empty
    Undo(Vec<Ulid>),
    /// Redo the last undone transaction
    Redo,
    /// Re-run the last clarified input with its suggestion confirmed
    Accept,
    /// Commit a snapshot with a message
    Snapshot(String),
    /// Replace the editing scope
    Scope(EditingScope),
    /// List undoable operations
    History,
}

impl MetaCommand {
    /// Whether a line is a meta line rather than a command
    #[inline]
    #[must_use]
    pub fn is_meta(line: &str) -> bool {
        line.trim_start().starts_with(':')
    }
}

impl FromStr for MetaCommand {
    type Err = MetaError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim().trim_start_matches(':');
        let (name, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(name, rest)| (name, rest.trim()));

        match name.to_ascii_lowercase().as_str() {
            "confirm" | "yes" => Ok(Self::Confirm),
            "cancel" | "no" => Ok(Self::Cancel),
            "undo" => parse_ids(rest).map(Self::Undo),
            "redo" => Ok(Self::Redo),
            "accept" => Ok(Self::Accept),
            "snapshot" | "snap" => Ok(Self::Snapshot(if rest.is_empty() {
                "Manual snapshot".to_string()
            } else {
                rest.to_string()
            })),
            "scope" => parse_scope(rest).map(Self::Scope),
            "history" => Ok(Self::History),
            other => Err(MetaError::Unknown(other.to_string())),
        }
    }
}

fn parse_ids(text: &str) -> Result<Vec<Ulid>, MetaError> {
    text.split([',', ' '])
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| Ulid::from_string(id).map_err(|_| MetaError::OperationId(id.to_string())))
        .collect()
}

fn parse_scope(text: &str) -> Result<EditingScope, MetaError> {
    let mut scope = EditingScope::new();
    if text.is_empty() || text.eq_ignore_ascii_case("clear") {
        return Ok(scope);
    }
    for token in text.split_whitespace() {
        let (key, values) = token
            .split_once('=')
            .ok_or_else(|| MetaError::ScopeArgument(token.to_string()))?;
        let values = values.split(',').map(str::trim).filter(|v| !v.is_empty());
        match key.to_ascii_lowercase().as_str() {
            "engine" | "engines" => {
                for value in values {
                    scope.select_engine(value.parse::<EngineId>()?);
                }
            }
            "group" | "groups" => {
                for value in values {
                    scope.select_group(value.parse::<GroupId>()?)?;
                }
            }
            "logic" | "logics" => {
                for value in values {
                    scope.select_logic(value.parse::<LogicRef>()?);
                }
            }
            _ => return Err(MetaError::ScopeArgument(token.to_string())),
        }
    }
    Ok(scope)
}

/// Meta line errors
#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    /// Name after `:` is not a known command
    #[error("unknown meta command ':{0}'")]
    Unknown(String),

    /// `:undo` argument is not an operation id
    #[error("invalid operation id '{0}'")]
    OperationId(String),

    /// `:scope` argument is not `engines=`, `groups=` or `logics=`
    #[error("invalid scope argument '{0}'")]
    ScopeArgument(String),

    /// Engine, group or logic value is malformed
    #[error(transparent)]
    Id(#[from] IdError),

    /// Selection mixes Group 1 with other groups
    #[error(transparent)]
    Scope(#[from] ScopeConflict),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn simple_commands() {
        assert_eq!(":confirm".parse::<MetaCommand>().unwrap(), MetaCommand::Confirm);
        assert_eq!(" :cancel ".parse::<MetaCommand>().unwrap(), MetaCommand::Cancel);
        assert_eq!(":undo".parse::<MetaCommand>().unwrap(), MetaCommand::Undo(Vec::new()));
        assert_eq!(
            ":snapshot before news".parse::<MetaCommand>().unwrap(),
            MetaCommand::Snapshot("before news".to_string())
        );
        assert!(matches!(":frobnicate".parse::<MetaCommand>(), Err(MetaError::Unknown(_))));
    }

    #[test]
    fn undo_with_ids() {
        let id = Ulid::new();
        let parsed: MetaCommand = format!(":undo {id}").parse().unwrap();
        assert_eq!(parsed, MetaCommand::Undo(vec![id]));
        assert!(matches!(
            ":undo not-an-id".parse::<MetaCommand>(),
            Err(MetaError::OperationId(_))
        ));
    }

    #[test]
    fn scope_arguments() {
        let MetaCommand::Scope(scope) = ":scope engines=A,b groups=2,G3 logics=POWER"
            .parse::<MetaCommand>()
            .unwrap()
        else {
            panic!("expected scope");
        };
        assert_eq!(scope.engines().len(), 2);
        assert_eq!(
            scope.groups().iter().map(|g| g.get()).collect::<Vec<_>>(),
            vec![2, 3]
        );
        assert_eq!(scope.logics().len(), 1);

        let MetaCommand::Scope(cleared) = ":scope clear".parse::<MetaCommand>().unwrap() else {
            panic!("expected scope");
        };
        assert!(cleared.is_empty());
    }

    #[test]
    fn scope_rejects_group_one_mix() {
        assert!(matches!(
            ":scope groups=1,5".parse::<MetaCommand>(),
            Err(MetaError::Scope(ScopeConflict::GroupOneExclusive))
        ));
        assert!(matches!(
            ":scope colour=red".parse::<MetaCommand>(),
            Err(MetaError::ScopeArgument(_))
        ));
    }
}
