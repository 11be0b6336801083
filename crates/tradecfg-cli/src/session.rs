//! Line-driven session over one document

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use tradecfg_command::{CommandParser, HttpCommandRouter, ParseContext, ParseNotice, RouterError};
use tradecfg_engine::{CommandExecutor, CommandResult, EngineSettings, SnapshotManager};
use tradecfg_model::ConfigDocument;

use crate::meta::MetaCommand;

/// Input the router asked the user to confirm
#[derive(Debug, Clone)]
struct Clarified {
    input: String,
    suggestion: String,
}

/// Parser, executor and snapshot store wired together
#[derive(Debug)]
pub struct Session {
    parser: CommandParser,
    executor: CommandExecutor,
    snapshots: SnapshotManager,
    context: ParseContext,
    clarified: Option<Clarified>,
}

impl Session {
    /// Build a session; a configured router endpoint is consulted first
    ///
    /// # Errors
    /// Returns error if the router client cannot be built
    pub fn new(document: ConfigDocument, settings: EngineSettings) -> Result<Self, SessionError> {
        let timeout = settings.router.timeout();
        let mut parser = CommandParser::new().with_timeout(timeout);
        if let Some(endpoint) = &settings.router.endpoint {
            let router = HttpCommandRouter::new(endpoint.clone(), timeout)?;
            info!(endpoint = %endpoint, "command router enabled");
            parser = parser.with_router(Arc::new(router));
        }

        let mut snapshots = SnapshotManager::new(settings.snapshots.clone());
        snapshots.start_recording(Utc::now());

        Ok(Self {
            parser,
            executor: CommandExecutor::with_settings(document, settings),
            snapshots,
            context: ParseContext::new(),
            clarified: None,
        })
    }

    /// Replace the parser (e.g. with a custom router)
    #[must_use]
    pub fn with_parser(mut self, parser: CommandParser) -> Self {
        self.parser = parser;
        self
    }

    /// Executor and its document
    #[inline]
    #[must_use]
    pub fn executor(&self) -> &CommandExecutor {
        &self.executor
    }

    /// Snapshot store
    #[inline]
    #[must_use]
    pub fn snapshots(&self) -> &SnapshotManager {
        &self.snapshots
    }

    /// Handle one input line; `None` for blank and `#` comment lines
    pub async fn handle_line(&mut self, line: &str) -> Option<CommandResult> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        // idle gap before this line
        if let Some(snapshot) = self
            .snapshots
            .maybe_auto_commit(self.executor.document(), Utc::now())
        {
            debug!(id = %snapshot.id, "idle auto-save");
        }

        let result = if MetaCommand::is_meta(line) {
            match line.parse::<MetaCommand>() {
                Ok(meta) => self.run_meta(meta).await,
                Err(err) => CommandResult::failure(err.to_string()),
            }
        } else {
            self.run_command(line).await
        };

        self.snapshots.touch(Utc::now());
        Some(result)
    }

    async fn run_command(&mut self, input: &str) -> CommandResult {
        let command = self.parser.parse(input, &self.context).await;
        self.clarified = command.notices.iter().find_map(|notice| match notice {
            ParseNotice::Clarification { suggestion, .. } => Some(Clarified {
                input: input.to_string(),
                suggestion: suggestion.clone(),
            }),
            _ => None,
        });
        self.executor.execute(&command)
    }

    async fn run_meta(&mut self, meta: MetaCommand) -> CommandResult {
        match meta {
            MetaCommand::Confirm => self.executor.confirm(),
            MetaCommand::Cancel => self.executor.cancel(),
            MetaCommand::Undo(ids) => {
                let outcome = if ids.is_empty() {
                    self.executor.undo_transaction()
                } else {
                    self.executor.selective_undo(&ids)
                };
                outcome.unwrap_or_else(|err| CommandResult::failure(err.to_string()))
            }
            MetaCommand::Redo => self
                .executor
                .redo_transaction()
                .unwrap_or_else(|err| CommandResult::failure(err.to_string())),
            MetaCommand::Accept => match self.clarified.take() {
                Some(clarified) => {
                    self.context
                        .confirmed_suggestions
                        .insert(clarified.suggestion);
                    self.run_command(&clarified.input).await
                }
                None => CommandResult::failure("No suggestion to accept"),
            },
            MetaCommand::Snapshot(message) => {
                let snapshot =
                    self.snapshots
                        .create_snapshot(self.executor.document(), message, None, Vec::new());
                CommandResult::success(format!(
                    "Snapshot {} saved on '{}' ({} change(s))",
                    snapshot.id,
                    self.snapshots.current_branch(),
                    snapshot.metadata.change_count
                ))
            }
            MetaCommand::Scope(scope) => {
                let message = format!("Scope: {scope}");
                self.executor.set_scope(scope);
                CommandResult::success(message)
            }
            MetaCommand::History => CommandResult::success(self.history_listing()),
        }
    }

    fn history_listing(&self) -> String {
        let history = self.executor.history();
        let operations = history.history(history.context());
        if operations.is_empty() {
            return "History is empty".to_string();
        }
        let mut listing = format!("{} undoable operation(s)", operations.len());
        for op in operations {
            let target = op
                .target
                .to_leaf()
                .map_or_else(|| op.target.engine_id.to_string(), |leaf| leaf.to_string());
            let _ = write!(listing, "\n  {} {target}: {} -> {}", op.id, op.before, op.after);
        }
        listing
    }
}

/// Session setup errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Router client could not be created
    #[error(transparent)]
    Router(#[from] RouterError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradecfg_test_utils::{leaf, number_at, sample_document};

    fn session() -> Session {
        Session::new(sample_document(), EngineSettings::default()).unwrap()
    }

    #[tokio::test]
    async fn comments_and_blank_lines_are_skipped() {
        let mut session = session();
        assert!(session.handle_line("   ").await.is_none());
        assert!(session.handle_line("# set grid to 1").await.is_none());
    }

    #[tokio::test]
    async fn confirm_applies_pending_plan() {
        let mut session = session();
        let pending = session.handle_line("set grid to 450 for G2").await.unwrap();
        assert!(pending.needs_confirmation());

        let applied = session.handle_line(":confirm").await.unwrap();
        assert!(applied.success);
        let grid = number_at(session.executor().document(), &leaf("A", 2, "POWER", "grid"));
        assert_eq!(grid, 450.0);
    }

    #[tokio::test]
    async fn accept_without_suggestion_fails() {
        let mut session = session();
        let result = session.handle_line(":accept").await.unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn history_lists_operations() {
        let mut session = session();
        session.handle_line("set tp to 1200 for G3 POWER").await;
        session.handle_line(":confirm").await;
        let listing = session.handle_line(":history").await.unwrap();
        assert!(listing.message.starts_with("2 undoable"), "{}", listing.message);
        assert!(listing.message.contains("A/G3/POWER/tp_value"));
    }
}
