//! Command Parser
//!
//! Turns free text into a [`Command`]. The external router is consulted
//! first (bounded by a timeout); local preprocessing, semantic rules and
//! literal grammars are the fallback. Parsing never fails: input nothing
//! understands becomes an `Unknown` command carrying a format hint.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::command::{Command, CommandKind, ParseNotice};
use crate::grammar::{extract_target, parse_literal};
use crate::preprocess::{is_greeting_only, preprocess};
use crate::router::{CommandRouter, RouteRequest, RouteResponse, RouterError};
use crate::semantic::match_semantic;

/// Default router deadline
pub const DEFAULT_ROUTER_TIMEOUT: Duration = Duration::from_millis(1500);

/// Caller state the parser consults
#[derive(Debug, Clone, Default)]
pub struct ParseContext {
    /// Router suggestions the user has already confirmed
    pub confirmed_suggestions: HashSet<String>,
}

impl ParseContext {
    /// Empty context
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a confirmed suggestion
    #[must_use]
    pub fn with_confirmed(mut self, suggestion: impl Into<String>) -> Self {
        self.confirmed_suggestions.insert(suggestion.into());
        self
    }
}

/// Free-text command parser
#[derive(Clone)]
pub struct CommandParser {
    router: Option<Arc<dyn CommandRouter>>,
    timeout: Duration,
}

impl std::fmt::Debug for CommandParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandParser")
            .field("router", &self.router.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandParser {
    /// Parser using local rules only
    #[must_use]
    pub fn new() -> Self {
        Self {
            router: None,
            timeout: DEFAULT_ROUTER_TIMEOUT,
        }
    }

    /// Consult a router before local rules
    #[must_use]
    pub fn with_router(mut self, router: Arc<dyn CommandRouter>) -> Self {
        self.router = Some(router);
        self
    }

    /// Set router deadline
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check if a router is configured
    #[inline]
    #[must_use]
    pub fn has_router(&self) -> bool {
        self.router.is_some()
    }

    /// Parse text into a command
    pub async fn parse(&self, text: &str, context: &ParseContext) -> Command {
        let Some(router) = &self.router else {
            return parse_local(text);
        };

        match self.route(router.as_ref(), text).await {
            Ok(reply) => from_router_reply(text, &reply, context),
            Err(err) => {
                warn!(error = %err, "router unavailable, using local rules");
                parse_local(text).with_notice(ParseNotice::RouterUnavailable {
                    reason: err.to_string(),
                })
            }
        }
    }

    async fn route(
        &self,
        router: &dyn CommandRouter,
        text: &str,
    ) -> Result<RouteResponse, RouterError> {
        let request = RouteRequest {
            input: text.to_string(),
        };
        let millis = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        tokio::time::timeout(self.timeout, router.route(request))
            .await
            .map_err(|_| RouterError::Timeout(millis))?
    }
}

fn from_router_reply(raw: &str, reply: &RouteResponse, context: &ParseContext) -> Command {
    debug!(route = %reply.route, output = %reply.output, "router replied");

    if reply.is_unknown() {
        return Command::new(CommandKind::Unknown, raw).with_notice(ParseNotice::FormatHint {
            message: reply.output.clone(),
        });
    }

    if let Some(suggestion) = &reply.learned_suggestion {
        if !context.confirmed_suggestions.contains(suggestion) {
            return Command::new(CommandKind::Unknown, raw).with_notice(ParseNotice::Clarification {
                suggestion: suggestion.clone(),
                prompt: format!("Did you mean '{suggestion}'? Confirm it to apply."),
            });
        }
    }

    let mut command = parse_with_raw(raw, &reply.output);
    if command.kind == CommandKind::Unknown {
        command = parse_local(raw);
    }
    if reply.pending_inference {
        let message = reply
            .message
            .clone()
            .unwrap_or_else(|| "Still learning this phrasing; applied the closest match".to_string());
        command = command.with_notice(ParseNotice::PendingInference { message });
    }
    command
}

/// Parse with local rules only
#[must_use]
pub fn parse_local(text: &str) -> Command {
    parse_with_raw(text, text)
}

fn parse_with_raw(raw: &str, text: &str) -> Command {
    let cleaned = preprocess(text);
    if cleaned.is_empty() {
        debug!(input = raw, "no command in input");
        return Command::unknown(raw);
    }

    // rule phrases such as "play it safe" carry no command starter
    if let Some(semantic) = match_semantic(&cleaned) {
        return match extract_target(&cleaned) {
            Ok(mut target) => {
                target.fields = None;
                Command::semantic(raw, semantic).with_target(target)
            }
            Err(err) => Command::new(CommandKind::Unknown, raw).with_notice(ParseNotice::FormatHint {
                message: err.to_string(),
            }),
        };
    }

    if is_greeting_only(&cleaned) {
        debug!(input = raw, "no command in input");
        return Command::unknown(raw);
    }

    if let Some(command) = parse_literal(raw, &cleaned) {
        debug!(kind = %command.kind, target = %command.target, "literal grammar matched");
        return command;
    }

    debug!(input = raw, "no grammar matched");
    Command::unknown(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::FORMAT_HINT;
    use crate::router::MockCommandRouter;

    fn parser_with(mock: MockCommandRouter) -> CommandParser {
        CommandParser::new().with_router(Arc::new(mock))
    }

    fn reply(output: &str) -> RouteResponse {
        RouteResponse {
            output: output.to_string(),
            route: "direct".to_string(),
            ..RouteResponse::default()
        }
    }

    #[tokio::test]
    async fn local_parse_without_router() {
        let command = CommandParser::new()
            .parse("hey set grid to 500 for G1", &ParseContext::new())
            .await;
        assert_eq!(command.kind, CommandKind::Set);
        assert_eq!(command.raw, "hey set grid to 500 for G1");
        assert!(command.notices.is_empty());
    }

    #[tokio::test]
    async fn router_unknown_short_circuits() {
        let mut mock = MockCommandRouter::new();
        mock.expect_route()
            .times(1)
            .returning(|_| Ok(reply(FORMAT_HINT)));
        let command = parser_with(mock)
            .parse("set grid to 500", &ParseContext::new())
            .await;
        assert_eq!(command.kind, CommandKind::Unknown);
        assert!(matches!(command.notices[0], ParseNotice::FormatHint { .. }));
    }

    #[tokio::test]
    async fn unconfirmed_suggestion_asks_for_clarification() {
        let mut mock = MockCommandRouter::new();
        mock.expect_route().returning(|_| {
            Ok(RouteResponse {
                learned_suggestion: Some("set grid to 500 for G1".into()),
                ..reply("set grid to 500 for G1")
            })
        });
        let parser = parser_with(mock);

        let command = parser.parse("grid 500 g1 pls", &ParseContext::new()).await;
        assert_eq!(command.kind, CommandKind::Unknown);
        assert!(matches!(command.notices[0], ParseNotice::Clarification { .. }));

        let confirmed = ParseContext::new().with_confirmed("set grid to 500 for G1");
        let command = parser.parse("grid 500 g1 pls", &confirmed).await;
        assert_eq!(command.kind, CommandKind::Set);
    }

    #[tokio::test]
    async fn router_output_is_parsed_with_banner() {
        let mut mock = MockCommandRouter::new();
        mock.expect_route().returning(|_| {
            Ok(RouteResponse {
                pending_inference: true,
                ..reply("set grid to 700 for G2")
            })
        });
        let command = parser_with(mock)
            .parse("make g2 grid seven hundred", &ParseContext::new())
            .await;
        assert_eq!(command.kind, CommandKind::Set);
        assert_eq!(command.param_f64("value"), Some(700.0));
        assert_eq!(command.raw, "make g2 grid seven hundred");
        assert!(matches!(command.notices[0], ParseNotice::PendingInference { .. }));
    }

    #[tokio::test]
    async fn unparseable_router_output_falls_back_to_raw() {
        let mut mock = MockCommandRouter::new();
        mock.expect_route()
            .returning(|_| Ok(reply("set grid for groups [1]")));
        let command = parser_with(mock)
            .parse("set grid to 450 for G1", &ParseContext::new())
            .await;
        assert_eq!(command.kind, CommandKind::Set);
        assert_eq!(command.param_f64("value"), Some(450.0));
    }

    #[tokio::test]
    async fn router_error_falls_back_with_warning() {
        let mut mock = MockCommandRouter::new();
        mock.expect_route()
            .returning(|_| Err(RouterError::Transport("connection refused".into())));
        let command = parser_with(mock)
            .parse("30% more aggressive", &ParseContext::new())
            .await;
        assert_eq!(command.kind, CommandKind::Semantic);
        assert!(matches!(
            command.notices.last(),
            Some(ParseNotice::RouterUnavailable { .. })
        ));
    }

    struct SlowRouter;

    #[async_trait::async_trait]
    impl CommandRouter for SlowRouter {
        async fn route(&self, _request: RouteRequest) -> Result<RouteResponse, RouterError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(reply("show grid"))
        }
    }

    #[tokio::test]
    async fn router_timeout_falls_back() {
        let parser = CommandParser::new()
            .with_router(Arc::new(SlowRouter))
            .with_timeout(Duration::from_millis(20));
        let command = parser.parse("show lot for POWER", &ParseContext::new()).await;
        assert_eq!(command.kind, CommandKind::Query);
        assert!(matches!(
            command.notices.last(),
            Some(ParseNotice::RouterUnavailable { reason }) if reason.contains("timed out")
        ));
    }

    #[test]
    fn greetings_and_noise_are_unknown() {
        assert_eq!(parse_local("hey bro").kind, CommandKind::Unknown);
        assert_eq!(parse_local("").kind, CommandKind::Unknown);
        assert_eq!(parse_local("purple monkey").kind, CommandKind::Unknown);
    }

    #[test]
    fn rule_phrases_without_command_words() {
        for (text, rule) in [
            ("play it safe", "conservative_preset"),
            ("be conservative", "conservative_preset"),
            ("be more aggressive", "aggressive_preset"),
            ("activate hedge mode", "hedge_mode"),
            ("use hedge mode", "hedge_mode"),
            ("switch to hedge mode", "hedge_mode"),
            ("hedge mode", "hedge_mode"),
        ] {
            let command = parse_local(text);
            assert_eq!(command.kind, CommandKind::Semantic, "{text}");
            assert_eq!(command.semantic.map(|s| s.rule).as_deref(), Some(rule), "{text}");
        }
    }

    #[test]
    fn semantic_wins_over_literal() {
        let command = parse_local("double the lot for G2");
        assert_eq!(command.kind, CommandKind::Semantic);
        assert!(command.target.fields.is_none());
        assert_eq!(command.target.groups.as_ref().map(indexmap::IndexSet::len), Some(1));
    }
}
