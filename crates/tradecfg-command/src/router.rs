//! External command router
//!
//! The router is an optional service that normalises free text before the
//! local grammars see it. It is consulted first; any failure falls back to
//! local parsing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Request sent to the router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRequest {
    /// Raw user input
    pub input: String,
}

/// Router reply
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RouteResponse {
    /// Normalised command text, or an "Unknown command" hint
    pub output: String,
    /// Routing decision (`direct`, `hybrid`, `escalate`)
    #[serde(default)]
    pub route: String,
    /// Router is still learning this phrasing
    #[serde(default)]
    pub pending_inference: bool,
    /// Banner text to show alongside
    #[serde(default)]
    pub message: Option<String>,
    /// Interpretation the router guessed and wants confirmed
    #[serde(default)]
    pub learned_suggestion: Option<String>,
}

impl RouteResponse {
    /// Check whether the router rejected the input outright
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.output.to_lowercase().contains("unknown command")
    }
}

/// Text-to-command routing service
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CommandRouter: Send + Sync {
    /// Route one input
    async fn route(&self, request: RouteRequest) -> Result<RouteResponse, RouterError>;
}

/// Router errors
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// Connection or protocol failure
    #[error("router transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status
    #[error("router returned status {0}")]
    Status(u16),

    /// Reply could not be decoded
    #[error("router reply could not be decoded: {0}")]
    Decode(String),

    /// No reply within the deadline
    #[error("router timed out after {0}ms")]
    Timeout(u64),
}

/// Router reached over HTTP (JSON POST)
#[derive(Debug, Clone)]
pub struct HttpCommandRouter {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpCommandRouter {
    /// Create router client
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, RouterError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RouterError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Endpoint URL
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl CommandRouter for HttpCommandRouter {
    async fn route(&self, request: RouteRequest) -> Result<RouteResponse, RouterError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| RouterError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RouterError::Status(status.as_u16()));
        }

        response
            .json::<RouteResponse>()
            .await
            .map_err(|e| RouterError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_detection_is_case_insensitive() {
        let reply = RouteResponse {
            output: "Unknown command. Try: 'set grid to 500 for G1'".into(),
            ..RouteResponse::default()
        };
        assert!(reply.is_unknown());
        let ok = RouteResponse {
            output: "set grid to 500 for G1".into(),
            ..RouteResponse::default()
        };
        assert!(!ok.is_unknown());
    }

    #[test]
    fn reply_decodes_with_missing_optionals() {
        let reply: RouteResponse = serde_json::from_str(r#"{"output": "show grid"}"#).unwrap();
        assert_eq!(reply.output, "show grid");
        assert!(!reply.pending_inference);
        assert!(reply.learned_suggestion.is_none());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let router =
            HttpCommandRouter::new("http://127.0.0.1:9/route", Duration::from_millis(200)).unwrap();
        let result = router
            .route(RouteRequest {
                input: "show grid".into(),
            })
            .await;
        assert!(matches!(
            result,
            Err(RouterError::Transport(_) | RouterError::Status(_))
        ));
    }
}
