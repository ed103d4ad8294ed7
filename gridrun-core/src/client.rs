//! Remote game API client
//!
//! A thin HTTP abstraction over the remote grid-game server: open a scoring
//! card, start a game, execute an action, close the card. Every call is a
//! network request that may fail; the agent loop treats any such failure as
//! run-fatal because the remote game state is unknown afterwards.

use crate::frame::{ActionName, Frame, GameAction};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Client errors
// ============================================================================

/// Error type for remote game API operations
#[derive(Debug)]
pub enum ClientError {
    /// Network/connection error
    Network(String),
    /// API returned an error
    Api { status: u16, message: String },
    /// Failed to parse response
    Parse(String),
    /// Rate limited
    RateLimited { retry_after: Option<u64> },
    /// Authentication failed
    AuthenticationFailed,
    /// Other error
    Other(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(e) => write!(f, "Network error: {}", e),
            Self::Api { status, message } => write!(f, "API error ({}): {}", status, message),
            Self::Parse(e) => write!(f, "Parse error: {}", e),
            Self::RateLimited { retry_after } => {
                write!(f, "Rate limited")?;
                if let Some(secs) = retry_after {
                    write!(f, " (retry after {}s)", secs)?;
                }
                Ok(())
            }
            Self::AuthenticationFailed => write!(f, "Authentication failed"),
            Self::Other(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<ClientError> for gridrun_error::Error {
    fn from(err: ClientError) -> Self {
        let kind = match &err {
            ClientError::Network(_) => gridrun_error::ErrorKind::NetworkFailed,
            ClientError::Api { .. } | ClientError::Other(_) => {
                gridrun_error::ErrorKind::RemoteApiFailed
            }
            ClientError::Parse(_) => gridrun_error::ErrorKind::ParseFailed,
            ClientError::RateLimited { .. } => gridrun_error::ErrorKind::RateLimited,
            ClientError::AuthenticationFailed => gridrun_error::ErrorKind::AuthenticationFailed,
        };
        gridrun_error::Error::new(kind, err.to_string()).with_operation("client")
    }
}

// ============================================================================
// Client trait
// ============================================================================

/// The remote game API surface the orchestrator consumes.
///
/// Implementations must be side-effect faithful: every `start_game` and
/// `execute_action` call mutates remote state, so callers never issue
/// throwaway calls to probe it.
#[allow(async_fn_in_trait)]
pub trait GameClient: Send + Sync {
    /// Open a scoring card; required before any game may be played
    async fn open_scoring_card(
        &self,
        tags: &[String],
        source_url: &str,
        metadata: serde_json::Value,
    ) -> Result<String, ClientError>;

    /// Start a new game under the given card; returns the first frame
    async fn start_game(&self, game_id: &str, card_id: &str) -> Result<Frame, ClientError>;

    /// Execute one action against a running game; returns the raw response
    /// frame, which may be a single snapshot or an animation bundle
    async fn execute_action(
        &self,
        game_id: &str,
        guid: &str,
        action: &GameAction,
        card_id: Option<&str>,
    ) -> Result<Frame, ClientError>;

    /// Close a scoring card once the run reaches a terminal state
    async fn close_scoring_card(&self, card_id: &str) -> Result<(), ClientError>;
}

// ============================================================================
// Client configuration
// ============================================================================

/// Configuration for the HTTP game client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
    pub headers: HashMap<String, String>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout_secs: Some(60),
            headers: HashMap::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

// ============================================================================
// HTTP implementation
// ============================================================================

/// HTTP client for the remote game API
pub struct HttpGameClient {
    client: Client,
    config: ClientConfig,
}

impl HttpGameClient {
    pub fn new(config: ClientConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs.unwrap_or(60)))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, ClientError> {
        let mut req = self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .json(body);

        if let Some(api_key) = &self.config.api_key {
            if !api_key.is_empty() {
                req = req.header("X-API-Key", api_key);
            }
        }

        for (key, value) in &self.config.headers {
            req = req.header(key, value);
        }

        let response = req.send().await.map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();

            if status == 429 {
                return Err(ClientError::RateLimited { retry_after: None });
            } else if status == 401 {
                return Err(ClientError::AuthenticationFailed);
            }

            return Err(ClientError::Api { status, message: text });
        }

        response.json().await.map_err(|e| ClientError::Parse(e.to_string()))
    }
}

/// Build the POST body for one action dispatch.
///
/// `ACTION6` carries `x`/`y`; `RESET` carries the scoring card id instead of
/// a guid requirement (a reset may start a fresh game under the same card).
fn action_body(
    game_id: &str,
    guid: &str,
    action: &GameAction,
    card_id: Option<&str>,
) -> serde_json::Value {
    let mut body = serde_json::json!({
        "game_id": game_id,
        "guid": guid,
    });

    if let Some((x, y)) = action.coordinates {
        body["x"] = serde_json::json!(x);
        body["y"] = serde_json::json!(y);
    }

    if action.name == ActionName::Reset {
        if let Some(card) = card_id {
            body["card_id"] = serde_json::json!(card);
        }
    }

    body
}

impl GameClient for HttpGameClient {
    async fn open_scoring_card(
        &self,
        tags: &[String],
        source_url: &str,
        metadata: serde_json::Value,
    ) -> Result<String, ClientError> {
        let body = serde_json::json!({
            "tags": tags,
            "source_url": source_url,
            "opaque": metadata,
        });

        let response: OpenCardResponse = self.post_json("/api/scorecard/open", &body).await?;
        Ok(response.card_id)
    }

    async fn start_game(&self, game_id: &str, card_id: &str) -> Result<Frame, ClientError> {
        let body = serde_json::json!({
            "game_id": game_id,
            "card_id": card_id,
        });

        self.post_json("/api/cmd/RESET", &body).await
    }

    async fn execute_action(
        &self,
        game_id: &str,
        guid: &str,
        action: &GameAction,
        card_id: Option<&str>,
    ) -> Result<Frame, ClientError> {
        action
            .validate()
            .map_err(|e| ClientError::Other(e.to_string()))?;

        let body = action_body(game_id, guid, action, card_id);
        let path = format!("/api/cmd/{}", action.name.as_str());
        self.post_json(&path, &body).await
    }

    async fn close_scoring_card(&self, card_id: &str) -> Result<(), ClientError> {
        let body = serde_json::json!({ "card_id": card_id });
        let _: serde_json::Value = self.post_json("/api/scorecard/close", &body).await?;
        Ok(())
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct OpenCardResponse {
    card_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_body_coordinates() {
        let body = action_body("ls20", "guid-1", &GameAction::at(3, 3), None);
        assert_eq!(body["game_id"], "ls20");
        assert_eq!(body["guid"], "guid-1");
        assert_eq!(body["x"], 3);
        assert_eq!(body["y"], 3);
        assert!(body.get("card_id").is_none());
    }

    #[test]
    fn test_action_body_simple() {
        let body = action_body("ls20", "guid-1", &GameAction::simple(ActionName::Action2), None);
        assert!(body.get("x").is_none());
        assert!(body.get("y").is_none());
    }

    #[test]
    fn test_action_body_reset_carries_card() {
        let action = GameAction::simple(ActionName::Reset);
        let body = action_body("ls20", "guid-1", &action, Some("card-9"));
        assert_eq!(body["card_id"], "card-9");
    }

    #[test]
    fn test_client_error_display() {
        let err = ClientError::Api { status: 503, message: "unavailable".into() };
        assert!(err.to_string().contains("503"));

        let err = ClientError::RateLimited { retry_after: Some(30) };
        assert!(err.to_string().contains("30"));
    }

    #[test]
    fn test_client_error_into_gridrun_error() {
        let err: gridrun_error::Error = ClientError::AuthenticationFailed.into();
        assert_eq!(err.kind(), gridrun_error::ErrorKind::AuthenticationFailed);

        let err: gridrun_error::Error =
            ClientError::Api { status: 500, message: "boom".into() }.into();
        assert_eq!(err.kind(), gridrun_error::ErrorKind::RemoteApiFailed);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::new("https://game.example/")
            .with_api_key("key-1")
            .with_timeout(30);
        assert_eq!(config.api_key.as_deref(), Some("key-1"));
        assert_eq!(config.timeout_secs, Some(30));

        let client = HttpGameClient::new(config);
        assert_eq!(client.base_url(), "https://game.example");
    }

    #[test]
    fn test_frame_response_shape_parses() {
        // the shape execute_action must accept
        let frame: Frame = serde_json::from_value(json!({
            "guid": "g-3",
            "gameId": "ls20",
            "frame": [[[0, 1]]],
            "score": 1,
            "state": "IN_PROGRESS",
            "actionCounter": 1,
            "maxActions": 80,
            "winScore": 10
        }))
        .unwrap();
        assert_eq!(frame.score, 1);
    }
}
