//! HTTP client for the Kakomimasu match API

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client as HttpClient, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::api::GameApi;
use super::types::{AgentAction, ActionType, JoinRequest, JoinResponse, Match, SubmitResponse};
use crate::config::ApiConfig;
use crate::error::{KakomcpError, Result};

/// Error body returned by the API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorBody {
    #[serde(default)]
    error_code: Option<i64>,
    message: String,
}

/// Action as the API expects it
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireAction {
    agent_id: usize,
    #[serde(rename = "type")]
    kind: ActionType,
    x: i32,
    y: i32,
}

#[derive(Debug, Serialize)]
struct WireActions {
    actions: Vec<WireAction>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GuestJoin<'a> {
    guest_name: &'a str,
}

/// reqwest-backed [`GameApi`]
pub struct HttpGameApi {
    base_url: String,
    http_client: HttpClient,
    transition_marker: String,
}

impl HttpGameApi {
    /// Create a client from the `[api]` configuration section
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("kakomcp/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http_client,
            transition_marker: config.transition_marker.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Decode a successful body, or map the error body to a typed error
    async fn decode<T: serde::de::DeserializeOwned>(&self, response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_error(status.as_u16(), &body, &self.transition_marker))
    }
}

/// Turn a non-success API answer into an error, recognising transition-step
/// refusals by `marker` appearing in the message.
pub(crate) fn classify_error(status: u16, body: &str, marker: &str) -> KakomcpError {
    let message = match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => match parsed.error_code {
            Some(code) => format!("{} (errorCode {})", parsed.message, code),
            None => parsed.message,
        },
        Err(_) if body.trim().is_empty() => format!("HTTP {}", status),
        Err(_) => body.trim().to_string(),
    };

    if !marker.is_empty() && message.contains(marker) {
        KakomcpError::TransientTransition { message }
    } else {
        KakomcpError::Remote { status, message }
    }
}

#[async_trait]
impl GameApi for HttpGameApi {
    async fn join(&self, request: &JoinRequest) -> Result<JoinResponse> {
        let response = match request {
            JoinRequest::Ai(ai) => {
                debug!(ai = %ai.ai_name, board = %ai.board_name, "creating AI match");
                self.http_client
                    .post(self.url("/matches/ai/players"))
                    .json(ai)
                    .send()
                    .await?
            }
            JoinRequest::GameId { game_id, guest_name } => {
                debug!(game_id = %game_id, "joining match by id");
                self.http_client
                    .post(self.url(&format!("/matches/{}/players", game_id)))
                    .json(&GuestJoin { guest_name })
                    .send()
                    .await?
            }
        };
        self.decode(response).await
    }

    async fn get_match(&self, game_id: &str) -> Result<Match> {
        let response = self
            .http_client
            .get(self.url(&format!("/matches/{}", game_id)))
            .send()
            .await?;
        self.decode(response).await
    }

    async fn submit_actions(
        &self,
        game_id: &str,
        pic: &str,
        actions: &[AgentAction],
    ) -> Result<SubmitResponse> {
        let body = WireActions {
            actions: actions
                .iter()
                .map(|a| WireAction {
                    agent_id: a.agent_index,
                    kind: a.kind,
                    x: a.x,
                    y: a.y,
                })
                .collect(),
        };
        let response = self
            .http_client
            .patch(self.url(&format!("/matches/{}/actions", game_id)))
            .header(AUTHORIZATION, format!("PIC {}", pic))
            .json(&body)
            .send()
            .await?;
        self.decode(response).await
    }
}
