use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use deskbot_core::errors::SendError;

const SLACK_API_BASE_URL: &str = "https://slack.com/api";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SlackApiError {
    #[error("slack client could not be built: {0}")]
    Client(String),
    #[error("slack network error: {0}")]
    Network(String),
    #[error("slack api error: {0}")]
    Api(String),
    #[error("slack response could not be parsed: {0}")]
    Parse(String),
}

impl From<SlackApiError> for SendError {
    fn from(error: SlackApiError) -> Self {
        match error {
            SlackApiError::Api(detail) => SendError::Rejected(detail),
            other => SendError::Transport(other.to_string()),
        }
    }
}

/// Body of a `chat.postMessage` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PostMessage {
    pub channel: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn post_message(&self, message: &PostMessage) -> Result<(), SlackApiError>;
}

#[async_trait]
impl<T> ChatApi for std::sync::Arc<T>
where
    T: ChatApi + ?Sized,
{
    async fn post_message(&self, message: &PostMessage) -> Result<(), SlackApiError> {
        (**self).post_message(message).await
    }
}

pub struct SlackWebClient {
    client: reqwest::Client,
    bot_token: SecretString,
    base_url: String,
}

impl SlackWebClient {
    pub fn new(bot_token: SecretString, request_timeout: Duration) -> Result<Self, SlackApiError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|error| SlackApiError::Client(error.to_string()))?;

        Ok(Self { client, bot_token, base_url: SLACK_API_BASE_URL.to_owned() })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }
}

#[async_trait]
impl ChatApi for SlackWebClient {
    async fn post_message(&self, message: &PostMessage) -> Result<(), SlackApiError> {
        let response = self
            .client
            .post(self.api_url("chat.postMessage"))
            .bearer_auth(self.bot_token.expose_secret())
            .json(message)
            .send()
            .await
            .map_err(|error| SlackApiError::Network(error.to_string()))?;

        let status = response.status();
        let body = response
            .json::<Value>()
            .await
            .map_err(|error| SlackApiError::Parse(format!("status {status}: {error}")))?;

        check_ok(&body)
    }
}

/// Slack answers HTTP 200 for most failures and reports them in the body.
fn check_ok(body: &Value) -> Result<(), SlackApiError> {
    if body.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(());
    }

    let detail = body.get("error").and_then(Value::as_str).unwrap_or("unknown_error");
    Err(SlackApiError::Api(detail.to_owned()))
}
