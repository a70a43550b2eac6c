use crate::core::notify::{MessageRef, StatusSink};
use crate::telegram::types::{ApiResponse, Message, Update};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Long-poll timeout passed to getUpdates. The HTTP client timeout sits
/// above it so a quiet poll is not mistaken for a network failure.
pub const POLL_TIMEOUT_SECS: u64 = 50;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("telegram api error: {0}")]
    Api(String),
}

/// Minimal Bot API client: just the three methods this bot needs.
pub struct TelegramApi {
    http: reqwest::Client,
    base: String,
}

impl TelegramApi {
    pub fn new(token: &str) -> Self {
        Self::with_base("https://api.telegram.org", token)
    }

    /// Point the client at a different server, for tests.
    pub fn with_base(base_url: &str, token: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 25))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base: format!("{}/bot{}", base_url.trim_end_matches('/'), token),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &serde_json::Value,
    ) -> Result<T, ApiError> {
        let url = format!("{}/{}", self.base, method);
        let response: ApiResponse<T> = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            return Err(ApiError::Api(
                response
                    .description
                    .unwrap_or_else(|| format!("{method} failed without description")),
            ));
        }
        response
            .result
            .ok_or_else(|| ApiError::Api(format!("{method} returned no result")))
    }

    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, ApiError> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": POLL_TIMEOUT_SECS,
                "allowed_updates": ["message"],
            }),
        )
        .await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<Message, ApiError> {
        self.call(
            "sendMessage",
            &json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
            }),
        )
        .await
    }

    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), ApiError> {
        // The result is the edited Message or `true`; neither is needed.
        let _: serde_json::Value = self
            .call(
                "editMessageText",
                &json!({
                    "chat_id": chat_id,
                    "message_id": message_id,
                    "text": text,
                    "parse_mode": "HTML",
                    "disable_web_page_preview": true,
                }),
            )
            .await?;
        Ok(())
    }
}

/// Status messages for one batch land in a fixed chat; the sink hides the
/// Bot API behind the notifier's seam.
pub struct ChatStatusSink {
    api: Arc<TelegramApi>,
    chat_id: i64,
}

impl ChatStatusSink {
    pub fn new(api: Arc<TelegramApi>, chat_id: i64) -> Self {
        Self { api, chat_id }
    }
}

#[async_trait]
impl StatusSink for ChatStatusSink {
    async fn send(&self, text: &str) -> anyhow::Result<MessageRef> {
        let message = self.api.send_message(self.chat_id, text).await?;
        Ok(MessageRef {
            chat_id: self.chat_id,
            message_id: message.message_id,
        })
    }

    async fn edit(&self, message: &MessageRef, text: &str) -> anyhow::Result<()> {
        self.api
            .edit_message_text(message.chat_id, message.message_id, text)
            .await?;
        Ok(())
    }
}
