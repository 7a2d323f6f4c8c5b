//! Telegram Bot API client

use std::time::Duration;

use async_trait::async_trait;

use crate::{
    config::TelegramConfig,
    error::{AppError, AppResult},
    models::telegram::OutgoingMessage,
};

/// Delivers a chat message to one recipient
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatSender: Send + Sync {
    async fn send(&self, message: &OutgoingMessage) -> AppResult<()>;

    /// Stop the spinner on a pressed inline button
    async fn answer_callback(&self, callback_id: &str) -> AppResult<()>;
}

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    config: TelegramConfig,
}

impl TelegramClient {
    pub fn new(config: TelegramConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.config.api_url, self.config.bot_token, method)
    }

    async fn post<T: serde::Serialize + ?Sized>(&self, method: &str, body: &T) -> AppResult<()> {
        let response = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Telegram request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "Telegram {} returned {}: {}",
                method, status, body
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatSender for TelegramClient {
    async fn send(&self, message: &OutgoingMessage) -> AppResult<()> {
        if !self.config.enabled {
            tracing::debug!(chat_id = %message.chat_id, "Telegram disabled, message not sent: {}", message.text);
            return Ok(());
        }
        self.post("sendMessage", message).await
    }

    async fn answer_callback(&self, callback_id: &str) -> AppResult<()> {
        if !self.config.enabled {
            return Ok(());
        }
        self.post("answerCallbackQuery", &serde_json::json!({ "callback_query_id": callback_id }))
            .await
    }
}
