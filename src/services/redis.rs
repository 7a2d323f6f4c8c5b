//! Redis service: chat ids, chat session tokens and bot conversation state

use async_trait::async_trait;
use redis::{AsyncCommands, Client};

use crate::error::{AppError, AppResult};

/// Conversation state lives this long between two bot messages
const BOT_STATE_TTL_SECONDS: u64 = 10 * 60;

fn chat_id_key(email: &str) -> String {
    format!("telegram_id:{}", email.to_lowercase())
}

fn session_key(chat_id: &str) -> String {
    format!("jwt:{}", chat_id)
}

fn bot_state_key(chat_id: &str) -> String {
    format!("bot_state:{}", chat_id)
}

/// Resolves a user identity to the chat that should receive notifications
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    async fn chat_id_for(&self, email: &str) -> AppResult<Option<String>>;
}

/// Per-chat data the bot keeps between two updates
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Remember which chat belongs to a user
    async fn save_chat_id(&self, email: &str, chat_id: &str) -> AppResult<()>;
    async fn delete_chat_id(&self, email: &str) -> AppResult<()>;

    /// Store the API token used on behalf of a chat
    async fn save_session_token(&self, chat_id: &str, token: &str) -> AppResult<()>;
    async fn get_session_token(&self, chat_id: &str) -> AppResult<Option<String>>;
    async fn delete_session_token(&self, chat_id: &str) -> AppResult<()>;

    /// Store serialized conversation state for a chat
    async fn save_bot_state(&self, chat_id: &str, state: &str) -> AppResult<()>;
    /// Read and clear the conversation state of a chat
    async fn take_bot_state(&self, chat_id: &str) -> AppResult<Option<String>>;
}

#[derive(Clone)]
pub struct RedisService {
    client: Client,
    session_ttl_seconds: u64,
}

impl RedisService {
    /// Create a new Redis service and check the connection
    pub async fn new(url: &str, session_ttl_seconds: u64) -> AppResult<Self> {
        let service = Self::open(url, session_ttl_seconds)?;

        let mut conn = service.connection().await?;
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AppError::Internal(format!("Redis connection test failed: {}", e)))?;

        Ok(service)
    }

    /// Create the client without connecting
    pub fn open(url: &str, session_ttl_seconds: u64) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::Internal(format!("Failed to create Redis client: {}", e)))?;
        Ok(Self {
            client,
            session_ttl_seconds,
        })
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to get Redis connection: {}", e)))
    }

    pub async fn get_chat_id(&self, email: &str) -> AppResult<Option<String>> {
        let mut conn = self.connection().await?;
        conn.get(chat_id_key(email))
            .await
            .map_err(|e| AppError::Internal(format!("Failed to get chat id from Redis: {}", e)))
    }
}

#[async_trait]
impl ChatStore for RedisService {
    async fn save_chat_id(&self, email: &str, chat_id: &str) -> AppResult<()> {
        let mut conn = self.connection().await?;
        conn.set::<_, _, ()>(chat_id_key(email), chat_id)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to store chat id in Redis: {}", e)))
    }

    async fn delete_chat_id(&self, email: &str) -> AppResult<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(chat_id_key(email))
            .await
            .map_err(|e| AppError::Internal(format!("Failed to delete chat id from Redis: {}", e)))
    }

    /// Expires after the session TTL
    async fn save_session_token(&self, chat_id: &str, token: &str) -> AppResult<()> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(session_key(chat_id), token, self.session_ttl_seconds)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to store session token in Redis: {}", e)))
    }

    async fn get_session_token(&self, chat_id: &str) -> AppResult<Option<String>> {
        let mut conn = self.connection().await?;
        conn.get(session_key(chat_id))
            .await
            .map_err(|e| AppError::Internal(format!("Failed to get session token from Redis: {}", e)))
    }

    async fn delete_session_token(&self, chat_id: &str) -> AppResult<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(session_key(chat_id))
            .await
            .map_err(|e| AppError::Internal(format!("Failed to delete session token from Redis: {}", e)))
    }

    async fn save_bot_state(&self, chat_id: &str, state: &str) -> AppResult<()> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(bot_state_key(chat_id), state, BOT_STATE_TTL_SECONDS)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to store bot state in Redis: {}", e)))
    }

    async fn take_bot_state(&self, chat_id: &str) -> AppResult<Option<String>> {
        let mut conn = self.connection().await?;
        let key = bot_state_key(chat_id);
        let state: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to get bot state from Redis: {}", e)))?;
        if state.is_some() {
            conn.del::<_, ()>(&key)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to delete bot state from Redis: {}", e)))?;
        }
        Ok(state)
    }
}

#[async_trait]
impl RecipientDirectory for RedisService {
    async fn chat_id_for(&self, email: &str) -> AppResult<Option<String>> {
        self.get_chat_id(email).await
    }
}
