//! Telegram bot conversations
//!
//! Commands arrive as message text (`/start`, `/login`, `/logout`) or as inline
//! button payloads (`search`, `my_books`, `book_{id}`, `menu`). Multi-step
//! flows keep a small JSON state per chat in a [`ChatStore`]; the next plain message is
//! interpreted against it.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::{
        borrowing::CreateBorrowing,
        telegram::{InlineKeyboardButton, OutgoingMessage, Update},
        user::UserClaims,
    },
};

use super::{
    borrowings::BorrowingsService, catalog::CatalogService, redis::ChatStore, telegram::ChatSender,
    users::UsersService,
};

const LOGIN_HINT: &str = "Please log in first: /login <email> <password>";
const DATE_PROMPT: &str = "Enter the expected return date in YYYY-MM-DD format:";

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Search,
    MyBooks,
    LoginHelp,
    Login { email: String, password: String },
    Logout,
    Reserve { book_id: i32 },
    Text(String),
}

/// Parse the text of an incoming message
pub fn parse_message(text: &str) -> BotCommand {
    let text = text.trim();
    let mut parts = text.split_whitespace();
    match parts.next() {
        Some("/start") | Some("/menu") => BotCommand::Start,
        Some("/logout") => BotCommand::Logout,
        Some("/login") => match (parts.next(), parts.next()) {
            (Some(email), Some(password)) => BotCommand::Login {
                email: email.to_string(),
                password: password.to_string(),
            },
            _ => BotCommand::LoginHelp,
        },
        _ => BotCommand::Text(text.to_string()),
    }
}

/// Parse the payload of a pressed inline button
pub fn parse_callback(data: &str) -> BotCommand {
    match data {
        "search" => BotCommand::Search,
        "my_books" => BotCommand::MyBooks,
        "login" => BotCommand::LoginHelp,
        "menu" => BotCommand::Start,
        other => match other.strip_prefix("book_").and_then(|id| id.parse().ok()) {
            Some(book_id) => BotCommand::Reserve { book_id },
            None => BotCommand::Text(other.to_string()),
        },
    }
}

/// Pending question the bot asked a chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConversationState {
    AwaitingTitle,
    AwaitingReturnDate { book_id: i32 },
}

/// Text shown to a chat user for a failed operation
fn user_message(error: &AppError) -> String {
    match error {
        AppError::Database(_) | AppError::Internal(_) | AppError::ExternalService(_) => {
            "Something went wrong, please try again later.".to_string()
        }
        AppError::Authentication(_) => LOGIN_HINT.to_string(),
        AppError::Validation(msg) | AppError::BadRequest(msg) | AppError::NotFound(msg) => msg.clone(),
        other => other.to_string(),
    }
}

fn main_menu(chat_id: &str) -> OutgoingMessage {
    OutgoingMessage::text(chat_id, "Welcome to the library! What would you like to do?").with_keyboard(vec![
        vec![InlineKeyboardButton::new("🔎 Search a book", "search")],
        vec![InlineKeyboardButton::new("📚 My books", "my_books")],
        vec![InlineKeyboardButton::new("🔑 Log in", "login")],
    ])
}

#[derive(Clone)]
pub struct BotService {
    store: Arc<dyn ChatStore>,
    users: UsersService,
    catalog: CatalogService,
    borrowings: BorrowingsService,
    chat: Arc<dyn ChatSender>,
}

impl BotService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        users: UsersService,
        catalog: CatalogService,
        borrowings: BorrowingsService,
        chat: Arc<dyn ChatSender>,
    ) -> Self {
        Self {
            store,
            users,
            catalog,
            borrowings,
            chat,
        }
    }

    /// Process one webhook update and send the reply
    pub async fn handle_update(&self, update: Update) -> AppResult<()> {
        let (chat_id, command) = if let Some(callback) = update.callback_query {
            if let Err(e) = self.chat.answer_callback(&callback.id).await {
                tracing::warn!("Failed to answer callback query: {}", e);
            }
            match (callback.message, callback.data) {
                (Some(message), Some(data)) => (message.chat.id.to_string(), parse_callback(&data)),
                _ => return Ok(()),
            }
        } else if let Some(message) = update.message {
            match message.text {
                Some(text) => (message.chat.id.to_string(), parse_message(&text)),
                None => return Ok(()),
            }
        } else {
            tracing::debug!(update_id = update.update_id, "Ignoring update without message");
            return Ok(());
        };

        let reply = match self.respond(&chat_id, command).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, "Bot command failed: {}", e);
                OutgoingMessage::text(&chat_id, user_message(&e))
            }
        };
        self.chat.send(&reply).await
    }

    async fn respond(&self, chat_id: &str, command: BotCommand) -> AppResult<OutgoingMessage> {
        match command {
            BotCommand::Start => Ok(main_menu(chat_id)),
            BotCommand::LoginHelp => Ok(OutgoingMessage::text(
                chat_id,
                "To log in send: /login <email> <password>",
            )),
            BotCommand::Search => {
                self.save_state(chat_id, &ConversationState::AwaitingTitle).await?;
                Ok(OutgoingMessage::text(chat_id, "Enter the title of the book:"))
            }
            BotCommand::MyBooks => self.my_books(chat_id).await,
            BotCommand::Reserve { book_id } => {
                self.session(chat_id).await?;
                self.save_state(chat_id, &ConversationState::AwaitingReturnDate { book_id })
                    .await?;
                Ok(OutgoingMessage::text(chat_id, DATE_PROMPT))
            }
            BotCommand::Login { email, password } => self.login(chat_id, &email, &password).await,
            BotCommand::Logout => self.logout(chat_id).await,
            BotCommand::Text(text) => self.answer(chat_id, &text).await,
        }
    }

    /// Plain text: an answer to the pending question, if any
    async fn answer(&self, chat_id: &str, text: &str) -> AppResult<OutgoingMessage> {
        let state = match self.store.take_bot_state(chat_id).await? {
            Some(raw) => serde_json::from_str::<ConversationState>(&raw).ok(),
            None => None,
        };

        match state {
            Some(ConversationState::AwaitingTitle) => self.search(chat_id, text).await,
            Some(ConversationState::AwaitingReturnDate { book_id }) => {
                self.reserve(chat_id, book_id, text).await
            }
            None => Ok(OutgoingMessage::text(chat_id, "Send /start to see what I can do.")),
        }
    }

    async fn search(&self, chat_id: &str, title: &str) -> AppResult<OutgoingMessage> {
        let Some(book) = self.catalog.find_by_title(title).await? else {
            return Ok(OutgoingMessage::text(
                chat_id,
                format!("No book matching \"{}\" was found.", title),
            )
            .with_keyboard(vec![vec![InlineKeyboardButton::new("🔎 Search again", "search")]]));
        };

        let text = format!(
            "📖 {}\nAuthor: {}\nCover: {}\nAvailable copies: {}\nDaily fee: {}",
            book.title, book.author, book.cover, book.inventory, book.daily_fee
        );
        Ok(OutgoingMessage::text(chat_id, text).with_keyboard(vec![vec![
            InlineKeyboardButton::new("Book this book", format!("book_{}", book.id)),
            InlineKeyboardButton::new("Not this time", "menu"),
        ]]))
    }

    async fn reserve(&self, chat_id: &str, book_id: i32, text: &str) -> AppResult<OutgoingMessage> {
        let Ok(expected_return_date) = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d") else {
            self.save_state(chat_id, &ConversationState::AwaitingReturnDate { book_id })
                .await?;
            return Ok(OutgoingMessage::text(
                chat_id,
                format!("Invalid date format. {}", DATE_PROMPT),
            ));
        };

        let claims = self.session(chat_id).await?;
        let details = self
            .borrowings
            .create_borrowing(
                &claims,
                CreateBorrowing {
                    book_id,
                    expected_return_date,
                },
            )
            .await?;

        Ok(OutgoingMessage::text(
            chat_id,
            format!(
                "✅ {} is reserved for you until {}.",
                details.book.title, details.expected_return_date
            ),
        ))
    }

    async fn my_books(&self, chat_id: &str) -> AppResult<OutgoingMessage> {
        let claims = self.session(chat_id).await?;
        let borrowings = self.borrowings.active_for_user(claims.user_id).await?;

        if borrowings.is_empty() {
            return Ok(OutgoingMessage::text(chat_id, "You have no borrowed books."));
        }

        let lines: Vec<String> = borrowings
            .iter()
            .map(|b| format!("• {} (return by {})", b.book_title, b.expected_return_date))
            .collect();
        Ok(OutgoingMessage::text(
            chat_id,
            format!("Your books:\n{}", lines.join("\n")),
        ))
    }

    async fn login(&self, chat_id: &str, email: &str, password: &str) -> AppResult<OutgoingMessage> {
        let (token, user) = match self.users.authenticate(email, password).await {
            Ok(result) => result,
            Err(AppError::Authentication(_)) => {
                return Ok(OutgoingMessage::text(chat_id, "Invalid email or password."));
            }
            Err(e) => return Err(e),
        };

        self.store.save_chat_id(&user.email, chat_id).await?;
        self.store.save_session_token(chat_id, &token).await?;
        tracing::info!(user_id = user.id, "Chat linked to user");

        Ok(OutgoingMessage::text(
            chat_id,
            format!("Welcome, {}! You will receive notifications here.", user.first_name),
        ))
    }

    async fn logout(&self, chat_id: &str) -> AppResult<OutgoingMessage> {
        if let Some(token) = self.store.get_session_token(chat_id).await? {
            if let Ok(claims) = self.users.claims_from_token(&token) {
                self.store.delete_chat_id(&claims.sub).await?;
            }
            self.store.delete_session_token(chat_id).await?;
        }
        Ok(OutgoingMessage::text(chat_id, "You have been logged out."))
    }

    /// Claims of the user logged in from this chat
    async fn session(&self, chat_id: &str) -> AppResult<UserClaims> {
        let token = self
            .store
            .get_session_token(chat_id)
            .await?
            .ok_or_else(|| AppError::Authentication("No session for chat".to_string()))?;

        match self.users.claims_from_token(&token) {
            Ok(claims) => Ok(claims),
            Err(e) => {
                self.store.delete_session_token(chat_id).await?;
                Err(e)
            }
        }
    }

    async fn save_state(&self, chat_id: &str, state: &ConversationState) -> AppResult<()> {
        let raw = serde_json::to_string(state)
            .map_err(|e| AppError::Internal(format!("Failed to serialize bot state: {}", e)))?;
        self.store.save_bot_state(chat_id, &raw).await
    }
}
