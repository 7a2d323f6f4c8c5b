//! Telegram webhook

use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};

use crate::{
    error::{AppError, AppResult},
    models::telegram::Update,
};

const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

/// Receive bot updates pushed by Telegram
#[utoipa::path(
    post,
    path = "/telegram/webhook",
    tag = "telegram",
    responses(
        (status = 200, description = "Update accepted"),
        (status = 401, description = "Bad or missing webhook secret")
    )
)]
pub async fn webhook(
    State(state): State<crate::AppState>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> AppResult<StatusCode> {
    if let Some(ref secret) = state.config.telegram.webhook_secret {
        let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if provided != Some(secret.as_str()) {
            return Err(AppError::Authentication("Invalid webhook secret".to_string()));
        }
    }

    // Always 200 once authenticated; handler failures are only logged
    if let Err(e) = state.services.bot.handle_update(update).await {
        tracing::warn!("Failed to handle Telegram update: {}", e);
    }
    Ok(StatusCode::OK)
}
