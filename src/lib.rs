//! Library lending server
//!
//! REST JSON API for a book catalog, borrowings with rental fees and late-return
//! fines, hosted checkout payments and Telegram notifications.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod policy;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Users
        .route("/users/register", post(api::users::register))
        .route("/users/login", post(api::users::login))
        .route("/users/me", get(api::users::me).put(api::users::update_me))
        // Books
        .route("/books", get(api::books::list_books).post(api::books::create_book))
        .route(
            "/books/:id",
            get(api::books::get_book)
                .put(api::books::update_book)
                .delete(api::books::delete_book),
        )
        // Borrowings
        .route(
            "/borrowings",
            get(api::borrowings::list_borrowings).post(api::borrowings::create_borrowing),
        )
        .route("/borrowings/:id", get(api::borrowings::get_borrowing))
        .route("/borrowings/:id/return", post(api::borrowings::return_borrowing))
        // Payments
        .route("/payments", get(api::payments::list_payments))
        .route("/payments/:id", get(api::payments::get_payment))
        .route("/payments/:id/success", get(api::payments::payment_success))
        .route("/payments/:id/cancel", get(api::payments::payment_cancel))
        .route("/payments/:id/session", post(api::payments::renew_session))
        // Telegram
        .route("/telegram/webhook", post(api::telegram::webhook))
        .with_state(state);

    // OpenAPI documentation
    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}
