//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, borrowings, health, payments, telegram, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Library Lending API",
        version = "0.3.0",
        description = "Book catalog, borrowing and payment REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Users
        users::register,
        users::login,
        users::me,
        users::update_me,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Borrowings
        borrowings::list_borrowings,
        borrowings::create_borrowing,
        borrowings::get_borrowing,
        borrowings::return_borrowing,
        // Payments
        payments::list_payments,
        payments::get_payment,
        payments::payment_success,
        payments::payment_cancel,
        payments::renew_session,
        // Telegram
        telegram::webhook,
    ),
    components(
        schemas(
            // Users
            crate::models::user::User,
            crate::models::user::RegisterUser,
            crate::models::user::UpdateProfile,
            crate::models::user::LoginRequest,
            crate::models::enums::Role,
            users::LoginResponse,
            // Books
            crate::models::book::Book,
            crate::models::book::BookShort,
            crate::models::book::BookInput,
            crate::models::enums::Cover,
            // Borrowings
            crate::models::borrowing::BorrowingDetails,
            crate::models::borrowing::BorrowingShort,
            crate::models::borrowing::CreateBorrowing,
            // Payments
            crate::models::payment::Payment,
            crate::models::enums::PaymentStatus,
            crate::models::enums::PaymentType,
            payments::PaymentStatusResponse,
            // Common
            crate::api::MessageResponse,
            health::HealthResponse,
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "users", description = "Registration, login and profile"),
        (name = "books", description = "Book catalog"),
        (name = "borrowings", description = "Borrowing and returning books"),
        (name = "payments", description = "Rental fees and fines"),
        (name = "telegram", description = "Chat bot webhook")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by secured paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
