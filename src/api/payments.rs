//! Payment endpoints and checkout redirect targets

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::payment::{Payment, PaymentQuery},
    services::payments::PaymentConfirmation,
};

use super::{AuthenticatedUser, MessageResponse, PaginatedResponse};

/// Outcome of the checkout success redirect
#[derive(Serialize, ToSchema)]
pub struct PaymentStatusResponse {
    pub payment_id: i32,
    pub paid: bool,
    pub message: String,
}

/// List payments (own, or all for administrators)
#[utoipa::path(
    get,
    path = "/payments",
    tag = "payments",
    security(("bearer_auth" = [])),
    params(PaymentQuery),
    responses(
        (status = 200, description = "List of payments", body = PaginatedResponse<Payment>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_payments(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<PaymentQuery>,
) -> AppResult<Json<PaginatedResponse<Payment>>> {
    let (payments, total) = state.services.payments.list_payments(&claims, &query).await?;

    Ok(Json(PaginatedResponse::new(payments, total, query.page, query.per_page)))
}

/// Get payment details
#[utoipa::path(
    get,
    path = "/payments/{id}",
    tag = "payments",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Payment ID")
    ),
    responses(
        (status = 200, description = "Payment details", body = Payment),
        (status = 403, description = "Not the payer"),
        (status = 404, description = "Payment not found")
    )
)]
pub async fn get_payment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Payment>> {
    let payment = state.services.payments.get_payment(id, &claims).await?;
    Ok(Json(payment))
}

/// Checkout success redirect: verifies the session with the provider
#[utoipa::path(
    get,
    path = "/payments/{id}/success",
    tag = "payments",
    params(
        ("id" = i32, Path, description = "Payment ID")
    ),
    responses(
        (status = 200, description = "Payment status after checkout", body = PaymentStatusResponse),
        (status = 400, description = "Payment has no checkout session"),
        (status = 404, description = "Payment not found"),
        (status = 502, description = "Payment provider unavailable")
    )
)]
pub async fn payment_success(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<PaymentStatusResponse>> {
    let (paid, message) = match state.services.payments.confirm_payment(id).await? {
        PaymentConfirmation::Paid => (true, "Payment was successful!"),
        PaymentConfirmation::AlreadyPaid => (true, "Payment was already completed."),
        PaymentConfirmation::Incomplete => (false, "Payment is not completed yet."),
    };

    Ok(Json(PaymentStatusResponse {
        payment_id: id,
        paid,
        message: message.to_string(),
    }))
}

/// Checkout cancel redirect
#[utoipa::path(
    get,
    path = "/payments/{id}/cancel",
    tag = "payments",
    params(
        ("id" = i32, Path, description = "Payment ID")
    ),
    responses(
        (status = 200, description = "Payment left pending", body = MessageResponse),
        (status = 404, description = "Payment not found")
    )
)]
pub async fn payment_cancel(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    state.services.payments.cancel_payment(id).await?;
    Ok(Json(MessageResponse::new(
        "Payment can be paid a bit later (but the session is available for only 24h)",
    )))
}

/// Create a new checkout session for an unpaid payment
#[utoipa::path(
    post,
    path = "/payments/{id}/session",
    tag = "payments",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Payment ID")
    ),
    responses(
        (status = 200, description = "Payment with a fresh checkout session", body = Payment),
        (status = 403, description = "Not the payer"),
        (status = 409, description = "Payment already paid"),
        (status = 502, description = "Payment provider unavailable")
    )
)]
pub async fn renew_session(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Payment>> {
    let payment = state.services.payments.renew_session(id, &claims).await?;
    Ok(Json(payment))
}
