//! Borrowing endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::borrowing::{BorrowingDetails, BorrowingQuery, BorrowingShort, CreateBorrowing},
};

use super::{AuthenticatedUser, MessageResponse, PaginatedResponse};

/// List borrowings (own, or any user's for administrators)
#[utoipa::path(
    get,
    path = "/borrowings",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    params(BorrowingQuery),
    responses(
        (status = 200, description = "List of borrowings", body = PaginatedResponse<BorrowingShort>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_borrowings(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<BorrowingQuery>,
) -> AppResult<Json<PaginatedResponse<BorrowingShort>>> {
    let (borrowings, total) = state.services.borrowings.list_borrowings(&claims, &query).await?;

    Ok(Json(PaginatedResponse::new(borrowings, total, query.page, query.per_page)))
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/borrowings",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    request_body = CreateBorrowing,
    responses(
        (status = 201, description = "Borrowing created with its pending payment", body = BorrowingDetails),
        (status = 400, description = "Expected return date before today", body = crate::error::ErrorResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Book out of stock", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_borrowing(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateBorrowing>,
) -> AppResult<(StatusCode, Json<BorrowingDetails>)> {
    let borrowing = state.services.borrowings.create_borrowing(&claims, request).await?;
    Ok((StatusCode::CREATED, Json(borrowing)))
}

/// Get borrowing details
#[utoipa::path(
    get,
    path = "/borrowings/{id}",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrowing ID")
    ),
    responses(
        (status = 200, description = "Borrowing details", body = BorrowingDetails),
        (status = 403, description = "Not the borrower"),
        (status = 404, description = "Borrowing not found")
    )
)]
pub async fn get_borrowing(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BorrowingDetails>> {
    let borrowing = state.services.borrowings.get_borrowing(id, &claims).await?;
    Ok(Json(borrowing))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/borrowings/{id}/return",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrowing ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = MessageResponse),
        (status = 403, description = "Not the borrower"),
        (status = 404, description = "Borrowing not found"),
        (status = 409, description = "Already returned", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_borrowing(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    let message = state.services.borrowings.return_borrowing(id, &claims).await?;
    Ok(Json(MessageResponse::new(message)))
}
