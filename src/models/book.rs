//! Book (catalog) model and related types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

pub use super::enums::Cover;

/// Book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub cover: Cover,
    /// Copies currently available for borrowing
    pub inventory: i32,
    #[schema(value_type = String, example = "0.50")]
    pub daily_fee: Decimal,
}

/// Short book representation for lists
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookShort {
    pub id: i32,
    pub title: String,
    pub author: String,
}

/// Book query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Case-insensitive substring of the title
    pub title: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Create or replace a book (admin only)
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BookInput {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,
    #[validate(
        length(min = 1, max = 255, message = "Author must be 1-255 characters"),
        custom(function = "validate_author_name")
    )]
    pub author: String,
    pub cover: Cover,
    #[validate(range(min = 0, message = "Inventory cannot be negative."))]
    pub inventory: i32,
    #[validate(custom(function = "validate_daily_fee"))]
    #[schema(value_type = String, example = "0.50")]
    pub daily_fee: Decimal,
}

/// Author names are letters, optionally separated by spaces, dots, hyphens or apostrophes.
pub fn validate_author_name(author: &str) -> Result<(), ValidationError> {
    let has_letter = author.chars().any(char::is_alphabetic);
    let only_name_chars = author
        .chars()
        .all(|c| c.is_alphabetic() || c.is_whitespace() || matches!(c, '.' | '-' | '\''));

    if has_letter && only_name_chars {
        Ok(())
    } else {
        let mut err = ValidationError::new("author");
        err.message = Some("Author name must contain only letters.".into());
        Err(err)
    }
}

pub fn validate_daily_fee(fee: &Decimal) -> Result<(), ValidationError> {
    if *fee > Decimal::ZERO && fee.round_dp(2) == *fee && *fee < Decimal::from(10_000) {
        Ok(())
    } else {
        let mut err = ValidationError::new("daily_fee");
        err.message = Some("Daily fee must be greater than 0 with at most 2 decimals.".into());
        Err(err)
    }
}
