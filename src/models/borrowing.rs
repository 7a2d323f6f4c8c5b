//! Borrowing (loan) model and related types

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::book::BookShort;
use super::payment::{amount_for_days, Payment};
use crate::error::{AppError, AppResult};

/// Borrowing model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Borrowing {
    pub id: i32,
    pub book_id: i32,
    pub user_id: i32,
    pub borrow_date: NaiveDate,
    pub expected_return_date: NaiveDate,
    pub actual_return_date: Option<NaiveDate>,
}

impl Borrowing {
    pub fn is_returned(&self) -> bool {
        self.actual_return_date.is_some()
    }

    /// Days billed for the reserved period. A same-day loan bills one day.
    pub fn loan_days(&self) -> i64 {
        loan_days(self.borrow_date, self.expected_return_date)
    }

    /// Rental fee owed for this borrowing
    pub fn money_to_pay(&self, daily_fee: Decimal) -> Decimal {
        amount_for_days(daily_fee, self.loan_days())
    }

    /// Days past the expected return date, zero when on time
    pub fn overdue_days(&self, returned_on: NaiveDate) -> i64 {
        (returned_on - self.expected_return_date).num_days().max(0)
    }
}

/// Borrowing with its book and payments, as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BorrowingDetails {
    pub id: i32,
    pub book: BookShort,
    pub user_id: i32,
    pub borrow_date: NaiveDate,
    pub expected_return_date: NaiveDate,
    pub actual_return_date: Option<NaiveDate>,
    pub payments: Vec<Payment>,
}

impl BorrowingDetails {
    pub fn new(borrowing: Borrowing, book: BookShort, payments: Vec<Payment>) -> Self {
        Self {
            id: borrowing.id,
            book,
            user_id: borrowing.user_id,
            borrow_date: borrowing.borrow_date,
            expected_return_date: borrowing.expected_return_date,
            actual_return_date: borrowing.actual_return_date,
            payments,
        }
    }
}

/// Row of the borrowing list joined with the book title
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowingShort {
    pub id: i32,
    pub book_id: i32,
    pub book_title: String,
    pub user_id: i32,
    pub user_email: String,
    pub borrow_date: NaiveDate,
    pub expected_return_date: NaiveDate,
    pub actual_return_date: Option<NaiveDate>,
}

/// Create borrowing request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateBorrowing {
    pub book_id: i32,
    pub expected_return_date: NaiveDate,
}

/// Borrowing list filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BorrowingQuery {
    /// true: not yet returned, false: returned
    pub is_active: Option<bool>,
    /// Only honoured for administrators
    pub user_id: Option<i32>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Whole days between borrowing and the expected return, at least one.
pub fn loan_days(borrow_date: NaiveDate, expected_return_date: NaiveDate) -> i64 {
    (expected_return_date - borrow_date).num_days().max(1)
}

/// The expected return date may not precede the borrow date, nor lie more
/// than `max_loan_days` after it.
pub fn check_return_window(
    borrow_date: NaiveDate,
    expected_return_date: NaiveDate,
    max_loan_days: i64,
) -> AppResult<()> {
    if expected_return_date < borrow_date {
        return Err(AppError::InvalidDateRange);
    }
    if (expected_return_date - borrow_date).num_days() > max_loan_days {
        return Err(AppError::Validation(format!(
            "A book can be borrowed for at most {} days",
            max_loan_days
        )));
    }
    Ok(())
}
