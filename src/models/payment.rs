//! Payment model and the canonical amount formulas

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

pub use super::enums::{PaymentStatus, PaymentType};
use crate::error::{AppError, AppResult};

/// Largest amount a `NUMERIC(10,2)` payment column holds (99 999 999.99)
pub const MAX_PAYMENT_AMOUNT: Decimal = Decimal::from_parts(999_999_999, 0, 0, false, 2);

/// Payment model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Payment {
    pub id: i32,
    pub borrowing_id: i32,
    pub status: PaymentStatus,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub payment_type: PaymentType,
    #[schema(value_type = String, example = "3.50")]
    pub money_to_pay: Decimal,
    pub session_id: Option<String>,
    pub session_url: Option<String>,
}

impl Payment {
    pub fn is_paid(&self) -> bool {
        self.status == PaymentStatus::Paid
    }
}

/// Payment row about to be inserted
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub borrowing_id: i32,
    pub payment_type: PaymentType,
    pub money_to_pay: Decimal,
}

/// Payment query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct PaymentQuery {
    pub status: Option<PaymentStatus>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// `daily_fee × days`, rounded half-up to cents.
pub fn amount_for_days(daily_fee: Decimal, days: i64) -> Decimal {
    (daily_fee * Decimal::from(days.max(0)))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Late-return penalty: `daily_fee × overdue_days × multiplier`, capped at
/// [`MAX_PAYMENT_AMOUNT`] so a very late return can still be recorded.
pub fn fine_amount(daily_fee: Decimal, overdue_days: i64, multiplier: Decimal) -> Decimal {
    amount_for_days(daily_fee, overdue_days)
        .checked_mul(multiplier)
        .map(|fine| fine.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        .map_or(MAX_PAYMENT_AMOUNT, |fine| fine.min(MAX_PAYMENT_AMOUNT))
}

/// Rental amounts above [`MAX_PAYMENT_AMOUNT`] cannot be stored or charged.
pub fn check_payment_amount(amount: Decimal) -> AppResult<()> {
    if amount > MAX_PAYMENT_AMOUNT {
        return Err(AppError::Validation(format!(
            "Amount {} exceeds the maximum payable amount of {}",
            amount, MAX_PAYMENT_AMOUNT
        )));
    }
    Ok(())
}

/// Converts an amount to the provider's smallest currency unit.
pub fn to_cents(amount: Decimal) -> Option<i64> {
    use rust_decimal::prelude::ToPrimitive;
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}
