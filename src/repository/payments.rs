//! Payments repository for database operations

use sqlx::{FromRow, PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::payment::{NewPayment, Payment, PaymentStatus},
};

use super::limit_offset;

/// A payment with the people and book it concerns
#[derive(Debug, Clone, FromRow)]
pub struct PaymentContext {
    #[sqlx(flatten)]
    pub payment: Payment,
    pub user_id: i32,
    pub user_email: String,
    pub book_title: String,
}

const CONTEXT_QUERY: &str = r#"
    SELECT p.*, b.user_id, u.email AS user_email, bk.title AS book_title
    FROM payments p
    JOIN borrowings b ON b.id = p.borrowing_id
    JOIN users u ON u.id = b.user_id
    JOIN books bk ON bk.id = b.book_id
"#;

#[derive(Clone)]
pub struct PaymentsRepository {
    pool: Pool<Postgres>,
}

impl PaymentsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get a payment together with its owner and book
    pub async fn get_context(&self, id: i32) -> AppResult<PaymentContext> {
        sqlx::query_as::<_, PaymentContext>(&format!("{} WHERE p.id = $1", CONTEXT_QUERY))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Payment with id {} not found", id)))
    }

    /// Payments attached to a borrowing
    pub async fn for_borrowing(&self, borrowing_id: i32) -> AppResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE borrowing_id = $1 ORDER BY id",
        )
        .bind(borrowing_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(payments)
    }

    /// Search payments, optionally restricted to one user's borrowings
    pub async fn search(
        &self,
        user_id: Option<i32>,
        status: Option<PaymentStatus>,
        page: Option<i64>,
        per_page: Option<i64>,
    ) -> AppResult<(Vec<Payment>, i64)> {
        let (limit, offset) = limit_offset(page, per_page);

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM payments p
            JOIN borrowings b ON b.id = p.borrowing_id
            WHERE ($1::int IS NULL OR b.user_id = $1)
              AND ($2::text IS NULL OR p.status = $2)
            "#,
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT p.* FROM payments p
            JOIN borrowings b ON b.id = p.borrowing_id
            WHERE ($1::int IS NULL OR b.user_id = $1)
              AND ($2::text IS NULL OR p.status = $2)
            ORDER BY p.id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((payments, total))
    }

    pub async fn insert(&self, conn: &mut PgConnection, payment: &NewPayment) -> AppResult<Payment> {
        let created = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (borrowing_id, status, type, money_to_pay)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(payment.borrowing_id)
        .bind(PaymentStatus::Pending)
        .bind(payment.payment_type)
        .bind(payment.money_to_pay)
        .fetch_one(conn)
        .await?;
        Ok(created)
    }

    /// Attach a provider checkout session to a payment
    pub async fn set_session(&self, id: i32, session_id: &str, session_url: &str) -> AppResult<Payment> {
        sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments SET session_id = $1, session_url = $2
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(session_url)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Payment with id {} not found", id)))
    }

    /// PENDING -> PAID. Returns false if the payment was already paid.
    pub async fn mark_paid(&self, id: i32) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE payments SET status = $1 WHERE id = $2 AND status = $3",
        )
        .bind(PaymentStatus::Paid)
        .bind(id)
        .bind(PaymentStatus::Pending)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
