//! Borrowings repository for database operations

use chrono::NaiveDate;
use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::borrowing::{Borrowing, BorrowingShort},
};

use super::limit_offset;

/// Filters applied to borrowing lists
#[derive(Debug, Clone, Default)]
pub struct BorrowingFilter {
    pub user_id: Option<i32>,
    pub is_active: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

const SHORT_COLUMNS: &str = r#"
    b.id, b.book_id, bk.title AS book_title, b.user_id, u.email AS user_email,
    b.borrow_date, b.expected_return_date, b.actual_return_date
"#;

#[derive(Clone)]
pub struct BorrowingsRepository {
    pool: Pool<Postgres>,
}

impl BorrowingsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get borrowing by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Borrowing> {
        sqlx::query_as::<_, Borrowing>("SELECT * FROM borrowings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrowing with id {} not found", id)))
    }

    /// Search borrowings with filters and pagination
    pub async fn search(&self, filter: &BorrowingFilter) -> AppResult<(Vec<BorrowingShort>, i64)> {
        let (limit, offset) = limit_offset(filter.page, filter.per_page);

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM borrowings b
            WHERE ($1::int IS NULL OR b.user_id = $1)
              AND ($2::bool IS NULL OR (b.actual_return_date IS NULL) = $2)
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.is_active)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, BorrowingShort>(&format!(
            r#"
            SELECT {}
            FROM borrowings b
            JOIN books bk ON bk.id = b.book_id
            JOIN users u ON u.id = b.user_id
            WHERE ($1::int IS NULL OR b.user_id = $1)
              AND ($2::bool IS NULL OR (b.actual_return_date IS NULL) = $2)
            ORDER BY b.id
            LIMIT $3 OFFSET $4
            "#,
            SHORT_COLUMNS
        ))
        .bind(filter.user_id)
        .bind(filter.is_active)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((rows, total))
    }

    /// Active (not returned) borrowings of a user, oldest first
    pub async fn active_for_user(&self, user_id: i32) -> AppResult<Vec<BorrowingShort>> {
        let rows = sqlx::query_as::<_, BorrowingShort>(&format!(
            r#"
            SELECT {}
            FROM borrowings b
            JOIN books bk ON bk.id = b.book_id
            JOIN users u ON u.id = b.user_id
            WHERE b.user_id = $1 AND b.actual_return_date IS NULL
            ORDER BY b.expected_return_date, b.id
            "#,
            SHORT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Lock the borrowing row until the surrounding transaction ends
    pub async fn lock_by_id(&self, conn: &mut PgConnection, id: i32) -> AppResult<Borrowing> {
        sqlx::query_as::<_, Borrowing>("SELECT * FROM borrowings WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrowing with id {} not found", id)))
    }

    pub async fn insert(
        &self,
        conn: &mut PgConnection,
        book_id: i32,
        user_id: i32,
        borrow_date: NaiveDate,
        expected_return_date: NaiveDate,
    ) -> AppResult<Borrowing> {
        let borrowing = sqlx::query_as::<_, Borrowing>(
            r#"
            INSERT INTO borrowings (book_id, user_id, borrow_date, expected_return_date)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(user_id)
        .bind(borrow_date)
        .bind(expected_return_date)
        .fetch_one(conn)
        .await?;
        Ok(borrowing)
    }

    /// Set the return date. Only an unreturned borrowing can be updated.
    pub async fn mark_returned(
        &self,
        conn: &mut PgConnection,
        id: i32,
        returned_on: NaiveDate,
    ) -> AppResult<Borrowing> {
        sqlx::query_as::<_, Borrowing>(
            r#"
            UPDATE borrowings SET actual_return_date = $1
            WHERE id = $2 AND actual_return_date IS NULL
            RETURNING *
            "#,
        )
        .bind(returned_on)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::Conflict(format!("Borrowing {} cannot be returned", id)))
    }
}
