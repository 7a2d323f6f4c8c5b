//! Repository layer for database operations
//!
//! Read-only queries run on the pool. Methods that take a `&mut PgConnection`
//! are meant to run inside a caller-owned transaction (see [`Repository::begin`]).

pub mod books;
pub mod borrowings;
pub mod payments;
pub mod users;

use sqlx::{Pool, Postgres, Transaction};

use crate::error::AppResult;

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: books::BooksRepository,
    pub borrowings: borrowings::BorrowingsRepository,
    pub payments: payments::PaymentsRepository,
    pub users: users::UsersRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            borrowings: borrowings::BorrowingsRepository::new(pool.clone()),
            payments: payments::PaymentsRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            pool,
        }
    }

    /// Start a transaction. Dropping it without `commit` rolls back.
    pub async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    /// Round-trip to the database for the readiness check
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Normalized `(page, per_page)` from optional query parameters
pub fn page_params(page: Option<i64>, per_page: Option<i64>) -> (i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    (page, per_page)
}

/// `(limit, offset)` for a page
pub fn limit_offset(page: Option<i64>, per_page: Option<i64>) -> (i64, i64) {
    let (page, per_page) = page_params(page, per_page);
    (per_page, (page - 1) * per_page)
}
