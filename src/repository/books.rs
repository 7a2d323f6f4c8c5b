//! Books repository for database operations

use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookInput, BookQuery, BookShort},
};

use super::limit_offset;

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Search books with pagination
    pub async fn search(&self, query: &BookQuery) -> AppResult<(Vec<BookShort>, i64)> {
        let (limit, offset) = limit_offset(query.page, query.per_page);
        let pattern = query
            .title
            .as_ref()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(|t| format!("%{}%", t.to_lowercase()));

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM books WHERE ($1::text IS NULL OR LOWER(title) LIKE $1)",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let books = sqlx::query_as::<_, BookShort>(
            r#"
            SELECT id, title, author
            FROM books
            WHERE ($1::text IS NULL OR LOWER(title) LIKE $1)
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((books, total))
    }

    /// First book whose title contains `title` (case-insensitive)
    pub async fn find_by_title(&self, title: &str) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(
            "SELECT * FROM books WHERE LOWER(title) LIKE $1 ORDER BY id LIMIT 1",
        )
        .bind(format!("%{}%", title.trim().to_lowercase()))
        .fetch_optional(&self.pool)
        .await?;
        Ok(book)
    }

    /// Create a new book
    pub async fn create(&self, book: &BookInput) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, cover, inventory, daily_fee)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.cover)
        .bind(book.inventory)
        .bind(book.daily_fee)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    /// Replace a book's fields
    pub async fn update(&self, id: i32, book: &BookInput) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET title = $1, author = $2, cover = $3, inventory = $4, daily_fee = $5
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.cover)
        .bind(book.inventory)
        .bind(book.daily_fee)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Delete a book. Borrowings and payments go with it.
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(())
    }

    /// Lock the book row until the surrounding transaction ends
    pub async fn lock_by_id(&self, conn: &mut PgConnection, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Take one copy. Returns false when none is left.
    pub async fn decrement_inventory(&self, conn: &mut PgConnection, id: i32) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE books SET inventory = inventory - 1 WHERE id = $1 AND inventory > 0",
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Put one copy back
    pub async fn increment_inventory(&self, conn: &mut PgConnection, id: i32) -> AppResult<()> {
        sqlx::query("UPDATE books SET inventory = inventory + 1 WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }
}
