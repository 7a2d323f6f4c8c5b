//! Catalog management service

use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        book::{Book, BookInput, BookQuery, BookShort},
        user::UserClaims,
    },
    policy::{Access, AccessPolicy},
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Search books by title
    pub async fn search_books(&self, query: &BookQuery) -> AppResult<(Vec<BookShort>, i64)> {
        self.repository.books.search(query).await
    }

    /// Get book by ID with full details
    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    /// First book whose title contains `title`
    pub async fn find_by_title(&self, title: &str) -> AppResult<Option<Book>> {
        self.repository.books.find_by_title(title).await
    }

    pub async fn create_book(&self, actor: Option<&UserClaims>, book: BookInput) -> AppResult<Book> {
        AccessPolicy::AdminOrReadOnly.authorize(actor, Access::Write)?;
        book.validate()?;

        let created = self.repository.books.create(&book).await?;
        tracing::info!(book_id = created.id, "Book created: {}", created.title);
        Ok(created)
    }

    pub async fn update_book(&self, actor: Option<&UserClaims>, id: i32, book: BookInput) -> AppResult<Book> {
        AccessPolicy::AdminOrReadOnly.authorize(actor, Access::Write)?;
        book.validate()?;

        self.repository.books.update(id, &book).await
    }

    pub async fn delete_book(&self, actor: Option<&UserClaims>, id: i32) -> AppResult<()> {
        AccessPolicy::AdminOrReadOnly.authorize(actor, Access::Write)?;

        self.repository.books.delete(id).await?;
        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }
}
