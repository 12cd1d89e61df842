//! Book catalog service

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
    repository::Repository,
};

#[derive(Clone)]
pub struct BooksService {
    repository: Repository,
}

impl BooksService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Create a new book
    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        if self.repository.books.isbn_exists(&book.isbn).await? {
            return Err(AppError::Conflict(format!(
                "Book with ISBN {} already exists",
                book.isbn
            )));
        }
        self.repository.books.create(&book).await
    }

    /// Get a book by ID
    pub async fn get_book(&self, id: Uuid) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    /// List books with search, sort and pagination
    pub async fn list_books(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        self.repository.books.list(query).await
    }

    /// Update a book's catalog fields
    pub async fn update_book(&self, id: Uuid, book: UpdateBook) -> AppResult<Book> {
        self.repository.books.update(id, &book).await
    }
}
