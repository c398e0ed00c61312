//! Books and borrowings repository

use chrono::Utc;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::book::{like_pattern, Book, BorrowedBook, SortField, PAGE_SIZE},
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// One page of books that are not borrowed, with the total number of matching rows.
    ///
    /// The filter is bound as a parameter; the sort column comes from the
    /// `SortField` allow-list and is the only interpolated identifier.
    pub async fn search_available(
        &self,
        filter: Option<&str>,
        sort: SortField,
        page: i64,
    ) -> AppResult<(Vec<Book>, i64)> {
        let offset = (page.max(1) - 1).saturating_mul(PAGE_SIZE);
        let pattern = filter.map(like_pattern);

        let mut where_clause = "WHERE borrowed = FALSE".to_string();
        if pattern.is_some() {
            where_clause.push_str(
                " AND (book_name ILIKE $1 OR book_author ILIKE $1 OR book_genre ILIKE $1)",
            );
        }

        let count_query = format!("SELECT COUNT(*) FROM books {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        if let Some(ref pattern) = pattern {
            count_builder = count_builder.bind(pattern);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let order_by = match sort {
            SortField::Id => "id".to_string(),
            other => format!("{}, id", other.column()),
        };

        let select_query = format!(
            r#"
            SELECT id, book_name, book_author, book_genre, book_date, borrowed
            FROM books
            {}
            ORDER BY {}
            LIMIT {} OFFSET {}
            "#,
            where_clause, order_by, PAGE_SIZE, offset
        );

        let mut select_builder = sqlx::query_as::<_, Book>(&select_query);
        if let Some(ref pattern) = pattern {
            select_builder = select_builder.bind(pattern);
        }
        let books = select_builder
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Book::with_cover)
            .collect();

        Ok((books, total))
    }

    /// Record a borrowing and flag the book, atomically
    pub async fn borrow(&self, book_id: i32, user_id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let borrowed: Option<bool> =
            sqlx::query_scalar("SELECT borrowed FROM books WHERE id = $1 FOR UPDATE")
                .bind(book_id)
                .fetch_optional(&mut *tx)
                .await?;

        match borrowed {
            None => return Err(AppError::NotFound(format!("Book with id {} not found", book_id))),
            Some(true) => return Err(AppError::AlreadyBorrowed(book_id)),
            Some(false) => {}
        }

        sqlx::query("INSERT INTO borrowings (book_id, user_id, borrowed_at) VALUES ($1, $2, $3)")
            .bind(book_id)
            .bind(user_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                let err = AppError::from(e);
                if err.is_unique_violation() {
                    AppError::AlreadyBorrowed(book_id)
                } else {
                    err
                }
            })?;

        sqlx::query("UPDATE books SET borrowed = TRUE WHERE id = $1")
            .bind(book_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Return the user's oldest borrowing of a book with this exact name.
    /// Returns the released book id, `None` when the user holds no such book.
    pub async fn return_by_name(&self, user_id: i32, book_name: &str) -> AppResult<Option<i32>> {
        let mut tx = self.pool.begin().await?;

        let book_id: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT br.book_id
            FROM borrowings br
            JOIN books b ON b.id = br.book_id
            WHERE br.user_id = $1 AND b.book_name = $2
            ORDER BY br.borrowed_at, br.id
            LIMIT 1
            FOR UPDATE OF br
            "#,
        )
        .bind(user_id)
        .bind(book_name)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(book_id) = book_id else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM borrowings WHERE book_id = $1 AND user_id = $2")
            .bind(book_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE books SET borrowed = FALSE WHERE id = $1")
            .bind(book_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Some(book_id))
    }

    /// Books currently held by a user
    pub async fn borrowed_by_user(&self, user_id: i32) -> AppResult<Vec<BorrowedBook>> {
        let books = sqlx::query_as::<_, BorrowedBook>(
            r#"
            SELECT b.book_name, b.book_author, b.book_genre
            FROM books b
            JOIN borrowings br ON b.id = br.book_id
            WHERE br.user_id = $1
            ORDER BY br.borrowed_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }
}
