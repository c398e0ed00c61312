//! Catalog browsing and borrow/return

use crate::{
    error::{AppError, AppResult},
    models::book::{parse_page, total_pages, BookPage, BorrowedBook, SortField},
    repository::Repository,
    services::accounts::AccountService,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    accounts: AccountService,
}

impl CatalogService {
    pub fn new(repository: Repository, accounts: AccountService) -> Self {
        Self { repository, accounts }
    }

    /// One page of books nobody holds. Bad page numbers fall back to 1 and
    /// unknown sort fields to the default order.
    pub async fn list_available_books(
        &self,
        filter: Option<&str>,
        sort: Option<&str>,
        page: Option<&str>,
    ) -> AppResult<BookPage> {
        let filter = filter.map(str::trim).filter(|f| !f.is_empty());
        let sort = SortField::canonicalize(sort);
        let page = parse_page(page);

        let (books, total) = self.repository.books.search_available(filter, sort, page).await?;

        Ok(BookPage::new(books, page, total_pages(total), filter.unwrap_or_default(), sort))
    }

    pub async fn borrow_book(&self, token: &str, book_id: i32) -> AppResult<()> {
        let account = self.accounts.resolve_session(token).await?;
        account.require_activated()?;

        if let Err(e) = self.repository.books.borrow(book_id, account.id).await {
            tracing::warn!(action = "borrow", user_id = account.id, book_id, error = %e, "Borrow refused");
            return Err(e);
        }

        tracing::info!(action = "borrow", user_id = account.id, book_id, "Book borrowed");
        Ok(())
    }

    pub async fn return_book(&self, token: &str, book_name: &str) -> AppResult<()> {
        let account = self.accounts.resolve_session(token).await?;
        account.require_activated()?;

        match self.repository.books.return_by_name(account.id, book_name).await? {
            Some(book_id) => {
                tracing::info!(action = "return", user_id = account.id, book_id, "Book returned");
                Ok(())
            }
            None => Err(AppError::NotBorrowedByUser(book_name.to_string())),
        }
    }

    /// Username and the books the session's account currently holds
    pub async fn list_borrowed_books(&self, token: &str) -> AppResult<(String, Vec<BorrowedBook>)> {
        let account = self.accounts.resolve_session(token).await?;
        let books = self.repository.books.borrowed_by_user(account.id).await?;

        Ok((account.username, books))
    }
}
