//! Data models for LibraBook

pub mod book;
pub mod user;

pub use book::{Book, BookPage, BookQuery, BorrowedBook, SortField};
pub use user::{SessionAccount, UserSummary};
