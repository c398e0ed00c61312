//! Book model, catalog queries and pagination

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Books per catalog page
pub const PAGE_SIZE: i64 = 10;

/// `books` row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: i32,
    pub book_name: String,
    pub book_author: String,
    pub book_genre: String,
    pub book_date: Option<NaiveDate>,
    pub borrowed: bool,
    /// Derived from the id, never stored
    #[sqlx(skip)]
    pub image_filename: String,
}

impl Book {
    pub fn cover_filename(id: i32) -> String {
        format!("img{}.jpg", id)
    }

    pub fn with_cover(mut self) -> Self {
        self.image_filename = Self::cover_filename(self.id);
        self
    }
}

/// A book on a user's profile
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BorrowedBook {
    pub book_name: String,
    pub book_author: String,
    pub book_genre: String,
}

/// Columns the catalog may be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Id,
    Name,
    Author,
    Genre,
    Date,
}

impl SortField {
    /// Column name, safe to interpolate into ORDER BY
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::Name => "book_name",
            SortField::Author => "book_author",
            SortField::Genre => "book_genre",
            SortField::Date => "book_date",
        }
    }

    /// Parse user input against the allow-list, `None` when not listed
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "id" => Some(SortField::Id),
            "name" | "book_name" => Some(SortField::Name),
            "author" | "book_author" => Some(SortField::Author),
            "genre" | "book_genre" => Some(SortField::Genre),
            "date" | "book_date" => Some(SortField::Date),
            _ => None,
        }
    }

    /// Unknown or empty values fall back to the default order
    pub fn canonicalize(raw: Option<&str>) -> Self {
        raw.and_then(Self::parse).unwrap_or_default()
    }
}

/// Library page query string. `page` stays a string so that garbage maps to page 1.
#[derive(Debug, Default, Deserialize)]
pub struct BookQuery {
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
}

/// Highest page whose OFFSET still fits in an i64
pub const MAX_PAGE: i64 = i64::MAX / PAGE_SIZE;

/// Parse a 1-based page number; invalid or < 1 yields 1, huge values are capped at `MAX_PAGE`
pub fn parse_page(raw: Option<&str>) -> i64 {
    raw.and_then(|p| p.trim().parse::<i64>().ok())
        .filter(|p| *p >= 1)
        .map(|p| p.min(MAX_PAGE))
        .unwrap_or(1)
}

pub fn total_pages(total_rows: i64) -> i64 {
    (total_rows + PAGE_SIZE - 1) / PAGE_SIZE
}

/// Escape LIKE metacharacters and wrap for a substring match
pub fn like_pattern(filter: &str) -> String {
    let mut escaped = String::with_capacity(filter.len() + 2);
    escaped.push('%');
    for c in filter.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// One page of available books plus navigation data for the library template
#[derive(Debug, Clone, Serialize)]
pub struct BookPage {
    pub books: Vec<Book>,
    pub current_page: i64,
    pub total_pages: i64,
    /// 0 when there is no previous page
    pub prev_page: i64,
    /// 0 when there is no next page
    pub next_page: i64,
    pub pages: Vec<i64>,
    pub filter: String,
    pub sort: String,
}

impl BookPage {
    pub fn new(books: Vec<Book>, current_page: i64, total_pages: i64, filter: &str, sort: SortField) -> Self {
        let prev_page = if current_page > 1 { current_page - 1 } else { 0 };
        let next_page = if current_page < total_pages { current_page + 1 } else { 0 };

        Self {
            books,
            current_page,
            total_pages,
            prev_page,
            next_page,
            pages: (1..=total_pages).collect(),
            filter: filter.to_string(),
            sort: sort.column().to_string(),
        }
    }
}
