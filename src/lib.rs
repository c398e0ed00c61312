//! LibraBook library management server
//!
//! Server-rendered web application for registering readers, confirming their
//! accounts by email, and borrowing and returning books.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;
pub mod templates;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    pub pages: templates::PageRenderer,
    pub limiter: Arc<api::rate_limit::GlobalRateLimiter>,
}
