//! HTML page rendering

use axum::response::Html;
use serde::Serialize;
use std::sync::Arc;
use tera::{Context, Tera};

use crate::error::{AppError, AppResult};

const PAGES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("register.html", include_str!("../templates/register.html")),
    ("login.html", include_str!("../templates/login.html")),
    ("checkemail.html", include_str!("../templates/checkemail.html")),
    ("otp-page.html", include_str!("../templates/otp-page.html")),
    ("change-password.html", include_str!("../templates/change-password.html")),
    ("library.html", include_str!("../templates/library.html")),
    ("profile.html", include_str!("../templates/profile.html")),
    ("userList.html", include_str!("../templates/userList.html")),
];

/// Renders the embedded page templates
#[derive(Clone)]
pub struct PageRenderer {
    tera: Arc<Tera>,
}

impl PageRenderer {
    pub fn new() -> AppResult<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(PAGES.to_vec())
            .map_err(|e| AppError::Internal(format!("Failed to load page templates: {}", e)))?;

        Ok(Self { tera: Arc::new(tera) })
    }

    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> AppResult<Html<String>> {
        let context = Context::from_serialize(data)
            .map_err(|e| AppError::Internal(format!("Invalid context for {}: {}", name, e)))?;

        self.tera
            .render(name, &context)
            .map(Html)
            .map_err(|e| AppError::Internal(format!("Failed to render {}: {:?}", name, e)))
    }

    /// Render a page that takes no data
    pub fn render_static(&self, name: &str) -> AppResult<Html<String>> {
        self.render(name, &serde_json::json!({}))
    }
}
