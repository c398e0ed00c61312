//! Form pages that carry no data

use axum::{extract::State, response::Html};

use crate::{error::AppResult, AppState};

pub async fn register_page(State(state): State<AppState>) -> AppResult<Html<String>> {
    state.pages.render_static("register.html")
}

pub async fn login_page(State(state): State<AppState>) -> AppResult<Html<String>> {
    state.pages.render_static("login.html")
}

pub async fn check_mail_page(State(state): State<AppState>) -> AppResult<Html<String>> {
    state.pages.render_static("checkemail.html")
}

pub async fn otp_page(State(state): State<AppState>) -> AppResult<Html<String>> {
    state.pages.render_static("otp-page.html")
}

pub async fn change_password_page(State(state): State<AppState>) -> AppResult<Html<String>> {
    state.pages.render_static("change-password.html")
}
