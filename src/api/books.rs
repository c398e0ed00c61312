//! Library, borrow/return and profile handlers

use axum::{
    extract::{Query, State},
    response::{Html, Redirect},
    Form,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::AppResult,
    models::BookQuery,
    AppState,
};

use super::SessionToken;

#[derive(Debug, Deserialize)]
pub struct BorrowForm {
    pub book_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct ReturnForm {
    pub book_name: String,
}

/// Paginated list of available books
pub async fn library(State(state): State<AppState>, Query(query): Query<BookQuery>) -> AppResult<Html<String>> {
    let page = state
        .services
        .catalog
        .list_available_books(query.filter.as_deref(), query.sort.as_deref(), query.page.as_deref())
        .await?;

    state.pages.render("library.html", &page)
}

pub async fn borrow(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
    Form(form): Form<BorrowForm>,
) -> AppResult<Redirect> {
    state.services.catalog.borrow_book(&token, form.book_id).await?;
    Ok(Redirect::to("/library"))
}

pub async fn return_book(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
    Form(form): Form<ReturnForm>,
) -> AppResult<Redirect> {
    state.services.catalog.return_book(&token, &form.book_name).await?;
    Ok(Redirect::to("/profile"))
}

/// Books held by the logged-in user
pub async fn profile(State(state): State<AppState>, SessionToken(token): SessionToken) -> AppResult<Html<String>> {
    let (username, borrowed_books) = state.services.catalog.list_borrowed_books(&token).await?;

    state.pages.render(
        "profile.html",
        &json!({ "username": username, "borrowed_books": borrowed_books }),
    )
}
