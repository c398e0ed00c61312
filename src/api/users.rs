//! Administration handlers

use axum::{
    extract::{Path, State},
    response::{Html, Redirect},
    Form, Json,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::user::BroadcastForm,
    services::email::BulkSendReport,
    AppState,
};

use super::SessionToken;

/// All accounts, admins only
pub async fn user_list(State(state): State<AppState>, SessionToken(token): SessionToken) -> AppResult<Html<String>> {
    let users = state.services.accounts.list_users(&token).await?;
    state.pages.render("userList.html", &json!({ "users": users }))
}

pub async fn delete_user(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
    Path(id): Path<i32>,
) -> AppResult<Redirect> {
    state.services.accounts.delete_user(&token, id).await?;
    Ok(Redirect::to("/userList"))
}

/// Mail a message to registered users and report per-recipient failures
pub async fn broadcast(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
    Form(form): Form<BroadcastForm>,
) -> AppResult<Json<BulkSendReport>> {
    form.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let workers = form.workers.unwrap_or(state.config.email.bulk_workers);
    let report = state
        .services
        .accounts
        .broadcast(&token, &form.message, workers)
        .await?;

    Ok(Json(report))
}
