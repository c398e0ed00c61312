//! Registration, activation, login, password change and OTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::user::{ChangePasswordForm, LoginForm, OtpForm, RegisterForm},
    services::tokens::generate_session_token,
    AppState,
};

use super::session_cookie;

/// Create an account, start its session and send the activation mail
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> AppResult<Response> {
    form.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    match state
        .services
        .accounts
        .register(form.email.trim(), form.username.trim(), &form.password)
        .await
    {
        Ok(registration) => {
            let jar = jar.add(session_cookie(
                registration.session_token,
                state.config.auth.secure_cookie,
            ));
            Ok((jar, Redirect::to("/checkmail")).into_response())
        }
        Err(AppError::AlreadyExists(_)) => {
            let page = state.pages.render(
                "register.html",
                &json!({ "message": "An account with this email already exists" }),
            )?;
            Ok((StatusCode::CONFLICT, page).into_response())
        }
        Err(e) => Err(e),
    }
}

pub async fn activate(State(state): State<AppState>, Path(link): Path<String>) -> AppResult<Redirect> {
    state.services.accounts.activate(&link).await?;
    Ok(Redirect::to("/login_form"))
}

/// Password or OTP login; issues a new session token
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> AppResult<(CookieJar, Redirect)> {
    form.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let token = generate_session_token();
    state
        .services
        .accounts
        .authenticate(form.email.trim(), &form.password, &token)
        .await?;

    let jar = jar.add(session_cookie(token, state.config.auth.secure_cookie));
    Ok((jar, Redirect::to("/library")))
}

pub async fn change_password(
    State(state): State<AppState>,
    Form(form): Form<ChangePasswordForm>,
) -> AppResult<Redirect> {
    form.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    state
        .services
        .accounts
        .change_password(form.email.trim(), &form.password, &form.newpassword)
        .await?;

    Ok(Redirect::to("/profile"))
}

/// Always redirects to the login page, whether or not the email is known
pub async fn send_otp(State(state): State<AppState>, Form(form): Form<OtpForm>) -> AppResult<Redirect> {
    form.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    state.services.accounts.request_otp(form.email.trim()).await?;
    Ok(Redirect::to("/login_form"))
}
