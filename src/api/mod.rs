//! HTTP handlers and router for the LibraBook pages

pub mod auth;
pub mod books;
pub mod health;
pub mod pages;
pub mod rate_limit;
pub mod users;

use std::time::Duration;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    middleware,
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{error::AppError, AppState};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "token";

/// Session token read from the `token` cookie
pub struct SessionToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);

        jar.get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|token| !token.is_empty())
            .map(SessionToken)
            .ok_or_else(|| AppError::Unauthenticated("Missing session cookie".to_string()))
    }
}

/// Session cookie carrying a freshly issued token
pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// Create the application router with all routes and layers
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_dir = std::path::Path::new(&state.config.server.static_dir);
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    let handlers = Router::new()
        // Pages
        .route("/", get(pages::register_page))
        .route("/login_form", get(pages::login_page))
        .route("/checkmail", get(pages::check_mail_page))
        .route("/otp", get(pages::otp_page))
        .route("/changepsswd", get(pages::change_password_page))
        // Accounts
        .route("/register", post(auth::register))
        .route("/activate/:link", get(auth::activate))
        .route("/login", post(auth::login))
        .route("/change", post(auth::change_password))
        .route("/sendotp", post(auth::send_otp))
        // Catalog
        .route("/library", get(books::library))
        .route("/borrow", post(books::borrow))
        .route("/return", post(books::return_book))
        .route("/profile", get(books::profile))
        // Administration
        .route("/userList", get(users::user_list))
        .route("/users/:id/delete", post(users::delete_user))
        .route("/admin/broadcast", post(users::broadcast))
        // Health
        .route("/health", get(health::health_check))
        .route_layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit::rate_limit,
        ));

    // Static assets are served outside the rate limit
    handlers
        .nest_service("/styles", ServeDir::new(static_dir.join("styles")))
        .nest_service("/book-covers", ServeDir::new(static_dir.join("book-covers")))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
