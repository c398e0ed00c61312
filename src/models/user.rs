//! User account model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Row needed to check a login attempt
#[derive(Debug, Clone, FromRow)]
pub struct Credentials {
    pub id: i32,
    pub password: String,
    pub otp: Option<String>,
}

/// The account owning a session token
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SessionAccount {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub is_activated: bool,
    pub is_admin: bool,
}

impl SessionAccount {
    pub fn require_admin(&self) -> Result<(), crate::error::AppError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(crate::error::AppError::Forbidden(
                "Administrator privileges required".to_string(),
            ))
        }
    }

    pub fn require_activated(&self) -> Result<(), crate::error::AppError> {
        if self.is_activated {
            Ok(())
        } else {
            Err(crate::error::AppError::Forbidden(
                "Account is not activated, check your mailbox".to_string(),
            ))
        }
    }
}

/// Row of the admin user list
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserSummary {
    pub id: i32,
    pub email: String,
    pub activated: bool,
    pub admin: bool,
}

/// Row to insert at registration
#[derive(Debug)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub password_hash: &'a str,
    pub confirmation: &'a str,
    pub token: &'a str,
}

/// Registration form
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RegisterForm {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Login form
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginForm {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Change password form
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ChangePasswordForm {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[validate(length(min = 1, message = "New password is required"))]
    pub newpassword: String,
}

/// OTP request form
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct OtpForm {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
}

/// Admin broadcast form
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct BroadcastForm {
    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,
    #[validate(range(min = 1, max = 64, message = "Workers must be between 1 and 64"))]
    pub workers: Option<usize>,
}
