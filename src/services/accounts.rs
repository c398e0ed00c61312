//! Account lifecycle: registration, activation, login, OTP and administration

use crate::{
    error::{AppError, AppResult},
    models::user::{NewUser, SessionAccount, UserSummary},
    repository::Repository,
    services::{
        credentials::{hash_password, verify_password},
        email::{BulkSendReport, MailNotifier},
        tokens::{constant_time_eq, generate_confirmation, generate_otp, generate_session_token},
    },
};

/// Recipients loaded for one broadcast
const BROADCAST_LIMIT: i64 = 1000;

/// Tokens issued by a successful registration
#[derive(Debug, Clone)]
pub struct Registration {
    pub user_id: i32,
    pub session_token: String,
    pub confirmation: String,
}

#[derive(Clone)]
pub struct AccountService {
    repository: Repository,
    notifier: MailNotifier,
}

impl AccountService {
    pub fn new(repository: Repository, notifier: MailNotifier) -> Self {
        Self { repository, notifier }
    }

    /// Create an unactivated account and mail its activation link.
    /// The row is only committed once the mail has been handed to the transport.
    pub async fn register(&self, email: &str, username: &str, password: &str) -> AppResult<Registration> {
        if self.repository.users.email_exists(email).await? {
            return Err(AppError::AlreadyExists(format!("Account {} already exists", email)));
        }

        let password_hash = hash_password(password)?;
        let confirmation = generate_confirmation();
        let session_token = generate_session_token();

        let mut tx = self.repository.pool.begin().await?;

        let user_id = self
            .repository
            .users
            .insert(
                &mut tx,
                &NewUser {
                    email,
                    username,
                    password_hash: &password_hash,
                    confirmation: &confirmation,
                    token: &session_token,
                },
            )
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    AppError::AlreadyExists(format!("Account {} already exists", email))
                } else {
                    e
                }
            })?;

        // Bounded by the notifier's send timeout, which config keeps below the request deadline
        if let Err(e) = self.notifier.send_confirmation(email, &confirmation).await {
            tracing::error!(action = "register", email = %email, error = %e, "Confirmation email failed, rolling back");
            tx.rollback().await?;
            return Err(match e {
                AppError::EmailDeliveryFailed(_) => e,
                other => AppError::EmailDeliveryFailed(other.to_string()),
            });
        }

        tx.commit().await?;

        tracing::info!(action = "register", email = %email, user_id, "Account registered");

        Ok(Registration {
            user_id,
            session_token,
            confirmation,
        })
    }

    /// Activate the account holding this confirmation identifier. Works once.
    pub async fn activate(&self, confirmation: &str) -> AppResult<()> {
        match self.repository.users.activate(confirmation).await? {
            Some(user_id) => {
                tracing::info!(action = "activate", user_id, "Account activated");
                Ok(())
            }
            None => Err(AppError::NotFound("Unknown or already used activation link".to_string())),
        }
    }

    /// Check a password (or pending OTP) and install `new_token` as the account's session
    pub async fn authenticate(&self, email: &str, password: &str, new_token: &str) -> AppResult<i32> {
        let credentials = self
            .repository
            .users
            .get_credentials(email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No account for {}", email)))?;

        let via_otp = credentials
            .otp
            .as_deref()
            .map(|otp| constant_time_eq(otp, password))
            .unwrap_or(false);

        if !via_otp && !verify_password(password, &credentials.password)? {
            tracing::warn!(action = "login", email = %email, "Incorrect password");
            return Err(AppError::IncorrectPassword);
        }

        self.repository.users.start_session(credentials.id, new_token).await?;

        tracing::info!(action = "login", email = %email, user_id = credentials.id, otp = via_otp, "User logged in");

        Ok(credentials.id)
    }

    pub async fn change_password(&self, email: &str, old_password: &str, new_password: &str) -> AppResult<()> {
        let credentials = self
            .repository
            .users
            .get_credentials(email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No account for {}", email)))?;

        if !verify_password(old_password, &credentials.password)? {
            tracing::warn!(action = "change_password", email = %email, "Incorrect password");
            return Err(AppError::IncorrectPassword);
        }

        let password_hash = hash_password(new_password)?;
        self.repository.users.update_password(credentials.id, &password_hash).await?;

        tracing::info!(action = "change_password", user_id = credentials.id, "Password changed");
        Ok(())
    }

    /// Store and mail a fresh one-time password. Never reports a failure to the caller.
    pub async fn request_otp(&self, email: &str) -> AppResult<()> {
        let code = generate_otp();

        match self.repository.users.set_otp(email, &code).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(action = "request_otp", email = %email, "OTP requested for unknown email");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(action = "request_otp", email = %email, error = %e, "Failed to store OTP");
                return Ok(());
            }
        }

        if let Err(e) = self.notifier.send_otp(email, &code).await {
            tracing::warn!(action = "request_otp", email = %email, error = %e, "OTP email not delivered");
        }

        Ok(())
    }

    /// Account owning a session token
    pub async fn resolve_session(&self, token: &str) -> AppResult<SessionAccount> {
        self.repository
            .users
            .get_by_session_token(token)
            .await?
            .ok_or_else(|| AppError::Unauthenticated("Invalid or expired session".to_string()))
    }

    pub async fn list_users(&self, token: &str) -> AppResult<Vec<UserSummary>> {
        let account = self.resolve_session(token).await?;
        account.require_admin()?;

        self.repository.users.list().await
    }

    /// Delete an account and release its books. Deleting a missing id succeeds.
    pub async fn delete_user(&self, token: &str, id: i32) -> AppResult<()> {
        let account = self.resolve_session(token).await?;
        account.require_admin()?;

        let deleted = self.repository.users.delete(id).await?;

        tracing::info!(action = "delete_user", user_id = id, admin_id = account.id, deleted, "User deleted");
        Ok(())
    }

    /// Mail `message` to registered users
    pub async fn broadcast(&self, token: &str, message: &str, workers: usize) -> AppResult<BulkSendReport> {
        let account = self.resolve_session(token).await?;
        account.require_admin()?;

        let recipients = self.repository.users.list_emails(BROADCAST_LIMIT).await?;
        tracing::info!(action = "broadcast", admin_id = account.id, recipients = recipients.len(), workers, "Starting broadcast");

        Ok(self.notifier.send_bulk(recipients, workers, message).await)
    }
}
