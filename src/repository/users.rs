//! Users repository for database operations

use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::AppResult,
    models::user::{Credentials, NewUser, SessionAccount, UserSummary},
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Check if email already exists
    pub async fn email_exists(&self, email: &str) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_table WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// Insert a new unactivated, non-admin account on the given connection
    pub async fn insert(&self, conn: &mut PgConnection, user: &NewUser<'_>) -> AppResult<i32> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO user_table (email, username, password, confirmation, token, is_activated, is_admin)
            VALUES ($1, $2, $3, $4, $5, FALSE, FALSE)
            RETURNING id
            "#,
        )
        .bind(user.email)
        .bind(user.username)
        .bind(user.password_hash)
        .bind(user.confirmation)
        .bind(user.token)
        .fetch_one(conn)
        .await?;

        Ok(id)
    }

    /// Activate the pending account holding this confirmation identifier.
    /// Returns the activated user id, `None` when nothing matched.
    pub async fn activate(&self, confirmation: &str) -> AppResult<Option<i32>> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE user_table
            SET is_activated = TRUE, confirmation = NULL
            WHERE confirmation = $1 AND is_activated = FALSE
            RETURNING id
            "#,
        )
        .bind(confirmation)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    /// Password hash and pending OTP for a login attempt
    pub async fn get_credentials(&self, email: &str) -> AppResult<Option<Credentials>> {
        let credentials = sqlx::query_as::<_, Credentials>(
            "SELECT id, password, otp FROM user_table WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credentials)
    }

    /// Replace the session token and drop any pending OTP
    pub async fn start_session(&self, id: i32, token: &str) -> AppResult<()> {
        sqlx::query("UPDATE user_table SET token = $1, otp = NULL WHERE id = $2")
            .bind(token)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_password(&self, id: i32, password_hash: &str) -> AppResult<()> {
        sqlx::query("UPDATE user_table SET password = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Store a one-time password, overwriting the previous one.
    /// Returns false when no account has this email.
    pub async fn set_otp(&self, email: &str, otp: &str) -> AppResult<bool> {
        let result = sqlx::query("UPDATE user_table SET otp = $1 WHERE LOWER(email) = LOWER($2)")
            .bind(otp)
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Resolve a session token to its account
    pub async fn get_by_session_token(&self, token: &str) -> AppResult<Option<SessionAccount>> {
        let account = sqlx::query_as::<_, SessionAccount>(
            "SELECT id, email, username, is_activated, is_admin FROM user_table WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// All accounts for the admin list
    pub async fn list(&self) -> AppResult<Vec<UserSummary>> {
        let users = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT id, email, is_activated AS activated, is_admin AS admin
            FROM user_table
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Recipients for bulk mail
    pub async fn list_emails(&self, limit: i64) -> AppResult<Vec<String>> {
        let emails = sqlx::query_scalar::<_, String>("SELECT email FROM user_table ORDER BY id LIMIT $1")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(emails)
    }

    /// Delete an account, releasing the books it holds.
    /// Returns the number of deleted accounts (0 or 1).
    pub async fn delete(&self, id: i32) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE books SET borrowed = FALSE
            WHERE id IN (SELECT book_id FROM borrowings WHERE user_id = $1)
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM borrowings WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM user_table WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected())
    }
}
