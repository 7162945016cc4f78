//! SQLite user directory.
//!
//! Implements `UserDirectory` from `termchat-core`. Password hashing runs on
//! the blocking pool so Argon2 never stalls the runtime.

use chrono::Utc;
use sqlx::Row;
use termchat_core::repository::user::UserDirectory;
use termchat_types::error::UserError;
use termchat_types::user::{Account, validate_email, validate_username};

use super::pool::DatabasePool;
use super::{format_datetime, is_unique_violation, parse_datetime};
use crate::crypto::password::PasswordHasher;

/// Maximum rows returned by a prefix search.
const SEARCH_LIMIT: i64 = 20;

/// SQLite-backed implementation of `UserDirectory`.
pub struct SqliteUserDirectory {
    pool: DatabasePool,
    hasher: PasswordHasher,
}

impl SqliteUserDirectory {
    pub fn new(pool: DatabasePool) -> Self {
        Self::with_hasher(pool, PasswordHasher::new())
    }

    pub fn with_hasher(pool: DatabasePool, hasher: PasswordHasher) -> Self {
        Self { pool, hasher }
    }

    async fn fetch_one_by(&self, column: &str, value: &str) -> Result<Option<AccountRow>, UserError> {
        let sql = format!(
            "SELECT id, email, username, password_hash, created_at FROM users WHERE {column} = ?"
        );
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(backend)?;
        row.as_ref()
            .map(AccountRow::from_row)
            .transpose()
            .map_err(backend)
    }
}

// ---------------------------------------------------------------------------
// Private Row type
// ---------------------------------------------------------------------------

struct AccountRow {
    id: i64,
    email: String,
    username: String,
    password_hash: String,
    created_at: String,
}

impl AccountRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_account(self) -> Result<Account, UserError> {
        let created_at = parse_datetime(&self.created_at)
            .ok_or_else(|| UserError::Backend(format!("invalid created_at for user {}", self.id)))?;
        Ok(Account {
            id: self.id,
            email: self.email,
            username: self.username,
            created_at,
        })
    }
}

fn backend(err: sqlx::Error) -> UserError {
    UserError::Backend(err.to_string())
}

/// Escape LIKE wildcards so a prefix matches literally.
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

// ---------------------------------------------------------------------------
// UserDirectory implementation
// ---------------------------------------------------------------------------

impl UserDirectory for SqliteUserDirectory {
    async fn create_account(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<Account, UserError> {
        validate_email(email)?;
        validate_username(username)?;
        if password.is_empty() {
            return Err(UserError::InvalidInput("password must not be empty".to_string()));
        }

        let hasher = self.hasher.clone();
        let plaintext = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| UserError::Backend(e.to_string()))?
            .map_err(|e| UserError::Backend(e.to_string()))?;

        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO users (email, username, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(email)
        .bind(username)
        .bind(&password_hash)
        .bind(format_datetime(&created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match is_unique_violation(&e) {
            Some(msg) if msg.contains("users.email") => UserError::EmailTaken,
            Some(msg) if msg.contains("users.username") => UserError::UsernameTaken,
            _ => backend(e),
        })?;

        tracing::info!(user_id = result.last_insert_rowid(), %username, "account created");

        Ok(Account {
            id: result.last_insert_rowid(),
            email: email.to_string(),
            username: username.to_string(),
            created_at,
        })
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Account, UserError> {
        let row = self
            .fetch_one_by("email", email)
            .await?
            .ok_or(UserError::NotFound)?;

        let hasher = self.hasher.clone();
        let plaintext = password.to_string();
        let stored = row.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &stored))
            .await
            .map_err(|e| UserError::Backend(e.to_string()))?
            .map_err(|e| UserError::Backend(e.to_string()))?;

        if !verified {
            return Err(UserError::InvalidCredentials);
        }
        row.into_account()
    }

    async fn lookup_by_email(&self, email: &str) -> Result<Option<Account>, UserError> {
        self.fetch_one_by("email", email)
            .await?
            .map(AccountRow::into_account)
            .transpose()
    }

    async fn lookup_by_username(&self, username: &str) -> Result<Option<Account>, UserError> {
        self.fetch_one_by("username", username)
            .await?
            .map(AccountRow::into_account)
            .transpose()
    }

    async fn search_by_name_prefix(&self, prefix: &str) -> Result<Vec<Account>, UserError> {
        let rows = sqlx::query(
            r#"SELECT id, email, username, password_hash, created_at FROM users
               WHERE username LIKE ? ESCAPE '\'
               ORDER BY username
               LIMIT ?"#,
        )
        .bind(like_prefix(prefix))
        .bind(SEARCH_LIMIT)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(backend)?;

        rows.iter()
            .map(|row| AccountRow::from_row(row).map_err(backend)?.into_account())
            .collect()
    }
}
