//! Registered accounts and handle validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::UserError;

/// Longest accepted username.
pub const MAX_USERNAME_LEN: usize = 32;

/// A registered account. The password hash stays inside the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Usernames are 1-32 characters of ASCII letters, digits, `_` or `-`.
///
/// This keeps handles free of the relay delimiter and of whitespace, which
/// the line protocol uses to split arguments.
pub fn validate_username(username: &str) -> Result<(), UserError> {
    if username.is_empty() || username.len() > MAX_USERNAME_LEN {
        return Err(UserError::InvalidInput(format!(
            "username must be 1-{MAX_USERNAME_LEN} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(UserError::InvalidInput(
            "username may only contain letters, digits, '_' and '-'".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), UserError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(UserError::InvalidInput("invalid email address".to_string())),
    }
}
