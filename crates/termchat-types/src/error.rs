use thiserror::Error;

/// Errors from message store operations.
///
/// Backend details are carried for logging but never shown to users:
/// `Backend` displays as a generic failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user '{0}' not found")]
    UserNotFound(String),

    #[error("chat not found")]
    ChatNotFound,

    #[error("store failure")]
    Backend(String),
}

impl StoreError {
    /// Backend detail for logs, if this is a backend failure.
    pub fn detail(&self) -> Option<&str> {
        match self {
            StoreError::Backend(detail) => Some(detail),
            _ => None,
        }
    }
}

/// Errors from the user directory.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("email already registered")]
    EmailTaken,

    #[error("username already taken")]
    UsernameTaken,

    #[error("user not found")]
    NotFound,

    #[error("invalid password")]
    InvalidCredentials,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("directory failure")]
    Backend(String),
}

/// A relay payload that does not have the shape of a message or a close signal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayPayloadError {
    #[error("malformed relay payload: expected 2 or 3 fields, got {0}")]
    FieldCount(usize),

    #[error("malformed relay payload: bad timestamp")]
    Timestamp,
}

/// Rejected session state transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Please login first")]
    NotAuthenticated,

    #[error("already in a chat")]
    AlreadyInChat,

    #[error("not in a chat")]
    NotInChat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_backend_display_hides_detail() {
        let err = StoreError::Backend("database is locked".to_string());
        assert_eq!(err.to_string(), "store failure");
        assert_eq!(err.detail(), Some("database is locked"));
    }

    #[test]
    fn test_store_user_not_found_names_user() {
        let err = StoreError::UserNotFound("carol".to_string());
        assert_eq!(err.to_string(), "user 'carol' not found");
        assert!(err.detail().is_none());
    }

    #[test]
    fn test_register_conflicts_are_distinct() {
        assert_ne!(
            UserError::EmailTaken.to_string(),
            UserError::UsernameTaken.to_string()
        );
    }
}
