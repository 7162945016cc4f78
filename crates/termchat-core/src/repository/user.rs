//! UserDirectory trait definition.

use termchat_types::error::UserError;
use termchat_types::user::Account;

/// Account storage with password verification.
///
/// Hashing and verification are owned by the implementation; callers only
/// ever hand over and compare plaintext passwords through this trait.
pub trait UserDirectory: Send + Sync {
    /// Register a new account.
    ///
    /// Email and username conflicts are reported as `EmailTaken` and
    /// `UsernameTaken` respectively.
    fn create_account(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<Account, UserError>> + Send;

    /// Verify credentials. Unknown email is `NotFound`, wrong password is
    /// `InvalidCredentials`.
    fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<Account, UserError>> + Send;

    fn lookup_by_email(
        &self,
        email: &str,
    ) -> impl std::future::Future<Output = Result<Option<Account>, UserError>> + Send;

    fn lookup_by_username(
        &self,
        username: &str,
    ) -> impl std::future::Future<Output = Result<Option<Account>, UserError>> + Send;

    /// Accounts whose username starts with `prefix`, case-insensitive, sorted by name.
    fn search_by_name_prefix(
        &self,
        prefix: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Account>, UserError>> + Send;
}
