//! MessageStore trait definition.
//!
//! Durable, per-pair message log. Participants are addressed by username;
//! the store maps each unordered pair to a single `ChatIdentity`.

use chrono::{DateTime, Utc};
use termchat_types::chat::{ChatIdentity, Message};
use termchat_types::error::StoreError;

/// Repository trait for encrypted personal messages.
///
/// Implementations live in termchat-infra (e.g., `SqliteMessageStore`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
///
/// Read operations never create a chat identity: a pair that has never
/// talked yields an empty list. Unknown usernames are always
/// `StoreError::UserNotFound`.
pub trait MessageStore: Send + Sync {
    /// Get or create the identity of the unordered pair `(p1, p2)`.
    ///
    /// Idempotent and symmetric. Concurrent first-time callers for the same
    /// pair all observe the same identity.
    fn resolve_chat_identity(
        &self,
        p1: &str,
        p2: &str,
    ) -> impl std::future::Future<Output = Result<ChatIdentity, StoreError>> + Send;

    /// Look up the identity of a pair without creating it.
    fn find_chat_identity(
        &self,
        p1: &str,
        p2: &str,
    ) -> impl std::future::Future<Output = Result<Option<ChatIdentity>, StoreError>> + Send;

    /// Encrypt and append a message with a server-assigned timestamp.
    ///
    /// Fails with `ChatNotFound` if the chat does not exist or `sender` is
    /// not one of its participants.
    fn append(
        &self,
        sender: &str,
        chat: ChatIdentity,
        plaintext: &str,
    ) -> impl std::future::Future<Output = Result<Message, StoreError>> + Send;

    /// Full history of a pair, ascending by `sent_at` then id.
    fn history(
        &self,
        p1: &str,
        p2: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, StoreError>> + Send;

    /// Messages strictly after `cutoff`, ascending.
    fn history_since(
        &self,
        p1: &str,
        p2: &str,
        cutoff: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, StoreError>> + Send;

    /// The last `n` messages of a pair, ascending.
    fn recent(
        &self,
        p1: &str,
        p2: &str,
        n: usize,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, StoreError>> + Send;

    /// Usernames `participant` shares a chat identity with, sorted.
    fn partners(
        &self,
        participant: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>, StoreError>> + Send;
}
