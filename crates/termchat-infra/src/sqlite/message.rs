//! SQLite message store.
//!
//! Implements `MessageStore` from `termchat-core`. Bodies are sealed with
//! `MessageCipher` before they reach the database and opened per row on the
//! way out; a row that fails to open is returned with a placeholder body
//! instead of failing the whole query.
//!
//! Pair identities rely on the `UNIQUE(participant_low, participant_high)`
//! index: resolution is an `INSERT .. ON CONFLICT DO NOTHING` followed by a
//! lookup on the writer, so concurrent first contacts converge on one row.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use sqlx::Row;
use termchat_core::repository::message::MessageStore;
use termchat_types::chat::{
    ChatIdentity, ChatKind, DECRYPTION_FAILED_PLACEHOLDER, Message, canonical_pair,
};
use termchat_types::error::StoreError;
use tracing::warn;

use super::format_datetime;
use super::pool::DatabasePool;
use crate::crypto::cipher::MessageCipher;

const SELECT_MESSAGES: &str = r#"SELECT m.id, m.sender_id, u.username AS sender_name, m.chat_id,
       m.chat_type, m.ciphertext, m.sent_at
  FROM messages m
  JOIN users u ON u.id = m.sender_id
 WHERE m.chat_type = 'personal' AND m.chat_id = ?"#;

/// SQLite-backed implementation of `MessageStore`.
pub struct SqliteMessageStore {
    pool: DatabasePool,
    cipher: MessageCipher,
    /// Last assigned `sent_at`, keeps timestamps non-decreasing.
    last_sent_at: AtomicI64,
}

impl SqliteMessageStore {
    pub fn new(pool: DatabasePool, cipher: MessageCipher) -> Self {
        Self {
            pool,
            cipher,
            last_sent_at: AtomicI64::new(0),
        }
    }

    fn next_timestamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self.last_sent_at.fetch_max(now, Ordering::AcqRel);
        previous.max(now)
    }

    async fn participant(&self, username: &str) -> Result<Participant, StoreError> {
        let row = sqlx::query("SELECT id, username FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(backend)?
            .ok_or_else(|| StoreError::UserNotFound(username.to_string()))?;
        Ok(Participant {
            id: row.try_get("id").map_err(backend)?,
            username: row.try_get("username").map_err(backend)?,
        })
    }

    async fn canonical_ids(&self, p1: &str, p2: &str) -> Result<(i64, i64), StoreError> {
        let a = self.participant(p1).await?;
        let b = self.participant(p2).await?;
        Ok(canonical_pair(a.id, b.id))
    }

    /// Append with an explicit timestamp (unix ms) or the store clock.
    async fn append_with(
        &self,
        sender: &str,
        chat: ChatIdentity,
        plaintext: &str,
        sent_at: Option<i64>,
    ) -> Result<Message, StoreError> {
        let sender = self.participant(sender).await?;

        let participants: Option<(i64, i64)> = sqlx::query_as(
            "SELECT participant_low, participant_high FROM personal_chats WHERE id = ?",
        )
        .bind(chat.get())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(backend)?;
        match participants {
            Some((low, high)) if low == sender.id || high == sender.id => {}
            _ => return Err(StoreError::ChatNotFound),
        }

        let ciphertext = self
            .cipher
            .seal(plaintext)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let sent_at = sent_at.unwrap_or_else(|| self.next_timestamp());

        let result = sqlx::query(
            "INSERT INTO messages (sender_id, chat_type, chat_id, ciphertext, sent_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(sender.id)
        .bind(ChatKind::Personal.as_str())
        .bind(chat.get())
        .bind(&ciphertext)
        .bind(sent_at)
        .execute(&self.pool.writer)
        .await
        .map_err(backend)?;

        Ok(Message {
            id: result.last_insert_rowid(),
            sender_id: sender.id,
            sender_name: sender.username,
            chat_id: chat,
            kind: ChatKind::Personal,
            content: plaintext.to_string(),
            sent_at: millis_to_datetime(sent_at)?,
        })
    }

    fn decode_rows(&self, rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<Message>, StoreError> {
        rows.iter()
            .map(|row| {
                MessageRow::from_row(row)
                    .map_err(backend)?
                    .into_message(&self.cipher)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Private Row types
// ---------------------------------------------------------------------------

struct Participant {
    id: i64,
    username: String,
}

struct MessageRow {
    id: i64,
    sender_id: i64,
    sender_name: String,
    chat_id: i64,
    chat_type: String,
    ciphertext: String,
    sent_at: i64,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            sender_id: row.try_get("sender_id")?,
            sender_name: row.try_get("sender_name")?,
            chat_id: row.try_get("chat_id")?,
            chat_type: row.try_get("chat_type")?,
            ciphertext: row.try_get("ciphertext")?,
            sent_at: row.try_get("sent_at")?,
        })
    }

    fn into_message(self, cipher: &MessageCipher) -> Result<Message, StoreError> {
        let kind: ChatKind = self.chat_type.parse().map_err(StoreError::Backend)?;
        let content = match cipher.open(&self.ciphertext) {
            Ok(content) => content,
            Err(err) => {
                warn!(message_id = self.id, error = %err, "stored message failed to decrypt");
                DECRYPTION_FAILED_PLACEHOLDER.to_string()
            }
        };
        Ok(Message {
            id: self.id,
            sender_id: self.sender_id,
            sender_name: self.sender_name,
            chat_id: ChatIdentity(self.chat_id),
            kind,
            content,
            sent_at: millis_to_datetime(self.sent_at)?,
        })
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Backend(format!("invalid sent_at: {ms}")))
}

// ---------------------------------------------------------------------------
// MessageStore implementation
// ---------------------------------------------------------------------------

impl MessageStore for SqliteMessageStore {
    async fn resolve_chat_identity(&self, p1: &str, p2: &str) -> Result<ChatIdentity, StoreError> {
        let (low, high) = self.canonical_ids(p1, p2).await?;

        sqlx::query(
            r#"INSERT INTO personal_chats (participant_low, participant_high, created_at)
               VALUES (?, ?, ?)
               ON CONFLICT(participant_low, participant_high) DO NOTHING"#,
        )
        .bind(low)
        .bind(high)
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool.writer)
        .await
        .map_err(backend)?;

        let id: i64 = sqlx::query_scalar(
            "SELECT id FROM personal_chats WHERE participant_low = ? AND participant_high = ?",
        )
        .bind(low)
        .bind(high)
        .fetch_one(&self.pool.writer)
        .await
        .map_err(backend)?;

        Ok(ChatIdentity(id))
    }

    async fn find_chat_identity(
        &self,
        p1: &str,
        p2: &str,
    ) -> Result<Option<ChatIdentity>, StoreError> {
        let (low, high) = self.canonical_ids(p1, p2).await?;
        let id: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM personal_chats WHERE participant_low = ? AND participant_high = ?",
        )
        .bind(low)
        .bind(high)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(backend)?;
        Ok(id.map(ChatIdentity))
    }

    async fn append(
        &self,
        sender: &str,
        chat: ChatIdentity,
        plaintext: &str,
    ) -> Result<Message, StoreError> {
        self.append_with(sender, chat, plaintext, None).await
    }

    async fn history(&self, p1: &str, p2: &str) -> Result<Vec<Message>, StoreError> {
        let Some(chat) = self.find_chat_identity(p1, p2).await? else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query(&format!("{SELECT_MESSAGES} ORDER BY m.sent_at ASC, m.id ASC"))
            .bind(chat.get())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(backend)?;
        self.decode_rows(&rows)
    }

    async fn history_since(
        &self,
        p1: &str,
        p2: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Message>, StoreError> {
        let Some(chat) = self.find_chat_identity(p1, p2).await? else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query(&format!(
            "{SELECT_MESSAGES} AND m.sent_at > ? ORDER BY m.sent_at ASC, m.id ASC"
        ))
        .bind(chat.get())
        .bind(cutoff.timestamp_millis())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(backend)?;
        self.decode_rows(&rows)
    }

    async fn recent(&self, p1: &str, p2: &str, n: usize) -> Result<Vec<Message>, StoreError> {
        let Some(chat) = self.find_chat_identity(p1, p2).await? else {
            return Ok(Vec::new());
        };
        if n == 0 {
            return Ok(Vec::new());
        }
        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        let rows = sqlx::query(&format!(
            "{SELECT_MESSAGES} ORDER BY m.sent_at DESC, m.id DESC LIMIT ?"
        ))
        .bind(chat.get())
        .bind(limit)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(backend)?;

        // Newest-first page, returned oldest-first.
        let mut messages = self.decode_rows(&rows)?;
        messages.reverse();
        Ok(messages)
    }

    async fn partners(&self, participant: &str) -> Result<Vec<String>, StoreError> {
        let me = self.participant(participant).await?;
        let names: Vec<String> = sqlx::query_scalar(
            r#"SELECT DISTINCT u.username
                 FROM personal_chats pc
                 JOIN users u ON u.id = CASE WHEN pc.participant_low = ?1
                                             THEN pc.participant_high
                                             ELSE pc.participant_low END
                WHERE pc.participant_low = ?1 OR pc.participant_high = ?1
                ORDER BY u.username"#,
        )
        .bind(me.id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(backend)?;
        Ok(names)
    }
}
