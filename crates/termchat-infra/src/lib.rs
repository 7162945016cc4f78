//! Infrastructure layer for TermChat.
//!
//! Contains implementations of the storage traits defined in `termchat-core`:
//! SQLite storage for accounts and encrypted messages, AES-256-GCM message
//! sealing, Argon2id password hashing, and configuration file loading.

pub mod config;
pub mod crypto;
pub mod sqlite;
