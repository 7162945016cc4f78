//! Cryptographic operations for TermChat.
//!
//! - `cipher`: AES-256-GCM sealing of message bodies at rest
//! - `password`: Argon2id password hashing for accounts

pub mod cipher;
pub mod password;
