//! Shared domain types for TermChat.
//!
//! Chat identities, stored messages, accounts, relay channels and payloads,
//! server configuration, and the error enums shared by every layer.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod relay;
pub mod user;
