//! Chat orchestration and storage trait definitions for TermChat.
//!
//! This crate defines the "ports" (store and directory traits) that the
//! infrastructure layer implements, the in-process relay bus, and the chat
//! session state machine. It depends only on `termchat-types` -- never on
//! `termchat-infra` or any database/IO crate.

pub mod chat;
pub mod relay;
pub mod repository;
