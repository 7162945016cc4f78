//! Storage traits implemented by `termchat-infra`.

pub mod message;
pub mod user;
