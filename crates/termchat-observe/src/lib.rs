//! Observability setup for TermChat.

pub mod tracing_setup;
