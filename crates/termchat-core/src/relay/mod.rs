//! In-process publish/subscribe relay between chat sessions.

pub mod bus;

pub use bus::{RelayBus, Subscription};
