//! Chat orchestration: the service gluing store and relay together, the
//! per-connection state machine, and relay delivery classification.

pub mod delivery;
pub mod service;
pub mod session;
