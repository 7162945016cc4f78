//! HTTP health endpoint.

pub mod response;
pub mod router;
