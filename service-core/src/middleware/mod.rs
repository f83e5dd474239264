//! Tower/axum middleware shared by every HTTP service.

pub mod rate_limit;
pub mod security_headers;
pub mod tracing;
