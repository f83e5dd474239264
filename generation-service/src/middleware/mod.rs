pub mod admin;
pub mod auth;
pub mod metrics;

pub use admin::admin_auth_middleware;
pub use auth::{auth_middleware, AuthUser};
pub use metrics::metrics_middleware;
