//! HTTP handlers for generation-service.

pub mod auth;
pub mod generate;
pub mod health;
pub mod metrics;
pub mod user;
