//! HTTP handlers for identity-service.

pub mod auth;
pub mod metrics;
pub mod staff;
pub mod user;
