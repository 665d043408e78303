pub mod auth;
pub mod metrics;
pub mod permission;

pub use auth::{auth_middleware, AuthPrincipal};
pub use metrics::metrics_middleware;
pub use permission::{authorize_middleware, PermissionGate};
