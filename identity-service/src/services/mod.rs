//! Services layer for identity-service.
//!
//! Business logic for registration, login, token handling and permission
//! decisions, on top of the [`store`] seam.

mod auth;
pub mod error;
pub mod metrics;
pub mod permissions;
mod registration;
pub mod store;
pub mod tokens;

pub use auth::{AuthService, LoginOutcome};
pub use error::ServiceError;
pub use permissions::{decide, Decision, DenyReason, PermissionEvaluator};
pub use registration::{Registration, RegistrationOutcome, RegistrationService};
pub use tokens::{AccessTokenClaims, TokenService, ACCESS_TOKEN_TTL_MINUTES};
