pub mod auth;
pub mod staff;

pub use auth::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
pub use staff::UpdatePermissionsRequest;
