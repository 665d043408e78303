use service_core::error::AppError;
use thiserror::Error;

use crate::services::store::StoreError;
use crate::utils::password::CredentialError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Malformed permission string: {0}")]
    PermissionConfig(String),

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Transaction failed: {0}")]
    Transaction(#[source] StoreError),

    #[error("Password hashing failed: {0}")]
    Hashing(#[from] CredentialError),

    #[error("Entropy source unavailable: {0}")]
    Entropy(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidCredentials => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid credentials"))
            }
            ServiceError::AccountInactive => {
                AppError::Unauthorized(anyhow::anyhow!("Account is inactive"))
            }
            ServiceError::InvalidToken => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token"))
            }
            ServiceError::DuplicateEmail => {
                AppError::Conflict(anyhow::anyhow!("Email already registered"))
            }
            ServiceError::NotFound(message) => AppError::NotFound(anyhow::anyhow!(message)),
            ServiceError::Transaction(e) | ServiceError::Store(e) => {
                AppError::DatabaseError(anyhow::Error::new(e))
            }
            ServiceError::Internal(e) => AppError::InternalError(e),
            other @ (ServiceError::PermissionConfig(_)
            | ServiceError::Hashing(_)
            | ServiceError::Entropy(_)) => AppError::InternalError(anyhow::Error::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use service_core::axum::{http::StatusCode, response::IntoResponse};

    fn status_of(err: ServiceError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_of(ServiceError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(ServiceError::AccountInactive), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(ServiceError::InvalidToken), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(ServiceError::DuplicateEmail), StatusCode::CONFLICT);
        assert_eq!(
            status_of(ServiceError::PermissionConfig("staff".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(ServiceError::Transaction(StoreError::Backend("boom".to_string()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(ServiceError::NotFound("Staff member not found".to_string())),
            StatusCode::NOT_FOUND
        );
    }
}
