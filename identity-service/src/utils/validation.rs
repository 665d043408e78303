use service_core::axum::{
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use service_core::error::AppError;
use service_core::response::ErrorResponse;
use validator::Validate;

/// JSON body extractor that also runs `validator` rules.
///
/// An unparsable body is a 400 and a body that parses but breaks a rule is
/// a 422 carrying one message per offending field.
pub struct ValidatedJson<T>(pub T);

#[service_core::axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            tracing::debug!(error = %e, "Rejected request body");
            (
                StatusCode::BAD_REQUEST,
                ErrorResponse::error("Invalid request body", None),
            )
                .into_response()
        })?;

        value
            .validate()
            .map_err(|e| AppError::from(e).into_response())?;

        Ok(ValidatedJson(value))
    }
}
