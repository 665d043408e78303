use service_core::axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use service_core::error::AppError;

use crate::{models::Principal, services::TokenService};

/// Outcome of inspecting the `Authorization` header.
#[derive(Debug, PartialEq, Eq)]
enum BearerToken<'a> {
    Missing,
    Malformed,
    Present(&'a str),
}

fn bearer_token(headers: &HeaderMap) -> BearerToken<'_> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return BearerToken::Missing;
    };

    let Ok(value) = value.to_str() else {
        return BearerToken::Malformed;
    };

    let parts: Vec<&str> = value.split(' ').collect();
    match parts.as_slice() {
        ["Bearer", token] if !token.is_empty() => BearerToken::Present(token),
        _ => BearerToken::Malformed,
    }
}

fn unauthorized(message: &'static str) -> Response {
    AppError::Unauthorized(anyhow::anyhow!(message)).into_response()
}

/// Middleware to require a valid bearer access token. On success the
/// [`Principal`] is stored in the request extensions.
pub async fn auth_middleware(
    State(tokens): State<TokenService>,
    mut req: Request,
    next: Next,
) -> Response {
    let principal = match bearer_token(req.headers()) {
        BearerToken::Missing => return unauthorized("Missing Authorization header"),
        BearerToken::Malformed => return unauthorized("Invalid Authorization format"),
        BearerToken::Present(token) => match tokens.parse_access(token) {
            Ok(principal) => principal,
            Err(_) => return unauthorized("Invalid or expired token"),
        },
    };

    tracing::Span::current().record("user_id", tracing::field::display(principal.user_id));
    req.extensions_mut().insert(principal);

    next.run(req).await
}

/// Extractor for the principal placed by [`auth_middleware`].
pub struct AuthPrincipal(pub Principal);

#[service_core::axum::async_trait]
impl<S> FromRequestParts<S> for AuthPrincipal
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(AuthPrincipal)
            .ok_or_else(|| unauthorized("Missing authentication context"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use service_core::axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&HeaderMap::new()), BearerToken::Missing);
        assert_eq!(bearer_token(&headers("Bearer abc")), BearerToken::Present("abc"));

        for malformed in ["Bearer", "Bearer ", "bearer abc", "Basic abc", "Bearer a b", "abc"] {
            assert_eq!(
                bearer_token(&headers(malformed)),
                BearerToken::Malformed,
                "{malformed:?}"
            );
        }
    }
}
