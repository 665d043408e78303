use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use service_core::{
    axum::{extract::State, http::StatusCode, response::IntoResponse},
    error::AppError,
    response::ApiResponse,
};

use crate::{
    dtos::auth::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse},
    models::REFRESH_TOKEN_TTL_DAYS,
    services::Registration,
    utils::{Password, ValidatedJson},
    AppState,
};

pub const REFRESH_COOKIE_NAME: &str = "refresh_token";
pub const REFRESH_COOKIE_PATH: &str = "/api/v1/auth/refresh";

/// Register a user together with a new organization
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User, organization and admin membership created", body = RegisterResponse),
        (status = 400, description = "Unparsable body"),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Validation error with a message per field"),
        (status = 429, description = "Too many attempts"),
        (status = 500, description = "Registration failed; nothing was stored")
    ),
    tag = "Authentication"
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .registration
        .register(Registration {
            email: req.email,
            password: Password::new(req.password),
            first_name: req.first_name,
            last_name: req.last_name,
            org_name: req.org_name,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(RegisterResponse {
            user_id: outcome.user_id,
            org_id: outcome.org_id,
            message: "Registration successful".to_string(),
        }),
    ))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful; the refresh token is also set as an HttpOnly cookie", body = LoginResponse),
        (status = 401, description = "Invalid credentials or inactive account"),
        (status = 422, description = "Validation error"),
        (status = 429, description = "Too many attempts"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .auth
        .login(&req.email, Password::new(req.password))
        .await?;

    let cookie = Cookie::build((REFRESH_COOKIE_NAME, outcome.refresh_token.clone()))
        .path(REFRESH_COOKIE_PATH)
        .http_only(true)
        .secure(state.config.security.secure_cookies)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::days(REFRESH_TOKEN_TTL_DAYS))
        .build();

    Ok((
        jar.add(cookie),
        ApiResponse::ok(LoginResponse {
            access_token: outcome.access_token,
            refresh_token: outcome.refresh_token,
        }),
    ))
}
