pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use service_core::response::ApiResponse;
use std::{sync::Arc, time::Duration};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::config::IdentityConfig;
use crate::middleware::{
    auth_middleware, authorize_middleware, metrics_middleware, PermissionGate,
};
use crate::services::{
    store::Store, AuthService, PermissionEvaluator, RegistrationService, TokenService,
};
use crate::utils::CredentialHasher;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::register,
        handlers::auth::login,
        handlers::user::get_me,
        handlers::staff::list_staff,
        handlers::staff::update_permissions,
    ),
    components(
        schemas(
            dtos::auth::RegisterRequest,
            dtos::auth::RegisterResponse,
            dtos::auth::LoginRequest,
            dtos::auth::LoginResponse,
            dtos::staff::UpdatePermissionsRequest,
            models::Principal,
            models::StaffMembership,
            models::PermissionMap,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Registration and login"),
        (name = "Users", description = "The authenticated principal"),
        (name = "Staff", description = "Organization memberships and permissions"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<IdentityConfig>,
    pub store: Arc<dyn Store>,
    pub tokens: TokenService,
    pub auth: AuthService,
    pub registration: RegistrationService,
    pub evaluator: PermissionEvaluator,
    pub login_rate_limiter: IpRateLimiter,
    pub register_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire every service from configuration over one store.
    pub fn new(config: IdentityConfig, store: Arc<dyn Store>) -> Result<Self, AppError> {
        let hasher = CredentialHasher::new(&config.hashing)
            .map_err(|e| AppError::ConfigError(anyhow::Error::new(e)))?;
        let tokens = TokenService::new(&config.jwt);

        let login_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.login_attempts,
            config.rate_limit.login_window_seconds,
            &config.rate_limit.trusted_proxies,
        );
        let register_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.register_attempts,
            config.rate_limit.register_window_seconds,
            &config.rate_limit.trusted_proxies,
        );

        Ok(Self {
            auth: AuthService::new(store.clone(), hasher.clone(), tokens.clone()),
            registration: RegistrationService::new(store.clone(), hasher),
            evaluator: PermissionEvaluator::new(store.clone()),
            tokens,
            store,
            login_rate_limiter,
            register_rate_limiter,
            config: Arc::new(config),
        })
    }

    fn gate(&self, permission: &str) -> PermissionGate {
        PermissionGate::new(self.evaluator.clone(), permission)
    }
}

fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer, AppError> {
    let allow_origin = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins = allowed_origins
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>().map_err(|e| {
                    AppError::ConfigError(anyhow::anyhow!("Invalid CORS origin '{}': {}", o, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ]))
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let login_route = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let register_route = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .layer(from_fn_with_state(
            state.register_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let staff_routes = Router::new()
        .route("/staff", get(handlers::staff::list_staff))
        .route_layer(from_fn_with_state(state.gate("staff.read"), authorize_middleware))
        .merge(
            Router::new()
                .route(
                    "/staff/:staff_id/permissions",
                    put(handlers::staff::update_permissions),
                )
                .route_layer(from_fn_with_state(
                    state.gate("staff.manage"),
                    authorize_middleware,
                )),
        );

    // Authentication wraps the permission gates above.
    let protected_routes = Router::new()
        .route("/me", get(handlers::user::get_me))
        .merge(staff_routes)
        .route_layer(from_fn_with_state(state.tokens.clone(), auth_middleware));

    let api = Router::new()
        .merge(login_route)
        .merge(register_route)
        .merge(protected_routes);

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .route("/api/v1", get(welcome))
        .route("/api/v1/", get(welcome))
        .nest("/api/v1", api)
        .with_state(state.clone())
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.config.security.request_timeout_seconds,
        )))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                    user_id = tracing::field::Empty,
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config.security.allowed_origins)?);

    Ok(app)
}

async fn welcome(State(state): State<AppState>) -> impl IntoResponse {
    ApiResponse::ok(serde_json::json!({
        "message": "Welcome to the identity API",
        "service": state.config.service_name,
        "version": state.config.service_version,
    }))
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Storage is unreachable")
    ),
    tag = "Observability"
)]
pub async fn health_check(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Storage health check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(ApiResponse::ok(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "database": "up"
        }
    })))
}
