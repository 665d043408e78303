//! Test helper module for identity-service integration tests.
//!
//! Builds the full router over an in-memory store and drives it with
//! `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use identity_service::{
    build_router, config::IdentityConfig, services::store::MemoryStore, AppState,
};
use serde_json::{json, Value};
use service_core::config::Config;
use std::collections::HashMap;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const TEST_JWT_SECRET: &str = "integration-test-secret-with-enough-length";
pub const TEST_PASSWORD: &str = "Secretpass1";

/// Cheap Argon2 cost and generous rate limits, overridable per test.
pub fn test_config(overrides: &[(&str, &str)]) -> IdentityConfig {
    let mut vars: HashMap<String, String> = [
        ("JWT_SECRET", TEST_JWT_SECRET),
        ("LOG_LEVEL", "error"),
        ("ARGON2_MEMORY_KIB", "1024"),
        ("ARGON2_ITERATIONS", "1"),
        ("ARGON2_PARALLELISM", "1"),
        ("RATE_LIMIT_LOGIN_ATTEMPTS", "1000"),
        ("RATE_LIMIT_LOGIN_WINDOW_SECONDS", "60"),
        ("RATE_LIMIT_REGISTER_ATTEMPTS", "1000"),
        ("RATE_LIMIT_REGISTER_WINDOW_SECONDS", "60"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }

    IdentityConfig::from_lookup(Config::default(), |key| vars.get(key).cloned())
        .expect("Failed to build test config")
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn error_message(&self) -> &str {
        self.body["error"]["message"].as_str().unwrap_or_default()
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: MemoryStore,
    pub state: AppState,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(test_config(&[])).await
    }

    pub async fn spawn_with(config: IdentityConfig) -> Self {
        let store = MemoryStore::new();
        let state =
            AppState::new(config, Arc::new(store.clone())).expect("Failed to build app state");
        let router = build_router(state.clone())
            .await
            .expect("Failed to build router");

        TestApp {
            router,
            store,
            state,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, None, token).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(body), None).await
    }

    pub async fn register(&self, email: &str, password: &str, org_name: &str) -> TestResponse {
        self.post_json(
            "/api/v1/auth/register",
            json!({
                "email": email,
                "password": password,
                "first_name": "Ada",
                "last_name": "Lovelace",
                "org_name": org_name,
            }),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.post_json(
            "/api/v1/auth/login",
            json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Register then log in, returning the access token.
    pub async fn access_token_for(&self, email: &str) -> String {
        let registered = self.register(email, TEST_PASSWORD, "Acme").await;
        assert_eq!(registered.status, StatusCode::CREATED, "{:?}", registered.body);

        let logged_in = self.login(email, TEST_PASSWORD).await;
        assert_eq!(logged_in.status, StatusCode::OK, "{:?}", logged_in.body);

        logged_in.body["data"]["access_token"]
            .as_str()
            .expect("access_token missing")
            .to_string()
    }
}
