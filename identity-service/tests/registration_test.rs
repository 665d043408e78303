mod common;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
};
use common::{TestApp, TEST_PASSWORD};
use identity_service::models::Role;
use identity_service::services::store::FailPoint;
use serde_json::json;
use std::net::SocketAddr;

#[tokio::test]
async fn test_register_creates_user_org_and_admin_membership() {
    let app = TestApp::spawn().await;

    let response = app.register("a@x.com", TEST_PASSWORD, "Acme").await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["data"]["message"], "Registration successful");

    let user_id = response.body["data"]["user_id"].as_str().unwrap();
    let org_id = response.body["data"]["org_id"].as_str().unwrap();

    let users = app.store.users();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id.to_string(), user_id);
    assert_ne!(users[0].password_hash, TEST_PASSWORD);

    let orgs = app.store.organizations();
    assert_eq!(orgs.len(), 1);
    assert_eq!(orgs[0].id.to_string(), org_id);
    assert_eq!(orgs[0].owner_user_id, users[0].id);

    let staff = app.store.memberships();
    assert_eq!(staff.len(), 1);
    assert_eq!(staff[0].role, Role::Admin);
    assert_eq!(staff[0].org_id, orgs[0].id);
    assert_eq!(staff[0].user_id, users[0].id);
    assert!(staff[0].permissions.is_empty());
}

#[tokio::test]
async fn test_duplicate_email_conflicts() {
    let app = TestApp::spawn().await;

    let first = app.register("dup@x.com", TEST_PASSWORD, "Acme").await;
    assert_eq!(first.status, StatusCode::CREATED);

    let second = app.register("dup@x.com", TEST_PASSWORD, "Other").await;
    assert_eq!(second.status, StatusCode::CONFLICT);
    assert_eq!(second.body["success"], false);
    assert_eq!(second.error_message(), "Email already registered");

    assert_eq!(app.store.users().len(), 1);
    assert_eq!(app.store.organizations().len(), 1);
    assert_eq!(app.store.memberships().len(), 1);
}

#[tokio::test]
async fn test_validation_errors_are_reported_per_field() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json(
            "/api/v1/auth/register",
            json!({
                "email": "not-an-email",
                "password": "short",
                "first_name": "",
                "last_name": "Lovelace",
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["success"], false);
    assert_eq!(response.error_message(), "Validation failed");

    let fields = &response.body["error"]["fields"];
    assert_eq!(fields["email"], "Invalid email format");
    assert_eq!(fields["password"], "Password must be at least 8 characters");
    assert_eq!(fields["first_name"], "First name is required");
    assert_eq!(fields["org_name"], "Organization name is required");
    assert!(fields.get("last_name").is_none());

    assert!(app.store.users().is_empty());
}

#[tokio::test]
async fn test_unparsable_body_is_bad_request() {
    let app = TestApp::spawn().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/register")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_message(), "Invalid request body");
}

#[tokio::test]
async fn test_failed_organization_insert_rolls_back_user() {
    let app = TestApp::spawn().await;
    app.store.fail_at(FailPoint::InsertOrganization);

    let response = app.register("a@x.com", TEST_PASSWORD, "Acme").await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.error_message(), "Internal server error");
    assert!(app.store.users().is_empty());
    assert!(app.store.organizations().is_empty());
    assert!(app.store.memberships().is_empty());

    // The email is still free once storage recovers.
    app.store.clear_failures();
    let retry = app.register("a@x.com", TEST_PASSWORD, "Acme").await;
    assert_eq!(retry.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_failed_commit_leaves_nothing() {
    let app = TestApp::spawn().await;
    app.store.fail_at(FailPoint::Commit);

    let response = app.register("a@x.com", TEST_PASSWORD, "Acme").await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(app.store.users().is_empty());
}

#[tokio::test]
async fn test_concurrent_registrations_with_same_email_commit_once() {
    let app = TestApp::spawn().await;

    let (a, b, c) = tokio::join!(
        app.register("race@x.com", TEST_PASSWORD, "One"),
        app.register("race@x.com", TEST_PASSWORD, "Two"),
        app.register("race@x.com", TEST_PASSWORD, "Three"),
    );

    let statuses = [a.status, b.status, c.status];
    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::CREATED).count(),
        1
    );
    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count(),
        2
    );
    assert_eq!(app.store.users().len(), 1);
    assert_eq!(app.store.organizations().len(), 1);
    assert_eq!(app.store.memberships().len(), 1);
}

fn register_request_from(peer: [u8; 4], forwarded_for: &str, i: usize) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/auth/register")
        .header("content-type", "application/json")
        .header("x-forwarded-for", forwarded_for)
        .extension(ConnectInfo(SocketAddr::from((peer, 40000))))
        .body(Body::from(
            json!({
                "email": format!("user{}@x.com", i),
                "password": TEST_PASSWORD,
                "first_name": "Ada",
                "last_name": "Lovelace",
                "org_name": "Acme",
            })
            .to_string(),
        ))
        .unwrap()
}

#[tokio::test]
async fn test_register_rate_limited_per_ip() {
    let app = TestApp::spawn_with(common::test_config(&[
        ("RATE_LIMIT_REGISTER_ATTEMPTS", "2"),
        ("RATE_LIMIT_REGISTER_WINDOW_SECONDS", "3600"),
        ("TRUSTED_PROXIES", "10.0.0.254"),
    ]))
    .await;

    let mut last = None;
    for i in 0..3 {
        let request = register_request_from([10, 0, 0, 254], "203.0.113.7", i);
        last = Some(app.send(request).await);
    }

    let last = last.unwrap();
    assert_eq!(last.status, StatusCode::TOO_MANY_REQUESTS);
    assert!(last.headers.contains_key("retry-after"));
    assert_eq!(app.store.users().len(), 2);
}

#[tokio::test]
async fn test_register_limit_not_bypassed_by_rotating_forwarded_for() {
    let app = TestApp::spawn_with(common::test_config(&[
        ("RATE_LIMIT_REGISTER_ATTEMPTS", "2"),
        ("RATE_LIMIT_REGISTER_WINDOW_SECONDS", "3600"),
    ]))
    .await;

    let mut last = None;
    for i in 0..3 {
        let spoofed = format!("198.51.100.{}", i);
        let request = register_request_from([203, 0, 113, 7], &spoofed, i);
        last = Some(app.send(request).await);
    }

    assert_eq!(last.unwrap().status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(app.store.users().len(), 2);
}
