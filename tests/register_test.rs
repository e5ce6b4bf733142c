//! Integration tests for account registration.

mod common;

use common::{TestHarness, PASSWORD};
use serde_json::{json, Value};

#[tokio::test]
async fn register_creates_one_user() {
    let h = TestHarness::with_server().await;

    let resp = h.register("picam", PASSWORD).await;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"username": "picam", "email": "picam@example.com"}));

    assert_eq!(h.user_count(), 1);
    let stored = rpi_db::queries::users::get_user_by_username(&h.conn(), "picam")
        .unwrap()
        .unwrap();
    assert_ne!(stored.password_hash, PASSWORD);
}

#[tokio::test]
async fn short_password_is_rejected() {
    let h = TestHarness::with_server().await;

    let resp = h.register("picam", "short").await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "validation_error");
    assert!(body["fields"]["password"].is_array());
    assert_eq!(h.user_count(), 0);
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let h = TestHarness::with_server().await;
    assert_eq!(h.register("picam", PASSWORD).await.status(), 201);

    let resp = h.register("picam", PASSWORD).await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["fields"]["username"][0],
        "A user with that username already exists."
    );
    assert_eq!(h.user_count(), 1);
}

#[tokio::test]
async fn missing_fields_are_listed() {
    let h = TestHarness::with_server().await;

    let resp = h.post_json("/api/v1/register", &json!({})).await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    for field in ["username", "password"] {
        assert_eq!(body["fields"][field][0], "This field is required.", "{field}");
    }
    assert!(body["fields"].get("email").is_none());
}

#[tokio::test]
async fn email_may_be_absent_or_empty() {
    let h = TestHarness::with_server().await;

    let resp = h
        .post_json("/api/v1/register", &json!({"username": "noemail", "password": PASSWORD}))
        .await;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"username": "noemail", "email": ""}));

    let resp = h
        .post_json(
            "/api/v1/register/",
            &json!({"username": "emptyemail", "email": "", "password": PASSWORD}),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["email"], "");

    let resp = h
        .post_json(
            "/api/v1/register",
            &json!({"username": "bademail", "email": "not-an-email", "password": PASSWORD}),
        )
        .await;
    assert_eq!(resp.status(), 400);
    assert_eq!(h.user_count(), 2);
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let h = TestHarness::with_server().await;

    let resp = h
        .client
        .post(h.url("/api/v1/register/"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "validation_error");
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn password_is_never_echoed() {
    let h = TestHarness::with_server().await;
    let text = h.register("picam", PASSWORD).await.text().await.unwrap();
    assert!(!text.contains(PASSWORD));
}

#[tokio::test]
async fn auth_routes_are_rate_limited() {
    let mut config = common::test_config();
    config.auth.rate_limit_per_minute = 2;
    let h = TestHarness::with_server_config(config).await;

    assert_eq!(h.register("a1", "short").await.status(), 400);
    assert_eq!(h.register("a2", "short").await.status(), 400);

    let resp = h.register("a3", PASSWORD).await;
    assert_eq!(resp.status(), 429);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "rate_limited");
    assert_eq!(h.user_count(), 0);
}
