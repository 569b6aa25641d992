//! Account lifecycle over HTTP.
//!
//! Requires a running API server and database. Run with:
//! `cargo test -p novatech-integration-tests -- --ignored`

use reqwest::StatusCode;
use serde_json::json;

use novatech_integration_tests::{TEST_PASSWORD, TestUser, client, json_body, unique_email, url};

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_register_login_me_logout() {
    let user = TestUser::create().await;

    let resp = user
        .client
        .get(url("/api/auth/me"))
        .send()
        .await
        .expect("me request");
    assert_eq!(resp.status(), StatusCode::OK);
    let me = json_body(resp).await;
    assert_eq!(me["email"], user.email.as_str());
    assert_eq!(me["firstName"], "Ada");
    assert!(me.get("passwordHash").is_none());

    let resp = user
        .client
        .post(url("/api/auth/logout"))
        .send()
        .await
        .expect("logout request");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = user
        .client
        .get(url("/api/auth/me"))
        .send()
        .await
        .expect("me request");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_duplicate_email_rejected() {
    let user = TestUser::create().await;

    let resp = client()
        .post(url("/api/auth/register"))
        .json(&json!({
            "email": user.email,
            "password": TEST_PASSWORD,
            "firstName": "Grace",
            "lastName": "Hopper",
        }))
        .send()
        .await
        .expect("register request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    user.delete().await;
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_wrong_password_and_unknown_email_look_the_same() {
    let user = TestUser::create().await;

    let wrong_password = client()
        .post(url("/api/auth/login"))
        .json(&json!({ "email": user.email, "password": "Wr0ng!password" }))
        .send()
        .await
        .expect("login request");
    let unknown_email = client()
        .post(url("/api/auth/login"))
        .json(&json!({ "email": unique_email(), "password": TEST_PASSWORD }))
        .send()
        .await
        .expect("login request");

    assert_eq!(wrong_password.status(), StatusCode::BAD_REQUEST);
    assert_eq!(unknown_email.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(wrong_password).await, json_body(unknown_email).await);

    user.delete().await;
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_profile_update() {
    let user = TestUser::create().await;
    let new_email = unique_email();

    let resp = user
        .client
        .put(url("/api/auth/profile"))
        .json(&json!({ "firstName": "Augusta", "lastName": "King", "email": new_email }))
        .send()
        .await
        .expect("profile request");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["user"]["firstName"], "Augusta");
    assert_eq!(body["user"]["email"], new_email.as_str());

    user.delete().await;
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_forgot_password_unknown_email_is_404() {
    let resp = client()
        .post(url("/api/auth/forgot-password"))
        .json(&json!({ "email": unique_email() }))
        .send()
        .await
        .expect("forgot-password request");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_reset_with_unknown_token_is_400() {
    let resp = client()
        .post(url("/api/auth/reset-password"))
        .json(&json!({ "token": "0".repeat(64), "password": TEST_PASSWORD }))
        .send()
        .await
        .expect("reset-password request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_deleted_account_cannot_log_in() {
    let user = TestUser::create().await;
    let email = user.email.clone();
    user.delete().await;

    let resp = client()
        .post(url("/api/auth/login"))
        .json(&json!({ "email": email, "password": TEST_PASSWORD }))
        .send()
        .await
        .expect("login request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
