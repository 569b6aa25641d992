//! End-to-end HTTP tests for the NovaTech API.
//!
//! # Running Tests
//!
//! The tests talk to a running server backed by a migrated `PostgreSQL`
//! database with at least one product in the catalog:
//!
//! ```bash
//! cargo run -p novatech-cli -- migrate
//! cargo run -p novatech-api &
//! cargo test -p novatech-integration-tests -- --ignored
//! ```
//!
//! `NOVATECH_BASE_URL` overrides the default `http://localhost:5000`.

use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// A password that satisfies the password policy.
pub const TEST_PASSWORD: &str = "Str0ng!Passw0rd";

/// Base URL of the API under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("NOVATECH_BASE_URL").unwrap_or_else(|_| "http://localhost:5000".to_string())
}

/// Full URL for an API path such as `/api/cart`.
#[must_use]
pub fn url(path: &str) -> String {
    format!("{}{path}", base_url())
}

/// HTTP client that keeps the session cookie between requests.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// An email address no other test run has used.
#[must_use]
pub fn unique_email() -> String {
    format!("test-{}@novatech-tests.com", Uuid::new_v4().simple())
}

/// Response body as JSON.
///
/// # Panics
///
/// Panics if the body is not JSON.
pub async fn json_body(response: Response) -> Value {
    response.json().await.expect("response body is JSON")
}

/// A registered, logged-in user.
pub struct TestUser {
    pub client: Client,
    pub email: String,
    pub id: String,
}

impl TestUser {
    /// Register a fresh account and log in with it.
    ///
    /// # Panics
    ///
    /// Panics if registration or login fails.
    pub async fn create() -> Self {
        let client = client();
        let email = unique_email();

        let resp = client
            .post(url("/api/auth/register"))
            .json(&json!({
                "email": email,
                "password": TEST_PASSWORD,
                "firstName": "Ada",
                "lastName": "Lovelace",
            }))
            .send()
            .await
            .expect("register request");
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = client
            .post(url("/api/auth/login"))
            .json(&json!({ "email": email, "password": TEST_PASSWORD }))
            .send()
            .await
            .expect("login request");
        assert_eq!(resp.status(), StatusCode::OK);

        let body = json_body(resp).await;
        let id = body["user"]["id"]
            .as_str()
            .expect("login returns the user")
            .to_string();

        Self { client, email, id }
    }

    /// Delete the account.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn delete(self) {
        let resp = self
            .client
            .delete(url("/api/auth/delete"))
            .send()
            .await
            .expect("delete request");
        assert_eq!(resp.status(), StatusCode::OK);
    }
}

/// ID of some product in the catalog.
///
/// # Panics
///
/// Panics if the catalog is empty.
pub async fn any_product_id(client: &Client) -> String {
    let resp = client
        .get(url("/api/products"))
        .send()
        .await
        .expect("products request");
    assert_eq!(resp.status(), StatusCode::OK);

    let products = json_body(resp).await;
    products[0]["id"]
        .as_str()
        .expect("catalog has at least one product")
        .to_string()
}
