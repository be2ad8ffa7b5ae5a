//! Integration tests for Cartwright.
//!
//! The tests talk to a running storefront over HTTP and are `#[ignore]`d by
//! default.
//!
//! # Running Tests
//!
//! ```bash
//! cargo run -p cartwright-cli -- migrate
//! cargo run -p cartwright-cli -- admin create -e admin@example.com -n Admin -p '...'
//! cargo run -p cartwright-storefront &
//!
//! CW_TEST_ADMIN_EMAIL=admin@example.com CW_TEST_ADMIN_PASSWORD='...' \
//!     cargo test -p cartwright-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_BASE_URL` - Server under test (default: <http://localhost:3000>)
//! - `PAYMENT_WEBHOOK_SECRET` - Must match the server's, for signed webhooks
//! - `CW_TEST_ADMIN_EMAIL` / `CW_TEST_ADMIN_PASSWORD` - Admin account for catalog setup

#![allow(clippy::expect_used, clippy::missing_panics_doc)]

use reqwest::{Client, StatusCode};
use secrecy::SecretString;
use serde_json::{Value, json};
use uuid::Uuid;

use cartwright_storefront::services::payment::SignatureVerifier;

/// Base URL for the storefront API (configurable via environment).
#[must_use]
pub fn base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned())
}

/// A client with its own cookie jar, i.e. its own session.
#[must_use]
pub fn session_client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// A unique email for a throwaway account.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", Uuid::new_v4().simple())
}

/// Register a fresh customer; the client's session is logged in afterwards.
pub async fn register(client: &Client, email: &str) -> Value {
    let resp = client
        .post(format!("{}/auth/register", base_url()))
        .json(&json!({
            "email": email,
            "name": "Integration Customer",
            "password": "integration-test-password",
        }))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.expect("Failed to parse registration")
}

/// A client logged in as the configured admin account.
pub async fn admin_client() -> Client {
    let email = std::env::var("CW_TEST_ADMIN_EMAIL").expect("CW_TEST_ADMIN_EMAIL not set");
    let password =
        std::env::var("CW_TEST_ADMIN_PASSWORD").expect("CW_TEST_ADMIN_PASSWORD not set");

    let client = session_client();
    let resp = client
        .post(format!("{}/auth/login", base_url()))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to log in as admin");
    assert_eq!(resp.status(), StatusCode::OK);
    client
}

/// Create an active product with a unique name; returns its JSON.
pub async fn create_product(admin: &Client, price: &str, stock: u32) -> Value {
    let resp = admin
        .post(format!("{}/admin/products", base_url()))
        .json(&json!({
            "name": format!("Test product {}", Uuid::new_v4().simple()),
            "price": price,
            "stock": stock,
        }))
        .send()
        .await
        .expect("Failed to create product");
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.expect("Failed to parse product")
}

/// Sign a webhook body the way the payment gateway does.
#[must_use]
pub fn sign_webhook(body: &[u8]) -> String {
    let secret =
        std::env::var("PAYMENT_WEBHOOK_SECRET").expect("PAYMENT_WEBHOOK_SECRET not set");
    SignatureVerifier::new(SecretString::from(secret), 300)
        .sign(chrono::Utc::now().timestamp(), body)
        .expect("Failed to sign webhook body")
}
