//! Liveness and readiness probes.
//!
//! These tests require:
//! - A running `PostgreSQL` database with migrations applied
//! - The storefront server running (cargo run -p cartwright-storefront)

use cartwright_integration_tests::{base_url, session_client};
use reqwest::StatusCode;

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_health() {
    let resp = session_client()
        .get(format!("{}/health", base_url()))
        .send()
        .await
        .expect("Failed to reach server");

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.expect("Failed to read body"), "ok");
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_readiness() {
    let resp = session_client()
        .get(format!("{}/health/ready", base_url()))
        .send()
        .await
        .expect("Failed to reach server");

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));
}
