//! Cart, checkout and order lifecycle over HTTP.
//!
//! These tests require:
//! - A running `PostgreSQL` database with migrations applied
//! - The storefront server running (cargo run -p cartwright-storefront)
//! - An admin account in `CW_TEST_ADMIN_EMAIL` / `CW_TEST_ADMIN_PASSWORD`

#![allow(clippy::expect_used)]

use cartwright_integration_tests::{
    admin_client, base_url, create_product, register, session_client, unique_email,
};
use reqwest::StatusCode;
use serde_json::{Value, json};

async fn add(client: &reqwest::Client, product_id: &Value, quantity: i64) -> StatusCode {
    client
        .post(format!("{}/cart", base_url()))
        .json(&json!({ "product_id": product_id, "quantity": quantity }))
        .send()
        .await
        .expect("Failed to add to cart")
        .status()
}

async fn cart(client: &reqwest::Client) -> Value {
    client
        .get(format!("{}/cart", base_url()))
        .send()
        .await
        .expect("Failed to fetch cart")
        .json()
        .await
        .expect("Failed to parse cart")
}

#[tokio::test]
#[ignore = "Requires running storefront server and admin credentials"]
async fn test_guest_cart_respects_stock() {
    let admin = admin_client().await;
    let product = create_product(&admin, "12.50", 5).await;
    let guest = session_client();

    assert_eq!(add(&guest, &product["id"], 2).await, StatusCode::OK);
    assert_eq!(add(&guest, &product["id"], 4).await, StatusCode::BAD_REQUEST);

    let view = cart(&guest).await;
    assert_eq!(view["lines"][0]["quantity"], 2);
    assert_eq!(view["subtotal"], "25.00");

    let resp = guest
        .delete(format!("{}/cart/{}", base_url(), product["id"]))
        .send()
        .await
        .expect("Failed to remove line");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(cart(&guest).await["lines"].as_array().expect("lines").is_empty());
}

#[tokio::test]
#[ignore = "Requires running storefront server and admin credentials"]
async fn test_guest_cart_merges_on_registration() {
    let admin = admin_client().await;
    let product = create_product(&admin, "4.00", 10).await;
    let client = session_client();

    assert_eq!(add(&client, &product["id"], 3).await, StatusCode::OK);

    let session = register(&client, &unique_email("merge")).await;
    assert_eq!(session["linked"]["cart"]["merged"], 1);

    let view = cart(&client).await;
    assert_eq!(view["lines"][0]["quantity"], 3);
}

#[tokio::test]
#[ignore = "Requires running storefront server and admin credentials"]
async fn test_manual_checkout_and_cancel() {
    let admin = admin_client().await;
    let product = create_product(&admin, "10.00", 4).await;
    let client = session_client();
    register(&client, &unique_email("checkout")).await;

    assert_eq!(add(&client, &product["id"], 3).await, StatusCode::OK);

    let resp = client
        .post(format!("{}/checkout/manual", base_url()))
        .json(&json!({ "name": "Ann", "address": "1 Main St", "city": "Springfield" }))
        .send()
        .await
        .expect("Failed to check out");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order: Value = resp.json().await.expect("Failed to parse order");
    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["total"], "30.00");
    assert!(cart(&client).await["lines"].as_array().expect("lines").is_empty());

    let orders: Value = client
        .get(format!("{}/orders", base_url()))
        .send()
        .await
        .expect("Failed to list orders")
        .json()
        .await
        .expect("Failed to parse orders");
    assert_eq!(orders.as_array().expect("orders").len(), 1);

    let resp = client
        .patch(format!("{}/orders/{}/cancel", base_url(), order["id"]))
        .send()
        .await
        .expect("Failed to cancel");
    assert_eq!(resp.status(), StatusCode::OK);
    let cancelled: Value = resp.json().await.expect("Failed to parse order");
    assert_eq!(cancelled["status"], "CANCELLED");

    let product: Value = client
        .get(format!("{}/products/{}", base_url(), product["id"]))
        .send()
        .await
        .expect("Failed to fetch product")
        .json()
        .await
        .expect("Failed to parse product");
    assert_eq!(product["stock"], 4);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_empty_cart_checkout_is_rejected() {
    let client = session_client();
    let resp = client
        .post(format!("{}/checkout/manual", base_url()))
        .json(&json!({ "name": "Ann", "email": "ann@example.com" }))
        .send()
        .await
        .expect("Failed to check out");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.expect("Failed to parse error");
    assert_eq!(body["error"], "empty_cart");
}
