//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                      - Liveness check
//! GET    /health/ready                - Readiness check (database)
//!
//! # Catalog
//! GET    /products                    - Active products
//! GET    /products/{id}               - Product detail
//! GET    /products/{id}/availability  - Stock check (?quantity=N)
//!
//! # Cart (session user or guest token)
//! GET    /cart                        - Cart with totals
//! POST   /cart                        - Add a line
//! PATCH  /cart                        - Set a line's quantity
//! DELETE /cart                        - Clear the cart
//! DELETE /cart/{product_id}           - Remove a line
//!
//! # Checkout
//! POST   /checkout/manual             - Place an order now
//! POST   /checkout/session            - Start a hosted payment checkout
//! POST   /webhooks/payment            - Signed gateway events
//!
//! # Orders (requires auth)
//! GET    /orders                      - Caller's orders
//! GET    /orders/{id}                 - Order detail (owner or admin)
//! PATCH  /orders/{id}/cancel          - Cancel a pending order
//! PATCH  /orders/{id}/status          - Set order status (admin)
//! DELETE /orders/{id}                 - Delete an order (admin)
//!
//! # Admin (requires admin role)
//! GET    /admin/orders                - All orders (?status=...)
//! POST   /admin/products              - Create a product
//! PATCH  /admin/products/{id}         - Update a product
//!
//! # Auth
//! POST   /auth/register               - Create an account and log in
//! POST   /auth/login                  - Log in
//! POST   /auth/logout                 - Log out
//! GET    /auth/me                     - Current user
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod health;
pub mod orders;
pub mod products;
pub mod webhooks;

use axum::{
    Router,
    routing::{delete, get, patch, post},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
        .route("/{id}/availability", get(products::availability))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(cart::show)
                .post(cart::add)
                .patch(cart::update)
                .delete(cart::clear),
        )
        .route("/{product_id}", delete(cart::remove))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/manual", post(checkout::manual))
        .route("/session", post(checkout::session))
}

/// Create the order routes router.
///
/// Status changes and deletes check for the admin role in the handler.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show).delete(orders::delete))
        .route("/{id}/cancel", patch(orders::cancel))
        .route("/{id}/status", patch(orders::set_status))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(orders::admin_index))
        .route("/products", post(admin::create_product))
        .route("/products/{id}", patch(admin::update_product))
}

/// Create all routes for the storefront.
///
/// With `rate_limit` set, auth routes get the strict per-IP limiter and
/// cart/checkout routes the general one. The limiters key on the peer
/// address, so the server must be started with connect info.
pub fn routes(rate_limit: bool) -> Router<AppState> {
    let mut auth = auth_routes();
    let mut cart = cart_routes();
    let mut checkout = checkout_routes();

    if rate_limit {
        auth = auth.layer(auth_rate_limiter());
        cart = cart.layer(api_rate_limiter());
        checkout = checkout.layer(api_rate_limiter());
    }

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/products", product_routes())
        .nest("/cart", cart)
        .nest("/checkout", checkout)
        .route("/webhooks/payment", post(webhooks::payment))
        .nest("/orders", order_routes())
        .nest("/admin", admin_routes())
        .nest("/auth", auth)
}
