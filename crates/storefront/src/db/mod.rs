//! Persistence for the storefront.
//!
//! # Database: `cartwright`
//!
//! All tables live in the `storefront` schema:
//!
//! - `product` - Catalog with live price and stock
//! - `cart_item` - Cart lines, owned by exactly one of a user or a guest token
//! - `orders` / `order_item` - Orders with price snapshots
//! - `checkout_session` - Cart snapshots for pending gateway checkouts
//! - `user` / `user_password` - Accounts
//!
//! Sessions live in `tower_sessions.session`.
//!
//! # Stores
//!
//! Services talk to a [`Store`], never to a pool. [`PgStore`] is the
//! production implementation; [`MemoryStore`] backs the service tests. Both
//! apply the same rules from [`plan`] and `cartwright_core`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p cartwright-cli -- migrate
//! ```

pub mod memory;
pub mod plan;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use cartwright_core::cart::MergeReport;
use cartwright_core::pricing::PricingError;
use cartwright_core::stock::StockError;
use cartwright_core::{CartOwner, Email, GuestToken, OrderId, OrderStatus, ProductId, UserId};

use crate::models::{
    CartLine, CheckoutSessionRecord, NewOrder, NewProduct, NewUser, Order, PlacedOrder, Product,
    ProductUpdate, StatusUpdate, User,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Database query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Unique constraint violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Referenced product does not exist.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// Referenced product exists but is not for sale.
    #[error("product {0} is unavailable")]
    ProductUnavailable(ProductId),

    /// Quantity exceeds stock.
    #[error(transparent)]
    InsufficientStock(#[from] StockError),

    /// Order placement had no usable lines.
    #[error("no orderable lines")]
    EmptyOrder,
}

impl From<PricingError> for RepositoryError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::Empty => Self::EmptyOrder,
            PricingError::Unavailable(id) => Self::ProductUnavailable(id),
        }
    }
}

/// Map a unique violation to [`RepositoryError::Conflict`].
pub(crate) fn conflict_on_unique(err: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(err)
}

/// Catalog reads and admin writes.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Products ordered by ID. Inactive products are skipped unless asked for.
    async fn list_products(&self, include_inactive: bool) -> Result<Vec<Product>, RepositoryError>;

    async fn create_product(&self, product: NewProduct) -> Result<Product, RepositoryError>;

    /// Returns `None` if the product does not exist.
    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>, RepositoryError>;
}

/// Cart lines keyed by owner.
///
/// Every mutation checks stock and writes under the product row lock.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Lines joined with live product data, ordered by product ID.
    async fn cart_lines(&self, owner: &CartOwner) -> Result<Vec<CartLine>, RepositoryError>;

    /// Add units to a line, returning the new quantity. All-or-nothing.
    async fn add_to_cart(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<u32, RepositoryError>;

    /// Overwrite a line's quantity (at least 1).
    async fn set_cart_quantity(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<u32, RepositoryError>;

    /// Returns whether a line was removed.
    async fn remove_from_cart(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError>;

    /// Returns the number of removed lines.
    async fn clear_cart(&self, owner: &CartOwner) -> Result<u64, RepositoryError>;

    /// Fold a guest cart into a user cart and delete the guest lines.
    async fn merge_guest_cart(
        &self,
        guest: &GuestToken,
        user: UserId,
    ) -> Result<MergeReport, RepositoryError>;
}

/// Orders and their lifecycle.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Price, reserve stock, insert and clear the source cart in one unit.
    ///
    /// With a payment reference that already has an order, returns that
    /// order with `created = false` and changes nothing.
    async fn place_order(&self, order: NewOrder) -> Result<PlacedOrder, RepositoryError>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Newest first.
    async fn list_orders_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// Newest first, optionally filtered by status.
    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, RepositoryError>;

    /// Set an order's status, optionally only if it is currently `expected`.
    ///
    /// Entering `CANCELLED` returns the ordered units to stock.
    async fn update_order_status(
        &self,
        id: OrderId,
        expected: Option<OrderStatus>,
        status: OrderStatus,
    ) -> Result<StatusUpdate, RepositoryError>;

    /// Hard delete. Returns whether the order existed.
    async fn delete_order(&self, id: OrderId) -> Result<bool, RepositoryError>;

    /// Attach unowned orders shipped to `email` to `user`. Returns the count.
    async fn claim_guest_orders(&self, user: UserId, email: &Email) -> Result<u64, RepositoryError>;
}

/// Accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Returns [`RepositoryError::Conflict`] if the email is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// User together with their password hash.
    async fn get_user_with_password(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError>;
}

/// Cart snapshots for gateway checkouts.
#[async_trait]
pub trait CheckoutSessionStore: Send + Sync {
    async fn save_checkout_session(
        &self,
        record: &CheckoutSessionRecord,
    ) -> Result<(), RepositoryError>;

    async fn get_checkout_session(
        &self,
        id: &str,
    ) -> Result<Option<CheckoutSessionRecord>, RepositoryError>;
}

/// Everything the services need from persistence.
#[async_trait]
pub trait Store:
    CatalogStore + CartStore + OrderStore + UserStore + CheckoutSessionStore
{
    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
