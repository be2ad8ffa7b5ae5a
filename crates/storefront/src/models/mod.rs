//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db::postgres`].

pub mod cart;
pub mod checkout;
pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use cart::{CartLine, CartView};
pub use checkout::CheckoutSessionRecord;
pub use order::{Backorder, CartClear, NewOrder, Order, OrderItem, PlacedOrder, ShippingInfo, StatusUpdate};
pub use product::{NewProduct, Product, ProductUpdate};
pub use session::CurrentUser;
pub use user::{NewUser, User};
