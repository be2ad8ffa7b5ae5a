//! Business logic services for the storefront.
//!
//! Services are built per request around a borrowed [`crate::db::Store`];
//! identity is always passed in explicitly.
//!
//! # Services
//!
//! - `auth` - Password registration and login
//! - `catalog` - Product reads, availability and admin product edits
//! - `cart` - Cart operations for users and guests
//! - `merge` - Guest cart and guest order reconciliation after login
//! - `checkout` - Manual orders and gateway checkout sessions
//! - `webhook` - Payment webhook reconciliation
//! - `orders` - Order reads, cancellation and admin lifecycle
//! - `notify` - Order notifications
//! - `payment` - Payment gateway client and webhook signatures

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod merge;
pub mod notify;
pub mod orders;
pub mod payment;
pub mod webhook;

#[cfg(test)]
pub(crate) mod testing;
