//! Cartwright Core - Shared types and commerce rules.
//!
//! This crate provides the types and pure business rules used across all
//! Cartwright components:
//! - `storefront` - HTTP service for carts, checkout and orders
//! - `cli` - Command-line tools for migrations, seeding and admin users
//!
//! # Architecture
//!
//! The core crate contains only types and rules - no I/O, no database access,
//! no HTTP clients. Every storage backend applies the same rules from here,
//! so the Postgres store and the in-memory test store cannot drift apart.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, emails, statuses and cart owners
//! - [`stock`] - Availability checks and stock reservation
//! - [`cart`] - Cart admission control and merge arithmetic
//! - [`pricing`] - Server-side order pricing from product snapshots
//! - [`lifecycle`] - Order status transitions and cancellation policy

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod lifecycle;
pub mod pricing;
pub mod stock;
pub mod types;

pub use types::*;
