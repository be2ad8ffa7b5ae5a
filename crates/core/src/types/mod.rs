//! Core types for Cartwright.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod owner;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{Money, MoneyError};
pub use owner::{CartOwner, GuestToken, GuestTokenError};
pub use status::*;
