//! Primitives shared by the payment engine and the payment server.
//!
//! * [`Czk`] is the fixed-point money type used for every amount in the system.
//! * [`Secret`] wraps configuration values that must never end up in logs.
//! * [`helpers`] has small parsing utilities for environment-driven configuration.
mod czk;

pub mod helpers;
pub mod op;
mod secret;

pub use czk::{Czk, CzkParseError, CZK_CURRENCY_CODE};
pub use secret::Secret;
