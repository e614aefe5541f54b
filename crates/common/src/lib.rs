//! Shared error definitions and helpers used across all herald crates.

pub mod error;

pub use error::{Error, FromMessage, Result};
