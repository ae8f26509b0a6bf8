#![forbid(unsafe_code)]
//! Shared primitives for the secure voice transport core: error types,
//! the bounded drop-oldest ring buffer, configuration loading, and a
//! monotonic clock. These are used by every other `svx-*` crate.

pub mod config;
pub mod error;
pub mod ring;
pub mod timestamp;

pub use error::{Error, Result};
