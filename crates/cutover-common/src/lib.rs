//! Common building blocks for the cutover workspace: errors, retry, polling
//! and logging setup.

#![deny(missing_docs)]

pub mod error;
pub mod poll;
pub mod retry;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
