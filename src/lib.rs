//! Write-through cached incremental model flows.
//!
//! Inbound events pass through a named flow (interceptor → feeder → classifier engine
//! → outbound channel). Engines keep learned model state in a read-through,
//! write-through cache whose backing store arbitrates concurrent writers by version.

pub mod api;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod flow;
pub mod metrics;
pub mod models;
pub mod store;

pub use error::{AppError, Result};
