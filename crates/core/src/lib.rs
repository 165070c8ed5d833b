//! Core types and shared functionality for isis.
//!
//! This crate provides:
//! - Page content cache with SQLite backend and TTL expiry
//! - Reversible content handles
//! - Unified error types
//! - Layered configuration

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheEntry, PageContent, decode_handle, encode_handle};
pub use config::{AppConfig, ConfigError, SearchConfig, SummaryConfig};
pub use error::Error;
