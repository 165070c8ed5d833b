//! SQLite-backed cache for extracted page content.
//!
//! One row per URL, written after a successful extraction and read before
//! every fetch. Entries expire lazily: a read that finds a row older than
//! the TTL deletes it and reports a miss. There is no background sweep and
//! no size bound.

pub mod connection;
pub mod handle;
pub mod migrations;
pub mod pages;

pub use crate::Error;

pub use connection::CacheDb;
pub use handle::{decode_handle, encode_handle};
pub use pages::{CacheEntry, DEFAULT_TTL_MS, PageContent};
