//! SQLite-backed storage for cache generations.
//!
//! Each generation is a named, request-keyed store of response snapshots.
//! This module provides:
//!
//! - Request keys derived from method and fragment-less URL (SHA-256)
//! - Generation open/list/delete, with entries removed alongside their generation
//! - Entry upsert, batch upsert and lookup
//! - The [`CacheStorage`] trait the worker is written against

pub mod connection;
pub mod entries;
pub mod generations;
pub mod hash;
pub mod migrations;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::EntryInfo;
pub use storage::CacheStorage;
