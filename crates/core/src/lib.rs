//! Core types and shared functionality for swcache.
//!
//! This crate provides:
//! - Cache generation storage with a SQLite backend
//! - The request/response model shared by the worker and its host
//! - Unified error types
//! - Host configuration

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheDb, CacheStorage, EntryInfo};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use http::{Request, StoredResponse};
