//! Cache-related MCP tools.
//!
//! Read-only views of the worker's cache storage.

pub mod get;
pub mod list;

pub use get::{CacheGetParams, get_impl};
pub use list::{CacheListParams, list_impl};
