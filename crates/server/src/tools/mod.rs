//! MCP tool implementations.
//!
//! This module contains all tools exposed by the swcache server.

pub mod cache;
pub mod offline_fetch;

#[cfg(test)]
pub(crate) mod test_support;
