//! The keyed store the worker is written against.
//!
//! The worker never talks to SQLite directly: it holds an
//! `Arc<dyn CacheStorage>`, which is a [`CacheDb`] in production and may be
//! any other implementation in tests.

use async_trait::async_trait;

use super::connection::CacheDb;
use super::entries::EntryInfo;
use crate::Error;
use crate::http::{Request, StoredResponse};

/// A set of named generations, each a request-keyed response store.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a generation, creating it if absent.
    async fn open(&self, generation: &str) -> Result<(), Error>;

    async fn has(&self, generation: &str) -> Result<bool, Error>;

    /// Generation names in creation order.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Delete a generation with all of its entries. Returns false if absent.
    async fn delete(&self, generation: &str) -> Result<bool, Error>;

    /// Look up a request in one generation.
    async fn match_request(&self, generation: &str, request: &Request) -> Result<Option<StoredResponse>, Error>;

    /// Replace the entry for `request` with `response`.
    async fn put(&self, generation: &str, request: &Request, response: &StoredResponse) -> Result<(), Error>;

    /// Write a batch of entries atomically.
    async fn put_all(&self, generation: &str, entries: &[(Request, StoredResponse)]) -> Result<(), Error>;

    /// Summaries of every entry in a generation.
    async fn entries(&self, generation: &str) -> Result<Vec<EntryInfo>, Error>;
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, generation: &str) -> Result<(), Error> {
        self.open_generation(generation).await.map(|_| ())
    }

    async fn has(&self, generation: &str) -> Result<bool, Error> {
        self.has_generation(generation).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.generation_names().await
    }

    async fn delete(&self, generation: &str) -> Result<bool, Error> {
        self.delete_generation(generation).await
    }

    async fn match_request(&self, generation: &str, request: &Request) -> Result<Option<StoredResponse>, Error> {
        self.match_response(generation, request).await
    }

    async fn put(&self, generation: &str, request: &Request, response: &StoredResponse) -> Result<(), Error> {
        self.put_response(generation, request, response).await
    }

    async fn put_all(&self, generation: &str, entries: &[(Request, StoredResponse)]) -> Result<(), Error> {
        self.put_responses(generation, entries).await
    }

    async fn entries(&self, generation: &str) -> Result<Vec<EntryInfo>, Error> {
        self.list_entries(generation).await
    }
}
