//! Fakes shared by the worker tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use swcache_core::cache::EntryInfo;
use swcache_core::{CacheDb, CacheStorage, Error, Request, StoredResponse};
use url::Url;

use crate::fetch::Fetcher;

pub(crate) fn scope() -> Url {
    Url::parse("http://localhost:8080/").unwrap()
}

pub(crate) fn get(path: &str) -> Request {
    Request::get(scope().join(path).unwrap())
}

pub(crate) fn html(body: &str) -> StoredResponse {
    StoredResponse::new(200, "OK", body.to_string()).with_header("Content-Type", "text/html")
}

/// A network with a fixed route table that can be switched off.
pub(crate) struct FakeNetwork {
    routes: Mutex<HashMap<String, StoredResponse>>,
    online: AtomicBool,
    calls: AtomicUsize,
}

impl FakeNetwork {
    pub(crate) fn new() -> Self {
        Self { routes: Mutex::new(HashMap::new()), online: AtomicBool::new(true), calls: AtomicUsize::new(0) }
    }

    /// Serve `response` for `path` (resolved against the test scope).
    pub(crate) fn serve(&self, path: &str, response: StoredResponse) {
        let url = scope().join(path).unwrap().to_string();
        self.routes.lock().unwrap().insert(url, response);
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for FakeNetwork {
    async fn fetch(&self, request: &Request) -> Result<StoredResponse, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::HttpError("network error: connection refused".into()));
        }
        let routes = self.routes.lock().unwrap();
        Ok(routes
            .get(request.url.as_str())
            .cloned()
            .unwrap_or_else(|| StoredResponse::new(404, "Not Found", "not found")))
    }
}

/// CacheDb whose delete fails for the listed generation names.
pub(crate) struct FlakyDeletes {
    pub(crate) inner: CacheDb,
    pub(crate) failing: Vec<String>,
}

#[async_trait]
impl CacheStorage for FlakyDeletes {
    async fn open(&self, generation: &str) -> Result<(), Error> {
        self.inner.open(generation).await
    }

    async fn has(&self, generation: &str) -> Result<bool, Error> {
        self.inner.has(generation).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.inner.keys().await
    }

    async fn delete(&self, generation: &str) -> Result<bool, Error> {
        if self.failing.iter().any(|g| g == generation) {
            return Err(Error::InvalidState(format!("{generation} is locked")));
        }
        self.inner.delete(generation).await
    }

    async fn match_request(&self, generation: &str, request: &Request) -> Result<Option<StoredResponse>, Error> {
        self.inner.match_request(generation, request).await
    }

    async fn put(&self, generation: &str, request: &Request, response: &StoredResponse) -> Result<(), Error> {
        self.inner.put(generation, request, response).await
    }

    async fn put_all(&self, generation: &str, entries: &[(Request, StoredResponse)]) -> Result<(), Error> {
        self.inner.put_all(generation, entries).await
    }

    async fn entries(&self, generation: &str) -> Result<Vec<EntryInfo>, Error> {
        self.inner.entries(generation).await
    }
}

/// Storage whose reads always fail.
pub(crate) struct BrokenReads(pub(crate) CacheDb);

#[async_trait]
impl CacheStorage for BrokenReads {
    async fn open(&self, generation: &str) -> Result<(), Error> {
        self.0.open(generation).await
    }

    async fn has(&self, generation: &str) -> Result<bool, Error> {
        self.0.has(generation).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.0.keys().await
    }

    async fn delete(&self, generation: &str) -> Result<bool, Error> {
        self.0.delete(generation).await
    }

    async fn match_request(&self, _generation: &str, _request: &Request) -> Result<Option<StoredResponse>, Error> {
        Err(Error::CorruptEntry("unreadable".into()))
    }

    async fn put(&self, generation: &str, request: &Request, response: &StoredResponse) -> Result<(), Error> {
        self.0.put(generation, request, response).await
    }

    async fn put_all(&self, generation: &str, entries: &[(Request, StoredResponse)]) -> Result<(), Error> {
        self.0.put_all(generation, entries).await
    }

    async fn entries(&self, generation: &str) -> Result<Vec<EntryInfo>, Error> {
        self.0.entries(generation).await
    }
}

/// Storage whose writes never complete.
pub(crate) struct HangingWrites(pub(crate) CacheDb);

#[async_trait]
impl CacheStorage for HangingWrites {
    async fn open(&self, generation: &str) -> Result<(), Error> {
        self.0.open(generation).await
    }

    async fn has(&self, generation: &str) -> Result<bool, Error> {
        self.0.has(generation).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.0.keys().await
    }

    async fn delete(&self, generation: &str) -> Result<bool, Error> {
        self.0.delete(generation).await
    }

    async fn match_request(&self, generation: &str, request: &Request) -> Result<Option<StoredResponse>, Error> {
        self.0.match_request(generation, request).await
    }

    async fn put(&self, _generation: &str, _request: &Request, _response: &StoredResponse) -> Result<(), Error> {
        std::future::pending().await
    }

    async fn put_all(&self, _generation: &str, _entries: &[(Request, StoredResponse)]) -> Result<(), Error> {
        std::future::pending().await
    }

    async fn entries(&self, generation: &str) -> Result<Vec<EntryInfo>, Error> {
        self.0.entries(generation).await
    }
}
