//! Fetch handling: network first, cache as fallback.
//!
//! ```text
//! Fetching ──ok──▶ CachingAndResponding
//!    │
//!    └─err─▶ FallingBack ──hit──▶ CacheHitResponding
//!                  │
//!                  └─miss─▶ SynthesizingResponding
//! ```
//!
//! A successful network response is returned immediately. Its copy is
//! written to the current generation by a detached task, so a request issued
//! right after may still miss.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use swcache_core::{CacheStorage, Error, Request, StoredResponse};
use tokio::task::JoinHandle;

use crate::fetch::Fetcher;

/// Body of the response synthesized when neither network nor cache can serve.
pub const OFFLINE_BODY: &str = "Offline - resource not cached";

/// Per-request states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterceptState {
    Fetching,
    CachingAndResponding,
    FallingBack,
    CacheHitResponding,
    SynthesizingResponding,
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Network,
    Cache,
    Synthesized,
}

impl ResponseSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
            ResponseSource::Synthesized => "synthesized",
        }
    }

    /// The terminal state that produces a response from this source.
    pub fn terminal_state(self) -> InterceptState {
        match self {
            ResponseSource::Network => InterceptState::CachingAndResponding,
            ResponseSource::Cache => InterceptState::CacheHitResponding,
            ResponseSource::Synthesized => InterceptState::SynthesizingResponding,
        }
    }
}

impl InterceptState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            InterceptState::CachingAndResponding
                | InterceptState::CacheHitResponding
                | InterceptState::SynthesizingResponding
        )
    }

    /// Source of the response, once the state is terminal.
    pub fn source(self) -> Option<ResponseSource> {
        match self {
            InterceptState::CachingAndResponding => Some(ResponseSource::Network),
            InterceptState::CacheHitResponding => Some(ResponseSource::Cache),
            InterceptState::SynthesizingResponding => Some(ResponseSource::Synthesized),
            InterceptState::Fetching | InterceptState::FallingBack => None,
        }
    }
}

/// The response to one intercepted request.
#[derive(Debug)]
pub struct Interception {
    pub source: ResponseSource,
    pub response: StoredResponse,
    /// The background cache write, when one was started. Dropping the handle
    /// does not cancel the write.
    pub cache_write: Option<JoinHandle<()>>,
}

impl Interception {
    /// Terminal state the request ended in.
    pub fn state(&self) -> InterceptState {
        self.source.terminal_state()
    }
}

/// Runs the network-first protocol against one generation.
#[derive(Clone)]
pub struct Interceptor {
    generation: String,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
}

fn advance(request: &Request, from: InterceptState, to: InterceptState) -> InterceptState {
    tracing::debug!(url = %request.url, ?from, ?to, "fetch state");
    to
}

impl Interceptor {
    pub fn new(generation: impl Into<String>, storage: Arc<dyn CacheStorage>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { generation: generation.into(), storage, fetcher }
    }

    /// Resolve a request to a response. Never fails: every error ends in the
    /// cache or the synthesized 503.
    pub async fn handle(&self, request: Request) -> Interception {
        let state = InterceptState::Fetching;

        match self.fetcher.fetch(&request).await {
            Ok(response) => {
                advance(&request, state, InterceptState::CachingAndResponding);
                let cache_write = self.store_in_background(&request, response.clone());
                Interception { source: ResponseSource::Network, response, cache_write }
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, network = e.is_network(), "network fetch failed");
                let state = advance(&request, state, InterceptState::FallingBack);
                match self.lookup(&request).await {
                    Some(response) => {
                        tracing::info!(url = %request.url, "serving from cache");
                        advance(&request, state, InterceptState::CacheHitResponding);
                        Interception { source: ResponseSource::Cache, response, cache_write: None }
                    }
                    None => {
                        advance(&request, state, InterceptState::SynthesizingResponding);
                        let response = StoredResponse::unavailable(OFFLINE_BODY);
                        Interception { source: ResponseSource::Synthesized, response, cache_write: None }
                    }
                }
            }
        }
    }

    /// Fallback lookup. A storage error counts as a miss.
    async fn lookup(&self, request: &Request) -> Option<StoredResponse> {
        match self.storage.match_request(&self.generation, request).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "cache lookup failed");
                None
            }
        }
    }

    /// Write `response` under `request` without holding up the caller.
    ///
    /// Non-`GET` requests and partial (206) responses are not stored.
    fn store_in_background(&self, request: &Request, response: StoredResponse) -> Option<JoinHandle<()>> {
        if !request.is_get() {
            tracing::debug!(method = %request.method, url = %request.url, "not caching non-GET request");
            return None;
        }
        if response.status == 206 {
            tracing::debug!(url = %request.url, "not caching partial response");
            return None;
        }

        let storage = Arc::clone(&self.storage);
        let generation = self.generation.clone();
        let request = request.clone();
        Some(tokio::spawn(async move {
            let written: Result<(), Error> = async {
                storage.open(&generation).await?;
                storage.put(&generation, &request, &response).await
            }
            .await;
            if let Err(e) = written {
                tracing::warn!(url = %request.url, error = %e, "failed to cache response");
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::testing::{BrokenReads, FakeNetwork, HangingWrites, get, html};
    use std::time::Duration;
    use swcache_core::CacheDb;

    const GENERATION: &str = "debt-ledger-v1";

    async fn setup() -> (CacheDb, Arc<FakeNetwork>, Interceptor) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(FakeNetwork::new());
        let interceptor = Interceptor::new(GENERATION, Arc::new(db.clone()), network.clone());
        (db, network, interceptor)
    }

    async fn settle(interception: Interception) -> Interception {
        let Interception { source, response, cache_write } = interception;
        if let Some(handle) = cache_write {
            handle.await.unwrap();
        }
        Interception { source, response, cache_write: None }
    }

    #[tokio::test]
    async fn test_network_response_returned_and_cached() {
        let (db, network, interceptor) = setup().await;
        network.serve("./index.html", html("X"));

        let result = settle(interceptor.handle(get("./index.html")).await).await;

        assert_eq!(result.state(), InterceptState::CachingAndResponding);
        assert_eq!(result.source, ResponseSource::Network);
        assert_eq!(result.response.status, 200);
        assert_eq!(result.response.text(), "X");

        let stored = db.match_request(GENERATION, &get("./index.html")).await.unwrap().unwrap();
        assert_eq!(stored.status, 200);
        assert_eq!(stored.text(), "X");
    }

    #[tokio::test]
    async fn test_network_wins_over_stale_cache() {
        let (db, network, interceptor) = setup().await;
        db.put(GENERATION, &get("./app.js"), &html("stale")).await.unwrap();
        network.serve("./app.js", html("fresh"));

        let result = settle(interceptor.handle(get("./app.js")).await).await;

        assert_eq!(result.response.text(), "fresh");
        let stored = db.match_request(GENERATION, &get("./app.js")).await.unwrap().unwrap();
        assert_eq!(stored.text(), "fresh");
    }

    #[tokio::test]
    async fn test_offline_serves_cached_entry() {
        let (db, network, interceptor) = setup().await;
        let cached = html("cached").with_header("ETag", "\"v1\"");
        db.put(GENERATION, &get("./index.html"), &cached).await.unwrap();
        network.set_online(false);

        let result = interceptor.handle(get("./index.html")).await;

        assert_eq!(result.state(), InterceptState::CacheHitResponding);
        assert_eq!(result.response, cached);
        assert!(result.cache_write.is_none());
    }

    #[tokio::test]
    async fn test_offline_miss_synthesizes_503() {
        let (_db, network, interceptor) = setup().await;
        network.set_online(false);

        let result = interceptor.handle(get("./missing.png")).await;

        assert_eq!(result.state(), InterceptState::SynthesizingResponding);
        assert_eq!(result.source, ResponseSource::Synthesized);
        assert_eq!(result.response.status, 503);
        assert_eq!(result.response.status_text, "Service Unavailable");
        assert_eq!(result.response.content_type(), Some("text/plain"));
        assert_eq!(result.response.text(), "Offline - resource not cached");
    }

    #[tokio::test]
    async fn test_repeated_fetch_overwrites_entry() {
        let (db, network, interceptor) = setup().await;
        network.serve("./data.json", html("first"));
        settle(interceptor.handle(get("./data.json")).await).await;

        network.serve("./data.json", html("second"));
        settle(interceptor.handle(get("./data.json")).await).await;

        let entries = db.entries(GENERATION).await.unwrap();
        assert_eq!(entries.len(), 1);
        let stored = db.match_request(GENERATION, &get("./data.json")).await.unwrap().unwrap();
        assert_eq!(stored.text(), "second");
    }

    #[tokio::test]
    async fn test_error_status_is_cached_as_is() {
        let (db, network, interceptor) = setup().await;
        network.serve("./broken", StoredResponse::new(500, "Internal Server Error", "boom"));

        let result = settle(interceptor.handle(get("./broken")).await).await;
        assert_eq!(result.response.status, 500);

        network.set_online(false);
        let offline = interceptor.handle(get("./broken")).await;
        assert_eq!(offline.state(), InterceptState::CacheHitResponding);
        assert_eq!(offline.response.status, 500);
        assert!(db.has(GENERATION).await.unwrap());
    }

    #[tokio::test]
    async fn test_non_get_not_cached() {
        let (db, network, interceptor) = setup().await;
        network.serve("./api/debts", html("created"));
        let post = Request::new("POST", get("./api/debts").url).with_body("{}");

        let result = interceptor.handle(post.clone()).await;
        assert_eq!(result.state(), InterceptState::CachingAndResponding);
        assert!(result.cache_write.is_none());
        assert!(db.keys().await.unwrap().is_empty());

        network.set_online(false);
        let offline = interceptor.handle(post).await;
        assert_eq!(offline.state(), InterceptState::SynthesizingResponding);
    }

    #[tokio::test]
    async fn test_partial_content_not_cached() {
        let (db, network, interceptor) = setup().await;
        network.serve("./video.mp4", StoredResponse::new(206, "Partial Content", "bytes"));

        let result = interceptor.handle(get("./video.mp4")).await;
        assert_eq!(result.response.status, 206);
        assert!(result.cache_write.is_none());
        assert!(db.match_request(GENERATION, &get("./video.mp4")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_storage_error_on_fallback_still_responds() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(FakeNetwork::new());
        network.set_online(false);
        let interceptor = Interceptor::new(GENERATION, Arc::new(BrokenReads(db)), network);

        let result = interceptor.handle(get("./index.html")).await;
        assert_eq!(result.state(), InterceptState::SynthesizingResponding);
        assert_eq!(result.response.status, 503);
    }

    #[tokio::test]
    async fn test_response_not_held_up_by_cache_write() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(FakeNetwork::new());
        network.serve("./index.html", html("X"));
        let interceptor = Interceptor::new(GENERATION, Arc::new(HangingWrites(db.clone())), network);

        let result = tokio::time::timeout(Duration::from_secs(1), interceptor.handle(get("./index.html")))
            .await
            .expect("response waited on the cache write");

        assert_eq!(result.source, ResponseSource::Network);
        assert_eq!(result.response.text(), "X");
        let write = result.cache_write.expect("write should have been started");
        assert!(!write.is_finished());
        write.abort();
        assert!(db.match_request(GENERATION, &get("./index.html")).await.unwrap().is_none());
    }

    #[test]
    fn test_every_source_maps_to_a_terminal_state() {
        for source in [ResponseSource::Network, ResponseSource::Cache, ResponseSource::Synthesized] {
            let state = source.terminal_state();
            assert!(state.is_terminal());
            assert_eq!(state.source(), Some(source));
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(!InterceptState::Fetching.is_terminal());
        assert!(!InterceptState::FallingBack.is_terminal());
        assert!(InterceptState::CachingAndResponding.is_terminal());
        assert!(InterceptState::CacheHitResponding.is_terminal());
        assert!(InterceptState::SynthesizingResponding.is_terminal());
        assert_eq!(InterceptState::FallingBack.source(), None);
    }
}
