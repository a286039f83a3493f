//! A scripted network and an activated worker for tool tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use swcache_client::{Fetcher, ServiceWorker};
use swcache_core::{CacheDb, Error, Request, StoredResponse};
use url::Url;

pub(crate) const SCOPE: &str = "http://localhost:8080/";

/// Serves the listed URLs; every other URL is unreachable.
pub(crate) struct StaticNetwork(pub(crate) HashMap<String, StoredResponse>);

#[async_trait]
impl Fetcher for StaticNetwork {
    async fn fetch(&self, request: &Request) -> Result<StoredResponse, Error> {
        self.0
            .get(request.url.as_str())
            .cloned()
            .ok_or_else(|| Error::HttpError(format!("network error: {} unreachable", request.url)))
    }
}

pub(crate) fn html(body: &str) -> StoredResponse {
    StoredResponse::new(200, "OK", body.to_string()).with_header("Content-Type", "text/html")
}

/// An activated worker whose network serves the app shell plus `extra`.
pub(crate) async fn active_worker(extra: &[(&str, StoredResponse)]) -> (CacheDb, Arc<ServiceWorker>) {
    let mut routes = HashMap::new();
    routes.insert(SCOPE.to_string(), html("shell"));
    routes.insert(format!("{SCOPE}index.html"), html("index"));
    for (url, response) in extra {
        routes.insert(url.to_string(), response.clone());
    }

    let db = CacheDb::open_in_memory().await.unwrap();
    let worker = ServiceWorker::new(Url::parse(SCOPE).unwrap(), Arc::new(db.clone()), Arc::new(StaticNetwork(routes)));
    worker.start().await.unwrap();
    (db, Arc::new(worker))
}

/// Text of the first content item of a tool result.
pub(crate) fn result_text(result: &rmcp::model::CallToolResult) -> String {
    let content_val = serde_json::to_value(&result.content[0]).unwrap();
    content_val
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content")
        .to_string()
}
