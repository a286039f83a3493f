//! offline_fetch tool implementation.
//!
//! Dispatches a fetch event to the worker and reports the response together
//! with where it came from.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::{Event, EventOutcome, ServiceWorker, resolve};
use swcache_core::{Error, Request};

/// Parameters for the offline_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OfflineFetchParams {
    /// URL to fetch. Relative URLs are resolved against the worker scope.
    pub url: String,

    /// HTTP method (default: GET). Only GET responses are cached.
    #[serde(default = "default_method")]
    pub method: String,

    /// Optional request body.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the offline_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OfflineFetchOutput {
    /// The resolved request URL.
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub content_type: Option<String>,
    /// "network", "cache" or "synthesized".
    pub served_from: String,
    /// Response body, decoded as UTF-8 (lossy).
    pub body: String,
}

/// Implementation of the offline_fetch tool.
pub async fn fetch_impl(worker: &ServiceWorker, params: OfflineFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let url = resolve(worker.scope(), &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let mut request = Request::new(&params.method, url);
    if let Some(body) = params.body {
        request = request.with_body(body);
    }

    let EventOutcome::Responded(interception) = worker.dispatch(Event::Fetch(request.clone())).await? else {
        return Err(Error::InvalidState("fetch event produced no response".into()).into());
    };

    let served_from = interception.source.as_str().to_string();
    let response = interception.response;

    let output = OfflineFetchOutput {
        url: request.url.to_string(),
        status: response.status,
        status_text: response.status_text.clone(),
        content_type: response.content_type().map(str::to_string),
        served_from,
        body: response.text(),
    };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
