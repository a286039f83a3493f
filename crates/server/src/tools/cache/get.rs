//! cache_get tool implementation.
//!
//! Reads one entry of the current generation.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::{ServiceWorker, resolve};
use swcache_core::{Error, Request};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// URL to look up. Relative URLs are resolved against the worker scope.
    pub url: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub url: String,
    pub generation: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(worker: &ServiceWorker, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let url = resolve(worker.scope(), &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let request = Request::get(url);

    let response = worker
        .storage()
        .match_request(worker.generation(), &request)
        .await?
        .ok_or_else(|| Error::CacheMiss(request.url.to_string()))?;

    let output = CacheGetOutput {
        url: request.url.to_string(),
        generation: worker.generation().to_string(),
        status: response.status,
        status_text: response.status_text.clone(),
        body: response.text(),
        headers: response.headers,
    };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize entry: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
