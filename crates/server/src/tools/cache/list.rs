//! cache_list tool implementation.
//!
//! Lists generation names and the entries of the current generation.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::ServiceWorker;
use swcache_core::{EntryInfo, Error};

/// Parameters for the cache_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheListParams {}

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheListOutput {
    /// Name of the live generation.
    pub current: String,
    /// Every generation in storage, in creation order.
    pub generations: Vec<String>,
    /// Entries of the live generation.
    pub entries: Vec<EntryInfo>,
}

/// Implementation of the cache_list tool.
pub async fn list_impl(worker: &ServiceWorker, _params: CacheListParams) -> Result<CallToolResult, McpError> {
    let storage = worker.storage();
    let output = CacheListOutput {
        current: worker.generation().to_string(),
        generations: storage.keys().await?,
        entries: storage.entries(worker.generation()).await?,
    };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
