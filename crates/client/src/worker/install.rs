//! Install step: pre-cache the manifest into the current generation.

use futures_util::future::try_join_all;
use serde::Serialize;
use swcache_core::{CacheStorage, Error, Request, StoredResponse};
use url::Url;

use crate::fetch::{Fetcher, resolve};

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub generation: String,
    /// Absolute URLs of the pre-cached manifest entries, in manifest order.
    pub cached: Vec<String>,
}

/// Fetch every manifest path and store all of them, or none.
///
/// All fetches run concurrently. A rejected fetch or a non-2xx status fails
/// the whole batch before anything is written.
pub(crate) async fn precache(
    generation: &str, manifest: &[String], scope: &Url, storage: &dyn CacheStorage, fetcher: &dyn Fetcher,
) -> Result<InstallReport, Error> {
    let requests = manifest
        .iter()
        .map(|path| {
            resolve(scope, path)
                .map(Request::get)
                .map_err(|e| Error::InstallFailed(format!("{path}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let entries: Vec<(Request, StoredResponse)> = try_join_all(requests.into_iter().map(|request| async move {
        let response = fetcher
            .fetch(&request)
            .await
            .map_err(|e| Error::InstallFailed(format!("{}: {}", request.url, e)))?;
        if !response.is_ok() {
            return Err(Error::InstallFailed(format!("{}: status {}", request.url, response.status)));
        }
        Ok((request, response))
    }))
    .await?;

    storage.open(generation).await?;
    storage.put_all(generation, &entries).await?;

    let cached: Vec<String> = entries.iter().map(|(request, _)| request.cache_url()).collect();
    tracing::info!(generation, count = cached.len(), "cached app shell");

    Ok(InstallReport { generation: generation.to_string(), cached })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::testing::{FakeNetwork, get, html, scope};
    use swcache_core::CacheDb;

    fn manifest() -> Vec<String> {
        vec!["./".to_string(), "./index.html".to_string()]
    }

    #[tokio::test]
    async fn test_precache_stores_every_path() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = FakeNetwork::new();
        network.serve("./", html("shell"));
        network.serve("./index.html", html("index"));

        let report = precache("debt-ledger-v1", &manifest(), &scope(), &db, &network)
            .await
            .unwrap();

        assert_eq!(report.cached, vec!["http://localhost:8080/", "http://localhost:8080/index.html"]);
        for path in manifest() {
            assert!(db.match_request("debt-ledger-v1", &get(&path)).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_precache_rejects_error_status() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = FakeNetwork::new();
        network.serve("./", html("shell"));

        let err = precache("debt-ledger-v1", &manifest(), &scope(), &db, &network)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InstallFailed(ref msg) if msg.contains("status 404")));
        assert!(!db.has("debt-ledger-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_precache_offline_writes_nothing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = FakeNetwork::new();
        network.set_online(false);

        let err = precache("debt-ledger-v1", &manifest(), &scope(), &db, &network)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InstallFailed(_)));
        assert!(db.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_precache_invalid_path() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = FakeNetwork::new();
        let manifest = vec!["ftp://example.com/x".to_string()];

        let err = precache("debt-ledger-v1", &manifest, &scope(), &db, &network)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InstallFailed(_)));
        assert_eq!(network.calls(), 0);
    }
}
