//! Activate step: drop every generation that is not the current one.

use futures_util::future::join_all;
use serde::Serialize;
use swcache_core::{CacheStorage, Error};

/// Result of an activation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivateReport {
    /// Stale generations that were deleted.
    pub deleted: Vec<String>,
    /// Stale generations whose deletion failed. They stay on disk until the
    /// next activation.
    pub failed: Vec<String>,
    /// Clients that switched to this version.
    pub claimed: usize,
}

/// Delete all generations other than `current`, concurrently.
///
/// Each deletion stands alone: one failing never stops the others. Only a
/// failure to list the generations is returned as an error.
pub(crate) async fn reclaim(current: &str, storage: &dyn CacheStorage) -> Result<ActivateReport, Error> {
    let stale: Vec<String> = storage
        .keys()
        .await?
        .into_iter()
        .filter(|name| name != current)
        .collect();

    let outcomes = join_all(stale.iter().map(|name| async move {
        tracing::info!(generation = %name, "deleting old cache");
        (name, storage.delete(name).await)
    }))
    .await;

    let mut report = ActivateReport::default();
    for (name, outcome) in outcomes {
        match outcome {
            Ok(_) => report.deleted.push(name.clone()),
            Err(e) => {
                tracing::warn!(generation = %name, error = %e, "failed to delete old cache");
                report.failed.push(name.clone());
            }
        }
    }

    Ok(report)
}
