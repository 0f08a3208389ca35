use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::analysis::AnalysisJob;
use crate::rate_limit::RateLimitTracker;
use crate::storage::{CacheJobStore, KvStore};

/// Queues a subject and runs the analysis job to a terminal state, then
/// prints the resulting cache entry. Stands in for the background task
/// dispatch a web deployment would use.
pub async fn execute(
    username: &str,
    kv: &Arc<dyn KvStore>,
    namespace: &str,
    cache_hours: u64,
    bearer_token: Option<&str>,
) -> Result<()> {
    let username = username.trim_start_matches('@');

    let client = super::client_from(kv, namespace, bearer_token).await?;
    let tracker = RateLimitTracker::new(Arc::clone(kv), namespace);
    let store = CacheJobStore::new(Arc::clone(kv), namespace, cache_hours);

    if !store.create_queued(username).await? {
        info!("Request for @{username} already queued or cached");
    }

    let job = AnalysisJob::new(&client, &tracker, &store);
    job.run(username).await?;

    let entry = store
        .get(username)
        .await?
        .context("Cache entry vanished before it could be read back")?;
    println!("{}", serde_json::to_string_pretty(&entry)?);
    Ok(())
}
