use anyhow::{Context, Result};
use std::sync::Arc;

use crate::storage::{CacheJobStore, KvStore};

/// Prints the cached job state for a subject. The first contact for an
/// unknown subject creates its queued entry, so polling is idempotent and
/// has no other side effects.
pub async fn execute(
    username: &str,
    kv: &Arc<dyn KvStore>,
    namespace: &str,
    cache_hours: u64,
) -> Result<()> {
    let username = username.trim_start_matches('@');
    let store = CacheJobStore::new(Arc::clone(kv), namespace, cache_hours);

    store.create_queued(username).await?;
    let entry = store
        .get(username)
        .await?
        .context("Cache entry vanished before it could be read back")?;

    println!("{}", serde_json::to_string_pretty(&entry)?);
    Ok(())
}
