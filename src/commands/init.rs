use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::rate_limit::RateLimitTracker;
use crate::storage::KvStore;
use crate::twitter::TwitterClient;

/// Exchanges an application key and secret for a bearer token, stores the
/// credentials in the shared store, and primes the rate limit counters
pub async fn execute(
    app_key: &str,
    app_secret: &str,
    kv: &Arc<dyn KvStore>,
    namespace: &str,
) -> Result<()> {
    let app_key = app_key.trim();
    let client = TwitterClient::initialize(app_key, app_secret.trim()).await?;

    kv.set(&format!("{namespace}.twitter.app_key"), app_key)
        .await?;
    kv.set(
        &format!("{namespace}.twitter.access_token"),
        client.bearer_token(),
    )
    .await?;

    let tracker = RateLimitTracker::new(Arc::clone(kv), namespace);
    tracker.refresh(&client).await?;

    info!("Stored Twitter credentials and primed rate limit counters");
    println!("All set!");
    Ok(())
}
