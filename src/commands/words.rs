use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::freq::{count, CountOptions};
use crate::rate_limit::RateLimitTracker;
use crate::storage::KvStore;
use crate::timeline::TimelinePaginator;
use crate::words::words_from_timeline;

/// Fetches a user's full timeline and prints the word frequency ranking
pub async fn execute(
    username: &str,
    minimum: Option<u64>,
    maximum: Option<u64>,
    limit: Option<usize>,
    kv: &Arc<dyn KvStore>,
    namespace: &str,
    bearer_token: Option<&str>,
) -> Result<()> {
    let username = username.trim_start_matches('@');

    let client = super::client_from(kv, namespace, bearer_token).await?;
    let tracker = RateLimitTracker::new(Arc::clone(kv), namespace);
    let paginator = TimelinePaginator::new(&client, &tracker);

    let timeline = paginator.fetch_full_timeline(username).await?;
    info!(
        "Fetched {total} tweets for @{username}",
        total = timeline.len()
    );

    let mut options = CountOptions::by_count().with_count_bounds(minimum, maximum);
    options.limit = limit;
    let counts = count(words_from_timeline(&timeline, true, true), &options);

    println!("{}", serde_json::to_string_pretty(&counts)?);
    Ok(())
}
