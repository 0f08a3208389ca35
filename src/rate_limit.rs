use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::storage::KvStore;
use crate::twitter::{RateLimitInfo, RateLimitStatus, TwitterClient};

/// Tracks remote rate limit windows per resource in the shared store so
/// independent workers see a consistent view. This component only records
/// and reads counters; callers decide what to do with the numbers.
pub struct RateLimitTracker {
    kv: Arc<dyn KvStore>,
    namespace: String,
}

impl RateLimitTracker {
    pub fn new(kv: Arc<dyn KvStore>, namespace: &str) -> Self {
        Self {
            kv,
            namespace: namespace.to_string(),
        }
    }

    fn resource_key(&self, resource: &str, field: &str) -> String {
        format!("{ns}.twitter.{resource}.{field}", ns = self.namespace)
    }

    fn reset_key(&self) -> String {
        format!("{ns}.twitter.reset", ns = self.namespace)
    }

    /// Remaining calls recorded for the resource, or None when nothing has
    /// been recorded yet. Pure read, never touches the remote API.
    pub async fn remaining_calls(&self, resource: &str) -> Result<Option<u64>> {
        let key = self.resource_key(resource, "remaining");
        match self.kv.get(&key).await? {
            Some(value) => {
                let remaining = value
                    .parse::<u64>()
                    .with_context(|| format!("Invalid remaining-calls value at {key}: {value}"))?;
                Ok(Some(remaining))
            }
            None => Ok(None),
        }
    }

    /// Persists the rate limit headers of a remote response. Called after
    /// every remote API call.
    pub async fn record_response(&self, resource: &str, info: &RateLimitInfo) -> Result<()> {
        if let Some(limit) = info.limit {
            self.kv
                .set(&self.resource_key(resource, "limit"), &limit.to_string())
                .await?;
        }
        if let Some(remaining) = info.remaining {
            self.kv
                .set(
                    &self.resource_key(resource, "remaining"),
                    &remaining.to_string(),
                )
                .await?;
        }
        if let Some(reset) = info.reset {
            self.kv.set(&self.reset_key(), &reset.to_string()).await?;
        }

        debug!(
            %resource,
            limit = ?info.limit,
            remaining = ?info.remaining,
            reset = ?info.reset,
            "Recorded rate limit headers"
        );
        Ok(())
    }

    /// Persists a full rate limit status snapshot: every resource window
    /// plus the shared reset timestamp.
    pub async fn record_status(
        &self,
        status: &RateLimitStatus,
        info: &RateLimitInfo,
    ) -> Result<()> {
        for windows in status.resources.values() {
            for (resource, window) in windows {
                self.kv
                    .set(
                        &self.resource_key(resource, "limit"),
                        &window.limit.to_string(),
                    )
                    .await?;
                self.kv
                    .set(
                        &self.resource_key(resource, "remaining"),
                        &window.remaining.to_string(),
                    )
                    .await?;
            }
        }
        if let Some(reset) = info.reset {
            self.kv.set(&self.reset_key(), &reset.to_string()).await?;
        }
        Ok(())
    }

    /// Refreshes all counters from the remote API and records them
    pub async fn refresh(&self, client: &TwitterClient) -> Result<()> {
        let (status, info) = client
            .get_rate_limit_status()
            .await
            .context("Failed to refresh rate limit status")?;
        self.record_status(&status, &info).await
    }

    /// The next rate limit reset time. A stored reset in the past is
    /// stale, so it is refreshed from the remote API before being trusted.
    pub async fn next_reset(&self, client: &TwitterClient) -> Result<DateTime<Utc>> {
        let mut reset = self.stored_reset().await?;

        let stale = match reset {
            Some(ts) => ts < Utc::now(),
            None => true,
        };
        if stale {
            self.refresh(client).await?;
            reset = self.stored_reset().await?;
        }

        reset.context("No rate limit reset timestamp recorded")
    }

    async fn stored_reset(&self) -> Result<Option<DateTime<Utc>>> {
        let key = self.reset_key();
        match self.kv.get(&key).await? {
            Some(value) => {
                let ts = value
                    .parse::<i64>()
                    .with_context(|| format!("Invalid reset timestamp at {key}: {value}"))?;
                let reset = DateTime::from_timestamp(ts, 0)
                    .with_context(|| format!("Out-of-range reset timestamp: {ts}"))?;
                Ok(Some(reset))
            }
            None => Ok(None),
        }
    }
}
