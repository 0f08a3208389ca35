use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use crate::report::{AnalysisResult, CacheEntry, JobStatus};

/// TTL for an entry that has been requested but not yet claimed
pub const QUEUED_TTL: Duration = Duration::from_secs(60 * 60);

/// TTL for a freshly claimed job, before any progress has been reported
pub const RUNNING_TTL: Duration = Duration::from_secs(2 * 60);

/// TTL for a running job after its first progress update
pub const PROGRESS_TTL: Duration = Duration::from_secs(10 * 60);

/// TTL for terminal error entries
pub const ERROR_TTL: Duration = Duration::from_secs(5 * 60);

/// TTL for rate-limited errors; near-immediate retry is fine once the
/// remote window resets
pub const RATE_LIMITED_TTL: Duration = Duration::from_secs(2);

/// Shared key-value storage, used via plain get/set/expire semantics.
/// Persistence and replication are the store's own concern.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
    /// Sets the key only if it does not already exist. Returns whether the
    /// write happened. This is the atomic check-and-set that job claiming
    /// relies on.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;
    async fn del(&self, key: &str) -> Result<()>;
}

/// Redis-backed store for production deployments
pub struct RedisStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .with_context(|| format!("Invalid redis URL: {url}"))?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .with_context(|| format!("Failed to connect to redis at {url}"))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key)
            .await
            .with_context(|| format!("Failed to read key {key}"))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value)
            .await
            .with_context(|| format!("Failed to write key {key}"))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await
            .with_context(|| format!("Failed to write key {key}"))
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .with_context(|| format!("Failed to write key {key}"))?;
        Ok(reply.is_some())
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key)
            .await
            .with_context(|| format!("Failed to delete key {key}"))
    }
}

/// In-memory store with TTL semantics matching [`RedisStore`]. Used in
/// tests and for single-process runs without a redis server.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (String, Option<tokio::time::Instant>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_live(deadline: &Option<tokio::time::Instant>) -> bool {
        deadline.map_or(true, |d| tokio::time::Instant::now() < d)
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((value, deadline)) if Self::is_live(deadline) => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), (value.to_string(), None));
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let deadline = tokio::time::Instant::now() + ttl;
        entries.insert(key.to_string(), (value.to_string(), Some(deadline)));
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        if let Some((_, deadline)) = entries.get(key) {
            if Self::is_live(deadline) {
                return Ok(false);
            }
        }
        let deadline = tokio::time::Instant::now() + ttl;
        entries.insert(key.to_string(), (value.to_string(), Some(deadline)));
        Ok(true)
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.remove(key);
        Ok(())
    }
}

/// Per-subject job state in the shared store, with status-specific TTLs.
/// The job that claims a subject is the only writer of running/done/error
/// transitions; pollers only read.
pub struct CacheJobStore {
    kv: Arc<dyn KvStore>,
    namespace: String,
    done_ttl: Duration,
}

impl CacheJobStore {
    pub fn new(kv: Arc<dyn KvStore>, namespace: &str, cache_hours: u64) -> Self {
        Self {
            kv,
            namespace: namespace.to_string(),
            done_ttl: Duration::from_secs(cache_hours * 60 * 60),
        }
    }

    fn entry_key(&self, subject: &str) -> String {
        format!(
            "{ns}.user.{subject}",
            ns = self.namespace,
            subject = subject.to_lowercase()
        )
    }

    pub async fn get(&self, subject: &str) -> Result<Option<CacheEntry>> {
        let key = self.entry_key(subject);
        match self.kv.get(&key).await? {
            Some(json) => {
                let entry: CacheEntry = serde_json::from_str(&json)
                    .with_context(|| format!("Failed to parse cache entry at {key}"))?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Creates a queued entry if the subject has none. Idempotent: the
    /// first poll for a subject queues it, later polls just read.
    pub async fn create_queued(&self, subject: &str) -> Result<bool> {
        let key = self.entry_key(subject);
        let entry = serde_json::to_string(&CacheEntry::queued())
            .context("Failed to serialize queued entry")?;
        let created = self.kv.set_nx_ex(&key, &entry, QUEUED_TTL).await?;
        if created {
            debug!(%subject, "Queued analysis request");
        }
        Ok(created)
    }

    /// Claims the subject for a single job run. Rejects when an entry
    /// exists in any state other than queued, and takes a NX claim lock so
    /// concurrent claim attempts admit at most one job.
    pub async fn claim(&self, subject: &str) -> Result<bool> {
        if let Some(entry) = self.get(subject).await? {
            if entry.status != JobStatus::Queued {
                debug!(
                    %subject,
                    status = ?entry.status,
                    "Subject already in flight or cached, rejecting duplicate job"
                );
                return Ok(false);
            }
        }

        self.kv
            .set_nx_ex(&self.claim_key(subject), "1", RUNNING_TTL)
            .await
    }

    fn claim_key(&self, subject: &str) -> String {
        format!("{key}.claim", key = self.entry_key(subject))
    }

    async fn put(&self, subject: &str, entry: &CacheEntry, ttl: Duration) -> Result<()> {
        let key = self.entry_key(subject);
        let json = serde_json::to_string(entry)
            .with_context(|| format!("Failed to serialize cache entry for {subject}"))?;
        self.kv.set_ex(&key, &json, ttl).await
    }

    pub async fn set_running(&self, subject: &str, header: &str, message: &str) -> Result<()> {
        self.put(subject, &CacheEntry::running(header, message), RUNNING_TTL)
            .await
    }

    /// Progress update for an already-running job. Extends the TTL so a
    /// long pagination pass does not expire mid-flight.
    pub async fn set_progress(&self, subject: &str, header: &str, message: &str) -> Result<()> {
        self.put(subject, &CacheEntry::running(header, message), PROGRESS_TTL)
            .await
    }

    pub async fn set_done(&self, subject: &str, result: AnalysisResult) -> Result<()> {
        self.put(subject, &CacheEntry::done(result), self.done_ttl)
            .await?;
        self.release_claim(subject).await
    }

    pub async fn set_error(
        &self,
        subject: &str,
        code: u16,
        header: &str,
        message: &str,
        ttl: Duration,
    ) -> Result<()> {
        self.put(subject, &CacheEntry::error(code, header, message), ttl)
            .await?;
        self.release_claim(subject).await
    }

    /// Drops the claim lock on a terminal transition. The lock must not
    /// outlive the entry it guards: a short-lived error entry expires and
    /// re-queues well before the running TTL runs out.
    async fn release_claim(&self, subject: &str) -> Result<()> {
        self.kv.del(&self.claim_key(subject)).await
    }

    /// TTL used for done entries, so results can advertise their expiry
    pub fn done_ttl(&self) -> Duration {
        self.done_ttl
    }
}
