use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a cached analysis job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Error,
}

/// The cached state of an analysis job for one subject, serialized as JSON
/// in the shared store. `data` is present only when `status` is `done`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub status: JobStatus,
    pub code: u16,
    #[serde(default)]
    pub header: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<AnalysisResult>,
}

impl CacheEntry {
    pub fn queued() -> Self {
        Self {
            status: JobStatus::Queued,
            code: 200,
            header: "Queued".to_string(),
            message: "Your request will be processed shortly".to_string(),
            data: None,
        }
    }

    pub fn running(header: &str, message: &str) -> Self {
        Self {
            status: JobStatus::Running,
            code: 200,
            header: header.to_string(),
            message: message.to_string(),
            data: None,
        }
    }

    pub fn done(result: AnalysisResult) -> Self {
        Self {
            status: JobStatus::Done,
            code: 200,
            header: String::new(),
            message: String::new(),
            data: Some(result),
        }
    }

    pub fn error(code: u16, header: &str, message: &str) -> Self {
        Self {
            status: JobStatus::Error,
            code,
            header: header.to_string(),
            message: message.to_string(),
            data: None,
        }
    }
}

/// First or last tweet of the analyzed timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweetBoundary {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
}

/// Per-day activity statistics derived from the date frequency list.
/// Raw numbers only: locale formatting is the caller's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineStats {
    pub avg_per_day: f64,
    pub max_per_day: u64,
}

/// The `data` payload of a completed analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Oldest tweet in the analyzed range
    pub start: TweetBoundary,
    /// Newest tweet in the analyzed range
    pub end: TweetBoundary,
    /// Total number of tweets analyzed
    pub total: u64,
    /// Word frequency ranking, most frequent first
    pub words: Vec<(String, u64)>,
    /// Tweets per date, chronological
    pub dates: Vec<(String, u64)>,
    pub stats: TimelineStats,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
    /// The single analyzed subject
    pub users: Vec<String>,
    /// Reserved for multi-term search support
    pub search_terms: Vec<String>,
}
