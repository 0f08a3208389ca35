use anyhow::{Context, Result};
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::datetime_utils::{format_duration_until, parse_twitter_timestamp};
use crate::freq::{count, CountOptions};
use crate::rate_limit::RateLimitTracker;
use crate::report::{AnalysisResult, TimelineStats, TweetBoundary};
use crate::storage::{CacheJobStore, ERROR_TTL, RATE_LIMITED_TTL};
use crate::timeline::{TimelineError, TimelinePaginator};
use crate::twitter::{Tweet, TwitterClient};
use crate::words::{tweet_dates, words_from_timeline};

/// Number of ranked words kept in a report
pub const WORD_RANKING_LIMIT: usize = 300;

/// Fetches a subject's full timeline, derives word and date frequency
/// statistics, and writes the result through the job cache. Runs once per
/// successful claim and always terminates in a done or error entry.
pub struct AnalysisJob<'a> {
    client: &'a TwitterClient,
    tracker: &'a RateLimitTracker,
    store: &'a CacheJobStore,
}

impl<'a> AnalysisJob<'a> {
    pub fn new(
        client: &'a TwitterClient,
        tracker: &'a RateLimitTracker,
        store: &'a CacheJobStore,
    ) -> Self {
        Self {
            client,
            tracker,
            store,
        }
    }

    pub async fn run(&self, subject: &str) -> Result<()> {
        let subject = subject.trim_start_matches('@').to_lowercase();

        if !self.store.claim(&subject).await? {
            debug!(%subject, "Subject already claimed or cached, skipping duplicate job");
            return Ok(());
        }

        self.store
            .set_running(&subject, "Retrieving tweets", "")
            .await?;

        let paginator = TimelinePaginator::new(self.client, self.tracker);
        match paginator.fetch_full_timeline(&subject).await {
            // A failure while assembling or storing the report must still
            // terminate in an error entry, not leave the subject running
            Ok(timeline) => match self.complete(&subject, &timeline).await {
                Ok(()) => Ok(()),
                Err(e) => self.fail(&subject, TimelineError::Other(e)).await,
            },
            Err(error) => self.fail(&subject, error).await,
        }
    }

    async fn complete(&self, subject: &str, timeline: &[Tweet]) -> Result<()> {
        let total = timeline.len();
        self.store
            .set_progress(
                subject,
                "Processing tweets",
                &format!("Received {total} tweets"),
            )
            .await?;

        let result = build_result(subject, timeline, self.store.done_ttl())?;
        self.store.set_done(subject, result).await?;
        info!(%subject, total, "Analysis complete");
        Ok(())
    }

    async fn fail(&self, subject: &str, error: TimelineError) -> Result<()> {
        let (code, header, message, ttl) = match error {
            TimelineError::Protected { .. } => (
                403,
                "Tweets not available",
                "That user's timeline is protected/private".to_string(),
                ERROR_TTL,
            ),
            TimelineError::UserNotFound { .. } => (
                404,
                "User not found",
                "The specified Twitter username does not exist".to_string(),
                ERROR_TTL,
            ),
            TimelineError::NoTweets { .. } => (404, "No tweets found", String::new(), ERROR_TTL),
            TimelineError::RateLimitExceeded { needed, remaining } => {
                debug!(%subject, needed, remaining, "Rate limit budget exceeded");
                let message = match self.tracker.next_reset(self.client).await {
                    Ok(reset) => format!(
                        "TweetFreq is under a heavy load. Try again in {wait}.",
                        wait = format_duration_until(reset)
                    ),
                    Err(e) => {
                        warn!(%subject, "Failed to look up next rate limit reset: {e:#}");
                        "TweetFreq is under a heavy load. Try again shortly.".to_string()
                    }
                };
                (503, "Resources exhausted", message, RATE_LIMITED_TTL)
            }
            TimelineError::Other(e) => {
                warn!(%subject, "Analysis failed unexpectedly: {e:#}");
                (500, "Analysis failed", format!("{e:#}"), ERROR_TTL)
            }
        };

        info!(%subject, code, header, "Analysis ended in error state");
        self.store
            .set_error(subject, code, header, &message, ttl)
            .await
    }
}

/// Assembles the report payload from a non-empty, newest-first timeline
fn build_result(subject: &str, timeline: &[Tweet], done_ttl: Duration) -> Result<AnalysisResult> {
    let newest = timeline.first().context("Timeline is empty")?;
    let oldest = timeline.last().context("Timeline is empty")?;

    let end = TweetBoundary {
        id: newest.id,
        timestamp: parse_twitter_timestamp(&newest.created_at)?,
    };
    let start = TweetBoundary {
        id: oldest.id,
        timestamp: parse_twitter_timestamp(&oldest.created_at)?,
    };

    let words = count(
        words_from_timeline(timeline, true, true),
        &CountOptions::by_count().with_limit(WORD_RANKING_LIMIT),
    );
    let dates = count(tweet_dates(timeline)?, &CountOptions::by_key_ascending());

    let day_total: u64 = dates.iter().map(|(_, n)| *n).sum();
    let avg_per_day = if dates.is_empty() {
        0.0
    } else {
        day_total as f64 / dates.len() as f64
    };
    let max_per_day = dates.iter().map(|(_, n)| *n).max().unwrap_or(0);

    let created = Utc::now();
    let expires = created
        + chrono::Duration::from_std(done_ttl).context("Cache TTL out of range")?;

    Ok(AnalysisResult {
        start,
        end,
        total: timeline.len() as u64,
        words,
        dates,
        stats: TimelineStats {
            avg_per_day,
            max_per_day,
        },
        created,
        expires,
        users: vec![subject.to_string()],
        search_terms: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tweet(id: u64, created_at: &str, text: &str) -> Tweet {
        Tweet {
            id,
            created_at: created_at.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_build_result_boundaries_and_stats() {
        // Newest first, spanning two days
        let timeline = vec![
            tweet(3, "Thu Aug 28 09:00:00 +0000 2008", "shipping code today"),
            tweet(2, "Wed Aug 27 18:00:00 +0000 2008", "more code"),
            tweet(1, "Wed Aug 27 13:08:45 +0000 2008", "code code code"),
        ];

        let result = build_result("alice", &timeline, Duration::from_secs(3600)).unwrap();

        assert_eq!(result.end.id, 3);
        assert_eq!(result.start.id, 1);
        assert_eq!(result.total, 3);
        assert_eq!(result.users, vec!["alice".to_string()]);
        assert!(result.search_terms.is_empty());

        assert_eq!(result.words[0], ("code".to_string(), 5));
        assert_eq!(
            result.dates,
            vec![
                ("2008-08-27".to_string(), 2),
                ("2008-08-28".to_string(), 1)
            ]
        );
        assert_eq!(result.stats.max_per_day, 2);
        assert!((result.stats.avg_per_day - 1.5).abs() < f64::EPSILON);

        assert_eq!(
            (result.expires - result.created).num_seconds(),
            3600
        );
    }

    #[test]
    fn test_build_result_with_only_stopwords_yields_empty_words() {
        let timeline = vec![tweet(1, "Wed Aug 27 13:08:45 +0000 2008", "the and but RT")];
        let result = build_result("bob", &timeline, Duration::from_secs(3600)).unwrap();
        assert!(result.words.is_empty());
        assert_eq!(result.dates.len(), 1);
    }
}
