use thiserror::Error;
use tracing::{debug, info};

use crate::rate_limit::RateLimitTracker;
use crate::twitter::{Tweet, TwitterClient, TwitterError, MAX_TWEETS_PER_REQUEST};

/// The oldest number of available tweets from a user timeline, as capped
/// by the remote API.
pub const MAX_TWEETS: usize = 3200;

/// Rate limit resource for timeline page fetches
pub const TIMELINE_RESOURCE: &str = "/statuses/user_timeline";

/// Rate limit resource for profile lookups
pub const USER_SHOW_RESOURCE: &str = "/users/show/:id";

/// Failure kinds of a full timeline fetch, switched over exhaustively by
/// the analysis job
#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("not enough API calls remaining (need {needed}, have {remaining})")]
    RateLimitExceeded { needed: u64, remaining: u64 },

    #[error("the user account {username} does not exist")]
    UserNotFound { username: String },

    #[error("{username} has no tweets")]
    NoTweets { username: String },

    #[error("{username}'s timeline is protected/private")]
    Protected { username: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn map_client_error(error: TwitterError, username: &str) -> TimelineError {
    match error {
        TwitterError::UserNotFound { .. } => TimelineError::UserNotFound {
            username: username.to_string(),
        },
        TwitterError::Protected { .. } => TimelineError::Protected {
            username: username.to_string(),
        },
        TwitterError::RateLimit { remaining, .. } => TimelineError::RateLimitExceeded {
            needed: 1,
            remaining: remaining.unwrap_or(0),
        },
        other => TimelineError::Other(anyhow::Error::new(other)),
    }
}

/// Walks a user timeline backward through the inclusive `max_id` cursor
/// until exhaustion, consulting the rate limit tracker before each call.
pub struct TimelinePaginator<'a> {
    client: &'a TwitterClient,
    tracker: &'a RateLimitTracker,
}

impl<'a> TimelinePaginator<'a> {
    pub fn new(client: &'a TwitterClient, tracker: &'a RateLimitTracker) -> Self {
        Self { client, tracker }
    }

    /// Remaining calls for the resource, priming the tracker from the
    /// remote API when nothing has been recorded yet
    async fn remaining(&self, resource: &str) -> Result<u64, TimelineError> {
        if let Some(remaining) = self.tracker.remaining_calls(resource).await? {
            return Ok(remaining);
        }
        self.tracker.refresh(self.client).await?;
        Ok(self
            .tracker
            .remaining_calls(resource)
            .await?
            .unwrap_or(0))
    }

    /// Number of requests needed to pull all available tweets from the
    /// subject's timeline: one per page, plus one for the end-of-timeline
    /// boundary check, plus one more when everything fits in a single page.
    /// The profile lookup used for the count is itself rate limited.
    async fn calculate_timeline_calls(&self, screen_name: &str) -> Result<u64, TimelineError> {
        let remaining = self.remaining(USER_SHOW_RESOURCE).await?;
        if remaining < 1 {
            return Err(TimelineError::RateLimitExceeded {
                needed: 1,
                remaining,
            });
        }

        let (profile, info) = self
            .client
            .get_user(screen_name)
            .await
            .map_err(|e| map_client_error(e, screen_name))?;
        self.tracker
            .record_response(USER_SHOW_RESOURCE, &info)
            .await?;

        let tweets = profile.statuses_count.min(MAX_TWEETS as u64);
        let mut overhead = 1;
        if tweets <= MAX_TWEETS_PER_REQUEST as u64 {
            overhead += 1;
        }

        Ok(tweets.div_ceil(MAX_TWEETS_PER_REQUEST as u64) + overhead)
    }

    /// One page of tweets older than `max_id`, with the duplicate cursor
    /// element already discarded. A page that comes back without even the
    /// cursor element is bad data and is retried once; persistent
    /// emptiness is treated as end of timeline.
    async fn older_tweets(
        &self,
        screen_name: &str,
        max_id: u64,
    ) -> Result<Vec<Tweet>, TimelineError> {
        let mut retried = false;

        loop {
            let remaining = self.remaining(TIMELINE_RESOURCE).await?;
            if remaining < 1 {
                return Err(TimelineError::RateLimitExceeded {
                    needed: 1,
                    remaining,
                });
            }

            let (mut page, info) = self
                .client
                .get_user_timeline(screen_name, MAX_TWEETS_PER_REQUEST, Some(max_id))
                .await
                .map_err(|e| map_client_error(e, screen_name))?;
            self.tracker
                .record_response(TIMELINE_RESOURCE, &info)
                .await?;

            if page.is_empty() {
                // The cursor element is inclusive, so a well-formed page is
                // never empty. Retry once, then treat it as exhaustion.
                if retried {
                    debug!(%screen_name, max_id, "Page still empty after retry, ending pagination");
                    return Ok(Vec::new());
                }
                debug!(%screen_name, max_id, "Received empty page, retrying once");
                retried = true;
                continue;
            }

            // max_id is inclusive: the first element duplicates the
            // previous page's last element
            page.remove(0);
            return Ok(page);
        }
    }

    /// Fetches all available tweets from the subject's timeline, newest
    /// first, including replies and retweets. Limited by the remote API to
    /// about the last 3,200 tweets.
    pub async fn fetch_full_timeline(&self, subject: &str) -> Result<Vec<Tweet>, TimelineError> {
        let screen_name = subject.trim_start_matches('@');

        let needed = self.calculate_timeline_calls(screen_name).await?;
        let remaining = self.remaining(TIMELINE_RESOURCE).await?;
        if remaining < needed {
            return Err(TimelineError::RateLimitExceeded { needed, remaining });
        }

        let (mut timeline, info) = self
            .client
            .get_user_timeline(screen_name, MAX_TWEETS_PER_REQUEST, None)
            .await
            .map_err(|e| map_client_error(e, screen_name))?;
        self.tracker
            .record_response(TIMELINE_RESOURCE, &info)
            .await?;

        if timeline.is_empty() {
            return Err(TimelineError::NoTweets {
                username: screen_name.to_string(),
            });
        }

        while timeline.len() < MAX_TWEETS {
            let Some(oldest) = timeline.last() else {
                break;
            };
            let older = self.older_tweets(screen_name, oldest.id).await?;
            if older.is_empty() {
                break;
            }
            timeline.extend(older);
        }
        timeline.truncate(MAX_TWEETS);

        info!(
            %screen_name,
            total = timeline.len(),
            "Fetched full timeline"
        );
        Ok(timeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::RateLimitTracker;
    use crate::storage::MemoryStore;
    use crate::twitter::RateLimitInfo;
    use mockito::{Matcher, Server, ServerGuard};
    use std::sync::Arc;

    fn tweet_json(id: u64) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "created_at": "Wed Aug 27 13:08:45 +0000 2008",
            "text": format!("tweet number {id}")
        })
    }

    fn page_json(ids: std::ops::RangeInclusive<u64>) -> String {
        let mut tweets: Vec<serde_json::Value> = ids.map(tweet_json).collect();
        // Timelines are newest-first
        tweets.reverse();
        serde_json::to_string(&tweets).unwrap()
    }

    async fn seeded_tracker(remaining_timeline: u64, remaining_show: u64) -> RateLimitTracker {
        let tracker = RateLimitTracker::new(Arc::new(MemoryStore::new()), "tweetfreq");
        let info = |remaining| RateLimitInfo {
            limit: Some(900),
            remaining: Some(remaining),
            reset: Some(4102444800),
        };
        tracker
            .record_response(TIMELINE_RESOURCE, &info(remaining_timeline))
            .await
            .unwrap();
        tracker
            .record_response(USER_SHOW_RESOURCE, &info(remaining_show))
            .await
            .unwrap();
        tracker
    }

    fn client_for(server: &ServerGuard) -> TwitterClient {
        TwitterClient::with_base_url("test-token", &server.url()).unwrap()
    }

    fn mock_profile(server: &mut ServerGuard, screen_name: &str, statuses_count: u64) -> mockito::Mock {
        server
            .mock("GET", "/1.1/users/show.json")
            .match_query(Matcher::UrlEncoded(
                "screen_name".into(),
                screen_name.into(),
            ))
            .with_header("content-type", "application/json")
            .with_header("x-rate-limit-remaining", "899")
            .with_body(
                serde_json::json!({
                    "id": 1u64,
                    "screen_name": screen_name,
                    "statuses_count": statuses_count
                })
                .to_string(),
            )
            .create()
    }

    #[tokio::test]
    async fn test_single_page_timeline_terminates_after_boundary_check() {
        let mut server = Server::new_async().await;
        let profile = mock_profile(&mut server, "smalluser", 3);

        let first_page = server
            .mock("GET", "/1.1/statuses/user_timeline.json")
            .match_query(Matcher::UrlEncoded("screen_name".into(), "smalluser".into()))
            .with_header("x-rate-limit-remaining", "898")
            .with_body(page_json(101..=103))
            .expect(1)
            .create();

        // Boundary check: the page at the oldest cursor holds only the
        // cursor element itself
        let boundary = server
            .mock("GET", "/1.1/statuses/user_timeline.json")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("screen_name".into(), "smalluser".into()),
                Matcher::UrlEncoded("max_id".into(), "101".into()),
            ]))
            .with_header("x-rate-limit-remaining", "897")
            .with_body(page_json(101..=101))
            .expect(1)
            .create();

        let client = client_for(&server);
        let tracker = seeded_tracker(10, 10).await;
        let paginator = TimelinePaginator::new(&client, &tracker);

        let timeline = paginator.fetch_full_timeline("smalluser").await.unwrap();
        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline[0].id, 103);
        assert_eq!(timeline[2].id, 101);

        profile.assert();
        first_page.assert();
        boundary.assert();
    }

    #[tokio::test]
    async fn test_pagination_discards_inclusive_cursor_duplicate() {
        let mut server = Server::new_async().await;
        mock_profile(&mut server, "biguser", 250);

        // First page: ids 1000..801 (200 tweets, newest first)
        server
            .mock("GET", "/1.1/statuses/user_timeline.json")
            .match_query(Matcher::UrlEncoded("screen_name".into(), "biguser".into()))
            .with_header("x-rate-limit-remaining", "890")
            .with_body(page_json(801..=1000))
            .create();

        // Second page: cursor 801 is inclusive, so its first element
        // repeats the previous page's last element
        server
            .mock("GET", "/1.1/statuses/user_timeline.json")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("screen_name".into(), "biguser".into()),
                Matcher::UrlEncoded("max_id".into(), "801".into()),
            ]))
            .with_header("x-rate-limit-remaining", "889")
            .with_body(page_json(751..=801))
            .create();

        // Exhaustion: only the cursor element remains
        server
            .mock("GET", "/1.1/statuses/user_timeline.json")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("screen_name".into(), "biguser".into()),
                Matcher::UrlEncoded("max_id".into(), "751".into()),
            ]))
            .with_header("x-rate-limit-remaining", "888")
            .with_body(page_json(751..=751))
            .create();

        let client = client_for(&server);
        let tracker = seeded_tracker(20, 10).await;
        let paginator = TimelinePaginator::new(&client, &tracker);

        let timeline = paginator.fetch_full_timeline("biguser").await.unwrap();
        assert_eq!(timeline.len(), 250);
        assert_eq!(timeline[0].id, 1000);
        assert_eq!(timeline[199].id, 801);
        // No duplicate across the page boundary
        assert_eq!(timeline[200].id, 800);
        assert_eq!(timeline[249].id, 751);
    }

    #[tokio::test]
    async fn test_insufficient_budget_fails_before_fetching_pages() {
        let mut server = Server::new_async().await;
        mock_profile(&mut server, "busyuser", 5000);

        let pages = server
            .mock("GET", "/1.1/statuses/user_timeline.json")
            .expect(0)
            .create();

        let client = client_for(&server);
        // 5000 statuses cap to 3200 -> 16 pages + 1 overhead = 17 needed
        let tracker = seeded_tracker(5, 10).await;
        let paginator = TimelinePaginator::new(&client, &tracker);

        let error = paginator.fetch_full_timeline("busyuser").await.unwrap_err();
        match error {
            TimelineError::RateLimitExceeded { needed, remaining } => {
                assert_eq!(needed, 17);
                assert_eq!(remaining, 5);
            }
            other => panic!("expected RateLimitExceeded, got {other:?}"),
        }
        pages.assert();
    }

    #[tokio::test]
    async fn test_unknown_user_maps_to_user_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/1.1/users/show.json")
            .match_query(Matcher::UrlEncoded("screen_name".into(), "ghost".into()))
            .with_status(404)
            .with_body("{\"errors\":[{\"code\":50,\"message\":\"User not found.\"}]}")
            .create();

        let client = client_for(&server);
        let tracker = seeded_tracker(10, 10).await;
        let paginator = TimelinePaginator::new(&client, &tracker);

        let error = paginator.fetch_full_timeline("ghost").await.unwrap_err();
        assert!(matches!(error, TimelineError::UserNotFound { .. }));
    }

    #[tokio::test]
    async fn test_protected_timeline_maps_to_protected() {
        let mut server = Server::new_async().await;
        mock_profile(&mut server, "privateuser", 10);

        server
            .mock("GET", "/1.1/statuses/user_timeline.json")
            .match_query(Matcher::UrlEncoded(
                "screen_name".into(),
                "privateuser".into(),
            ))
            .with_status(401)
            .with_body("{\"errors\":[{\"code\":220,\"message\":\"Not authorized.\"}]}")
            .create();

        let client = client_for(&server);
        let tracker = seeded_tracker(10, 10).await;
        let paginator = TimelinePaginator::new(&client, &tracker);

        let error = paginator
            .fetch_full_timeline("privateuser")
            .await
            .unwrap_err();
        assert!(matches!(error, TimelineError::Protected { .. }));
    }

    #[tokio::test]
    async fn test_empty_timeline_maps_to_no_tweets() {
        let mut server = Server::new_async().await;
        mock_profile(&mut server, "lurker", 0);

        server
            .mock("GET", "/1.1/statuses/user_timeline.json")
            .match_query(Matcher::UrlEncoded("screen_name".into(), "lurker".into()))
            .with_header("x-rate-limit-remaining", "898")
            .with_body("[]")
            .create();

        let client = client_for(&server);
        let tracker = seeded_tracker(10, 10).await;
        let paginator = TimelinePaginator::new(&client, &tracker);

        let error = paginator.fetch_full_timeline("lurker").await.unwrap_err();
        assert!(matches!(error, TimelineError::NoTweets { .. }));
    }

    #[tokio::test]
    async fn test_bad_empty_page_is_retried_once_then_treated_as_exhaustion() {
        let mut server = Server::new_async().await;
        mock_profile(&mut server, "flakyuser", 3);

        server
            .mock("GET", "/1.1/statuses/user_timeline.json")
            .match_query(Matcher::UrlEncoded("screen_name".into(), "flakyuser".into()))
            .with_header("x-rate-limit-remaining", "898")
            .with_body(page_json(201..=203))
            .create();

        // A page missing even the inclusive cursor element is bad data:
        // expect exactly one retry, then pagination ends
        let bad_page = server
            .mock("GET", "/1.1/statuses/user_timeline.json")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("screen_name".into(), "flakyuser".into()),
                Matcher::UrlEncoded("max_id".into(), "201".into()),
            ]))
            .with_header("x-rate-limit-remaining", "897")
            .with_body("[]")
            .expect(2)
            .create();

        let client = client_for(&server);
        let tracker = seeded_tracker(10, 10).await;
        let paginator = TimelinePaginator::new(&client, &tracker);

        let timeline = paginator.fetch_full_timeline("flakyuser").await.unwrap();
        assert_eq!(timeline.len(), 3);
        bad_page.assert();
    }
}
