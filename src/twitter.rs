use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Twitter API specific errors with structured information
#[derive(Debug, Error)]
pub enum TwitterError {
    #[error("invalid application key and/or secret")]
    Auth,

    #[error("rate limit exceeded (reset at {reset:?}, remaining: {remaining:?})")]
    RateLimit {
        reset: Option<u64>,
        remaining: Option<u64>,
    },

    #[error("user not found: {username}")]
    UserNotFound { username: String },

    #[error("timeline for {username} is protected")]
    Protected { username: String },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

const TWITTER_API_BASE: &str = "https://api.twitter.com";

/// Maximum tweets to receive per timeline request. Twitter API upper limit.
pub const MAX_TWEETS_PER_REQUEST: u32 = 200;

/// Rate limit information extracted from `x-rate-limit-*` response headers
#[derive(Debug, Clone, Default)]
pub struct RateLimitInfo {
    /// Maximum number of requests allowed in the current time window
    pub limit: Option<u64>,
    /// Number of requests remaining in the current time window
    pub remaining: Option<u64>,
    /// Unix timestamp when the rate limit resets
    pub reset: Option<u64>,
}

/// A single post from a user timeline. Immutable once fetched.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Tweet {
    /// The tweet ID
    pub id: u64,

    /// Tweet creation date, e.g. "Wed Aug 27 13:08:45 +0000 2008"
    pub created_at: String,

    /// Tweet content text
    pub text: String,
}

/// A user profile, reduced to the fields timeline analysis needs
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserProfile {
    pub id: u64,
    pub screen_name: String,
    /// Total number of tweets the account has posted
    pub statuses_count: u64,
    #[serde(default)]
    pub protected: bool,
}

/// One rate limit window as reported by the rate limit status endpoint
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResourceWindow {
    pub limit: u64,
    pub remaining: u64,
    pub reset: u64,
}

/// Application rate limit status: resource family -> resource -> window
#[derive(Debug, Deserialize)]
pub struct RateLimitStatus {
    pub resources: HashMap<String, HashMap<String, ResourceWindow>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Twitter API client holding an application bearer token
pub struct TwitterClient {
    client: Client,
    bearer_token: String,
    base_url: String,
}

impl TwitterClient {
    /// Creates a client from an already-obtained bearer token
    pub fn new(bearer_token: &str) -> Result<Self> {
        Self::with_base_url(bearer_token, TWITTER_API_BASE)
    }

    /// Creates a client against a custom API base URL (used by tests)
    pub fn with_base_url(bearer_token: &str, base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            bearer_token: bearer_token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Exchanges an application key and secret for a bearer token and
    /// returns a ready-to-use client
    pub async fn initialize(app_key: &str, app_secret: &str) -> Result<Self, TwitterError> {
        Self::initialize_with_base_url(app_key, app_secret, TWITTER_API_BASE).await
    }

    pub async fn initialize_with_base_url(
        app_key: &str,
        app_secret: &str,
        base_url: &str,
    ) -> Result<Self, TwitterError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let url = format!("{base_url}/oauth2/token");
        debug!(%url, "Requesting application bearer token");

        let response = client
            .post(&url)
            .basic_auth(app_key, Some(app_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .context("Failed to send token request to Twitter API")?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::UNAUTHORIZED {
            return Err(TwitterError::Auth);
        }
        if !status.is_success() {
            return Err(TwitterError::Api {
                status: status.as_u16(),
                message: "token request failed".to_string(),
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;

        Ok(Self {
            client,
            bearer_token: token.access_token,
            base_url,
        })
    }

    /// The bearer token currently in use, so callers can persist it
    pub fn bearer_token(&self) -> &str {
        &self.bearer_token
    }

    /// Parses rate limit headers from a response
    fn parse_rate_limit_headers(response: &reqwest::Response) -> RateLimitInfo {
        let header_value = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
        };

        RateLimitInfo {
            limit: header_value("x-rate-limit-limit"),
            remaining: header_value("x-rate-limit-remaining"),
            reset: header_value("x-rate-limit-reset"),
        }
    }

    async fn api_get(&self, username: &str, url: &str) -> Result<reqwest::Response, TwitterError> {
        debug!(%username, %url, "Making request to Twitter API");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .context("Failed to send request to Twitter API")?;

        let rate_limits = Self::parse_rate_limit_headers(&response);
        let status = response.status();

        if status.is_success() {
            debug!(
                "Received Twitter API response for {username} with limits: {limit:?}/{remaining:?} until {reset:?}",
                limit = rate_limits.limit,
                remaining = rate_limits.remaining,
                reset = rate_limits.reset
            );
            return Ok(response);
        }

        Err(match status {
            StatusCode::NOT_FOUND => TwitterError::UserNotFound {
                username: username.to_string(),
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TwitterError::Protected {
                username: username.to_string(),
            },
            StatusCode::TOO_MANY_REQUESTS => TwitterError::RateLimit {
                reset: rate_limits.reset,
                remaining: rate_limits.remaining,
            },
            _ => TwitterError::Api {
                status: status.as_u16(),
                message: format!(
                    "limit: {limit:?}, remaining: {remaining:?}, reset: {reset:?}",
                    limit = rate_limits.limit,
                    remaining = rate_limits.remaining,
                    reset = rate_limits.reset
                ),
            },
        })
    }

    /// Get a user's profile from their screen name
    pub async fn get_user(
        &self,
        screen_name: &str,
    ) -> Result<(UserProfile, RateLimitInfo), TwitterError> {
        let url = format!(
            "{base}/1.1/users/show.json?screen_name={screen_name}",
            base = self.base_url
        );

        let response = self.api_get(screen_name, &url).await?;
        let rate_limits = Self::parse_rate_limit_headers(&response);

        let profile: UserProfile = response
            .json()
            .await
            .context("Failed to parse user profile response")?;

        Ok((profile, rate_limits))
    }

    /// Fetches one page of a user's timeline, newest first, including
    /// replies and retweets. `max_id` is inclusive: when given, the first
    /// element of the page is the tweet with that ID.
    pub async fn get_user_timeline(
        &self,
        screen_name: &str,
        count: u32,
        max_id: Option<u64>,
    ) -> Result<(Vec<Tweet>, RateLimitInfo), TwitterError> {
        let mut url = format!(
            "{base}/1.1/statuses/user_timeline.json?screen_name={screen_name}&count={count}&include_rts=true",
            base = self.base_url
        );
        if let Some(id) = max_id {
            url.push_str(&format!("&max_id={id}"));
        }

        let response = self.api_get(screen_name, &url).await?;
        let rate_limits = Self::parse_rate_limit_headers(&response);

        let tweets: Vec<Tweet> = response
            .json()
            .await
            .context("Failed to parse timeline response")?;

        Ok((tweets, rate_limits))
    }

    /// Looks up the application rate limit status for the statuses and
    /// users resource families
    pub async fn get_rate_limit_status(
        &self,
    ) -> Result<(RateLimitStatus, RateLimitInfo), TwitterError> {
        let url = format!(
            "{base}/1.1/application/rate_limit_status.json?resources=statuses,users",
            base = self.base_url
        );

        let response = self.api_get("rate_limit_status", &url).await?;
        let rate_limits = Self::parse_rate_limit_headers(&response);

        let status: RateLimitStatus = response
            .json()
            .await
            .context("Failed to parse rate limit status response")?;

        Ok((status, rate_limits))
    }
}
