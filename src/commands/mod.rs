use anyhow::{Context, Result};
use std::sync::Arc;

use crate::storage::KvStore;
use crate::twitter::TwitterClient;

pub mod analyze;
pub mod dates;
pub mod init;
pub mod status;
pub mod words;

/// Builds a Twitter client from an explicit bearer token, falling back to
/// the token stored in the shared store by `init`
pub(crate) async fn client_from(
    kv: &Arc<dyn KvStore>,
    namespace: &str,
    bearer_token: Option<&str>,
) -> Result<TwitterClient> {
    let token = match bearer_token {
        Some(token) => token.to_string(),
        None => kv
            .get(&format!("{namespace}.twitter.access_token"))
            .await?
            .context(
                "No bearer token configured. Run `tweetfreq init` or set TWEETFREQ_BEARER_TOKEN",
            )?,
    };
    TwitterClient::new(&token)
}
