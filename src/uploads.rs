//! Source selection for channel titles and upload listings.
//!
//! Both lookups prefer the keyed Data API when a key is configured and fall
//! back to the public feed. Callers always get a value: a title (possibly a
//! placeholder) or a possibly-empty list of uploads.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::channel_id::ChannelId;
use crate::config::FetchOptions;
use crate::data_api;
use crate::feed;
use crate::http::{Fetched, HttpClient};

/// Normalized upload record, identical whichever source produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    pub video_id: String,
    pub title: String,
    pub published_at: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
}

pub fn placeholder_title(channel: &ChannelId) -> String {
    format!("Channel {channel}")
}

/// Best-effort display title. Never fails.
pub fn channel_title<C: HttpClient>(
    client: &C,
    options: &FetchOptions,
    channel: &ChannelId,
) -> String {
    if let Some(api_key) = options.api_key.as_deref() {
        match data_api::channel_title(client, api_key, channel, options.timeout) {
            Fetched::Found(title) => return title,
            Fetched::Empty => debug!(channel = %channel, "data API had no title"),
            Fetched::Failed(err) => debug!(channel = %channel, error = %err, "data API title lookup failed"),
        }
    }

    feed::fetch_feed(client, channel, options.timeout)
        .found()
        .and_then(|feed| feed.display_title())
        .unwrap_or_else(|| placeholder_title(channel))
}

/// Recent uploads, newest first. The Data API result is used exclusively when
/// it returns anything; otherwise the feed is consulted.
pub fn list_uploads<C: HttpClient>(
    client: &C,
    options: &FetchOptions,
    channel: &ChannelId,
) -> Vec<Upload> {
    if let Some(api_key) = options.api_key.as_deref() {
        match data_api::search_uploads(client, api_key, channel, options.max_results, options.timeout)
        {
            Fetched::Found(uploads) => return uploads,
            Fetched::Empty => debug!(channel = %channel, "data API listed no uploads, using feed"),
            Fetched::Failed(err) => {
                debug!(channel = %channel, error = %err, "data API listing failed, using feed")
            }
        }
    }

    match feed::fetch_feed(client, channel, options.timeout) {
        Fetched::Found(feed) => feed.uploads(options.max_results),
        Fetched::Empty | Fetched::Failed(_) => Vec::new(),
    }
}
