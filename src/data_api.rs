//! Keyed YouTube Data API v3 calls. Every call costs quota, so callers only
//! reach for these after the keyless paths.

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::channel_id::{ChannelId, watch_url};
use crate::http::{FetchError, Fetched, HttpClient, HttpRequest};
use crate::uploads::Upload;

pub const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Largest `maxResults` the search endpoint accepts.
pub const MAX_PAGE_SIZE: usize = 50;

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    id: SearchItemId,
    #[serde(default)]
    snippet: Snippet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    channel_id: Option<String>,
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    #[serde(default)]
    snippet: Snippet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Snippet {
    title: String,
    description: String,
    published_at: String,
}

pub fn search_url() -> String {
    format!("{API_BASE}/search")
}

pub fn channels_url() -> String {
    format!("{API_BASE}/channels")
}

/// Top channel-type search hit for free text, accepted only if it validates.
pub fn search_channel<C: HttpClient>(
    client: &C,
    api_key: &str,
    query: &str,
    timeout: Duration,
) -> Fetched<ChannelId> {
    let request = HttpRequest::get(search_url(), timeout)
        .query("key", api_key)
        .query("q", query)
        .query("type", "channel")
        .query("part", "snippet")
        .query("maxResults", "1");
    list::<C, SearchItem>(client, &request).and_then(|items| {
        items
            .into_iter()
            .next()
            .and_then(|item| item.id.channel_id)
            .and_then(|id| ChannelId::parse(&id))
            .into()
    })
}

/// Snippet title for a channel. An empty title counts as no result.
pub fn channel_title<C: HttpClient>(
    client: &C,
    api_key: &str,
    channel: &ChannelId,
    timeout: Duration,
) -> Fetched<String> {
    let request = HttpRequest::get(channels_url(), timeout)
        .query("key", api_key)
        .query("id", channel.as_str())
        .query("part", "snippet");
    list::<C, ChannelItem>(client, &request).and_then(|items| {
        items
            .into_iter()
            .next()
            .map(|item| item.snippet.title)
            .filter(|title| !title.is_empty())
            .into()
    })
}

/// Most recent video uploads, newest first.
pub fn search_uploads<C: HttpClient>(
    client: &C,
    api_key: &str,
    channel: &ChannelId,
    max_results: usize,
    timeout: Duration,
) -> Fetched<Vec<Upload>> {
    let page_size = max_results.clamp(1, MAX_PAGE_SIZE);
    let request = HttpRequest::get(search_url(), timeout)
        .query("key", api_key)
        .query("channelId", channel.as_str())
        .query("part", "snippet")
        .query("order", "date")
        .query("maxResults", page_size.to_string())
        .query("type", "video");
    list::<C, SearchItem>(client, &request).and_then(|items| {
        let uploads: Vec<Upload> = items
            .into_iter()
            .filter_map(|item| {
                let video_id = item.id.video_id.filter(|id| !id.is_empty())?;
                Some(Upload {
                    url: watch_url(&video_id),
                    title: item.snippet.title,
                    published_at: item.snippet.published_at,
                    description: item.snippet.description,
                    video_id,
                })
            })
            .collect();
        if uploads.is_empty() {
            Fetched::Empty
        } else {
            Fetched::Found(uploads)
        }
    })
}

fn list<C: HttpClient, T: DeserializeOwned>(client: &C, request: &HttpRequest) -> Fetched<Vec<T>> {
    let body = match client.get(request).and_then(|response| response.into_ok_body()) {
        Ok(body) => body,
        Err(err) => {
            warn!(url = %request.url, error = %err, "data API request failed");
            return Fetched::Failed(err);
        }
    };
    match serde_json::from_str::<ListResponse<T>>(&body) {
        Ok(response) if response.items.is_empty() => Fetched::Empty,
        Ok(response) => Fetched::Found(response.items),
        Err(err) => {
            warn!(url = %request.url, error = %err, "data API returned malformed JSON");
            Fetched::Failed(FetchError::Parse(err.to_string()))
        }
    }
}
