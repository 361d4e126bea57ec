//! Maps free-form channel references to canonical channel IDs.
//!
//! Stages run in a fixed order and the first hit wins. The keyless stages
//! always run before the quota-consuming search stage.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::channel_id::{self, ChannelId};
use crate::data_api;
use crate::http::{Fetched, HttpClient, HttpRequest};

pub const SITE_ROOT: &str = "https://www.youtube.com";

/// Marker embedded in channel page markup next to the owning channel ID.
static EMBEDDED_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""channelId":"(UC[0-9A-Za-z_-]{22})""#).expect("valid embedded id regex")
});

type Stage<'a, C> = fn(&ChannelResolver<'a, C>, &str) -> Fetched<ChannelId>;

pub struct ChannelResolver<'a, C> {
    client: &'a C,
    api_key: Option<&'a str>,
    timeout: Duration,
}

impl<'a, C: HttpClient> ChannelResolver<'a, C> {
    pub fn new(client: &'a C, api_key: Option<&'a str>, timeout: Duration) -> Self {
        Self {
            client,
            api_key,
            timeout,
        }
    }

    fn stages() -> [(&'static str, Stage<'a, C>); 4] {
        [
            ("literal id", Self::literal_id),
            ("url", Self::embedded_in_url),
            ("channel pages", Self::scrape_pages),
            ("search api", Self::search_api),
        ]
    }

    /// Returns the canonical ID for `input`, or `None` once every stage missed.
    pub fn resolve(&self, input: &str) -> Option<ChannelId> {
        let text = input.trim();
        if text.is_empty() {
            return None;
        }
        for (name, stage) in Self::stages() {
            match stage(self, text) {
                Fetched::Found(id) => {
                    debug!(stage = name, channel = %id, "resolved channel");
                    return Some(id);
                }
                Fetched::Empty => debug!(stage = name, "no match"),
                Fetched::Failed(err) => debug!(stage = name, error = %err, "stage failed"),
            }
        }
        None
    }

    fn literal_id(&self, text: &str) -> Fetched<ChannelId> {
        ChannelId::parse(text).into()
    }

    fn embedded_in_url(&self, text: &str) -> Fetched<ChannelId> {
        if !channel_id::mentions_platform_domain(text) {
            return Fetched::Empty;
        }
        channel_id::extract_from_url(text).into()
    }

    fn scrape_pages(&self, text: &str) -> Fetched<ChannelId> {
        let mut last_error = None;
        for url in candidate_urls(text) {
            let request = HttpRequest::get(&url, self.timeout).browser_headers();
            match self.client.get(&request).and_then(|response| response.into_ok_body()) {
                Ok(body) => {
                    if let Some(id) = find_embedded_id(&body) {
                        return Fetched::Found(id);
                    }
                    debug!(%url, "page had no channel marker");
                }
                Err(err) => {
                    debug!(%url, error = %err, "candidate page unavailable");
                    last_error = Some(err);
                }
            }
        }
        last_error.map_or(Fetched::Empty, Fetched::Failed)
    }

    fn search_api(&self, text: &str) -> Fetched<ChannelId> {
        match self.api_key {
            Some(api_key) => data_api::search_channel(self.client, api_key, text, self.timeout),
            None => Fetched::Empty,
        }
    }
}

/// Pages worth scanning for an embedded channel ID, in the order they are
/// tried.
pub fn candidate_urls(text: &str) -> Vec<String> {
    if text.starts_with('@') {
        return vec![
            format!("{SITE_ROOT}/{text}"),
            format!("{SITE_ROOT}/{text}/about"),
        ];
    }

    if text.contains("youtube.com") {
        let url = if text.starts_with("http") {
            text.to_string()
        } else {
            format!("https://{text}")
        };
        let mut urls = vec![url.clone()];
        if !url.ends_with("/about") {
            urls.push(format!("{}/about", url.trim_end_matches('/')));
        }
        return urls;
    }

    vec![
        format!("{SITE_ROOT}/@{text}"),
        format!("{SITE_ROOT}/@{text}/about"),
        format!("{SITE_ROOT}/c/{text}"),
        format!("{SITE_ROOT}/user/{text}"),
    ]
}

pub fn find_embedded_id(body: &str) -> Option<ChannelId> {
    EMBEDDED_ID_RE
        .captures(body)
        .and_then(|captures| ChannelId::parse(&captures[1]))
}
