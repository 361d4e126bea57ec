//! Canonical channel identifiers and the URL shapes that carry them.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

pub const CHANNEL_URL_PREFIX: &str = "https://www.youtube.com/channel/";
pub const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

static CHANNEL_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^UC[0-9A-Za-z_-]{22}$").expect("valid channel id regex"));

static CHANNEL_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/channel/(UC[0-9A-Za-z_-]{22})").expect("valid channel path regex")
});

/// A channel identifier that is known to match the `UC` + 22 character
/// syntax. The only way to build one is [`ChannelId::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelId(String);

impl ChannelId {
    /// Trims the input and accepts it only when it is an exact canonical ID.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if is_channel_id(trimmed) {
            Some(Self(trimmed.to_owned()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Browse URL stored alongside the channel row.
    pub fn browse_url(&self) -> String {
        format!("{CHANNEL_URL_PREFIX}{}", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChannelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ChannelId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("not a channel id: {value}"))
    }
}

impl From<ChannelId> for String {
    fn from(value: ChannelId) -> Self {
        value.0
    }
}

/// Returns true when `text`, after trimming, is exactly a canonical channel ID.
pub fn is_channel_id(text: &str) -> bool {
    CHANNEL_ID_RE.is_match(text.trim())
}

/// True when the text mentions one of the video platform domains.
pub fn mentions_platform_domain(text: &str) -> bool {
    text.contains("youtube.com") || text.contains("youtu.be")
}

/// Pulls a channel ID out of a URL, either from a `/channel/<id>` path segment
/// or from a `channel=<id>` query parameter.
pub fn extract_from_url(text: &str) -> Option<ChannelId> {
    if let Some(captures) = CHANNEL_PATH_RE.captures(text) {
        return ChannelId::parse(&captures[1]);
    }

    let parsed = Url::parse(text)
        .or_else(|_| Url::parse(&format!("https://{text}")))
        .ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "channel")
        .and_then(|(_, value)| ChannelId::parse(&value))
}

/// Canonical watch URL for a video ID.
pub fn watch_url(video_id: &str) -> String {
    format!("{WATCH_URL_PREFIX}{video_id}")
}
