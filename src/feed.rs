//! Keyless Atom upload feed published for every channel.

use std::time::Duration;

use roxmltree::{Document, Node};
use tracing::debug;

use crate::channel_id::{ChannelId, watch_url};
use crate::http::{FetchError, Fetched, HttpClient, HttpRequest};
use crate::uploads::Upload;

pub const FEED_URL: &str = "https://www.youtube.com/feeds/videos.xml";

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
const YT_NS: &str = "http://www.youtube.com/xml/schemas/2015";
const MEDIA_NS: &str = "http://search.yahoo.com/mrss/";

/// Suffix auto-generated "Topic" channels carry in their feed title.
const TOPIC_SUFFIX: &str = " - Topic";

/// Parsed view of one channel feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelFeed {
    pub author: Option<String>,
    pub title: Option<String>,
    pub entries: Vec<FeedEntry>,
}

/// A raw feed entry. `video_id` is `None` when the entry lacks `yt:videoId`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub video_id: Option<String>,
    pub title: String,
    pub published: String,
    pub link: Option<String>,
    pub description: String,
}

impl ChannelFeed {
    /// Author name, else the feed title with the topic suffix removed.
    pub fn display_title(&self) -> Option<String> {
        if let Some(author) = self.author.as_deref().filter(|name| !name.is_empty()) {
            return Some(author.to_string());
        }
        self.title
            .as_deref()
            .filter(|title| !title.is_empty())
            .map(|title| title.replace(TOPIC_SUFFIX, ""))
    }

    /// Normalizes the first `max_results` entries, skipping those without an ID.
    pub fn uploads(&self, max_results: usize) -> Vec<Upload> {
        self.entries
            .iter()
            .take(max_results)
            .filter_map(|entry| {
                let video_id = entry.video_id.clone().filter(|id| !id.is_empty())?;
                let url = entry.link.clone().unwrap_or_else(|| watch_url(&video_id));
                Some(Upload {
                    title: entry.title.clone(),
                    published_at: entry.published.clone(),
                    description: entry.description.clone(),
                    url,
                    video_id,
                })
            })
            .collect()
    }
}

pub fn fetch_feed<C: HttpClient>(
    client: &C,
    channel: &ChannelId,
    timeout: Duration,
) -> Fetched<ChannelFeed> {
    let request = HttpRequest::get(FEED_URL, timeout)
        .query("channel_id", channel.as_str())
        .browser_headers();
    let body = match client.get(&request).and_then(|response| response.into_ok_body()) {
        Ok(body) => body,
        Err(err) => {
            debug!(channel = %channel, error = %err, "feed request failed");
            return Fetched::Failed(err);
        }
    };
    match parse_feed(&body) {
        Ok(feed) => Fetched::Found(feed),
        Err(err) => {
            debug!(channel = %channel, error = %err, "feed did not parse");
            Fetched::Failed(err)
        }
    }
}

pub fn parse_feed(xml: &str) -> Result<ChannelFeed, FetchError> {
    let document = Document::parse(xml).map_err(|err| FetchError::Parse(err.to_string()))?;
    let root = document.root_element();
    if !root.has_tag_name((ATOM_NS, "feed")) {
        return Err(FetchError::Parse(format!(
            "expected an Atom feed, found <{}>",
            root.tag_name().name()
        )));
    }

    let author = child(root, ATOM_NS, "author")
        .and_then(|author| child_text(author, ATOM_NS, "name"));
    let title = child_text(root, ATOM_NS, "title");
    let entries = root
        .children()
        .filter(|node| node.has_tag_name((ATOM_NS, "entry")))
        .map(parse_entry)
        .collect();

    Ok(ChannelFeed {
        author,
        title,
        entries,
    })
}

fn parse_entry(entry: Node<'_, '_>) -> FeedEntry {
    FeedEntry {
        video_id: child_text(entry, YT_NS, "videoId"),
        title: child_text(entry, ATOM_NS, "title").unwrap_or_default(),
        published: child_text(entry, ATOM_NS, "published").unwrap_or_default(),
        link: child(entry, ATOM_NS, "link")
            .and_then(|link| link.attribute("href"))
            .map(str::to_string),
        description: child(entry, MEDIA_NS, "group")
            .and_then(|group| child_text(group, MEDIA_NS, "description"))
            .unwrap_or_default(),
    }
}

fn child<'a, 'input>(node: Node<'a, 'input>, ns: &str, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|child| child.has_tag_name((ns, name)))
}

fn child_text(node: Node<'_, '_>, ns: &str, name: &str) -> Option<String> {
    child(node, ns, name)
        .and_then(|child| child.text())
        .map(str::to_string)
}
