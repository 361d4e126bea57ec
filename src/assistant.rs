//! Summaries and questions over tracked videos via an OpenAI-compatible
//! chat-completions endpoint.

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use serde_json::json;

use crate::config::AssistantOptions;
use crate::http::{HttpClient, HttpRequest};
use crate::store::TrackedVideo;

pub const NO_NEW_VIDEOS: &str = "No new videos to summarize.";
pub const NO_TRACKED_VIDEOS: &str = "No videos available in the tracker yet.";

const SUMMARY_VIDEO_LIMIT: usize = 50;
const QUESTION_VIDEO_LIMIT: usize = 60;
const DESCRIPTION_CLIP: usize = 300;
const TEMPERATURE: f64 = 0.2;

const SUMMARY_SYSTEM_PROMPT: &str = "You are a helpful assistant that summarizes new YouTube uploads across multiple channels for a tracker dashboard.";
const QUESTION_SYSTEM_PROMPT: &str = "You are an assistant that answers questions using only the provided list of tracked YouTube videos.";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Summary of the given (unseen) videos. An empty list short-circuits without
/// calling the model.
pub fn summarize<C: HttpClient>(
    client: &C,
    options: &AssistantOptions,
    videos: &[TrackedVideo],
) -> Result<String> {
    if videos.is_empty() {
        return Ok(NO_NEW_VIDEOS.to_string());
    }
    let content = summary_context(videos);
    let prompt = format!(
        "Summarize the following new YouTube uploads. Group by channel, highlight themes, \
         noteworthy releases, and any time-sensitive items. Keep it concise and actionable.\n\n{content}"
    );
    complete(client, options, SUMMARY_SYSTEM_PROMPT, &prompt)
}

/// Answers `question` using only the given videos as context.
pub fn ask<C: HttpClient>(
    client: &C,
    options: &AssistantOptions,
    question: &str,
    videos: &[TrackedVideo],
) -> Result<String> {
    let question = question.trim();
    if question.is_empty() {
        bail!("question is empty");
    }
    if videos.is_empty() {
        return Ok(NO_TRACKED_VIDEOS.to_string());
    }
    let context = question_context(videos);
    let prompt = format!(
        "Using ONLY the context below, answer the user's question. Cite specific videos by title \
         when relevant.\n\nContext:\n{context}\n\nQuestion: {question}"
    );
    complete(client, options, QUESTION_SYSTEM_PROMPT, &prompt)
}

fn summary_context(videos: &[TrackedVideo]) -> String {
    let mut lines = Vec::new();
    for video in videos.iter().take(SUMMARY_VIDEO_LIMIT) {
        lines.push(format!(
            "- [{}] {} ({})",
            video.channel_title, video.title, video.url
        ));
        if !video.description.is_empty() {
            lines.push(format!("  Desc: {}", clip(&video.description, DESCRIPTION_CLIP)));
        }
    }
    lines.join("\n")
}

fn question_context(videos: &[TrackedVideo]) -> String {
    let mut lines = Vec::new();
    for video in videos.iter().take(QUESTION_VIDEO_LIMIT) {
        lines.push(format!(
            "- [{}] {} | {} | {}",
            video.channel_title, video.title, video.published_at, video.url
        ));
        if !video.description.is_empty() {
            lines.push(format!("  {}", clip(&video.description, DESCRIPTION_CLIP)));
        }
    }
    lines.join("\n")
}

/// Shortens `text` to at most `limit` characters, marking the cut with `...`.
pub fn clip(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let kept: String = text.chars().take(limit.saturating_sub(3)).collect();
    format!("{kept}...")
}

fn complete<C: HttpClient>(
    client: &C,
    options: &AssistantOptions,
    system: &str,
    user: &str,
) -> Result<String> {
    let api_key = options
        .api_key
        .as_deref()
        .ok_or_else(|| anyhow!("OPENAI_API_KEY is not set"))?;
    let request = HttpRequest::get(
        format!("{}/chat/completions", options.base_url.trim_end_matches('/')),
        options.timeout,
    )
    .header("Authorization", format!("Bearer {api_key}"));
    let body = json!({
        "model": options.model,
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": user},
        ],
        "temperature": TEMPERATURE,
    });

    let response = client
        .post_json(&request, &body)
        .context("chat completion request failed")?;
    if !response.is_ok() {
        bail!(
            "chat completion returned HTTP {}: {}",
            response.status,
            clip(&response.body, 200)
        );
    }
    let parsed: ChatResponse =
        serde_json::from_str(&response.body).context("parsing chat completion response")?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("chat completion returned no content"))
}
