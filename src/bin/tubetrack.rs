#![forbid(unsafe_code)]

//! Command-line front end: track channels, pull new uploads, list and mark
//! videos, and ask the assistant about them.

use anyhow::{Context, Result};
use chrono::DateTime;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tubetrack::{
    assistant,
    config::{ConfigOverrides, TrackerConfig, resolve_config},
    http::UreqClient,
    store::{ChannelRecord, ChannelStore, TrackedVideo},
    tracker::{AddOutcome, Tracker},
};

#[derive(Debug, Parser)]
#[command(name = "tubetrack", version, about = "Track YouTube channels and their new uploads")]
struct Cli {
    /// SQLite database file.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Dotenv-style file with configuration values.
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
    /// TOML settings file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// YouTube Data API key.
    #[arg(long, global = true)]
    api_key: Option<String>,
    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,
    /// Enable debug logging on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Track a channel given an ID, URL, @handle or name.
    Add { input: String },
    /// List tracked channels with their unseen counts.
    Channels,
    /// Check every tracked channel for new uploads.
    Check,
    /// Show unseen videos grouped by channel.
    Unseen {
        #[arg(long)]
        channel: Option<String>,
        #[arg(long, default_value_t = 200)]
        limit: usize,
    },
    /// Show the most recent videos, seen or not.
    Recent {
        #[arg(long)]
        channel: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Mark unseen videos as seen.
    Seen {
        #[arg(long)]
        channel: Option<String>,
    },
    /// Stop tracking a channel and drop its videos.
    Remove { channel_id: String },
    /// Summarize unseen videos with the assistant.
    Summarize {
        #[arg(long)]
        mark_seen: bool,
        #[arg(long)]
        model: Option<String>,
    },
    /// Ask a question about the tracked videos.
    Ask {
        question: String,
        #[arg(long)]
        model: Option<String>,
    },
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        let model = match &self.command {
            Command::Summarize { model, .. } | Command::Ask { model, .. } => model.clone(),
            _ => None,
        };
        ConfigOverrides {
            db_path: self.db.clone(),
            api_key: self.api_key.clone(),
            model,
            env_path: self.env_file.clone(),
            settings_path: self.config.clone(),
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = resolve_config(cli.overrides())?;
    let store = ChannelStore::open(&config.db_path)
        .await
        .with_context(|| format!("opening database {}", config.db_path.display()))?;
    let tracker = Tracker::new(store, UreqClient::new());

    run(&cli, &config, &tracker).await
}

async fn run(cli: &Cli, config: &TrackerConfig, tracker: &Tracker<UreqClient>) -> Result<()> {
    let store = tracker.store();
    match &cli.command {
        Command::Add { input } => {
            let outcome = tracker.add_channel(input, &config.fetch).await?;
            if cli.json {
                return print_json(&outcome);
            }
            match outcome {
                AddOutcome::Unresolved => println!("Could not resolve a channel from {input:?}."),
                AddOutcome::AlreadyTracked { channel_id } => {
                    println!("Channel {channel_id} is already tracked.")
                }
                AddOutcome::Added {
                    channel_id,
                    title,
                    inserted,
                } => println!("Added {title} ({channel_id}) with {inserted} videos."),
            }
        }
        Command::Channels => {
            let summaries = store.channel_summaries().await?;
            if cli.json {
                return print_json(&summaries);
            }
            if summaries.is_empty() {
                println!("No channels tracked yet.");
            }
            for summary in summaries {
                let channel = &summary.channel;
                let checked = channel
                    .last_checked
                    .as_deref()
                    .map_or_else(|| "never".to_string(), format_time);
                println!(
                    "{} [{}] unseen: {} last checked: {}",
                    display_name(channel),
                    channel.channel_id,
                    summary.unseen_count,
                    checked
                );
            }
        }
        Command::Check => {
            let report = tracker.check_updates(&config.fetch).await?;
            if cli.json {
                return print_json(&report);
            }
            for check in &report.channels {
                let name = if check.title.trim().is_empty() {
                    &check.channel_id
                } else {
                    &check.title
                };
                println!("{name}: {} new", check.inserted);
            }
            println!("{} new videos in total.", report.total_new);
        }
        Command::Unseen { channel, limit } => {
            let videos = store.unseen_videos(channel.as_deref(), *limit).await?;
            if cli.json {
                return print_json(&videos);
            }
            if videos.is_empty() {
                println!("No unseen videos.");
            }
            for (title, group) in group_by_channel(&videos) {
                println!("{title} ({})", group.len());
                for video in group {
                    print_video(video);
                }
            }
        }
        Command::Recent { channel, limit } => {
            let videos = store.recent_videos(channel.as_deref(), *limit).await?;
            if cli.json {
                return print_json(&videos);
            }
            for video in &videos {
                let marker = if video.seen { " " } else { "*" };
                println!(
                    "{marker} [{}] {} | {}",
                    video.channel_title,
                    video.title,
                    format_time(&video.published_at)
                );
                println!("    {}", video.url);
            }
        }
        Command::Seen { channel } => {
            let changed = store.mark_videos_seen(channel.as_deref()).await?;
            if cli.json {
                return print_json(&serde_json::json!({ "marked": changed }));
            }
            println!("Marked {changed} videos as seen.");
        }
        Command::Remove { channel_id } => {
            let existed = store.get_channel(channel_id).await?.is_some();
            store.remove_channel(channel_id).await?;
            if cli.json {
                return print_json(&serde_json::json!({ "removed": existed }));
            }
            if existed {
                println!("Removed {channel_id}.");
            } else {
                println!("Channel {channel_id} was not tracked.");
            }
        }
        Command::Summarize { mark_seen, .. } => {
            let videos = store.unseen_videos(None, 200).await?;
            let summary = assistant::summarize(tracker.client(), &config.assistant, &videos)?;
            if *mark_seen && !videos.is_empty() {
                store.mark_videos_seen(None).await?;
            }
            if cli.json {
                return print_json(&serde_json::json!({ "summary": summary }));
            }
            println!("{summary}");
        }
        Command::Ask { question, .. } => {
            let videos = store.recent_videos(None, 200).await?;
            let answer = assistant::ask(tracker.client(), &config.assistant, question, &videos)?;
            if cli.json {
                return print_json(&serde_json::json!({ "answer": answer }));
            }
            println!("{answer}");
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_video(video: &TrackedVideo) {
    println!("  - {} | {}", video.title, format_time(&video.published_at));
    println!("    {}", video.url);
}

/// Renders an RFC 3339 timestamp as `YYYY-MM-DD HH:MM UTC`; anything else is
/// shown as stored.
fn format_time(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|time| time.to_utc().format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

/// Groups videos by channel ID, keeping the order in which each channel first
/// appears. The title of a group's first video labels the group.
fn group_by_channel(videos: &[TrackedVideo]) -> Vec<(&str, Vec<&TrackedVideo>)> {
    let mut groups: Vec<(&str, Vec<&TrackedVideo>)> = Vec::new();
    for video in videos {
        match groups
            .iter_mut()
            .find(|(_, group)| group[0].channel_id == video.channel_id)
        {
            Some((_, group)) => group.push(video),
            None => groups.push((video.channel_title.as_str(), vec![video])),
        }
    }
    groups
}

/// Stored title, or the channel ID when the title is blank.
fn display_name(channel: &ChannelRecord) -> &str {
    if channel.title.trim().is_empty() {
        &channel.channel_id
    } else {
        &channel.title
    }
}
