//! Ingestion entry points: adding a channel and checking every tracked
//! channel for new uploads.

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::channel_id::ChannelId;
use crate::config::FetchOptions;
use crate::http::HttpClient;
use crate::resolver::ChannelResolver;
use crate::store::ChannelStore;
use crate::uploads;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AddOutcome {
    /// No resolution stage produced a channel ID.
    Unresolved,
    AlreadyTracked { channel_id: ChannelId },
    Added {
        channel_id: ChannelId,
        title: String,
        inserted: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelCheck {
    pub channel_id: String,
    pub title: String,
    pub inserted: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub total_new: usize,
    pub channels: Vec<ChannelCheck>,
}

/// Ties the resolver, the upload sources and the store together. Options are
/// passed per call; the tracker itself holds no settings.
pub struct Tracker<C> {
    store: ChannelStore,
    client: C,
}

impl<C: HttpClient> Tracker<C> {
    pub fn new(store: ChannelStore, client: C) -> Self {
        Self { store, client }
    }

    pub fn store(&self) -> &ChannelStore {
        &self.store
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn resolve(&self, input: &str, options: &FetchOptions) -> Option<ChannelId> {
        ChannelResolver::new(&self.client, options.api_key.as_deref(), options.timeout)
            .resolve(input)
    }

    /// Resolves `input`, records the channel and pulls its first batch of
    /// uploads. A channel that is already tracked is left untouched and no
    /// upstream lookups are made for it.
    pub async fn add_channel(&self, input: &str, options: &FetchOptions) -> Result<AddOutcome> {
        let Some(channel_id) = self.resolve(input, options) else {
            info!(input, "could not resolve channel");
            return Ok(AddOutcome::Unresolved);
        };

        if self.store.get_channel(channel_id.as_str()).await?.is_some() {
            info!(channel = %channel_id, "channel already tracked");
            return Ok(AddOutcome::AlreadyTracked { channel_id });
        }

        let title = uploads::channel_title(&self.client, options, &channel_id);
        let found = uploads::list_uploads(&self.client, options, &channel_id);
        let Some(inserted) = self
            .store
            .insert_channel_with_uploads(&channel_id, &title, &found)
            .await?
        else {
            info!(channel = %channel_id, "channel already tracked");
            return Ok(AddOutcome::AlreadyTracked { channel_id });
        };
        info!(channel = %channel_id, inserted, "channel added");

        Ok(AddOutcome::Added {
            channel_id,
            title,
            inserted,
        })
    }

    /// Walks every tracked channel in turn. Upstream failures only mean zero
    /// uploads for that channel; store failures abort the pass.
    pub async fn check_updates(&self, options: &FetchOptions) -> Result<CheckReport> {
        let mut report = CheckReport::default();
        for channel in self.store.list_channels().await? {
            let Some(channel_id) = ChannelId::parse(&channel.channel_id) else {
                warn!(channel = %channel.channel_id, "skipping stored channel with malformed id");
                continue;
            };
            let found = uploads::list_uploads(&self.client, options, &channel_id);
            let inserted = self.store.insert_videos(channel_id.as_str(), &found).await?;
            self.store.mark_channel_checked(channel_id.as_str()).await?;
            info!(channel = %channel_id, fetched = found.len(), inserted, "checked channel");

            report.total_new += inserted;
            report.channels.push(ChannelCheck {
                channel_id: channel.channel_id,
                title: channel.title,
                inserted,
            });
        }
        Ok(report)
    }
}
