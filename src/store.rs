//! SQLite persistence for tracked channels and their uploads.
//!
//! The structs here mirror the rows and are what the CLI prints (or
//! serializes with `--json`).

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use libsql::{Builder, Connection, Row, params};
use serde::{Deserialize, Serialize};

use crate::channel_id::ChannelId;
use crate::uploads::Upload;

/// Row in the `channels` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub channel_id: String,
    #[serde(default)]
    pub title: String,
    pub url: String,
    pub added_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<String>,
}

/// Channel row plus the number of videos still waiting to be seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSummary {
    #[serde(flatten)]
    pub channel: ChannelRecord,
    pub unseen_count: i64,
}

/// Video row joined with its owning channel's display title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedVideo {
    pub video_id: String,
    pub channel_id: String,
    pub channel_title: String,
    pub title: String,
    pub published_at: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub url: String,
    pub seen: bool,
}

pub fn utc_now_iso() -> String {
    Utc::now().to_rfc3339()
}

async fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        "#,
    )
    .await?;
    Ok(())
}

// No foreign key between the tables: the store removes a channel's videos
// itself before dropping the channel row.
async fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS channels (
            channel_id TEXT PRIMARY KEY,
            title TEXT DEFAULT '',
            url TEXT,
            added_at TEXT NOT NULL,
            last_checked TEXT
        );

        CREATE TABLE IF NOT EXISTS videos (
            video_id TEXT PRIMARY KEY,
            channel_id TEXT NOT NULL,
            title TEXT DEFAULT '',
            published_at TEXT DEFAULT '',
            description TEXT DEFAULT '',
            url TEXT,
            added_at TEXT NOT NULL,
            seen INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_videos_channel ON videos(channel_id);
        CREATE INDEX IF NOT EXISTS idx_videos_published ON videos(published_at);
        "#,
    )
    .await?;
    Ok(())
}

const INSERT_CHANNEL_SQL: &str = r#"
    INSERT INTO channels (channel_id, title, url, added_at, last_checked)
    VALUES (?1, ?2, ?3, ?4, NULL)
    ON CONFLICT(channel_id) DO NOTHING
"#;

const INSERT_VIDEO_SQL: &str = r#"
    INSERT INTO videos (
        video_id, channel_id, title, published_at,
        description, url, added_at, seen
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)
    ON CONFLICT(video_id) DO NOTHING
"#;

const MARK_CHECKED_SQL: &str = "UPDATE channels SET last_checked = ?1 WHERE channel_id = ?2";

/// Owns the single connection every tracker operation goes through. Each
/// mutation is committed before the method returns.
pub struct ChannelStore {
    conn: Connection,
}

impl ChannelStore {
    /// Opens (and if necessary creates) the DB and its tables.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {}", parent.display()))?;
        }

        let db = Builder::new_local(path)
            .build()
            .await
            .with_context(|| format!("opening tracker DB {}", path.display()))?;

        let conn = db.connect()?;
        configure_connection(&conn).await?;
        ensure_schema(&conn).await?;
        Ok(Self { conn })
    }

    /// Returns false, without touching the row, when the channel is already
    /// tracked.
    pub async fn insert_channel(&self, channel: &ChannelId, title: &str) -> Result<bool> {
        insert_channel_row(&self.conn, channel, title).await
    }

    /// Records a new channel together with its first batch of uploads and
    /// stamps it as checked, all in one transaction. Returns `None`, writing
    /// nothing, when the channel is already tracked. A failed write leaves no
    /// trace of the channel.
    pub async fn insert_channel_with_uploads(
        &self,
        channel: &ChannelId,
        title: &str,
        uploads: &[Upload],
    ) -> Result<Option<usize>> {
        let tx = self.conn.transaction().await?;
        match write_new_channel(&tx, channel, title, uploads).await {
            Ok(Some(inserted)) => {
                tx.commit().await?;
                Ok(Some(inserted))
            }
            Ok(None) => {
                tx.rollback().await?;
                Ok(None)
            }
            Err(err) => {
                tx.rollback().await.ok();
                Err(err)
            }
        }
    }

    /// Deletes the channel's videos, then the channel. Absent channels are a
    /// no-op.
    pub async fn remove_channel(&self, channel_id: &str) -> Result<()> {
        let tx = self.conn.transaction().await?;
        tx.execute("DELETE FROM videos WHERE channel_id = ?1", params![channel_id])
            .await?;
        tx.execute("DELETE FROM channels WHERE channel_id = ?1", params![channel_id])
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Most recently added first.
    pub async fn list_channels(&self) -> Result<Vec<ChannelRecord>> {
        let mut rows = self
            .conn
            .query(
                r#"
                SELECT channel_id, title, url, added_at, last_checked
                FROM channels
                ORDER BY added_at DESC, rowid DESC
                "#,
                params![],
            )
            .await?;
        let mut channels = Vec::new();
        while let Some(row) = rows.next().await? {
            channels.push(row_to_channel(&row)?);
        }
        Ok(channels)
    }

    pub async fn get_channel(&self, channel_id: &str) -> Result<Option<ChannelRecord>> {
        let mut rows = self
            .conn
            .query(
                r#"
                SELECT channel_id, title, url, added_at, last_checked
                FROM channels
                WHERE channel_id = ?1
                "#,
                params![channel_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_channel(&row)?)),
            None => Ok(None),
        }
    }

    /// Channels in `list_channels` order with their unseen counts.
    pub async fn channel_summaries(&self) -> Result<Vec<ChannelSummary>> {
        let mut rows = self
            .conn
            .query(
                r#"
                SELECT c.channel_id, c.title, c.url, c.added_at, c.last_checked,
                       (SELECT COUNT(*) FROM videos v
                        WHERE v.channel_id = c.channel_id AND v.seen = 0)
                FROM channels c
                ORDER BY c.added_at DESC, c.rowid DESC
                "#,
                params![],
            )
            .await?;
        let mut summaries = Vec::new();
        while let Some(row) = rows.next().await? {
            summaries.push(ChannelSummary {
                channel: row_to_channel(&row)?,
                unseen_count: row.get(5)?,
            });
        }
        Ok(summaries)
    }

    /// Inserts uploads whose IDs are new and returns how many were inserted.
    /// Known IDs are left exactly as they are.
    pub async fn insert_videos(&self, channel_id: &str, uploads: &[Upload]) -> Result<usize> {
        let tx = self.conn.transaction().await?;
        let inserted = insert_video_rows(&tx, channel_id, uploads).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn mark_channel_checked(&self, channel_id: &str) -> Result<()> {
        self.conn
            .execute(MARK_CHECKED_SQL, params![utc_now_iso(), channel_id])
            .await?;
        Ok(())
    }

    /// Unseen videos, newest publish time first.
    pub async fn unseen_videos(
        &self,
        channel_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<TrackedVideo>> {
        self.query_videos(true, channel_id, limit).await
    }

    /// All videos regardless of seen state, newest publish time first.
    pub async fn recent_videos(
        &self,
        channel_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<TrackedVideo>> {
        self.query_videos(false, channel_id, limit).await
    }

    /// Flips unseen videos to seen, for one channel or all of them. Returns the
    /// number of rows changed.
    pub async fn mark_videos_seen(&self, channel_id: Option<&str>) -> Result<u64> {
        let changed = match channel_id {
            Some(channel_id) => {
                self.conn
                    .execute(
                        "UPDATE videos SET seen = 1 WHERE channel_id = ?1 AND seen = 0",
                        params![channel_id],
                    )
                    .await?
            }
            None => {
                self.conn
                    .execute("UPDATE videos SET seen = 1 WHERE seen = 0", params![])
                    .await?
            }
        };
        Ok(changed)
    }

    async fn query_videos(
        &self,
        unseen_only: bool,
        channel_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<TrackedVideo>> {
        // ?1 is NULL when every channel is wanted
        let sql = format!(
            r#"
            SELECT v.video_id, v.channel_id,
                   COALESCE(NULLIF(c.title, ''), v.channel_id),
                   v.title, v.published_at, v.description, v.url, v.seen
            FROM videos v
            JOIN channels c ON v.channel_id = c.channel_id
            WHERE (?1 IS NULL OR v.channel_id = ?1){seen_filter}
            ORDER BY v.published_at DESC, v.rowid DESC
            LIMIT ?2
            "#,
            seen_filter = if unseen_only { " AND v.seen = 0" } else { "" },
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = self.conn.query(&sql, params![channel_id, limit]).await?;
        let mut videos = Vec::new();
        while let Some(row) = rows.next().await? {
            videos.push(row_to_video(&row)?);
        }
        Ok(videos)
    }
}

async fn insert_channel_row(conn: &Connection, channel: &ChannelId, title: &str) -> Result<bool> {
    let inserted = conn
        .execute(
            INSERT_CHANNEL_SQL,
            params![
                channel.as_str(),
                title,
                channel.browse_url(),
                utc_now_iso()
            ],
        )
        .await
        .with_context(|| format!("inserting channel {channel}"))?;
    Ok(inserted == 1)
}

async fn insert_video_rows(conn: &Connection, channel_id: &str, uploads: &[Upload]) -> Result<usize> {
    let added_at = utc_now_iso();
    let mut inserted = 0;
    for upload in uploads {
        let changed = conn
            .execute(
                INSERT_VIDEO_SQL,
                params![
                    upload.video_id.as_str(),
                    channel_id,
                    upload.title.as_str(),
                    upload.published_at.as_str(),
                    upload.description.as_str(),
                    upload.url.as_str(),
                    added_at.as_str(),
                ],
            )
            .await
            .with_context(|| format!("inserting video {}", upload.video_id))?;
        inserted += changed as usize;
    }
    Ok(inserted)
}

async fn write_new_channel(
    conn: &Connection,
    channel: &ChannelId,
    title: &str,
    uploads: &[Upload],
) -> Result<Option<usize>> {
    if !insert_channel_row(conn, channel, title).await? {
        return Ok(None);
    }
    let inserted = insert_video_rows(conn, channel.as_str(), uploads).await?;
    conn.execute(MARK_CHECKED_SQL, params![utc_now_iso(), channel.as_str()])
        .await?;
    Ok(Some(inserted))
}

fn row_to_channel(row: &Row) -> Result<ChannelRecord> {
    let channel_id: String = row.get(0)?;
    let url: Option<String> = row.get(2)?;
    Ok(ChannelRecord {
        title: row.get::<Option<String>>(1)?.unwrap_or_default(),
        url: url.unwrap_or_else(|| format!("{}{channel_id}", crate::channel_id::CHANNEL_URL_PREFIX)),
        added_at: row.get(3)?,
        last_checked: row.get(4)?,
        channel_id,
    })
}

/// Column order must match the SELECT in `query_videos`.
fn row_to_video(row: &Row) -> Result<TrackedVideo> {
    Ok(TrackedVideo {
        video_id: row.get(0)?,
        channel_id: row.get(1)?,
        channel_title: row.get(2)?,
        title: row.get::<Option<String>>(3)?.unwrap_or_default(),
        published_at: row.get::<Option<String>>(4)?.unwrap_or_default(),
        description: row.get::<Option<String>>(5)?.unwrap_or_default(),
        url: row.get::<Option<String>>(6)?.unwrap_or_default(),
        seen: row.get::<i64>(7).map(|value| value != 0)?,
    })
}
