//! Load the queue state.

use anyhow::Result;
use sqlx::Row;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::db::QueueDb;
use crate::parts::Part;
use crate::queue::migrate::{self, CURRENT_LAYOUT_VERSION};
use crate::queue::{Item, Quality, QueueState, Recording, Variant};

impl QueueDb {
    /// Stored layout version. A database with items but no version predates versioning (1).
    pub async fn layout_version(&self) -> Result<u32> {
        let row = sqlx::query("SELECT value FROM meta WHERE key = 'layout_version'")
            .fetch_optional(&self.pool)
            .await?;
        if let Some(row) = row {
            let v: String = row.get("value");
            return Ok(v.parse().unwrap_or(1));
        }
        let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM items")
            .fetch_one(&self.pool)
            .await?
            .get("n");
        Ok(if count > 0 { 1 } else { CURRENT_LAYOUT_VERSION })
    }

    /// Reads the full state and brings its on-disk layout up to date.
    pub async fn load(&self) -> Result<QueueState> {
        let state = self.read_state().await?;
        let version = self.layout_version().await?;
        if version < CURRENT_LAYOUT_VERSION {
            let moved = migrate::migrate(&state, version);
            tracing::info!(from = version, to = CURRENT_LAYOUT_VERSION, moved, "migrated queue layout");
        }
        self.set_layout_version(CURRENT_LAYOUT_VERSION).await?;
        Ok(state)
    }

    async fn read_state(&self) -> Result<QueueState> {
        let mut recordings: BTreeMap<i64, Recording> = BTreeMap::new();
        for row in sqlx::query("SELECT id, title, first_seen, marked_deleted FROM recordings")
            .fetch_all(&self.pool)
            .await?
        {
            let id: i64 = row.get("id");
            recordings.insert(
                id,
                Recording {
                    id,
                    title: row.get("title"),
                    first_seen: row.get("first_seen"),
                    marked_deleted: row.get::<i64, _>("marked_deleted") != 0,
                    variants: BTreeMap::new(),
                },
            );
        }

        for row in sqlx::query(
            "SELECT recording_id, quality, url, auto_enqueued, auto_downloaded FROM variants",
        )
        .fetch_all(&self.pool)
        .await?
        {
            let recording_id: i64 = row.get("recording_id");
            let quality: String = row.get("quality");
            if let Some(rec) = recordings.get_mut(&recording_id) {
                rec.variants.insert(
                    Quality::parse_lenient(&quality),
                    Variant {
                        url: row.get("url"),
                        auto_enqueued: row.get::<i64, _>("auto_enqueued") != 0,
                        auto_downloaded: row.get::<i64, _>("auto_downloaded") != 0,
                    },
                );
            }
        }

        let mut items = Vec::new();
        for row in sqlx::query(
            r#"
            SELECT id, priority, recording_id, quality, total_bytes, target_path,
                   downloaded, downloaded_at
            FROM items
            ORDER BY priority ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        {
            let quality: String = row.get("quality");
            let target: String = row.get("target_path");
            let mut item = Item::new(
                row.get("id"),
                row.get("priority"),
                row.get("recording_id"),
                Quality::parse_lenient(&quality),
                PathBuf::from(target),
            );
            item.total_bytes = row.get::<i64, _>("total_bytes").max(0) as u64;
            item.downloaded = row.get::<i64, _>("downloaded") != 0;
            item.downloaded_at = row.get("downloaded_at");
            items.push(item);
        }

        for row in sqlx::query(
            "SELECT item_id, start_offset, length, loaded FROM parts ORDER BY item_id, idx",
        )
        .fetch_all(&self.pool)
        .await?
        {
            let item_id: i64 = row.get("item_id");
            let length = row.get::<i64, _>("length").max(0) as u64;
            let part = Part {
                offset: row.get::<i64, _>("start_offset").max(0) as u64,
                length,
                loaded: (row.get::<i64, _>("loaded").max(0) as u64).min(length),
            };
            if let Some(item) = items.iter_mut().find(|i| i.id == item_id) {
                item.parts.push(part);
            }
        }

        Ok(QueueState { items, recordings })
    }
}
