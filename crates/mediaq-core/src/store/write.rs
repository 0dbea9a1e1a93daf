//! Save the queue state.

use anyhow::Result;

use super::db::QueueDb;
use crate::queue::QueueState;

impl QueueDb {
    pub(crate) async fn set_layout_version(&self, version: u32) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO meta (key, value) VALUES ('layout_version', ?1)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(version.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Replaces the stored state with `state` in a single transaction.
    pub async fn save(&self, state: &QueueState) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for table in ["parts", "items", "variants", "recordings"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }

        for rec in state.recordings.values() {
            sqlx::query(
                r#"
                INSERT INTO recordings (id, title, first_seen, marked_deleted)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(rec.id)
            .bind(&rec.title)
            .bind(rec.first_seen)
            .bind(rec.marked_deleted as i64)
            .execute(&mut *tx)
            .await?;

            for (quality, variant) in &rec.variants {
                sqlx::query(
                    r#"
                    INSERT INTO variants (recording_id, quality, url, auto_enqueued, auto_downloaded)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                )
                .bind(rec.id)
                .bind(quality.as_str())
                .bind(&variant.url)
                .bind(variant.auto_enqueued as i64)
                .bind(variant.auto_downloaded as i64)
                .execute(&mut *tx)
                .await?;
            }
        }

        for item in &state.items {
            sqlx::query(
                r#"
                INSERT INTO items (
                    id, priority, recording_id, quality, total_bytes,
                    target_path, downloaded, downloaded_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(item.id)
            .bind(item.priority)
            .bind(item.recording_id)
            .bind(item.quality.as_str())
            .bind(item.total_bytes as i64)
            .bind(item.target.to_string_lossy().into_owned())
            .bind(item.downloaded as i64)
            .bind(item.downloaded_at)
            .execute(&mut *tx)
            .await?;

            for (idx, part) in item.parts.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO parts (item_id, idx, start_offset, length, loaded)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                )
                .bind(item.id)
                .bind(idx as i64)
                .bind(part.offset as i64)
                .bind(part.length as i64)
                .bind(part.loaded as i64)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
