//! Connection handling and schema.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Handle to the queue database, `~/.local/state/mediaq/queue.db` by default.
#[derive(Clone)]
pub struct QueueDb {
    pub(crate) pool: Pool<Sqlite>,
}

impl QueueDb {
    /// Open (or create) the default database and create the schema.
    pub async fn open_default() -> Result<Self> {
        let state_dir = crate::config::state_dir()?;
        Self::open_at(state_dir.join("queue.db")).await
    }

    /// Open (or create) the database at `path`, creating parent directories.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&uri)
            .await?;
        let db = QueueDb { pool };
        db.create_schema().await?;
        Ok(db)
    }

    async fn create_schema(&self) -> Result<()> {
        const TABLES: [&str; 5] = [
            r#"
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS recordings (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                first_seen INTEGER NOT NULL,
                marked_deleted INTEGER NOT NULL DEFAULT 0
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS variants (
                recording_id INTEGER NOT NULL,
                quality TEXT NOT NULL,
                url TEXT NOT NULL,
                auto_enqueued INTEGER NOT NULL DEFAULT 0,
                auto_downloaded INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (recording_id, quality)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY,
                priority INTEGER NOT NULL,
                recording_id INTEGER NOT NULL,
                quality TEXT NOT NULL,
                total_bytes INTEGER NOT NULL DEFAULT 0,
                target_path TEXT NOT NULL,
                downloaded INTEGER NOT NULL DEFAULT 0,
                downloaded_at INTEGER
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS parts (
                item_id INTEGER NOT NULL,
                idx INTEGER NOT NULL,
                start_offset INTEGER NOT NULL,
                length INTEGER NOT NULL,
                loaded INTEGER NOT NULL,
                PRIMARY KEY (item_id, idx)
            )
            "#,
        ];
        for sql in TABLES {
            sqlx::query(sql).execute(&self.pool).await?;
        }
        Ok(())
    }
}

/// Current time as Unix seconds.
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
/// Open an in-memory database for tests (no disk I/O).
pub(crate) async fn open_memory() -> Result<QueueDb> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let db = QueueDb { pool };
    db.create_schema().await?;
    Ok(db)
}
