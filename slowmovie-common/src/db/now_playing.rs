//! Observational now-playing record
//!
//! Single row, overwritten on every successful render. Written by the
//! scheduler, read by the management surface; the scheduler never reads
//! it back for its own decisions (side effect, not source of truth).

use crate::db::models::NowPlaying;
use crate::Result;
use sqlx::SqlitePool;

#[derive(Debug, Clone)]
pub struct NowPlayingTracker {
    pool: SqlitePool,
}

impl NowPlayingTracker {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Overwrite the singleton row with the title just rendered.
    pub async fn set(&self, title_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO now_playing (id, title_id, updated_at)
            VALUES (1, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(id) DO UPDATE SET
                title_id = excluded.title_id,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(title_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// The most recently rendered title, if anything has rendered yet.
    pub async fn get(&self) -> Result<Option<i64>> {
        let row = sqlx::query_as::<_, NowPlaying>(
            "SELECT title_id, updated_at FROM now_playing WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.title_id))
    }
}
