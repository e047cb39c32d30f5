//! Typed read/write access to title and settings records
//!
//! The scheduler is one of two writers into these tables; the management
//! surface is the other and runs concurrently. Every operation here is
//! therefore independently atomic, and every read returns a fresh
//! immutable snapshot - callers must not carry rows across ticks.

use crate::config::{PlayerConfig, ReconcilePolicy};
use crate::db::models::{Settings, Title};
use crate::{Error, Result};
use sqlx::SqlitePool;
use tracing::{info, warn};

const TITLE_COLUMNS: &str = "id, relative_path, total_frames, current_frame, skip_frames, \
     time_per_frame, is_active, is_random, use_quiet_hours, quiet_start_hour, quiet_end_hour";

/// Store wrapper shared by the scheduler and startup code.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    pool: SqlitePool,
}

impl CatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch the singleton settings row.
    ///
    /// Absence is a fatal precondition for the scheduler: without a root
    /// path and resolution there is nothing to render onto.
    pub async fn get_settings(&self) -> Result<Settings> {
        let settings = sqlx::query_as::<_, Settings>(
            "SELECT video_root_path, resolution FROM settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        settings.ok_or_else(|| {
            Error::NotFound(
                "settings row missing - initialize it via the management interface".to_string(),
            )
        })
    }

    /// Overwrite the singleton settings row.
    pub async fn update_settings(&self, video_root_path: &str, resolution: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE settings
            SET video_root_path = ?, resolution = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = 1
            "#,
        )
        .bind(video_root_path)
        .bind(resolution)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound("settings row missing".to_string()));
        }
        Ok(())
    }

    pub async fn get_title(&self, id: i64) -> Result<Title> {
        let title = sqlx::query_as::<_, Title>(&format!(
            "SELECT {} FROM titles WHERE id = ?",
            TITLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        title.ok_or_else(|| Error::NotFound(format!("title {} not found", id)))
    }

    /// The single active title, if any. Read fresh on every tick.
    pub async fn get_active_title(&self) -> Result<Option<Title>> {
        let title = sqlx::query_as::<_, Title>(&format!(
            "SELECT {} FROM titles WHERE is_active = 1 LIMIT 1",
            TITLE_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await?;

        Ok(title)
    }

    pub async fn list_titles(&self) -> Result<Vec<Title>> {
        let titles = sqlx::query_as::<_, Title>(&format!(
            "SELECT {} FROM titles ORDER BY relative_path",
            TITLE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(titles)
    }

    /// Switch the active title: clear all, set one, in a single
    /// transaction. No observable window exists with zero or two actives.
    /// Fails with `NotFound` (after rollback) when `id` does not exist;
    /// never creates rows.
    pub async fn set_active(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE titles SET is_active = 0, updated_at = CURRENT_TIMESTAMP WHERE is_active = 1")
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            "UPDATE titles SET is_active = 1, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(Error::NotFound(format!("title {} not found", id)));
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn clear_active(&self) -> Result<()> {
        sqlx::query("UPDATE titles SET is_active = 0, updated_at = CURRENT_TIMESTAMP WHERE is_active = 1")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Persist the playback cursor. Single-statement atomic update; the
    /// scheduler re-reads the cursor next tick rather than trusting its
    /// in-memory value, so a failed write just retries the same frame.
    pub async fn advance_cursor(&self, id: i64, new_frame: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE titles SET current_frame = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(new_frame)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("title {} not found", id)));
        }
        Ok(())
    }

    /// Reconcile the config file against stored settings once at startup.
    ///
    /// Returns the settings snapshot the scheduler should start from.
    /// There is no interactive step: mismatch handling follows the
    /// configured [`ReconcilePolicy`].
    pub async fn reconcile_settings(&self, config: &PlayerConfig) -> Result<Settings> {
        let stored = self.get_settings().await?;

        let config_root = config.video_root_path.as_deref();
        let config_resolution = config.resolution.as_deref();

        let root_differs = config_root.is_some_and(|r| r != stored.video_root_path);
        let resolution_differs = config_resolution.is_some_and(|r| r != stored.resolution);

        if !root_differs && !resolution_differs {
            return Ok(stored);
        }

        match config.reconcile {
            ReconcilePolicy::PreferConfig => {
                let root = config_root.unwrap_or(&stored.video_root_path);
                let resolution = config_resolution.unwrap_or(&stored.resolution);
                self.update_settings(root, resolution).await?;
                info!(
                    "Reconciled settings from config file: root={}, resolution={}",
                    root, resolution
                );
                self.get_settings().await
            }
            ReconcilePolicy::PreferStored => Ok(stored),
            ReconcilePolicy::WarnOnly => {
                if root_differs {
                    warn!(
                        "Config video_root_path {:?} differs from stored {:?} (keeping stored)",
                        config_root, stored.video_root_path
                    );
                }
                if resolution_differs {
                    warn!(
                        "Config resolution {:?} differs from stored {:?} (keeping stored)",
                        config_resolution, stored.resolution
                    );
                }
                Ok(stored)
            }
        }
    }
}
