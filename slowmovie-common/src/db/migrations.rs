//! Database schema migrations
//!
//! Versioned schema migrations so existing databases upgrade in place
//! without manual deletion or data loss.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - They must remain stable for users upgrading from older versions
//! 2. **Always add new migrations** - Create a new migration function for each schema change
//! 3. **Stay additive** - ADD COLUMN with defaults, CREATE INDEX; never drop data
//! 4. **One transaction per step** - The step and its version bump commit
//!    together, so a failure mid-step leaves the stored version unchanged
//!    and a retry is safe

use crate::Result;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
const CURRENT_SCHEMA_VERSION: i32 = 3;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

/// Record a schema version inside the migration's own transaction
async fn set_schema_version(tx: &mut Transaction<'_, Sqlite>, version: i32) -> Result<()> {
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let mut current_version = get_schema_version(pool).await?;

    // A store that predates version tracking (titles table present but no
    // version row) is treated as version 1 and backfilled, not an error.
    if current_version == 0 {
        let titles_exist: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM sqlite_master
                WHERE type='table' AND name='titles'
            )
            "#,
        )
        .fetch_one(pool)
        .await?;

        if titles_exist {
            let mut tx = pool.begin().await?;
            set_schema_version(&mut tx, 1).await?;
            tx.commit().await?;
            current_version = 1;
            info!("Backfilled schema version v1 for store without version row");
        }
    }

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        warn!("This may indicate a downgrade. Proceeding with caution.");
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    // Run migrations sequentially, each step atomic with its version bump
    if current_version < 2 {
        let mut tx = pool.begin().await?;
        migrate_v2(&mut tx).await?;
        set_schema_version(&mut tx, 2).await?;
        tx.commit().await?;
        info!("✓ Migration v2 completed");
    }

    if current_version < 3 {
        let mut tx = pool.begin().await?;
        migrate_v3(&mut tx).await?;
        set_schema_version(&mut tx, 3).await?;
        tx.commit().await?;
        info!("✓ Migration v3 completed");
    }

    info!("All migrations completed successfully");
    Ok(())
}

/// Migration v2: Add quiet-hours columns to titles table
///
/// **Background:** Quiet hours (suppressing renders during a nightly
/// wall-clock window) arrived after the first release. Databases created
/// before then lack the three columns.
async fn migrate_v2(tx: &mut Transaction<'_, Sqlite>) -> Result<()> {
    info!("Running migration v2: Add quiet-hours columns to titles");

    let columns_to_add = [
        ("use_quiet_hours", "INTEGER NOT NULL DEFAULT 0"),
        ("quiet_start_hour", "INTEGER NOT NULL DEFAULT 22"),
        ("quiet_end_hour", "INTEGER NOT NULL DEFAULT 7"),
    ];

    for (column_name, column_def) in columns_to_add {
        // Check if column already exists (idempotency)
        let has_column: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM pragma_table_info('titles') WHERE name = '{}'",
            column_name
        ))
        .fetch_one(&mut **tx)
        .await?;

        if has_column > 0 {
            info!("  {} column already exists - skipping", column_name);
            continue;
        }

        sqlx::query(&format!(
            "ALTER TABLE titles ADD COLUMN {} {}",
            column_name, column_def
        ))
        .execute(&mut **tx)
        .await?;

        info!("  ✓ Added {} column to titles table", column_name);
    }

    Ok(())
}

/// Migration v3: Enforce the single-active-title invariant in the store
///
/// **Background:** "At most one active title" was originally application
/// code only, which cannot hold when the scheduler and the management
/// surface race. A partial unique index makes the store reject a second
/// active row. Existing duplicates are resolved in favor of the most
/// recently updated title before the index is created.
async fn migrate_v3(tx: &mut Transaction<'_, Sqlite>) -> Result<()> {
    info!("Running migration v3: Enforce single active title");

    let active_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM titles WHERE is_active = 1")
            .fetch_one(&mut **tx)
            .await?;

    if active_count > 1 {
        sqlx::query(
            r#"
            UPDATE titles SET is_active = 0
            WHERE is_active = 1
              AND id NOT IN (
                SELECT id FROM titles
                WHERE is_active = 1
                ORDER BY updated_at DESC, id DESC
                LIMIT 1
              )
            "#,
        )
        .execute(&mut **tx)
        .await?;

        warn!(
            "  Found {} active titles, deactivated all but the most recent",
            active_count
        );
    }

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_titles_single_active
        ON titles (is_active) WHERE is_active = 1
        "#,
    )
    .execute(&mut **tx)
    .await?;

    info!("  ✓ Created single-active partial unique index");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    /// Titles table as it shipped before quiet hours existed
    async fn create_legacy_titles_table(pool: &SqlitePool) {
        sqlx::query(
            r#"
            CREATE TABLE titles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                relative_path TEXT NOT NULL UNIQUE,
                total_frames INTEGER NOT NULL DEFAULT 0,
                current_frame INTEGER NOT NULL DEFAULT 0,
                skip_frames INTEGER NOT NULL DEFAULT 1,
                time_per_frame INTEGER NOT NULL DEFAULT 60,
                is_active INTEGER NOT NULL DEFAULT 0,
                is_random INTEGER NOT NULL DEFAULT 0,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await
        .unwrap();
    }

    async fn create_version_table(pool: &SqlitePool) {
        sqlx::query(
            "CREATE TABLE schema_version (version INTEGER PRIMARY KEY, applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP)"
        )
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_get_schema_version_no_table() {
        let pool = setup_test_db().await;
        let version = get_schema_version(&pool).await.unwrap();
        assert_eq!(version, 0);
    }

    #[tokio::test]
    async fn test_get_schema_version_empty_table() {
        let pool = setup_test_db().await;
        create_version_table(&pool).await;

        let version = get_schema_version(&pool).await.unwrap();
        assert_eq!(version, 0);
    }

    #[tokio::test]
    async fn test_missing_version_row_backfilled_as_v1() {
        let pool = setup_test_db().await;
        create_version_table(&pool).await;
        create_legacy_titles_table(&pool).await;

        run_migrations(&pool).await.unwrap();

        // Backfilled v1, then migrated forward
        let versions: Vec<i32> =
            sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_migrate_v2_adds_columns() {
        let pool = setup_test_db().await;
        create_version_table(&pool).await;
        create_legacy_titles_table(&pool).await;

        run_migrations(&pool).await.unwrap();

        for column in ["use_quiet_hours", "quiet_start_hour", "quiet_end_hour"] {
            let has_column: i64 = sqlx::query_scalar(&format!(
                "SELECT COUNT(*) FROM pragma_table_info('titles') WHERE name = '{}'",
                column
            ))
            .fetch_one(&pool)
            .await
            .unwrap();
            assert_eq!(has_column, 1, "missing column {}", column);
        }
    }

    #[tokio::test]
    async fn test_run_migrations_idempotent() {
        let pool = setup_test_db().await;
        create_version_table(&pool).await;
        create_legacy_titles_table(&pool).await;

        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let version = get_schema_version(&pool).await.unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION);

        // No duplicate columns after the second run
        let column_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('titles') WHERE name = 'use_quiet_hours'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(column_count, 1);
    }

    #[tokio::test]
    async fn test_migrate_v3_resolves_duplicate_actives() {
        let pool = setup_test_db().await;
        create_version_table(&pool).await;
        create_legacy_titles_table(&pool).await;

        sqlx::query(
            r#"
            INSERT INTO titles (relative_path, is_active, updated_at) VALUES
                ('a.mp4', 1, '2024-01-01 00:00:00'),
                ('b.mp4', 1, '2024-06-01 00:00:00')
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        run_migrations(&pool).await.unwrap();

        let active: Vec<String> =
            sqlx::query_scalar("SELECT relative_path FROM titles WHERE is_active = 1")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(active, vec!["b.mp4".to_string()]);

        // The index now rejects a second active row outright
        let result = sqlx::query("UPDATE titles SET is_active = 1 WHERE relative_path = 'a.mp4'")
            .execute(&pool)
            .await;
        assert!(result.is_err());
    }
}
