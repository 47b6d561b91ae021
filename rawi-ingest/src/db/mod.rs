//! Database access for rawi-ingest
//!
//! Single SQLite database holding sessions, files, profiles, recitations,
//! publish trackers, and the poem title mirror. Uniqueness of recitation
//! checksums and legacy GUIDs is enforced here so concurrent ingestion of
//! the same content cannot create duplicates.

pub mod poems;
pub mod profiles;
pub mod recitations;
pub mod sessions;
pub mod trackers;

use chrono::{DateTime, Utc};
use rawi_common::{Error, Result};
use sqlx::SqlitePool;
use std::path::Path;
use uuid::Uuid;

/// Initialize database connection pool, creating the file and schema
/// when missing
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS upload_sessions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            upload_started_at TEXT NOT NULL,
            upload_ended_at TEXT,
            process_status TEXT NOT NULL DEFAULT 'NOT_STARTED',
            process_progress INTEGER NOT NULL DEFAULT 0,
            process_started_at TEXT,
            process_ended_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS upload_session_files (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES upload_sessions(id),
            name TEXT NOT NULL,
            original_filename TEXT NOT NULL,
            content_type TEXT NOT NULL,
            byte_length INTEGER NOT NULL,
            temp_path TEXT,
            checksum TEXT,
            processed INTEGER NOT NULL DEFAULT 0,
            result_message TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recitation_profiles (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            artist_name TEXT NOT NULL,
            artist_url TEXT NOT NULL DEFAULT '',
            source_name TEXT NOT NULL DEFAULT '',
            source_url TEXT NOT NULL DEFAULT '',
            file_suffix TEXT NOT NULL,
            is_default INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recitations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            poem_id INTEGER NOT NULL,
            audio_order INTEGER NOT NULL,
            title TEXT NOT NULL,
            artist_name TEXT NOT NULL,
            artist_url TEXT NOT NULL DEFAULT '',
            source_name TEXT NOT NULL DEFAULT '',
            source_url TEXT NOT NULL DEFAULT '',
            legacy_guid TEXT NOT NULL,
            checksum TEXT NOT NULL,
            audio_size_bytes INTEGER NOT NULL,
            filename_stem TEXT NOT NULL,
            sound_files_folder TEXT NOT NULL,
            local_audio_path TEXT NOT NULL,
            local_manifest_path TEXT NOT NULL,
            review_status TEXT NOT NULL DEFAULT 'DRAFT',
            reviewed_at TEXT,
            reviewer_id TEXT,
            review_message TEXT,
            sync_status TEXT NOT NULL DEFAULT 'NEW_ITEM',
            uploaded_at TEXT NOT NULL,
            file_updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_recitations_checksum ON recitations(checksum)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_recitations_legacy_guid ON recitations(legacy_guid)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS publishing_trackers (
            id TEXT PRIMARY KEY,
            recitation_id INTEGER NOT NULL REFERENCES recitations(id),
            started_at TEXT NOT NULL,
            finished_at TEXT,
            manifest_copied INTEGER NOT NULL DEFAULT 0,
            audio_copied INTEGER NOT NULL DEFAULT 0,
            first_db_updated INTEGER NOT NULL DEFAULT 0,
            second_db_updated INTEGER NOT NULL DEFAULT 0,
            finished INTEGER NOT NULL DEFAULT 0,
            last_failure TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS poems (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized");

    Ok(())
}

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp in database: {}", e)))
}

pub(crate) fn parse_timestamp_opt(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_timestamp).transpose()
}
