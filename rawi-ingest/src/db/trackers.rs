//! Publish tracker persistence

use chrono::Utc;
use rawi_common::paging::{PaginationMetadata, PagingParams};
use rawi_common::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::PublishingTracker;

use super::{parse_timestamp, parse_timestamp_opt, parse_uuid};

/// One of the four independently-recorded publish steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerStep {
    ManifestCopied,
    AudioCopied,
    FirstDbUpdated,
    SecondDbUpdated,
}

impl TrackerStep {
    fn column(&self) -> &'static str {
        match self {
            TrackerStep::ManifestCopied => "manifest_copied",
            TrackerStep::AudioCopied => "audio_copied",
            TrackerStep::FirstDbUpdated => "first_db_updated",
            TrackerStep::SecondDbUpdated => "second_db_updated",
        }
    }
}

pub async fn insert_tracker(pool: &SqlitePool, tracker: &PublishingTracker) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO publishing_trackers (
            id, recitation_id, started_at, finished_at,
            manifest_copied, audio_copied, first_db_updated, second_db_updated,
            finished, last_failure
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(tracker.id.to_string())
    .bind(tracker.recitation_id)
    .bind(tracker.started_at.to_rfc3339())
    .bind(tracker.finished_at.map(|dt| dt.to_rfc3339()))
    .bind(tracker.manifest_copied)
    .bind(tracker.audio_copied)
    .bind(tracker.first_db_updated)
    .bind(tracker.second_db_updated)
    .bind(tracker.finished)
    .bind(&tracker.last_failure)
    .execute(pool)
    .await?;

    Ok(())
}

/// Persist one completed step flag
pub async fn mark_step(pool: &SqlitePool, tracker_id: Uuid, step: TrackerStep) -> Result<()> {
    let sql = format!(
        "UPDATE publishing_trackers SET {} = 1 WHERE id = ?",
        step.column()
    );
    sqlx::query(&sql)
        .bind(tracker_id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

/// Record the failure text of an aborted attempt
pub async fn record_failure(pool: &SqlitePool, tracker_id: Uuid, message: &str) -> Result<()> {
    sqlx::query("UPDATE publishing_trackers SET last_failure = ? WHERE id = ?")
        .bind(message)
        .bind(tracker_id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn mark_finished(pool: &SqlitePool, tracker_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE publishing_trackers SET finished = 1, finished_at = ? WHERE id = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(tracker_id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn get_tracker(pool: &SqlitePool, id: Uuid) -> Result<Option<PublishingTracker>> {
    let row = sqlx::query("SELECT * FROM publishing_trackers WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|row| tracker_from_row(&row)).transpose()
}

/// Latest-first trackers of one recitation (attempt history)
pub async fn trackers_for_recitation(
    pool: &SqlitePool,
    recitation_id: i64,
) -> Result<Vec<PublishingTracker>> {
    let rows = sqlx::query(
        "SELECT * FROM publishing_trackers WHERE recitation_id = ? ORDER BY started_at DESC",
    )
    .bind(recitation_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(tracker_from_row).collect()
}

/// Which catalog-insert steps any prior attempt already completed.
/// Returns (first_db_updated, second_db_updated).
pub async fn completed_db_steps(pool: &SqlitePool, recitation_id: i64) -> Result<(bool, bool)> {
    let row = sqlx::query(
        r#"
        SELECT
            MAX(first_db_updated) AS first_done,
            MAX(second_db_updated) AS second_done
        FROM publishing_trackers
        WHERE recitation_id = ?
        "#,
    )
    .bind(recitation_id)
    .fetch_one(pool)
    .await?;

    let first: Option<bool> = row.get("first_done");
    let second: Option<bool> = row.get("second_done");
    Ok((first.unwrap_or(false), second.unwrap_or(false)))
}

/// Paginated tracker listing filtered by completion state, newest first
pub async fn list_trackers(
    pool: &SqlitePool,
    in_progress: bool,
    finished: bool,
    paging: &PagingParams,
) -> Result<(PaginationMetadata, Vec<PublishingTracker>)> {
    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM publishing_trackers
        WHERE (? AND finished = 0) OR (? AND finished = 1)
        "#,
    )
    .bind(in_progress)
    .bind(finished)
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query(
        r#"
        SELECT * FROM publishing_trackers
        WHERE (? AND finished = 0) OR (? AND finished = 1)
        ORDER BY started_at DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(in_progress)
    .bind(finished)
    .bind(paging.limit())
    .bind(paging.offset())
    .fetch_all(pool)
    .await?;

    let items = rows
        .iter()
        .map(tracker_from_row)
        .collect::<Result<Vec<_>>>()?;

    Ok((paging.meta(total), items))
}

fn tracker_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<PublishingTracker> {
    Ok(PublishingTracker {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        recitation_id: row.get("recitation_id"),
        started_at: parse_timestamp(&row.get::<String, _>("started_at"))?,
        finished_at: parse_timestamp_opt(row.get("finished_at"))?,
        manifest_copied: row.get("manifest_copied"),
        audio_copied: row.get("audio_copied"),
        first_db_updated: row.get("first_db_updated"),
        second_db_updated: row.get("second_db_updated"),
        finished: row.get("finished"),
        last_failure: row.get("last_failure"),
    })
}
