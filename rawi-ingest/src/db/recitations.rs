//! Recitation catalog persistence

use chrono::{DateTime, Utc};
use rawi_common::paging::{PaginationMetadata, PagingParams};
use rawi_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{Recitation, ReviewStatus, SyncStatus};

use super::{parse_timestamp, parse_timestamp_opt, parse_uuid};

/// Insert a new recitation; returns the assigned row id
pub async fn insert_recitation(pool: &SqlitePool, recitation: &Recitation) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO recitations (
            user_id, poem_id, audio_order, title,
            artist_name, artist_url, source_name, source_url,
            legacy_guid, checksum, audio_size_bytes,
            filename_stem, sound_files_folder,
            local_audio_path, local_manifest_path,
            review_status, sync_status, uploaded_at, file_updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(recitation.user_id.to_string())
    .bind(recitation.poem_id)
    .bind(recitation.audio_order)
    .bind(&recitation.title)
    .bind(&recitation.artist_name)
    .bind(&recitation.artist_url)
    .bind(&recitation.source_name)
    .bind(&recitation.source_url)
    .bind(recitation.legacy_guid.to_string())
    .bind(&recitation.checksum)
    .bind(recitation.audio_size_bytes)
    .bind(&recitation.filename_stem)
    .bind(&recitation.sound_files_folder)
    .bind(&recitation.local_audio_path)
    .bind(&recitation.local_manifest_path)
    .bind(recitation.review_status.as_str())
    .bind(recitation.sync_status.as_str())
    .bind(recitation.uploaded_at.to_rfc3339())
    .bind(recitation.file_updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn get_recitation(pool: &SqlitePool, id: i64) -> Result<Option<Recitation>> {
    let row = sqlx::query("SELECT * FROM recitations WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(|row| recitation_from_row(&row)).transpose()
}

/// Whether any recitation already carries this audio checksum
pub async fn checksum_exists(pool: &SqlitePool, checksum: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recitations WHERE checksum = ?")
        .bind(checksum)
        .fetch_one(pool)
        .await?;

    Ok(count > 0)
}

pub async fn legacy_guid_exists(pool: &SqlitePool, guid: Uuid) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recitations WHERE legacy_guid = ?")
        .bind(guid.to_string())
        .fetch_one(pool)
        .await?;

    Ok(count > 0)
}

/// Next display order among recitations of the same poem
pub async fn next_audio_order(pool: &SqlitePool, poem_id: i64) -> Result<i64> {
    let max: Option<i64> =
        sqlx::query_scalar("SELECT MAX(audio_order) FROM recitations WHERE poem_id = ?")
            .bind(poem_id)
            .fetch_one(pool)
            .await?;

    Ok(max.unwrap_or(0) + 1)
}

/// The prior recitation a replace-mode upload overwrites: same owner,
/// same poem, same artist attribution
pub async fn replacement_target(
    pool: &SqlitePool,
    user_id: Uuid,
    poem_id: i64,
    artist_name: &str,
) -> Result<Option<Recitation>> {
    let row = sqlx::query(
        "SELECT * FROM recitations WHERE user_id = ? AND poem_id = ? AND artist_name = ? LIMIT 1",
    )
    .bind(user_id.to_string())
    .bind(poem_id)
    .bind(artist_name)
    .fetch_optional(pool)
    .await?;

    row.map(|row| recitation_from_row(&row)).transpose()
}

/// Record replacement audio: new checksum/size, files-changed sync state
pub async fn apply_replacement(
    pool: &SqlitePool,
    id: i64,
    checksum: &str,
    audio_size_bytes: i64,
    file_updated_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE recitations
        SET checksum = ?, audio_size_bytes = ?, file_updated_at = ?, sync_status = ?
        WHERE id = ?
        "#,
    )
    .bind(checksum)
    .bind(audio_size_bytes)
    .bind(file_updated_at.to_rfc3339())
    .bind(SyncStatus::FilesChanged.as_str())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn set_sync_status(pool: &SqlitePool, id: i64, status: SyncStatus) -> Result<()> {
    sqlx::query("UPDATE recitations SET sync_status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Store a moderation verdict. `new_status = None` leaves the review
/// status untouched (fix-requested), recording only date/reviewer/message.
pub async fn record_moderation(
    pool: &SqlitePool,
    id: i64,
    new_status: Option<ReviewStatus>,
    reviewer_id: Uuid,
    message: Option<&str>,
) -> Result<()> {
    match new_status {
        Some(status) => {
            sqlx::query(
                r#"
                UPDATE recitations
                SET review_status = ?, reviewed_at = ?, reviewer_id = ?, review_message = ?
                WHERE id = ?
                "#,
            )
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(reviewer_id.to_string())
            .bind(message)
            .bind(id)
            .execute(pool)
            .await?;
        }
        None => {
            sqlx::query(
                r#"
                UPDATE recitations
                SET reviewed_at = ?, reviewer_id = ?, review_message = ?
                WHERE id = ?
                "#,
            )
            .bind(Utc::now().to_rfc3339())
            .bind(reviewer_id.to_string())
            .bind(message)
            .bind(id)
            .execute(pool)
            .await?;
        }
    }

    Ok(())
}

/// Edit the attribution fields a user may change after creation
pub async fn update_metadata(
    pool: &SqlitePool,
    id: i64,
    title: &str,
    artist_name: &str,
    artist_url: &str,
    source_name: &str,
    source_url: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE recitations
        SET title = ?, artist_name = ?, artist_url = ?, source_name = ?, source_url = ?
        WHERE id = ?
        "#,
    )
    .bind(title)
    .bind(artist_name)
    .bind(artist_url)
    .bind(source_name)
    .bind(source_url)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Everything approved whose remote state is stale: the retry scan set
pub async fn pending_publish(pool: &SqlitePool) -> Result<Vec<Recitation>> {
    let rows = sqlx::query(
        "SELECT * FROM recitations WHERE review_status = ? AND sync_status != ? ORDER BY id",
    )
    .bind(ReviewStatus::Approved.as_str())
    .bind(SyncStatus::Synchronized.as_str())
    .fetch_all(pool)
    .await?;

    rows.iter().map(recitation_from_row).collect()
}

/// Paginated catalog listing, newest uploads first, optionally filtered
/// by owner and review status
pub async fn list_recitations(
    pool: &SqlitePool,
    user_id: Option<Uuid>,
    status: Option<ReviewStatus>,
    paging: &PagingParams,
) -> Result<(PaginationMetadata, Vec<Recitation>)> {
    let user_filter = user_id.map(|u| u.to_string());
    let status_filter = status.map(|s| s.as_str());

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM recitations
        WHERE (? IS NULL OR user_id = ?) AND (? IS NULL OR review_status = ?)
        "#,
    )
    .bind(&user_filter)
    .bind(&user_filter)
    .bind(status_filter)
    .bind(status_filter)
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query(
        r#"
        SELECT * FROM recitations
        WHERE (? IS NULL OR user_id = ?) AND (? IS NULL OR review_status = ?)
        ORDER BY uploaded_at DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(&user_filter)
    .bind(&user_filter)
    .bind(status_filter)
    .bind(status_filter)
    .bind(paging.limit())
    .bind(paging.offset())
    .fetch_all(pool)
    .await?;

    let items = rows
        .iter()
        .map(recitation_from_row)
        .collect::<Result<Vec<_>>>()?;

    Ok((paging.meta(total), items))
}

fn recitation_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Recitation> {
    let review_status: String = row.get("review_status");
    let sync_status: String = row.get("sync_status");
    let reviewer_id: Option<String> = row.get("reviewer_id");

    Ok(Recitation {
        id: row.get("id"),
        user_id: parse_uuid(&row.get::<String, _>("user_id"))?,
        poem_id: row.get("poem_id"),
        audio_order: row.get("audio_order"),
        title: row.get("title"),
        artist_name: row.get("artist_name"),
        artist_url: row.get("artist_url"),
        source_name: row.get("source_name"),
        source_url: row.get("source_url"),
        legacy_guid: parse_uuid(&row.get::<String, _>("legacy_guid"))?,
        checksum: row.get("checksum"),
        audio_size_bytes: row.get("audio_size_bytes"),
        filename_stem: row.get("filename_stem"),
        sound_files_folder: row.get("sound_files_folder"),
        local_audio_path: row.get("local_audio_path"),
        local_manifest_path: row.get("local_manifest_path"),
        review_status: ReviewStatus::parse(&review_status)
            .ok_or_else(|| Error::Internal(format!("Unknown review status: {}", review_status)))?,
        reviewed_at: parse_timestamp_opt(row.get("reviewed_at"))?,
        reviewer_id: reviewer_id.as_deref().map(parse_uuid).transpose()?,
        review_message: row.get("review_message"),
        sync_status: SyncStatus::parse(&sync_status)
            .ok_or_else(|| Error::Internal(format!("Unknown sync status: {}", sync_status)))?,
        uploaded_at: parse_timestamp(&row.get::<String, _>("uploaded_at"))?,
        file_updated_at: parse_timestamp(&row.get::<String, _>("file_updated_at"))?,
    })
}

#[cfg(test)]
pub(crate) fn sample_recitation(user_id: Uuid, poem_id: i64, checksum: &str) -> Recitation {
    let now = Utc::now();
    Recitation {
        id: 0,
        user_id,
        poem_id,
        audio_order: 1,
        title: "سیمرغ".into(),
        artist_name: "حمیدرضا محمدی".into(),
        artist_url: String::new(),
        source_name: String::new(),
        source_url: String::new(),
        legacy_guid: Uuid::new_v4(),
        checksum: checksum.to_string(),
        audio_size_bytes: 1024,
        filename_stem: format!("{}-hrm", poem_id),
        sound_files_folder: "a".into(),
        local_audio_path: format!("/data/a/{}-hrm.mp3", poem_id),
        local_manifest_path: format!("/data/a/x/{}-hrm.xml", poem_id),
        review_status: ReviewStatus::Draft,
        reviewed_at: None,
        reviewer_id: None,
        review_message: None,
        sync_status: SyncStatus::NewItem,
        uploaded_at: now,
        file_updated_at: now,
    }
}
