//! Upload session and session file persistence

use chrono::{DateTime, Utc};
use rawi_common::paging::{PaginationMetadata, PagingParams};
use rawi_common::{Error, Result};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{ProcessStatus, SessionKind, UploadSession, UploadSessionFile};

use super::{parse_timestamp, parse_timestamp_opt, parse_uuid};

/// One row of the upload history listing
#[derive(Debug, Clone, Serialize)]
pub struct UploadHistoryItem {
    pub session_id: Uuid,
    pub file_name: String,
    pub processed: bool,
    pub result_message: String,
    pub upload_ended_at: Option<DateTime<Utc>>,
    pub process_progress: i64,
    pub process_started_at: Option<DateTime<Utc>>,
    pub process_ended_at: Option<DateTime<Utc>>,
}

pub async fn insert_session(pool: &SqlitePool, session: &UploadSession) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO upload_sessions (
            id, user_id, kind, upload_started_at, upload_ended_at,
            process_status, process_progress, process_started_at, process_ended_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(session.id.to_string())
    .bind(session.user_id.to_string())
    .bind(session.kind.as_str())
    .bind(session.upload_started_at.to_rfc3339())
    .bind(session.upload_ended_at.map(|dt| dt.to_rfc3339()))
    .bind(session.process_status.as_str())
    .bind(session.process_progress)
    .bind(session.process_started_at.map(|dt| dt.to_rfc3339()))
    .bind(session.process_ended_at.map(|dt| dt.to_rfc3339()))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_session(pool: &SqlitePool, id: Uuid) -> Result<Option<UploadSession>> {
    let row = sqlx::query("SELECT * FROM upload_sessions WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|row| session_from_row(&row)).transpose()
}

/// Stamp the upload end time once the client has sent every file
pub async fn finalize_session(
    pool: &SqlitePool,
    id: Uuid,
    ended_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE upload_sessions SET upload_ended_at = ? WHERE id = ?")
        .bind(ended_at.to_rfc3339())
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

/// Mark the background job as running
pub async fn mark_processing_started(pool: &SqlitePool, id: Uuid) -> Result<()> {
    sqlx::query(
        "UPDATE upload_sessions SET process_status = ?, process_started_at = ? WHERE id = ?",
    )
    .bind(ProcessStatus::Running.as_str())
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn update_progress(pool: &SqlitePool, id: Uuid, percent: i64) -> Result<()> {
    sqlx::query("UPDATE upload_sessions SET process_progress = ? WHERE id = ?")
        .bind(percent.clamp(0, 100))
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

/// Mark the background job finished with full progress
pub async fn mark_processing_finished(pool: &SqlitePool, id: Uuid) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE upload_sessions
        SET process_status = ?, process_progress = 100, process_ended_at = ?
        WHERE id = ?
        "#,
    )
    .bind(ProcessStatus::Finished.as_str())
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn insert_file(pool: &SqlitePool, file: &UploadSessionFile) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO upload_session_files (
            id, session_id, name, original_filename, content_type,
            byte_length, temp_path, checksum, processed, result_message
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(file.id.to_string())
    .bind(file.session_id.to_string())
    .bind(&file.name)
    .bind(&file.original_filename)
    .bind(&file.content_type)
    .bind(file.byte_length)
    .bind(&file.temp_path)
    .bind(&file.checksum)
    .bind(file.processed)
    .bind(&file.result_message)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn session_files(pool: &SqlitePool, session_id: Uuid) -> Result<Vec<UploadSessionFile>> {
    let rows = sqlx::query("SELECT * FROM upload_session_files WHERE session_id = ? ORDER BY rowid")
        .bind(session_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(file_from_row).collect()
}

pub async fn set_file_checksum(pool: &SqlitePool, file_id: Uuid, checksum: &str) -> Result<()> {
    sqlx::query("UPDATE upload_session_files SET checksum = ? WHERE id = ?")
        .bind(checksum)
        .bind(file_id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

/// Record the per-file outcome placement decided on
pub async fn record_file_outcome(
    pool: &SqlitePool,
    file_id: Uuid,
    processed: bool,
    message: &str,
) -> Result<()> {
    sqlx::query("UPDATE upload_session_files SET processed = ?, result_message = ? WHERE id = ?")
        .bind(processed)
        .bind(message)
        .bind(file_id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

/// Paginated upload history, newest sessions first. `user_id = None`
/// lists every user's uploads.
pub async fn list_history(
    pool: &SqlitePool,
    user_id: Option<Uuid>,
    paging: &PagingParams,
) -> Result<(PaginationMetadata, Vec<UploadHistoryItem>)> {
    let user_filter = user_id.map(|u| u.to_string());

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM upload_session_files f
        JOIN upload_sessions s ON s.id = f.session_id
        WHERE ? IS NULL OR s.user_id = ?
        "#,
    )
    .bind(&user_filter)
    .bind(&user_filter)
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query(
        r#"
        SELECT f.original_filename, f.processed, f.result_message,
               s.id AS session_id, s.upload_ended_at, s.process_progress,
               s.process_started_at, s.process_ended_at
        FROM upload_session_files f
        JOIN upload_sessions s ON s.id = f.session_id
        WHERE ? IS NULL OR s.user_id = ?
        ORDER BY s.upload_ended_at DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(&user_filter)
    .bind(&user_filter)
    .bind(paging.limit())
    .bind(paging.offset())
    .fetch_all(pool)
    .await?;

    let items = rows
        .iter()
        .map(|row| {
            Ok(UploadHistoryItem {
                session_id: parse_uuid(&row.get::<String, _>("session_id"))?,
                file_name: row.get("original_filename"),
                processed: row.get("processed"),
                result_message: row.get("result_message"),
                upload_ended_at: parse_timestamp_opt(row.get("upload_ended_at"))?,
                process_progress: row.get("process_progress"),
                process_started_at: parse_timestamp_opt(row.get("process_started_at"))?,
                process_ended_at: parse_timestamp_opt(row.get("process_ended_at"))?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((paging.meta(total), items))
}

fn session_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<UploadSession> {
    let kind: String = row.get("kind");
    let status: String = row.get("process_status");

    Ok(UploadSession {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        user_id: parse_uuid(&row.get::<String, _>("user_id"))?,
        kind: SessionKind::parse(&kind)
            .ok_or_else(|| Error::Internal(format!("Unknown session kind: {}", kind)))?,
        upload_started_at: parse_timestamp(&row.get::<String, _>("upload_started_at"))?,
        upload_ended_at: parse_timestamp_opt(row.get("upload_ended_at"))?,
        process_status: ProcessStatus::parse(&status)
            .ok_or_else(|| Error::Internal(format!("Unknown process status: {}", status)))?,
        process_progress: row.get("process_progress"),
        process_started_at: parse_timestamp_opt(row.get("process_started_at"))?,
        process_ended_at: parse_timestamp_opt(row.get("process_ended_at"))?,
    })
}

fn file_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<UploadSessionFile> {
    Ok(UploadSessionFile {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        session_id: parse_uuid(&row.get::<String, _>("session_id"))?,
        name: row.get("name"),
        original_filename: row.get("original_filename"),
        content_type: row.get("content_type"),
        byte_length: row.get("byte_length"),
        temp_path: row.get("temp_path"),
        checksum: row.get("checksum"),
        processed: row.get("processed"),
        result_message: row.get("result_message"),
    })
}
