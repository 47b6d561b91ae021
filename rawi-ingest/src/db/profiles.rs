//! Naming profile persistence
//!
//! The default flag is kept consistent here: persisting a profile with
//! is_default set clears the flag on every sibling owned by the same user.

use rawi_common::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::RecitationProfile;

use super::parse_uuid;

pub async fn insert_profile(pool: &SqlitePool, profile: &RecitationProfile) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO recitation_profiles (
            id, user_id, name, artist_name, artist_url,
            source_name, source_url, file_suffix, is_default
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(profile.id.to_string())
    .bind(profile.user_id.to_string())
    .bind(&profile.name)
    .bind(&profile.artist_name)
    .bind(&profile.artist_url)
    .bind(&profile.source_name)
    .bind(&profile.source_url)
    .bind(&profile.file_suffix)
    .bind(profile.is_default)
    .execute(pool)
    .await?;

    if profile.is_default {
        clear_other_defaults(pool, profile.user_id, profile.id).await?;
    }

    Ok(())
}

pub async fn update_profile(pool: &SqlitePool, profile: &RecitationProfile) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE recitation_profiles
        SET name = ?, artist_name = ?, artist_url = ?,
            source_name = ?, source_url = ?, file_suffix = ?, is_default = ?
        WHERE id = ?
        "#,
    )
    .bind(&profile.name)
    .bind(&profile.artist_name)
    .bind(&profile.artist_url)
    .bind(&profile.source_name)
    .bind(&profile.source_url)
    .bind(&profile.file_suffix)
    .bind(profile.is_default)
    .bind(profile.id.to_string())
    .execute(pool)
    .await?;

    if profile.is_default {
        clear_other_defaults(pool, profile.user_id, profile.id).await?;
    }

    Ok(())
}

/// Delete a profile the caller owns. Returns false (not an error) when
/// the profile is missing or owned by someone else.
pub async fn delete_profile(pool: &SqlitePool, id: Uuid, user_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM recitation_profiles WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_profile(pool: &SqlitePool, id: Uuid) -> Result<Option<RecitationProfile>> {
    let row = sqlx::query("SELECT * FROM recitation_profiles WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|row| profile_from_row(&row)).transpose()
}

/// The profile flagged default for this user, if any
pub async fn default_profile(
    pool: &SqlitePool,
    user_id: Uuid,
) -> Result<Option<RecitationProfile>> {
    let row = sqlx::query("SELECT * FROM recitation_profiles WHERE user_id = ? AND is_default = 1")
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|row| profile_from_row(&row)).transpose()
}

pub async fn list_profiles(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<RecitationProfile>> {
    let rows = sqlx::query("SELECT * FROM recitation_profiles WHERE user_id = ? ORDER BY name")
        .bind(user_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(profile_from_row).collect()
}

/// Whether the user already has another profile with this name
pub async fn name_in_use(
    pool: &SqlitePool,
    user_id: Uuid,
    name: &str,
    exclude: Option<Uuid>,
) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM recitation_profiles
        WHERE user_id = ? AND name = ? AND (? IS NULL OR id != ?)
        "#,
    )
    .bind(user_id.to_string())
    .bind(name)
    .bind(exclude.map(|id| id.to_string()))
    .bind(exclude.map(|id| id.to_string()))
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

async fn clear_other_defaults(pool: &SqlitePool, user_id: Uuid, keep: Uuid) -> Result<()> {
    sqlx::query(
        "UPDATE recitation_profiles SET is_default = 0 WHERE user_id = ? AND id != ?",
    )
    .bind(user_id.to_string())
    .bind(keep.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

fn profile_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<RecitationProfile> {
    Ok(RecitationProfile {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        user_id: parse_uuid(&row.get::<String, _>("user_id"))?,
        name: row.get("name"),
        artist_name: row.get("artist_name"),
        artist_url: row.get("artist_url"),
        source_name: row.get("source_name"),
        source_url: row.get("source_url"),
        file_suffix: row.get("file_suffix"),
        is_default: row.get("is_default"),
    })
}
