//! Poem title mirror
//!
//! A minimal read-only view of the poem catalog, used to default a
//! recitation's title to the poem's own title when the uploaded
//! description is an unhelpful placeholder.

use rawi_common::Result;
use sqlx::SqlitePool;

pub async fn poem_title(pool: &SqlitePool, poem_id: i64) -> Result<Option<String>> {
    let title: Option<String> = sqlx::query_scalar("SELECT title FROM poems WHERE id = ?")
        .bind(poem_id)
        .fetch_optional(pool)
        .await?;

    Ok(title)
}

pub async fn upsert_poem(pool: &SqlitePool, poem_id: i64, title: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO poems (id, title) VALUES (?, ?)
        ON CONFLICT(id) DO UPDATE SET title = excluded.title
        "#,
    )
    .bind(poem_id)
    .bind(title)
    .execute(pool)
    .await?;

    Ok(())
}
