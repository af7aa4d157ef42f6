//! Comment persistence

use sqlx::SqlitePool;
use yamdb_common::db::Comment;
use yamdb_common::time::now;
use yamdb_common::{Error, Result};

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.review_id, c.text, c.author_id, u.username AS author_username, c.pub_date
    FROM comments c
    JOIN users u ON u.id = c.author_id
"#;

/// Comments on a review, oldest first
pub async fn list_comments(
    pool: &SqlitePool,
    review_id: i64,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Comment>, i64)> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE review_id = ?")
        .bind(review_id)
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query(&format!(
        "{} WHERE c.review_id = ? ORDER BY c.pub_date, c.id LIMIT ? OFFSET ?",
        COMMENT_SELECT
    ))
    .bind(review_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let comments = rows
        .iter()
        .map(Comment::from_row)
        .collect::<sqlx::Result<Vec<_>>>()?;

    Ok((comments, count))
}

/// Comment `id`, only if it belongs to `review_id`
pub async fn find_comment(pool: &SqlitePool, review_id: i64, id: i64) -> Result<Option<Comment>> {
    let row = sqlx::query(&format!(
        "{} WHERE c.id = ? AND c.review_id = ?",
        COMMENT_SELECT
    ))
    .bind(id)
    .bind(review_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(Comment::from_row).transpose()?)
}

pub async fn create_comment(
    pool: &SqlitePool,
    review_id: i64,
    author_id: i64,
    text: &str,
) -> Result<Comment> {
    let result = sqlx::query(
        "INSERT INTO comments (review_id, author_id, text, pub_date) VALUES (?, ?, ?, ?)",
    )
    .bind(review_id)
    .bind(author_id)
    .bind(text)
    .bind(now())
    .execute(pool)
    .await?;

    find_comment(pool, review_id, result.last_insert_rowid())
        .await?
        .ok_or_else(|| Error::Internal("inserted comment vanished".to_string()))
}

pub async fn update_comment(pool: &SqlitePool, comment: &Comment) -> Result<()> {
    sqlx::query("UPDATE comments SET text = ? WHERE id = ?")
        .bind(&comment.text)
        .bind(comment.id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn delete_comment(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
