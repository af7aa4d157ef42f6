//! Review persistence
//!
//! A user reviews a title at most once; the second attempt is rejected as a
//! non-field validation error.

use sqlx::SqlitePool;
use yamdb_common::db::Review;
use yamdb_common::time::now;
use yamdb_common::{Error, FieldErrors, Result};

const REVIEW_SELECT: &str = r#"
    SELECT r.id, r.title_id, r.text, r.author_id, u.username AS author_username,
           r.score, r.pub_date
    FROM reviews r
    JOIN users u ON u.id = r.author_id
"#;

const DUPLICATE_REVIEW: &str = "You have already reviewed this title.";

/// Reviews of a title, oldest first
pub async fn list_reviews(
    pool: &SqlitePool,
    title_id: i64,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Review>, i64)> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE title_id = ?")
        .bind(title_id)
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query(&format!(
        "{} WHERE r.title_id = ? ORDER BY r.pub_date, r.id LIMIT ? OFFSET ?",
        REVIEW_SELECT
    ))
    .bind(title_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let reviews = rows
        .iter()
        .map(Review::from_row)
        .collect::<sqlx::Result<Vec<_>>>()?;

    Ok((reviews, count))
}

/// Review `id`, only if it belongs to `title_id`
pub async fn find_review(pool: &SqlitePool, title_id: i64, id: i64) -> Result<Option<Review>> {
    let row = sqlx::query(&format!(
        "{} WHERE r.id = ? AND r.title_id = ?",
        REVIEW_SELECT
    ))
    .bind(id)
    .bind(title_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(Review::from_row).transpose()?)
}

pub async fn create_review(
    pool: &SqlitePool,
    title_id: i64,
    author_id: i64,
    text: &str,
    score: i64,
) -> Result<Review> {
    let already: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM reviews WHERE title_id = ? AND author_id = ?)",
    )
    .bind(title_id)
    .bind(author_id)
    .fetch_one(pool)
    .await?;
    if already {
        return Err(duplicate_review());
    }

    // The constraint still decides when two requests race past the check
    let result = sqlx::query(
        "INSERT INTO reviews (title_id, author_id, text, score, pub_date) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(title_id)
    .bind(author_id)
    .bind(text)
    .bind(score)
    .bind(now())
    .execute(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => duplicate_review(),
        other => Error::Database(other),
    })?;

    find_review(pool, title_id, result.last_insert_rowid())
        .await?
        .ok_or_else(|| Error::Internal("inserted review vanished".to_string()))
}

/// Write back text and score
pub async fn update_review(pool: &SqlitePool, review: &Review) -> Result<()> {
    sqlx::query("UPDATE reviews SET text = ?, score = ? WHERE id = ?")
        .bind(&review.text)
        .bind(review.score)
        .bind(review.id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Delete a review and, through the foreign key, its comments
pub async fn delete_review(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM reviews WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

fn duplicate_review() -> Error {
    Error::Validation(FieldErrors::single("non_field_errors", DUPLICATE_REVIEW))
}
