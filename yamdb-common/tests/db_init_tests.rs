//! Tests for on-disk database initialization
//!
//! - Database file and parent directories are created on first run
//! - Reopening an existing database keeps its data
//! - Foreign key actions (CASCADE / SET NULL) are enforced

use yamdb_common::db::init::init_database;
use yamdb_common::db::migrations::{get_schema_version, CURRENT_SCHEMA_VERSION};

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data").join("yamdb.db");

    let pool = init_database(&db_path).await;
    assert!(pool.is_ok(), "Database initialization failed: {:?}", pool.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_reopen_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("yamdb.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO categories (name, slug) VALUES ('Books', 'books')")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_category_delete_sets_title_category_null() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("yamdb.db")).await.unwrap();

    sqlx::query("INSERT INTO categories (id, name, slug) VALUES (1, 'Films', 'films')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO titles (id, name, year, category_id) VALUES (1, 'Alien', 1979, 1)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("DELETE FROM categories WHERE id = 1")
        .execute(&pool)
        .await
        .unwrap();

    let category: Option<i64> = sqlx::query_scalar("SELECT category_id FROM titles WHERE id = 1")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(category, None);
}

#[tokio::test]
async fn test_title_delete_cascades_to_reviews_and_comments() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("yamdb.db")).await.unwrap();

    for sql in [
        "INSERT INTO users (id, username, email, date_joined) VALUES (1, 'u', 'u@x.io', '2024-01-01T00:00:00Z')",
        "INSERT INTO titles (id, name, year) VALUES (1, 'Alien', 1979)",
        "INSERT INTO reviews (id, title_id, author_id, text, score, pub_date) VALUES (1, 1, 1, 'ok', 7, '2024-01-01T00:00:00Z')",
        "INSERT INTO comments (review_id, author_id, text, pub_date) VALUES (1, 1, 'yes', '2024-01-01T00:00:00Z')",
        "DELETE FROM titles WHERE id = 1",
    ] {
        sqlx::query(sql).execute(&pool).await.unwrap();
    }

    let remaining: i64 =
        sqlx::query_scalar("SELECT (SELECT COUNT(*) FROM reviews) + (SELECT COUNT(*) FROM comments)")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn test_one_review_per_author_per_title() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("yamdb.db")).await.unwrap();

    sqlx::query("INSERT INTO users (id, username, email, date_joined) VALUES (1, 'u', 'u@x.io', '2024-01-01T00:00:00Z')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO titles (id, name, year) VALUES (1, 'Alien', 1979)")
        .execute(&pool)
        .await
        .unwrap();

    let insert = "INSERT INTO reviews (title_id, author_id, text, score, pub_date) VALUES (1, 1, 'x', 5, '2024-01-01T00:00:00Z')";
    sqlx::query(insert).execute(&pool).await.unwrap();
    let err = sqlx::query(insert).execute(&pool).await.unwrap_err();

    let is_unique = match &err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    };
    assert!(is_unique, "expected unique violation, got {:?}", err);
}
