//! Title persistence and rating aggregation
//!
//! `rating` is never stored: every read computes the mean review score in
//! the same statement that loads the title.

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;
use yamdb_common::db::{Genre, Title};
use yamdb_common::{Error, Result};

use super::like_pattern;

const TITLE_SELECT: &str = r#"
    SELECT t.id, t.name, t.year, t.description,
           c.id AS category_id, c.name AS category_name, c.slug AS category_slug,
           (SELECT AVG(r.score) FROM reviews r WHERE r.title_id = t.id) AS rating
    FROM titles t
    LEFT JOIN categories c ON c.id = t.category_id
"#;

/// Title list filters; every field narrows the result
#[derive(Debug, Clone, Default)]
pub struct TitleFilter {
    /// Category slug substring
    pub category: Option<String>,
    /// Genre slug substring
    pub genre: Option<String>,
    /// Name substring
    pub name: Option<String>,
    /// Exact year
    pub year: Option<i32>,
}

/// Column values for insert/update
#[derive(Debug, Clone)]
pub struct TitleRecord {
    pub name: String,
    pub year: i32,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub genre_ids: Vec<i64>,
}

fn push_filters<'a>(builder: &mut QueryBuilder<'a, Sqlite>, filter: &'a TitleFilter) {
    builder.push(" WHERE 1 = 1");

    if let Some(category) = &filter.category {
        builder
            .push(" AND t.category_id IN (SELECT id FROM categories WHERE slug LIKE ")
            .push_bind(like_pattern(category))
            .push(" ESCAPE '\\')");
    }
    if let Some(genre) = &filter.genre {
        builder
            .push(
                " AND EXISTS (SELECT 1 FROM genre_title gt JOIN genres g ON g.id = gt.genre_id \
                 WHERE gt.title_id = t.id AND g.slug LIKE ",
            )
            .push_bind(like_pattern(genre))
            .push(" ESCAPE '\\')");
    }
    if let Some(name) = &filter.name {
        builder
            .push(" AND t.name LIKE ")
            .push_bind(like_pattern(name))
            .push(" ESCAPE '\\'");
    }
    if let Some(year) = filter.year {
        builder.push(" AND t.year = ").push_bind(year);
    }
}

/// Filtered titles ordered by id, with total count
pub async fn list_titles(
    pool: &SqlitePool,
    filter: &TitleFilter,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Title>, i64)> {
    let mut count_query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM titles t");
    push_filters(&mut count_query, filter);
    let count: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(TITLE_SELECT);
    push_filters(&mut query, filter);
    query
        .push(" ORDER BY t.id LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = query.build().fetch_all(pool).await?;
    let mut titles = rows
        .iter()
        .map(Title::from_row)
        .collect::<sqlx::Result<Vec<_>>>()?;

    attach_genres(pool, &mut titles).await?;

    Ok((titles, count))
}

pub async fn find_title(pool: &SqlitePool, id: i64) -> Result<Option<Title>> {
    let row = sqlx::query(&format!("{} WHERE t.id = ?", TITLE_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    let mut title = match row {
        Some(row) => Title::from_row(&row)?,
        None => return Ok(None),
    };

    title.genres = genres_for(pool, &[title.id])
        .await?
        .remove(&title.id)
        .unwrap_or_default();

    Ok(Some(title))
}

pub async fn title_exists(pool: &SqlitePool, id: i64) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM titles WHERE id = ?)")
        .bind(id)
        .fetch_one(pool)
        .await?;

    Ok(exists)
}

/// Insert a title and its genre links in one transaction
pub async fn create_title(pool: &SqlitePool, record: &TitleRecord) -> Result<Title> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "INSERT INTO titles (name, year, description, category_id) VALUES (?, ?, ?, ?)",
    )
    .bind(&record.name)
    .bind(record.year)
    .bind(&record.description)
    .bind(record.category_id)
    .execute(&mut *tx)
    .await?;
    let id = result.last_insert_rowid();

    for genre_id in &record.genre_ids {
        sqlx::query("INSERT OR IGNORE INTO genre_title (title_id, genre_id) VALUES (?, ?)")
            .bind(id)
            .bind(genre_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    find_title(pool, id)
        .await?
        .ok_or_else(|| Error::Internal("inserted title vanished".to_string()))
}

/// Overwrite a title's columns and replace its genre set
pub async fn update_title(pool: &SqlitePool, id: i64, record: &TitleRecord) -> Result<Title> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE titles SET name = ?, year = ?, description = ?, category_id = ? WHERE id = ?",
    )
    .bind(&record.name)
    .bind(record.year)
    .bind(&record.description)
    .bind(record.category_id)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("title {}", id)));
    }

    sqlx::query("DELETE FROM genre_title WHERE title_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    for genre_id in &record.genre_ids {
        sqlx::query("INSERT OR IGNORE INTO genre_title (title_id, genre_id) VALUES (?, ?)")
            .bind(id)
            .bind(genre_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    find_title(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("title {}", id)))
}

/// Returns false when no such title exists
pub async fn delete_title(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM titles WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

async fn attach_genres(pool: &SqlitePool, titles: &mut [Title]) -> Result<()> {
    let ids: Vec<i64> = titles.iter().map(|t| t.id).collect();
    let mut by_title = genres_for(pool, &ids).await?;

    for title in titles.iter_mut() {
        title.genres = by_title.remove(&title.id).unwrap_or_default();
    }

    Ok(())
}

/// Genres of each title, ordered by slug
async fn genres_for(pool: &SqlitePool, title_ids: &[i64]) -> Result<HashMap<i64, Vec<Genre>>> {
    let mut by_title: HashMap<i64, Vec<Genre>> = HashMap::new();
    if title_ids.is_empty() {
        return Ok(by_title);
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT gt.title_id, g.id, g.name, g.slug FROM genre_title gt \
         JOIN genres g ON g.id = gt.genre_id WHERE gt.title_id IN (",
    );
    let mut separated = builder.separated(", ");
    for id in title_ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY g.slug");

    let rows = builder.build().fetch_all(pool).await?;
    for row in &rows {
        let title_id: i64 = sqlx::Row::try_get(row, "title_id")?;
        by_title
            .entry(title_id)
            .or_default()
            .push(Genre::from_row(row)?);
    }

    Ok(by_title)
}
