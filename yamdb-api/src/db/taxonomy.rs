//! Categories and genres
//!
//! Both are `(name, slug)` lookup tables with identical access patterns, so
//! the queries are written once over [`SlugEntity`].

use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use yamdb_common::db::{Category, Genre};
use yamdb_common::{Error, FieldErrors, Result};

use super::like_pattern;

/// A `(name, slug)` lookup table
pub trait SlugEntity: Sized + Send + Unpin + 'static {
    /// Table name
    const TABLE: &'static str;
    /// Human-readable singular, used in messages
    const LABEL: &'static str;

    fn from_row(row: &SqliteRow) -> sqlx::Result<Self>;
    fn id(&self) -> i64;
    fn slug(&self) -> &str;
}

impl SlugEntity for Category {
    const TABLE: &'static str = "categories";
    const LABEL: &'static str = "category";

    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Category::from_row(row)
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn slug(&self) -> &str {
        &self.slug
    }
}

impl SlugEntity for Genre {
    const TABLE: &'static str = "genres";
    const LABEL: &'static str = "genre";

    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Genre::from_row(row)
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn slug(&self) -> &str {
        &self.slug
    }
}

/// Entries ordered by name, optionally filtered by a name substring
pub async fn list<E: SlugEntity>(
    pool: &SqlitePool,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<E>, i64)> {
    let pattern = like_pattern(search.unwrap_or(""));

    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {} WHERE name LIKE ? ESCAPE '\\'",
        E::TABLE
    ))
    .bind(&pattern)
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query(&format!(
        "SELECT id, name, slug FROM {} WHERE name LIKE ? ESCAPE '\\' ORDER BY name, id LIMIT ? OFFSET ?",
        E::TABLE
    ))
    .bind(&pattern)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let entries = rows
        .iter()
        .map(E::from_row)
        .collect::<sqlx::Result<Vec<_>>>()?;

    Ok((entries, count))
}

pub async fn find_by_slug<E: SlugEntity>(pool: &SqlitePool, slug: &str) -> Result<Option<E>> {
    let row = sqlx::query(&format!(
        "SELECT id, name, slug FROM {} WHERE slug = ?",
        E::TABLE
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(E::from_row).transpose()?)
}

/// Look up several slugs at once
///
/// Returns the entries in the order the slugs were given, or the list of
/// slugs that do not exist.
pub async fn find_by_slugs<E: SlugEntity>(
    pool: &SqlitePool,
    slugs: &[String],
) -> Result<std::result::Result<Vec<E>, Vec<String>>> {
    if slugs.is_empty() {
        return Ok(Ok(Vec::new()));
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT id, name, slug FROM {} WHERE slug IN (", E::TABLE));
    let mut separated = builder.separated(", ");
    for slug in slugs {
        separated.push_bind(slug);
    }
    separated.push_unseparated(")");

    let rows = builder.build().fetch_all(pool).await?;
    let mut found = rows
        .iter()
        .map(E::from_row)
        .collect::<sqlx::Result<Vec<_>>>()?;

    let missing: Vec<String> = slugs
        .iter()
        .filter(|slug| !found.iter().any(|entry| entry.slug() == slug.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Ok(Err(missing));
    }

    found.sort_by_key(|entry| slugs.iter().position(|s| s == entry.slug()));
    Ok(Ok(found))
}

/// Insert an entry; a taken slug is a field validation error
pub async fn create<E: SlugEntity>(pool: &SqlitePool, name: &str, slug: &str) -> Result<E> {
    let insert = sqlx::query(&format!("INSERT INTO {} (name, slug) VALUES (?, ?)", E::TABLE))
        .bind(name)
        .bind(slug)
        .execute(pool)
        .await;

    match insert {
        Ok(_) => {}
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            return Err(Error::Validation(FieldErrors::single(
                "slug",
                format!("{} with this slug already exists.", E::LABEL),
            )));
        }
        Err(e) => return Err(e.into()),
    }

    find_by_slug(pool, slug)
        .await?
        .ok_or_else(|| Error::Internal(format!("inserted {} vanished", E::LABEL)))
}

/// Returns false when nothing had that slug
pub async fn delete_by_slug<E: SlugEntity>(pool: &SqlitePool, slug: &str) -> Result<bool> {
    let result = sqlx::query(&format!("DELETE FROM {} WHERE slug = ?", E::TABLE))
        .bind(slug)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use yamdb_common::db::init_memory_database;

    #[tokio::test]
    async fn test_create_and_find() {
        let pool = init_memory_database().await.unwrap();

        let created: Category = create(&pool, "Books", "books").await.unwrap();
        assert_eq!(created.slug, "books");

        let found: Option<Category> = find_by_slug(&pool, "books").await.unwrap();
        assert_eq!(found, Some(created));
        let other: Option<Genre> = find_by_slug(&pool, "books").await.unwrap();
        assert!(other.is_none(), "genres and categories are separate tables");
    }

    #[tokio::test]
    async fn test_duplicate_slug_rejected() {
        let pool = init_memory_database().await.unwrap();
        create::<Genre>(&pool, "Drama", "drama").await.unwrap();

        match create::<Genre>(&pool, "Drama again", "drama").await {
            Err(Error::Validation(errors)) => assert!(errors.contains("slug")),
            other => panic!("unexpected result: {:?}", other.map(|g| g.slug)),
        }
    }

    #[tokio::test]
    async fn test_list_search() {
        let pool = init_memory_database().await.unwrap();
        for (name, slug) in [("Rock", "rock"), ("Rockabilly", "rockabilly"), ("Jazz", "jazz")] {
            create::<Genre>(&pool, name, slug).await.unwrap();
        }

        let (all, count) = list::<Genre>(&pool, None, 10, 0).await.unwrap();
        assert_eq!(count, 3);
        assert_eq!(all[0].name, "Jazz");

        let (rock, count) = list::<Genre>(&pool, Some("rock"), 10, 0).await.unwrap();
        assert_eq!(count, 2);
        assert!(rock.iter().all(|g| g.slug.starts_with("rock")));
    }

    #[tokio::test]
    async fn test_find_by_slugs_reports_missing() {
        let pool = init_memory_database().await.unwrap();
        create::<Genre>(&pool, "Rock", "rock").await.unwrap();
        create::<Genre>(&pool, "Jazz", "jazz").await.unwrap();

        let found = find_by_slugs::<Genre>(&pool, &["jazz".to_string(), "rock".to_string()])
            .await
            .unwrap()
            .unwrap();
        let slugs: Vec<_> = found.iter().map(|g| g.slug.as_str()).collect();
        assert_eq!(slugs, vec!["jazz", "rock"]);

        let missing = find_by_slugs::<Genre>(&pool, &["rock".to_string(), "polka".to_string()])
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(missing, vec!["polka".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_by_slug() {
        let pool = init_memory_database().await.unwrap();
        create::<Category>(&pool, "Films", "films").await.unwrap();

        assert!(delete_by_slug::<Category>(&pool, "films").await.unwrap());
        assert!(!delete_by_slug::<Category>(&pool, "films").await.unwrap());
    }
}
