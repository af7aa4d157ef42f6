//! Title endpoints
//!
//! Titles reference their category and genres by slug on input and embed
//! them as `{name, slug}` objects on output.

use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;
use yamdb_common::db::{Category, Genre, Title};
use yamdb_common::validation::{require, validate_name, validate_year};
use yamdb_common::FieldErrors;

use super::auth::AdminUser;
use super::extract::{Params, PathParam, Payload};
use crate::db::taxonomy::{self, SlugEntity};
use crate::db::titles::{self, TitleFilter, TitleRecord};
use crate::error::{ApiError, ApiResult};
use crate::pagination::{Page, PageQuery};
use crate::AppState;

/// `?category=&genre=&name=&year=`
#[derive(Debug, Default, Deserialize)]
pub struct TitleQuery {
    pub category: Option<String>,
    pub genre: Option<String>,
    pub name: Option<String>,
    pub year: Option<i32>,
}

impl From<TitleQuery> for TitleFilter {
    fn from(query: TitleQuery) -> Self {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        TitleFilter {
            category: non_empty(query.category),
            genre: non_empty(query.genre),
            name: non_empty(query.name),
            year: query.year,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TitlePayload {
    pub name: Option<String>,
    pub year: Option<i32>,
    pub description: Option<String>,
    /// Genre slugs; replaces the whole set when present
    pub genre: Option<Vec<String>>,
    /// Category slug
    pub category: Option<String>,
}

/// GET /api/v1/titles/
pub async fn list_titles(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Params(query): Params<TitleQuery>,
    Params(paging): Params<PageQuery>,
) -> ApiResult<Json<Page<Title>>> {
    let window = paging.resolve(state.page_size)?;
    let filter = TitleFilter::from(query);
    let (results, count) =
        titles::list_titles(&state.db, &filter, window.limit, window.offset).await?;
    Ok(Json(window.finish(results, count, &uri)?))
}

/// POST /api/v1/titles/
pub async fn create_title(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Payload(body): Payload<TitlePayload>,
) -> ApiResult<(StatusCode, Json<Title>)> {
    let mut errors = FieldErrors::new();
    require(&mut errors, "name", &body.name);
    require(&mut errors, "year", &body.year);
    require(&mut errors, "genre", &body.genre);
    require(&mut errors, "category", &body.category);
    errors.into_result()?;

    let record = TitleRecord {
        name: String::new(),
        year: 0,
        description: None,
        category_id: None,
        genre_ids: Vec::new(),
    };
    let record = merge(&state.db, record, body).await?;
    let title = titles::create_title(&state.db, &record).await?;

    info!("Created title {} ({})", title.name, title.id);

    Ok((StatusCode::CREATED, Json(title)))
}

/// GET /api/v1/titles/{title_id}/
pub async fn get_title(
    State(state): State<AppState>,
    PathParam(title_id): PathParam<i64>,
) -> ApiResult<Json<Title>> {
    let title = titles::find_title(&state.db, title_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Title"))?;
    Ok(Json(title))
}

/// PATCH /api/v1/titles/{title_id}/
pub async fn update_title(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    PathParam(title_id): PathParam<i64>,
    Payload(body): Payload<TitlePayload>,
) -> ApiResult<Json<Title>> {
    let current = titles::find_title(&state.db, title_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Title"))?;

    let record = TitleRecord {
        name: current.name,
        year: current.year,
        description: current.description,
        category_id: current.category.map(|c| c.id),
        genre_ids: current.genres.iter().map(|g| g.id).collect(),
    };
    let record = merge(&state.db, record, body).await?;
    let title = titles::update_title(&state.db, title_id, &record).await?;

    Ok(Json(title))
}

/// DELETE /api/v1/titles/{title_id}/
pub async fn delete_title(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    PathParam(title_id): PathParam<i64>,
) -> ApiResult<StatusCode> {
    if !titles::delete_title(&state.db, title_id).await? {
        return Err(ApiError::not_found("Title"));
    }

    info!("Deleted title {}", title_id);

    Ok(StatusCode::NO_CONTENT)
}

/// Validate the supplied fields and lay them over `record`
///
/// Slugs are resolved here; an unknown slug is an error on its field.
async fn merge(db: &SqlitePool, mut record: TitleRecord, body: TitlePayload) -> ApiResult<TitleRecord> {
    let mut errors = FieldErrors::new();

    if let Some(name) = body.name {
        validate_name(&mut errors, &name);
        record.name = name;
    }
    if let Some(year) = body.year {
        validate_year(&mut errors, year);
        record.year = year;
    }
    if let Some(description) = body.description {
        record.description = Some(description);
    }
    if let Some(slug) = body.category {
        match taxonomy::find_by_slug::<Category>(db, &slug).await? {
            Some(category) => record.category_id = Some(category.id),
            None => errors.add("category", missing_slug::<Category>(&slug)),
        }
    }
    if let Some(slugs) = body.genre {
        match taxonomy::find_by_slugs::<Genre>(db, &slugs).await? {
            Ok(genres) => record.genre_ids = genres.iter().map(|g| g.id).collect(),
            Err(missing) => {
                for slug in missing {
                    errors.add("genre", missing_slug::<Genre>(&slug));
                }
            }
        }
    }

    errors.into_result()?;
    Ok(record)
}

fn missing_slug<E: SlugEntity>(slug: &str) -> String {
    format!("{} with slug={} does not exist.", capitalized(E::LABEL), slug)
}

fn capitalized(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
