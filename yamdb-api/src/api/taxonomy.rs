//! Category and genre endpoints
//!
//! Routed once per entity type, e.g. `list::<Category>` and
//! `list::<Genre>`.

use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use yamdb_common::validation::{require, validate_name, validate_slug};
use yamdb_common::FieldErrors;

use super::auth::AdminUser;
use super::extract::{Params, PathParam, Payload, SearchQuery};
use crate::db::taxonomy::{self, SlugEntity};
use crate::error::{ApiError, ApiResult};
use crate::pagination::{Page, PageQuery};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SlugPayload {
    pub name: Option<String>,
    pub slug: Option<String>,
}

/// GET /api/v1/{categories,genres}/
pub async fn list<E: SlugEntity + Serialize>(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Params(search): Params<SearchQuery>,
    Params(paging): Params<PageQuery>,
) -> ApiResult<Json<Page<E>>> {
    let window = paging.resolve(state.page_size)?;
    let (results, count) =
        taxonomy::list::<E>(&state.db, search.term(), window.limit, window.offset).await?;
    Ok(Json(window.finish(results, count, &uri)?))
}

/// POST /api/v1/{categories,genres}/
pub async fn create<E: SlugEntity + Serialize>(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Payload(body): Payload<SlugPayload>,
) -> ApiResult<(StatusCode, Json<E>)> {
    let mut errors = FieldErrors::new();
    if let Some(name) = require(&mut errors, "name", &body.name) {
        validate_name(&mut errors, name);
    }
    if let Some(slug) = require(&mut errors, "slug", &body.slug) {
        validate_slug(&mut errors, slug);
    }
    errors.into_result()?;

    let name = body.name.unwrap_or_default();
    let slug = body.slug.unwrap_or_default();
    let entry = taxonomy::create::<E>(&state.db, &name, &slug).await?;

    info!("Created {} {}", E::LABEL, slug);

    Ok((StatusCode::CREATED, Json(entry)))
}

/// DELETE /api/v1/{categories,genres}/{slug}/
pub async fn remove<E: SlugEntity>(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    PathParam(slug): PathParam<String>,
) -> ApiResult<StatusCode> {
    if !taxonomy::delete_by_slug::<E>(&state.db, &slug).await? {
        return Err(ApiError::NotFound(format!("No {} with slug '{}'.", E::LABEL, slug)));
    }

    info!("Deleted {} {}", E::LABEL, slug);

    Ok(StatusCode::NO_CONTENT)
}
