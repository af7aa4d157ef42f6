//! Review and comment endpoints
//!
//! Both are nested under their parent; an id addressed under the wrong
//! parent is a 404. Anyone can read, any user can write, and only the
//! author, a moderator or an admin may change or remove an entry.

use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;
use yamdb_common::db::{Comment, Review, User};
use yamdb_common::validation::{require, validate_score, validate_text};
use yamdb_common::FieldErrors;

use super::auth::AuthUser;
use super::extract::{Params, PathParam, Payload};
use crate::db::{comments, reviews, titles};
use crate::error::{ApiError, ApiResult};
use crate::pagination::{Page, PageQuery};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ReviewPayload {
    pub text: Option<String>,
    pub score: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentPayload {
    pub text: Option<String>,
}

fn check_author(user: &User, author_id: i64) -> ApiResult<()> {
    if user.can_moderate(author_id) {
        Ok(())
    } else {
        Err(ApiError::permission_denied())
    }
}

async fn ensure_title(state: &AppState, title_id: i64) -> ApiResult<()> {
    if titles::title_exists(&state.db, title_id).await? {
        Ok(())
    } else {
        Err(ApiError::not_found("Title"))
    }
}

async fn load_review(state: &AppState, title_id: i64, review_id: i64) -> ApiResult<Review> {
    reviews::find_review(&state.db, title_id, review_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Review"))
}

async fn load_comment(
    state: &AppState,
    title_id: i64,
    review_id: i64,
    comment_id: i64,
) -> ApiResult<Comment> {
    load_review(state, title_id, review_id).await?;
    comments::find_comment(&state.db, review_id, comment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment"))
}

// ========================================
// Reviews
// ========================================

/// GET /api/v1/titles/{title_id}/reviews/
pub async fn list_reviews(
    State(state): State<AppState>,
    PathParam(title_id): PathParam<i64>,
    OriginalUri(uri): OriginalUri,
    Params(paging): Params<PageQuery>,
) -> ApiResult<Json<Page<Review>>> {
    ensure_title(&state, title_id).await?;
    let window = paging.resolve(state.page_size)?;
    let (results, count) =
        reviews::list_reviews(&state.db, title_id, window.limit, window.offset).await?;
    Ok(Json(window.finish(results, count, &uri)?))
}

/// POST /api/v1/titles/{title_id}/reviews/
pub async fn create_review(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathParam(title_id): PathParam<i64>,
    Payload(body): Payload<ReviewPayload>,
) -> ApiResult<(StatusCode, Json<Review>)> {
    ensure_title(&state, title_id).await?;

    let mut errors = FieldErrors::new();
    if let Some(text) = require(&mut errors, "text", &body.text) {
        validate_text(&mut errors, text);
    }
    if let Some(score) = require(&mut errors, "score", &body.score) {
        validate_score(&mut errors, *score);
    }
    errors.into_result()?;

    let text = body.text.unwrap_or_default();
    let score = body.score.unwrap_or_default();
    let review = reviews::create_review(&state.db, title_id, user.id, &text, score).await?;

    info!("{} reviewed title {} ({}/10)", user.username, title_id, review.score);

    Ok((StatusCode::CREATED, Json(review)))
}

/// GET /api/v1/titles/{title_id}/reviews/{review_id}/
pub async fn get_review(
    State(state): State<AppState>,
    PathParam((title_id, review_id)): PathParam<(i64, i64)>,
) -> ApiResult<Json<Review>> {
    Ok(Json(load_review(&state, title_id, review_id).await?))
}

/// PATCH /api/v1/titles/{title_id}/reviews/{review_id}/
pub async fn update_review(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathParam((title_id, review_id)): PathParam<(i64, i64)>,
    Payload(body): Payload<ReviewPayload>,
) -> ApiResult<Json<Review>> {
    let mut review = load_review(&state, title_id, review_id).await?;
    check_author(&user, review.author_id)?;

    let mut errors = FieldErrors::new();
    if let Some(text) = &body.text {
        validate_text(&mut errors, text);
    }
    if let Some(score) = body.score {
        validate_score(&mut errors, score);
    }
    errors.into_result()?;

    if let Some(text) = body.text {
        review.text = text;
    }
    if let Some(score) = body.score {
        review.score = score;
    }
    reviews::update_review(&state.db, &review).await?;

    Ok(Json(review))
}

/// DELETE /api/v1/titles/{title_id}/reviews/{review_id}/
pub async fn delete_review(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathParam((title_id, review_id)): PathParam<(i64, i64)>,
) -> ApiResult<StatusCode> {
    let review = load_review(&state, title_id, review_id).await?;
    check_author(&user, review.author_id)?;

    reviews::delete_review(&state.db, review.id).await?;
    info!("{} deleted review {}", user.username, review.id);

    Ok(StatusCode::NO_CONTENT)
}

// ========================================
// Comments
// ========================================

/// GET /api/v1/titles/{title_id}/reviews/{review_id}/comments/
pub async fn list_comments(
    State(state): State<AppState>,
    PathParam((title_id, review_id)): PathParam<(i64, i64)>,
    OriginalUri(uri): OriginalUri,
    Params(paging): Params<PageQuery>,
) -> ApiResult<Json<Page<Comment>>> {
    load_review(&state, title_id, review_id).await?;
    let window = paging.resolve(state.page_size)?;
    let (results, count) =
        comments::list_comments(&state.db, review_id, window.limit, window.offset).await?;
    Ok(Json(window.finish(results, count, &uri)?))
}

/// POST /api/v1/titles/{title_id}/reviews/{review_id}/comments/
pub async fn create_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathParam((title_id, review_id)): PathParam<(i64, i64)>,
    Payload(body): Payload<CommentPayload>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    load_review(&state, title_id, review_id).await?;

    let mut errors = FieldErrors::new();
    if let Some(text) = require(&mut errors, "text", &body.text) {
        validate_text(&mut errors, text);
    }
    errors.into_result()?;

    let text = body.text.unwrap_or_default();
    let comment = comments::create_comment(&state.db, review_id, user.id, &text).await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// GET /api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/
pub async fn get_comment(
    State(state): State<AppState>,
    PathParam((title_id, review_id, comment_id)): PathParam<(i64, i64, i64)>,
) -> ApiResult<Json<Comment>> {
    Ok(Json(load_comment(&state, title_id, review_id, comment_id).await?))
}

/// PATCH /api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/
pub async fn update_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathParam((title_id, review_id, comment_id)): PathParam<(i64, i64, i64)>,
    Payload(body): Payload<CommentPayload>,
) -> ApiResult<Json<Comment>> {
    let mut comment = load_comment(&state, title_id, review_id, comment_id).await?;
    check_author(&user, comment.author_id)?;

    if let Some(text) = body.text {
        let mut errors = FieldErrors::new();
        validate_text(&mut errors, &text);
        errors.into_result()?;
        comment.text = text;
    }
    comments::update_comment(&state.db, &comment).await?;

    Ok(Json(comment))
}

/// DELETE /api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/
pub async fn delete_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathParam((title_id, review_id, comment_id)): PathParam<(i64, i64, i64)>,
) -> ApiResult<StatusCode> {
    let comment = load_comment(&state, title_id, review_id, comment_id).await?;
    check_author(&user, comment.author_id)?;

    comments::delete_comment(&state.db, comment.id).await?;

    Ok(StatusCode::NO_CONTENT)
}
