//! User administration and the `/users/me/` profile

use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;
use yamdb_common::db::{Role, User};
use yamdb_common::validation::{
    require, validate_email, validate_person_name, validate_username,
};
use yamdb_common::FieldErrors;

use super::auth::{AdminUser, AuthUser};
use super::extract::{Params, PathParam, Payload, SearchQuery};
use crate::db::users::{self, NewUser};
use crate::error::{ApiError, ApiResult};
use crate::pagination::{Page, PageQuery};
use crate::AppState;

/// User fields accepted on create and update
///
/// On update, absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UserPayload {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Option<Role>,
}

fn validate_profile(errors: &mut FieldErrors, body: &UserPayload) {
    if let Some(username) = &body.username {
        validate_username(errors, username);
    }
    if let Some(email) = &body.email {
        validate_email(errors, email);
    }
    if let Some(first_name) = &body.first_name {
        validate_person_name(errors, "first_name", first_name);
    }
    if let Some(last_name) = &body.last_name {
        validate_person_name(errors, "last_name", last_name);
    }
}

/// Copy supplied fields onto `user`; `role` only when `allow_role`
fn apply(user: &mut User, body: UserPayload, allow_role: bool) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    validate_profile(&mut errors, &body);
    errors.into_result()?;

    if let Some(username) = body.username {
        user.username = username;
    }
    if let Some(email) = body.email {
        user.email = email;
    }
    if body.first_name.is_some() {
        user.first_name = body.first_name;
    }
    if body.last_name.is_some() {
        user.last_name = body.last_name;
    }
    if body.bio.is_some() {
        user.bio = body.bio;
    }
    if allow_role {
        if let Some(role) = body.role {
            user.role = role;
        }
    }

    Ok(())
}

async fn load_user(state: &AppState, username: &str) -> ApiResult<User> {
    users::find_by_username(&state.db, username)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))
}

/// GET /api/v1/users/
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    OriginalUri(uri): OriginalUri,
    Params(search): Params<SearchQuery>,
    Params(paging): Params<PageQuery>,
) -> ApiResult<Json<Page<User>>> {
    let window = paging.resolve(state.page_size)?;
    let (results, count) =
        users::list_users(&state.db, search.term(), window.limit, window.offset).await?;
    Ok(Json(window.finish(results, count, &uri)?))
}

/// POST /api/v1/users/
pub async fn create_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Payload(body): Payload<UserPayload>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let mut errors = FieldErrors::new();
    require(&mut errors, "username", &body.username);
    require(&mut errors, "email", &body.email);
    validate_profile(&mut errors, &body);
    errors.into_result()?;

    let new_user = NewUser {
        username: body.username.unwrap_or_default(),
        email: body.email.unwrap_or_default(),
        first_name: body.first_name,
        last_name: body.last_name,
        bio: body.bio,
        role: body.role.unwrap_or_default(),
        is_superuser: false,
    };
    let user = users::create_user(&state.db, &new_user).await?;

    info!("{} created user {} ({})", admin.username, user.username, user.role);

    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/v1/users/{username}/
pub async fn get_user(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    PathParam(username): PathParam<String>,
) -> ApiResult<Json<User>> {
    Ok(Json(load_user(&state, &username).await?))
}

/// PATCH /api/v1/users/{username}/
pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    PathParam(username): PathParam<String>,
    Payload(body): Payload<UserPayload>,
) -> ApiResult<Json<User>> {
    let mut user = load_user(&state, &username).await?;
    apply(&mut user, body, true)?;
    users::save_user(&state.db, &user).await?;
    Ok(Json(user))
}

/// DELETE /api/v1/users/{username}/
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    PathParam(username): PathParam<String>,
) -> ApiResult<StatusCode> {
    let user = load_user(&state, &username).await?;
    users::delete_user(&state.db, user.id).await?;

    info!("{} deleted user {}", admin.username, user.username);

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/users/me/
pub async fn get_me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

/// PATCH /api/v1/users/me/
///
/// A user cannot change their own role.
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(mut user): AuthUser,
    Payload(body): Payload<UserPayload>,
) -> ApiResult<Json<User>> {
    apply(&mut user, body, false)?;
    users::save_user(&state.db, &user).await?;
    Ok(Json(user))
}
