//! Bearer-token authentication
//!
//! `auth_middleware` resolves the `Authorization: Bearer <token>` header to a
//! stored user and attaches it to the request. Requests without a bearer
//! header pass through anonymously; the extractors below then decide whether
//! a handler needs a user and which role.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::debug;
use yamdb_common::api::ApiAuthError;
use yamdb_common::db::User;

use crate::db::users;
use crate::error::ApiError;
use crate::AppState;

/// User resolved from the request's access token
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Token from an `Authorization: Bearer` header
///
/// `None` when the header is absent or uses another scheme.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ').unwrap_or((value, ""));
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
}

/// Authentication middleware
///
/// Returns 401 when a bearer token is present but invalid, expired, or
/// names a user that no longer exists. The user row is read on every
/// request so role changes apply immediately.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = bearer_token(request.headers()).map(str::to_owned) else {
        return Ok(next.run(request).await);
    };

    let claims = state.keys.verify(&token).map_err(|e| {
        debug!("Rejected access token: {}", e);
        match e {
            ApiAuthError::ExpiredToken => ApiError::Unauthorized("Token has expired.".to_string()),
            _ => ApiError::Unauthorized("Given token not valid.".to_string()),
        }
    })?;

    let user_id = claims
        .user_id()
        .map_err(|_| ApiError::Unauthorized("Given token not valid.".to_string()))?;

    let user = users::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found.".to_string()))?;

    request.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(request).await)
}

fn current_user(parts: &Parts) -> Option<User> {
    parts
        .extensions
        .get::<CurrentUser>()
        .map(|current| current.0.clone())
}

/// Any authenticated user (401 otherwise)
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_user(parts)
            .map(AuthUser)
            .ok_or_else(ApiError::authentication_required)
    }
}

/// An administrator (401 when anonymous, 403 for other roles)
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = current_user(parts).ok_or_else(ApiError::authentication_required)?;
        if !user.is_admin() {
            return Err(ApiError::permission_denied());
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("Bearer")), Some(""));
        assert_eq!(bearer_token(&headers("Basic dXNlcg==")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
