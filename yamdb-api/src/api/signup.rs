//! Registration and token exchange
//!
//! Signup mails a one-time confirmation code; `/auth/token/` trades that
//! code for an access token.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};
use yamdb_common::api::{generate_confirmation_code, hash_confirmation_code, verify_confirmation_code};
use yamdb_common::db::User;
use yamdb_common::validation::{require, validate_email, validate_username};
use yamdb_common::FieldErrors;

use super::extract::Payload;
use crate::db::users::{self, NewUser};
use crate::error::{ApiError, ApiResult};
use crate::mail::{deliver, Mail};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: Option<String>,
    pub confirmation_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Generate a fresh code for `user`, replacing any outstanding one
///
/// Returns the plain code; only its digest is stored.
pub async fn issue_confirmation_code(db: &SqlitePool, user: &User) -> yamdb_common::Result<String> {
    let code = generate_confirmation_code();
    users::set_confirmation_code_hash(db, user.id, Some(&hash_confirmation_code(&code))).await?;
    Ok(code)
}

/// POST /api/v1/auth/signup/
///
/// Creates the user on first call. Repeating the call with the same
/// username and email sends a new code; any other collision is rejected.
pub async fn signup(
    State(state): State<AppState>,
    Payload(body): Payload<SignupRequest>,
) -> ApiResult<Json<SignupResponse>> {
    let mut errors = FieldErrors::new();
    if let Some(username) = require(&mut errors, "username", &body.username) {
        validate_username(&mut errors, username);
    }
    if let Some(email) = require(&mut errors, "email", &body.email) {
        validate_email(&mut errors, email);
    }
    errors.into_result()?;

    let username = body.username.unwrap_or_default();
    let email = body.email.unwrap_or_default();

    let by_username = users::find_by_username(&state.db, &username).await?;
    let by_email = users::find_by_email(&state.db, &email).await?;

    let user = match (by_username, by_email) {
        (Some(existing), Some(same)) if existing.id == same.id => {
            info!("Resending confirmation code to {}", existing.username);
            existing
        }
        (None, None) => {
            let user = users::create_user(&state.db, &NewUser::signup(&username, &email)).await?;
            info!("Registered user {}", user.username);
            user
        }
        (by_username, by_email) => {
            let mut errors = FieldErrors::new();
            if by_username.is_some() {
                errors.add("username", "A user with that username already exists.");
            }
            if by_email.is_some() {
                errors.add("email", "A user with that email already exists.");
            }
            return Err(errors.into());
        }
    };

    let code = issue_confirmation_code(&state.db, &user).await?;
    let mail = Mail::confirmation(&state.from_address, &user.email, &user.username, &code);
    if let Err(e) = deliver(state.mailer.clone(), mail).await {
        warn!("Failed to send confirmation code to {}: {}", user.email, e);
    }

    Ok(Json(SignupResponse {
        username: user.username,
        email: user.email,
    }))
}

/// POST /api/v1/auth/token/
///
/// A code is accepted once; the stored digest is cleared on success.
pub async fn obtain_token(
    State(state): State<AppState>,
    Payload(body): Payload<TokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let mut errors = FieldErrors::new();
    require(&mut errors, "username", &body.username);
    require(&mut errors, "confirmation_code", &body.confirmation_code);
    errors.into_result()?;

    let username = body.username.unwrap_or_default();
    let code = body.confirmation_code.unwrap_or_default();

    let user = users::find_by_username(&state.db, &username)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    let valid = user
        .confirmation_code_hash
        .as_deref()
        .map_or(false, |stored| verify_confirmation_code(&code, stored));
    if !valid {
        return Err(FieldErrors::single("confirmation_code", "Invalid confirmation code.").into());
    }

    users::set_confirmation_code_hash(&state.db, user.id, None).await?;

    let token = state
        .keys
        .issue(user.id, &user.username)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!("Issued access token for {}", user.username);

    Ok(Json(TokenResponse { token }))
}
