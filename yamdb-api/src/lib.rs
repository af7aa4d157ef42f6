//! yamdb-api library - content rating service
//!
//! REST API under `/api/v1`: signup and token exchange, user administration,
//! categories, genres, titles with aggregated ratings, reviews and comments.

use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use yamdb_common::api::TokenKeys;
use yamdb_common::config::{MailConfig, DEFAULT_PAGE_SIZE};

pub mod api;
pub mod db;
pub mod error;
pub mod mail;
pub mod pagination;

pub use error::{ApiError, ApiResult};

use mail::Mailer;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Access token signing keys
    pub keys: TokenKeys,
    /// Confirmation code delivery
    pub mailer: Arc<dyn Mailer>,
    /// Sender address on outgoing mail
    pub from_address: String,
    /// Default list page size
    pub page_size: u32,
}

impl AppState {
    /// Create new application state with default mail sender and page size
    pub fn new(db: SqlitePool, keys: TokenKeys, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            db,
            keys,
            mailer,
            from_address: MailConfig::default().from_address,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_from_address(mut self, from_address: impl Into<String>) -> Self {
        self.from_address = from_address.into();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

/// Build application router
///
/// Every `/api/v1` route passes through the token middleware; handlers pick
/// the access level with their extractors. `/health` is outside it.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{delete, get, post};
    use tower_http::trace::TraceLayer;
    use yamdb_common::db::{Category, Genre};

    let v1 = Router::new()
        .route("/auth/signup/", post(api::signup))
        .route("/auth/token/", post(api::obtain_token))
        .route("/users/", get(api::list_users).post(api::create_user))
        .route("/users/me/", get(api::get_me).patch(api::update_me))
        .route(
            "/users/:username/",
            get(api::get_user)
                .patch(api::update_user)
                .delete(api::delete_user),
        )
        .route(
            "/categories/",
            get(api::taxonomy::list::<Category>).post(api::taxonomy::create::<Category>),
        )
        .route("/categories/:slug/", delete(api::taxonomy::remove::<Category>))
        .route(
            "/genres/",
            get(api::taxonomy::list::<Genre>).post(api::taxonomy::create::<Genre>),
        )
        .route("/genres/:slug/", delete(api::taxonomy::remove::<Genre>))
        .route("/titles/", get(api::list_titles).post(api::create_title))
        .route(
            "/titles/:title_id/",
            get(api::get_title)
                .patch(api::update_title)
                .delete(api::delete_title),
        )
        .route(
            "/titles/:title_id/reviews/",
            get(api::list_reviews).post(api::create_review),
        )
        .route(
            "/titles/:title_id/reviews/:review_id/",
            get(api::get_review)
                .patch(api::update_review)
                .delete(api::delete_review),
        )
        .route(
            "/titles/:title_id/reviews/:review_id/comments/",
            get(api::list_comments).post(api::create_comment),
        )
        .route(
            "/titles/:title_id/reviews/:review_id/comments/:comment_id/",
            get(api::get_comment)
                .patch(api::update_comment)
                .delete(api::delete_comment),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    Router::new()
        .nest("/api/v1", v1)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
