//! HTTP API handlers for yamdb-api

pub mod auth;
pub mod extract;
pub mod health;
pub mod reviews;
pub mod signup;
pub mod taxonomy;
pub mod titles;
pub mod users;

pub use auth::{auth_middleware, AdminUser, AuthUser, CurrentUser};
pub use health::health_routes;
pub use reviews::{
    create_comment, create_review, delete_comment, delete_review, get_comment, get_review,
    list_comments, list_reviews, update_comment, update_review,
};
pub use signup::{issue_confirmation_code, obtain_token, signup};
pub use titles::{create_title, delete_title, get_title, list_titles, update_title};
pub use users::{create_user, delete_user, get_me, get_user, list_users, update_me, update_user};
