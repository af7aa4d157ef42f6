//! Framework-independent API primitives
//!
//! Token signing/verification and confirmation codes. The HTTP crate wraps
//! these with axum middleware and extractors.

pub mod auth;

pub use auth::{
    generate_confirmation_code, hash_confirmation_code, initialize_jwt_secret, load_jwt_secret,
    verify_confirmation_code, ApiAuthError, Claims, TokenKeys,
};
