//! # YaMDb Common Library
//!
//! Shared code for the YaMDb service including:
//! - Database schema, migrations and models
//! - Configuration loading
//! - Field validation rules
//! - Access token and confirmation code primitives

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod time;
pub mod validation;

pub use error::{Error, Result};
pub use validation::FieldErrors;
