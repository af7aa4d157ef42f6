//! Query layer over the shared SQLite schema
//!
//! One module per resource. Functions take the pool, return
//! `yamdb_common::Result` and map rows through the model `from_row`
//! constructors.

pub mod comments;
pub mod reviews;
pub mod taxonomy;
pub mod titles;
pub mod users;

/// Case-insensitive substring pattern for `LIKE ? ESCAPE '\'`
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
