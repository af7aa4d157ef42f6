//! User persistence

use sqlx::SqlitePool;
use yamdb_common::db::{Role, User};
use yamdb_common::time::now;
use yamdb_common::{Error, FieldErrors, Result};

use super::like_pattern;

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, bio, role, \
     is_superuser, confirmation_code_hash, date_joined";

/// Fields for a new user
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Role,
    pub is_superuser: bool,
}

impl NewUser {
    /// Plain user as created by signup
    pub fn signup(username: &str, email: &str) -> Self {
        Self {
            username: username.to_string(),
            email: email.to_string(),
            ..Default::default()
        }
    }
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(User::from_row).transpose()?)
}

pub async fn find_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS))
        .bind(username)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(User::from_row).transpose()?)
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(User::from_row).transpose()?)
}

/// Users ordered by username, optionally filtered by a username substring
pub async fn list_users(
    pool: &SqlitePool,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<User>, i64)> {
    let pattern = like_pattern(search.unwrap_or(""));

    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username LIKE ? ESCAPE '\\'")
            .bind(&pattern)
            .fetch_one(pool)
            .await?;

    let rows = sqlx::query(&format!(
        "SELECT {} FROM users WHERE username LIKE ? ESCAPE '\\' ORDER BY username LIMIT ? OFFSET ?",
        USER_COLUMNS
    ))
    .bind(&pattern)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let users = rows
        .iter()
        .map(User::from_row)
        .collect::<sqlx::Result<Vec<_>>>()?;

    Ok((users, count))
}

/// Insert a user
///
/// A username or email collision surfaces as a field validation error.
pub async fn create_user(pool: &SqlitePool, new_user: &NewUser) -> Result<User> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, first_name, last_name, bio, role, is_superuser, date_joined)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&new_user.username)
    .bind(&new_user.email)
    .bind(&new_user.first_name)
    .bind(&new_user.last_name)
    .bind(&new_user.bio)
    .bind(new_user.role.as_str())
    .bind(new_user.is_superuser)
    .bind(now())
    .execute(pool)
    .await
    .map_err(unique_to_field_error)?;

    find_by_id(pool, result.last_insert_rowid())
        .await?
        .ok_or_else(|| Error::Internal("inserted user vanished".to_string()))
}

/// Write back every editable column of `user`
pub async fn save_user(pool: &SqlitePool, user: &User) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET username = ?, email = ?, first_name = ?, last_name = ?, bio = ?, role = ?, is_superuser = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.bio)
    .bind(user.role.as_str())
    .bind(user.is_superuser)
    .bind(user.id)
    .execute(pool)
    .await
    .map_err(unique_to_field_error)?;

    Ok(())
}

/// Returns false when no such user exists
pub async fn delete_user(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Store (or clear) the digest of the user's outstanding confirmation code
pub async fn set_confirmation_code_hash(
    pool: &SqlitePool,
    id: i64,
    code_hash: Option<&str>,
) -> Result<()> {
    sqlx::query("UPDATE users SET confirmation_code_hash = ? WHERE id = ?")
        .bind(code_hash)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

fn unique_to_field_error(err: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let field = if db_err.message().contains("users.email") {
                "email"
            } else {
                "username"
            };
            return Error::Validation(FieldErrors::single(
                field,
                format!("A user with that {} already exists.", field),
            ));
        }
    }
    Error::Database(err)
}
