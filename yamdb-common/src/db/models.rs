//! Database models
//!
//! Each model serializes to the representation returned by the HTTP API.
//! Columns that must never leave the server are `#[serde(skip)]`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::fmt;
use std::str::FromStr;

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            other => Err(format!("\"{}\" is not a valid choice.", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    #[serde(skip)]
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Role,
    #[serde(skip)]
    pub is_superuser: bool,
    #[serde(skip)]
    pub confirmation_code_hash: Option<String>,
    #[serde(skip)]
    pub date_joined: DateTime<Utc>,
}

impl User {
    /// Admin role or superuser flag
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin || self.is_superuser
    }

    pub fn is_moderator(&self) -> bool {
        self.role == Role::Moderator
    }

    /// May edit or delete content written by `author_id`
    pub fn can_moderate(&self, author_id: i64) -> bool {
        self.id == author_id || self.is_moderator() || self.is_admin()
    }

    pub fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let role: String = row.try_get("role")?;
        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            bio: row.try_get("bio")?,
            role: role.parse().map_err(|e: String| sqlx::Error::ColumnDecode {
                index: "role".to_string(),
                source: e.into(),
            })?,
            is_superuser: row.try_get("is_superuser")?,
            confirmation_code_hash: row.try_get("confirmation_code_hash")?,
            date_joined: row.try_get("date_joined")?,
        })
    }
}

/// Category of a title (book, film, music…)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    #[serde(skip)]
    pub id: i64,
    pub name: String,
    pub slug: String,
}

impl Category {
    pub fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
        })
    }
}

/// Genre of a title; a title may carry several
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Genre {
    #[serde(skip)]
    pub id: i64,
    pub name: String,
    pub slug: String,
}

impl Genre {
    pub fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
        })
    }
}

/// A work being rated, with its aggregated rating
#[derive(Debug, Clone, Serialize)]
pub struct Title {
    pub id: i64,
    pub name: String,
    pub year: i32,
    /// Mean review score, `None` until the first review
    pub rating: Option<f64>,
    pub description: Option<String>,
    #[serde(rename = "genre")]
    pub genres: Vec<Genre>,
    pub category: Option<Category>,
}

impl Title {
    /// Map the scalar columns; `genres` is filled in by the caller.
    ///
    /// Expects `category_id`, `category_name` and `category_slug` columns
    /// from a LEFT JOIN on categories.
    pub fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let category_id: Option<i64> = row.try_get("category_id")?;
        let category = match category_id {
            Some(id) => Some(Category {
                id,
                name: row.try_get("category_name")?,
                slug: row.try_get("category_slug")?,
            }),
            None => None,
        };

        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            year: row.try_get("year")?,
            rating: row.try_get("rating")?,
            description: row.try_get("description")?,
            genres: Vec::new(),
            category,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub id: i64,
    #[serde(skip)]
    pub title_id: i64,
    pub text: String,
    #[serde(skip)]
    pub author_id: i64,
    /// Author username
    #[serde(rename = "author")]
    pub author_username: String,
    pub score: i64,
    pub pub_date: DateTime<Utc>,
}

impl Review {
    pub fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            title_id: row.try_get("title_id")?,
            text: row.try_get("text")?,
            author_id: row.try_get("author_id")?,
            author_username: row.try_get("author_username")?,
            score: row.try_get("score")?,
            pub_date: row.try_get("pub_date")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: i64,
    #[serde(skip)]
    pub review_id: i64,
    pub text: String,
    #[serde(skip)]
    pub author_id: i64,
    #[serde(rename = "author")]
    pub author_username: String,
    pub pub_date: DateTime<Utc>,
}

impl Comment {
    pub fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            review_id: row.try_get("review_id")?,
            text: row.try_get("text")?,
            author_id: row.try_get("author_id")?,
            author_username: row.try_get("author_username")?,
            pub_date: row.try_get("pub_date")?,
        })
    }
}
