//! Test helpers for yamdb-api integration tests
//!
//! `TestApp` wraps the router over a private in-memory database and an
//! in-memory mailer, so each test starts from an empty store.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method
use yamdb_api::db::users::{self, NewUser};
use yamdb_api::mail::MemoryMailer;
use yamdb_api::{build_router, AppState};
use yamdb_common::api::TokenKeys;
use yamdb_common::db::{init_memory_database, Role, User};

pub const TEST_SECRET: &str = "test-signing-secret";

pub struct TestApp {
    pub app: Router,
    pub db: SqlitePool,
    pub mailer: Arc<MemoryMailer>,
    pub keys: TokenKeys,
}

/// Response status and JSON body (`Null` when the body is empty)
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_page_size(10).await
    }

    pub async fn with_page_size(page_size: u32) -> Self {
        let db = init_memory_database().await.expect("Should open database");
        let mailer = Arc::new(MemoryMailer::new());
        let keys = TokenKeys::new(TEST_SECRET, 3600);

        let state = AppState::new(db.clone(), keys.clone(), mailer.clone())
            .with_from_address("noreply@test.local")
            .with_page_size(page_size);

        Self {
            app: build_router(state),
            db,
            mailer,
            keys,
        }
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Should read body");

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse { status, body }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request("GET", uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request("POST", uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request("PATCH", uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request("DELETE", uri, token, None).await
    }

    /// Insert a user directly and return it with a valid access token
    pub async fn user(&self, username: &str, role: Role) -> (User, String) {
        let new_user = NewUser {
            role,
            ..NewUser::signup(username, &format!("{}@test.local", username))
        };
        let user = users::create_user(&self.db, &new_user)
            .await
            .expect("Should create user");
        let token = self
            .keys
            .issue(user.id, &user.username)
            .expect("Should issue token");
        (user, token)
    }

    pub async fn admin(&self) -> String {
        self.user("admin", Role::Admin).await.1
    }

    /// Admin-created category, genres and a title; returns the title id
    pub async fn seed_title(&self, admin_token: &str, name: &str, year: i32, genres: &[&str]) -> i64 {
        for slug in genres {
            self.post(
                "/api/v1/genres/",
                Some(admin_token),
                serde_json::json!({"name": slug.to_uppercase(), "slug": slug}),
            )
            .await;
        }
        self.post(
            "/api/v1/categories/",
            Some(admin_token),
            serde_json::json!({"name": "Films", "slug": "films"}),
        )
        .await;

        let response = self
            .post(
                "/api/v1/titles/",
                Some(admin_token),
                serde_json::json!({
                    "name": name,
                    "year": year,
                    "genre": genres,
                    "category": "films",
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["id"].as_i64().expect("title id")
    }
}
