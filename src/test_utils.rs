//! Shared fixtures for unit and router tests.

#![cfg(test)]

use std::{path::PathBuf, str::FromStr, sync::Arc};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use tower::ServiceExt;

use crate::{
    auth::{self, TokenKeys},
    config::{AppConfig, Environment},
    db,
    models::User,
    AppState,
};

pub const TEST_SECRET: &str = "test-secret";

/// Fresh in-memory database with migrations applied.
///
/// Every SQLite `:memory:` connection is its own database, so the pool is
/// pinned to a single connection that is never recycled.
pub async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("valid sqlite url")
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("Failed to open in-memory database");
    db::migrate(&pool).await.expect("Failed to run migrations");
    pool
}

/// A throwaway database file opened through [`db::connect`], so the pool has
/// several real connections and transactions can contend. The file and its
/// WAL companions are removed on drop.
pub struct FileDb {
    pub pool: SqlitePool,
    path: PathBuf,
}

impl FileDb {
    pub async fn open() -> Self {
        let path = std::env::temp_dir().join(format!("snip-test-{}.db", uuid::Uuid::new_v4()));
        let pool = db::connect(&format!("sqlite://{}", path.display()))
            .await
            .expect("Failed to open file database");
        Self { pool, path }
    }
}

impl Drop for FileDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        jwt_secret: TEST_SECRET.into(),
        host: "127.0.0.1".into(),
        port: 5000,
        base_url: "http://localhost:5000".into(),
        frontend_url: "http://localhost:5173".into(),
        environment: Environment::Development,
        token_ttl_days: 7,
    }
}

pub async fn test_state() -> Arc<AppState> {
    test_state_with(test_config()).await
}

pub async fn test_state_with(config: AppConfig) -> Arc<AppState> {
    Arc::new(AppState {
        db: test_pool().await,
        keys: TokenKeys::new(config.jwt_secret.as_bytes(), config.token_ttl_days),
        config,
    })
}

pub fn test_app(state: Arc<AppState>) -> Router {
    crate::router(state)
}

/// Insert a user with password "password123".
pub async fn create_test_user(pool: &SqlitePool, email: &str) -> User {
    let hash = auth::hash_password("password123").expect("Failed to hash password");
    db::create_user(pool, "Test User", email, &hash)
        .await
        .expect("Failed to create test user")
}

/// Send a request through the router and decode the JSON body (or `Null`
/// for an empty one).
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let response = send_raw(app, method, uri, token, body).await;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Response body is not JSON")
    };
    (status, json)
}

pub async fn send_raw(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> axum::response::Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("Failed to build request");

    app.clone()
        .oneshot(request)
        .await
        .expect("Router is infallible")
}

/// Register through the API and return `(user_id, token)`.
pub async fn register(app: &Router, name: &str, email: &str) -> (String, String) {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(serde_json::json!({ "name": name, "email": email, "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    let id = body["data"]["user"]["_id"].as_str().unwrap().to_owned();
    let token = body["data"]["token"].as_str().unwrap().to_owned();
    (id, token)
}
