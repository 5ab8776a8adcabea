#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt; // for `oneshot`
use uuid::Uuid;

use backoffice::config::AppConfig;
use backoffice::create_app;
use backoffice::utils::{hash_password, utc_now};

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    // Held so the tempdir (and the db file in it) outlives the test.
    _dir: TempDir,
}

pub async fn setup() -> Result<TestApp> {
    let dir = tempfile::tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");

    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let config = AppConfig::from_env().map_err(|err| anyhow::anyhow!("{err}"))?;
    let app = create_app(pool.clone(), config).await?;

    Ok(TestApp {
        app,
        pool,
        _dir: dir,
    })
}

/// Insert a user directly; there is no self-registration endpoint.
pub async fn create_user(
    pool: &SqlitePool,
    email: &str,
    password: &str,
    is_admin: bool,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = utc_now().to_rfc3339();
    let hash = hash_password(password).map_err(|err| anyhow::anyhow!("{err}"))?;

    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, is_admin, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind("Test User")
    .bind(email)
    .bind(&hash)
    .bind(is_admin)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(id)
}

pub async fn assign_role(pool: &SqlitePool, user_id: Uuid, role_slug: &str) -> Result<()> {
    let role_id: String = sqlx::query_scalar("SELECT id FROM roles WHERE slug = ?")
        .bind(role_slug)
        .fetch_one(pool)
        .await
        .with_context(|| format!("role {role_slug} not seeded"))?;

    sqlx::query("INSERT INTO user_roles (user_id, role_id, created_at) VALUES (?, ?, ?)")
        .bind(user_id.to_string())
        .bind(role_id)
        .bind(utc_now().to_rfc3339())
        .execute(pool)
        .await?;

    Ok(())
}

/// Create a user, give it a role, and log in. Returns the bearer token.
pub async fn login_as(app: &Router, pool: &SqlitePool, email: &str, role: &str) -> Result<String> {
    let user_id = create_user(pool, email, "password123", false).await?;
    assign_role(pool, user_id, role).await?;
    login(app, email, "password123").await
}

pub async fn login(app: &Router, email: &str, password: &str) -> Result<String> {
    let resp = send_json(
        app,
        "POST",
        "/auth/login",
        None,
        json!({"email": email, "password": password}),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::OK, "login should succeed");

    let body = body_json(resp).await?;
    body.get("token")
        .and_then(Value::as_str)
        .map(String::from)
        .context("missing token in login response")
}

pub async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    payload: Value,
) -> Result<Response<Body>> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let req = builder.body(Body::from(payload.to_string()))?;
    Ok(app.clone().oneshot(req).await?)
}

pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
) -> Result<Response<Body>> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let req = builder.body(Body::empty())?;
    Ok(app.clone().oneshot(req).await?)
}

pub async fn body_json(resp: Response<Body>) -> Result<Value> {
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}
