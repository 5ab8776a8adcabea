use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

mod common;

async fn login_tokens(t: &common::TestApp) -> Result<(String, String)> {
    common::create_user(&t.pool, "csrf@example.com", "password123", false).await?;
    let user_id: String = sqlx::query_scalar("SELECT id FROM users WHERE email = 'csrf@example.com'")
        .fetch_one(&t.pool)
        .await?;
    common::assign_role(
        &t.pool,
        uuid::Uuid::parse_str(&user_id)?,
        "super-admin",
    )
    .await?;

    let resp = common::send_json(
        &t.app,
        "POST",
        "/auth/login",
        None,
        json!({"email": "csrf@example.com", "password": "password123"}),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = common::body_json(resp).await?;

    let token = body["token"].as_str().unwrap().to_string();
    let csrf = body["csrf_token"].as_str().unwrap().to_string();
    Ok((token, csrf))
}

#[tokio::test]
async fn cookie_mutation_without_csrf_header_is_forbidden() -> Result<()> {
    let t = common::setup().await?;
    let (token, csrf) = login_tokens(&t).await?;

    let req = Request::builder()
        .method("POST")
        .uri("/admin/tags")
        .header("content-type", "application/json")
        .header("cookie", format!("bo_session={token}; bo_csrf={csrf}"))
        .body(Body::from(json!({"name": "Casestudy"}).to_string()))?;
    let resp = t.app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn cookie_mutation_with_matching_header_succeeds() -> Result<()> {
    let t = common::setup().await?;
    let (token, csrf) = login_tokens(&t).await?;

    let req = Request::builder()
        .method("POST")
        .uri("/admin/tags")
        .header("content-type", "application/json")
        .header("cookie", format!("bo_session={token}; bo_csrf={csrf}"))
        .header("x-csrf-token", &csrf)
        .body(Body::from(json!({"name": "Casestudy"}).to_string()))?;
    let resp = t.app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    Ok(())
}

#[tokio::test]
async fn mismatched_csrf_header_is_forbidden() -> Result<()> {
    let t = common::setup().await?;
    let (token, csrf) = login_tokens(&t).await?;

    let req = Request::builder()
        .method("POST")
        .uri("/admin/tags")
        .header("content-type", "application/json")
        .header("cookie", format!("bo_session={token}; bo_csrf={csrf}"))
        .header("x-csrf-token", "0000000000000000000000000000000000000000000000ff")
        .body(Body::from(json!({"name": "Casestudy"}).to_string()))?;
    let resp = t.app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn bearer_requests_skip_csrf() -> Result<()> {
    let t = common::setup().await?;
    let (token, _csrf) = login_tokens(&t).await?;

    let resp = common::send_json(
        &t.app,
        "POST",
        "/admin/tags",
        Some(&token),
        json!({"name": "Casestudy"}),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    Ok(())
}

#[tokio::test]
async fn cookie_reads_skip_csrf() -> Result<()> {
    let t = common::setup().await?;
    let (token, _csrf) = login_tokens(&t).await?;

    let req = Request::builder()
        .method("GET")
        .uri("/auth/me")
        .header("cookie", format!("bo_session={token}"))
        .body(Body::empty())?;
    let resp = t.app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    Ok(())
}
