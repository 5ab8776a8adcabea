use anyhow::Result;
use axum::http::StatusCode;

mod common;

#[tokio::test]
async fn health_reports_db_status() -> Result<()> {
    let t = common::setup().await?;

    let resp = common::send(&t.app, "GET", "/api/health", None).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = common::body_json(resp).await?;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["db_ok"], true);

    Ok(())
}
