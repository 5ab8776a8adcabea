use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

mod common;

#[tokio::test]
async fn empty_period_reports_zero_ratios() -> Result<()> {
    let t = common::setup().await?;
    let token = common::login_as(&t.app, &t.pool, "mgr@example.com", "manager").await?;

    let resp = common::send(&t.app, "GET", "/admin/analytics/dashboard", Some(&token)).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let stats = common::body_json(resp).await?;
    assert_eq!(stats["total_sessions"], 0);
    assert_eq!(stats["unique_visitors"], 0);
    assert_eq!(stats["bounce_rate"], 0.0);
    assert_eq!(stats["conversion_rate"], 0.0);
    assert!(stats["top_pages"].as_array().unwrap().is_empty());
    assert!(stats["daily"].as_array().unwrap().is_empty());

    Ok(())
}

#[tokio::test]
async fn dashboard_reflects_tracked_activity() -> Result<()> {
    let t = common::setup().await?;

    // Two sessions: one engaged and converting, one single-view bounce.
    let resp = common::send_json(
        &t.app,
        "POST",
        "/api/track/sessions",
        None,
        json!({"visitor_id": "vis_1", "source_site": "siteA"}),
    )
    .await?;
    let engaged = common::body_json(resp).await?["id"].as_str().unwrap().to_string();

    for path in ["/", "/pricing"] {
        common::send_json(
            &t.app,
            "POST",
            &format!("/api/track/sessions/{engaged}/pageviews"),
            None,
            json!({"path": path, "dwell_seconds": 30, "scroll_depth": 70}),
        )
        .await?;
    }
    common::send_json(
        &t.app,
        "POST",
        &format!("/api/track/sessions/{engaged}/events"),
        None,
        json!({"event_type": "cta_click"}),
    )
    .await?;
    common::send_json(
        &t.app,
        "POST",
        "/api/leads",
        None,
        json!({
            "name": "Ada",
            "email": "ada@example.com",
            "message": "Quote please for the pricing tier we discussed.",
            "source_site": "siteA",
            "session_id": engaged
        }),
    )
    .await?;

    let resp = common::send_json(
        &t.app,
        "POST",
        "/api/track/sessions",
        None,
        json!({"visitor_id": "vis_2", "source_site": "siteA"}),
    )
    .await?;
    let bouncer = common::body_json(resp).await?["id"].as_str().unwrap().to_string();
    common::send_json(
        &t.app,
        "POST",
        &format!("/api/track/sessions/{bouncer}/pageviews"),
        None,
        json!({"path": "/", "dwell_seconds": 5, "scroll_depth": 10}),
    )
    .await?;

    let token = common::login_as(&t.app, &t.pool, "mgr@example.com", "manager").await?;
    let resp = common::send(&t.app, "GET", "/admin/analytics/dashboard", Some(&token)).await?;
    let stats = common::body_json(resp).await?;

    assert_eq!(stats["total_sessions"], 2);
    assert_eq!(stats["unique_visitors"], 2);
    assert_eq!(stats["bounce_rate"], 0.5);
    assert_eq!(stats["conversion_rate"], 0.5);
    assert_eq!(stats["top_pages"][0]["path"], "/");
    assert_eq!(stats["top_pages"][0]["views"], 2);

    // Source-site filter excludes everything else.
    let resp = common::send(
        &t.app,
        "GET",
        "/admin/analytics/dashboard?source_site=siteB",
        Some(&token),
    )
    .await?;
    let stats = common::body_json(resp).await?;
    assert_eq!(stats["total_sessions"], 0);

    Ok(())
}

#[tokio::test]
async fn sessions_list_requires_view_analytics() -> Result<()> {
    let t = common::setup().await?;
    let editor = common::login_as(&t.app, &t.pool, "ed@example.com", "editor").await?;

    let resp = common::send(&t.app, "GET", "/admin/analytics/sessions", Some(&editor)).await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    Ok(())
}
