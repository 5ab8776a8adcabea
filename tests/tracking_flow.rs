use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

mod common;

async fn start_session(t: &common::TestApp, visitor: &str) -> Result<String> {
    let resp = common::send_json(
        &t.app,
        "POST",
        "/api/track/sessions",
        None,
        json!({"visitor_id": visitor, "source_site": "siteA"}),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let session = common::body_json(resp).await?;
    Ok(session["id"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn fresh_session_is_cold_and_active() -> Result<()> {
    let t = common::setup().await?;

    let resp = common::send_json(
        &t.app,
        "POST",
        "/api/track/sessions",
        None,
        json!({"visitor_id": "vis_a", "source_site": "siteA"}),
    )
    .await?;
    let session = common::body_json(resp).await?;
    assert_eq!(session["status"], "active");
    assert_eq!(session["intent_level"], "cold");
    assert_eq!(session["intent_score"], 0);
    assert_eq!(session["is_returning"], false);

    Ok(())
}

#[tokio::test]
async fn second_session_for_visitor_is_returning() -> Result<()> {
    let t = common::setup().await?;

    start_session(&t, "vis_b").await?;
    let resp = common::send_json(
        &t.app,
        "POST",
        "/api/track/sessions",
        None,
        json!({"visitor_id": "vis_b", "source_site": "siteA", "is_returning": false}),
    )
    .await?;
    let session = common::body_json(resp).await?;
    // Prior history wins over the client's claim.
    assert_eq!(session["is_returning"], true);
    assert!(session["intent_score"].as_i64().unwrap() > 0);

    Ok(())
}

#[tokio::test]
async fn pricing_page_view_sets_milestone_and_raises_score() -> Result<()> {
    let t = common::setup().await?;
    let session_id = start_session(&t, "vis_c").await?;

    let resp = common::send_json(
        &t.app,
        "POST",
        &format!("/api/track/sessions/{session_id}/pageviews"),
        None,
        json!({"path": "/pricing", "dwell_seconds": 30, "scroll_depth": 80}),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let session = common::body_json(resp).await?;
    assert_eq!(session["visited_pricing"], true);
    assert!(session["intent_score"].as_i64().unwrap() > 0);

    Ok(())
}

#[tokio::test]
async fn scroll_depth_is_validated() -> Result<()> {
    let t = common::setup().await?;
    let session_id = start_session(&t, "vis_d").await?;

    let resp = common::send_json(
        &t.app,
        "POST",
        &format!("/api/track/sessions/{session_id}/pageviews"),
        None,
        json!({"path": "/", "scroll_depth": 150}),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn form_submit_event_flips_completed_form() -> Result<()> {
    let t = common::setup().await?;
    let session_id = start_session(&t, "vis_e").await?;

    let resp = common::send_json(
        &t.app,
        "POST",
        &format!("/api/track/sessions/{session_id}/events"),
        None,
        json!({"event_type": "form_submit"}),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let session = common::body_json(resp).await?;
    assert_eq!(session["completed_form"], true);
    // Completed implies started in the scoring model.
    assert!(session["intent_score"].as_i64().unwrap() >= 25);

    Ok(())
}

#[tokio::test]
async fn score_never_drops_as_activity_accumulates() -> Result<()> {
    let t = common::setup().await?;
    let session_id = start_session(&t, "vis_mono").await?;

    let mut last_score = 0i64;
    for (path, event) in [
        ("/", None),
        ("/services", None),
        ("/pricing", Some("cta_click")),
        ("/portfolio", Some("video_play")),
        ("/contact", Some("form_submit")),
    ] {
        let resp = common::send_json(
            &t.app,
            "POST",
            &format!("/api/track/sessions/{session_id}/pageviews"),
            None,
            json!({"path": path, "dwell_seconds": 60, "scroll_depth": 90}),
        )
        .await?;
        let session = common::body_json(resp).await?;
        let score = session["intent_score"].as_i64().unwrap();
        assert!(score >= last_score, "score dropped after viewing {path}");
        last_score = score;

        if let Some(event_type) = event {
            let resp = common::send_json(
                &t.app,
                "POST",
                &format!("/api/track/sessions/{session_id}/events"),
                None,
                json!({"event_type": event_type}),
            )
            .await?;
            let session = common::body_json(resp).await?;
            let score = session["intent_score"].as_i64().unwrap();
            assert!(score >= last_score, "score dropped after {event_type}");
            last_score = score;
        }
    }

    assert!(last_score <= 100);
    Ok(())
}

#[tokio::test]
async fn unknown_session_is_not_found() -> Result<()> {
    let t = common::setup().await?;

    let resp = common::send_json(
        &t.app,
        "POST",
        "/api/track/sessions/00000000-0000-0000-0000-000000000000/pageviews",
        None,
        json!({"path": "/"}),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn session_detail_includes_views_and_events() -> Result<()> {
    let t = common::setup().await?;
    let session_id = start_session(&t, "vis_f").await?;

    for path in ["/", "/services", "/pricing"] {
        common::send_json(
            &t.app,
            "POST",
            &format!("/api/track/sessions/{session_id}/pageviews"),
            None,
            json!({"path": path, "dwell_seconds": 20, "scroll_depth": 50}),
        )
        .await?;
    }
    common::send_json(
        &t.app,
        "POST",
        &format!("/api/track/sessions/{session_id}/events"),
        None,
        json!({"event_type": "cta_click"}),
    )
    .await?;

    let token = common::login_as(&t.app, &t.pool, "mgr@example.com", "manager").await?;
    let resp = common::send(
        &t.app,
        "GET",
        &format!("/admin/analytics/sessions/{session_id}"),
        Some(&token),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let detail = common::body_json(resp).await?;
    assert_eq!(detail["page_views"].as_array().unwrap().len(), 3);
    assert_eq!(detail["events"].as_array().unwrap().len(), 1);
    assert_eq!(detail["visited_services"], true);
    assert_eq!(detail["visited_pricing"], true);
    assert_eq!(detail["clicked_cta"], true);

    Ok(())
}

#[tokio::test]
async fn bounce_flag_follows_session_activity() -> Result<()> {
    let t = common::setup().await?;
    let token = common::login_as(&t.app, &t.pool, "mgr@example.com", "manager").await?;

    let detail = |session_id: String, token: String| {
        let app = t.app.clone();
        async move {
            let resp = common::send(
                &app,
                "GET",
                &format!("/admin/analytics/sessions/{session_id}"),
                Some(&token),
            )
            .await?;
            assert_eq!(resp.status(), StatusCode::OK);
            common::body_json(resp).await
        }
    };

    // A lone page view is the session's bounce.
    let session_id = start_session(&t, "vis_g").await?;
    common::send_json(
        &t.app,
        "POST",
        &format!("/api/track/sessions/{session_id}/pageviews"),
        None,
        json!({"path": "/", "dwell_seconds": 5, "scroll_depth": 10}),
    )
    .await?;
    let body = detail(session_id.clone(), token.clone()).await?;
    assert_eq!(body["page_views"][0]["is_bounce"], true);

    // A second view clears the flag everywhere.
    common::send_json(
        &t.app,
        "POST",
        &format!("/api/track/sessions/{session_id}/pageviews"),
        None,
        json!({"path": "/services", "dwell_seconds": 5, "scroll_depth": 10}),
    )
    .await?;
    let body = detail(session_id, token.clone()).await?;
    let views = body["page_views"].as_array().unwrap();
    assert_eq!(views.len(), 2);
    assert!(views.iter().all(|view| view["is_bounce"] == false));

    // An interaction event alone also disqualifies the bounce.
    let engaged = start_session(&t, "vis_h").await?;
    common::send_json(
        &t.app,
        "POST",
        &format!("/api/track/sessions/{engaged}/pageviews"),
        None,
        json!({"path": "/", "dwell_seconds": 5, "scroll_depth": 10}),
    )
    .await?;
    common::send_json(
        &t.app,
        "POST",
        &format!("/api/track/sessions/{engaged}/events"),
        None,
        json!({"event_type": "cta_click"}),
    )
    .await?;
    let body = detail(engaged, token).await?;
    assert_eq!(body["page_views"][0]["is_bounce"], false);

    Ok(())
}
