use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

mod common;

#[tokio::test]
async fn capture_validates_fields() -> Result<()> {
    let t = common::setup().await?;

    let resp = common::send_json(
        &t.app,
        "POST",
        "/api/leads",
        None,
        json!({
            "name": "",
            "email": "not-an-email",
            "message": "",
            "source_site": "siteA",
            "locale": "fr"
        }),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = common::body_json(resp).await?;
    let errors = body["errors"].as_object().expect("field error map");
    assert!(errors.contains_key("name"));
    assert!(errors.contains_key("email"));
    assert!(errors.contains_key("message"));
    assert!(errors.contains_key("locale"));

    Ok(())
}

#[tokio::test]
async fn capture_succeeds_with_email_provider_disabled() -> Result<()> {
    // EMAIL_ENABLED is unset in tests, so the notification path is a no-op.
    let t = common::setup().await?;

    let resp = common::send_json(
        &t.app,
        "POST",
        "/api/leads",
        None,
        json!({
            "name": "Ada Lovelace",
            "email": "ada@example.com",
            "message": "I would like a quote for a site redesign.",
            "source_site": "siteA",
            "locale": "es"
        }),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let lead = common::body_json(resp).await?;
    assert_eq!(lead["status"], "new");
    assert_eq!(lead["is_spam"], false);
    assert_eq!(lead["locale"], "es");

    Ok(())
}

#[tokio::test]
async fn honeypot_marks_lead_as_spam_but_stores_it() -> Result<()> {
    let t = common::setup().await?;

    let resp = common::send_json(
        &t.app,
        "POST",
        "/api/leads",
        None,
        json!({
            "name": "Bot",
            "email": "bot@example.com",
            "message": "hello there",
            "source_site": "siteA",
            "website": "http://spam.example"
        }),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let lead = common::body_json(resp).await?;
    assert_eq!(lead["is_spam"], true);
    assert!(lead["spam_score"].as_i64().unwrap() >= 50);

    // Spam is hidden from the default admin listing.
    let token = common::login_as(&t.app, &t.pool, "mgr@example.com", "manager").await?;
    let resp = common::send(&t.app, "GET", "/admin/leads", Some(&token)).await?;
    let listed = common::body_json(resp).await?;
    assert!(listed.as_array().unwrap().is_empty());

    let resp = common::send(&t.app, "GET", "/admin/leads?include_spam=true", Some(&token)).await?;
    let listed = common::body_json(resp).await?;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    Ok(())
}

#[tokio::test]
async fn capture_links_session_and_completes_form_milestone() -> Result<()> {
    let t = common::setup().await?;

    let resp = common::send_json(
        &t.app,
        "POST",
        "/api/track/sessions",
        None,
        json!({"visitor_id": "vis_1", "source_site": "siteA"}),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let session = common::body_json(resp).await?;
    let session_id = session["id"].as_str().unwrap().to_string();

    let resp = common::send_json(
        &t.app,
        "POST",
        "/api/leads",
        None,
        json!({
            "name": "Grace",
            "email": "grace@example.com",
            "message": "Tell me more about your services please.",
            "source_site": "siteA",
            "session_id": session_id
        }),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let (completed, score): (bool, i64) = sqlx::query_as(
        "SELECT completed_form, intent_score FROM visitor_sessions WHERE id = ?",
    )
    .bind(&session_id)
    .fetch_one(&t.pool)
    .await?;
    assert!(completed);
    assert!(score > 0, "form completion should raise the intent score");

    Ok(())
}

#[tokio::test]
async fn update_and_delete_respect_permission_split() -> Result<()> {
    let t = common::setup().await?;

    let resp = common::send_json(
        &t.app,
        "POST",
        "/api/leads",
        None,
        json!({
            "name": "Lin",
            "email": "lin@example.com",
            "message": "Looking for a maintenance retainer.",
            "source_site": "siteB"
        }),
    )
    .await?;
    let lead = common::body_json(resp).await?;
    let lead_id = lead["id"].as_str().unwrap().to_string();

    // Viewers can read but not mutate.
    let viewer = common::login_as(&t.app, &t.pool, "ro@example.com", "viewer").await?;
    let resp = common::send(&t.app, "GET", &format!("/admin/leads/{lead_id}"), Some(&viewer)).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = common::send_json(
        &t.app,
        "PUT",
        &format!("/admin/leads/{lead_id}"),
        Some(&viewer),
        json!({"status": "contacted"}),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // Managers hold edit-leads and delete-leads.
    let mgr = common::login_as(&t.app, &t.pool, "mgr@example.com", "manager").await?;
    let resp = common::send_json(
        &t.app,
        "PUT",
        &format!("/admin/leads/{lead_id}"),
        Some(&mgr),
        json!({"status": "contacted"}),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated = common::body_json(resp).await?;
    assert_eq!(updated["status"], "contacted");

    let resp = common::send(&t.app, "DELETE", &format!("/admin/leads/{lead_id}"), Some(&mgr)).await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = common::send(&t.app, "GET", &format!("/admin/leads/{lead_id}"), Some(&mgr)).await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn invalid_status_transition_is_rejected() -> Result<()> {
    let t = common::setup().await?;

    let resp = common::send_json(
        &t.app,
        "POST",
        "/api/leads",
        None,
        json!({
            "name": "Sam",
            "email": "sam@example.com",
            "message": "Need a landing page next month.",
            "source_site": "siteA"
        }),
    )
    .await?;
    let lead = common::body_json(resp).await?;
    let lead_id = lead["id"].as_str().unwrap().to_string();

    let mgr = common::login_as(&t.app, &t.pool, "mgr@example.com", "manager").await?;
    let resp = common::send_json(
        &t.app,
        "PUT",
        &format!("/admin/leads/{lead_id}"),
        Some(&mgr),
        json!({"status": "eaten-by-bears"}),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    Ok(())
}
