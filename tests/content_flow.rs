use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

mod common;

#[tokio::test]
async fn post_lifecycle_with_tags() -> Result<()> {
    let t = common::setup().await?;
    let token = common::login_as(&t.app, &t.pool, "ed@example.com", "editor").await?;

    let resp = common::send_json(
        &t.app,
        "POST",
        "/admin/tags",
        Some(&token),
        json!({"name": "Case Studies"}),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let tag = common::body_json(resp).await?;
    assert_eq!(tag["slug"], "case-studies");

    let resp = common::send_json(
        &t.app,
        "POST",
        "/admin/posts",
        Some(&token),
        json!({
            "title": "How we rebuilt siteA",
            "body": "Long form content.",
            "site": "siteA",
            "published": true,
            "tags": ["case-studies"]
        }),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let post = common::body_json(resp).await?;
    let post_id = post["id"].as_str().unwrap().to_string();
    assert_eq!(post["slug"], "how-we-rebuilt-sitea");
    assert_eq!(post["tags"], json!(["case-studies"]));

    // Updating with an explicit tag list replaces the whole set.
    let resp = common::send_json(
        &t.app,
        "PUT",
        &format!("/admin/posts/{post_id}"),
        Some(&token),
        json!({"title": "How we rebuilt siteA (2026)", "tags": []}),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated = common::body_json(resp).await?;
    assert_eq!(updated["tags"], json!([]));
    // The slug is stable across renames.
    assert_eq!(updated["slug"], "how-we-rebuilt-sitea");

    let resp = common::send(
        &t.app,
        "DELETE",
        &format!("/admin/posts/{post_id}"),
        Some(&token),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    // Soft-deleted posts vanish from reads.
    let resp = common::send(&t.app, "GET", &format!("/admin/posts/{post_id}"), Some(&token)).await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = common::send(&t.app, "GET", "/admin/posts", Some(&token)).await?;
    let list = common::body_json(resp).await?;
    assert!(list.as_array().unwrap().is_empty());

    Ok(())
}

#[tokio::test]
async fn unknown_tag_rejects_the_post() -> Result<()> {
    let t = common::setup().await?;
    let token = common::login_as(&t.app, &t.pool, "ed@example.com", "editor").await?;

    let resp = common::send_json(
        &t.app,
        "POST",
        "/admin/posts",
        Some(&token),
        json!({
            "title": "Orphan",
            "body": "x",
            "site": "siteA",
            "tags": ["does-not-exist"]
        }),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn duplicate_slugs_conflict() -> Result<()> {
    let t = common::setup().await?;
    let token = common::login_as(&t.app, &t.pool, "ed@example.com", "editor").await?;

    let payload = json!({"title": "Pricing update", "body": "x", "site": "siteA"});
    let resp = common::send_json(&t.app, "POST", "/admin/posts", Some(&token), payload.clone()).await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let resp = common::send_json(&t.app, "POST", "/admin/posts", Some(&token), payload).await?;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = common::send_json(&t.app, "POST", "/admin/tags", Some(&token), json!({"name": "News"})).await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let resp = common::send_json(&t.app, "POST", "/admin/tags", Some(&token), json!({"name": "News"})).await?;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    Ok(())
}

#[tokio::test]
async fn viewers_read_but_cannot_write_content() -> Result<()> {
    let t = common::setup().await?;
    let viewer = common::login_as(&t.app, &t.pool, "vw@example.com", "viewer").await?;

    let resp = common::send(&t.app, "GET", "/admin/posts", Some(&viewer)).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = common::send_json(
        &t.app,
        "POST",
        "/admin/tags",
        Some(&viewer),
        json!({"name": "Nope"}),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn portfolio_lists_in_sort_order_and_soft_deletes() -> Result<()> {
    let t = common::setup().await?;
    let token = common::login_as(&t.app, &t.pool, "ed@example.com", "editor").await?;

    for (title, order) in [("Second", 1), ("First", 0), ("Third", 2)] {
        let resp = common::send_json(
            &t.app,
            "POST",
            "/admin/portfolio",
            Some(&token),
            json!({"title": title, "site": "siteB", "sort_order": order}),
        )
        .await?;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let resp = common::send(&t.app, "GET", "/admin/portfolio", Some(&token)).await?;
    let list = common::body_json(resp).await?;
    let titles: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|item| item["title"].as_str())
        .collect();
    assert_eq!(titles, vec!["First", "Second", "Third"]);

    let first_id = list[0]["id"].as_str().unwrap().to_string();
    let resp = common::send(
        &t.app,
        "DELETE",
        &format!("/admin/portfolio/{first_id}"),
        Some(&token),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = common::send(&t.app, "GET", "/admin/portfolio", Some(&token)).await?;
    let list = common::body_json(resp).await?;
    assert_eq!(list.as_array().unwrap().len(), 2);

    Ok(())
}
