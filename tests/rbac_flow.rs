use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

mod common;

#[tokio::test]
async fn role_lifecycle_with_permission_replacement() -> Result<()> {
    let t = common::setup().await?;
    let token = common::login_as(&t.app, &t.pool, "root@example.com", "super-admin").await?;

    // Create a custom role with an initial permission set.
    let resp = common::send_json(
        &t.app,
        "POST",
        "/admin/roles",
        Some(&token),
        json!({
            "name": "Sales",
            "level": 20,
            "permissions": ["view-leads", "edit-leads"]
        }),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let role = common::body_json(resp).await?;
    let role_id = role["id"].as_str().unwrap().to_string();
    assert_eq!(role["slug"], "sales");

    // Replace the permission set atomically.
    let resp = common::send_json(
        &t.app,
        "PUT",
        &format!("/admin/roles/{role_id}"),
        Some(&token),
        json!({"permissions": ["view-leads", "view-analytics"]}),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = common::send(&t.app, "GET", &format!("/admin/roles/{role_id}"), Some(&token)).await?;
    let details = common::body_json(resp).await?;
    let mut perms: Vec<String> = details["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str().map(String::from))
        .collect();
    perms.sort();
    assert_eq!(perms, vec!["view-analytics", "view-leads"]);

    // A member of the role picks up the new set and loses the old one.
    let sales_token = common::login_as(&t.app, &t.pool, "sales@example.com", "sales").await?;
    let resp = common::send(&t.app, "GET", "/admin/leads", Some(&sales_token)).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = common::send(
        &t.app,
        "GET",
        "/admin/leads/00000000-0000-0000-0000-000000000000",
        Some(&sales_token),
    )
    .await?;
    // view-leads still grants reads (404 for the bogus id, not 403).
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn unknown_permission_slug_fails_role_creation() -> Result<()> {
    let t = common::setup().await?;
    let token = common::login_as(&t.app, &t.pool, "root@example.com", "super-admin").await?;

    let resp = common::send_json(
        &t.app,
        "POST",
        "/admin/roles",
        Some(&token),
        json!({"name": "Ghost", "permissions": ["no-such-permission"]}),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // Nothing was created.
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles WHERE slug = 'ghost'")
        .fetch_one(&t.pool)
        .await?;
    assert_eq!(count, 0);

    Ok(())
}

#[tokio::test]
async fn system_roles_are_protected() -> Result<()> {
    let t = common::setup().await?;
    let token = common::login_as(&t.app, &t.pool, "root@example.com", "super-admin").await?;

    let editor_id: String = sqlx::query_scalar("SELECT id FROM roles WHERE slug = 'editor'")
        .fetch_one(&t.pool)
        .await?;

    let resp = common::send(
        &t.app,
        "DELETE",
        &format!("/admin/roles/{editor_id}"),
        Some(&token),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = common::send_json(
        &t.app,
        "PUT",
        &format!("/admin/roles/{editor_id}"),
        Some(&token),
        json!({"name": "Renamed"}),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn super_admin_slug_is_reserved() -> Result<()> {
    let t = common::setup().await?;
    let token = common::login_as(&t.app, &t.pool, "root@example.com", "super-admin").await?;

    let resp = common::send_json(
        &t.app,
        "POST",
        "/admin/roles",
        Some(&token),
        json!({"name": "Super Admin"}),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    Ok(())
}

#[tokio::test]
async fn deleting_permission_removes_it_from_effective_sets() -> Result<()> {
    let t = common::setup().await?;
    let root = common::login_as(&t.app, &t.pool, "root@example.com", "super-admin").await?;
    let mgr = common::login_as(&t.app, &t.pool, "mgr@example.com", "manager").await?;

    // Manager can read leads today.
    let resp = common::send(&t.app, "GET", "/admin/leads", Some(&mgr)).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let perm_id: String = sqlx::query_scalar("SELECT id FROM permissions WHERE slug = 'view-leads'")
        .fetch_one(&t.pool)
        .await?;
    let resp = common::send(
        &t.app,
        "DELETE",
        &format!("/admin/permissions/{perm_id}"),
        Some(&root),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    // The grant disappears from every role on the next request.
    let resp = common::send(&t.app, "GET", "/admin/leads", Some(&mgr)).await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn referenced_permission_slug_is_immutable() -> Result<()> {
    let t = common::setup().await?;
    let token = common::login_as(&t.app, &t.pool, "root@example.com", "super-admin").await?;

    let perm_id: String =
        sqlx::query_scalar("SELECT id FROM permissions WHERE slug = 'view-content'")
            .fetch_one(&t.pool)
            .await?;

    let resp = common::send_json(
        &t.app,
        "PUT",
        &format!("/admin/permissions/{perm_id}"),
        Some(&token),
        json!({"slug": "read-content"}),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    // Renaming the display name alone is fine.
    let resp = common::send_json(
        &t.app,
        "PUT",
        &format!("/admin/permissions/{perm_id}"),
        Some(&token),
        json!({"name": "Read content"}),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    Ok(())
}
