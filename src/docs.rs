use std::sync::Arc;

use axum::{routing::get, Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::{analytics, intent, models, routes};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health,
        routes::auth::login,
        routes::auth::logout,
        routes::auth::me,
        routes::leads::capture_lead,
        routes::leads::list_leads,
        routes::leads::get_lead,
        routes::leads::update_lead,
        routes::leads::delete_lead,
        routes::track::start_session,
        routes::track::record_page_view,
        routes::track::record_event,
        routes::users::list_users,
        routes::users::create_user,
        routes::users::get_user,
        routes::users::update_user,
        routes::users::delete_user,
        routes::users::effective_permissions,
        routes::rbac::list_roles,
        routes::rbac::create_role,
        routes::rbac::get_role,
        routes::rbac::update_role,
        routes::rbac::delete_role,
        routes::rbac::list_permissions,
        routes::rbac::create_permission,
        routes::rbac::update_permission,
        routes::rbac::delete_permission,
        routes::posts::list_posts,
        routes::posts::create_post,
        routes::posts::get_post,
        routes::posts::update_post,
        routes::posts::delete_post,
        routes::posts::list_tags,
        routes::posts::create_tag,
        routes::posts::delete_tag,
        routes::portfolio::list_items,
        routes::portfolio::create_item,
        routes::portfolio::get_item,
        routes::portfolio::update_item,
        routes::portfolio::delete_item,
        routes::settings::list_settings,
        routes::settings::get_setting,
        routes::settings::upsert_setting,
        routes::analytics::dashboard,
        routes::analytics::list_sessions,
        routes::analytics::get_session,
        routes::activity::recent_activity,
    ),
    components(
        schemas(
            models::user::User,
            models::user::UserWithRoles,
            models::user::UserCreateRequest,
            models::user::UserUpdateRequest,
            models::user::LoginRequest,
            models::user::AuthResponse,
            models::user::MeResponse,
            models::rbac::Role,
            models::rbac::RoleDetails,
            models::rbac::RoleCreateRequest,
            models::rbac::RoleUpdateRequest,
            models::rbac::Permission,
            models::rbac::PermissionDetails,
            models::rbac::PermissionCreateRequest,
            models::rbac::PermissionUpdateRequest,
            models::lead::Lead,
            models::lead::LeadCaptureRequest,
            models::lead::LeadUpdateRequest,
            models::visitor::VisitorSession,
            models::visitor::SessionDetails,
            models::visitor::SessionStartRequest,
            models::visitor::PageViewRequest,
            models::visitor::VisitorEventRequest,
            models::content::Post,
            models::content::PostWithTags,
            models::content::PostCreateRequest,
            models::content::PostUpdateRequest,
            models::content::PostTag,
            models::content::TagCreateRequest,
            models::content::PortfolioItem,
            models::content::PortfolioCreateRequest,
            models::content::PortfolioUpdateRequest,
            models::settings::Setting,
            models::settings::SettingUpsertRequest,
            models::lead::LeadStatus,
            models::visitor::SessionStatus,
            models::visitor::PageView,
            models::visitor::VisitorEvent,
            intent::IntentLevel,
            intent::ScoringConfig,
            analytics::DashboardStats,
            analytics::PageCount,
            analytics::DailyPoint,
            analytics::TierDistribution,
            routes::health::HealthResponse,
            routes::auth::MessageResponse,
            routes::users::EffectivePermissionsResponse,
            routes::activity::ActivityEntry,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Leads", description = "Lead capture and management"),
        (name = "Tracking", description = "Visitor session ingest"),
        (name = "Users", description = "Back-office users"),
        (name = "RBAC", description = "Roles and permissions"),
        (name = "Content", description = "Posts, tags and portfolio"),
        (name = "Settings", description = "Application settings"),
        (name = "Analytics", description = "Visitor analytics"),
        (name = "Activity", description = "Audit trail"),
    )
)]
pub struct ApiDoc;

pub fn swagger_routes() -> Router {
    let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
        .try_it_out_enabled(true)
        .with_credentials(true)
        .persist_authorization(true);

    let doc_json = Arc::new(
        serde_json::to_value(&ApiDoc::openapi()).expect("OpenAPI serialization must succeed"),
    );

    let json_route = {
        let doc_json = Arc::clone(&doc_json);
        get(move || {
            let doc_json = Arc::clone(&doc_json);
            async move { Json((*doc_json).clone()) }
        })
    };

    Router::new()
        .route("/api-docs/openapi.json", json_route)
        .merge(SwaggerUi::new("/docs").config(swagger_config))
}
