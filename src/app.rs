use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{csrf, JwtConfig};
use crate::authz;
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::events::{self, EventBus};
use crate::mailer::Mailer;
use crate::routes::{
    activity, analytics, auth, health, leads, portfolio, posts, rbac, settings, track, users,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub config: Arc<AppConfig>,
    pub mailer: Mailer,
    pub event_bus: EventBus,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, config: AppConfig, event_bus: EventBus) -> Self {
        let mailer = Mailer::new(config.email.clone());
        Self {
            pool,
            jwt: Arc::new(jwt),
            config: Arc::new(config),
            mailer,
            event_bus,
        }
    }
}

pub async fn create_app(pool: SqlitePool, config: AppConfig) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;

    let (event_bus, rx) = events::init_event_bus();
    tokio::spawn(events::start_activity_listener(rx, pool.clone()));

    let state = AppState::new(pool, jwt_config, config, event_bus);

    let cors = build_cors(&state.config);

    let api_routes = Router::new()
        .route("/health", get(health::health))
        .route("/leads", post(leads::capture_lead))
        .route("/track/sessions", post(track::start_session))
        .route("/track/sessions/:id/pageviews", post(track::record_page_view))
        .route("/track/sessions/:id/events", post(track::record_event));

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let admin_routes = Router::new()
        .route("/leads", get(leads::list_leads))
        .route("/leads/:id", get(leads::get_lead))
        .route("/leads/:id", put(leads::update_lead))
        .route("/leads/:id", delete(leads::delete_lead))
        .route("/users", get(users::list_users))
        .route("/users", post(users::create_user))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id", put(users::update_user))
        .route("/users/:id", delete(users::delete_user))
        .route("/users/:id/permissions", get(users::effective_permissions))
        .route("/roles", get(rbac::list_roles))
        .route("/roles", post(rbac::create_role))
        .route("/roles/:id", get(rbac::get_role))
        .route("/roles/:id", put(rbac::update_role))
        .route("/roles/:id", delete(rbac::delete_role))
        .route("/permissions", get(rbac::list_permissions))
        .route("/permissions", post(rbac::create_permission))
        .route("/permissions/:id", put(rbac::update_permission))
        .route("/permissions/:id", delete(rbac::delete_permission))
        .route("/posts", get(posts::list_posts))
        .route("/posts", post(posts::create_post))
        .route("/posts/:id", get(posts::get_post))
        .route("/posts/:id", put(posts::update_post))
        .route("/posts/:id", delete(posts::delete_post))
        .route("/tags", get(posts::list_tags))
        .route("/tags", post(posts::create_tag))
        .route("/tags/:id", delete(posts::delete_tag))
        .route("/portfolio", get(portfolio::list_items))
        .route("/portfolio", post(portfolio::create_item))
        .route("/portfolio/:id", get(portfolio::get_item))
        .route("/portfolio/:id", put(portfolio::update_item))
        .route("/portfolio/:id", delete(portfolio::delete_item))
        .route("/settings", get(settings::list_settings))
        .route("/settings/:key", get(settings::get_setting))
        .route("/settings/:key", put(settings::upsert_setting))
        .route("/analytics/dashboard", get(analytics::dashboard))
        .route("/analytics/sessions", get(analytics::list_sessions))
        .route("/analytics/sessions/:id", get(analytics::get_session))
        .route("/activity", get(activity::recent_activity));

    // Layer order matters: trace and the IP blocklist wrap everything,
    // CSRF runs inside CORS so preflights never hit it.
    let router = Router::new()
        .nest("/api", api_routes)
        .nest("/auth", auth_routes)
        .nest("/admin", admin_routes)
        .layer(middleware::from_fn(csrf::csrf_middleware))
        .layer(cors)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            authz::ip_blocklist,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(router)
}

fn build_cors(config: &AppConfig) -> CorsLayer {
    // Credentials mode forbids the wildcard origin, so the allow-list is
    // materialized into explicit header values.
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_origin(origins)
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static(csrf::CSRF_HEADER),
        ])
        .allow_credentials(true)
}
