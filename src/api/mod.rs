use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{MethodRouter, delete, get, post, put},
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::{Config, UploadBackend};
use crate::state::SharedState;

mod admin;
pub mod auth;
mod error;
pub mod extract;
mod observability;
mod requests;
mod stats;
mod system;
mod templates;
mod types;
mod users;
mod validation;

pub use auth::Access;
pub use error::ApiError;
pub use types::*;

use crate::services::{
    AuthService, RequestService, StatsService, TemplateService, TokenService, UserAdminService,
};

/// Multipart envelope overhead allowed on top of the file limits.
const MULTIPART_HEADROOM: usize = 64 * 1024;
/// Files accepted in one request submission.
const MAX_ATTACHMENTS: usize = 10;
/// Images accepted in one bulk template upload.
const MAX_BULK_PREVIEWS: usize = 20;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.shared.tokens
    }

    #[must_use]
    pub fn auth_service(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth_service
    }

    #[must_use]
    pub fn template_service(&self) -> &Arc<dyn TemplateService> {
        &self.shared.template_service
    }

    #[must_use]
    pub fn request_service(&self) -> &Arc<dyn RequestService> {
        &self.shared.request_service
    }

    #[must_use]
    pub fn user_admin_service(&self) -> &Arc<dyn UserAdminService> {
        &self.shared.user_admin_service
    }

    #[must_use]
    pub fn stats_service(&self) -> &Arc<dyn StatsService> {
        &self.shared.stats_service
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

/// One entry of the route table under `/api`.
struct Route {
    path: &'static str,
    handler: MethodRouter<Arc<AppState>>,
    access: Access,
    body_limit: Option<usize>,
}

impl Route {
    fn new(path: &'static str, handler: MethodRouter<Arc<AppState>>, access: Access) -> Self {
        Self {
            path,
            handler,
            access,
            body_limit: None,
        }
    }

    fn limit(mut self, bytes: usize) -> Self {
        self.body_limit = Some(bytes);
        self
    }
}

/// Every endpoint with the roles allowed to call it.
fn routes(config: &Config) -> Vec<Route> {
    use Access::{Authenticated, Public, Roles};
    use auth::{ADMIN, AGENT, STAFF};

    let preview_limit = config.uploads.preview_max_bytes + MULTIPART_HEADROOM;
    let bulk_limit = config.uploads.preview_max_bytes * MAX_BULK_PREVIEWS + MULTIPART_HEADROOM;
    let attachment_limit = config.uploads.attachment_max_bytes + MULTIPART_HEADROOM;
    let submission_limit =
        config.uploads.attachment_max_bytes * MAX_ATTACHMENTS + MULTIPART_HEADROOM;

    vec![
        Route::new("/health", get(system::health), Public),
        Route::new("/metrics", get(observability::get_metrics), Roles(ADMIN)),
        // Accounts
        Route::new("/user/register", post(users::register), Public),
        Route::new("/user/login", post(users::login), Public),
        Route::new("/user/refresh", post(users::refresh), Public),
        Route::new("/user/forgot-password", post(users::forgot_password), Public),
        Route::new("/user/reset-password", post(users::reset_password), Public),
        Route::new("/user/me", get(users::me), Authenticated),
        Route::new("/user/update", put(users::update_profile), Authenticated),
        Route::new("/user/change-password", post(users::change_password), Authenticated),
        Route::new("/user/toggle-2fa", post(users::toggle_two_factor), Authenticated),
        Route::new("/user/stats", get(users::dashboard), Roles(AGENT)),
        Route::new("/user/users/{id}", delete(users::delete_user), Roles(ADMIN)),
        // Templates
        Route::new("/template", get(templates::list_templates), Authenticated),
        Route::new("/template/categories", get(templates::list_categories), Authenticated),
        Route::new("/template/{id}", get(templates::get_template), Authenticated),
        Route::new("/template", post(templates::create_template), Roles(ADMIN)).limit(preview_limit),
        Route::new("/template/{id}", put(templates::update_template), Roles(ADMIN)).limit(preview_limit),
        Route::new("/template/{id}", delete(templates::delete_template), Roles(ADMIN)),
        Route::new("/template/bulk", post(templates::bulk_create_templates), Roles(ADMIN))
            .limit(bulk_limit),
        // Requests
        Route::new("/request", get(requests::list_requests), Authenticated),
        Route::new("/request/stats", get(requests::request_stats), Authenticated),
        Route::new("/request", post(requests::create_request), Roles(AGENT)).limit(submission_limit),
        Route::new("/request/{id}", get(requests::get_request), Authenticated),
        Route::new("/request/{id}", put(requests::update_request), Authenticated),
        Route::new("/request/{id}/status", put(requests::update_status), Roles(STAFF)),
        Route::new("/request/{id}/files", post(requests::attach_file), Roles(STAFF))
            .limit(attachment_limit),
        Route::new(
            "/request/{id}/files/{file_id}",
            delete(requests::delete_file),
            Authenticated,
        ),
        // User administration
        Route::new("/admin/stats", get(admin::user_counts), Roles(ADMIN)),
        Route::new("/admin", get(admin::list_users), Roles(ADMIN)),
        Route::new("/admin", post(admin::create_user), Roles(ADMIN)),
        Route::new("/admin/{id}", get(admin::get_user), Roles(ADMIN)),
        Route::new("/admin/{id}", put(admin::update_user), Roles(ADMIN)),
        Route::new("/admin/{id}", delete(admin::delete_user), Roles(ADMIN)),
        Route::new("/admin/{id}/reset-password", post(admin::reset_password), Roles(ADMIN)),
        Route::new("/admin/{id}/toggle-active", post(admin::toggle_active), Roles(ADMIN)),
        // Statistics
        Route::new("/stats/view", get(stats::overview), Authenticated),
        Route::new("/stats/users", get(stats::users), Authenticated),
        Route::new("/stats/templates", get(stats::templates), Authenticated),
        Route::new("/stats/requests", get(stats::requests), Authenticated),
    ]
}

fn api_router(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    routes(state.config())
        .into_iter()
        .fold(Router::new(), |router, route| {
            let mut handler = route.handler;

            // route_layer wraps outward: roles are checked after auth.
            if let Access::Roles(allowed) = route.access {
                handler = handler.route_layer(middleware::from_fn_with_state(
                    allowed,
                    auth::require_roles,
                ));
            }
            if route.access != Access::Public {
                handler = handler.route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth::require_auth,
                ));
            }
            if let Some(bytes) = route.body_limit {
                handler = handler.layer(DefaultBodyLimit::max(bytes));
            }

            router.route(route.path, handler)
        })
        .route_layer(middleware::from_fn(observability::logging_middleware))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = if origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };
    layer.allow_methods(Any).allow_headers(Any)
}

pub fn router(state: Arc<AppState>) -> Router {
    let config = state.config();
    let cors = cors_layer(&config.server.cors_allowed_origins);
    let local_uploads =
        (config.uploads.backend == UploadBackend::Local).then(|| config.uploads.local_dir.clone());

    let mut app = Router::new()
        .route("/", get(system::root))
        .nest("/api", api_router(&state));

    if let Some(dir) = local_uploads {
        app = app.nest_service("/uploads", ServeDir::new(dir));
    }

    app.with_state(state)
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
