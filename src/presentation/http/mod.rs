//! HTTP presentation layer
//!
//! Application state, routing, handlers, middleware, the response
//! builder, and the range adapter.

pub mod handlers;
pub mod middleware;
pub mod range;
pub mod response;

use axum::{
    extract::FromRef,
    routing::get,
    Router,
};
use std::sync::Arc;

use crate::application::use_cases::transform_video::TransformVideoUseCase;
use crate::infrastructure::config::ConfigManager;
use crate::infrastructure::tasks::BackgroundScheduler;
use handlers::admin_handlers::{self, AdminToken};
use handlers::{health_handlers, video_handlers};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConfigManager>,
    pub use_case: Arc<TransformVideoUseCase>,
    pub scheduler: Arc<BackgroundScheduler>,
    pub admin_token: AdminToken,
}

impl FromRef<AppState> for Arc<ConfigManager> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<TransformVideoUseCase> {
    fn from_ref(state: &AppState) -> Self {
        state.use_case.clone()
    }
}

impl FromRef<AppState> for Arc<BackgroundScheduler> {
    fn from_ref(state: &AppState) -> Self {
        state.scheduler.clone()
    }
}

impl FromRef<AppState> for AdminToken {
    fn from_ref(state: &AppState) -> Self {
        state.admin_token.clone()
    }
}

/// Builds the gateway router
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health check (must stay cheap; no pipeline involvement)
        .route("/health", get(health_handlers::health_check))
        // Config administration
        .route(
            "/admin/config",
            get(admin_handlers::get_config).post(admin_handlers::update_config),
        )
        // Every other path is a video request
        .route("/*path", get(video_handlers::serve_video))
        .layer(axum::middleware::from_fn(
            middleware::logging::logging_middleware,
        ))
        .layer(middleware::cors::cors_layer())
        .with_state(state)
}
