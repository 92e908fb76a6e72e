// MenCryToo - community social-support backend

pub mod app_state;
pub mod config;
pub mod entities;
pub mod error;
pub mod framework;
pub mod infrastructure;
pub mod routes;
pub mod services;

use axum::{extract::DefaultBodyLimit, middleware::from_fn_with_state, Router};
use std::path::PathBuf;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::app_state::AppState;
use crate::infrastructure::middleware::viewer_context_middleware;

pub use error::{AppError, AppResult};

/// Slack above the image cap so multipart text fields still fit.
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

/// The whole HTTP surface: the JSON API, uploaded images and the SPA shell.
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    let api = routes::api_router().layer(from_fn_with_state(state.clone(), viewer_context_middleware));

    let static_dir = PathBuf::from(&config.server.static_dir);
    let spa = ServeDir::new(&static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    let mut app = Router::new().nest("/api", api);
    if config.storage.public_url.starts_with('/') {
        app = app.nest_service(&config.storage.public_url, ServeDir::new(&config.storage.upload_dir));
    }

    let mut app = app
        .fallback_service(spa)
        .layer(DefaultBodyLimit::max(config.storage.max_upload_bytes + BODY_LIMIT_SLACK))
        .layer(TraceLayer::new_for_http());
    if !config.is_production() {
        app = app.layer(CorsLayer::permissive());
    }

    app.with_state(state)
}
