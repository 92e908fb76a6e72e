// HTTP surface under /api
// Handlers open one transaction, call services with it, and commit before releasing images.

pub mod auth;
pub mod comments;
pub mod events;
pub mod groups;
pub mod inquiries;
pub mod posts;
pub mod tags;
pub mod users;

use axum::{http::StatusCode, Json, Router};
use serde::Serialize;

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::Tx;
use crate::infrastructure::storage::release_all;
use crate::services::Outcome;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/groups", groups::router())
        .nest("/events", events::router())
        .nest("/event-images", events::image_router())
        .nest("/venues", groups::venue_router())
        .nest("/posts", posts::router())
        .nest("/comments", comments::router())
        .nest("/tags", tags::router())
        .nest("/partnerships", inquiries::partnership_router())
        .nest("/contact", inquiries::contact_router())
        .fallback(api_not_found)
}

async fn api_not_found() -> AppError {
    AppError::NotFound("Resource couldn't be found".to_string())
}

/// Commit, then release whatever stored objects the mutation orphaned.
pub(crate) async fn finish<T>(state: &AppState, tx: Tx, outcome: Outcome<T>) -> AppResult<T> {
    tx.commit().await?;
    release_all(state.images.as_ref(), outcome.release).await;
    Ok(outcome.value)
}

pub(crate) fn created<T: Serialize>(value: T) -> (StatusCode, Json<T>) {
    (StatusCode::CREATED, Json(value))
}

#[derive(Debug, Serialize)]
pub(crate) struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}
