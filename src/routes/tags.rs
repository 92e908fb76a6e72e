// /api/tags - the interest tag registry

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::entities::ent_tag::TagUsage;
use crate::entities::EntTag;
use crate::error::AppResult;
use crate::services::identity_service;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tags))
        .route("/popular", get(popular))
        .route("/search", get(search))
        .route("/user/{user_id}", get(user_tags))
        .route("/{id}", get(fetch_tag))
}

#[derive(Debug, Default, Deserialize)]
pub struct PopularQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

async fn list_tags(State(state): State<AppState>) -> AppResult<Json<Vec<EntTag>>> {
    let mut tx = state.db.begin().await?;
    let tags = identity_service::list_tags(&mut tx).await?;
    tx.commit().await?;
    Ok(Json(tags))
}

async fn fetch_tag(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<TagUsage>> {
    let mut tx = state.db.begin().await?;
    let tag = identity_service::fetch_tag(&mut tx, id).await?;
    tx.commit().await?;
    Ok(Json(tag))
}

async fn popular(
    State(state): State<AppState>,
    Query(query): Query<PopularQuery>,
) -> AppResult<Json<Vec<TagUsage>>> {
    let mut tx = state.db.begin().await?;
    let tags = identity_service::popular_tags(&mut tx, query.limit).await?;
    tx.commit().await?;
    Ok(Json(tags))
}

async fn search(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> AppResult<Json<Vec<EntTag>>> {
    let mut tx = state.db.begin().await?;
    let tags = identity_service::search_tags(&mut tx, &query.q).await?;
    tx.commit().await?;
    Ok(Json(tags))
}

async fn user_tags(State(state): State<AppState>, Path(user_id): Path<i64>) -> AppResult<Json<Vec<EntTag>>> {
    let mut tx = state.db.begin().await?;
    let tags = identity_service::user_tags(&mut tx, user_id).await?;
    tx.commit().await?;
    Ok(Json(tags))
}
