// /api/posts - feeds, single posts, post likes and post-scoped comments

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};

use crate::app_state::AppState;
use crate::error::AppResult;
use crate::framework::{Page, PageParams};
use crate::infrastructure::Vc;
use crate::routes::{comments, finish, Message};
use crate::services::feed_service::{self, FeedBatch, FeedPage, FeedStats};
use crate::services::post_service::{self, PostDetail, PostLikeState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/feed/all", get(feed_all))
        .route("/feed/similar", get(feed_similar))
        .route("/feed/stats", get(feed_stats))
        .route("/feed/batch", get(feed_batch))
        .route("/{id}", get(fetch_post))
        .route("/{id}/delete", delete(delete_post))
        .route("/{id}/like", post(like_post))
        .route("/{id}/unlike", post(unlike_post).delete(unlike_post))
        .route(
            "/{id}/comments",
            get(comments::list_post_comments).post(comments::create_post_comment),
        )
        .route("/{id}/comments/{comment_id}", delete(comments::delete_post_comment))
}

async fn feed_all(
    State(state): State<AppState>,
    vc: Vc,
    Query(params): Query<PageParams>,
) -> AppResult<Json<FeedPage>> {
    vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let feed = feed_service::all(&mut tx, Page::from_params(params)).await?;
    tx.commit().await?;
    Ok(Json(feed))
}

async fn feed_similar(
    State(state): State<AppState>,
    vc: Vc,
    Query(params): Query<PageParams>,
) -> AppResult<Json<FeedPage>> {
    let viewer = vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let feed = feed_service::similar(&mut tx, viewer, Page::from_params(params)).await?;
    tx.commit().await?;
    Ok(Json(feed))
}

async fn feed_stats(State(state): State<AppState>, vc: Vc) -> AppResult<Json<FeedStats>> {
    let viewer = vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let stats = feed_service::stats(&mut tx, viewer).await?;
    tx.commit().await?;
    Ok(Json(stats))
}

async fn feed_batch(State(state): State<AppState>, vc: Vc) -> AppResult<Json<FeedBatch>> {
    let viewer = vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let batch = feed_service::batch(&mut tx, viewer).await?;
    tx.commit().await?;
    Ok(Json(batch))
}

async fn fetch_post(State(state): State<AppState>, vc: Vc, Path(id): Path<i64>) -> AppResult<Json<PostDetail>> {
    let mut tx = state.db.begin().await?;
    let post = post_service::fetch(&mut tx, vc.user_id, id).await?;
    tx.commit().await?;
    Ok(Json(post))
}

async fn delete_post(State(state): State<AppState>, vc: Vc, Path(id): Path<i64>) -> AppResult<impl IntoResponse> {
    let actor = vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let outcome = post_service::delete(&mut tx, actor, id).await?;
    finish(&state, tx, outcome).await?;
    Ok(Message::new("Successfully deleted"))
}

async fn like_post(State(state): State<AppState>, vc: Vc, Path(id): Path<i64>) -> AppResult<Json<PostLikeState>> {
    let actor = vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let liked = post_service::like(&mut tx, actor, id).await?;
    tx.commit().await?;
    Ok(Json(liked))
}

async fn unlike_post(State(state): State<AppState>, vc: Vc, Path(id): Path<i64>) -> AppResult<Json<PostLikeState>> {
    let actor = vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let unliked = post_service::unlike(&mut tx, actor, id).await?;
    tx.commit().await?;
    Ok(Json(unliked))
}
