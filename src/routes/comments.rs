// /api/comments - threaded comments and comment-like toggles

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::app_state::AppState;
use crate::error::AppResult;
use crate::framework::{Page, PageParams};
use crate::infrastructure::Vc;
use crate::routes::created;
use crate::services::comment_service::{self, CommentNode, CommentPage, LikeStatus, Liker, ToggleResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/recent", get(recent))
        .route("/batch-like-status", post(batch_like_status))
        .route("/posts/{post_id}/comments", get(list_post_comments).post(create_post_comment))
        .route("/posts/{post_id}/comments/{comment_id}", delete(delete_post_comment))
        .route("/{id}", get(fetch_comment))
        .route("/{id}/edit", put(edit_comment))
        .route("/{id}/replies", get(replies))
        .route("/{id}/like", post(toggle_like))
        .route("/{id}/likes", get(likers))
        .route("/{id}/like-status", get(like_status))
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(alias = "text", alias = "content")]
    pub comment: String,
    #[serde(default, alias = "parentId")]
    pub parent_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct EditRequest {
    #[serde(alias = "text", alias = "content")]
    pub comment: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub include_replies: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    #[serde(alias = "commentIds", alias = "ids")]
    pub comment_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub like_statuses: HashMap<i64, LikeStatus>,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub message: &'static str,
    pub deleted: u64,
}

#[derive(Debug, Serialize)]
pub struct LikerList {
    pub likers: Vec<Liker>,
}

pub(crate) async fn list_post_comments(
    State(state): State<AppState>,
    vc: Vc,
    Path(post_id): Path<i64>,
    Query(query): Query<CommentQuery>,
) -> AppResult<Json<CommentPage>> {
    let page = Page::from_params(PageParams {
        page: query.page,
        per_page: query.per_page,
    });
    let mut tx = state.db.begin().await?;
    let comments = comment_service::list_for_post(
        &mut tx,
        vc.user_id,
        post_id,
        page,
        query.include_replies.unwrap_or(true),
    )
    .await?;
    tx.commit().await?;
    Ok(Json(comments))
}

pub(crate) async fn create_post_comment(
    State(state): State<AppState>,
    vc: Vc,
    Path(post_id): Path<i64>,
    Json(req): Json<CommentRequest>,
) -> AppResult<impl IntoResponse> {
    let actor = vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let comment = comment_service::create(&mut tx, actor, post_id, &req.comment, req.parent_id).await?;
    tx.commit().await?;
    Ok(created(comment))
}

pub(crate) async fn delete_post_comment(
    State(state): State<AppState>,
    vc: Vc,
    Path((post_id, comment_id)): Path<(i64, i64)>,
) -> AppResult<Json<Deleted>> {
    let actor = vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let deleted = comment_service::delete(&mut tx, actor, comment_id, Some(post_id)).await?;
    tx.commit().await?;
    Ok(Json(Deleted {
        message: "Successfully deleted",
        deleted,
    }))
}

async fn fetch_comment(State(state): State<AppState>, vc: Vc, Path(id): Path<i64>) -> AppResult<Json<CommentNode>> {
    let mut tx = state.db.begin().await?;
    let comment = comment_service::fetch(&mut tx, vc.user_id, id).await?;
    tx.commit().await?;
    Ok(Json(comment))
}

async fn edit_comment(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<i64>,
    Json(req): Json<EditRequest>,
) -> AppResult<Json<CommentNode>> {
    let actor = vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let comment = comment_service::edit(&mut tx, actor, id, &req.comment).await?;
    tx.commit().await?;
    Ok(Json(comment))
}

async fn replies(State(state): State<AppState>, vc: Vc, Path(id): Path<i64>) -> AppResult<Json<Vec<CommentNode>>> {
    let mut tx = state.db.begin().await?;
    let replies = comment_service::replies(&mut tx, vc.user_id, id).await?;
    tx.commit().await?;
    Ok(Json(replies))
}

async fn recent(
    State(state): State<AppState>,
    vc: Vc,
    Query(query): Query<RecentQuery>,
) -> AppResult<Json<Vec<CommentNode>>> {
    let mut tx = state.db.begin().await?;
    let comments = comment_service::recent(&mut tx, vc.user_id, query.limit).await?;
    tx.commit().await?;
    Ok(Json(comments))
}

async fn toggle_like(State(state): State<AppState>, vc: Vc, Path(id): Path<i64>) -> AppResult<Json<ToggleResult>> {
    let actor = vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let result = comment_service::toggle_like(&mut tx, actor, id).await?;
    tx.commit().await?;
    Ok(Json(result))
}

async fn likers(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<LikerList>> {
    let mut tx = state.db.begin().await?;
    let likers = comment_service::likers(&mut tx, id).await?;
    tx.commit().await?;
    Ok(Json(LikerList { likers }))
}

async fn like_status(State(state): State<AppState>, vc: Vc, Path(id): Path<i64>) -> AppResult<Json<LikeStatus>> {
    let mut tx = state.db.begin().await?;
    let status = comment_service::like_status(&mut tx, vc.user_id, id).await?;
    tx.commit().await?;
    Ok(Json(status))
}

async fn batch_like_status(
    State(state): State<AppState>,
    vc: Vc,
    Json(req): Json<BatchRequest>,
) -> AppResult<Json<BatchResponse>> {
    let mut tx = state.db.begin().await?;
    let like_statuses = comment_service::batch_like_status(&mut tx, vc.user_id, &req.comment_ids).await?;
    tx.commit().await?;
    Ok(Json(BatchResponse { like_statuses }))
}
