// /api/users - public user listing, profile edits, tags and post authoring

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::error::AppResult;
use crate::framework::{FormData, Page, PageParams};
use crate::infrastructure::security::clear_session_cookie;
use crate::infrastructure::Vc;
use crate::routes::{created, finish, Message};
use crate::services::identity_service::{self, AuthUser, PostFeed, ProfileInput, UserList};
use crate::services::post_service::{self, PostCard, PostInput};
use crate::services::Outcome;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/{id}", get(fetch_user))
        .route("/{id}/posts", get(profile_feed))
        .route("/{id}/profile/update", post(update_profile))
        .route("/{id}/profile/delete", delete(delete_profile))
        .route("/{id}/add-tags", post(add_tags))
        .route("/{id}/posts/create", post(create_post))
        .route("/{id}/posts/{post_id}", post(update_post))
}

#[derive(Debug, Deserialize)]
pub struct TagsRequest {
    pub tags: Vec<String>,
}

async fn list_users(
    State(state): State<AppState>,
    vc: Vc,
    Query(params): Query<PageParams>,
) -> AppResult<Json<UserList>> {
    let mut tx = state.db.begin().await?;
    let users = identity_service::list_users(&mut tx, vc.user_id, Page::from_params(params)).await?;
    tx.commit().await?;
    Ok(Json(users))
}

async fn fetch_user(State(state): State<AppState>, vc: Vc, Path(id): Path<i64>) -> AppResult<Json<AuthUser>> {
    let mut tx = state.db.begin().await?;
    let user = identity_service::fetch_user(&mut tx, vc.user_id, id).await?;
    tx.commit().await?;
    Ok(Json(user))
}

async fn profile_feed(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<PostFeed>> {
    let mut tx = state.db.begin().await?;
    let feed = identity_service::user_posts(&mut tx, id, Page::from_params(params)).await?;
    tx.commit().await?;
    Ok(Json(feed))
}

async fn update_profile(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<i64>,
    mut form: FormData,
) -> AppResult<Json<AuthUser>> {
    let actor = vc.require_user()?;
    let input = ProfileInput {
        first_name: form.text("first_name"),
        last_name: form.text("last_name"),
        username: form.text("username"),
        email: form.text("email"),
        bio: form.text("bio"),
    };
    let image = form.take_file(identity_service::IMAGE_FIELDS);

    let mut tx = state.db.begin().await?;
    let outcome =
        identity_service::update_profile(&mut tx, state.images.as_ref(), actor, id, input, image).await?;
    Ok(Json(finish(&state, tx, outcome).await?))
}

async fn delete_profile(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let actor = vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let outcome = identity_service::delete_profile(&mut tx, actor, id).await?;
    finish(&state, tx, outcome).await?;

    let cookie = clear_session_cookie(state.secure_cookies());
    Ok(([(header::SET_COOKIE, cookie)], Message::new("Successfully deleted")))
}

/// Additive; unknown names become new tags.
async fn add_tags(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<i64>,
    Json(req): Json<TagsRequest>,
) -> AppResult<Json<AuthUser>> {
    let actor = vc.require_user()?;
    let mut tx = state.db.begin().await?;
    let user = identity_service::add_tags(&mut tx, actor, id, &req.tags).await?;
    tx.commit().await?;
    Ok(Json(user))
}

fn post_input(form: &FormData) -> AppResult<PostInput> {
    Ok(PostInput {
        title: form.required("title")?,
        caption: form.required("caption")?,
    })
}

async fn create_post(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<i64>,
    mut form: FormData,
) -> AppResult<impl IntoResponse> {
    let actor = vc.require_user()?;
    let input = post_input(&form)?;
    let image = form.require_file(post_service::IMAGE_FIELDS)?;

    let mut tx = state.db.begin().await?;
    let post = post_service::create(&mut tx, state.images.as_ref(), actor, id, input, image).await?;
    let post: PostCard = finish(&state, tx, Outcome::new(post)).await?;
    Ok(created(post))
}

async fn update_post(
    State(state): State<AppState>,
    vc: Vc,
    Path((_user_id, post_id)): Path<(i64, i64)>,
    mut form: FormData,
) -> AppResult<Json<PostCard>> {
    let actor = vc.require_user()?;
    let input = post_input(&form)?;
    let image = form.take_file(post_service::IMAGE_FIELDS);

    let mut tx = state.db.begin().await?;
    let outcome = post_service::update(&mut tx, state.images.as_ref(), actor, post_id, input, image).await?;
    Ok(Json(finish(&state, tx, outcome).await?))
}
