// PostService - post lifecycle, post likes and post cards with derived counters

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{info, instrument};
use validator::Validate;

use crate::entities::{EntPost, UserProjection};
use crate::error::{AppError, AppResult};
use crate::framework::pagination::{Page, PageInfo};
use crate::framework::privacy::{authorize, Action, Target};
use crate::infrastructure::storage::{ImageStore, ImageUpload};
use crate::services::comment_service::{self, CommentNode};
use crate::services::{keep_or_release, Outcome};

pub const IMAGE_FIELDS: &[&str] = &["image", "post_image"];

#[derive(Debug, Clone, Validate)]
pub struct PostInput {
    #[validate(length(min = 5, max = 50, message = "Title must be between 5 and 50 characters"))]
    pub title: String,
    #[validate(length(min = 5, max = 250, message = "Caption must be between 5 and 250 characters"))]
    pub caption: String,
}

/// A post as listed in feeds and profiles.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostCard {
    pub id: i64,
    pub creator: i64,
    pub title: String,
    pub caption: String,
    pub image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user: UserProjection,
    pub likes: i64,
    pub comments: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: PostCard,
    pub is_liked: bool,
    pub post_comments: Vec<CommentNode>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostLikeState {
    pub post_id: i64,
    pub likes: i64,
    pub is_liked: bool,
}

/// Attach like and comment counts to a page of posts with two grouped queries.
pub async fn cards(conn: &mut SqliteConnection, posts: Vec<EntPost>) -> AppResult<Vec<PostCard>> {
    let ids: Vec<i64> = posts.iter().map(|post| post.id).collect();
    let likes = EntPost::like_counts(conn, &ids).await?;
    let comments = EntPost::comment_counts(conn, &ids).await?;

    Ok(posts
        .into_iter()
        .map(|post| PostCard {
            user: post.author(),
            likes: likes.get(&post.id).copied().unwrap_or(0),
            comments: comments.get(&post.id).copied().unwrap_or(0),
            id: post.id,
            creator: post.creator,
            title: post.title,
            caption: post.caption,
            image: post.image,
            created_at: post.created_at,
            updated_at: post.updated_at,
        })
        .collect())
}

async fn card(conn: &mut SqliteConnection, id: i64) -> AppResult<PostCard> {
    let post = EntPost::gen_enforce(conn, id).await?;
    cards(conn, vec![post])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Post"))
}

async fn insert(conn: &mut SqliteConnection, creator: i64, input: &PostInput, image: &str) -> AppResult<PostCard> {
    let id = EntPost::create(conn, creator, &input.title, &input.caption, image).await?;
    card(conn, id).await
}

async fn rewrite(conn: &mut SqliteConnection, id: i64, input: &PostInput, image: &str) -> AppResult<PostCard> {
    EntPost::update(conn, id, &input.title, &input.caption, image).await?;
    card(conn, id).await
}

#[instrument(skip(conn, images, input, image))]
pub async fn create(
    conn: &mut SqliteConnection,
    images: &dyn ImageStore,
    actor: i64,
    owner_id: i64,
    input: PostInput,
    image: ImageUpload,
) -> AppResult<PostCard> {
    authorize(actor, Action::Manage, Target::User { id: owner_id })?;
    input.validate()?;

    let url = images.upload(&image).await?;
    let created = insert(conn, actor, &input, &url).await;
    let post = keep_or_release(images, Some(&url), created).await?;

    info!(post_id = post.id, creator = actor, "Post created");
    Ok(post)
}

pub async fn fetch(conn: &mut SqliteConnection, viewer: Option<i64>, id: i64) -> AppResult<PostDetail> {
    let post = card(conn, id).await?;
    let is_liked = match viewer {
        Some(user_id) => EntPost::liked_by(conn, user_id, id).await?,
        None => false,
    };
    let post_comments = comment_service::tree(conn, viewer, id).await?;
    Ok(PostDetail {
        post,
        is_liked,
        post_comments,
    })
}

/// Creator-only edit. A replacement image is uploaded first; the old one is released after commit.
#[instrument(skip(conn, images, input, image))]
pub async fn update(
    conn: &mut SqliteConnection,
    images: &dyn ImageStore,
    actor: i64,
    post_id: i64,
    input: PostInput,
    image: Option<ImageUpload>,
) -> AppResult<Outcome<PostCard>> {
    let existing = EntPost::gen_enforce(conn, post_id).await?;
    authorize(actor, Action::Edit, Target::Post { creator: existing.creator })?;
    input.validate()?;

    let uploaded = match &image {
        Some(image) => Some(images.upload(image).await?),
        None => None,
    };
    let url = uploaded.clone().unwrap_or_else(|| existing.image.clone());

    let updated = rewrite(conn, post_id, &input, &url).await;
    let post = keep_or_release(images, uploaded.as_deref(), updated).await?;

    let release = if uploaded.is_some() { vec![existing.image] } else { Vec::new() };
    Ok(Outcome::releasing(post, release))
}

/// Creator-only delete. Comments, comment likes and likes go with the post.
#[instrument(skip(conn))]
pub async fn delete(conn: &mut SqliteConnection, actor: i64, post_id: i64) -> AppResult<Outcome<()>> {
    let post = EntPost::gen_enforce(conn, post_id).await?;
    authorize(actor, Action::Delete, Target::Post { creator: post.creator })?;

    EntPost::delete_cascade(conn, post_id).await?;
    info!(post_id, "Post deleted");
    Ok(Outcome::releasing((), vec![post.image]))
}

/// Like is insert-if-absent; a second like is rejected without changing state.
pub async fn like(conn: &mut SqliteConnection, actor: i64, post_id: i64) -> AppResult<PostLikeState> {
    EntPost::gen_enforce(conn, post_id).await?;
    if !EntPost::like(conn, actor, post_id).await? {
        return Err(AppError::Conflict("Post already liked".to_string()));
    }
    like_state(conn, post_id, true).await
}

pub async fn unlike(conn: &mut SqliteConnection, actor: i64, post_id: i64) -> AppResult<PostLikeState> {
    EntPost::gen_enforce(conn, post_id).await?;
    if !EntPost::unlike(conn, actor, post_id).await? {
        return Err(AppError::Conflict("Post not liked yet".to_string()));
    }
    like_state(conn, post_id, false).await
}

async fn like_state(conn: &mut SqliteConnection, post_id: i64, is_liked: bool) -> AppResult<PostLikeState> {
    let likes = EntPost::like_counts(conn, &[post_id])
        .await?
        .get(&post_id)
        .copied()
        .unwrap_or(0);
    Ok(PostLikeState {
        post_id,
        likes,
        is_liked,
    })
}

/// A user's own posts, newest first.
pub async fn by_creator(
    conn: &mut SqliteConnection,
    creator: i64,
    page: Page,
) -> AppResult<(Vec<PostCard>, PageInfo)> {
    let total = EntPost::count_by_creators(conn, &[creator]).await?;
    let posts = EntPost::gen_by_creators(conn, &[creator], page.limit(), page.offset()).await?;
    Ok((cards(conn, posts).await?, page.info(total)))
}
