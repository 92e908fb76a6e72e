// FeedService - global and similar-interest post feeds

use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, instrument, warn};

use crate::entities::{EntPost, EntTag};
use crate::error::AppResult;
use crate::framework::pagination::{Page, PageInfo};
use crate::services::post_service::{self, PostCard};

pub const NO_TAGS_HINT: &str = "Add interest tags to your profile to see posts from people like you";
pub const SIMILAR_UNAVAILABLE: &str = "Similar posts are unavailable right now";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub posts: Vec<PostCard>,
    pub pagination: PageInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeedStats {
    pub total_posts: i64,
    pub similar_users: i64,
    pub similar_posts: i64,
    pub user_tags: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedBatch {
    pub all_posts: FeedPage,
    pub similar_posts: FeedPage,
    pub stats: FeedStats,
}

/// Every post, newest first.
#[instrument(skip(conn))]
pub async fn all(conn: &mut SqliteConnection, page: Page) -> AppResult<FeedPage> {
    let total = EntPost::count_all(conn).await?;
    let posts = EntPost::gen_page(conn, page.limit(), page.offset()).await?;
    Ok(FeedPage {
        posts: post_service::cards(conn, posts).await?,
        pagination: page.info(total),
        message: None,
    })
}

/// Posts by users sharing at least one tag with the viewer.
#[instrument(skip(conn))]
pub async fn similar(conn: &mut SqliteConnection, viewer: i64, page: Page) -> AppResult<FeedPage> {
    let tags = EntTag::for_user(conn, viewer).await?;
    if tags.is_empty() {
        return Ok(FeedPage {
            posts: Vec::new(),
            pagination: page.info(0),
            message: Some(NO_TAGS_HINT.to_string()),
        });
    }

    let authors = EntTag::similar_users(conn, viewer).await?;
    debug!(viewer, authors = authors.len(), "Similar authors resolved");

    let total = EntPost::count_by_creators(conn, &authors).await?;
    let posts = EntPost::gen_by_creators(conn, &authors, page.limit(), page.offset()).await?;
    Ok(FeedPage {
        posts: post_service::cards(conn, posts).await?,
        pagination: page.info(total),
        message: None,
    })
}

pub async fn stats(conn: &mut SqliteConnection, viewer: i64) -> AppResult<FeedStats> {
    let total_posts = EntPost::count_all(conn).await?;
    let user_tags = EntTag::for_user(conn, viewer).await?.len() as i64;
    let authors = EntTag::similar_users(conn, viewer).await?;
    let similar_posts = EntPost::count_by_creators(conn, &authors).await?;
    Ok(FeedStats {
        total_posts,
        similar_users: authors.len() as i64,
        similar_posts,
        user_tags,
    })
}

/// First page of both feeds plus stats. A failing similar feed degrades to a message.
pub async fn batch(conn: &mut SqliteConnection, viewer: i64) -> AppResult<FeedBatch> {
    let page = Page::first();
    let all_posts = all(conn, page).await?;
    let similar_posts = match similar(conn, viewer, page).await {
        Ok(feed) => feed,
        Err(err) => {
            warn!(viewer, error = %err, "Similar feed failed in batch");
            FeedPage {
                posts: Vec::new(),
                pagination: page.info(0),
                message: Some(SIMILAR_UNAVAILABLE.to_string()),
            }
        }
    };
    let stats = stats(conn, viewer).await?;
    Ok(FeedBatch {
        all_posts,
        similar_posts,
        stats,
    })
}
