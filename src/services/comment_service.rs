// CommentService - threaded comments on posts and comment-like toggles
// Trees are assembled from an id-indexed child map; serialization stops at MAX_DEPTH.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use std::collections::HashMap;
use tracing::{info, instrument};

use crate::entities::ent_comment::{CommentLiker, LikeStatusRow};
use crate::entities::{EntComment, EntPost, UserProjection};
use crate::error::{AppError, AppResult, DomainRule};
use crate::framework::pagination::{Page, PageInfo};
use crate::framework::privacy::{authorize, Action, Target};
use crate::framework::validation::check_length;

pub const MAX_DEPTH: usize = 10;
pub const MAX_COMMENT_LEN: usize = 500;
pub const MAX_BATCH_IDS: usize = 100;
pub const DEFAULT_RECENT_LIMIT: i64 = 10;
pub const MAX_RECENT_LIMIT: i64 = 50;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
    pub comment: String,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user: UserProjection,
    pub like_count: i64,
    pub is_liked: bool,
    pub reply_count: i64,
    pub replies: Vec<CommentNode>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPage {
    pub comments: Vec<CommentNode>,
    pub pagination: PageInfo,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LikeStatus {
    pub is_liked: bool,
    pub like_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleResult {
    pub comment_id: i64,
    pub action: &'static str,
    pub is_liked: bool,
    pub like_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Liker {
    pub user: UserProjection,
    pub liked_at: DateTime<Utc>,
}

impl From<CommentLiker> for Liker {
    fn from(row: CommentLiker) -> Self {
        Liker {
            user: UserProjection {
                id: row.id,
                username: row.username,
                first_name: row.first_name,
                last_name: row.last_name,
                profile_image: row.profile_image,
            },
            liked_at: row.liked_at,
        }
    }
}

fn status_of(statuses: &HashMap<i64, LikeStatusRow>, id: i64) -> LikeStatus {
    statuses
        .get(&id)
        .map(|row| LikeStatus {
            is_liked: row.is_liked > 0,
            like_count: row.like_count,
        })
        .unwrap_or(LikeStatus {
            is_liked: false,
            like_count: 0,
        })
}

fn flat_node(comment: EntComment, status: LikeStatus, reply_count: i64) -> CommentNode {
    CommentNode {
        user: comment.author(),
        id: comment.id,
        user_id: comment.user_id,
        post_id: comment.post_id,
        comment: comment.comment,
        parent_id: comment.parent_id,
        created_at: comment.created_at,
        updated_at: comment.updated_at,
        like_count: status.like_count,
        is_liked: status.is_liked,
        reply_count,
        replies: Vec::new(),
    }
}

/// Child lists keyed by parent id, each in reading order (oldest first, id tie-break).
fn child_map(comments: Vec<EntComment>) -> HashMap<i64, Vec<EntComment>> {
    let mut children: HashMap<i64, Vec<EntComment>> = HashMap::new();
    for comment in comments {
        if let Some(parent) = comment.parent_id {
            children.entry(parent).or_default().push(comment);
        }
    }
    for siblings in children.values_mut() {
        siblings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    }
    children
}

fn build_node(
    comment: EntComment,
    depth: usize,
    children: &mut HashMap<i64, Vec<EntComment>>,
    statuses: &HashMap<i64, LikeStatusRow>,
) -> CommentNode {
    let kids = children.remove(&comment.id).unwrap_or_default();
    let status = status_of(statuses, comment.id);
    let mut node = flat_node(comment, status, kids.len() as i64);
    if depth < MAX_DEPTH {
        node.replies = kids
            .into_iter()
            .map(|child| build_node(child, depth + 1, children, statuses))
            .collect();
    }
    node
}

/// Root comments newest first, with equal timestamps ordered by ascending id.
fn sort_roots(roots: &mut [EntComment]) {
    roots.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
}

/// Assemble nodes for `roots`, attaching their subtrees from `descendants`.
fn assemble(
    roots: Vec<EntComment>,
    descendants: Vec<EntComment>,
    statuses: &HashMap<i64, LikeStatusRow>,
) -> Vec<CommentNode> {
    let mut children = child_map(descendants);
    roots
        .into_iter()
        .map(|root| build_node(root, 1, &mut children, statuses))
        .collect()
}

/// The whole comment forest of a post.
pub async fn tree(conn: &mut SqliteConnection, viewer: Option<i64>, post_id: i64) -> AppResult<Vec<CommentNode>> {
    let comments = EntComment::gen_for_post(conn, post_id).await?;
    let ids: Vec<i64> = comments.iter().map(|c| c.id).collect();
    let statuses = EntComment::like_status(conn, viewer, &ids).await?;

    let (mut roots, replies): (Vec<_>, Vec<_>) = comments.into_iter().partition(|c| c.parent_id.is_none());
    sort_roots(&mut roots);
    Ok(assemble(roots, replies, &statuses))
}

/// Root comments of a post, paginated newest first, optionally with their subtrees.
pub async fn list_for_post(
    conn: &mut SqliteConnection,
    viewer: Option<i64>,
    post_id: i64,
    page: Page,
    include_replies: bool,
) -> AppResult<CommentPage> {
    EntPost::gen_enforce(conn, post_id).await?;
    let total = EntComment::count_roots(conn, post_id).await?;
    let roots = EntComment::gen_roots(conn, post_id, page.limit(), page.offset()).await?;

    let comments = if include_replies {
        let replies: Vec<EntComment> = EntComment::gen_for_post(conn, post_id)
            .await?
            .into_iter()
            .filter(|c| c.parent_id.is_some())
            .collect();
        let ids: Vec<i64> = roots.iter().chain(replies.iter()).map(|c| c.id).collect();
        let statuses = EntComment::like_status(conn, viewer, &ids).await?;
        assemble(roots, replies, &statuses)
    } else {
        flat_nodes(conn, viewer, roots).await?
    };

    Ok(CommentPage {
        comments,
        pagination: page.info(total),
    })
}

/// Nodes without subtrees, carrying like status and reply counts.
async fn flat_nodes(
    conn: &mut SqliteConnection,
    viewer: Option<i64>,
    comments: Vec<EntComment>,
) -> AppResult<Vec<CommentNode>> {
    let ids: Vec<i64> = comments.iter().map(|c| c.id).collect();
    let statuses = EntComment::like_status(conn, viewer, &ids).await?;
    let reply_counts = EntComment::reply_counts(conn, &ids).await?;
    Ok(comments
        .into_iter()
        .map(|comment| {
            let id = comment.id;
            flat_node(
                comment,
                status_of(&statuses, id),
                reply_counts.get(&id).copied().unwrap_or(0),
            )
        })
        .collect())
}

async fn flat_node_by_id(conn: &mut SqliteConnection, viewer: Option<i64>, id: i64) -> AppResult<CommentNode> {
    let comment = EntComment::gen_enforce(conn, id).await?;
    flat_nodes(conn, viewer, vec![comment])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Comment"))
}

fn check_text(text: &str) -> AppResult<String> {
    let text = text.trim();
    check_length("comment", text, 1, MAX_COMMENT_LEN)?;
    Ok(text.to_string())
}

/// A reply must point at a comment on the same post.
#[instrument(skip(conn, text))]
pub async fn create(
    conn: &mut SqliteConnection,
    actor: i64,
    post_id: i64,
    text: &str,
    parent_id: Option<i64>,
) -> AppResult<CommentNode> {
    let text = check_text(text)?;
    EntPost::gen_enforce(conn, post_id).await?;

    if let Some(parent_id) = parent_id {
        match EntComment::gen_nullable(conn, parent_id).await? {
            Some(parent) if parent.post_id == post_id => {}
            _ => return Err(AppError::Rule(DomainRule::ParentMismatch)),
        }
    }

    let id = EntComment::create(conn, actor, post_id, &text, parent_id).await?;
    info!(comment_id = id, post_id, ?parent_id, "Comment created");
    flat_node_by_id(conn, Some(actor), id).await
}

pub async fn fetch(conn: &mut SqliteConnection, viewer: Option<i64>, id: i64) -> AppResult<CommentNode> {
    flat_node_by_id(conn, viewer, id).await
}

pub async fn replies(conn: &mut SqliteConnection, viewer: Option<i64>, id: i64) -> AppResult<Vec<CommentNode>> {
    EntComment::gen_enforce(conn, id).await?;
    let replies = EntComment::gen_replies(conn, id).await?;
    flat_nodes(conn, viewer, replies).await
}

pub async fn recent(conn: &mut SqliteConnection, viewer: Option<i64>, limit: Option<i64>) -> AppResult<Vec<CommentNode>> {
    let limit = limit
        .filter(|n| *n >= 1)
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .min(MAX_RECENT_LIMIT);
    let comments = EntComment::gen_recent(conn, limit).await?;
    flat_nodes(conn, viewer, comments).await
}

/// A user's own latest comments, newest first.
pub async fn by_user(
    conn: &mut SqliteConnection,
    viewer: Option<i64>,
    user_id: i64,
    limit: i64,
) -> AppResult<Vec<CommentNode>> {
    let comments = EntComment::gen_recent_by_user(conn, user_id, limit).await?;
    flat_nodes(conn, viewer, comments).await
}

/// Author-only edit.
pub async fn edit(conn: &mut SqliteConnection, actor: i64, id: i64, text: &str) -> AppResult<CommentNode> {
    let text = check_text(text)?;
    let comment = EntComment::gen_enforce(conn, id).await?;
    authorize(actor, Action::Edit, Target::Comment { author: comment.user_id })?;

    EntComment::update_text(conn, id, &text).await?;
    flat_node_by_id(conn, Some(actor), id).await
}

/// Author-only delete of the whole subtree. `post_id` scopes the lookup when given.
#[instrument(skip(conn))]
pub async fn delete(
    conn: &mut SqliteConnection,
    actor: i64,
    id: i64,
    post_id: Option<i64>,
) -> AppResult<u64> {
    let comment = EntComment::gen_enforce(conn, id).await?;
    if post_id.is_some_and(|post_id| post_id != comment.post_id) {
        return Err(AppError::not_found("Comment"));
    }
    authorize(actor, Action::Delete, Target::Comment { author: comment.user_id })?;

    let removed = EntComment::delete_subtree(conn, id).await?;
    info!(comment_id = id, removed, "Comment subtree deleted");
    Ok(removed)
}

/// Flip the viewer's like; both directions report the fresh count.
pub async fn toggle_like(conn: &mut SqliteConnection, actor: i64, id: i64) -> AppResult<ToggleResult> {
    EntComment::gen_enforce(conn, id).await?;
    let is_liked = EntComment::toggle_like(conn, actor, id).await?;
    let like_count = EntComment::like_counts(conn, &[id])
        .await?
        .get(&id)
        .copied()
        .unwrap_or(0);
    Ok(ToggleResult {
        comment_id: id,
        action: if is_liked { "liked" } else { "unliked" },
        is_liked,
        like_count,
    })
}

pub async fn like_status(conn: &mut SqliteConnection, viewer: Option<i64>, id: i64) -> AppResult<LikeStatus> {
    EntComment::gen_enforce(conn, id).await?;
    let statuses = EntComment::like_status(conn, viewer, &[id]).await?;
    Ok(status_of(&statuses, id))
}

/// Like status for every existing comment among `ids`, keyed by id.
pub async fn batch_like_status(
    conn: &mut SqliteConnection,
    viewer: Option<i64>,
    ids: &[i64],
) -> AppResult<HashMap<i64, LikeStatus>> {
    if ids.len() > MAX_BATCH_IDS {
        return Err(AppError::Validation(format!(
            "At most {} comment ids per request",
            MAX_BATCH_IDS
        )));
    }
    let existing = EntComment::existing(conn, ids).await?;
    let statuses = EntComment::like_status(conn, viewer, &existing).await?;
    Ok(existing
        .into_iter()
        .map(|id| (id, status_of(&statuses, id)))
        .collect())
}

pub async fn likers(conn: &mut SqliteConnection, id: i64) -> AppResult<Vec<Liker>> {
    EntComment::gen_enforce(conn, id).await?;
    Ok(EntComment::likers(conn, id)
        .await?
        .into_iter()
        .map(Liker::from)
        .collect())
}
