// EntComment - threaded comments and comment likes

use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::collections::HashMap;

use crate::entities::ent_user::UserProjection;
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::{count_grouped, push_id_list};

#[derive(Debug, Clone, FromRow)]
pub struct EntComment {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
    pub comment: String,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub profile_image: String,
}

impl EntComment {
    pub fn author(&self) -> UserProjection {
        UserProjection {
            id: self.user_id,
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            profile_image: self.profile_image.clone(),
        }
    }
}

/// One viewer-relative like summary row.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct LikeStatusRow {
    pub comment_id: i64,
    pub like_count: i64,
    pub is_liked: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct CommentLiker {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub profile_image: String,
    pub liked_at: DateTime<Utc>,
}

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.user_id, c.post_id, c.comment, c.parent_id, c.created_at, c.updated_at,
           u.username, u.first_name, u.last_name, u.profile_image_url AS profile_image
    FROM comments c
    JOIN users u ON u.id = c.user_id
"#;

impl EntComment {
    pub async fn gen_nullable(conn: &mut SqliteConnection, id: i64) -> AppResult<Option<Self>> {
        Ok(sqlx::query_as(&format!("{COMMENT_SELECT} WHERE c.id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?)
    }

    pub async fn gen_enforce(conn: &mut SqliteConnection, id: i64) -> AppResult<Self> {
        Self::gen_nullable(conn, id)
            .await?
            .ok_or_else(|| AppError::not_found("Comment"))
    }

    /// Every comment of a post in reading order (oldest first, id tie-break).
    pub async fn gen_for_post(conn: &mut SqliteConnection, post_id: i64) -> AppResult<Vec<Self>> {
        Ok(sqlx::query_as(&format!(
            "{COMMENT_SELECT} WHERE c.post_id = ? ORDER BY c.created_at ASC, c.id ASC"
        ))
        .bind(post_id)
        .fetch_all(&mut *conn)
        .await?)
    }

    /// Root comments of a post, newest first.
    pub async fn gen_roots(
        conn: &mut SqliteConnection,
        post_id: i64,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Self>> {
        Ok(sqlx::query_as(&format!(
            "{COMMENT_SELECT} WHERE c.post_id = ? AND c.parent_id IS NULL \
             ORDER BY c.created_at DESC, c.id ASC LIMIT ? OFFSET ?"
        ))
        .bind(post_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?)
    }

    pub async fn count_roots(conn: &mut SqliteConnection, post_id: i64) -> AppResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM comments WHERE post_id = ? AND parent_id IS NULL")
                .bind(post_id)
                .fetch_one(&mut *conn)
                .await?;
        Ok(count)
    }

    /// Direct replies, oldest first.
    pub async fn gen_replies(conn: &mut SqliteConnection, parent_id: i64) -> AppResult<Vec<Self>> {
        Ok(sqlx::query_as(&format!(
            "{COMMENT_SELECT} WHERE c.parent_id = ? ORDER BY c.created_at ASC, c.id ASC"
        ))
        .bind(parent_id)
        .fetch_all(&mut *conn)
        .await?)
    }

    pub async fn gen_recent(conn: &mut SqliteConnection, limit: i64) -> AppResult<Vec<Self>> {
        Ok(sqlx::query_as(&format!(
            "{COMMENT_SELECT} ORDER BY c.created_at DESC, c.id DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?)
    }

    pub async fn gen_recent_by_user(
        conn: &mut SqliteConnection,
        user_id: i64,
        limit: i64,
    ) -> AppResult<Vec<Self>> {
        Ok(sqlx::query_as(&format!(
            "{COMMENT_SELECT} WHERE c.user_id = ? ORDER BY c.created_at DESC, c.id DESC LIMIT ?"
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?)
    }

    pub async fn create(
        conn: &mut SqliteConnection,
        user_id: i64,
        post_id: i64,
        text: &str,
        parent_id: Option<i64>,
    ) -> AppResult<i64> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO comments (user_id, post_id, comment, parent_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(post_id)
        .bind(text)
        .bind(parent_id)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn update_text(conn: &mut SqliteConnection, id: i64, text: &str) -> AppResult<()> {
        sqlx::query("UPDATE comments SET comment = ?, updated_at = ? WHERE id = ?")
            .bind(text)
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Ids of the comment and all of its descendants.
    pub async fn subtree_ids(conn: &mut SqliteConnection, id: i64) -> AppResult<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"
            WITH RECURSIVE subtree(id) AS (
                SELECT id FROM comments WHERE id = ?
                UNION ALL
                SELECT c.id FROM comments c JOIN subtree s ON c.parent_id = s.id
            )
            SELECT id FROM subtree
            "#,
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Delete the subtree rooted at `id`; returns how many comments were removed.
    pub async fn delete_subtree(conn: &mut SqliteConnection, id: i64) -> AppResult<u64> {
        let ids = Self::subtree_ids(conn, id).await?;
        if ids.is_empty() {
            return Ok(0);
        }

        let mut likes: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM comment_likes WHERE comment_id IN ");
        push_id_list(&mut likes, &ids);
        likes.build().execute(&mut *conn).await?;

        let mut comments: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM comments WHERE id IN ");
        push_id_list(&mut comments, &ids);
        let result = comments.build().execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }

    pub async fn reply_counts(conn: &mut SqliteConnection, ids: &[i64]) -> AppResult<HashMap<i64, i64>> {
        count_grouped(conn, "comments", "parent_id", ids).await
    }

    pub async fn like_counts(conn: &mut SqliteConnection, ids: &[i64]) -> AppResult<HashMap<i64, i64>> {
        count_grouped(conn, "comment_likes", "comment_id", ids).await
    }

    /// Compare-and-set toggle: remove the like if present, otherwise insert it.
    /// Returns whether the viewer likes the comment afterwards.
    pub async fn toggle_like(conn: &mut SqliteConnection, user_id: i64, comment_id: i64) -> AppResult<bool> {
        let removed = sqlx::query("DELETE FROM comment_likes WHERE user_id = ? AND comment_id = ?")
            .bind(user_id)
            .bind(comment_id)
            .execute(&mut *conn)
            .await?;
        if removed.rows_affected() > 0 {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO comment_likes (user_id, comment_id, created_at) VALUES (?, ?, ?) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(comment_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
        Ok(true)
    }

    /// Count plus the viewer's own like for each comment in one grouped query.
    pub async fn like_status(
        conn: &mut SqliteConnection,
        viewer: Option<i64>,
        ids: &[i64],
    ) -> AppResult<HashMap<i64, LikeStatusRow>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT comment_id, COUNT(*) AS like_count, \
             COALESCE(SUM(CASE WHEN user_id = ",
        );
        qb.push_bind(viewer.unwrap_or(0));
        qb.push(" THEN 1 ELSE 0 END), 0) AS is_liked FROM comment_likes WHERE comment_id IN ");
        push_id_list(&mut qb, ids);
        qb.push(" GROUP BY comment_id");

        let rows: Vec<LikeStatusRow> = qb.build_query_as().fetch_all(&mut *conn).await?;
        Ok(rows.into_iter().map(|row| (row.comment_id, row)).collect())
    }

    /// Users who liked the comment, most recent like first.
    pub async fn likers(conn: &mut SqliteConnection, comment_id: i64) -> AppResult<Vec<CommentLiker>> {
        Ok(sqlx::query_as(
            r#"
            SELECT u.id, u.username, u.first_name, u.last_name,
                   u.profile_image_url AS profile_image, cl.created_at AS liked_at
            FROM comment_likes cl
            JOIN users u ON u.id = cl.user_id
            WHERE cl.comment_id = ?
            ORDER BY cl.created_at DESC, cl.id DESC
            "#,
        )
        .bind(comment_id)
        .fetch_all(&mut *conn)
        .await?)
    }

    /// Ids among `ids` that exist.
    pub async fn existing(conn: &mut SqliteConnection, ids: &[i64]) -> AppResult<Vec<i64>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT id FROM comments WHERE id IN ");
        push_id_list(&mut qb, ids);
        let rows: Vec<(i64,)> = qb.build_query_as().fetch_all(&mut *conn).await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
