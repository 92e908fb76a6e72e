// EntPost - posts, post likes and their author projection

use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::collections::HashMap;

use crate::entities::ent_user::UserProjection;
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::{count_grouped, push_id_list};

/// A post row joined with its creator's identity.
#[derive(Debug, Clone, FromRow)]
pub struct EntPost {
    pub id: i64,
    pub creator: i64,
    pub title: String,
    pub caption: String,
    pub image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub creator_username: String,
    pub creator_first_name: String,
    pub creator_last_name: String,
    pub creator_profile_image: String,
}

impl EntPost {
    pub fn author(&self) -> UserProjection {
        UserProjection {
            id: self.creator,
            username: self.creator_username.clone(),
            first_name: self.creator_first_name.clone(),
            last_name: self.creator_last_name.clone(),
            profile_image: self.creator_profile_image.clone(),
        }
    }
}

const POST_SELECT: &str = r#"
    SELECT p.id, p.creator, p.title, p.caption, p.image, p.created_at, p.updated_at,
           u.username AS creator_username, u.first_name AS creator_first_name,
           u.last_name AS creator_last_name, u.profile_image_url AS creator_profile_image
    FROM posts p
    JOIN users u ON u.id = p.creator
"#;

/// Newest first; equal timestamps fall back to the higher id.
const FEED_ORDER: &str = " ORDER BY p.created_at DESC, p.id DESC";

impl EntPost {
    pub async fn gen_nullable(conn: &mut SqliteConnection, id: i64) -> AppResult<Option<Self>> {
        Ok(sqlx::query_as(&format!("{POST_SELECT} WHERE p.id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?)
    }

    pub async fn gen_enforce(conn: &mut SqliteConnection, id: i64) -> AppResult<Self> {
        Self::gen_nullable(conn, id)
            .await?
            .ok_or_else(|| AppError::not_found("Post"))
    }

    pub async fn create(
        conn: &mut SqliteConnection,
        creator: i64,
        title: &str,
        caption: &str,
        image: &str,
    ) -> AppResult<i64> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO posts (creator, title, caption, image, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(creator)
        .bind(title)
        .bind(caption)
        .bind(image)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn update(
        conn: &mut SqliteConnection,
        id: i64,
        title: &str,
        caption: &str,
        image: &str,
    ) -> AppResult<()> {
        sqlx::query("UPDATE posts SET title = ?, caption = ?, image = ?, updated_at = ? WHERE id = ?")
            .bind(title)
            .bind(caption)
            .bind(image)
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Remove the post together with its comment forest, comment likes and post likes.
    pub async fn delete_cascade(conn: &mut SqliteConnection, id: i64) -> AppResult<()> {
        sqlx::query(
            "DELETE FROM comment_likes WHERE comment_id IN (SELECT id FROM comments WHERE post_id = ?)",
        )
        .bind(id)
        .execute(&mut *conn)
        .await?;
        sqlx::query("DELETE FROM comments WHERE post_id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        sqlx::query("DELETE FROM likes WHERE post_id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn gen_page(conn: &mut SqliteConnection, limit: i64, offset: i64) -> AppResult<Vec<Self>> {
        Ok(sqlx::query_as(&format!("{POST_SELECT}{FEED_ORDER} LIMIT ? OFFSET ?"))
            .bind(limit)
            .bind(offset)
            .fetch_all(&mut *conn)
            .await?)
    }

    pub async fn count_all(conn: &mut SqliteConnection) -> AppResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }

    pub async fn gen_by_creators(
        conn: &mut SqliteConnection,
        creators: &[i64],
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Self>> {
        if creators.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(POST_SELECT);
        qb.push(" WHERE p.creator IN ");
        push_id_list(&mut qb, creators);
        qb.push(FEED_ORDER);
        qb.push(" LIMIT ").push_bind(limit);
        qb.push(" OFFSET ").push_bind(offset);
        Ok(qb.build_query_as().fetch_all(&mut *conn).await?)
    }

    pub async fn count_by_creators(conn: &mut SqliteConnection, creators: &[i64]) -> AppResult<i64> {
        if creators.is_empty() {
            return Ok(0);
        }
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM posts WHERE creator IN ");
        push_id_list(&mut qb, creators);
        let (count,): (i64,) = qb.build_query_as().fetch_one(&mut *conn).await?;
        Ok(count)
    }

    pub async fn like_counts(conn: &mut SqliteConnection, ids: &[i64]) -> AppResult<HashMap<i64, i64>> {
        count_grouped(conn, "likes", "post_id", ids).await
    }

    pub async fn comment_counts(conn: &mut SqliteConnection, ids: &[i64]) -> AppResult<HashMap<i64, i64>> {
        count_grouped(conn, "comments", "post_id", ids).await
    }

    /// Insert the like if absent; `false` when it already existed.
    pub async fn like(conn: &mut SqliteConnection, user_id: i64, post_id: i64) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT INTO likes (user_id, post_id, created_at) VALUES (?, ?, ?) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(post_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Delete the like if present; `false` when there was none.
    pub async fn unlike(conn: &mut SqliteConnection, user_id: i64, post_id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM likes WHERE user_id = ? AND post_id = ?")
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn liked_by(conn: &mut SqliteConnection, user_id: i64, post_id: i64) -> AppResult<bool> {
        let (liked,): (i64,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM likes WHERE user_id = ? AND post_id = ?)",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(liked != 0)
    }

    pub async fn liked_among(
        conn: &mut SqliteConnection,
        user_id: i64,
        post_ids: &[i64],
    ) -> AppResult<Vec<i64>> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT post_id FROM likes WHERE user_id = ");
        qb.push_bind(user_id);
        qb.push(" AND post_id IN ");
        push_id_list(&mut qb, post_ids);
        let rows: Vec<(i64,)> = qb.build_query_as().fetch_all(&mut *conn).await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
