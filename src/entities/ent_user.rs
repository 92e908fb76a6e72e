// EntUser - accounts, profile fields and author projections

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::collections::HashMap;

use crate::error::{AppError, AppResult};
use crate::infrastructure::database::push_id_list;

#[derive(Debug, Clone, FromRow)]
pub struct EntUser {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub hashed_password: String,
    pub bio: String,
    pub profile_image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public user fields; never carries the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    /// Present only when the viewer is the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub bio: String,
    pub profile_image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Author identity attached to posts, comments and member lists.
#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProjection {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[sqlx(rename = "profile_image_url")]
    pub profile_image: String,
}

impl From<&EntUser> for UserSummary {
    fn from(user: &EntUser) -> Self {
        UserSummary {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
            email: Some(user.email.clone()),
            bio: user.bio.clone(),
            profile_image: user.profile_image_url.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl UserSummary {
    /// Drop the contact address before showing the user to someone else.
    pub fn redacted(mut self) -> Self {
        self.email = None;
        self
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub hashed_password: String,
    pub bio: String,
    pub profile_image_url: String,
}

/// Profile fields an owner may change; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub profile_image_url: Option<String>,
}

const PROJECTION_COLUMNS: &str = "id, username, first_name, last_name, profile_image_url";

impl EntUser {
    pub async fn gen_nullable(conn: &mut SqliteConnection, id: i64) -> AppResult<Option<Self>> {
        Ok(sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?)
    }

    pub async fn gen_enforce(conn: &mut SqliteConnection, id: i64) -> AppResult<Self> {
        Self::gen_nullable(conn, id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    pub async fn gen_by_email(conn: &mut SqliteConnection, email: &str) -> AppResult<Option<Self>> {
        Ok(sqlx::query_as("SELECT * FROM users WHERE lower(email) = lower(?)")
            .bind(email)
            .fetch_optional(&mut *conn)
            .await?)
    }

    /// Whether `column = value` is held by someone other than `except`.
    async fn is_taken(
        conn: &mut SqliteConnection,
        column: &str,
        value: &str,
        except: Option<i64>,
    ) -> AppResult<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM users WHERE lower({column}) = lower(?) AND id != ?)"
        );
        let (taken,): (i64,) = sqlx::query_as(&sql)
            .bind(value)
            .bind(except.unwrap_or(0))
            .fetch_one(&mut *conn)
            .await?;
        Ok(taken != 0)
    }

    pub async fn username_taken(
        conn: &mut SqliteConnection,
        username: &str,
        except: Option<i64>,
    ) -> AppResult<bool> {
        Self::is_taken(conn, "username", username, except).await
    }

    pub async fn email_taken(
        conn: &mut SqliteConnection,
        email: &str,
        except: Option<i64>,
    ) -> AppResult<bool> {
        Self::is_taken(conn, "email", email, except).await
    }

    pub async fn create(conn: &mut SqliteConnection, user: &NewUser) -> AppResult<i64> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO users (first_name, last_name, username, email, hashed_password, bio,
                               profile_image_url, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.hashed_password)
        .bind(&user.bio)
        .bind(&user.profile_image_url)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn update(conn: &mut SqliteConnection, id: i64, changes: &UserChanges) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE users SET
                first_name = COALESCE(?, first_name),
                last_name = COALESCE(?, last_name),
                username = COALESCE(?, username),
                email = COALESCE(?, email),
                bio = COALESCE(?, bio),
                profile_image_url = COALESCE(?, profile_image_url),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&changes.first_name)
        .bind(&changes.last_name)
        .bind(&changes.username)
        .bind(&changes.email)
        .bind(&changes.bio)
        .bind(&changes.profile_image_url)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Foreign keys cascade the rest of the account's graph.
    pub async fn delete(conn: &mut SqliteConnection, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list(conn: &mut SqliteConnection, limit: i64, offset: i64) -> AppResult<Vec<Self>> {
        Ok(sqlx::query_as("SELECT * FROM users ORDER BY id ASC LIMIT ? OFFSET ?")
            .bind(limit)
            .bind(offset)
            .fetch_all(&mut *conn)
            .await?)
    }

    pub async fn count(conn: &mut SqliteConnection) -> AppResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }

    /// Every stored image URL owned through this account, for release after deletion.
    pub async fn owned_image_urls(conn: &mut SqliteConnection, id: i64) -> AppResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT profile_image_url FROM users WHERE id = ?1
            UNION ALL SELECT image FROM posts WHERE creator = ?1
            UNION ALL SELECT image FROM community_groups WHERE organizer_id = ?1
            UNION ALL SELECT gi.group_image FROM group_images gi
                JOIN community_groups g ON g.id = gi.group_id WHERE g.organizer_id = ?1
            UNION ALL SELECT e.image FROM events e
                JOIN community_groups g ON g.id = e.group_id WHERE g.organizer_id = ?1
            UNION ALL SELECT ei.event_image FROM event_images ei
                JOIN events e ON e.id = ei.event_id
                JOIN community_groups g ON g.id = e.group_id WHERE g.organizer_id = ?1
            "#,
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(|(url,)| url).collect())
    }
}

impl UserProjection {
    pub async fn gen_multi(
        conn: &mut SqliteConnection,
        ids: &[i64],
    ) -> AppResult<HashMap<i64, UserProjection>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {PROJECTION_COLUMNS} FROM users WHERE id IN "));
        push_id_list(&mut qb, ids);
        let users: Vec<UserProjection> = qb.build_query_as().fetch_all(&mut *conn).await?;
        Ok(users.into_iter().map(|user| (user.id, user)).collect())
    }
}
