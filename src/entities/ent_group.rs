// EntGroup - groups, memberships and group images

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::collections::HashMap;

use crate::error::{AppError, AppResult};
use crate::infrastructure::database::count_grouped;

#[derive(Debug, Clone, FromRow)]
pub struct EntGroup {
    pub id: i64,
    pub organizer_id: i64,
    pub name: String,
    pub about: String,
    #[sqlx(rename = "type")]
    pub group_type: String,
    pub city: String,
    pub state: String,
    pub image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct GroupFields {
    pub name: String,
    pub about: String,
    pub group_type: String,
    pub city: String,
    pub state: String,
    pub image: String,
}

/// Listing filters; each present filter narrows the result.
#[derive(Debug, Clone, Default)]
pub struct GroupFilter {
    pub search: Option<String>,
    pub group_type: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl GroupFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" WHERE 1 = 1");
        if let Some(search) = &self.search {
            let pattern = format!("%{}%", search);
            qb.push(" AND (name LIKE ").push_bind(pattern.clone());
            qb.push(" OR about LIKE ").push_bind(pattern);
            qb.push(")");
        }
        if let Some(group_type) = &self.group_type {
            qb.push(" AND type = ").push_bind(group_type.clone());
        }
        if let Some(city) = &self.city {
            qb.push(" AND city LIKE ").push_bind(format!("%{}%", city));
        }
        if let Some(state) = &self.state {
            qb.push(" AND state = ").push_bind(state.clone());
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GroupImage {
    pub id: i64,
    pub group_id: i64,
    pub group_image: String,
    pub created_at: DateTime<Utc>,
}

/// A member row joined with the member's identity.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MemberRow {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub profile_image: String,
    pub joined_at: DateTime<Utc>,
}

impl EntGroup {
    pub async fn gen_nullable(conn: &mut SqliteConnection, id: i64) -> AppResult<Option<Self>> {
        Ok(sqlx::query_as("SELECT * FROM community_groups WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?)
    }

    pub async fn gen_enforce(conn: &mut SqliteConnection, id: i64) -> AppResult<Self> {
        Self::gen_nullable(conn, id)
            .await?
            .ok_or_else(|| AppError::not_found("Group"))
    }

    pub async fn create(conn: &mut SqliteConnection, organizer_id: i64, fields: &GroupFields) -> AppResult<i64> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO community_groups (organizer_id, name, about, type, city, state, image,
                                          created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(organizer_id)
        .bind(&fields.name)
        .bind(&fields.about)
        .bind(&fields.group_type)
        .bind(&fields.city)
        .bind(&fields.state)
        .bind(&fields.image)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn update(conn: &mut SqliteConnection, id: i64, fields: &GroupFields) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE community_groups
            SET name = ?, about = ?, type = ?, city = ?, state = ?, image = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&fields.name)
        .bind(&fields.about)
        .bind(&fields.group_type)
        .bind(&fields.city)
        .bind(&fields.state)
        .bind(&fields.image)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Memberships, venues, events, attendances and images go with the group.
    pub async fn delete(conn: &mut SqliteConnection, id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM community_groups WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Stored objects owned through the group: its image, extra images, event images.
    pub async fn owned_image_urls(conn: &mut SqliteConnection, id: i64) -> AppResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT image FROM community_groups WHERE id = ?1
            UNION ALL SELECT group_image FROM group_images WHERE group_id = ?1
            UNION ALL SELECT image FROM events WHERE group_id = ?1
            UNION ALL SELECT ei.event_image FROM event_images ei
                JOIN events e ON e.id = ei.event_id WHERE e.group_id = ?1
            "#,
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(|(url,)| url).collect())
    }

    pub async fn gen_page(
        conn: &mut SqliteConnection,
        filter: &GroupFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Self>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM community_groups");
        filter.push_where(&mut qb);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ").push_bind(limit);
        qb.push(" OFFSET ").push_bind(offset);
        Ok(qb.build_query_as().fetch_all(&mut *conn).await?)
    }

    pub async fn count(conn: &mut SqliteConnection, filter: &GroupFilter) -> AppResult<i64> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM community_groups");
        filter.push_where(&mut qb);
        let (count,): (i64,) = qb.build_query_as().fetch_one(&mut *conn).await?;
        Ok(count)
    }

    /// Groups the user organizes or belongs to, each once.
    pub async fn gen_for_user(conn: &mut SqliteConnection, user_id: i64) -> AppResult<Vec<Self>> {
        Ok(sqlx::query_as(
            r#"
            SELECT g.* FROM community_groups g
            WHERE g.organizer_id = ?1
               OR g.id IN (SELECT group_id FROM memberships WHERE user_id = ?1)
            ORDER BY g.created_at DESC, g.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?)
    }

    pub async fn member_counts(conn: &mut SqliteConnection, ids: &[i64]) -> AppResult<HashMap<i64, i64>> {
        count_grouped(conn, "memberships", "group_id", ids).await
    }

    pub async fn event_counts(conn: &mut SqliteConnection, ids: &[i64]) -> AppResult<HashMap<i64, i64>> {
        count_grouped(conn, "events", "group_id", ids).await
    }

    pub async fn members(conn: &mut SqliteConnection, group_id: i64) -> AppResult<Vec<MemberRow>> {
        Ok(sqlx::query_as(
            r#"
            SELECT u.id, u.username, u.first_name, u.last_name,
                   u.profile_image_url AS profile_image, m.created_at AS joined_at
            FROM memberships m
            JOIN users u ON u.id = m.user_id
            WHERE m.group_id = ?
            ORDER BY m.created_at ASC, u.id ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(&mut *conn)
        .await?)
    }

    /// Insert the membership if absent; `false` when it already existed.
    pub async fn add_member(conn: &mut SqliteConnection, group_id: i64, user_id: i64) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT INTO memberships (user_id, group_id, created_at) VALUES (?, ?, ?) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(group_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn remove_member(conn: &mut SqliteConnection, group_id: i64, user_id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM memberships WHERE user_id = ? AND group_id = ?")
            .bind(user_id)
            .bind(group_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn images(conn: &mut SqliteConnection, group_id: i64) -> AppResult<Vec<GroupImage>> {
        Ok(sqlx::query_as(
            "SELECT id, group_id, group_image, created_at FROM group_images WHERE group_id = ? ORDER BY id ASC",
        )
        .bind(group_id)
        .fetch_all(&mut *conn)
        .await?)
    }

    pub async fn add_image(conn: &mut SqliteConnection, group_id: i64, url: &str) -> AppResult<GroupImage> {
        let now = Utc::now();
        let result = sqlx::query("INSERT INTO group_images (group_id, group_image, created_at) VALUES (?, ?, ?)")
            .bind(group_id)
            .bind(url)
            .bind(now)
            .execute(&mut *conn)
            .await?;
        Ok(GroupImage {
            id: result.last_insert_rowid(),
            group_id,
            group_image: url.to_string(),
            created_at: now,
        })
    }
}

