// EntEvent - events, attendances and event images

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::collections::HashMap;

use crate::error::{AppError, AppResult};
use crate::infrastructure::database::count_grouped;

/// An event row joined with its group's organizer and name.
#[derive(Debug, Clone, FromRow)]
pub struct EntEvent {
    pub id: i64,
    pub group_id: i64,
    pub venue_id: Option<i64>,
    pub name: String,
    pub description: String,
    #[sqlx(rename = "type")]
    pub event_type: String,
    pub capacity: i64,
    pub image: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub organizer_id: i64,
    pub group_name: String,
    pub group_city: String,
    pub group_state: String,
}

#[derive(Debug, Clone)]
pub struct EventFields {
    pub venue_id: Option<i64>,
    pub name: String,
    pub description: String,
    pub event_type: String,
    pub capacity: i64,
    pub image: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub search: Option<String>,
    pub event_type: Option<String>,
}

impl EventFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" WHERE 1 = 1");
        if let Some(search) = &self.search {
            let pattern = format!("%{}%", search);
            qb.push(" AND (e.name LIKE ").push_bind(pattern.clone());
            qb.push(" OR e.description LIKE ").push_bind(pattern);
            qb.push(")");
        }
        if let Some(event_type) = &self.event_type {
            qb.push(" AND e.type = ").push_bind(event_type.clone());
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EventImage {
    pub id: i64,
    pub event_id: i64,
    pub event_image: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeRow {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub profile_image: String,
    pub attending_since: DateTime<Utc>,
}

const EVENT_SELECT: &str = r#"
    SELECT e.id, e.group_id, e.venue_id, e.name, e.description, e.type, e.capacity, e.image,
           e.start_date, e.end_date, e.created_at, e.updated_at,
           g.organizer_id, g.name AS group_name, g.city AS group_city, g.state AS group_state
    FROM events e
    JOIN community_groups g ON g.id = e.group_id
"#;

impl EntEvent {
    pub async fn gen_nullable(conn: &mut SqliteConnection, id: i64) -> AppResult<Option<Self>> {
        Ok(sqlx::query_as(&format!("{EVENT_SELECT} WHERE e.id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?)
    }

    pub async fn gen_enforce(conn: &mut SqliteConnection, id: i64) -> AppResult<Self> {
        Self::gen_nullable(conn, id)
            .await?
            .ok_or_else(|| AppError::not_found("Event"))
    }

    pub async fn gen_for_group(conn: &mut SqliteConnection, group_id: i64) -> AppResult<Vec<Self>> {
        Ok(sqlx::query_as(&format!(
            "{EVENT_SELECT} WHERE e.group_id = ? ORDER BY e.start_date ASC, e.id ASC"
        ))
        .bind(group_id)
        .fetch_all(&mut *conn)
        .await?)
    }

    pub async fn gen_page(
        conn: &mut SqliteConnection,
        filter: &EventFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Self>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(EVENT_SELECT);
        filter.push_where(&mut qb);
        qb.push(" ORDER BY e.start_date ASC, e.id ASC LIMIT ").push_bind(limit);
        qb.push(" OFFSET ").push_bind(offset);
        Ok(qb.build_query_as().fetch_all(&mut *conn).await?)
    }

    pub async fn count(conn: &mut SqliteConnection, filter: &EventFilter) -> AppResult<i64> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM events e");
        filter.push_where(&mut qb);
        let (count,): (i64,) = qb.build_query_as().fetch_one(&mut *conn).await?;
        Ok(count)
    }

    /// Events the user explicitly attends, soonest first.
    pub async fn gen_attended_by(conn: &mut SqliteConnection, user_id: i64) -> AppResult<Vec<Self>> {
        Ok(sqlx::query_as(&format!(
            "{EVENT_SELECT} JOIN attendances a ON a.event_id = e.id \
             WHERE a.user_id = ? ORDER BY e.start_date ASC, e.id ASC"
        ))
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?)
    }

    pub async fn create(conn: &mut SqliteConnection, group_id: i64, fields: &EventFields) -> AppResult<i64> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO events (group_id, venue_id, name, description, type, capacity, image,
                                start_date, end_date, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(group_id)
        .bind(fields.venue_id)
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(&fields.event_type)
        .bind(fields.capacity)
        .bind(&fields.image)
        .bind(fields.start_date)
        .bind(fields.end_date)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn update(conn: &mut SqliteConnection, id: i64, fields: &EventFields) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE events
            SET venue_id = ?, name = ?, description = ?, type = ?, capacity = ?, image = ?,
                start_date = ?, end_date = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(fields.venue_id)
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(&fields.event_type)
        .bind(fields.capacity)
        .bind(&fields.image)
        .bind(fields.start_date)
        .bind(fields.end_date)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Attendances and event images cascade with the row.
    pub async fn delete(conn: &mut SqliteConnection, id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM events WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn attendee_counts(conn: &mut SqliteConnection, ids: &[i64]) -> AppResult<HashMap<i64, i64>> {
        count_grouped(conn, "attendances", "event_id", ids).await
    }

    pub async fn attendees(conn: &mut SqliteConnection, event_id: i64) -> AppResult<Vec<AttendeeRow>> {
        Ok(sqlx::query_as(
            r#"
            SELECT u.id, u.username, u.first_name, u.last_name,
                   u.profile_image_url AS profile_image, a.created_at AS attending_since
            FROM attendances a
            JOIN users u ON u.id = a.user_id
            WHERE a.event_id = ?
            ORDER BY a.created_at ASC, u.id ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&mut *conn)
        .await?)
    }

    /// Insert the attendance if absent; `false` when it already existed.
    pub async fn add_attendee(conn: &mut SqliteConnection, event_id: i64, user_id: i64) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT INTO attendances (user_id, event_id, created_at) VALUES (?, ?, ?) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(event_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn remove_attendee(conn: &mut SqliteConnection, event_id: i64, user_id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM attendances WHERE user_id = ? AND event_id = ?")
            .bind(user_id)
            .bind(event_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn images(conn: &mut SqliteConnection, event_id: i64) -> AppResult<Vec<EventImage>> {
        Ok(sqlx::query_as(
            "SELECT id, event_id, event_image, created_at FROM event_images WHERE event_id = ? ORDER BY id ASC",
        )
        .bind(event_id)
        .fetch_all(&mut *conn)
        .await?)
    }

    /// The event's own image plus its extra images.
    pub async fn owned_image_urls(conn: &mut SqliteConnection, id: i64) -> AppResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT image FROM events WHERE id = ?1
            UNION ALL SELECT event_image FROM event_images WHERE event_id = ?1
            "#,
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(|(url,)| url).collect())
    }
}

impl EventImage {
    pub async fn gen_enforce(conn: &mut SqliteConnection, id: i64) -> AppResult<Self> {
        sqlx::query_as("SELECT id, event_id, event_image, created_at FROM event_images WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::not_found("Event image"))
    }

    pub async fn create(conn: &mut SqliteConnection, event_id: i64, url: &str) -> AppResult<Self> {
        let now = Utc::now();
        let result = sqlx::query("INSERT INTO event_images (event_id, event_image, created_at) VALUES (?, ?, ?)")
            .bind(event_id)
            .bind(url)
            .bind(now)
            .execute(&mut *conn)
            .await?;
        Ok(EventImage {
            id: result.last_insert_rowid(),
            event_id,
            event_image: url.to_string(),
            created_at: now,
        })
    }

    pub async fn replace(conn: &mut SqliteConnection, id: i64, url: &str) -> AppResult<()> {
        sqlx::query("UPDATE event_images SET event_image = ? WHERE id = ?")
            .bind(url)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn delete(conn: &mut SqliteConnection, id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM event_images WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}
