// EntVenue - meeting places owned by a group

use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::collections::HashMap;

use crate::error::{AppError, AppResult};
use crate::infrastructure::database::push_id_list;

#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntVenue {
    pub id: i64,
    pub group_id: i64,
    pub address: String,
    pub city: String,
    pub state: String,
    #[serde(rename = "zip")]
    pub zip_code: String,
    #[serde(rename = "lat")]
    pub latitude: Option<f64>,
    #[serde(rename = "lng")]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct VenueFields {
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl EntVenue {
    pub async fn gen_nullable(conn: &mut SqliteConnection, id: i64) -> AppResult<Option<Self>> {
        Ok(sqlx::query_as("SELECT * FROM venues WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?)
    }

    pub async fn gen_enforce(conn: &mut SqliteConnection, id: i64) -> AppResult<Self> {
        Self::gen_nullable(conn, id)
            .await?
            .ok_or_else(|| AppError::not_found("Venue"))
    }

    pub async fn gen_multi(conn: &mut SqliteConnection, ids: &[i64]) -> AppResult<HashMap<i64, Self>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM venues WHERE id IN ");
        push_id_list(&mut qb, ids);
        let venues: Vec<Self> = qb.build_query_as().fetch_all(&mut *conn).await?;
        Ok(venues.into_iter().map(|venue| (venue.id, venue)).collect())
    }

    pub async fn gen_for_group(conn: &mut SqliteConnection, group_id: i64) -> AppResult<Vec<Self>> {
        Ok(sqlx::query_as("SELECT * FROM venues WHERE group_id = ? ORDER BY id ASC")
            .bind(group_id)
            .fetch_all(&mut *conn)
            .await?)
    }

    pub async fn gen_page(conn: &mut SqliteConnection, limit: i64, offset: i64) -> AppResult<Vec<Self>> {
        Ok(sqlx::query_as("SELECT * FROM venues ORDER BY id ASC LIMIT ? OFFSET ?")
            .bind(limit)
            .bind(offset)
            .fetch_all(&mut *conn)
            .await?)
    }

    pub async fn count(conn: &mut SqliteConnection) -> AppResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM venues")
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }

    pub async fn create(conn: &mut SqliteConnection, group_id: i64, fields: &VenueFields) -> AppResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO venues (group_id, address, city, state, zip_code, latitude, longitude)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(group_id)
        .bind(&fields.address)
        .bind(&fields.city)
        .bind(&fields.state)
        .bind(&fields.zip_code)
        .bind(fields.latitude)
        .bind(fields.longitude)
        .execute(&mut *conn)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn update(conn: &mut SqliteConnection, id: i64, fields: &VenueFields) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE venues
            SET address = ?, city = ?, state = ?, zip_code = ?, latitude = ?, longitude = ?
            WHERE id = ?
            "#,
        )
        .bind(&fields.address)
        .bind(&fields.city)
        .bind(&fields.state)
        .bind(&fields.zip_code)
        .bind(fields.latitude)
        .bind(fields.longitude)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Events bound to the venue keep existing with no venue.
    pub async fn delete(conn: &mut SqliteConnection, id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM venues WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}
