// EntInquiry - partnership requests and contact messages

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::fmt;

use crate::error::{AppError, AppResult};
use crate::infrastructure::database::push_id_list;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InquiryKind {
    Partnership,
    Contact,
}

impl InquiryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InquiryKind::Partnership => "partnership",
            InquiryKind::Contact => "contact",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            InquiryKind::Partnership => "Partnership",
            InquiryKind::Contact => "Contact message",
        }
    }
}

impl fmt::Display for InquiryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_RESPONDED: &str = "responded";

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EntInquiry {
    pub id: i64,
    #[serde(skip)]
    pub kind: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub organization: Option<String>,
    pub subject: String,
    pub message: String,
    pub status: String,
    pub response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewInquiry {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub organization: Option<String>,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, FromRow, PartialEq, Eq)]
pub struct InquiryStats {
    pub total: i64,
    pub pending: i64,
    pub responded: i64,
}

impl EntInquiry {
    pub async fn gen_enforce(conn: &mut SqliteConnection, kind: InquiryKind, id: i64) -> AppResult<Self> {
        sqlx::query_as("SELECT * FROM inquiries WHERE id = ? AND kind = ?")
            .bind(id)
            .bind(kind.as_str())
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::not_found(kind.label()))
    }

    pub async fn email_exists(conn: &mut SqliteConnection, kind: InquiryKind, email: &str) -> AppResult<bool> {
        let (exists,): (i64,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM inquiries WHERE kind = ? AND lower(email) = lower(?))",
        )
        .bind(kind.as_str())
        .bind(email)
        .fetch_one(&mut *conn)
        .await?;
        Ok(exists != 0)
    }

    pub async fn create(conn: &mut SqliteConnection, kind: InquiryKind, inquiry: &NewInquiry) -> AppResult<Self> {
        let result = sqlx::query(
            r#"
            INSERT INTO inquiries (kind, first_name, last_name, email, phone, organization,
                                   subject, message, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(kind.as_str())
        .bind(&inquiry.first_name)
        .bind(&inquiry.last_name)
        .bind(&inquiry.email)
        .bind(&inquiry.phone)
        .bind(&inquiry.organization)
        .bind(&inquiry.subject)
        .bind(&inquiry.message)
        .bind(STATUS_PENDING)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
        Self::gen_enforce(conn, kind, result.last_insert_rowid()).await
    }

    pub async fn gen_page(
        conn: &mut SqliteConnection,
        kind: InquiryKind,
        status: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Self>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM inquiries WHERE kind = ");
        qb.push_bind(kind.as_str());
        if let Some(status) = status {
            qb.push(" AND status = ").push_bind(status.to_string());
        }
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ").push_bind(limit);
        qb.push(" OFFSET ").push_bind(offset);
        Ok(qb.build_query_as().fetch_all(&mut *conn).await?)
    }

    pub async fn count(conn: &mut SqliteConnection, kind: InquiryKind, status: Option<&str>) -> AppResult<i64> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM inquiries WHERE kind = ");
        qb.push_bind(kind.as_str());
        if let Some(status) = status {
            qb.push(" AND status = ").push_bind(status.to_string());
        }
        let (count,): (i64,) = qb.build_query_as().fetch_one(&mut *conn).await?;
        Ok(count)
    }

    pub async fn respond(conn: &mut SqliteConnection, id: i64, response: &str) -> AppResult<()> {
        sqlx::query("UPDATE inquiries SET status = ?, response = ?, responded_at = ? WHERE id = ?")
            .bind(STATUS_RESPONDED)
            .bind(response)
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn delete(conn: &mut SqliteConnection, kind: InquiryKind, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM inquiries WHERE id = ? AND kind = ?")
            .bind(id)
            .bind(kind.as_str())
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_many(conn: &mut SqliteConnection, kind: InquiryKind, ids: &[i64]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM inquiries WHERE kind = ");
        qb.push_bind(kind.as_str());
        qb.push(" AND id IN ");
        push_id_list(&mut qb, ids);
        let result = qb.build().execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }

    pub async fn stats(conn: &mut SqliteConnection, kind: InquiryKind) -> AppResult<InquiryStats> {
        Ok(sqlx::query_as(
            r#"
            SELECT COUNT(*) AS total,
                   COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0) AS pending,
                   COALESCE(SUM(CASE WHEN status = 'responded' THEN 1 ELSE 0 END), 0) AS responded
            FROM inquiries
            WHERE kind = ?
            "#,
        )
        .bind(kind.as_str())
        .fetch_one(&mut *conn)
        .await?)
    }
}
