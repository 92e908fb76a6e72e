// EntTag - interest vocabulary and user affinities

use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};

use crate::error::{AppError, AppResult};

pub const TAG_VOCABULARY: [&str; 10] = [
    "ANGER",
    "ANXIETY",
    "DEPRESSION",
    "SUBSTANCE ABUSE",
    "STRESS",
    "TRAUMA",
    "RELATIONSHIPS",
    "GRIEF",
    "COMING OUT",
    "SUICIDAL THOUGHTS",
];

pub const MAX_TAG_NAME_LEN: usize = 30;

#[derive(Debug, Clone, Serialize, FromRow, PartialEq, Eq)]
pub struct EntTag {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TagUsage {
    pub id: i64,
    pub name: String,
    pub user_count: i64,
}

/// Tag names are stored upper-case with collapsed whitespace.
pub fn normalize(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

impl EntTag {
    pub async fn gen_all(conn: &mut SqliteConnection) -> AppResult<Vec<Self>> {
        Ok(sqlx::query_as("SELECT id, name FROM tags ORDER BY name ASC")
            .fetch_all(&mut *conn)
            .await?)
    }

    pub async fn gen_enforce(conn: &mut SqliteConnection, id: i64) -> AppResult<Self> {
        sqlx::query_as("SELECT id, name FROM tags WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::not_found("Tag"))
    }

    pub async fn gen_by_name(conn: &mut SqliteConnection, name: &str) -> AppResult<Option<Self>> {
        Ok(sqlx::query_as("SELECT id, name FROM tags WHERE name = ?")
            .bind(normalize(name))
            .fetch_optional(&mut *conn)
            .await?)
    }

    pub async fn for_user(conn: &mut SqliteConnection, user_id: i64) -> AppResult<Vec<Self>> {
        Ok(sqlx::query_as(
            r#"
            SELECT t.id, t.name FROM tags t
            JOIN user_tags ut ON ut.tag_id = t.id
            WHERE ut.user_id = ?
            ORDER BY t.name ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?)
    }

    /// Link the user to every name that already exists; unknown names are ignored.
    pub async fn attach_known(
        conn: &mut SqliteConnection,
        user_id: i64,
        names: &[String],
    ) -> AppResult<()> {
        for name in names {
            if let Some(tag) = Self::gen_by_name(conn, name).await? {
                link(conn, user_id, tag.id).await?;
            }
        }
        Ok(())
    }

    /// Link the user to every name, creating tags that do not exist yet.
    pub async fn attach_or_create(
        conn: &mut SqliteConnection,
        user_id: i64,
        names: &[String],
    ) -> AppResult<()> {
        for name in names {
            let name = normalize(name);
            if name.is_empty() {
                continue;
            }
            if name.chars().count() > MAX_TAG_NAME_LEN {
                return Err(AppError::Validation(format!(
                    "Tag names are at most {} characters",
                    MAX_TAG_NAME_LEN
                )));
            }
            sqlx::query("INSERT INTO tags (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
                .bind(&name)
                .execute(&mut *conn)
                .await?;
            let (tag_id,): (i64,) = sqlx::query_as("SELECT id FROM tags WHERE name = ?")
                .bind(&name)
                .fetch_one(&mut *conn)
                .await?;
            link(conn, user_id, tag_id).await?;
        }
        Ok(())
    }

    pub async fn user_count(conn: &mut SqliteConnection, tag_id: i64) -> AppResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM user_tags WHERE tag_id = ?")
            .bind(tag_id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }

    pub async fn popular(conn: &mut SqliteConnection, limit: i64) -> AppResult<Vec<TagUsage>> {
        Ok(sqlx::query_as(
            r#"
            SELECT t.id, t.name, COUNT(ut.user_id) AS user_count
            FROM tags t
            LEFT JOIN user_tags ut ON ut.tag_id = t.id
            GROUP BY t.id, t.name
            ORDER BY user_count DESC, t.name ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?)
    }

    /// Distinct users other than `user_id` sharing at least one tag with them.
    pub async fn similar_users(conn: &mut SqliteConnection, user_id: i64) -> AppResult<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT other.user_id
            FROM user_tags mine
            JOIN user_tags other ON other.tag_id = mine.tag_id
            WHERE mine.user_id = ?1 AND other.user_id != ?1
            ORDER BY other.user_id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn search(conn: &mut SqliteConnection, query: &str) -> AppResult<Vec<Self>> {
        Ok(
            sqlx::query_as("SELECT id, name FROM tags WHERE name LIKE ? ORDER BY name ASC")
                .bind(format!("%{}%", normalize(query)))
                .fetch_all(&mut *conn)
                .await?,
        )
    }
}

async fn link(conn: &mut SqliteConnection, user_id: i64, tag_id: i64) -> AppResult<()> {
    sqlx::query("INSERT INTO user_tags (user_id, tag_id) VALUES (?, ?) ON CONFLICT DO NOTHING")
        .bind(user_id)
        .bind(tag_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_upper_cases_and_collapses_spaces() {
        assert_eq!(normalize(" coming   out "), "COMING OUT");
        assert_eq!(normalize("Anxiety"), "ANXIETY");
    }

    #[test]
    fn vocabulary_is_already_normalized() {
        for name in TAG_VOCABULARY {
            assert_eq!(normalize(name), name);
            assert!(name.len() <= MAX_TAG_NAME_LEN);
        }
    }
}
