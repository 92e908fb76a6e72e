// Database layer - connection pool, schema bootstrap and shared query helpers

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    QueryBuilder, Sqlite, SqliteConnection, SqlitePool, Transaction,
};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::entities::ent_tag::TAG_VOCABULARY;
use crate::error::{AppError, AppResult};

pub type Tx = Transaction<'static, Sqlite>;

/// Thin wrapper over the pool; every request runs inside one `Tx`.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(config: &Config) -> AppResult<Self> {
        let in_memory = config.database.url.contains(":memory:");

        let mut options = SqliteConnectOptions::from_str(&config.database.url)
            .map_err(|e| AppError::Internal(format!("Invalid DATABASE_URL: {}", e)))?
            .foreign_keys(true);
        if config.is_production() {
            options = options.busy_timeout(Duration::from_secs(30));
        }

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.database.max_connections)
            .min_connections(config.database.min_connections)
            .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
            .test_before_acquire(true);

        // An in-memory database lives and dies with its connection.
        pool_options = if in_memory {
            pool_options.idle_timeout(None).max_lifetime(None)
        } else {
            pool_options
                .idle_timeout(Duration::from_secs(600))
                .max_lifetime(Duration::from_secs(1800))
        };

        let pool = pool_options.connect_with(options).await?;

        info!(
            max_connections = config.database.max_connections,
            in_memory, "Database pool ready"
        );
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn begin(&self) -> AppResult<Tx> {
        Ok(self.pool.begin().await?)
    }

    pub async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Create tables and indexes if missing and seed the tag vocabulary.
    pub async fn initialize(&self) -> AppResult<()> {
        let mut tx = self.begin().await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        for name in TAG_VOCABULARY {
            sqlx::query("INSERT INTO tags (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
                .bind(name)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        info!("Database schema initialized");
        Ok(())
    }
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        hashed_password TEXT NOT NULL,
        bio TEXT NOT NULL DEFAULT '',
        profile_image_url TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        token TEXT PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS user_tags (
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, tag_id)
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        creator INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        caption TEXT NOT NULL,
        image TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS likes (
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL,
        PRIMARY KEY (user_id, post_id)
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS comments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        comment TEXT NOT NULL,
        parent_id INTEGER REFERENCES comments(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS comment_likes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        comment_id INTEGER NOT NULL REFERENCES comments(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL,
        UNIQUE (user_id, comment_id)
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS community_groups (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        organizer_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        about TEXT NOT NULL,
        type TEXT NOT NULL,
        city TEXT NOT NULL,
        state TEXT NOT NULL,
        image TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS memberships (
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        group_id INTEGER NOT NULL REFERENCES community_groups(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL,
        PRIMARY KEY (user_id, group_id)
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS group_images (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        group_id INTEGER NOT NULL REFERENCES community_groups(id) ON DELETE CASCADE,
        group_image TEXT NOT NULL,
        created_at TEXT NOT NULL
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS venues (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        group_id INTEGER NOT NULL REFERENCES community_groups(id) ON DELETE CASCADE,
        address TEXT NOT NULL,
        city TEXT NOT NULL,
        state TEXT NOT NULL,
        zip_code TEXT NOT NULL,
        latitude REAL,
        longitude REAL
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        group_id INTEGER NOT NULL REFERENCES community_groups(id) ON DELETE CASCADE,
        venue_id INTEGER REFERENCES venues(id) ON DELETE SET NULL,
        name TEXT NOT NULL,
        description TEXT NOT NULL,
        type TEXT NOT NULL,
        capacity INTEGER NOT NULL,
        image TEXT NOT NULL,
        start_date TEXT NOT NULL,
        end_date TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        CHECK (end_date > start_date)
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS attendances (
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        event_id INTEGER NOT NULL REFERENCES events(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL,
        PRIMARY KEY (user_id, event_id)
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS event_images (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        event_id INTEGER NOT NULL REFERENCES events(id) ON DELETE CASCADE,
        event_image TEXT NOT NULL,
        created_at TEXT NOT NULL
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS inquiries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        email TEXT NOT NULL,
        phone TEXT,
        organization TEXT,
        subject TEXT NOT NULL,
        message TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        response TEXT,
        created_at TEXT NOT NULL,
        responded_at TEXT
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_user_tags_tag ON user_tags(tag_id)",
    "CREATE INDEX IF NOT EXISTS idx_posts_creator ON posts(creator)",
    "CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_likes_post ON likes(post_id)",
    "CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id)",
    "CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent_id)",
    "CREATE INDEX IF NOT EXISTS idx_comments_user ON comments(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_comments_created_at ON comments(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_comment_likes_comment ON comment_likes(comment_id)",
    "CREATE INDEX IF NOT EXISTS idx_groups_organizer ON community_groups(organizer_id)",
    "CREATE INDEX IF NOT EXISTS idx_groups_city ON community_groups(city)",
    "CREATE INDEX IF NOT EXISTS idx_groups_state ON community_groups(state)",
    "CREATE INDEX IF NOT EXISTS idx_groups_type ON community_groups(type)",
    "CREATE INDEX IF NOT EXISTS idx_memberships_group ON memberships(group_id)",
    "CREATE INDEX IF NOT EXISTS idx_group_images_group ON group_images(group_id)",
    "CREATE INDEX IF NOT EXISTS idx_venues_group ON venues(group_id)",
    "CREATE INDEX IF NOT EXISTS idx_venues_city_state ON venues(city, state)",
    "CREATE INDEX IF NOT EXISTS idx_events_group ON events(group_id)",
    "CREATE INDEX IF NOT EXISTS idx_events_venue ON events(venue_id)",
    "CREATE INDEX IF NOT EXISTS idx_events_type ON events(type)",
    "CREATE INDEX IF NOT EXISTS idx_events_start_date ON events(start_date)",
    "CREATE INDEX IF NOT EXISTS idx_attendances_event ON attendances(event_id)",
    "CREATE INDEX IF NOT EXISTS idx_event_images_event ON event_images(event_id)",
    "CREATE INDEX IF NOT EXISTS idx_inquiries_kind_status ON inquiries(kind, status)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_inquiries_partnership_email ON inquiries(email) WHERE kind = 'partnership'",
];

/// `SELECT <key>, COUNT(*) FROM <table> WHERE <key> IN (ids) GROUP BY <key>` as a map.
///
/// Used by every listing endpoint to compute derived counters for a whole page
/// in one round trip.
pub async fn count_grouped(
    conn: &mut SqliteConnection,
    table: &str,
    key: &str,
    ids: &[i64],
) -> AppResult<HashMap<i64, i64>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {key}, COUNT(*) FROM {table} WHERE {key} IN ("));
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(format!(") GROUP BY {key}"));

    let rows: Vec<(i64, i64)> = qb.build_query_as().fetch_all(&mut *conn).await?;
    Ok(rows.into_iter().collect())
}

/// Start an `IN (...)` list on an existing builder.
pub fn push_id_list(qb: &mut QueryBuilder<'_, Sqlite>, ids: &[i64]) {
    qb.push("(");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_db() -> Database {
        let dir = std::env::temp_dir();
        let config = Config::for_tests(dir.to_str().unwrap());
        let db = Database::connect(&config).await.unwrap();
        db.initialize().await.unwrap();
        db
    }

    #[tokio::test]
    async fn initialize_is_idempotent_and_seeds_vocabulary() {
        let db = memory_db().await;
        db.initialize().await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tags")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count as usize, TAG_VOCABULARY.len());
    }

    #[tokio::test]
    async fn count_grouped_skips_empty_id_lists() {
        let db = memory_db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let counts = count_grouped(&mut conn, "likes", "post_id", &[]).await.unwrap();
        assert!(counts.is_empty());
    }
}
