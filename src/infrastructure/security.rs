// Credentials and sessions
// Passwords are stored as salted argon2 PHC strings; sessions are opaque random tokens.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Duration, Utc};
use rand::{distr::Alphanumeric, Rng};
use sqlx::SqliteConnection;
use tracing::{debug, instrument};

use crate::error::{AppError, AppResult};

/// Marker stored instead of a hash for accounts that authenticate elsewhere.
pub const OAUTH_PASSWORD_MARKER: &str = "OAUTH";

pub const SESSION_COOKIE: &str = "session";

const SESSION_TOKEN_LEN: usize = 48;

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(stored: &str, candidate: &str) -> bool {
    if stored == OAUTH_PASSWORD_MARKER {
        return false;
    }
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LEN)
        .map(char::from)
        .collect()
}

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

#[instrument(skip(conn))]
pub async fn create_session(
    conn: &mut SqliteConnection,
    user_id: i64,
    ttl_days: i64,
) -> AppResult<Session> {
    let now = Utc::now();
    let session = Session {
        token: generate_token(),
        user_id,
        expires_at: now + Duration::days(ttl_days),
    };

    sqlx::query("INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
        .bind(&session.token)
        .bind(session.user_id)
        .bind(now)
        .bind(session.expires_at)
        .execute(&mut *conn)
        .await?;

    debug!(user_id, "Session created");
    Ok(session)
}

/// Resolve a token to its user, ignoring (and purging) expired sessions.
pub async fn resolve_session(conn: &mut SqliteConnection, token: &str) -> AppResult<Option<i64>> {
    let row: Option<(i64, DateTime<Utc>)> =
        sqlx::query_as("SELECT user_id, expires_at FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(&mut *conn)
            .await?;

    match row {
        Some((user_id, expires_at)) if expires_at > Utc::now() => Ok(Some(user_id)),
        Some(_) => {
            delete_session(conn, token).await?;
            Ok(None)
        }
        None => Ok(None),
    }
}

pub async fn delete_session(conn: &mut SqliteConnection, token: &str) -> AppResult<()> {
    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn delete_user_sessions(conn: &mut SqliteConnection, user_id: i64) -> AppResult<()> {
    sqlx::query("DELETE FROM sessions WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// `Set-Cookie` value carrying a session token.
pub fn session_cookie(token: &str, ttl_days: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        ttl_days * 24 * 60 * 60
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that expires the session cookie.
pub fn clear_session_cookie(secure: bool) -> String {
    let mut cookie = format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE);
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Extract a named cookie from a `Cookie` request header value.
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then_some(value)
    })
}
