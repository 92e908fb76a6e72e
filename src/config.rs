use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub session: SessionConfig,
    pub mail: Option<MailConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub upload_dir: String,
    pub public_url: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub ttl_days: i64,
}

/// SMTP settings for inquiry notifications. Absent when any variable is unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub sender: String,
    pub receiver: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub host: String,
    pub port: u16,
}

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = match env::var("APP_ENV")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "production" => Environment::Production,
            _ => Environment::Development,
        };

        Ok(Self {
            environment,
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:data/mencrytoo.db?mode=rwc".to_string()),
                max_connections: parse_var("DB_MAX_CONNECTIONS", 10)?,
                min_connections: parse_var("DB_MIN_CONNECTIONS", 1)?,
                acquire_timeout_secs: parse_var("DB_ACQUIRE_TIMEOUT_SECS", 8)?,
            },
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("SERVER_PORT", 8000)?,
                static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "react-app/dist".to_string()),
            },
            storage: StorageConfig {
                upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
                public_url: env::var("UPLOAD_PUBLIC_URL").unwrap_or_else(|_| "/uploads".to_string()),
                max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            },
            session: SessionConfig {
                ttl_days: parse_var("SESSION_TTL_DAYS", 7)?,
            },
            mail: mail_from_env()?,
        })
    }

    /// Settings used by the test-suite: in-memory database on a single connection.
    pub fn for_tests(upload_dir: &str) -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
                min_connections: 1,
                acquire_timeout_secs: 8,
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                static_dir: upload_dir.to_string(),
            },
            storage: StorageConfig {
                upload_dir: upload_dir.to_string(),
                public_url: "/uploads".to_string(),
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            },
            session: SessionConfig { ttl_days: 7 },
            mail: None,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_var<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e)),
        Err(_) => Ok(default),
    }
}

fn mail_from_env() -> anyhow::Result<Option<MailConfig>> {
    let vars = (
        env::var("SENDER_EMAIL"),
        env::var("RECEIVER_EMAIL"),
        env::var("EMAIL_USERNAME"),
        env::var("EMAIL_PASSWORD"),
        env::var("EMAIL_HOST"),
    );
    match vars {
        (Ok(sender), Ok(receiver), Ok(username), Ok(password), Ok(host)) => Ok(Some(MailConfig {
            sender,
            receiver,
            username,
            password,
            host,
            port: parse_var("EMAIL_PORT", 587)?,
        })),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_falls_back_to_default() {
        let value: u32 = parse_var("MENCRYTOO_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_config_uses_single_memory_connection() {
        let config = Config::for_tests("/tmp/uploads");
        assert_eq!(config.database.max_connections, 1);
        assert!(!config.is_production());
        assert_eq!(config.storage.max_upload_bytes, 5 * 1024 * 1024);
        assert!(config.mail.is_none());
    }
}
