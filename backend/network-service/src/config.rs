/// Configuration management for Network Service
///
/// Loads configuration from environment variables.
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    /// Absent when running against the in-memory store
    pub database: Option<DatabaseConfig>,
    pub auth: AuthConfig,
    pub feed: FeedConfig,
    pub connections: ConnectionConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// HTTP port
    pub http_port: u16,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        matches!(self.env.as_str(), "production" | "prod")
    }
}

/// Database configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .finish()
    }
}

/// Bearer token verification
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .finish()
    }
}

/// Feed sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub trending_limit: usize,
    /// Upper bound on posts scored per trending request
    pub trending_candidates: usize,
    pub category_limit: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
            trending_limit: 20,
            trending_candidates: 100,
            category_limit: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Retries for pair writes that hit a serialization failure or deadlock
    pub write_retries: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { write_retries: 3 }
    }
}

// Default values
fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let app = AppConfig {
            env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env_or("PORT", 8080),
        };

        let database = match std::env::var("DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => Some(DatabaseConfig {
                url,
                max_connections: env_or("DB_MAX_CONNECTIONS", default_max_connections()),
                min_connections: env_or("DB_MIN_CONNECTIONS", default_min_connections()),
                acquire_timeout_secs: env_or(
                    "DB_ACQUIRE_TIMEOUT_SECS",
                    default_acquire_timeout_secs(),
                ),
            }),
            _ if app.is_production() => {
                bail!("DATABASE_URL must be set in production");
            }
            _ => None,
        };

        let auth = AuthConfig {
            jwt_secret: std::env::var("JWT_SECRET")
                .context("JWT_SECRET environment variable not set")?,
        };
        if auth.jwt_secret.is_empty() {
            bail!("JWT_SECRET must not be empty");
        }

        let defaults = FeedConfig::default();
        let feed = FeedConfig {
            default_page_size: env_or("FEED_DEFAULT_PAGE_SIZE", defaults.default_page_size),
            max_page_size: env_or("FEED_MAX_PAGE_SIZE", defaults.max_page_size),
            trending_limit: env_or("FEED_TRENDING_LIMIT", defaults.trending_limit),
            trending_candidates: env_or("FEED_TRENDING_CANDIDATES", defaults.trending_candidates),
            category_limit: env_or("FEED_CATEGORY_LIMIT", defaults.category_limit),
        };

        let connections = ConnectionConfig {
            write_retries: env_or("CONNECTION_WRITE_RETRIES", ConnectionConfig::default().write_retries),
        };

        Ok(Config {
            app,
            database,
            auth,
            feed,
            connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "APP_ENV",
        "PORT",
        "DATABASE_URL",
        "DB_MAX_CONNECTIONS",
        "JWT_SECRET",
        "FEED_DEFAULT_PAGE_SIZE",
        "CONNECTION_WRITE_RETRIES",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        clear_env();
        std::env::set_var("JWT_SECRET", "secret");

        let config = Config::from_env().unwrap();
        assert_eq!(config.app.env, "development");
        assert_eq!(config.app.http_port, 8080);
        assert!(config.database.is_none());
        assert_eq!(config.feed.default_page_size, 10);
        assert_eq!(config.feed.trending_limit, 20);
        assert_eq!(config.connections.write_retries, 3);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_reads_overrides() {
        clear_env();
        std::env::set_var("JWT_SECRET", "secret");
        std::env::set_var("PORT", "9100");
        std::env::set_var("DATABASE_URL", "postgres://localhost/campus");
        std::env::set_var("DB_MAX_CONNECTIONS", "7");
        std::env::set_var("FEED_DEFAULT_PAGE_SIZE", "25");
        std::env::set_var("CONNECTION_WRITE_RETRIES", "5");

        let config = Config::from_env().unwrap();
        assert_eq!(config.app.http_port, 9100);
        let database = config.database.unwrap();
        assert_eq!(database.max_connections, 7);
        assert_eq!(database.min_connections, 5);
        assert_eq!(config.feed.default_page_size, 25);
        assert_eq!(config.connections.write_retries, 5);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_requires_jwt_secret() {
        clear_env();
        assert!(Config::from_env().is_err());
    }

    #[test]
    #[serial]
    fn test_production_requires_database() {
        clear_env();
        std::env::set_var("JWT_SECRET", "secret");
        std::env::set_var("APP_ENV", "production");

        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));

        clear_env();
    }

    #[test]
    fn test_database_url_is_redacted() {
        let database = DatabaseConfig {
            url: "postgres://user:hunter2@db/campus".to_string(),
            max_connections: 1,
            min_connections: 1,
            acquire_timeout_secs: 1,
        };
        assert!(!format!("{:?}", database).contains("hunter2"));
    }
}
