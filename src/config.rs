use crate::error::{Result, WatchPartyError};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Longest accepted identity token lifetime (one year)
pub const MAX_IDENTITY_TTL_HOURS: i64 = 24 * 365;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Identity token configuration
    pub identity: IdentityConfig,
    /// Live session timing
    pub session: SessionSettings,
    /// Channel behaviour
    pub channel: ChannelSettings,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on (default: 8080)
    pub port: u16,
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
    /// Allowed CORS origins (comma-separated, empty = localhost only)
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Secret used to sign identity tokens (empty = random per process)
    pub secret: String,
    /// Token lifetime in hours
    pub ttl_hours: i64,
    /// Mark the identity cookie as Secure
    pub secure_cookie: bool,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Seconds between keepalive pings
    pub keepalive_interval_secs: u64,
    /// Deadline in seconds for a single outbound write
    pub write_deadline_secs: u64,
}

impl SessionSettings {
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    pub fn write_deadline(&self) -> Duration {
        Duration::from_secs(self.write_deadline_secs)
    }
}

#[derive(Debug, Clone)]
pub struct ChannelSettings {
    /// Length of generated access codes
    pub access_code_length: usize,
    /// Reject enqueue of urls without cached metadata
    pub strict_enqueue: bool,
    /// Optional JSON file seeding the metadata catalog
    pub catalog_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            server: ServerConfig {
                port: get_env_or("SERVER_PORT", "8080").parse().map_err(|_| {
                    WatchPartyError::InvalidConfig("SERVER_PORT must be a valid port number".into())
                })?,
                host: get_env_or("SERVER_HOST", "0.0.0.0"),
                cors_origins: get_env_or("CORS_ORIGINS", "")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            identity: IdentityConfig {
                secret: get_env_or("IDENTITY_SECRET", ""),
                ttl_hours: parse_ttl_hours()?,
                secure_cookie: get_env_or("IDENTITY_COOKIE_SECURE", "false")
                    .parse()
                    .unwrap_or(false),
            },
            session: SessionSettings {
                keepalive_interval_secs: parse_positive("KEEPALIVE_INTERVAL_SECS", 10)?,
                write_deadline_secs: parse_positive("WRITE_DEADLINE_SECS", 5)?,
            },
            channel: ChannelSettings {
                access_code_length: get_env_or("ACCESS_CODE_LENGTH", "6").parse().unwrap_or(6),
                strict_enqueue: get_env_or("STRICT_ENQUEUE", "false")
                    .parse()
                    .unwrap_or(false),
                catalog_path: env::var("CATALOG_PATH")
                    .ok()
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty()),
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "pretty"),
            },
        })
    }

    /// Get the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Parse a strictly positive number, falling back to `default` when unset
fn parse_positive<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr + PartialOrd + Default + std::fmt::Display,
{
    let raw = match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw,
        _ => return Ok(default),
    };

    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Ok(value),
        _ => Err(WatchPartyError::InvalidConfig(format!(
            "{} must be a positive number (default: {})",
            key, default
        ))),
    }
}

fn parse_ttl_hours() -> Result<i64> {
    let hours = parse_positive("IDENTITY_TTL_HOURS", 72)?;
    if hours > MAX_IDENTITY_TTL_HOURS {
        return Err(WatchPartyError::InvalidConfig(format!(
            "IDENTITY_TTL_HOURS must be at most {}",
            MAX_IDENTITY_TTL_HOURS
        )));
    }
    Ok(hours)
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
