use std::time::Duration;

use recap_queue::QueueSettings;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`). Does not apply to
    /// an event stream once its headers are sent.
    pub request_timeout_secs: u64,
    /// Largest accepted request body in bytes (default: `65536`).
    pub max_body_bytes: usize,
    /// Interval between keep-alive frames on event streams (default: `30` s).
    pub stream_keepalive: Duration,
    /// JWT token configuration.
    pub jwt: JwtConfig,
    /// Admission and queue tuning.
    pub queue: QueueSettings,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                    |
    /// |-------------------------|----------------------------|
    /// | `HOST`                  | `0.0.0.0`                  |
    /// | `PORT`                  | `3000`                     |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                       |
    /// | `MAX_BODY_BYTES`        | `65536`                    |
    /// | `STREAM_KEEPALIVE_SECS` | `30`                       |
    ///
    /// JWT settings come from [`JwtConfig::from_env`], queue settings from
    /// [`QueueSettings::from_env`].
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let max_body_bytes: usize = std::env::var("MAX_BODY_BYTES")
            .unwrap_or_else(|_| "65536".into())
            .parse()
            .expect("MAX_BODY_BYTES must be a valid usize");

        let stream_keepalive_secs: u64 = std::env::var("STREAM_KEEPALIVE_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("STREAM_KEEPALIVE_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            max_body_bytes,
            stream_keepalive: Duration::from_secs(stream_keepalive_secs.max(1)),
            jwt: JwtConfig::from_env(),
            queue: QueueSettings::from_env(),
        }
    }
}
