use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;

use crate::error::ConfigError;

/// Deployment mode, selected by `RELAY_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// WebSocket upgrades are served on the HTTP listener.
    Production,
    /// WebSocket upgrades get their own listener on `WS_PORT`.
    Development,
}

impl FromStr for RunMode {
    type Err = std::convert::Infallible;

    /// Anything other than `production` selects development mode.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s.trim().eq_ignore_ascii_case("production") {
            Self::Production
        } else {
            Self::Development
        })
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Production => f.write_str("production"),
            Self::Development => f.write_str("development"),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// Everything except the shared secret has a default suitable for local
/// development.
#[derive(Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: IpAddr,
    /// HTTP port (default: `3000`).
    pub port: u16,
    /// Deployment mode (default: development).
    pub mode: RunMode,
    /// Dedicated WebSocket port, used in development mode (default: `5001`).
    pub ws_port: u16,
    /// Shared HMAC secret for client claims.
    pub ws_secret: String,
    /// JSON document sent to clients in the `opt` message.
    pub options_path: PathBuf,
    /// Directory served as static files.
    pub static_dir: PathBuf,
    /// Claim freshness window in seconds (default: `300`).
    pub token_ttl_secs: i64,
    /// Seconds between heartbeat probes (default: `50`).
    pub heartbeat_interval_secs: u64,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                   | Required | Default                 |
    /// |---------------------------|----------|-------------------------|
    /// | `WS_SECRET`               | **yes**  | --                      |
    /// | `HOST`                    | no       | `0.0.0.0`               |
    /// | `PORT`                    | no       | `3000`                  |
    /// | `RELAY_ENV`               | no       | `development`           |
    /// | `WS_PORT`                 | no       | `5001`                  |
    /// | `OPTIONS_PATH`            | no       | `assets.json`           |
    /// | `STATIC_DIR`              | no       | `public`                |
    /// | `TOKEN_TTL_SECS`          | no       | `300`                   |
    /// | `HEARTBEAT_INTERVAL_SECS` | no       | `50`                    |
    /// | `CORS_ORIGINS`            | no       | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`    | no       | `30`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ws_secret = lookup("WS_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("WS_SECRET"))?;

        let host = parse_var(&lookup, "HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?;
        let port = parse_var(&lookup, "PORT", 3000)?;
        let mode = parse_var(&lookup, "RELAY_ENV", RunMode::Development)?;
        let ws_port = parse_var(&lookup, "WS_PORT", 5001)?;

        let options_path = lookup("OPTIONS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("assets.json"));
        let static_dir = lookup("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("public"));

        let token_ttl_secs: i64 = parse_var(&lookup, "TOKEN_TTL_SECS", 300)?;
        if token_ttl_secs < 0 {
            return Err(ConfigError::Invalid {
                name: "TOKEN_TTL_SECS",
                value: token_ttl_secs.to_string(),
                reason: "must not be negative".into(),
            });
        }

        let heartbeat_interval_secs: u64 = parse_var(&lookup, "HEARTBEAT_INTERVAL_SECS", 50)?;
        if heartbeat_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "HEARTBEAT_INTERVAL_SECS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = parse_var(&lookup, "REQUEST_TIMEOUT_SECS", 30)?;

        Ok(Self {
            host,
            port,
            mode,
            ws_port,
            ws_secret,
            options_path,
            static_dir,
            token_ttl_secs,
            heartbeat_interval_secs,
            cors_origins,
            request_timeout_secs,
        })
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("mode", &self.mode)
            .field("ws_port", &self.ws_port)
            .field("ws_secret", &"<redacted>")
            .field("options_path", &self.options_path)
            .field("static_dir", &self.static_dir)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("heartbeat_interval_secs", &self.heartbeat_interval_secs)
            .field("cors_origins", &self.cors_origins)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let Some(value) = lookup(name) else {
        return Ok(default);
    };
    let parsed = value.trim().parse::<T>();
    parsed.map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
        value,
    })
}

/// Read and parse the options document sent to every authenticated client.
pub fn load_options_document(path: &Path) -> Result<Value, ConfigError> {
    let raw = std::fs::read(path).map_err(|source| ConfigError::OptionsRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&raw).map_err(|source| ConfigError::OptionsParse {
        path: path.to_path_buf(),
        source,
    })
}
