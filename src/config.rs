//! Configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). The server reads [`GatewayConfig`];
//! edit-lock clients read [`ClientConfig`].

use std::net::SocketAddr;
use std::time::Duration;

use chrono::TimeDelta;

/// Shortest lock heartbeat interval a client will use.
pub const MIN_HEARTBEAT: Duration = Duration::from_secs(1);

/// Top-level server configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:8000`).
    pub listen_addr: SocketAddr,

    /// Seconds an edit lock stays active unless cancelled earlier.
    pub lock_ttl_secs: u64,

    /// Take the client identity from the first `X-Forwarded-For` address.
    pub trust_forwarded_for: bool,

    /// Seconds before a request is aborted with `408`.
    pub request_timeout_secs: u64,
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, std::net::AddrParseError> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8000".to_string())
            .parse()?;

        Ok(Self {
            listen_addr,
            lock_ttl_secs: parse_env("LOCK_TTL_SECS", 3600),
            trust_forwarded_for: parse_env_bool("TRUST_FORWARDED_FOR", false),
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", 30),
        })
    }

    /// Lock lifetime as a [`TimeDelta`].
    #[must_use]
    pub fn lock_ttl(&self) -> TimeDelta {
        i64::try_from(self.lock_ttl_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            lock_ttl_secs: 3600,
            trust_forwarded_for: false,
            request_timeout_secs: 30,
        }
    }
}

/// Edit-lock client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the logbook server, without trailing slash.
    pub api_url: String,

    /// Timeout applied to each lock request.
    pub request_timeout: Duration,

    /// Attempts per lock request before giving up on network failures.
    pub max_attempts: u32,

    /// Delay before the first retry; doubled on each further retry.
    pub retry_base: Duration,

    /// Interval between lock heartbeats.
    pub heartbeat: Duration,
}

impl ClientConfig {
    /// Loads client configuration from environment variables.
    ///
    /// Never fails: missing or unparsable values fall back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Self {
            api_url: std::env::var("LOGBOOK_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            request_timeout: Duration::from_millis(parse_env("LOCK_REQUEST_TIMEOUT_MS", 5000)),
            max_attempts: parse_env("LOCK_MAX_ATTEMPTS", defaults.max_attempts).max(1),
            retry_base: Duration::from_millis(parse_env("LOCK_RETRY_BASE_MS", 200)),
            heartbeat: Duration::from_secs(parse_env("LOCK_HEARTBEAT_SECS", 60))
                .max(MIN_HEARTBEAT),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8000".to_string(),
            request_timeout: Duration::from_millis(5000),
            max_attempts: 3,
            retry_base: Duration::from_millis(200),
            heartbeat: Duration::from_secs(60),
        }
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().map(|v| v.to_ascii_lowercase()).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}
