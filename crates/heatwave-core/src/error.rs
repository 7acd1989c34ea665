use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller-facing failure classes for a single provider pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ReauthRequired,
    RateLimited,
    FetchFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ReauthRequired => "reauth_required",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::FetchFailed => "fetch_failed",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// The provider rejected the access token (HTTP 401 / `invalid_token`).
    #[error("access token rejected by provider")]
    Unauthorized,

    #[error("re-authentication required: {0}")]
    ReauthRequired(String),

    #[error("rate limited by provider")]
    RateLimited,

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to decode provider response: {0}")]
    Decode(String),

    /// The token was refreshed once and the provider still rejected it.
    #[error("access token still rejected after refresh")]
    Exhausted,
}

impl FetchError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, FetchError::Unauthorized)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::ReauthRequired(_) => ErrorKind::ReauthRequired,
            FetchError::RateLimited => ErrorKind::RateLimited,
            _ => ErrorKind::FetchFailed,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid stored user data: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid connection row: {0}")]
    InvalidRow(String),

    #[error("connection store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
