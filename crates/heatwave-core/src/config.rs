//! TOML configuration with environment overrides.

use crate::token::{OAuthRefresher, TokenRefresher};
use crate::{ConfigError, HttpSettings, Platform};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const CONFIG_ENV: &str = "HEATWAVE_CONFIG";
pub const DATABASE_ENV: &str = "HEATWAVE_DB";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub github: ProviderConfig,
    #[serde(default)]
    pub gitlab: ProviderConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Per-platform overrides; unset URLs fall back to the platform defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub token_url: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    fn credentials(&self) -> Option<(&str, &str)> {
        match (self.client_id.as_deref(), self.client_secret.as_deref()) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Some((id, secret)),
            _ => None,
        }
    }
}

impl Config {
    fn config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".config").join("heatwave"))
    }

    /// `~/.config/heatwave/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }

    /// Reads `path` (a missing file yields defaults) and applies environment
    /// overrides from the process environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::from_file(path)?;
        Ok(config.with_env(|key| std::env::var(key).ok()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.display().to_string(),
            source,
        })
    }

    /// Overlay `GITHUB_CLIENT_ID`, `GITHUB_CLIENT_SECRET`, `GITLAB_CLIENT_ID`,
    /// `GITLAB_CLIENT_SECRET` and `HEATWAVE_DB`.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("GITHUB_CLIENT_ID") {
            self.github.client_id = Some(v);
        }
        if let Some(v) = non_empty("GITHUB_CLIENT_SECRET") {
            self.github.client_secret = Some(v);
        }
        if let Some(v) = non_empty("GITLAB_CLIENT_ID") {
            self.gitlab.client_id = Some(v);
        }
        if let Some(v) = non_empty("GITLAB_CLIENT_SECRET") {
            self.gitlab.client_secret = Some(v);
        }
        if let Some(v) = non_empty(DATABASE_ENV) {
            self.database = Some(v);
        }
        self
    }

    pub fn provider(&self, platform: Platform) -> &ProviderConfig {
        match platform {
            Platform::GitHub => &self.github,
            Platform::GitLab => &self.gitlab,
        }
    }

    pub fn api_url(&self, platform: Platform) -> &str {
        self.provider(platform)
            .api_url
            .as_deref()
            .unwrap_or(platform.data().api_url)
    }

    pub fn token_url(&self, platform: Platform) -> &str {
        self.provider(platform)
            .token_url
            .as_deref()
            .unwrap_or(platform.data().token_url)
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            timeout: Duration::from_secs(self.http.timeout_secs),
            connect_timeout: Duration::from_secs(self.http.connect_timeout_secs),
        }
    }

    /// Connection database path, `~/` expanded. Defaults to
    /// `~/.config/heatwave/connections.db`.
    pub fn database_path(&self) -> Option<PathBuf> {
        match self.database.as_deref() {
            Some(raw) => expand_home(raw),
            None => Self::config_dir().map(|d| d.join("connections.db")),
        }
    }

    /// GitLab always gets a refresher since its OAuth tokens expire; GitHub
    /// only once client credentials are configured.
    pub fn refresher(&self, platform: Platform) -> Option<Arc<dyn TokenRefresher>> {
        let provider = self.provider(platform);
        let (client_id, client_secret) = match (platform, provider.credentials()) {
            (_, Some(creds)) => creds,
            (Platform::GitLab, None) => {
                tracing::debug!("GitLab client credentials not configured; refresh will likely be rejected");
                ("", "")
            }
            (Platform::GitHub, None) => return None,
        };

        Some(Arc::new(OAuthRefresher::new(
            self.token_url(platform),
            client_id,
            client_secret,
            self.http_settings(),
        )))
    }
}

fn expand_home(raw: &str) -> Option<PathBuf> {
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|h| h.join(rest)),
        None => Some(PathBuf::from(raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::from_file(&dir.path().join("nope.toml")).unwrap();
        assert!(config.database.is_none());
        assert_eq!(config.api_url(Platform::GitHub), "https://api.github.com");
        assert_eq!(config.api_url(Platform::GitLab), "https://gitlab.com/api/v4");
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.http.connect_timeout_secs, 10);
    }

    #[test]
    fn test_parses_full_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
database = "/var/lib/heatwave/connections.db"

[gitlab]
api_url = "https://gitlab.example.com/api/v4"
token_url = "https://gitlab.example.com/oauth/token"
client_id = "gl-id"
client_secret = "gl-secret"

[http]
timeout_secs = 5
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(
            config.database_path(),
            Some(PathBuf::from("/var/lib/heatwave/connections.db"))
        );
        assert_eq!(
            config.api_url(Platform::GitLab),
            "https://gitlab.example.com/api/v4"
        );
        assert_eq!(
            config.token_url(Platform::GitLab),
            "https://gitlab.example.com/oauth/token"
        );
        assert_eq!(config.api_url(Platform::GitHub), "https://api.github.com");
        let http = config.http_settings();
        assert_eq!(http.timeout, Duration::from_secs(5));
        assert_eq!(http.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[http\ntimeout_secs = ").unwrap();
        assert!(matches!(
            Config::from_file(&path),
            Err(ConfigError::Toml { .. })
        ));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let config = Config {
            database: Some("/from/file.db".into()),
            ..Default::default()
        }
        .with_env(env(&[
            ("GITHUB_CLIENT_ID", "gh-id"),
            ("GITHUB_CLIENT_SECRET", "gh-secret"),
            ("GITLAB_CLIENT_ID", "  "),
            (DATABASE_ENV, "/from/env.db"),
        ]));

        assert_eq!(config.github.client_id.as_deref(), Some("gh-id"));
        assert_eq!(config.github.client_secret.as_deref(), Some("gh-secret"));
        assert!(config.gitlab.client_id.is_none());
        assert_eq!(config.database.as_deref(), Some("/from/env.db"));
    }

    #[test]
    fn test_github_refresher_requires_credentials() {
        let config = Config::default();
        assert!(config.refresher(Platform::GitHub).is_none());
        assert!(config.refresher(Platform::GitLab).is_some());

        let config = config.with_env(env(&[
            ("GITHUB_CLIENT_ID", "id"),
            ("GITHUB_CLIENT_SECRET", "secret"),
        ]));
        assert!(config.refresher(Platform::GitHub).is_some());
    }

    #[test]
    fn test_database_path_expands_home() {
        let config = Config {
            database: Some("~/data/heatwave.db".into()),
            ..Default::default()
        };
        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                config.database_path(),
                Some(home.join("data").join("heatwave.db"))
            );
        }
    }
}
