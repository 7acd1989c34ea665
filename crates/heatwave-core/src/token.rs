//! Access-token lifecycle: expiry checks, refresh, and the one-shot
//! refresh-and-retry policy around provider fetches.

use crate::http::{build_client, check_status, decode_json, HttpSettings};
use crate::store::{ProviderConnection, TokenStore};
use crate::{FetchError, Platform};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

/// Tokens expiring within this buffer are refreshed before use.
pub const REFRESH_BUFFER_MINUTES: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, FetchError>;
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    error: Option<String>,
}

/// `refresh_token` grant against a provider's OAuth token endpoint.
pub struct OAuthRefresher {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl OAuthRefresher {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        settings: HttpSettings,
    ) -> Self {
        Self {
            http: build_client(settings),
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

#[async_trait]
impl TokenRefresher for OAuthRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, FetchError> {
        let body = RefreshRequest {
            grant_type: "refresh_token",
            refresh_token,
            client_id: &self.client_id,
            client_secret: &self.client_secret,
        };

        let response = self
            .http
            .post(&self.token_url)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;
        let data: RefreshResponse = decode_json(response).await?;

        match data.access_token {
            Some(access_token) if !access_token.is_empty() => Ok(TokenGrant {
                access_token,
                refresh_token: data.refresh_token,
                expires_in: data.expires_in,
            }),
            _ => Err(FetchError::Decode(format!(
                "token endpoint returned no access_token ({})",
                data.error.as_deref().unwrap_or("no error given")
            ))),
        }
    }
}

pub struct TokenManager {
    store: Arc<dyn TokenStore>,
    refreshers: [Option<Arc<dyn TokenRefresher>>; Platform::COUNT],
}

impl TokenManager {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            store,
            refreshers: Default::default(),
        }
    }

    pub fn with_refresher(mut self, platform: Platform, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refreshers[platform as usize] = Some(refresher);
        self
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Returns a connection whose access token can be used at `now`,
    /// refreshing it first when it is expired or inside the buffer.
    pub async fn ensure_valid_token(
        &self,
        connection: ProviderConnection,
        now: DateTime<Utc>,
    ) -> Result<ProviderConnection, FetchError> {
        let Some(expires_at) = connection.expires_at else {
            return Ok(connection);
        };

        if now < expires_at - Duration::minutes(REFRESH_BUFFER_MINUTES) {
            return Ok(connection);
        }

        tracing::debug!(
            platform = %connection.platform,
            profile = %connection.profile_id,
            %expires_at,
            "access token expired or about to expire, refreshing"
        );
        self.force_refresh(connection, now).await
    }

    /// Refreshes regardless of the recorded expiry.
    pub async fn force_refresh(
        &self,
        connection: ProviderConnection,
        now: DateTime<Utc>,
    ) -> Result<ProviderConnection, FetchError> {
        let platform = connection.platform;

        let Some(refresh_token) = connection.refresh_token.clone() else {
            return Err(FetchError::ReauthRequired(format!(
                "{} connection has no refresh token",
                platform.display_name()
            )));
        };

        let Some(refresher) = self.refreshers[platform as usize].as_ref() else {
            return Err(FetchError::ReauthRequired(format!(
                "token refresh is not configured for {}",
                platform.display_name()
            )));
        };

        let grant = match refresher.refresh(&refresh_token).await {
            Ok(grant) => grant,
            Err(err) => {
                tracing::warn!(%platform, profile = %connection.profile_id, error = %err, "token refresh failed");
                return Err(FetchError::ReauthRequired(format!(
                    "{} token refresh failed: {}",
                    platform.display_name(),
                    err
                )));
            }
        };

        let refreshed = apply_grant(connection, grant, now);

        if let Err(err) = self.store.put(&refreshed) {
            tracing::warn!(
                %platform,
                profile = %refreshed.profile_id,
                error = %err,
                "failed to persist refreshed token; continuing with in-memory token"
            );
        } else {
            tracing::debug!(%platform, profile = %refreshed.profile_id, "refreshed token persisted");
        }

        Ok(refreshed)
    }
}

fn apply_grant(
    mut connection: ProviderConnection,
    grant: TokenGrant,
    now: DateTime<Utc>,
) -> ProviderConnection {
    connection.access_token = grant.access_token;
    if let Some(refresh_token) = grant.refresh_token.filter(|t| !t.is_empty()) {
        connection.refresh_token = Some(refresh_token);
    }
    connection.expires_at = grant.expires_in.map(|secs| now + Duration::seconds(secs));
    connection
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Initial,
    RefreshedOnce,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RefreshAndRetry,
    GiveUp,
}

/// `Initial --auth error--> RefreshedOnce --auth error--> Failed`.
#[derive(Debug, Clone, Copy)]
pub struct TokenRetry {
    state: RetryState,
}

impl Default for TokenRetry {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenRetry {
    pub fn new() -> Self {
        Self {
            state: RetryState::Initial,
        }
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    pub fn on_auth_failure(&mut self) -> RetryDecision {
        match self.state {
            RetryState::Initial => {
                self.state = RetryState::RefreshedOnce;
                RetryDecision::RefreshAndRetry
            }
            RetryState::RefreshedOnce | RetryState::Failed => {
                self.state = RetryState::Failed;
                RetryDecision::GiveUp
            }
        }
    }
}

/// Runs `fetch` with the connection's access token. On an auth failure the
/// token is refreshed once and the fetch repeated; a second auth failure
/// becomes [`FetchError::Exhausted`]. Other errors pass through untouched.
pub async fn with_token_retry<T, F, Fut>(
    tokens: &TokenManager,
    mut connection: ProviderConnection,
    now: DateTime<Utc>,
    mut fetch: F,
) -> Result<T, FetchError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut retry = TokenRetry::new();

    loop {
        let err = match fetch(connection.access_token.clone()).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_auth_failure() => err,
            Err(err) => return Err(err),
        };

        match retry.on_auth_failure() {
            RetryDecision::RefreshAndRetry => {
                tracing::debug!(platform = %connection.platform, error = %err, "token rejected, refreshing once");
                connection = tokens.force_refresh(connection, now).await?;
            }
            RetryDecision::GiveUp => {
                tracing::warn!(platform = %connection.platform, "token rejected again after refresh");
                return Err(FetchError::Exhausted);
            }
        }
    }
}
