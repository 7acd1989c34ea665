//! Per-profile orchestration: token checks, concurrent provider fetches,
//! normalization, and merge.

use crate::github::{GitHubApi, GitHubClient};
use crate::gitlab::{fetch_all_events, GitLabApi, GitLabClient};
use crate::store::{ProviderConnection, TokenStore};
use crate::token::{with_token_retry, TokenManager};
use crate::{
    merge, normalize, CombinedSeries, Config, ErrorKind, FetchError, Platform, ProviderSeries,
    RawContributions, StoreError, Window,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Result of one aggregation. A `None` slot means the provider is not
/// connected or its pipeline failed; failures are listed in `errors`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contributions {
    pub github: Option<ProviderSeries>,
    pub gitlab: Option<ProviderSeries>,
    pub combined: Option<CombinedSeries>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<Platform, ErrorKind>,
    #[serde(skip)]
    pub window: Window,
}

impl Contributions {
    pub fn slot(&self, platform: Platform) -> Option<&ProviderSeries> {
        match platform {
            Platform::GitHub => self.github.as_ref(),
            Platform::GitLab => self.gitlab.as_ref(),
        }
    }
}

pub struct Aggregator {
    tokens: TokenManager,
    github: Arc<dyn GitHubApi>,
    gitlab: Arc<dyn GitLabApi>,
}

impl Aggregator {
    pub fn new(tokens: TokenManager, github: Arc<dyn GitHubApi>, gitlab: Arc<dyn GitLabApi>) -> Self {
        Self {
            tokens,
            github,
            gitlab,
        }
    }

    /// Real HTTP clients and OAuth refreshers as described by `config`.
    pub fn from_config(config: &Config, store: Arc<dyn TokenStore>) -> Self {
        let settings = config.http_settings();

        let mut tokens = TokenManager::new(store);
        for platform in Platform::iter() {
            if let Some(refresher) = config.refresher(platform) {
                tokens = tokens.with_refresher(platform, refresher);
            }
        }

        Self::new(
            tokens,
            Arc::new(GitHubClient::new(config.api_url(Platform::GitHub), settings)),
            Arc::new(GitLabClient::new(config.api_url(Platform::GitLab), settings)),
        )
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        self.tokens.store()
    }

    pub async fn aggregate(&self, profile_id: &str) -> Result<Contributions, StoreError> {
        self.aggregate_at(profile_id, Utc::now()).await
    }

    /// `now` fixes both the window and every expiry decision for the whole
    /// run, retries included.
    pub async fn aggregate_at(
        &self,
        profile_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Contributions, StoreError> {
        let window = Window::ending_at(now);

        let mut github_conn = None;
        let mut gitlab_conn = None;
        for conn in self.store().connections(profile_id)? {
            match conn.platform {
                Platform::GitHub => github_conn = Some(conn),
                Platform::GitLab => gitlab_conn = Some(conn),
            }
        }

        tracing::debug!(
            profile = profile_id,
            start = %window.start,
            end = %window.end,
            github = github_conn.is_some(),
            gitlab = gitlab_conn.is_some(),
            "aggregating contributions"
        );

        let (github_result, gitlab_result) = tokio::join!(
            async {
                match github_conn {
                    Some(conn) => Some(self.github_series(conn, now, &window).await),
                    None => None,
                }
            },
            async {
                match gitlab_conn {
                    Some(conn) => Some(self.gitlab_series(conn, now, &window).await),
                    None => None,
                }
            }
        );

        let mut errors = BTreeMap::new();
        let github = settle(Platform::GitHub, github_result, &mut errors);
        let gitlab = settle(Platform::GitLab, gitlab_result, &mut errors);

        let combined = match (&github, &gitlab) {
            (Some(gh), Some(gl)) => merge(gh, gl),
            _ => None,
        };

        Ok(Contributions {
            github,
            gitlab,
            combined,
            errors,
            window,
        })
    }

    async fn github_series(
        &self,
        conn: ProviderConnection,
        now: DateTime<Utc>,
        window: &Window,
    ) -> Result<ProviderSeries, FetchError> {
        let conn = self.tokens.ensure_valid_token(conn, now).await?;
        let username = conn.external_username.clone();
        let api = &self.github;

        let calendar = with_token_retry(&self.tokens, conn, now, |token| {
            let username = username.clone();
            async move { api.contribution_calendar(&token, &username, window).await }
        })
        .await?;

        Ok(normalize(RawContributions::GitHub(calendar), window))
    }

    async fn gitlab_series(
        &self,
        conn: ProviderConnection,
        now: DateTime<Utc>,
        window: &Window,
    ) -> Result<ProviderSeries, FetchError> {
        let conn = self.tokens.ensure_valid_token(conn, now).await?;
        let user_id = conn.external_user_id.clone();
        let api = self.gitlab.as_ref();

        let events = with_token_retry(&self.tokens, conn, now, |token| {
            let user_id = user_id.clone();
            async move { fetch_all_events(api, &token, &user_id, window).await }
        })
        .await?;

        Ok(normalize(RawContributions::GitLab(events), window))
    }
}

fn settle(
    platform: Platform,
    result: Option<Result<ProviderSeries, FetchError>>,
    errors: &mut BTreeMap<Platform, ErrorKind>,
) -> Option<ProviderSeries> {
    match result {
        None => {
            tracing::debug!(%platform, "not connected");
            None
        }
        Some(Ok(series)) => {
            tracing::info!(
                %platform,
                total = series.total,
                days = series.days.len(),
                "provider contributions fetched"
            );
            Some(series)
        }
        Some(Err(err)) => {
            let kind = err.kind();
            tracing::warn!(%platform, %kind, error = %err, "provider fetch failed");
            errors.insert(platform, kind);
            None
        }
    }
}
