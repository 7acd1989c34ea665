//! GitLab activity via the user events listing.
//!
//! GitLab has no pre-aggregated calendar endpoint; events are listed page by
//! page with date filters and counted per day by the normalizer.

use crate::http::{build_client, check_status, decode_json, HttpSettings};
use crate::{FetchError, Window};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

pub const PER_PAGE: u32 = 100;
pub const MAX_PAGES: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitLabEvent {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub action_name: Option<String>,
    #[serde(default)]
    pub target_type: Option<String>,
    #[serde(default)]
    pub project_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventsQuery {
    pub page: u32,
    pub per_page: u32,
    pub after: String,
    pub before: String,
}

impl EventsQuery {
    pub fn first_page(window: &Window) -> Self {
        Self {
            page: 1,
            per_page: PER_PAGE,
            after: window.gitlab_after(),
            before: window.gitlab_before(),
        }
    }
}

#[async_trait]
pub trait GitLabApi: Send + Sync {
    async fn events_page(
        &self,
        token: &str,
        user_id: &str,
        query: &EventsQuery,
    ) -> Result<Vec<GitLabEvent>, FetchError>;
}

pub struct GitLabClient {
    http: reqwest::Client,
    api_url: String,
}

impl GitLabClient {
    pub fn new(api_url: &str, settings: HttpSettings) -> Self {
        Self {
            http: build_client(settings),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl GitLabApi for GitLabClient {
    async fn events_page(
        &self,
        token: &str,
        user_id: &str,
        query: &EventsQuery,
    ) -> Result<Vec<GitLabEvent>, FetchError> {
        let url = format!("{}/users/{}/events", self.api_url, user_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .query(&[
                ("per_page", query.per_page.to_string()),
                ("page", query.page.to_string()),
                ("after", query.after.clone()),
                ("before", query.before.clone()),
            ])
            .send()
            .await?;
        let response = check_status(response).await?;
        decode_json(response).await
    }
}

/// Walks the events listing for `window` until a short or empty page, or
/// until [`MAX_PAGES`] requests have been made. Hitting the cap is logged and
/// the events gathered so far are returned.
pub async fn fetch_all_events(
    api: &dyn GitLabApi,
    token: &str,
    user_id: &str,
    window: &Window,
) -> Result<Vec<GitLabEvent>, FetchError> {
    let mut query = EventsQuery::first_page(window);
    let mut events = Vec::new();

    loop {
        let page = api.events_page(token, user_id, &query).await?;
        let received = page.len();
        tracing::debug!(page = query.page, received, "fetched GitLab events page");

        events.extend(page);

        if received < query.per_page as usize {
            break;
        }

        if query.page >= MAX_PAGES {
            tracing::warn!(
                user_id,
                pages = MAX_PAGES,
                events = events.len(),
                "GitLab pagination limit reached; returning partial events"
            );
            break;
        }

        query.page += 1;
    }

    tracing::debug!(
        user_id,
        events = events.len(),
        pages = query.page,
        after = %query.after,
        before = %query.before,
        "GitLab pagination complete"
    );
    Ok(events)
}
