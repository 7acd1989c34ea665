//! GitHub contribution calendar via the GraphQL API.
//!
//! GitHub already aggregates contributions per day, so a single query returns
//! the whole window partitioned into weeks; no pagination is involved.

use crate::http::{build_client, check_status, decode_json, HttpSettings};
use crate::{FetchError, Window};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const CALENDAR_QUERY: &str = r#"
query($username: String!, $from: DateTime!, $to: DateTime!) {
  user(login: $username) {
    contributionsCollection(from: $from, to: $to) {
      contributionCalendar {
        totalContributions
        weeks {
          contributionDays {
            date
            contributionCount
          }
        }
      }
    }
  }
}
"#;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionCalendar {
    pub total_contributions: u64,
    pub weeks: Vec<CalendarWeek>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CalendarWeek {
    #[serde(rename = "contributionDays")]
    pub days: Vec<CalendarDay>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    #[serde(rename = "contributionCount")]
    pub count: u64,
}

#[async_trait]
pub trait GitHubApi: Send + Sync {
    async fn contribution_calendar(
        &self,
        token: &str,
        username: &str,
        window: &Window,
    ) -> Result<ContributionCalendar, FetchError>;
}

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'static str,
    variables: CalendarVariables<'a>,
}

#[derive(Serialize)]
struct CalendarVariables<'a> {
    username: &'a str,
    from: String,
    to: String,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<ResponseData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

#[derive(Deserialize)]
struct ResponseData {
    user: Option<UserData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserData {
    contributions_collection: ContributionsCollection,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContributionsCollection {
    contribution_calendar: ContributionCalendar,
}

pub struct GitHubClient {
    http: reqwest::Client,
    graphql_url: String,
}

impl GitHubClient {
    pub fn new(api_url: &str, settings: HttpSettings) -> Self {
        Self {
            http: build_client(settings),
            graphql_url: format!("{}/graphql", api_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn contribution_calendar(
        &self,
        token: &str,
        username: &str,
        window: &Window,
    ) -> Result<ContributionCalendar, FetchError> {
        let request = GraphQlRequest {
            query: CALENDAR_QUERY,
            variables: CalendarVariables {
                username,
                from: window.github_from(),
                to: window.github_to(),
            },
        };

        tracing::debug!(username, from = %window.start, to = %window.end, "querying GitHub contribution calendar");

        let response = self
            .http
            .post(&self.graphql_url)
            .bearer_auth(token)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;
        let body: GraphQlResponse = decode_json(response).await?;

        extract_calendar(body, username)
    }
}

fn extract_calendar(body: GraphQlResponse, username: &str) -> Result<ContributionCalendar, FetchError> {
    if let Some(first) = body.errors.first() {
        if body
            .errors
            .iter()
            .any(|e| e.kind.as_deref() == Some("RATE_LIMITED"))
        {
            return Err(FetchError::RateLimited);
        }
        if first.message.contains("Could not resolve to a User") {
            return Err(FetchError::UserNotFound(username.to_string()));
        }
        return Err(FetchError::GraphQl(first.message.clone()));
    }

    body.data
        .and_then(|d| d.user)
        .map(|u| u.contributions_collection.contribution_calendar)
        .ok_or_else(|| FetchError::UserNotFound(username.to_string()))
}
