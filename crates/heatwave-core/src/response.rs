//! Body of the `GET contributions` answer handed to callers.

use crate::{Contributions, ContributionSummary};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionsResponse {
    pub success: bool,
    pub contributions: Contributions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ContributionSummary>,
    pub last_updated: String,
}

impl ContributionsResponse {
    /// Always successful: provider failures travel inside `contributions`.
    /// The summary covers the combined series, or the single provider that
    /// succeeded when there is nothing to combine.
    pub fn new(contributions: Contributions, generated_at: DateTime<Utc>) -> Self {
        let window = contributions.window;
        let summary = match (
            &contributions.combined,
            &contributions.github,
            &contributions.gitlab,
        ) {
            (Some(combined), _, _) => Some(ContributionSummary::from_combined(combined, &window)),
            (None, Some(series), None) | (None, None, Some(series)) => {
                Some(ContributionSummary::from_provider(series, &window))
            }
            _ => None,
        };

        Self {
            success: true,
            contributions,
            summary,
            last_updated: generated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContributionDay, ErrorKind, Platform, ProviderSeries, Window};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn now() -> DateTime<Utc> {
        "2024-01-20T09:00:00Z".parse().unwrap()
    }

    fn series(platform: Platform, days: &[(&str, u64)]) -> ProviderSeries {
        let days: Vec<ContributionDay> = days
            .iter()
            .map(|(d, c)| ContributionDay {
                date: NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap(),
                count: *c,
                platform,
            })
            .collect();
        ProviderSeries {
            total: days.iter().map(|d| d.count).sum(),
            days,
            error: None,
        }
    }

    fn contributions(
        github: Option<ProviderSeries>,
        gitlab: Option<ProviderSeries>,
    ) -> Contributions {
        let combined = match (&github, &gitlab) {
            (Some(a), Some(b)) => crate::merge(a, b),
            _ => None,
        };
        Contributions {
            github,
            gitlab,
            combined,
            errors: BTreeMap::new(),
            window: Window::ending_at(now()),
        }
    }

    #[test]
    fn test_response_body_shape() {
        let body = ContributionsResponse::new(
            contributions(
                Some(series(Platform::GitHub, &[("2024-01-01", 5)])),
                Some(series(Platform::GitLab, &[("2024-01-01", 3)])),
            ),
            now(),
        );

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["lastUpdated"], "2024-01-20T09:00:00.000Z");
        assert_eq!(json["contributions"]["combined"]["total"], 8);
        assert_eq!(json["contributions"]["combined"]["githubTotal"], 5);
        assert_eq!(json["contributions"]["combined"]["gitlabTotal"], 3);
        let day = &json["contributions"]["combined"]["days"][0];
        assert_eq!(day["date"], "2024-01-01");
        assert_eq!(day["github"], 5);
        assert_eq!(day["gitlab"], 3);
        assert_eq!(day["total"], 8);
        assert_eq!(day["intensity"], 2);
        assert_eq!(
            json["contributions"]["github"]["days"][0]["platform"],
            "github"
        );
        assert_eq!(json["summary"]["total"], 8);
    }

    #[test]
    fn test_summary_falls_back_to_single_provider() {
        let mut c = contributions(Some(series(Platform::GitHub, &[("2024-01-19", 4)])), None);
        c.errors.insert(Platform::GitLab, ErrorKind::RateLimited);

        let body = ContributionsResponse::new(c, now());
        let summary = body.summary.as_ref().unwrap();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.current_streak, 1);

        let json = serde_json::to_value(&body).unwrap();
        assert!(json["contributions"]["gitlab"].is_null());
        assert_eq!(json["contributions"]["errors"]["gitlab"], "rate_limited");
    }

    #[test]
    fn test_no_summary_when_nothing_succeeded() {
        let body = ContributionsResponse::new(contributions(None, None), now());
        assert!(body.success);
        assert!(body.summary.is_none());
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("summary").is_none());
        assert!(json["contributions"].get("errors").is_none());
    }
}
