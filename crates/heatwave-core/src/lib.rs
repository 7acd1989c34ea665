#![deny(clippy::all)]

pub mod aggregate;
pub mod config;
mod error;
pub mod github;
pub mod gitlab;
mod http;
mod merge;
mod normalize;
mod platforms;
pub mod response;
mod stats;
pub mod store;
pub mod token;
mod window;

pub use aggregate::{Aggregator, Contributions};
pub use config::Config;
pub use error::*;
pub use http::HttpSettings;
pub use merge::*;
pub use normalize::*;
pub use platforms::*;
pub use response::ContributionsResponse;
pub use stats::*;
pub use store::{MemoryTokenStore, ProviderConnection, SqliteTokenStore, TokenStore};
pub use token::{TokenGrant, TokenManager, TokenRefresher};
pub use window::*;

use chrono::NaiveDate;
use serde::Serialize;

pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// One provider's activity count for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContributionDay {
    pub date: NaiveDate,
    pub count: u64,
    pub platform: Platform,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ProviderSeries {
    pub total: u64,
    pub days: Vec<ContributionDay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl ProviderSeries {
    pub fn failed(kind: ErrorKind) -> Self {
        Self {
            total: 0,
            days: Vec::new(),
            error: Some(kind),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn days_total(&self) -> u64 {
        self.days.iter().map(|d| d.count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombinedDay {
    pub date: NaiveDate,
    pub github: u64,
    pub gitlab: u64,
    pub total: u64,
    pub intensity: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedSeries {
    pub total: u64,
    pub github_total: u64,
    pub gitlab_total: u64,
    pub days: Vec<CombinedDay>,
}
