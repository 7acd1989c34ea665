pub mod sqlite;

use crate::{Platform, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

pub use sqlite::SqliteTokenStore;

/// OAuth connection between a profile and one provider account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConnection {
    pub profile_id: String,
    pub platform: Platform,
    pub external_user_id: String,
    pub external_username: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing, default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub raw_user_data: serde_json::Value,
}

impl ProviderConnection {
    pub fn new(
        profile_id: impl Into<String>,
        platform: Platform,
        external_user_id: impl Into<String>,
        external_username: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            profile_id: profile_id.into(),
            platform,
            external_user_id: external_user_id.into(),
            external_username: external_username.into(),
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
            raw_user_data: serde_json::Value::Null,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Persistence for provider connections, one row per (profile, platform).
pub trait TokenStore: Send + Sync {
    fn get(
        &self,
        profile_id: &str,
        platform: Platform,
    ) -> Result<Option<ProviderConnection>, StoreError>;

    /// Insert or replace the connection for its (profile, platform) pair.
    fn put(&self, connection: &ProviderConnection) -> Result<(), StoreError>;

    /// All connections of a profile, ordered by platform.
    fn connections(&self, profile_id: &str) -> Result<Vec<ProviderConnection>, StoreError>;

    fn remove(&self, profile_id: &str, platform: Platform) -> Result<bool, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    rows: RwLock<HashMap<(String, Platform), ProviderConnection>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connections(connections: impl IntoIterator<Item = ProviderConnection>) -> Self {
        let rows = connections
            .into_iter()
            .map(|c| ((c.profile_id.clone(), c.platform), c))
            .collect();
        Self {
            rows: RwLock::new(rows),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(
        &self,
        profile_id: &str,
        platform: Platform,
    ) -> Result<Option<ProviderConnection>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::Poisoned)?;
        Ok(rows.get(&(profile_id.to_string(), platform)).cloned())
    }

    fn put(&self, connection: &ProviderConnection) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::Poisoned)?;
        rows.insert(
            (connection.profile_id.clone(), connection.platform),
            connection.clone(),
        );
        Ok(())
    }

    fn connections(&self, profile_id: &str) -> Result<Vec<ProviderConnection>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::Poisoned)?;
        let mut found: Vec<ProviderConnection> = rows
            .values()
            .filter(|c| c.profile_id == profile_id)
            .cloned()
            .collect();
        found.sort_by_key(|c| c.platform);
        Ok(found)
    }

    fn remove(&self, profile_id: &str, platform: Platform) -> Result<bool, StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::Poisoned)?;
        Ok(rows.remove(&(profile_id.to_string(), platform)).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_replaces_existing_pair() {
        let store = MemoryTokenStore::new();
        store
            .put(&ProviderConnection::new("p1", Platform::GitLab, "42", "octo", "old"))
            .unwrap();
        store
            .put(&ProviderConnection::new("p1", Platform::GitLab, "42", "octo", "new"))
            .unwrap();

        let conns = store.connections("p1").unwrap();
        assert_eq!(conns.len(), 1);
        assert_eq!(conns[0].access_token, "new");
    }

    #[test]
    fn test_connections_are_scoped_and_ordered() {
        let store = MemoryTokenStore::with_connections(vec![
            ProviderConnection::new("p1", Platform::GitLab, "1", "a", "t1"),
            ProviderConnection::new("p1", Platform::GitHub, "2", "a", "t2"),
            ProviderConnection::new("p2", Platform::GitHub, "3", "b", "t3"),
        ]);

        let conns = store.connections("p1").unwrap();
        let platforms: Vec<Platform> = conns.iter().map(|c| c.platform).collect();
        assert_eq!(platforms, vec![Platform::GitHub, Platform::GitLab]);
        assert!(store.get("p2", Platform::GitLab).unwrap().is_none());
    }

    #[test]
    fn test_remove_reports_presence() {
        let store = MemoryTokenStore::with_connections(vec![ProviderConnection::new(
            "p1",
            Platform::GitHub,
            "1",
            "a",
            "t",
        )]);
        assert!(store.remove("p1", Platform::GitHub).unwrap());
        assert!(!store.remove("p1", Platform::GitHub).unwrap());
    }

    #[test]
    fn test_tokens_are_not_serialized() {
        let conn = ProviderConnection::new("p1", Platform::GitLab, "1", "a", "secret")
            .with_refresh_token("also-secret");
        let json = serde_json::to_string(&conn).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("\"externalUsername\":\"a\""));
    }
}
