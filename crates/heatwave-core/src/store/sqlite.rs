use super::{ProviderConnection, TokenStore};
use crate::{Platform, StoreError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS provider_connections (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        profile_id TEXT NOT NULL,
        provider TEXT NOT NULL,
        external_user_id TEXT NOT NULL,
        external_username TEXT NOT NULL,
        access_token TEXT NOT NULL,
        refresh_token TEXT,
        expires_at TEXT,
        raw_user_data TEXT NOT NULL DEFAULT 'null',
        updated_at TEXT NOT NULL,
        UNIQUE(profile_id, provider)
    );
"#;

const SELECT_COLUMNS: &str = "profile_id, provider, external_user_id, external_username, \
     access_token, refresh_token, expires_at, raw_user_data";

pub struct SqliteTokenStore {
    conn: Mutex<Connection>,
}

impl SqliteTokenStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

struct RawRow {
    profile_id: String,
    provider: String,
    external_user_id: String,
    external_username: String,
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<String>,
    raw_user_data: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            profile_id: row.get(0)?,
            provider: row.get(1)?,
            external_user_id: row.get(2)?,
            external_username: row.get(3)?,
            access_token: row.get(4)?,
            refresh_token: row.get(5)?,
            expires_at: row.get(6)?,
            raw_user_data: row.get(7)?,
        })
    }

    fn into_connection(self) -> Result<ProviderConnection, StoreError> {
        let platform = Platform::from_str(&self.provider)
            .ok_or_else(|| StoreError::InvalidRow(format!("unknown provider '{}'", self.provider)))?;

        let expires_at = match self.expires_at {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| StoreError::InvalidRow(format!("expires_at '{}': {}", raw, e)))?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        Ok(ProviderConnection {
            profile_id: self.profile_id,
            platform,
            external_user_id: self.external_user_id,
            external_username: self.external_username,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            raw_user_data: serde_json::from_str(&self.raw_user_data)?,
        })
    }
}

impl TokenStore for SqliteTokenStore {
    fn get(
        &self,
        profile_id: &str,
        platform: Platform,
    ) -> Result<Option<ProviderConnection>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM provider_connections WHERE profile_id = ?1 AND provider = ?2",
            SELECT_COLUMNS
        );
        let row = conn
            .query_row(&sql, params![profile_id, platform.as_str()], RawRow::from_row)
            .optional()?;
        row.map(RawRow::into_connection).transpose()
    }

    fn put(&self, connection: &ProviderConnection) -> Result<(), StoreError> {
        let raw_user_data = serde_json::to_string(&connection.raw_user_data)?;
        let expires_at = connection.expires_at.map(|at| at.to_rfc3339());
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO provider_connections
                (profile_id, provider, external_user_id, external_username,
                 access_token, refresh_token, expires_at, raw_user_data, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(profile_id, provider) DO UPDATE SET
                external_user_id = excluded.external_user_id,
                external_username = excluded.external_username,
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                raw_user_data = excluded.raw_user_data,
                updated_at = excluded.updated_at",
            params![
                connection.profile_id,
                connection.platform.as_str(),
                connection.external_user_id,
                connection.external_username,
                connection.access_token,
                connection.refresh_token,
                expires_at,
                raw_user_data,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn connections(&self, profile_id: &str) -> Result<Vec<ProviderConnection>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM provider_connections WHERE profile_id = ?1",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![profile_id], RawRow::from_row)?;

        let mut found = Vec::new();
        for row in rows {
            found.push(row?.into_connection()?);
        }
        found.sort_by_key(|c| c.platform);
        Ok(found)
    }

    fn remove(&self, profile_id: &str, platform: Platform) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM provider_connections WHERE profile_id = ?1 AND provider = ?2",
            params![profile_id, platform.as_str()],
        )?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProviderConnection {
        ProviderConnection::new("profile-1", Platform::GitLab, "1234", "tanuki", "access-1")
            .with_refresh_token("refresh-1")
            .with_expires_at("2024-06-01T12:00:00Z".parse().unwrap())
    }

    #[test]
    fn test_round_trip_preserves_all_fields() {
        let store = SqliteTokenStore::open_in_memory().unwrap();
        let mut conn = sample();
        conn.raw_user_data = serde_json::json!({ "id": 1234, "username": "tanuki" });
        store.put(&conn).unwrap();

        let loaded = store.get("profile-1", Platform::GitLab).unwrap().unwrap();
        assert_eq!(loaded, conn);
    }

    #[test]
    fn test_upsert_keeps_one_row_per_pair() {
        let store = SqliteTokenStore::open_in_memory().unwrap();
        store.put(&sample()).unwrap();

        let mut refreshed = sample();
        refreshed.access_token = "access-2".into();
        refreshed.expires_at = None;
        store.put(&refreshed).unwrap();

        let conns = store.connections("profile-1").unwrap();
        assert_eq!(conns.len(), 1);
        assert_eq!(conns[0].access_token, "access-2");
        assert_eq!(conns[0].expires_at, None);
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/heatwave/connections.db");
        let store = SqliteTokenStore::open(&path).unwrap();
        store.put(&sample()).unwrap();
        drop(store);

        let reopened = SqliteTokenStore::open(&path).unwrap();
        assert!(reopened.get("profile-1", Platform::GitLab).unwrap().is_some());
    }

    #[test]
    fn test_remove_and_missing_lookup() {
        let store = SqliteTokenStore::open_in_memory().unwrap();
        store.put(&sample()).unwrap();
        assert!(store.remove("profile-1", Platform::GitLab).unwrap());
        assert!(!store.remove("profile-1", Platform::GitLab).unwrap());
        assert!(store.get("profile-1", Platform::GitLab).unwrap().is_none());
    }

    #[test]
    fn test_unknown_provider_row_is_rejected() {
        let store = SqliteTokenStore::open_in_memory().unwrap();
        {
            let conn = store.lock().unwrap();
            conn.execute(
                "INSERT INTO provider_connections
                    (profile_id, provider, external_user_id, external_username,
                     access_token, updated_at)
                 VALUES ('p', 'bitbucket', '1', 'x', 't', '2024-01-01T00:00:00Z')",
                [],
            )
            .unwrap();
        }
        assert!(matches!(
            store.connections("p"),
            Err(StoreError::InvalidRow(_))
        ));
    }
}
