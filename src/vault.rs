//! # Token Vault Module
//!
//! Secure key-value storage for backend credentials, keyed by service id. Each
//! service owns two slots: an access token and a refresh token.
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryTokenVault`]: process-local, used by tests and ephemeral sessions.
//! - [`SqliteTokenVault`]: one SQLite table, one row per `(service_id, kind)`.
//!   Blocking SQLite work runs on tokio's blocking pool, so callers see an
//!   ordinary async API.
//!
//! The vault knows nothing about expiry or scopes. Connection semantics live in
//! [`crate::services::ServiceTokens`].

use crate::error::VaultError;
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

/// Which of a service's two credential slots to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// Storage contract for service credentials.
///
/// Deleting a missing entry is not an error.
#[async_trait]
pub trait TokenVault: Send + Sync {
    async fn get(&self, service_id: &str, kind: TokenKind) -> Result<Option<String>, VaultError>;

    async fn set(&self, service_id: &str, kind: TokenKind, value: &str) -> Result<(), VaultError>;

    async fn delete(&self, service_id: &str, kind: TokenKind) -> Result<(), VaultError>;

    async fn get_token(&self, service_id: &str) -> Result<Option<String>, VaultError> {
        self.get(service_id, TokenKind::Access).await
    }

    async fn set_token(&self, service_id: &str, value: &str) -> Result<(), VaultError> {
        self.set(service_id, TokenKind::Access, value).await
    }

    async fn delete_token(&self, service_id: &str) -> Result<(), VaultError> {
        self.delete(service_id, TokenKind::Access).await
    }

    async fn get_refresh_token(&self, service_id: &str) -> Result<Option<String>, VaultError> {
        self.get(service_id, TokenKind::Refresh).await
    }

    async fn set_refresh_token(&self, service_id: &str, value: &str) -> Result<(), VaultError> {
        self.set(service_id, TokenKind::Refresh, value).await
    }

    async fn delete_refresh_token(&self, service_id: &str) -> Result<(), VaultError> {
        self.delete(service_id, TokenKind::Refresh).await
    }
}

/// Vault held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryTokenVault {
    entries: RwLock<BTreeMap<(String, TokenKind), String>>,
}

impl MemoryTokenVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored entry, ordered by service id then kind.
    pub async fn entries(&self) -> BTreeMap<(String, TokenKind), String> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl TokenVault for MemoryTokenVault {
    async fn get(&self, service_id: &str, kind: TokenKind) -> Result<Option<String>, VaultError> {
        let entries = self.entries.read().await;
        Ok(entries.get(&(service_id.to_string(), kind)).cloned())
    }

    async fn set(&self, service_id: &str, kind: TokenKind, value: &str) -> Result<(), VaultError> {
        let mut entries = self.entries.write().await;
        entries.insert((service_id.to_string(), kind), value.to_string());
        Ok(())
    }

    async fn delete(&self, service_id: &str, kind: TokenKind) -> Result<(), VaultError> {
        let mut entries = self.entries.write().await;
        entries.remove(&(service_id.to_string(), kind));
        Ok(())
    }
}

/// Vault persisted in a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteTokenVault {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTokenVault {
    /// Open (or create) the token database at `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or the schema cannot be created.
    pub fn open(path: &Path) -> Result<Self, VaultError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Vault backed by a private in-memory database.
    pub fn open_in_memory() -> Result<Self, VaultError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, VaultError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS tokens (
                service_id TEXT    NOT NULL,
                kind       TEXT    NOT NULL,
                value      TEXT    NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (service_id, kind)
            )",
            (),
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `op` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, op: F) -> Result<T, VaultError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| VaultError::Task("token database lock poisoned".to_string()))?;
            op(&guard).map_err(VaultError::from)
        })
        .await
        .map_err(|e| VaultError::Task(e.to_string()))?
    }
}

#[async_trait]
impl TokenVault for SqliteTokenVault {
    async fn get(&self, service_id: &str, kind: TokenKind) -> Result<Option<String>, VaultError> {
        let service_id = service_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT value FROM tokens WHERE service_id = ?1 AND kind = ?2",
                (&service_id, kind.as_str()),
                |row| row.get(0),
            )
            .optional()
        })
        .await
    }

    async fn set(&self, service_id: &str, kind: TokenKind, value: &str) -> Result<(), VaultError> {
        let service_id = service_id.to_string();
        let value = value.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO tokens (service_id, kind, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(service_id, kind)
                 DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                (&service_id, kind.as_str(), &value, chrono::Utc::now().timestamp()),
            )
            .map(|_| ())
        })
        .await
    }

    async fn delete(&self, service_id: &str, kind: TokenKind) -> Result<(), VaultError> {
        let service_id = service_id.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM tokens WHERE service_id = ?1 AND kind = ?2",
                (&service_id, kind.as_str()),
            )
            .map(|_| ())
        })
        .await
    }
}
