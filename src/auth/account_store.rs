//! Account Storage
//! Mission: Persist account records with atomic uniqueness on handle and address

use crate::auth::models::{Account, NewAccount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::{collections::HashMap, path::Path, sync::Arc};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Store failures
#[derive(Debug, Error)]
pub enum StoreError {
    /// The handle or address is already taken
    #[error("account already exists")]
    Conflict,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Persistence seam for account records
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Look up an account by its (normalized) contact address
    async fn find_by_address(&self, address: &str) -> Result<Option<Account>, StoreError>;

    /// Look up an account by id
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    /// Insert a new account. Fails with `Conflict` if either unique field is taken.
    async fn insert(&self, account: NewAccount) -> Result<Account, StoreError>;
}

/// Account storage with SQLite backend
#[derive(Clone)]
pub struct SqliteAccountStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAccountStore {
    /// Open (or create) the database and initialize the schema
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        let conn = Connection::open(db_path)
            .with_context(|| format!("open account db at {}", db_path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();

        Self::init_db(&conn)?;
        info!("Account store opened at {}", db_path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Private in-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory account db")?;
        Self::init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_db(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                handle TEXT UNIQUE NOT NULL,
                address TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )
        .context("create accounts table")?;
        Ok(())
    }

    fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
        let id: String = row.get(0)?;
        let id = Uuid::parse_str(&id).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, e.into())
        })?;
        let created_at: String = row.get(4)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, e.into())
            })?;

        Ok(Account {
            id,
            handle: row.get(1)?,
            address: row.get(2)?,
            password_hash: row.get(3)?,
            created_at,
        })
    }
}

impl SqliteAccountStore {
    /// Run `op` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || op(&conn.lock()))
            .await
            .context("account store task failed")?
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

#[async_trait]
impl AccountStore for SqliteAccountStore {
    async fn find_by_address(&self, address: &str) -> Result<Option<Account>, StoreError> {
        let address = address.to_string();
        self.with_conn(move |conn| {
            let account = conn
                .prepare_cached(
                    "SELECT id, handle, address, password_hash, created_at
                     FROM accounts WHERE address = ?1",
                )
                .and_then(|mut stmt| {
                    stmt.query_row(params![address], Self::row_to_account)
                        .optional()
                })
                .context("query account by address")?;
            Ok(account)
        })
        .await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        self.with_conn(move |conn| {
            let account = conn
                .prepare_cached(
                    "SELECT id, handle, address, password_hash, created_at
                     FROM accounts WHERE id = ?1",
                )
                .and_then(|mut stmt| {
                    stmt.query_row(params![id.to_string()], Self::row_to_account)
                        .optional()
                })
                .context("query account by id")?;
            Ok(account)
        })
        .await
    }

    async fn insert(&self, account: NewAccount) -> Result<Account, StoreError> {
        let account = Account {
            id: Uuid::new_v4(),
            handle: account.handle,
            address: account.address,
            password_hash: account.password_hash,
            created_at: Utc::now(),
        };

        self.with_conn(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO accounts (id, handle, address, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    account.id.to_string(),
                    account.handle,
                    account.address,
                    account.password_hash,
                    account.created_at.to_rfc3339(),
                ],
            );

            match inserted {
                Ok(_) => Ok(account),
                Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict),
                Err(e) => Err(anyhow::Error::new(e).context("insert account").into()),
            }
        })
        .await
    }
}

/// In-memory account storage
#[derive(Clone, Default)]
pub struct MemoryAccountStore {
    accounts: Arc<RwLock<HashMap<Uuid, Account>>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_address(&self, address: &str) -> Result<Option<Account>, StoreError> {
        Ok(self
            .accounts
            .read()
            .values()
            .find(|a| a.address == address)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.read().get(&id).cloned())
    }

    async fn insert(&self, account: NewAccount) -> Result<Account, StoreError> {
        // Check and insert under one write lock.
        let mut accounts = self.accounts.write();
        let taken = accounts
            .values()
            .any(|a| a.handle == account.handle || a.address == account.address);
        if taken {
            return Err(StoreError::Conflict);
        }

        let account = Account {
            id: Uuid::new_v4(),
            handle: account.handle,
            address: account.address,
            password_hash: account.password_hash,
            created_at: Utc::now(),
        };
        accounts.insert(account.id, account.clone());
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn new_account(handle: &str, address: &str) -> NewAccount {
        NewAccount {
            handle: handle.to_string(),
            address: address.to_string(),
            password_hash: "$2b$04$digest".to_string(),
        }
    }

    fn create_test_store() -> (SqliteAccountStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = SqliteAccountStore::open(temp_file.path()).unwrap();
        (store, temp_file)
    }

    async fn exercise_insert_and_lookup(store: &dyn AccountStore) {
        let created = store.insert(new_account("alice", "a@x.com")).await.unwrap();
        assert_eq!(created.handle, "alice");

        let by_address = store.find_by_address("a@x.com").await.unwrap().unwrap();
        assert_eq!(by_address.id, created.id);
        assert_eq!(by_address.password_hash, "$2b$04$digest");

        let by_id = store.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.address, "a@x.com");

        assert!(store.find_by_address("nobody@x.com").await.unwrap().is_none());
        assert!(store.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    async fn exercise_uniqueness(store: &dyn AccountStore) {
        store.insert(new_account("alice", "a@x.com")).await.unwrap();

        let same_address = store.insert(new_account("alice2", "a@x.com")).await;
        assert!(matches!(same_address, Err(StoreError::Conflict)));

        let same_handle = store.insert(new_account("alice", "b@x.com")).await;
        assert!(matches!(same_handle, Err(StoreError::Conflict)));

        assert!(store.find_by_address("b@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_insert_and_lookup() {
        let (store, _temp) = create_test_store();
        exercise_insert_and_lookup(&store).await;
    }

    #[tokio::test]
    async fn test_sqlite_uniqueness() {
        let (store, _temp) = create_test_store();
        exercise_uniqueness(&store).await;
    }

    #[tokio::test]
    async fn test_sqlite_survives_reopen() {
        let temp_file = NamedTempFile::new().unwrap();
        let id = {
            let store = SqliteAccountStore::open(temp_file.path()).unwrap();
            store.insert(new_account("alice", "a@x.com")).await.unwrap().id
        };

        let reopened = SqliteAccountStore::open(temp_file.path()).unwrap();
        let account = reopened.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(account.handle, "alice");
    }

    #[tokio::test]
    async fn test_sqlite_in_memory() {
        let store = SqliteAccountStore::open_in_memory().unwrap();
        exercise_insert_and_lookup(&store).await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_sqlite_wait_does_not_stall_runtime() {
        let store = SqliteAccountStore::open_in_memory().unwrap();
        let id = store.insert(new_account("alice", "a@x.com")).await.unwrap().id;

        // Hold the connection so the lookup has to wait for it.
        let guard = store.conn.lock();
        let lookup = tokio::spawn({
            let store = store.clone();
            async move { store.find_by_id(id).await }
        });

        // The single runtime thread keeps running timers meanwhile.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!lookup.is_finished());

        drop(guard);
        let found = lookup.await.unwrap().unwrap().unwrap();
        assert_eq!(found.handle, "alice");
    }

    #[tokio::test]
    async fn test_memory_insert_and_lookup() {
        let store = MemoryAccountStore::new();
        exercise_insert_and_lookup(&store).await;
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_uniqueness() {
        let store = MemoryAccountStore::new();
        exercise_uniqueness(&store).await;
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_registration_single_winner() {
        let (store, _temp) = create_test_store();
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .insert(new_account(&format!("alice{i}"), "a@x.com"))
                    .await
            }));
        }

        let mut ok = 0;
        let mut conflicts = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(StoreError::Conflict) => conflicts += 1,
                Err(e) => panic!("unexpected store error: {e}"),
            }
        }

        assert_eq!(ok, 1);
        assert_eq!(conflicts, 7);
    }
}
