//! Transactional key-value store
//!
//! Entries live in a `redb` database opened on its in-memory backend: every
//! `set` is one write transaction and every `get` one read transaction, so
//! readers see either the previous or the new value, never a torn write.
//! Nothing survives a restart.

use recordgate_shared::Entry;
use redb::backends::InMemoryBackend;
use redb::{Database, ReadableTableMetadata, TableDefinition};
use thiserror::Error;

const ENTRIES: TableDefinition<&str, &str> = TableDefinition::new("entries");

#[derive(Debug, Error)]
pub enum KvError {
    #[error("Key cannot be empty")]
    InvalidKey,

    #[error("Key not found")]
    KeyNotFound,

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl KvError {
    fn unavailable(err: impl Into<redb::Error>) -> Self {
        Self::StoreUnavailable(err.into().to_string())
    }

    /// Short label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InvalidKey => "invalid_key",
            Self::KeyNotFound => "not_found",
            Self::StoreUnavailable(_) => "unavailable",
        }
    }
}

/// Single-key get/set store. Implementations must be safe to share across
/// request tasks.
pub trait KvStore: Send + Sync {
    /// Create or overwrite the entry for `key`.
    fn set(&self, key: &str, value: &str) -> Result<(), KvError>;

    /// Read the current entry for `key`.
    fn get(&self, key: &str) -> Result<Entry, KvError>;

    /// Cheap liveness probe used by the readiness endpoint.
    fn ping(&self) -> Result<(), KvError>;
}

/// `KvStore` backed by an in-memory `redb` database.
pub struct RedbKvStore {
    db: Database,
}

impl std::fmt::Debug for RedbKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbKvStore").finish_non_exhaustive()
    }
}

impl RedbKvStore {
    /// Open a fresh in-memory database and create the entries table.
    pub fn in_memory() -> Result<Self, KvError> {
        let db = redb::Builder::new()
            .create_with_backend(InMemoryBackend::new())
            .map_err(KvError::unavailable)?;

        let txn = db.begin_write().map_err(KvError::unavailable)?;
        txn.open_table(ENTRIES).map_err(KvError::unavailable)?;
        txn.commit().map_err(KvError::unavailable)?;

        Ok(Self { db })
    }
}

impl KvStore for RedbKvStore {
    fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        if key.is_empty() {
            return Err(KvError::InvalidKey);
        }
        let txn = self.db.begin_write().map_err(KvError::unavailable)?;
        {
            let mut table = txn.open_table(ENTRIES).map_err(KvError::unavailable)?;
            table.insert(key, value).map_err(KvError::unavailable)?;
        }
        txn.commit().map_err(KvError::unavailable)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Entry, KvError> {
        if key.is_empty() {
            return Err(KvError::InvalidKey);
        }
        let txn = self.db.begin_read().map_err(KvError::unavailable)?;
        let table = txn.open_table(ENTRIES).map_err(KvError::unavailable)?;
        let value = table
            .get(key)
            .map_err(KvError::unavailable)?
            .ok_or(KvError::KeyNotFound)?;
        Ok(Entry::new(key, value.value()))
    }

    fn ping(&self) -> Result<(), KvError> {
        let txn = self.db.begin_read().map_err(KvError::unavailable)?;
        let table = txn.open_table(ENTRIES).map_err(KvError::unavailable)?;
        table.len().map_err(KvError::unavailable)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn store() -> RedbKvStore {
        RedbKvStore::in_memory().unwrap()
    }

    #[test]
    fn test_set_then_get() {
        let store = store();
        store.set("test", "testValue").unwrap();
        assert_eq!(store.get("test").unwrap(), Entry::new("test", "testValue"));
    }

    #[test]
    fn test_empty_value_is_allowed() {
        let store = store();
        store.set("test", "").unwrap();
        assert_eq!(store.get("test").unwrap().value, "");
    }

    #[test]
    fn test_empty_key_rejected() {
        let store = store();
        assert!(matches!(store.set("", "testValue"), Err(KvError::InvalidKey)));
        assert!(matches!(store.get(""), Err(KvError::InvalidKey)));
        assert_eq!(KvError::InvalidKey.to_string(), "Key cannot be empty");
    }

    #[test]
    fn test_unknown_key() {
        let store = store();
        store.set("test", "").unwrap();
        let err = store.get("test1").unwrap_err();
        assert!(matches!(err, KvError::KeyNotFound));
        assert_eq!(err.to_string(), "Key not found");
    }

    #[test]
    fn test_overwrite_keeps_last_value() {
        let store = store();
        store.set("k", "v1").unwrap();
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap(), Entry::new("k", "v2"));
    }

    #[test]
    fn test_stores_are_independent() {
        let a = store();
        let b = store();
        a.set("k", "v").unwrap();
        assert!(matches!(b.get("k"), Err(KvError::KeyNotFound)));
    }

    #[test]
    fn test_ping() {
        assert!(store().ping().is_ok());
    }

    #[test]
    fn test_concurrent_writes_on_distinct_keys() {
        let store = Arc::new(store());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let key = format!("key-{}", t);
                        store.set(&key, &format!("value-{}-{}", t, i)).unwrap();
                        let read = store.get(&key).unwrap();
                        assert_eq!(read.value, format!("value-{}-{}", t, i));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        for t in 0..8 {
            let entry = store.get(&format!("key-{}", t)).unwrap();
            assert_eq!(entry.value, format!("value-{}-49", t));
        }
    }
}
