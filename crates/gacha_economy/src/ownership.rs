//! # Ownership Records
//!
//! One record per drawn character. Records are created once, never mutated,
//! and owned by the store from the moment a batch insert returns `Ok`.

use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use crate::catalog::EntryId;
use crate::error::StoreError;

/// A durable grant of one catalog entry to one user.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OwnershipRecord {
    /// Unique id of this grant.
    pub ownership_id: Uuid,
    /// Owner.
    pub user_id: String,
    /// Granted entry.
    pub entry_id: EntryId,
}

impl OwnershipRecord {
    /// Creates a record with a fresh random id.
    #[must_use]
    pub fn new(user_id: impl Into<String>, entry_id: impl Into<EntryId>) -> Self {
        Self {
            ownership_id: Uuid::new_v4(),
            user_id: user_id.into(),
            entry_id: entry_id.into(),
        }
    }
}

/// Durable storage for ownership records.
///
/// Implementations must accept concurrent `insert_batch` calls from different
/// requests. A batch is all-or-nothing.
pub trait OwnershipStore: Send + Sync {
    /// Persists `records` as one unit.
    fn insert_batch(&self, records: &[OwnershipRecord]) -> Result<(), StoreError>;

    /// Records owned by `user_id`, in insertion order.
    fn list_by_user(&self, user_id: &str) -> Result<Vec<OwnershipRecord>, StoreError>;
}

/// Counters for a store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Successful `insert_batch` calls.
    pub batches: u64,
    /// Records written.
    pub records: u64,
}

/// Per-user index shared by the in-memory and journal stores.
#[derive(Debug, Default)]
pub(crate) struct OwnershipIndex {
    by_user: HashMap<String, Vec<OwnershipRecord>>,
    stats: StoreStats,
}

impl OwnershipIndex {
    pub(crate) fn apply(&mut self, records: &[OwnershipRecord]) {
        for record in records {
            self.by_user
                .entry(record.user_id.clone())
                .or_default()
                .push(record.clone());
        }
        self.stats.batches += 1;
        self.stats.records += records.len() as u64;
    }

    pub(crate) fn list(&self, user_id: &str) -> Vec<OwnershipRecord> {
        self.by_user.get(user_id).cloned().unwrap_or_default()
    }

    pub(crate) const fn stats(&self) -> StoreStats {
        self.stats
    }
}

/// Volatile store, for development and tests.
#[derive(Debug, Default)]
pub struct MemoryOwnershipStore {
    index: RwLock<OwnershipIndex>,
}

impl MemoryOwnershipStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert counters.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        self.index.read().stats()
    }
}

impl OwnershipStore for MemoryOwnershipStore {
    fn insert_batch(&self, records: &[OwnershipRecord]) -> Result<(), StoreError> {
        self.index.write().apply(records);
        Ok(())
    }

    fn list_by_user(&self, user_id: &str) -> Result<Vec<OwnershipRecord>, StoreError> {
        Ok(self.index.read().list(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_get_unique_ids() {
        let a = OwnershipRecord::new("u", "e");
        let b = OwnershipRecord::new("u", "e");
        assert_ne!(a.ownership_id, b.ownership_id);
    }

    #[test]
    fn test_list_by_user_keeps_insertion_order() {
        let store = MemoryOwnershipStore::new();
        let first = vec![OwnershipRecord::new("alice", "a"), OwnershipRecord::new("bob", "b")];
        let second = vec![OwnershipRecord::new("alice", "c")];
        store.insert_batch(&first).unwrap();
        store.insert_batch(&second).unwrap();

        let alice: Vec<_> = store
            .list_by_user("alice")
            .unwrap()
            .into_iter()
            .map(|r| r.entry_id)
            .collect();
        assert_eq!(alice, ["a", "c"]);
        assert!(store.list_by_user("carol").unwrap().is_empty());
        assert_eq!(store.stats(), StoreStats { batches: 2, records: 3 });
    }
}
