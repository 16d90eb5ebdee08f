//! # Batched Ownership Writes
//!
//! Records are streamed through a fixed-size buffer. A full buffer is flushed
//! as one `insert_batch` call; `finish` flushes the remainder. Memory and
//! statement size stay bounded by the batch size regardless of draw count.
//!
//! ```text
//!   draws ──> [buffer: batch_size] ──full──> insert_batch ──> store
//!                                  ──finish─> insert_batch (remainder)
//! ```

use crate::error::StoreError;
use crate::ownership::{OwnershipRecord, OwnershipStore};

/// Default records per batch.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Counters for one batcher.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Batches flushed.
    pub batches: u64,
    /// Records durably written.
    pub records: u64,
}

/// Streams records into an [`OwnershipStore`] in bounded batches.
pub struct OwnershipBatcher<'a, S: OwnershipStore + ?Sized> {
    store: &'a S,
    batch_size: usize,
    buffer: Vec<OwnershipRecord>,
    stats: BatchStats,
}

impl<'a, S: OwnershipStore + ?Sized> OwnershipBatcher<'a, S> {
    /// Creates a batcher expecting about `expected` records.
    ///
    /// The buffer is sized to `min(batch_size, expected)`. A zero batch size
    /// is treated as one.
    pub fn new(store: &'a S, batch_size: usize, expected: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            store,
            batch_size,
            buffer: Vec::with_capacity(batch_size.min(expected)),
            stats: BatchStats::default(),
        }
    }

    /// Buffers a record, flushing if the buffer is full.
    ///
    /// # Errors
    ///
    /// Propagates the store error of a failed flush. The failed batch is
    /// discarded; nothing in it was written.
    pub fn push(&mut self, record: OwnershipRecord) -> Result<(), StoreError> {
        self.buffer.push(record);
        if self.buffer.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Flushes any buffered records.
    ///
    /// # Errors
    ///
    /// Propagates the store error.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let result = self.store.insert_batch(&self.buffer);
        let len = self.buffer.len();
        self.buffer.clear();
        result?;

        self.stats.batches += 1;
        self.stats.records += len as u64;
        tracing::debug!(
            "Flushed ownership batch {} ({} records)",
            self.stats.batches,
            len
        );
        Ok(())
    }

    /// Flushes the remainder and returns the counters.
    ///
    /// # Errors
    ///
    /// Propagates the store error.
    pub fn finish(mut self) -> Result<BatchStats, StoreError> {
        self.flush()?;
        Ok(self.stats)
    }

    /// Counters so far.
    #[must_use]
    pub const fn stats(&self) -> BatchStats {
        self.stats
    }

    /// Records waiting in the buffer.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ownership::MemoryOwnershipStore;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recording {
        sizes: Mutex<Vec<usize>>,
        fail_on: Option<usize>,
    }

    impl OwnershipStore for Recording {
        fn insert_batch(&self, records: &[OwnershipRecord]) -> Result<(), StoreError> {
            let mut sizes = self.sizes.lock();
            if self.fail_on == Some(sizes.len()) {
                return Err(StoreError::Unavailable("disk full".into()));
            }
            sizes.push(records.len());
            Ok(())
        }

        fn list_by_user(&self, _: &str) -> Result<Vec<OwnershipRecord>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_splits_into_full_batches_and_remainder() {
        let store = Recording::default();
        let mut batcher = OwnershipBatcher::new(&store, 4, 10);
        for i in 0..10 {
            batcher.push(OwnershipRecord::new("u", format!("e{i}"))).unwrap();
        }
        assert_eq!(batcher.pending(), 2);

        let stats = batcher.finish().unwrap();
        assert_eq!(stats, BatchStats { batches: 3, records: 10 });
        assert_eq!(*store.sizes.lock(), [4, 4, 2]);
    }

    #[test]
    fn test_exact_multiple_has_no_empty_flush() {
        let store = Recording::default();
        let mut batcher = OwnershipBatcher::new(&store, 5, 10);
        for _ in 0..10 {
            batcher.push(OwnershipRecord::new("u", "e")).unwrap();
        }
        batcher.finish().unwrap();
        assert_eq!(*store.sizes.lock(), [5, 5]);
    }

    #[test]
    fn test_failed_flush_keeps_prior_counts() {
        let store = Recording {
            fail_on: Some(1),
            ..Recording::default()
        };
        let mut batcher = OwnershipBatcher::new(&store, 2, 6);
        batcher.push(OwnershipRecord::new("u", "a")).unwrap();
        batcher.push(OwnershipRecord::new("u", "b")).unwrap();
        batcher.push(OwnershipRecord::new("u", "c")).unwrap();
        assert!(batcher.push(OwnershipRecord::new("u", "d")).is_err());
        assert_eq!(batcher.stats(), BatchStats { batches: 1, records: 2 });
        assert_eq!(batcher.pending(), 0);
    }

    #[test]
    fn test_writes_reach_store() {
        let store = MemoryOwnershipStore::new();
        let mut batcher = OwnershipBatcher::new(&store, DEFAULT_BATCH_SIZE, 3);
        for e in ["a", "b", "c"] {
            batcher.push(OwnershipRecord::new("alice", e)).unwrap();
        }
        batcher.finish().unwrap();
        assert_eq!(store.list_by_user("alice").unwrap().len(), 3);
        assert_eq!(store.stats().batches, 1);
    }
}
