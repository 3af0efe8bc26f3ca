//! In-memory MVCC store
//!
//! Every key carries the commit sequence that last wrote it. A commit is
//! accepted only if every key it read still has the version it saw and every
//! prefix scan it ran still returns the same keys and versions.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{StoreError, StoreResult};
use crate::types::{CommitReceipt, KeyModification, LedgerEvent, VersionedValue, WriteOp, WriteSet};
use crate::KvStore;

#[derive(Debug, Default)]
struct Inner {
    current: BTreeMap<String, VersionedValue>,
    history: BTreeMap<String, Vec<KeyModification>>,
    sequence: u64,
    events: Vec<(String, LedgerEvent)>,
}

impl Inner {
    fn version_of(&self, key: &str) -> u64 {
        self.current.get(key).map(|v| v.version).unwrap_or(0)
    }

    fn scan(&self, prefix: &str, start_after: Option<&str>, limit: usize) -> Vec<(String, VersionedValue)> {
        let lower = match start_after {
            Some(after) if after >= prefix => Bound::Excluded(after),
            _ => Bound::Included(prefix),
        };
        self.current
            .range::<str, _>((lower, Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .take(limit)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn validate(&self, write_set: &WriteSet) -> StoreResult<()> {
        for (key, read) in &write_set.reads {
            let current = self.version_of(key);
            if current != *read {
                return Err(StoreError::Conflict {
                    key: key.clone(),
                    read: *read,
                    current,
                });
            }
        }

        for range in &write_set.range_reads {
            let now: Vec<(String, u64)> = self
                .scan(&range.prefix, range.start_after.as_deref(), range.limit)
                .into_iter()
                .map(|(k, v)| (k, v.version))
                .collect();
            if now != range.observed {
                return Err(StoreError::PhantomRead {
                    prefix: range.prefix.clone(),
                });
            }
        }

        Ok(())
    }

    fn apply(&mut self, sequence: u64, write_set: &WriteSet) {
        for (key, op) in &write_set.writes {
            let value = match op {
                WriteOp::Put(bytes) => {
                    self.current.insert(
                        key.clone(),
                        VersionedValue {
                            value: bytes.clone(),
                            version: sequence,
                        },
                    );
                    Some(bytes.clone())
                }
                WriteOp::Delete => {
                    self.current.remove(key);
                    None
                }
            };
            self.history.entry(key.clone()).or_default().push(KeyModification {
                tx_id: write_set.tx_id.clone(),
                timestamp: write_set.timestamp,
                version: sequence,
                value,
            });
        }

        if let Some(ref event) = write_set.event {
            self.events.push((write_set.tx_id.clone(), event.clone()));
        }
        self.sequence = sequence;
    }
}

/// In-memory implementation of [`KvStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }

    /// Sequence of the last commit that wrote anything
    pub fn sequence(&self) -> StoreResult<u64> {
        Ok(self.read()?.sequence)
    }

    /// Number of live keys
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read()?.current.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Events emitted by committed invocations, in commit order
    pub fn events(&self) -> StoreResult<Vec<(String, LedgerEvent)>> {
        Ok(self.read()?.events.clone())
    }

    /// Validate, run `persist` while still holding the write lock, then apply.
    ///
    /// If `persist` fails nothing is applied.
    pub(crate) fn commit_with<F>(&self, write_set: WriteSet, persist: F) -> StoreResult<CommitReceipt>
    where
        F: FnOnce(u64, &WriteSet) -> StoreResult<()>,
    {
        let mut inner = self.write()?;

        if write_set.is_read_only() {
            return Ok(CommitReceipt {
                tx_id: write_set.tx_id,
                sequence: inner.sequence,
                keys_written: 0,
                event: None,
            });
        }

        if let Err(err) = inner.validate(&write_set) {
            tracing::warn!(tx_id = %write_set.tx_id, error = %err, "Commit rejected");
            return Err(err);
        }

        let sequence = inner.sequence + 1;
        persist(sequence, &write_set)?;
        inner.apply(sequence, &write_set);

        tracing::debug!(
            tx_id = %write_set.tx_id,
            sequence,
            keys = write_set.writes.len(),
            "Commit applied"
        );

        Ok(CommitReceipt {
            tx_id: write_set.tx_id,
            sequence,
            keys_written: write_set.writes.len(),
            event: write_set.event,
        })
    }

    /// Re-apply an already validated commit (used when loading a commit log)
    pub(crate) fn replay(&self, sequence: u64, write_set: &WriteSet) -> StoreResult<()> {
        let mut inner = self.write()?;
        if sequence <= inner.sequence {
            return Err(StoreError::Corrupt {
                line: sequence as usize,
                reason: format!("sequence {} not after {}", sequence, inner.sequence),
            });
        }
        inner.apply(sequence, write_set);
        Ok(())
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<VersionedValue>> {
        Ok(self.read()?.current.get(key).cloned())
    }

    fn scan(
        &self,
        prefix: &str,
        start_after: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<(String, VersionedValue)>> {
        Ok(self.read()?.scan(prefix, start_after, limit))
    }

    fn key_history(&self, key: &str) -> StoreResult<Vec<KeyModification>> {
        Ok(self.read()?.history.get(key).cloned().unwrap_or_default())
    }

    fn prefix_history(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<KeyModification>)>> {
        let inner = self.read()?;
        Ok(inner
            .history
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn commit(&self, write_set: WriteSet) -> StoreResult<CommitReceipt> {
        self.commit_with(write_set, |_, _| Ok(()))
    }
}
