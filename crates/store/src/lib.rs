//! LendLedger Store - Key-value ledger adapter
//!
//! The hosting ledger is modelled as a transactional key-value store with
//! per-key versions and per-key history. Everything above this crate talks to
//! it through an [`Invocation`]: one all-or-nothing unit of reads and writes
//! that either commits as a whole or leaves no trace.
//!
//! ## Key Components
//!
//! - [`KvStore`] - the store contract (get / scan / key history / commit)
//! - [`MemoryStore`] - in-memory MVCC store with write-write and phantom detection
//! - [`JsonlStore`] - `MemoryStore` persisted as an append-only JSONL commit log
//! - [`Invocation`] - buffered writes, read-set tracking, single commit
//! - [`key`] - composite keys for ordered prefix scans

pub mod error;
pub mod invocation;
pub mod jsonl;
pub mod key;
pub mod memory;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use invocation::Invocation;
pub use jsonl::JsonlStore;
pub use key::{composite_key, composite_prefix, split_composite_key};
pub use memory::MemoryStore;
pub use types::{CommitReceipt, KeyModification, LedgerEvent, RangeRead, VersionedValue, WriteOp, WriteSet};

/// Transactional key-value store contract
///
/// Versions are commit sequence numbers; an absent key has version 0.
pub trait KvStore: Send + Sync {
    /// Current value of a key
    fn get(&self, key: &str) -> StoreResult<Option<VersionedValue>>;

    /// Keys starting with `prefix`, ordered, strictly after `start_after`, at most `limit`
    fn scan(
        &self,
        prefix: &str,
        start_after: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<(String, VersionedValue)>>;

    /// Every committed modification of a key, oldest first
    fn key_history(&self, key: &str) -> StoreResult<Vec<KeyModification>>;

    /// Modification history of every key ever written under `prefix`,
    /// including keys that are currently deleted
    fn prefix_history(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<KeyModification>)>>;

    /// Validate the read set and apply the writes atomically
    fn commit(&self, write_set: WriteSet) -> StoreResult<CommitReceipt>;
}
