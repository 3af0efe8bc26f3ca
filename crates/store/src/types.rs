//! Values, read sets and write sets exchanged with a [`crate::KvStore`]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A stored value together with the commit sequence that last wrote it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedValue {
    pub value: Vec<u8>,
    pub version: u64,
}

/// One committed change to a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyModification {
    pub tx_id: String,
    pub timestamp: DateTime<Utc>,
    pub version: u64,
    /// `None` when the modification was a delete
    pub value: Option<Vec<u8>>,
}

impl KeyModification {
    pub fn is_delete(&self) -> bool {
        self.value.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Put(Vec<u8>),
    Delete,
}

/// A prefix scan observed during an invocation, re-run at commit time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRead {
    pub prefix: String,
    pub start_after: Option<String>,
    pub limit: usize,
    pub observed: Vec<(String, u64)>,
}

/// Named event attached to a commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub name: String,
    pub payload: serde_json::Value,
}

/// Everything one invocation wants to commit
#[derive(Debug, Clone)]
pub struct WriteSet {
    pub tx_id: String,
    pub timestamp: DateTime<Utc>,
    /// Key -> version observed (0 = absent)
    pub reads: BTreeMap<String, u64>,
    pub range_reads: Vec<RangeRead>,
    pub writes: BTreeMap<String, WriteOp>,
    pub event: Option<LedgerEvent>,
}

impl WriteSet {
    pub fn new(tx_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            tx_id: tx_id.into(),
            timestamp,
            reads: BTreeMap::new(),
            range_reads: Vec::new(),
            writes: BTreeMap::new(),
            event: None,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty() && self.event.is_none()
    }
}

/// Result of a successful commit
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReceipt {
    pub tx_id: String,
    /// Commit sequence assigned to the writes; unchanged for read-only commits
    pub sequence: u64,
    pub keys_written: usize,
    pub event: Option<LedgerEvent>,
}
