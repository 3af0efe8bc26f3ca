//! JsonlStore - MemoryStore persisted as an append-only commit log
//!
//! Each accepted commit becomes one line of `ledger.jsonl`. The file is
//! append-only and never rewritten; opening the store replays it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::memory::MemoryStore;
use crate::types::{CommitReceipt, KeyModification, LedgerEvent, VersionedValue, WriteOp, WriteSet};
use crate::KvStore;

/// One line of the commit log
#[derive(Debug, Serialize, Deserialize)]
struct CommitLine {
    sequence: u64,
    tx_id: String,
    timestamp: DateTime<Utc>,
    /// key -> hex-encoded value, `None` for deletes
    writes: Vec<(String, Option<String>)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event: Option<LedgerEvent>,
}

impl CommitLine {
    fn from_write_set(sequence: u64, write_set: &WriteSet) -> Self {
        Self {
            sequence,
            tx_id: write_set.tx_id.clone(),
            timestamp: write_set.timestamp,
            writes: write_set
                .writes
                .iter()
                .map(|(k, op)| match op {
                    WriteOp::Put(bytes) => (k.clone(), Some(hex::encode(bytes))),
                    WriteOp::Delete => (k.clone(), None),
                })
                .collect(),
            event: write_set.event.clone(),
        }
    }

    fn into_write_set(self, line: usize) -> StoreResult<(u64, WriteSet)> {
        let mut write_set = WriteSet::new(self.tx_id, self.timestamp);
        for (key, value) in self.writes {
            let op = match value {
                Some(encoded) => WriteOp::Put(hex::decode(encoded).map_err(|e| StoreError::Corrupt {
                    line,
                    reason: e.to_string(),
                })?),
                None => WriteOp::Delete,
            };
            write_set.writes.insert(key, op);
        }
        write_set.event = self.event;
        Ok((self.sequence, write_set))
    }
}

/// File-backed [`KvStore`]
pub struct JsonlStore {
    path: PathBuf,
    memory: MemoryStore,
    file: Mutex<File>,
}

impl JsonlStore {
    /// Open (or create) the commit log at `path` and replay it
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let memory = MemoryStore::new();
        let mut replayed = 0usize;
        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for (i, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let commit: CommitLine = serde_json::from_str(&line).map_err(|e| StoreError::Corrupt {
                    line: i + 1,
                    reason: e.to_string(),
                })?;
                let (sequence, write_set) = commit.into_write_set(i + 1)?;
                memory.replay(sequence, &write_set)?;
                replayed += 1;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        tracing::info!(path = %path.display(), commits = replayed, "Ledger file opened");

        Ok(Self {
            path,
            memory,
            file: Mutex::new(file),
        })
    }

    /// Open `ledger.jsonl` inside a data directory
    pub fn in_dir(dir: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open(dir.as_ref().join("ledger.jsonl"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sequence(&self) -> StoreResult<u64> {
        self.memory.sequence()
    }

    pub fn events(&self) -> StoreResult<Vec<(String, LedgerEvent)>> {
        self.memory.events()
    }
}

impl KvStore for JsonlStore {
    fn get(&self, key: &str) -> StoreResult<Option<VersionedValue>> {
        self.memory.get(key)
    }

    fn scan(
        &self,
        prefix: &str,
        start_after: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<(String, VersionedValue)>> {
        self.memory.scan(prefix, start_after, limit)
    }

    fn key_history(&self, key: &str) -> StoreResult<Vec<KeyModification>> {
        self.memory.key_history(key)
    }

    fn prefix_history(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<KeyModification>)>> {
        self.memory.prefix_history(prefix)
    }

    fn commit(&self, write_set: WriteSet) -> StoreResult<CommitReceipt> {
        let mut file = self.file.lock().map_err(|_| StoreError::Poisoned)?;
        self.memory.commit_with(write_set, |sequence, ws| {
            let json = serde_json::to_string(&CommitLine::from_write_set(sequence, ws))?;
            writeln!(file, "{}", json)?;
            file.flush()?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Invocation;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_commits_survive_reopen() {
        let dir = tempdir().unwrap();

        {
            let store = JsonlStore::in_dir(dir.path()).unwrap();
            let mut inv = Invocation::new(&store, "tx1", Utc::now());
            inv.put_json("CUSTOMER_C-1", &json!({ "name": "Ann" })).unwrap();
            inv.put_json("CUSTOMER_C-2", &json!({ "name": "Bob" })).unwrap();
            inv.commit().unwrap();

            let mut inv = Invocation::new(&store, "tx2", Utc::now());
            inv.delete("CUSTOMER_C-2");
            inv.set_event("CustomerRemoved", json!({ "id": "C-2" }));
            inv.commit().unwrap();
        }

        let store = JsonlStore::in_dir(dir.path()).unwrap();
        assert_eq!(store.sequence().unwrap(), 2);
        assert!(store.get("CUSTOMER_C-1").unwrap().is_some());
        assert!(store.get("CUSTOMER_C-2").unwrap().is_none());
        assert_eq!(store.key_history("CUSTOMER_C-2").unwrap().len(), 2);
        assert_eq!(store.events().unwrap()[0].1.name, "CustomerRemoved");
    }

    #[test]
    fn test_rejected_commit_is_not_logged() {
        let dir = tempdir().unwrap();
        let store = JsonlStore::in_dir(dir.path()).unwrap();

        let mut inv = Invocation::new(&store, "tx1", Utc::now());
        inv.put_json("A", &json!(1)).unwrap();
        inv.commit().unwrap();

        let mut stale = Invocation::new(&store, "tx2", Utc::now());
        stale.get("A").unwrap();
        let mut winner = Invocation::new(&store, "tx3", Utc::now());
        winner.put_json("A", &json!(2)).unwrap();
        winner.commit().unwrap();

        stale.put_json("A", &json!(3)).unwrap();
        assert!(stale.commit().is_err());

        let lines = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(lines.lines().count(), 2);
    }

    #[test]
    fn test_corrupt_line_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        std::fs::write(&path, "{not json}\n").unwrap();

        let err = JsonlStore::open(&path).err().unwrap();
        assert!(matches!(err, StoreError::Corrupt { line: 1, .. }));
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("ledger.jsonl");

        let store = JsonlStore::open(&path).unwrap();
        assert!(store.path().parent().unwrap().exists());
    }
}
