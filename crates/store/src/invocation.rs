//! Invocation - one all-or-nothing unit of work against a [`KvStore`]
//!
//! Reads see the invocation's own pending writes. Nothing reaches the store
//! until [`Invocation::commit`]; dropping an invocation discards it.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{StoreError, StoreResult};
use crate::types::{CommitReceipt, KeyModification, LedgerEvent, RangeRead, WriteOp, WriteSet};
use crate::KvStore;

pub struct Invocation<'s> {
    store: &'s dyn KvStore,
    tx_id: String,
    timestamp: DateTime<Utc>,
    reads: BTreeMap<String, u64>,
    range_reads: Vec<RangeRead>,
    writes: BTreeMap<String, WriteOp>,
    event: Option<LedgerEvent>,
    counter: u32,
}

impl<'s> Invocation<'s> {
    pub fn new(store: &'s dyn KvStore, tx_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            store,
            tx_id: tx_id.into(),
            timestamp,
            reads: BTreeMap::new(),
            range_reads: Vec::new(),
            writes: BTreeMap::new(),
            event: None,
            counter: 0,
        }
    }

    /// Transaction id of this invocation
    pub fn tx_id(&self) -> &str {
        &self.tx_id
    }

    /// Timestamp every write in this invocation is stamped with
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Monotonic counter within the invocation (orders history records written together)
    pub fn next_sequence(&mut self) -> u32 {
        self.counter += 1;
        self.counter
    }

    pub fn get(&mut self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        if let Some(op) = self.writes.get(key) {
            return Ok(match op {
                WriteOp::Put(bytes) => Some(bytes.clone()),
                WriteOp::Delete => None,
            });
        }

        let found = self.store.get(key)?;
        self.reads
            .entry(key.to_string())
            .or_insert_with(|| found.as_ref().map(|v| v.version).unwrap_or(0));
        Ok(found.map(|v| v.value))
    }

    pub fn get_json<T: DeserializeOwned>(&mut self, key: &str) -> StoreResult<Option<T>> {
        match self.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn exists(&mut self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    pub fn put(&mut self, key: impl Into<String>, value: Vec<u8>) {
        self.writes.insert(key.into(), WriteOp::Put(value));
    }

    pub fn put_json<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> StoreResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put(key, bytes);
        Ok(())
    }

    /// Put a key that must not exist yet, neither in the store nor in this invocation
    pub fn put_new<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> StoreResult<()> {
        let key = key.into();
        if self.exists(&key)? {
            return Err(StoreError::KeyExists(key));
        }
        self.put_json(key, value)
    }

    pub fn delete(&mut self, key: impl Into<String>) {
        self.writes.insert(key.into(), WriteOp::Delete);
    }

    /// Ordered prefix scan merged with this invocation's pending writes
    pub fn scan(
        &mut self,
        prefix: &str,
        start_after: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let in_range = |key: &str| key.starts_with(prefix) && start_after.map_or(true, |after| key > after);

        // Over-fetch by the number of pending deletes so they cannot shorten the page.
        let pending_deletes = self
            .writes
            .iter()
            .filter(|(k, op)| **op == WriteOp::Delete && in_range(k))
            .count();
        let fetch = limit.saturating_add(pending_deletes);
        let raw = self.store.scan(prefix, start_after, fetch)?;
        let exhausted = raw.len() < fetch;

        self.range_reads.push(RangeRead {
            prefix: prefix.to_string(),
            start_after: start_after.map(str::to_string),
            limit: fetch,
            observed: raw.iter().map(|(k, v)| (k.clone(), v.version)).collect(),
        });

        let horizon = raw.last().map(|(k, _)| k.clone());
        let mut merged: BTreeMap<String, Vec<u8>> = raw.into_iter().map(|(k, v)| (k, v.value)).collect();

        for (key, op) in &self.writes {
            if !in_range(key) {
                continue;
            }
            // Keys past the last fetched store key are only safe to add once the scan is exhausted.
            let within = exhausted || horizon.as_deref().map_or(false, |h| key.as_str() <= h);
            match op {
                WriteOp::Put(bytes) if within => {
                    merged.insert(key.clone(), bytes.clone());
                }
                WriteOp::Put(_) => {}
                WriteOp::Delete => {
                    merged.remove(key);
                }
            }
        }

        Ok(merged.into_iter().take(limit).collect())
    }

    /// Scan and decode every value under a prefix
    pub fn scan_json<T: DeserializeOwned>(&mut self, prefix: &str) -> StoreResult<Vec<(String, T)>> {
        const PAGE: usize = 256;
        let mut out = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let page = self.scan(prefix, after.as_deref(), PAGE)?;
            let done = page.len() < PAGE;
            for (key, bytes) in page {
                out.push((key.clone(), serde_json::from_slice(&bytes)?));
                after = Some(key);
            }
            if done {
                return Ok(out);
            }
        }
    }

    /// Committed history of a key (pending writes are not included)
    pub fn key_history(&self, key: &str) -> StoreResult<Vec<KeyModification>> {
        self.store.key_history(key)
    }

    pub fn prefix_history(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<KeyModification>)>> {
        self.store.prefix_history(prefix)
    }

    /// Attach a named event to this commit; a later call replaces the earlier one
    pub fn set_event(&mut self, name: impl Into<String>, payload: serde_json::Value) {
        self.event = Some(LedgerEvent {
            name: name.into(),
            payload,
        });
    }

    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    /// Submit every buffered write as one atomic commit
    pub fn commit(self) -> StoreResult<CommitReceipt> {
        let write_set = WriteSet {
            tx_id: self.tx_id,
            timestamp: self.timestamp,
            reads: self.reads,
            range_reads: self.range_reads,
            writes: self.writes,
            event: self.event,
        };
        self.store.commit(write_set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use serde_json::json;

    fn seed(store: &MemoryStore, keys: &[&str]) {
        let mut inv = Invocation::new(store, "seed", Utc::now());
        for key in keys {
            inv.put_json(*key, &json!({ "k": key })).unwrap();
        }
        inv.commit().unwrap();
    }

    #[test]
    fn test_reads_see_own_writes() {
        let store = MemoryStore::new();
        let mut inv = Invocation::new(&store, "tx1", Utc::now());

        inv.put_json("A", &json!(1)).unwrap();
        assert_eq!(inv.get_json::<i32>("A").unwrap(), Some(1));
        assert!(store.get("A").unwrap().is_none());

        inv.delete("A");
        assert!(!inv.exists("A").unwrap());
    }

    #[test]
    fn test_dropped_invocation_leaves_no_trace() {
        let store = MemoryStore::new();
        {
            let mut inv = Invocation::new(&store, "tx1", Utc::now());
            inv.put_json("A", &json!(1)).unwrap();
        }
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_put_new_refuses_existing_key() {
        let store = MemoryStore::new();
        seed(&store, &["H/1"]);

        let mut inv = Invocation::new(&store, "tx1", Utc::now());
        assert!(matches!(inv.put_new("H/1", &json!(2)), Err(StoreError::KeyExists(_))));
        inv.put_new("H/2", &json!(2)).unwrap();
        assert!(matches!(inv.put_new("H/2", &json!(3)), Err(StoreError::KeyExists(_))));
    }

    #[test]
    fn test_scan_merges_pending_writes() {
        let store = MemoryStore::new();
        seed(&store, &["P/1", "P/2", "P/4"]);

        let mut inv = Invocation::new(&store, "tx1", Utc::now());
        inv.put_json("P/3", &json!(3)).unwrap();
        inv.delete("P/2");

        let keys: Vec<String> = inv.scan("P/", None, 10).unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["P/1", "P/3", "P/4"]);
    }

    #[test]
    fn test_scan_pages_do_not_skip_pending_keys() {
        let store = MemoryStore::new();
        seed(&store, &["P/1", "P/2", "P/5", "P/6"]);

        let mut inv = Invocation::new(&store, "tx1", Utc::now());
        inv.put_json("P/9", &json!(9)).unwrap();

        let first: Vec<String> = inv.scan("P/", None, 2).unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(first, vec!["P/1", "P/2"]);

        let rest: Vec<String> = inv
            .scan("P/", Some("P/2"), 10)
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(rest, vec!["P/5", "P/6", "P/9"]);
    }

    #[test]
    fn test_concurrent_writers_one_loses() {
        let store = MemoryStore::new();
        seed(&store, &["LOAN"]);

        let mut first = Invocation::new(&store, "tx1", Utc::now());
        let mut second = Invocation::new(&store, "tx2", Utc::now());

        first.get("LOAN").unwrap();
        second.get("LOAN").unwrap();
        first.put_json("LOAN", &json!("first")).unwrap();
        second.put_json("LOAN", &json!("second")).unwrap();

        first.commit().unwrap();
        let err = second.commit().unwrap_err();
        assert!(err.is_conflict());

        let stored: serde_json::Value =
            serde_json::from_slice(&store.get("LOAN").unwrap().unwrap().value).unwrap();
        assert_eq!(stored, json!("first"));
    }

    #[test]
    fn test_event_travels_with_commit() {
        let store = MemoryStore::new();
        let mut inv = Invocation::new(&store, "tx1", Utc::now());
        inv.put_json("A", &json!(1)).unwrap();
        inv.set_event("ThingCreated", json!({ "id": "A" }));
        let receipt = inv.commit().unwrap();

        assert_eq!(receipt.event.unwrap().name, "ThingCreated");
        assert_eq!(store.events().unwrap().len(), 1);
    }
}
