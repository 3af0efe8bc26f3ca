//! History Ledger - append-only, per-entity change log
//!
//! Records live under the composite key `HISTORY / TYPE / entityID / historyID`,
//! so entities of different types never share a trail even when their ids collide.
//! History ids start with the invocation timestamp (zero-padded micros) and
//! the record's position inside the invocation, so a prefix scan over one
//! entity returns its records in replay order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use strum_macros::{Display, EnumString};

use lendledger_core::{short_uuid, LedgerError, LedgerResult};
use lendledger_store::{composite_key, composite_prefix, split_composite_key, Invocation};

use crate::entity::EntityType;

pub const HISTORY_NAMESPACE: &str = "HISTORY";

/// Field name used by CREATE records, whose new value is the full snapshot
pub const SNAPSHOT_FIELD: &str = "*";

const PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Create,
    Update,
    StatusChange,
    Approve,
    Reject,
    Revoke,
}

/// One immutable audit-log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    #[serde(rename = "historyID")]
    pub history_id: String,
    #[serde(rename = "entityID")]
    pub entity_id: String,
    pub entity_type: EntityType,
    pub timestamp: DateTime<Utc>,
    pub change_kind: ChangeKind,
    pub field_name: String,
    pub previous_value: Option<String>,
    pub new_value: Option<String>,
    #[serde(rename = "actorID")]
    pub actor_id: String,
    #[serde(rename = "transactionID")]
    pub transaction_id: String,
}

/// A change about to be recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub kind: ChangeKind,
    pub field: String,
    pub previous: Option<String>,
    pub new: Option<String>,
}

impl Change {
    pub fn new(kind: ChangeKind, field: impl Into<String>, previous: Option<String>, new: Option<String>) -> Self {
        Self {
            kind,
            field: field.into(),
            previous,
            new,
        }
    }

    /// CREATE record carrying the full JSON snapshot
    pub fn create(snapshot: String) -> Self {
        Self::new(ChangeKind::Create, SNAPSHOT_FIELD, None, Some(snapshot))
    }

    /// UPDATE of one field
    pub fn update(field: impl Into<String>, previous: impl Into<String>, new: impl Into<String>) -> Self {
        Self::new(ChangeKind::Update, field, Some(previous.into()), Some(new.into()))
    }

    /// Status move recorded under `status`, with the kind the caller chooses
    pub fn status(kind: ChangeKind, previous: impl ToString, new: impl ToString) -> Self {
        Self::new(kind, "status", Some(previous.to_string()), Some(new.to_string()))
    }
}

pub fn history_key(entity_type: EntityType, entity_id: &str, history_id: &str) -> LedgerResult<String> {
    Ok(composite_key(HISTORY_NAMESPACE, &[entity_type.key_prefix(), entity_id, history_id])?)
}

/// Prefix covering every record of one entity
pub fn history_prefix(entity_type: EntityType, entity_id: &str) -> LedgerResult<String> {
    Ok(composite_prefix(HISTORY_NAMESPACE, &[entity_type.key_prefix(), entity_id])?)
}

fn new_history_id(inv: &mut Invocation<'_>) -> String {
    let micros = inv.timestamp().timestamp_micros().max(0);
    let seq = inv.next_sequence();
    format!("{:020}-{:04}-{}", micros, seq, short_uuid(8))
}

/// Append one record; writes exactly one new key and never overwrites
pub fn append(
    inv: &mut Invocation<'_>,
    entity_id: &str,
    entity_type: EntityType,
    change: Change,
    actor_id: &str,
) -> LedgerResult<HistoryRecord> {
    let history_id = new_history_id(inv);
    let record = HistoryRecord {
        history_id: history_id.clone(),
        entity_id: entity_id.to_string(),
        entity_type,
        timestamp: inv.timestamp(),
        change_kind: change.kind,
        field_name: change.field,
        previous_value: change.previous,
        new_value: change.new,
        actor_id: actor_id.to_string(),
        transaction_id: inv.tx_id().to_string(),
    };

    let key = history_key(entity_type, entity_id, &history_id)?;
    inv.put_new(key, &record)?;
    Ok(record)
}

/// Every record of an entity, in replay order
pub fn read(inv: &mut Invocation<'_>, entity_type: EntityType, entity_id: &str) -> LedgerResult<Vec<HistoryRecord>> {
    let mut cursor = HistoryCursor::new(entity_type, entity_id);
    let mut records = Vec::new();
    while let Some(record) = cursor.next(inv)? {
        records.push(record);
    }
    Ok(records)
}

/// Lazy, restartable scan over one entity's history
///
/// The cursor only remembers the last history id it handed out, so a scan can
/// be resumed in a later invocation with [`HistoryCursor::resume_after`].
#[derive(Debug, Clone)]
pub struct HistoryCursor {
    entity_type: EntityType,
    entity_id: String,
    last_key: Option<String>,
    last_history_id: Option<String>,
    buffer: VecDeque<(String, HistoryRecord)>,
    exhausted: bool,
    page_size: usize,
}

impl HistoryCursor {
    pub fn new(entity_type: EntityType, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.into(),
            last_key: None,
            last_history_id: None,
            buffer: VecDeque::new(),
            exhausted: false,
            page_size: PAGE_SIZE,
        }
    }

    /// Continue after a history id returned by an earlier cursor
    pub fn resume_after(
        entity_type: EntityType,
        entity_id: impl Into<String>,
        history_id: &str,
    ) -> LedgerResult<Self> {
        let mut cursor = Self::new(entity_type, entity_id);
        cursor.last_key = Some(history_key(entity_type, &cursor.entity_id, history_id)?);
        cursor.last_history_id = Some(history_id.to_string());
        Ok(cursor)
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// History id of the last record returned
    pub fn position(&self) -> Option<&str> {
        self.last_history_id.as_deref()
    }

    pub fn next(&mut self, inv: &mut Invocation<'_>) -> LedgerResult<Option<HistoryRecord>> {
        if self.buffer.is_empty() && !self.exhausted {
            self.fill(inv)?;
        }

        match self.buffer.pop_front() {
            Some((key, record)) => {
                self.last_key = Some(key);
                self.last_history_id = Some(record.history_id.clone());
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn fill(&mut self, inv: &mut Invocation<'_>) -> LedgerResult<()> {
        let prefix = history_prefix(self.entity_type, &self.entity_id)?;
        let page = inv.scan(&prefix, self.last_key.as_deref(), self.page_size)?;
        if page.len() < self.page_size {
            self.exhausted = true;
        }

        for (key, bytes) in page {
            let record: HistoryRecord = serde_json::from_slice(&bytes)
                .map_err(|e| LedgerError::Storage(format!("undecodable history record {:?}: {}", key, e)))?;
            self.buffer.push_back((key, record));
        }
        Ok(())
    }
}

/// Value of `field` as of `at`, replayed from an entity's records
///
/// CREATE snapshots seed the value; later records for the same field replace it.
pub fn reconstruct(records: &[HistoryRecord], field: &str, at: DateTime<Utc>) -> Option<String> {
    let mut value = None;
    for record in records.iter().filter(|r| r.timestamp <= at) {
        if record.change_kind == ChangeKind::Create {
            value = record
                .new_value
                .as_deref()
                .and_then(|snapshot| serde_json::from_str::<serde_json::Value>(snapshot).ok())
                .and_then(|snapshot| snapshot.get(field).cloned())
                .and_then(|v| match v {
                    serde_json::Value::Null => None,
                    serde_json::Value::String(s) => Some(s),
                    other => Some(other.to_string()),
                });
        } else if record.field_name == field {
            value = record.new_value.clone();
        }
    }
    value
}

/// Check an entity's trail against its current version
///
/// The trail must start with a CREATE, belong to one entity, never go back in
/// time, and contain exactly one transaction per version.
pub fn verify_trail(
    records: &[HistoryRecord],
    entity_type: EntityType,
    entity_id: &str,
    current_version: u64,
) -> LedgerResult<()> {
    let first = records
        .first()
        .ok_or_else(|| LedgerError::Integrity(format!("{} has no history", entity_id)))?;
    if first.change_kind != ChangeKind::Create {
        return Err(LedgerError::Integrity(format!(
            "history of {} does not start with CREATE",
            entity_id
        )));
    }

    let mut transactions = BTreeSet::new();
    let mut previous = first.timestamp;
    for record in records {
        if record.entity_id != entity_id || record.entity_type != entity_type {
            return Err(LedgerError::Integrity(format!(
                "record {} belongs to {} {}, not {} {}",
                record.history_id, record.entity_type, record.entity_id, entity_type, entity_id
            )));
        }
        if record.timestamp < previous {
            return Err(LedgerError::Integrity(format!(
                "record {} is older than its predecessor",
                record.history_id
            )));
        }
        previous = record.timestamp;
        transactions.insert(record.transaction_id.as_str());
    }

    if transactions.len() as u64 != current_version {
        return Err(LedgerError::Integrity(format!(
            "{} is at version {} but its history holds {} mutations",
            entity_id,
            current_version,
            transactions.len()
        )));
    }
    Ok(())
}

/// Entity type prefix and entity id encoded in a history key
pub fn entity_of_key(key: &str) -> Option<(&str, &str)> {
    match split_composite_key(key) {
        Some((HISTORY_NAMESPACE, parts)) if parts.len() >= 2 => Some((parts[0], parts[1])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use lendledger_store::MemoryStore;
    use serde_json::json;

    fn write(store: &MemoryStore, tx: &str, at: DateTime<Utc>, entity: &str, changes: Vec<Change>) {
        let mut inv = Invocation::new(store, tx, at);
        for change in changes {
            append(&mut inv, entity, EntityType::Customer, change, "ACT-1").unwrap();
        }
        inv.commit().unwrap();
    }

    #[test]
    fn test_read_returns_replay_order() {
        let store = MemoryStore::new();
        let t0 = Utc::now();
        let snapshot = json!({ "email": "a@x.io", "status": "Active" }).to_string();

        write(&store, "tx1", t0, "CUST-1", vec![Change::create(snapshot)]);
        write(
            &store,
            "tx2",
            t0 + Duration::seconds(1),
            "CUST-1",
            vec![
                Change::update("email", "a@x.io", "b@x.io"),
                Change::update("phone", "1", "2"),
            ],
        );
        write(&store, "tx3", t0 + Duration::seconds(2), "CUST-10", vec![Change::create("{}".into())]);

        let mut inv = Invocation::new(&store, "read", Utc::now());
        let records = read(&mut inv, EntityType::Customer, "CUST-1").unwrap();
        let fields: Vec<&str> = records.iter().map(|r| r.field_name.as_str()).collect();
        assert_eq!(fields, vec!["*", "email", "phone"]);
        assert!(records.iter().all(|r| r.entity_id == "CUST-1"));
    }

    #[test]
    fn test_same_id_different_types_keep_separate_trails() {
        let store = MemoryStore::new();
        let mut inv = Invocation::new(&store, "tx1", Utc::now());
        append(&mut inv, "OFAC", EntityType::Actor, Change::create("{}".into()), "ACT-1").unwrap();
        append(&mut inv, "OFAC", EntityType::SanctionList, Change::create("{}".into()), "ACT-1").unwrap();
        append(&mut inv, "OFAC", EntityType::SanctionList, Change::update("name", "a", "b"), "ACT-1").unwrap();
        inv.commit().unwrap();

        let mut inv = Invocation::new(&store, "read", Utc::now());
        let actor = read(&mut inv, EntityType::Actor, "OFAC").unwrap();
        let list = read(&mut inv, EntityType::SanctionList, "OFAC").unwrap();
        assert_eq!(actor.len(), 1);
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|r| r.entity_type == EntityType::SanctionList));
    }

    #[test]
    fn test_cursor_resumes_from_position() {
        let store = MemoryStore::new();
        let t0 = Utc::now();
        for i in 0..5 {
            write(
                &store,
                &format!("tx{}", i),
                t0 + Duration::seconds(i),
                "LOAN-1",
                vec![Change::update("notes", i.to_string(), (i + 1).to_string())],
            );
        }

        let mut inv = Invocation::new(&store, "read", Utc::now());
        let mut cursor = HistoryCursor::new(EntityType::Customer, "LOAN-1").with_page_size(2);
        cursor.next(&mut inv).unwrap().unwrap();
        let second = cursor.next(&mut inv).unwrap().unwrap();
        let position = cursor.position().unwrap().to_string();
        assert_eq!(position, second.history_id);

        let mut resumed = HistoryCursor::resume_after(EntityType::Customer, "LOAN-1", &position).unwrap();
        let mut rest = Vec::new();
        while let Some(r) = resumed.next(&mut inv).unwrap() {
            rest.push(r.new_value.unwrap());
        }
        assert_eq!(rest, vec!["3", "4", "5"]);
    }

    #[test]
    fn test_reconstruct_point_in_time() {
        let t0 = Utc::now();
        let store = MemoryStore::new();
        write(&store, "tx1", t0, "CUST-1", vec![Change::create(json!({ "email": "a@x.io" }).to_string())]);
        write(
            &store,
            "tx2",
            t0 + Duration::days(1),
            "CUST-1",
            vec![Change::update("email", "a@x.io", "b@x.io")],
        );

        let mut inv = Invocation::new(&store, "read", Utc::now());
        let records = read(&mut inv, EntityType::Customer, "CUST-1").unwrap();

        assert_eq!(reconstruct(&records, "email", t0).as_deref(), Some("a@x.io"));
        assert_eq!(
            reconstruct(&records, "email", t0 + Duration::days(2)).as_deref(),
            Some("b@x.io")
        );
        assert_eq!(reconstruct(&records, "email", t0 - Duration::days(1)), None);
    }

    #[test]
    fn test_verify_trail_counts_transactions() {
        let t0 = Utc::now();
        let store = MemoryStore::new();
        write(&store, "tx1", t0, "CUST-1", vec![Change::create("{}".into())]);
        write(
            &store,
            "tx2",
            t0,
            "CUST-1",
            vec![Change::update("a", "1", "2"), Change::update("b", "1", "2")],
        );

        let mut inv = Invocation::new(&store, "read", Utc::now());
        let records = read(&mut inv, EntityType::Customer, "CUST-1").unwrap();
        assert!(verify_trail(&records, EntityType::Customer, "CUST-1", 2).is_ok());
        assert!(matches!(
            verify_trail(&records, EntityType::Customer, "CUST-1", 3),
            Err(LedgerError::Integrity(_))
        ));
        assert!(verify_trail(&records[1..], EntityType::Customer, "CUST-1", 1).is_err());
        assert!(verify_trail(&records, EntityType::Actor, "CUST-1", 2).is_err());
    }

    #[test]
    fn test_entity_of_key() {
        let key = history_key(EntityType::Customer, "CUST-1", "0001").unwrap();
        assert_eq!(entity_of_key(&key), Some(("CUSTOMER", "CUST-1")));
        assert_eq!(entity_of_key("CUSTOMER_CUST-1"), None);
    }
}
