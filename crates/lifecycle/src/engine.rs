//! Lifecycle engine - create, load and mutate versioned entities
//!
//! Every mutation path ends in [`commit_changes`]: bump the version once,
//! append one history record per change, write the new state. All of it is
//! staged on the caller's invocation, so it commits or vanishes together.

use serde::Serialize;

use lendledger_core::{LedgerError, LedgerResult};
use lendledger_store::Invocation;

use crate::entity::{LedgerEntity, StatusEntity};
use crate::history::{self, Change, ChangeKind, HistoryRecord};
use crate::transition::Status;

pub fn exists<E: LedgerEntity>(inv: &mut Invocation<'_>, id: &str) -> LedgerResult<bool> {
    Ok(inv.exists(&E::ENTITY_TYPE.state_key(id))?)
}

/// Load the current state of an entity
pub fn load<E: LedgerEntity>(inv: &mut Invocation<'_>, id: &str) -> LedgerResult<E> {
    if id.trim().is_empty() {
        return Err(LedgerError::Validation(format!(
            "{} id is required",
            E::ENTITY_TYPE
        )));
    }
    inv.get_json::<E>(&E::ENTITY_TYPE.state_key(id))?
        .ok_or_else(|| LedgerError::not_found(&E::ENTITY_TYPE.to_string(), id))
}

/// Store a new entity and its CREATE record
pub fn create<E: LedgerEntity>(inv: &mut Invocation<'_>, entity: &E) -> LedgerResult<HistoryRecord> {
    let key = entity.state_key();
    if inv.exists(&key)? {
        return Err(LedgerError::AlreadyExists(format!(
            "{} {} already exists",
            E::ENTITY_TYPE,
            entity.id()
        )));
    }

    let snapshot = serde_json::to_string(entity)
        .map_err(|e| LedgerError::Storage(format!("cannot encode {}: {}", E::ENTITY_TYPE, e)))?;
    inv.put_json(key, entity)?;
    let record = history::append(
        inv,
        entity.id(),
        E::ENTITY_TYPE,
        Change::create(snapshot),
        &entity.meta().created_by,
    )?;

    tracing::info!(
        entity_type = %E::ENTITY_TYPE,
        id = entity.id(),
        tx_id = inv.tx_id(),
        "Entity created"
    );
    Ok(record)
}

/// Optional application-level compare-and-swap on the entity version
pub fn check_expected_version<E: LedgerEntity>(entity: &E, expected: Option<u64>) -> LedgerResult<()> {
    match expected {
        Some(expected) if expected != entity.version() => Err(LedgerError::Conflict(format!(
            "{} {} is at version {}, caller expected {}",
            E::ENTITY_TYPE,
            entity.id(),
            entity.version(),
            expected
        ))),
        _ => Ok(()),
    }
}

/// Persist a mutation: one version bump, one record per change.
///
/// An empty change list is a successful no-op that leaves the version alone.
pub fn commit_changes<E: LedgerEntity>(
    inv: &mut Invocation<'_>,
    entity: &mut E,
    changes: Vec<Change>,
    actor_id: &str,
) -> LedgerResult<Vec<HistoryRecord>> {
    if changes.is_empty() {
        tracing::debug!(entity_type = %E::ENTITY_TYPE, id = entity.id(), "No changes");
        return Ok(Vec::new());
    }

    let now = inv.timestamp();
    entity.meta_mut().touch(actor_id, now);

    let mut records = Vec::with_capacity(changes.len());
    for change in changes {
        records.push(history::append(inv, entity.id(), E::ENTITY_TYPE, change, actor_id)?);
    }
    inv.put_json(entity.state_key(), &*entity)?;

    tracing::info!(
        entity_type = %E::ENTITY_TYPE,
        id = entity.id(),
        version = entity.version(),
        records = records.len(),
        tx_id = inv.tx_id(),
        "Entity updated"
    );
    Ok(records)
}

/// Move an entity to `to`, recording one STATUS_CHANGE
pub fn apply_transition<E: StatusEntity>(
    inv: &mut Invocation<'_>,
    entity: &mut E,
    to: E::Status,
    actor_id: &str,
) -> LedgerResult<HistoryRecord> {
    let mut records = apply_transition_with(inv, entity, to, ChangeKind::StatusChange, Vec::new(), actor_id)?;
    records
        .pop()
        .ok_or_else(|| LedgerError::Integrity("status change produced no history".into()))
}

/// Move an entity to `to` together with additional field changes.
///
/// The status record is written with `kind` (APPROVE, REJECT, REVOKE or
/// STATUS_CHANGE) and comes last; `extra` changes precede it. Nothing is
/// touched when the table refuses the move.
pub fn apply_transition_with<E: StatusEntity>(
    inv: &mut Invocation<'_>,
    entity: &mut E,
    to: E::Status,
    kind: ChangeKind,
    mut extra: Vec<Change>,
    actor_id: &str,
) -> LedgerResult<Vec<HistoryRecord>> {
    let from = entity.status();
    if let Err(err) = E::Status::table().check(from, to) {
        tracing::warn!(
            entity_type = %E::ENTITY_TYPE,
            id = entity.id(),
            from = %from,
            to = %to,
            "Transition refused"
        );
        return Err(err);
    }

    entity.set_status(to);
    extra.push(Change::status(kind, from, to));
    commit_changes(inv, entity, extra, actor_id)
}

/// Collects field-level changes, skipping values that did not change
#[derive(Debug, Default)]
pub struct FieldUpdate {
    changes: Vec<Change>,
}

impl FieldUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a string field if a different value was supplied
    pub fn set(&mut self, field: &str, slot: &mut String, new: Option<String>) -> &mut Self {
        if let Some(new) = new {
            if *slot != new {
                let previous = std::mem::replace(slot, new.clone());
                self.changes.push(Change::update(field, previous, new));
            }
        }
        self
    }

    /// Overwrite an optional reference field; `None` clears it
    pub fn set_optional(&mut self, field: &str, slot: &mut Option<String>, new: Option<String>) -> &mut Self {
        if *slot != new {
            let previous = std::mem::replace(slot, new.clone());
            self.changes
                .push(Change::new(ChangeKind::Update, field, previous, new));
        }
        self
    }

    /// Replace a structured field, recording JSON before/after values
    pub fn set_json<T: Serialize + PartialEq>(
        &mut self,
        field: &str,
        slot: &mut T,
        new: Option<T>,
    ) -> LedgerResult<&mut Self> {
        if let Some(new) = new {
            if *slot != new {
                let previous = serde_json::to_string(slot)?;
                let next = serde_json::to_string(&new)?;
                *slot = new;
                self.changes.push(Change::update(field, previous, next));
            }
        }
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn fields(&self) -> Vec<&str> {
        self.changes.iter().map(|c| c.field.as_str()).collect()
    }

    pub fn into_changes(self) -> Vec<Change> {
        self.changes
    }
}

/// Persist collected field changes; reports success without a version bump when empty
pub fn apply_field_changes<E: LedgerEntity>(
    inv: &mut Invocation<'_>,
    entity: &mut E,
    update: FieldUpdate,
    actor_id: &str,
) -> LedgerResult<Vec<HistoryRecord>> {
    commit_changes(inv, entity, update.into_changes(), actor_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_update_skips_unchanged() {
        let mut email = "a@x.io".to_string();
        let mut phone = "123".to_string();
        let mut update = FieldUpdate::new();
        update
            .set("email", &mut email, Some("a@x.io".into()))
            .set("phone", &mut phone, Some("456".into()))
            .set("address", &mut String::new(), None);

        assert_eq!(update.fields(), vec!["phone"]);
        assert_eq!(phone, "456");
        let changes = update.into_changes();
        assert_eq!(changes[0].previous.as_deref(), Some("123"));
    }

    #[test]
    fn test_set_optional_clears() {
        let mut current = Some("CDP-1".to_string());
        let mut update = FieldUpdate::new();
        update.set_optional("currentCdpId", &mut current, None);
        update.set_optional("currentCdpId", &mut current, None);

        assert!(current.is_none());
        let changes = update.into_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].previous.as_deref(), Some("CDP-1"));
        assert_eq!(changes[0].new, None);
    }

    #[test]
    fn test_set_json_records_serialized_values() {
        let mut flags = vec!["email".to_string()];
        let mut update = FieldUpdate::new();
        update
            .set_json("channels", &mut flags, Some(vec!["sms".to_string()]))
            .unwrap();

        let changes = update.into_changes();
        assert_eq!(changes[0].previous.as_deref(), Some("[\"email\"]"));
        assert_eq!(changes[0].new.as_deref(), Some("[\"sms\"]"));
    }
}
