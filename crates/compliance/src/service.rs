//! Sanction list operations: create, reconcile, search, screen

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use lendledger_access::{authorize, Capability};
use lendledger_core::validate::{require, require_all};
use lendledger_core::{new_entity_id, LedgerError, LedgerResult};
use lendledger_lifecycle::{commit_changes, create, history, load, Change, EntityMeta, EntityType, HistoryRecord};
use lendledger_store::{Invocation, KeyModification};

use crate::reconcile::{reconcile, validate_entries};
use crate::sanction::{
    entry_key, entry_prefix, update_prefix, ListType, SanctionEntityType, SanctionEntry, SanctionListDefinition,
    SanctionListUpdate, UpdateFrequency, UpdateType,
};
use crate::screening::{matches_search, screen_entry, ScreeningHit, ScreeningResult};

pub const DEFAULT_SEARCH_LIMIT: usize = 50;
pub const MAX_SEARCH_LIMIT: usize = 500;

const LIST_CREATED_EVENT: &str = "SanctionListCreated";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateSanctionListRequest {
    /// Generated when omitted
    #[serde(rename = "listID")]
    pub list_id: Option<String>,
    pub name: String,
    pub source: String,
    pub list_type: String,
    pub jurisdiction: String,
    pub description: String,
    pub is_active: Option<bool>,
    pub auto_update: bool,
    pub update_frequency: Option<String>,
    #[serde(alias = "actorID")]
    pub created_by: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateSanctionListRequest {
    #[serde(rename = "listID")]
    pub list_id: String,
    pub update_type: String,
    pub entries: Vec<SanctionEntry>,
    /// Feed version label
    pub version: String,
    pub checksum: String,
    #[serde(alias = "actorID")]
    pub updated_by: String,
    pub update_notes: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchEntriesRequest {
    pub search_term: String,
    pub entity_type: Option<SanctionEntityType>,
    #[serde(rename = "listID")]
    pub list_id: Option<String>,
    pub limit: Option<usize>,
    #[serde(rename = "actorID")]
    pub actor_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchAsOfRequest {
    #[serde(flatten)]
    pub search: SearchEntriesRequest,
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScreenNameRequest {
    pub name: String,
    pub entity_type: Option<SanctionEntityType>,
    #[serde(rename = "actorID")]
    pub actor_id: String,
}

/// Last committed value of a key at or before `at`; `None` if absent or deleted then
fn value_as_of(mods: &[KeyModification], at: DateTime<Utc>) -> Option<&[u8]> {
    mods.iter()
        .filter(|m| m.timestamp <= at)
        .last()
        .and_then(|m| m.value.as_deref())
}

fn decode_stored<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> LedgerResult<T> {
    serde_json::from_slice(bytes).map_err(|e| LedgerError::Storage(format!("undecodable historical value: {}", e)))
}

#[derive(Debug, Clone, Copy)]
pub struct SanctionService {
    default_limit: usize,
    max_limit: usize,
}

impl Default for SanctionService {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT)
    }
}

impl SanctionService {
    pub fn new(default_limit: usize, max_limit: usize) -> Self {
        let max_limit = max_limit.max(1);
        Self {
            default_limit: default_limit.clamp(1, max_limit),
            max_limit,
        }
    }

    fn limit(&self, requested: Option<usize>) -> usize {
        match requested {
            None | Some(0) => self.default_limit,
            Some(n) => n.min(self.max_limit),
        }
    }

    /// Register a list and schedule its first refresh
    pub fn create_list(
        &self,
        inv: &mut Invocation<'_>,
        req: CreateSanctionListRequest,
    ) -> LedgerResult<SanctionListDefinition> {
        require("createdBy", req.created_by.as_str())?;
        authorize(inv, &req.created_by, Capability::ManageSanctions)?;
        require_all(&[
            ("name", req.name.as_str()),
            ("source", req.source.as_str()),
            ("jurisdiction", req.jurisdiction.as_str()),
            ("listType", req.list_type.as_str()),
        ])?;

        let list_type: ListType = req.list_type.trim().to_ascii_uppercase().parse().map_err(|_| {
            LedgerError::Validation(format!(
                "listType must be one of SDN, CONSOLIDATED, PEP, ADVERSE_MEDIA, INTERNAL (got {})",
                req.list_type
            ))
        })?;
        let frequency = UpdateFrequency::parse_lenient(req.update_frequency.as_deref());
        let now = inv.timestamp();

        let list_id = match req.list_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => new_entity_id("SL"),
        };
        let list = SanctionListDefinition {
            list_id,
            name: req.name,
            source: req.source,
            list_type,
            jurisdiction: req.jurisdiction,
            description: req.description,
            is_active: req.is_active.unwrap_or(true),
            auto_update: req.auto_update,
            update_frequency: frequency,
            source_version: String::new(),
            checksum: String::new(),
            entry_count: 0,
            update_count: 0,
            last_modified_at: now,
            next_update_at: frequency.next_after(now)?,
            meta: EntityMeta::new(req.created_by, now),
        };
        create(inv, &list)?;
        inv.set_event(
            LIST_CREATED_EVENT,
            json!({
                "listID": list.list_id,
                "name": list.name,
                "listType": list.list_type,
                "jurisdiction": list.jurisdiction,
                "nextUpdateAt": list.next_update_at,
            }),
        );
        Ok(list)
    }

    /// Reconcile a feed into a list and record the update
    pub fn update_list(
        &self,
        inv: &mut Invocation<'_>,
        req: UpdateSanctionListRequest,
    ) -> LedgerResult<SanctionListUpdate> {
        require("updatedBy", req.updated_by.as_str())?;
        authorize(inv, &req.updated_by, Capability::ManageSanctions)?;
        require_all(&[("listID", req.list_id.as_str()), ("version", req.version.as_str())])?;

        let update_type: UpdateType = req.update_type.trim().to_ascii_uppercase().parse().map_err(|_| {
            LedgerError::Validation(format!(
                "updateType must be one of FULL, INCREMENTAL, ADDITIONS (got {})",
                req.update_type
            ))
        })?;
        let mut list: SanctionListDefinition = load(inv, &req.list_id)?;

        validate_entries(&req.entries)?;
        let incoming: Vec<SanctionEntry> = req
            .entries
            .into_iter()
            .map(|mut entry| {
                entry.list_id = list.list_id.clone();
                entry
            })
            .collect();

        let existing = self.entries_of(inv, &list.list_id)?;
        let outcome = reconcile(&existing, incoming, update_type);
        for entry_id in &outcome.removals {
            inv.delete(entry_key(&list.list_id, entry_id)?);
        }
        for entry in &outcome.upserts {
            inv.put_json(entry.key()?, entry)?;
        }

        let now = inv.timestamp();
        let previous_source_version = list.source_version.clone();
        let sequence = list.update_count + 1;
        let mut changes = vec![Change::update(
            "updateCount",
            list.update_count.to_string(),
            sequence.to_string(),
        )];
        if list.source_version != req.version {
            changes.push(Change::update("sourceVersion", list.source_version.clone(), req.version.clone()));
        }
        if list.checksum != req.checksum {
            changes.push(Change::update("checksum", list.checksum.clone(), req.checksum.clone()));
        }
        let total = outcome.total_entries as u64;
        if list.entry_count != total {
            changes.push(Change::update("entryCount", list.entry_count.to_string(), total.to_string()));
        }

        list.update_count = sequence;
        list.source_version = req.version.clone();
        list.checksum = req.checksum.clone();
        list.entry_count = total;
        list.last_modified_at = now;
        if list.auto_update {
            list.next_update_at = list.update_frequency.next_after(now)?;
        }
        commit_changes(inv, &mut list, changes, &req.updated_by)?;

        let update = SanctionListUpdate {
            update_id: format!("{}-{:06}", list.list_id, sequence),
            list_id: list.list_id.clone(),
            update_type,
            sequence,
            source_version: req.version,
            previous_source_version,
            checksum: req.checksum,
            added_entries: outcome.added_entries,
            updated_entries: outcome.updated_entries,
            removed_entries: outcome.removed_entries,
            total_entries: outcome.total_entries,
            updated_by: req.updated_by,
            update_notes: req.update_notes,
            transaction_id: inv.tx_id().to_string(),
            timestamp: now,
        };
        inv.put_new(update.key()?, &update)?;

        tracing::info!(
            list_id = %update.list_id,
            update_type = %update_type,
            added = update.added_entries,
            updated = update.updated_entries,
            removed = update.removed_entries,
            total = update.total_entries,
            "Sanction list reconciled"
        );
        Ok(update)
    }

    pub fn get_list(
        &self,
        inv: &mut Invocation<'_>,
        actor_id: &str,
        list_id: &str,
    ) -> LedgerResult<SanctionListDefinition> {
        authorize(inv, actor_id, Capability::ViewSanctions)?;
        load(inv, list_id)
    }

    pub fn list_lists(&self, inv: &mut Invocation<'_>, actor_id: &str) -> LedgerResult<Vec<SanctionListDefinition>> {
        authorize(inv, actor_id, Capability::ViewSanctions)?;
        self.all_lists(inv)
    }

    /// Accepted updates of a list, oldest first
    pub fn list_updates(
        &self,
        inv: &mut Invocation<'_>,
        actor_id: &str,
        list_id: &str,
    ) -> LedgerResult<Vec<SanctionListUpdate>> {
        authorize(inv, actor_id, Capability::ViewSanctions)?;
        load::<SanctionListDefinition>(inv, list_id)?;
        let updates = inv.scan_json::<SanctionListUpdate>(&update_prefix(list_id)?)?;
        Ok(updates.into_iter().map(|(_, u)| u).collect())
    }

    pub fn history(
        &self,
        inv: &mut Invocation<'_>,
        actor_id: &str,
        list_id: &str,
    ) -> LedgerResult<Vec<HistoryRecord>> {
        authorize(inv, actor_id, Capability::ViewHistory)?;
        load::<SanctionListDefinition>(inv, list_id)?;
        history::read(inv, EntityType::SanctionList, list_id)
    }

    /// Active entries of active lists whose names contain the search term
    ///
    /// An unknown `listID` yields an empty result.
    pub fn search(&self, inv: &mut Invocation<'_>, req: SearchEntriesRequest) -> LedgerResult<Vec<SanctionEntry>> {
        authorize(inv, &req.actor_id, Capability::ViewSanctions)?;
        require("searchTerm", &req.search_term)?;
        let limit = self.limit(req.limit);

        let lists: Vec<SanctionListDefinition> = match req.list_id.as_deref().filter(|id| !id.trim().is_empty()) {
            Some(id) => inv
                .get_json::<SanctionListDefinition>(&EntityType::SanctionList.state_key(id))?
                .into_iter()
                .collect(),
            None => self.all_lists(inv)?,
        };

        let mut found = Vec::new();
        for list in lists.into_iter().filter(|l| l.is_active) {
            for (_, entry) in self.entries_of(inv, &list.list_id)? {
                if entry.is_active
                    && req.entity_type.map_or(true, |t| t == entry.entity_type)
                    && matches_search(&entry, &req.search_term)
                {
                    found.push(entry);
                    if found.len() >= limit {
                        return Ok(found);
                    }
                }
            }
        }
        tracing::debug!(term = %req.search_term, hits = found.len(), "Sanction search");
        Ok(found)
    }

    /// Same as [`Self::search`], evaluated against the ledger as it stood at `asOf`
    pub fn search_as_of(&self, inv: &mut Invocation<'_>, req: SearchAsOfRequest) -> LedgerResult<Vec<SanctionEntry>> {
        let SearchAsOfRequest { search: req, as_of } = req;
        authorize(inv, &req.actor_id, Capability::ViewSanctions)?;
        require("searchTerm", &req.search_term)?;
        let limit = self.limit(req.limit);

        let list_histories = match req.list_id.as_deref().filter(|id| !id.trim().is_empty()) {
            Some(id) => {
                let key = EntityType::SanctionList.state_key(id);
                let mods = inv.key_history(&key)?;
                vec![(key, mods)]
            }
            None => inv.prefix_history(&EntityType::SanctionList.state_prefix())?,
        };

        let mut found = Vec::new();
        for (_, mods) in list_histories {
            let Some(bytes) = value_as_of(&mods, as_of) else {
                continue;
            };
            let list: SanctionListDefinition = decode_stored(bytes)?;
            if !list.is_active {
                continue;
            }

            for (_, entry_mods) in inv.prefix_history(&entry_prefix(&list.list_id)?)? {
                let Some(bytes) = value_as_of(&entry_mods, as_of) else {
                    continue;
                };
                let entry: SanctionEntry = decode_stored(bytes)?;
                if entry.is_active
                    && req.entity_type.map_or(true, |t| t == entry.entity_type)
                    && matches_search(&entry, &req.search_term)
                {
                    found.push(entry);
                    if found.len() >= limit {
                        return Ok(found);
                    }
                }
            }
        }
        Ok(found)
    }

    pub fn screen(&self, inv: &mut Invocation<'_>, req: ScreenNameRequest) -> LedgerResult<ScreeningResult> {
        authorize(inv, &req.actor_id, Capability::ViewSanctions)?;
        require("name", &req.name)?;
        self.screen_name(inv, &req.name, req.entity_type)
    }

    /// Screen a name against every active entry of every active list (no capability check)
    pub fn screen_name(
        &self,
        inv: &mut Invocation<'_>,
        name: &str,
        entity_type: Option<SanctionEntityType>,
    ) -> LedgerResult<ScreeningResult> {
        let mut hits = Vec::new();
        for list in self.all_lists(inv)?.into_iter().filter(|l| l.is_active) {
            for (_, entry) in self.entries_of(inv, &list.list_id)? {
                if !entry.is_active || entity_type.is_some_and(|t| t != entry.entity_type) {
                    continue;
                }
                if let Some(matched) = screen_entry(&entry, name) {
                    hits.push(ScreeningHit::new(&entry, matched));
                }
            }
        }

        let result = ScreeningResult::new(name, hits);
        if result.is_match {
            tracing::warn!(hits = result.hits.len(), max_risk = result.max_risk_score, "Screening match");
        }
        Ok(result)
    }

    fn all_lists(&self, inv: &mut Invocation<'_>) -> LedgerResult<Vec<SanctionListDefinition>> {
        let lists = inv.scan_json::<SanctionListDefinition>(&EntityType::SanctionList.state_prefix())?;
        Ok(lists.into_iter().map(|(_, l)| l).collect())
    }

    fn entries_of(&self, inv: &mut Invocation<'_>, list_id: &str) -> LedgerResult<BTreeMap<String, SanctionEntry>> {
        let entries = inv.scan_json::<SanctionEntry>(&entry_prefix(list_id)?)?;
        Ok(entries.into_iter().map(|(_, e)| (e.entry_id.clone(), e)).collect())
    }
}
