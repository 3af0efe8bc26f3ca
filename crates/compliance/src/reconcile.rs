//! Merge a feed's entries into a list's current entries

use std::collections::{BTreeMap, BTreeSet};

use lendledger_core::{LedgerError, LedgerResult};

use crate::sanction::{SanctionEntry, UpdateType};

/// What a feed update does to a list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Entries to write, in entry-id order
    pub upserts: Vec<SanctionEntry>,
    /// Entry ids to delete
    pub removals: Vec<String>,
    pub added_entries: usize,
    pub updated_entries: usize,
    pub removed_entries: usize,
    pub total_entries: usize,
}

/// Reject blank ids, blank names and ids repeated within one feed
pub fn validate_entries(entries: &[SanctionEntry]) -> LedgerResult<()> {
    let mut seen = BTreeSet::new();
    for (index, entry) in entries.iter().enumerate() {
        if entry.entry_id.trim().is_empty() {
            return Err(LedgerError::Validation(format!("entries[{}].entryID is required", index)));
        }
        if entry.primary_name.trim().is_empty() {
            return Err(LedgerError::Validation(format!("entries[{}].primaryName is required", index)));
        }
        if !seen.insert(entry.entry_id.as_str()) {
            return Err(LedgerError::Validation(format!(
                "entryID {} appears more than once in the update",
                entry.entry_id
            )));
        }
    }
    Ok(())
}

/// Apply `update_type` to `existing` (keyed by entry id)
///
/// - FULL: `incoming` replaces everything; `added_entries` is the feed size
/// - INCREMENTAL: upsert by entry id
/// - ADDITIONS: insert unseen ids only, leave known ids untouched
pub fn reconcile(
    existing: &BTreeMap<String, SanctionEntry>,
    incoming: Vec<SanctionEntry>,
    update_type: UpdateType,
) -> Reconciliation {
    let mut out = Reconciliation::default();
    match update_type {
        UpdateType::Full => {
            let keep: BTreeSet<&str> = incoming.iter().map(|e| e.entry_id.as_str()).collect();
            out.removals = existing
                .keys()
                .filter(|id| !keep.contains(id.as_str()))
                .cloned()
                .collect();
            out.removed_entries = out.removals.len();
            out.added_entries = incoming.len();
            out.total_entries = incoming.len();
            out.upserts = incoming;
        }
        UpdateType::Incremental => {
            for entry in incoming {
                match existing.get(&entry.entry_id) {
                    Some(current) if *current == entry => {}
                    Some(_) => {
                        out.updated_entries += 1;
                        out.upserts.push(entry);
                    }
                    None => {
                        out.added_entries += 1;
                        out.upserts.push(entry);
                    }
                }
            }
            out.total_entries = existing.len() + out.added_entries;
        }
        UpdateType::Additions => {
            for entry in incoming {
                if !existing.contains_key(&entry.entry_id) {
                    out.added_entries += 1;
                    out.upserts.push(entry);
                }
            }
            out.total_entries = existing.len() + out.added_entries;
        }
    }
    out.upserts.sort_by(|a, b| a.entry_id.cmp(&b.entry_id));
    out
}
