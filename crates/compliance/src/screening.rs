//! Name matching shared by entry search, name screening and AML checks

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::sanction::SanctionEntry;

/// Lowercase, drop punctuation, collapse whitespace
pub fn normalize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .flat_map(char::to_lowercase)
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case-insensitive substring match on primary name, first, last or full name
pub fn matches_search(entry: &SanctionEntry, term: &str) -> bool {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return false;
    }
    let contains = |hay: &str| hay.to_lowercase().contains(&needle);

    contains(&entry.primary_name)
        || entry.first_name.as_deref().is_some_and(contains)
        || entry.last_name.as_deref().is_some_and(contains)
        || entry.full_name().is_some_and(|n| contains(&n))
}

/// Which of the entry's names matches a screened name, if any
///
/// Names are compared as normalized whole tokens: one side's tokens must all
/// appear on the other side, in any order ("SMITH, John" matches "John Smith",
/// "Li" does not match "William").
pub fn screen_entry(entry: &SanctionEntry, name: &str) -> Option<String> {
    let screened = normalize(name);
    if screened.is_empty() {
        return None;
    }

    let candidates = std::iter::once(entry.primary_name.clone())
        .chain(entry.full_name())
        .chain(entry.aliases.iter().cloned());
    for candidate in candidates {
        let normalized = normalize(&candidate);
        if normalized.is_empty() {
            continue;
        }
        if token_contained(&normalized, &screened) {
            return Some(candidate);
        }
    }
    None
}

/// Either name's token set is a subset of the other's
fn token_contained(a: &str, b: &str) -> bool {
    let left: BTreeSet<&str> = a.split(' ').collect();
    let right: BTreeSet<&str> = b.split(' ').collect();
    left.is_subset(&right) || right.is_subset(&left)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningHit {
    #[serde(rename = "listID")]
    pub list_id: String,
    #[serde(rename = "entryID")]
    pub entry_id: String,
    pub primary_name: String,
    pub matched_name: String,
    pub risk_score: u32,
    pub risk_category: String,
}

impl ScreeningHit {
    pub fn new(entry: &SanctionEntry, matched_name: String) -> Self {
        Self {
            list_id: entry.list_id.clone(),
            entry_id: entry.entry_id.clone(),
            primary_name: entry.primary_name.clone(),
            matched_name,
            risk_score: entry.risk_score,
            risk_category: entry.risk_category.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningResult {
    pub name: String,
    pub is_match: bool,
    pub hits: Vec<ScreeningHit>,
    pub max_risk_score: u32,
}

impl ScreeningResult {
    pub fn new(name: impl Into<String>, hits: Vec<ScreeningHit>) -> Self {
        let max_risk_score = hits.iter().map(|h| h.risk_score).max().unwrap_or(0);
        Self {
            name: name.into(),
            is_match: !hits.is_empty(),
            hits,
            max_risk_score,
        }
    }
}
