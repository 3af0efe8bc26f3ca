//! Sanction list definitions, entries and update records

use chrono::{DateTime, Days, Months, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::{Display, EnumString};

use lendledger_core::{LedgerError, LedgerResult};
use lendledger_lifecycle::{EntityMeta, EntityType, LedgerEntity};
use lendledger_store::{composite_key, composite_prefix};

const ENTRY_NAMESPACE: &str = "SANCTION_ENTRY";
const UPDATE_NAMESPACE: &str = "SANCTION_UPDATE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListType {
    Sdn,
    Consolidated,
    Pep,
    AdverseMedia,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl UpdateFrequency {
    /// Lenient parse: anything unrecognized (or absent) is monthly
    pub fn parse_lenient(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.trim().to_ascii_uppercase().parse().ok())
            .unwrap_or(UpdateFrequency::Monthly)
    }

    /// Next scheduled refresh; months are calendar months, clamped to month end
    pub fn next_after(&self, from: DateTime<Utc>) -> LedgerResult<DateTime<Utc>> {
        let next = match self {
            UpdateFrequency::Daily => from.checked_add_days(Days::new(1)),
            UpdateFrequency::Weekly => from.checked_add_days(Days::new(7)),
            UpdateFrequency::Monthly => from.checked_add_months(Months::new(1)),
        };
        next.ok_or_else(|| LedgerError::Validation(format!("cannot schedule {} update after {}", self, from)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateType {
    Full,
    Incremental,
    Additions,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SanctionEntityType {
    #[default]
    Individual,
    Organization,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanctionListDefinition {
    #[serde(rename = "listID")]
    pub list_id: String,
    pub name: String,
    pub source: String,
    pub list_type: ListType,
    pub jurisdiction: String,
    #[serde(default)]
    pub description: String,
    pub is_active: bool,
    pub auto_update: bool,
    pub update_frequency: UpdateFrequency,
    /// Version label of the last accepted feed, as supplied by the source
    #[serde(default)]
    pub source_version: String,
    #[serde(default)]
    pub checksum: String,
    #[serde(default)]
    pub entry_count: u64,
    #[serde(default)]
    pub update_count: u64,
    pub last_modified_at: DateTime<Utc>,
    pub next_update_at: DateTime<Utc>,
    #[serde(flatten)]
    pub meta: EntityMeta,
}

impl LedgerEntity for SanctionListDefinition {
    const ENTITY_TYPE: EntityType = EntityType::SanctionList;

    fn id(&self) -> &str {
        &self.list_id
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }
}

/// One sanctioned party
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanctionEntry {
    #[serde(rename = "entryID")]
    pub entry_id: String,
    /// Filled in from the enclosing update
    #[serde(rename = "listID", default)]
    pub list_id: String,
    pub primary_name: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub entity_type: SanctionEntityType,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub nationality: Option<String>,
    /// Passport numbers, registration numbers and the like
    #[serde(default)]
    pub identifiers: BTreeMap<String, String>,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub sanction_reason: String,
    #[serde(default)]
    pub sanctioned_at: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub risk_score: u32,
    #[serde(default)]
    pub risk_category: String,
}

fn default_true() -> bool {
    true
}

impl SanctionEntry {
    /// Entry key, nested under its list so one list is one prefix scan
    pub fn key(&self) -> LedgerResult<String> {
        entry_key(&self.list_id, &self.entry_id)
    }

    /// `firstName lastName`, when either part is present
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

pub fn entry_key(list_id: &str, entry_id: &str) -> LedgerResult<String> {
    Ok(composite_key(ENTRY_NAMESPACE, &[list_id, entry_id])?)
}

pub fn entry_prefix(list_id: &str) -> LedgerResult<String> {
    Ok(composite_prefix(ENTRY_NAMESPACE, &[list_id])?)
}

/// Audit record of one accepted feed update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanctionListUpdate {
    #[serde(rename = "updateID")]
    pub update_id: String,
    #[serde(rename = "listID")]
    pub list_id: String,
    pub update_type: UpdateType,
    /// Sequence of this update within the list, starting at 1
    pub sequence: u64,
    pub source_version: String,
    pub previous_source_version: String,
    pub checksum: String,
    pub added_entries: usize,
    pub updated_entries: usize,
    pub removed_entries: usize,
    pub total_entries: usize,
    pub updated_by: String,
    #[serde(default)]
    pub update_notes: String,
    #[serde(rename = "transactionID")]
    pub transaction_id: String,
    pub timestamp: DateTime<Utc>,
}

impl SanctionListUpdate {
    pub fn key(&self) -> LedgerResult<String> {
        update_key(&self.list_id, self.sequence)
    }
}

pub fn update_key(list_id: &str, sequence: u64) -> LedgerResult<String> {
    Ok(composite_key(UPDATE_NAMESPACE, &[list_id, &format!("{:010}", sequence)])?)
}

pub fn update_prefix(list_id: &str) -> LedgerResult<String> {
    Ok(composite_prefix(UPDATE_NAMESPACE, &[list_id])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_monthly_is_calendar_month() {
        let jan31 = Utc.with_ymd_and_hms(2025, 1, 31, 10, 0, 0).unwrap();
        let next = UpdateFrequency::Monthly.next_after(jan31).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 2, 28, 10, 0, 0).unwrap());

        let mar15 = Utc.with_ymd_and_hms(2025, 3, 15, 0, 0, 0).unwrap();
        assert_eq!(
            UpdateFrequency::Monthly.next_after(mar15).unwrap(),
            Utc.with_ymd_and_hms(2025, 4, 15, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_daily_and_weekly() {
        let t = Utc.with_ymd_and_hms(2025, 12, 31, 23, 0, 0).unwrap();
        assert_eq!(
            UpdateFrequency::Daily.next_after(t).unwrap(),
            Utc.with_ymd_and_hms(2026, 1, 1, 23, 0, 0).unwrap()
        );
        assert_eq!(
            UpdateFrequency::Weekly.next_after(t).unwrap(),
            Utc.with_ymd_and_hms(2026, 1, 7, 23, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_unknown_frequency_is_monthly() {
        assert_eq!(UpdateFrequency::parse_lenient(Some("weekly")), UpdateFrequency::Weekly);
        assert_eq!(UpdateFrequency::parse_lenient(Some("HOURLY")), UpdateFrequency::Monthly);
        assert_eq!(UpdateFrequency::parse_lenient(None), UpdateFrequency::Monthly);
    }

    #[test]
    fn test_entry_defaults() {
        let entry: SanctionEntry = serde_json::from_value(json!({
            "entryID": "E1",
            "primaryName": "John Smith",
            "lastName": "Smith"
        }))
        .unwrap();
        assert!(entry.is_active);
        assert_eq!(entry.entity_type, SanctionEntityType::Individual);
        assert_eq!(entry.full_name().as_deref(), Some("Smith"));
    }

    #[test]
    fn test_list_type_strings() {
        assert_eq!("ADVERSE_MEDIA".parse::<ListType>().unwrap(), ListType::AdverseMedia);
        assert_eq!(ListType::Sdn.to_string(), "SDN");
        assert!("OFAC".parse::<ListType>().is_err());
    }
}
