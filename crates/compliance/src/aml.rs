//! AML checks: screen a customer against the active sanction lists

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use strum_macros::{Display, EnumIter, EnumString};

use lendledger_access::{authorize, Capability};
use lendledger_core::validate::require_all;
use lendledger_core::{new_entity_id, LedgerResult};
use lendledger_customer::Customer;
use lendledger_lifecycle::{
    apply_transition_with, check_expected_version, create, history, load, ChangeKind, EntityMeta, EntityType,
    FieldUpdate, HistoryRecord, LedgerEntity, Status, StatusEntity, TransitionTable,
};
use lendledger_store::Invocation;

use crate::sanction::SanctionEntityType;
use crate::screening::ScreeningHit;
use crate::service::SanctionService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, EnumIter, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AmlStatus {
    Pending,
    Clear,
    Flagged,
    Escalated,
    Blocked,
}

impl Status for AmlStatus {
    fn table() -> &'static TransitionTable<Self> {
        static TABLE: OnceLock<TransitionTable<AmlStatus>> = OnceLock::new();
        TABLE.get_or_init(|| {
            use AmlStatus::*;
            TransitionTable::new(EntityType::AmlRecord)
                .allow(Pending, &[Clear, Flagged])
                .allow(Flagged, &[Escalated, Clear, Blocked])
                .allow(Escalated, &[Clear, Blocked])
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmlRecord {
    #[serde(rename = "amlID")]
    pub aml_id: String,
    #[serde(rename = "customerID")]
    pub customer_id: String,
    /// e.g. ONBOARDING, PERIODIC, TRANSACTION
    pub check_type: String,
    pub screened_name: String,
    pub status: AmlStatus,
    pub risk_score: u32,
    #[serde(default)]
    pub hits: Vec<ScreeningHit>,
    #[serde(default)]
    pub notes: String,
    #[serde(flatten)]
    pub meta: EntityMeta,
}

impl LedgerEntity for AmlRecord {
    const ENTITY_TYPE: EntityType = EntityType::AmlRecord;

    fn id(&self) -> &str {
        &self.aml_id
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }
}

impl StatusEntity for AmlRecord {
    type Status = AmlStatus;

    fn status(&self) -> AmlStatus {
        self.status
    }

    fn set_status(&mut self, status: AmlStatus) {
        self.status = status;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformAmlCheckRequest {
    #[serde(rename = "customerID")]
    pub customer_id: String,
    pub check_type: String,
    #[serde(rename = "actorID")]
    pub actor_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAmlStatusRequest {
    #[serde(rename = "amlID")]
    pub aml_id: String,
    pub new_status: AmlStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(rename = "actorID")]
    pub actor_id: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AmlService {
    sanctions: SanctionService,
}

impl AmlService {
    pub fn new(sanctions: SanctionService) -> Self {
        Self { sanctions }
    }

    /// Screen the customer's full name; any hit flags the record
    pub fn perform_check(&self, inv: &mut Invocation<'_>, req: PerformAmlCheckRequest) -> LedgerResult<AmlRecord> {
        authorize(inv, &req.actor_id, Capability::ManageAml)?;
        require_all(&[
            ("customerID", req.customer_id.as_str()),
            ("checkType", req.check_type.as_str()),
        ])?;
        let customer: Customer = load(inv, &req.customer_id)?;

        let name = customer.full_name();
        let screening = self
            .sanctions
            .screen_name(inv, &name, Some(SanctionEntityType::Individual))?;
        let status = if screening.is_match {
            AmlStatus::Flagged
        } else {
            AmlStatus::Clear
        };

        let record = AmlRecord {
            aml_id: new_entity_id("AML"),
            customer_id: customer.customer_id,
            check_type: req.check_type.trim().to_ascii_uppercase(),
            screened_name: name,
            status,
            risk_score: screening.max_risk_score,
            hits: screening.hits,
            notes: String::new(),
            meta: EntityMeta::new(req.actor_id, inv.timestamp()),
        };
        create(inv, &record)?;

        tracing::info!(
            aml_id = %record.aml_id,
            customer_id = %record.customer_id,
            status = %record.status,
            hits = record.hits.len(),
            "AML check recorded"
        );
        Ok(record)
    }

    pub fn update_status(&self, inv: &mut Invocation<'_>, req: UpdateAmlStatusRequest) -> LedgerResult<AmlRecord> {
        authorize(inv, &req.actor_id, Capability::ManageAml)?;
        let mut record: AmlRecord = load(inv, &req.aml_id)?;
        check_expected_version(&record, req.expected_version)?;

        let mut notes = FieldUpdate::new();
        notes.set("notes", &mut record.notes, req.notes);
        apply_transition_with(
            inv,
            &mut record,
            req.new_status,
            ChangeKind::StatusChange,
            notes.into_changes(),
            &req.actor_id,
        )?;
        Ok(record)
    }

    pub fn get(&self, inv: &mut Invocation<'_>, actor_id: &str, aml_id: &str) -> LedgerResult<AmlRecord> {
        authorize(inv, actor_id, Capability::ViewAml)?;
        load(inv, aml_id)
    }

    pub fn history(&self, inv: &mut Invocation<'_>, actor_id: &str, aml_id: &str) -> LedgerResult<Vec<HistoryRecord>> {
        authorize(inv, actor_id, Capability::ViewHistory)?;
        load::<AmlRecord>(inv, aml_id)?;
        history::read(inv, EntityType::AmlRecord, aml_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aml_table() {
        let table = AmlStatus::table();
        assert!(table.is_allowed(AmlStatus::Flagged, AmlStatus::Escalated));
        assert!(!table.is_allowed(AmlStatus::Clear, AmlStatus::Flagged));
        assert!(table.is_terminal(AmlStatus::Blocked));
        assert_eq!(table.targets(AmlStatus::Escalated).len(), 2);
    }
}
