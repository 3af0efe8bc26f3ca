//! The passport record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use strum_macros::{Display, EnumIter, EnumString};

use lendledger_lifecycle::{EntityMeta, EntityType, LedgerEntity, Status, StatusEntity, TransitionTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationLevel {
    Basic,
    Standard,
    Enhanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, EnumIter, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CdpStatus {
    Valid,
    Expired,
    Revoked,
}

impl Status for CdpStatus {
    fn table() -> &'static TransitionTable<Self> {
        static TABLE: OnceLock<TransitionTable<CdpStatus>> = OnceLock::new();
        TABLE.get_or_init(|| {
            use CdpStatus::*;
            TransitionTable::new(EntityType::Cdp)
                .allow(Valid, &[Expired, Revoked])
                .allow(Expired, &[Revoked])
        })
    }
}

/// # Invariants
/// - `expires_at > generated_at`
/// - `status == Revoked` implies `revoked_at` and `revocation_reason` are set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalDataPassport {
    #[serde(rename = "cdpID")]
    pub cdp_id: String,
    #[serde(rename = "customerID")]
    pub customer_id: String,
    /// KYC record the passport was sealed from
    #[serde(rename = "kycID")]
    pub kyc_id: String,
    pub kyc_hash: String,
    pub income_hash: String,
    pub consent_hash: String,
    pub verification_level: VerificationLevel,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(rename = "sourceTransactionIDs")]
    pub source_transaction_ids: Vec<String>,
    pub issued_by: String,
    pub status: CdpStatus,
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub revocation_reason: Option<String>,
    #[serde(flatten)]
    pub meta: EntityMeta,
}

impl CanonicalDataPassport {
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

impl LedgerEntity for CanonicalDataPassport {
    const ENTITY_TYPE: EntityType = EntityType::Cdp;

    fn id(&self) -> &str {
        &self.cdp_id
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }
}

impl StatusEntity for CanonicalDataPassport {
    type Status = CdpStatus;

    fn status(&self) -> CdpStatus {
        self.status
    }

    fn set_status(&mut self, status: CdpStatus) {
        self.status = status;
    }
}
