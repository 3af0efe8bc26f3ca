//! KYC verification records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use strum_macros::{Display, EnumIter, EnumString};

use lendledger_lifecycle::{EntityMeta, EntityType, LedgerEntity, Status, StatusEntity, TransitionTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, EnumIter, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KycStatus {
    Pending,
    InReview,
    Verified,
    Rejected,
    Expired,
    Revoked,
}

impl Status for KycStatus {
    fn table() -> &'static TransitionTable<Self> {
        static TABLE: OnceLock<TransitionTable<KycStatus>> = OnceLock::new();
        TABLE.get_or_init(|| {
            use KycStatus::*;
            TransitionTable::new(EntityType::KycRecord)
                .allow(Pending, &[InReview, Verified, Rejected])
                .allow(InReview, &[Verified, Rejected, Pending])
                .allow(Verified, &[Expired, Revoked])
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycRecord {
    #[serde(rename = "kycID")]
    pub kyc_id: String,
    #[serde(rename = "customerID")]
    pub customer_id: String,
    /// Digests of the identity documents; the documents stay off-ledger
    pub document_hashes: Vec<String>,
    pub status: KycStatus,
    #[serde(default)]
    pub verification_notes: String,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub meta: EntityMeta,
}

impl KycRecord {
    /// Verified and not past its expiry at `now`
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.status == KycStatus::Verified && self.expires_at.map_or(true, |exp| now <= exp)
    }
}

impl LedgerEntity for KycRecord {
    const ENTITY_TYPE: EntityType = EntityType::KycRecord;

    fn id(&self) -> &str {
        &self.kyc_id
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }
}

impl StatusEntity for KycRecord {
    type Status = KycStatus;

    fn status(&self) -> KycStatus {
        self.status
    }

    fn set_status(&mut self, status: KycStatus) {
        self.status = status;
    }
}
