//! Passport operations

use chrono::{DateTime, Days, Utc};
use serde::{Deserialize, Serialize};

use lendledger_access::{authorize, Capability};
use lendledger_core::validate::require;
use lendledger_core::{new_entity_id, LedgerError, LedgerResult};
use lendledger_customer::{Customer, KycRecord, KycStatus};
use lendledger_lifecycle::{
    apply_field_changes, apply_transition, apply_transition_with, create, history, load, Change, ChangeKind,
    EntityMeta, EntityType, FieldUpdate, HistoryRecord,
};
use lendledger_store::Invocation;

use crate::digest::{consent_digest, income_digest, kyc_digest};
use crate::passport::{CanonicalDataPassport, CdpStatus, VerificationLevel};

pub const DEFAULT_MAX_VALIDITY_DAYS: i64 = 365;

/// Ceiling for a configured maximum validity
pub const MAX_CDP_VALIDITY_DAYS: i64 = 365;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateCdpRequest {
    #[serde(rename = "customerID")]
    pub customer_id: String,
    pub verification_level: String,
    pub validity_days: i64,
    #[serde(rename = "actorID")]
    pub actor_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidateCdpRequest {
    #[serde(rename = "cdpID")]
    pub cdp_id: String,
    #[serde(rename = "actorID")]
    pub actor_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RevokeCdpRequest {
    #[serde(rename = "cdpID")]
    pub cdp_id: String,
    pub revocation_reason: String,
    #[serde(rename = "actorID")]
    pub actor_id: String,
}

pub type ExpireCdpRequest = ValidateCdpRequest;

/// Outcome of a validity check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdpValidation {
    #[serde(rename = "cdpID")]
    pub cdp_id: String,
    pub is_valid: bool,
    pub status: CdpStatus,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdpIntegrityReport {
    #[serde(rename = "cdpID")]
    pub cdp_id: String,
    pub kyc_hash: String,
    pub income_hash: String,
    pub consent_hash: String,
    pub verified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct PassportService {
    max_validity_days: i64,
}

impl Default for PassportService {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_VALIDITY_DAYS)
    }
}

impl PassportService {
    pub fn new(max_validity_days: i64) -> Self {
        Self { max_validity_days }
    }

    /// Seal the customer's verified KYC into a new passport and make it current
    pub fn generate(&self, inv: &mut Invocation<'_>, req: GenerateCdpRequest) -> LedgerResult<CanonicalDataPassport> {
        authorize(inv, &req.actor_id, Capability::GenerateCdp)?;
        require("customerID", &req.customer_id)?;
        require("verificationLevel", &req.verification_level)?;
        let level: VerificationLevel = req.verification_level.trim().to_ascii_uppercase().parse().map_err(|_| {
            LedgerError::Validation(format!(
                "verificationLevel must be one of BASIC, STANDARD, ENHANCED (got {})",
                req.verification_level
            ))
        })?;
        let validity = u64::try_from(req.validity_days)
            .ok()
            .filter(|days| *days >= 1 && req.validity_days <= self.max_validity_days)
            .map(Days::new)
            .ok_or_else(|| {
                LedgerError::Validation(format!(
                    "validityDays must be between 1 and {}",
                    self.max_validity_days
                ))
            })?;

        let mut customer: Customer = load(inv, &req.customer_id)?;
        let kyc_id = customer.current_kyc_id.clone().ok_or_else(|| {
            LedgerError::Validation(format!("customer {} has no KYC record", customer.customer_id))
        })?;
        let kyc: KycRecord = load(inv, &kyc_id)?;
        let now = inv.timestamp();
        if kyc.status != KycStatus::Verified {
            return Err(LedgerError::Validation(format!(
                "KYC {} is {}, not VERIFIED",
                kyc.kyc_id, kyc.status
            )));
        }
        if !kyc.is_current(now) {
            return Err(LedgerError::Validation(format!("KYC {} has expired", kyc.kyc_id)));
        }

        let expires_at = now
            .checked_add_days(validity)
            .ok_or_else(|| LedgerError::Validation(format!("validityDays {} is out of range", req.validity_days)))?;

        let cdp = CanonicalDataPassport {
            cdp_id: new_entity_id("CDP"),
            customer_id: customer.customer_id.clone(),
            kyc_id: kyc.kyc_id.clone(),
            kyc_hash: kyc_digest(&kyc)?,
            income_hash: income_digest(&customer.customer_id)?,
            consent_hash: consent_digest(&customer)?,
            verification_level: level,
            generated_at: now,
            expires_at,
            source_transaction_ids: vec![inv.tx_id().to_string()],
            issued_by: req.actor_id.clone(),
            status: CdpStatus::Valid,
            revoked_at: None,
            revocation_reason: None,
            meta: EntityMeta::new(req.actor_id.clone(), now),
        };
        create(inv, &cdp)?;

        let mut cdp_history = customer.cdp_history.clone();
        cdp_history.push(cdp.cdp_id.clone());
        let mut update = FieldUpdate::new();
        update.set_optional("currentCdpId", &mut customer.current_cdp_id, Some(cdp.cdp_id.clone()));
        update.set_json("cdpHistory", &mut customer.cdp_history, Some(cdp_history))?;
        apply_field_changes(inv, &mut customer, update, &req.actor_id)?;
        Ok(cdp)
    }

    /// Check a passport; a VALID passport past its expiry is flipped to EXPIRED
    ///
    /// The flip is a write: the caller must commit the invocation for it to stick.
    pub fn validate(&self, inv: &mut Invocation<'_>, req: ValidateCdpRequest) -> LedgerResult<CdpValidation> {
        authorize(inv, &req.actor_id, Capability::ViewCdp)?;
        let mut cdp: CanonicalDataPassport = load(inv, &req.cdp_id)?;
        let now = inv.timestamp();

        let reason = if cdp.status == CdpStatus::Revoked {
            Some(format!(
                "revoked: {}",
                cdp.revocation_reason.as_deref().unwrap_or_default()
            ))
        } else if cdp.is_past_expiry(now) {
            if cdp.status == CdpStatus::Valid {
                apply_transition(inv, &mut cdp, CdpStatus::Expired, &req.actor_id)?;
                tracing::info!(cdp_id = %cdp.cdp_id, "Passport expired on validation");
            }
            Some(format!("expired at {}", cdp.expires_at.to_rfc3339()))
        } else if cdp.status == CdpStatus::Expired {
            Some("expired".to_string())
        } else {
            None
        };

        Ok(CdpValidation {
            cdp_id: cdp.cdp_id,
            is_valid: reason.is_none(),
            status: cdp.status,
            expires_at: cdp.expires_at,
            reason,
        })
    }

    /// Maintenance flip of a VALID passport past its expiry; other states are left alone
    pub fn expire(&self, inv: &mut Invocation<'_>, req: ExpireCdpRequest) -> LedgerResult<CanonicalDataPassport> {
        authorize(inv, &req.actor_id, Capability::RevokeCdp)?;
        let mut cdp: CanonicalDataPassport = load(inv, &req.cdp_id)?;
        if cdp.status != CdpStatus::Valid {
            tracing::debug!(cdp_id = %cdp.cdp_id, status = %cdp.status, "Nothing to expire");
            return Ok(cdp);
        }
        if !cdp.is_past_expiry(inv.timestamp()) {
            return Err(LedgerError::Validation(format!(
                "CDP {} is valid until {}",
                cdp.cdp_id,
                cdp.expires_at.to_rfc3339()
            )));
        }
        apply_transition(inv, &mut cdp, CdpStatus::Expired, &req.actor_id)?;
        Ok(cdp)
    }

    /// Revoke a passport and drop it as the customer's current one
    pub fn revoke(&self, inv: &mut Invocation<'_>, req: RevokeCdpRequest) -> LedgerResult<CanonicalDataPassport> {
        authorize(inv, &req.actor_id, Capability::RevokeCdp)?;
        require("revocationReason", &req.revocation_reason)?;
        let mut cdp: CanonicalDataPassport = load(inv, &req.cdp_id)?;
        if cdp.status == CdpStatus::Revoked {
            return Err(LedgerError::Validation(format!("CDP {} is already revoked", cdp.cdp_id)));
        }

        let now = inv.timestamp();
        let extra = vec![
            Change::new(ChangeKind::Update, "revokedAt", None, Some(now.to_rfc3339())),
            Change::new(
                ChangeKind::Update,
                "revocationReason",
                None,
                Some(req.revocation_reason.clone()),
            ),
        ];
        cdp.revoked_at = Some(now);
        cdp.revocation_reason = Some(req.revocation_reason);
        apply_transition_with(inv, &mut cdp, CdpStatus::Revoked, ChangeKind::Revoke, extra, &req.actor_id)?;

        let mut customer: Customer = load(inv, &cdp.customer_id)?;
        if customer.current_cdp_id.as_deref() == Some(cdp.cdp_id.as_str()) {
            let mut update = FieldUpdate::new();
            update.set_optional("currentCdpId", &mut customer.current_cdp_id, None);
            apply_field_changes(inv, &mut customer, update, &req.actor_id)?;
        }

        tracing::info!(cdp_id = %cdp.cdp_id, customer_id = %cdp.customer_id, "Passport revoked");
        Ok(cdp)
    }

    pub fn get(&self, inv: &mut Invocation<'_>, actor_id: &str, cdp_id: &str) -> LedgerResult<CanonicalDataPassport> {
        authorize(inv, actor_id, Capability::ViewCdp)?;
        load(inv, cdp_id)
    }

    /// Every passport ever issued to a customer, oldest first
    pub fn customer_cdps(
        &self,
        inv: &mut Invocation<'_>,
        actor_id: &str,
        customer_id: &str,
    ) -> LedgerResult<Vec<CanonicalDataPassport>> {
        authorize(inv, actor_id, Capability::ViewCdp)?;
        let customer: Customer = load(inv, customer_id)?;
        customer.cdp_history.iter().map(|id| load(inv, id)).collect()
    }

    /// Recompute the digests from current ledger state and compare
    pub fn verify_integrity(
        &self,
        inv: &mut Invocation<'_>,
        actor_id: &str,
        cdp_id: &str,
    ) -> LedgerResult<CdpIntegrityReport> {
        authorize(inv, actor_id, Capability::ViewCdp)?;
        let cdp: CanonicalDataPassport = load(inv, cdp_id)?;
        let customer: Customer = load(inv, &cdp.customer_id)?;
        let kyc: KycRecord = load(inv, &cdp.kyc_id)?;

        let checks = [
            ("kycHash", &cdp.kyc_hash, kyc_digest(&kyc)?),
            ("incomeHash", &cdp.income_hash, income_digest(&customer.customer_id)?),
            ("consentHash", &cdp.consent_hash, consent_digest(&customer)?),
        ];
        for (field, stored, recomputed) in &checks {
            if *stored != recomputed {
                tracing::warn!(cdp_id, field, "Passport digest mismatch");
                return Err(LedgerError::Integrity(format!(
                    "{} of CDP {} does not match current ledger state",
                    field, cdp_id
                )));
            }
        }

        Ok(CdpIntegrityReport {
            cdp_id: cdp.cdp_id,
            kyc_hash: cdp.kyc_hash,
            income_hash: cdp.income_hash,
            consent_hash: cdp.consent_hash,
            verified_at: inv.timestamp(),
        })
    }

    pub fn history(&self, inv: &mut Invocation<'_>, actor_id: &str, cdp_id: &str) -> LedgerResult<Vec<HistoryRecord>> {
        authorize(inv, actor_id, Capability::ViewHistory)?;
        load::<CanonicalDataPassport>(inv, cdp_id)?;
        history::read(inv, EntityType::Cdp, cdp_id)
    }
}
