//! Digests over canonical JSON
//!
//! Canonical form is `serde_json` output of a `Value`, whose object keys are
//! sorted, so the same facts always hash the same.

use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};

use lendledger_core::{LedgerError, LedgerResult};
use lendledger_customer::{Customer, KycRecord};

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn canonical_digest<T: Serialize>(value: &T) -> LedgerResult<String> {
    let value = serde_json::to_value(value)
        .map_err(|e| LedgerError::Storage(format!("cannot canonicalize digest input: {}", e)))?;
    Ok(sha256_hex(value.to_string().as_bytes()))
}

/// Digest of the identity facts a KYC record attests to
pub fn kyc_digest(kyc: &KycRecord) -> LedgerResult<String> {
    canonical_digest(&json!({
        "kycID": kyc.kyc_id,
        "customerID": kyc.customer_id,
        "documentHashes": kyc.document_hashes,
        "status": kyc.status,
        "verifiedAt": kyc.verified_at,
        "expiresAt": kyc.expires_at,
    }))
}

/// Placeholder income reference until income verification lands on the ledger
pub fn income_digest(customer_id: &str) -> LedgerResult<String> {
    canonical_digest(&json!({
        "customerID": customer_id,
        "incomeSource": "SELF_DECLARED",
    }))
}

pub fn consent_digest(customer: &Customer) -> LedgerResult<String> {
    canonical_digest(&json!({
        "customerID": customer.customer_id,
        "consentPreferences": customer.consent_preferences,
    }))
}
