//! LendLedger Passport - Canonical Data Passport (CDP)
//!
//! A CDP seals a customer's verified KYC record, an income reference and the
//! customer's consent preferences into SHA-256 digests, so a lender can reuse
//! the verification without seeing the underlying data. A passport expires
//! after its validity window and can be revoked at any time.

pub mod digest;
pub mod passport;
pub mod service;

pub use digest::{consent_digest, income_digest, kyc_digest, sha256_hex};
pub use passport::{CanonicalDataPassport, CdpStatus, VerificationLevel};
pub use service::{
    CdpIntegrityReport, CdpValidation, ExpireCdpRequest, GenerateCdpRequest, PassportService, RevokeCdpRequest,
    ValidateCdpRequest, DEFAULT_MAX_VALIDITY_DAYS, MAX_CDP_VALIDITY_DAYS,
};
