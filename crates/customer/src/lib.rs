//! LendLedger Customer - customer records and KYC verification
//!
//! Customers are keyed `CUSTOMER_<id>` and indexed by national ID so the
//! same person cannot be onboarded twice. A customer points at its current
//! KYC record and current passport; both references are ordinary fields and
//! change through the same version/history rules as everything else.

pub mod customer;
pub mod kyc;
pub mod service;

pub use customer::{national_id_key, ConsentPreferences, Customer, CustomerStatus};
pub use kyc::{KycRecord, KycStatus};
pub use service::{
    CustomerService, InitiateKycRequest, KycService, RegisterCustomerRequest, UpdateCustomerRequest,
    UpdateCustomerStatusRequest, UpdateKycStatusRequest, DEFAULT_KYC_VALIDITY_DAYS, MAX_KYC_VALIDITY_DAYS,
};
