//! Customer and KYC operations
//!
//! Every operation starts with the capability check and stages all of its
//! writes on the caller's invocation.

use chrono::{DateTime, Days, Utc};
use serde::{Deserialize, Serialize};

use lendledger_access::{authorize, Capability};
use lendledger_core::validate::{past_date, require, require_all, require_email};
use lendledger_core::{new_entity_id, LedgerError, LedgerResult};
use lendledger_lifecycle::{
    apply_field_changes, apply_transition, apply_transition_with, check_expected_version, create, history, load,
    Change, ChangeKind, EntityMeta, EntityType, FieldUpdate, HistoryRecord,
};
use lendledger_store::Invocation;

use crate::customer::{national_id_key, ConsentPreferences, Customer, CustomerStatus};
use crate::kyc::{KycRecord, KycStatus};

/// Default KYC validity once verified
pub const DEFAULT_KYC_VALIDITY_DAYS: i64 = 365;

/// Longest accepted KYC validity
pub const MAX_KYC_VALIDITY_DAYS: i64 = 3650;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterCustomerRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: String,
    #[serde(rename = "nationalID")]
    pub national_id: String,
    pub address: String,
    pub consent_preferences: ConsentPreferences,
    #[serde(rename = "actorID")]
    pub actor_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomerRequest {
    #[serde(rename = "customerID")]
    pub customer_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub consent_preferences: Option<ConsentPreferences>,
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(rename = "actorID")]
    pub actor_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomerStatusRequest {
    #[serde(rename = "customerID")]
    pub customer_id: String,
    pub new_status: CustomerStatus,
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(rename = "actorID")]
    pub actor_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateKycRequest {
    #[serde(rename = "customerID")]
    pub customer_id: String,
    #[serde(default)]
    pub document_hashes: Vec<String>,
    #[serde(rename = "actorID")]
    pub actor_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateKycStatusRequest {
    #[serde(rename = "kycID")]
    pub kyc_id: String,
    pub new_status: KycStatus,
    #[serde(default)]
    pub verification_notes: Option<String>,
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(rename = "actorID")]
    pub actor_id: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CustomerService;

impl CustomerService {
    pub fn new() -> Self {
        Self
    }

    /// Onboard a customer; the national ID must not be in use
    pub fn register(&self, inv: &mut Invocation<'_>, req: RegisterCustomerRequest) -> LedgerResult<Customer> {
        authorize(inv, &req.actor_id, Capability::CreateCustomer)?;
        require_all(&[
            ("firstName", req.first_name.as_str()),
            ("lastName", req.last_name.as_str()),
            ("email", req.email.as_str()),
            ("phone", req.phone.as_str()),
            ("dateOfBirth", req.date_of_birth.as_str()),
            ("nationalID", req.national_id.as_str()),
            ("address", req.address.as_str()),
        ])?;
        require_email("email", req.email.as_str())?;
        past_date("dateOfBirth", &req.date_of_birth, inv.timestamp())?;

        let index_key = national_id_key(&req.national_id);
        if inv.exists(&index_key)? {
            tracing::warn!(actor_id = %req.actor_id, "Duplicate national ID refused");
            return Err(LedgerError::AlreadyExists(format!(
                "customer with national ID {} already exists",
                req.national_id.trim()
            )));
        }

        let customer = Customer {
            customer_id: new_entity_id("CUST"),
            first_name: req.first_name,
            last_name: req.last_name,
            email: req.email,
            phone: req.phone,
            date_of_birth: req.date_of_birth,
            national_id: req.national_id.trim().to_string(),
            address: req.address,
            consent_preferences: req.consent_preferences,
            status: CustomerStatus::Active,
            current_kyc_id: None,
            current_cdp_id: None,
            cdp_history: Vec::new(),
            meta: EntityMeta::new(req.actor_id, inv.timestamp()),
        };
        create(inv, &customer)?;
        inv.put_json(index_key, &customer.customer_id)?;
        Ok(customer)
    }

    pub fn get(&self, inv: &mut Invocation<'_>, actor_id: &str, customer_id: &str) -> LedgerResult<Customer> {
        authorize(inv, actor_id, Capability::ViewCustomer)?;
        tracing::debug!(customer_id, "Get customer");
        load(inv, customer_id)
    }

    /// Update contact details and consent; unchanged fields are skipped
    pub fn update(&self, inv: &mut Invocation<'_>, req: UpdateCustomerRequest) -> LedgerResult<Customer> {
        authorize(inv, &req.actor_id, Capability::UpdateCustomer)?;
        let mut customer: Customer = load(inv, &req.customer_id)?;
        check_expected_version(&customer, req.expected_version)?;

        if let Some(email) = &req.email {
            require_email("email", email)?;
        }
        if let Some(phone) = &req.phone {
            require("phone", phone)?;
        }
        if let Some(address) = &req.address {
            require("address", address)?;
        }

        let mut update = FieldUpdate::new();
        update
            .set("email", &mut customer.email, req.email)
            .set("phone", &mut customer.phone, req.phone)
            .set("address", &mut customer.address, req.address)
            .set_json(
                "consentPreferences",
                &mut customer.consent_preferences,
                req.consent_preferences,
            )?;
        apply_field_changes(inv, &mut customer, update, &req.actor_id)?;
        Ok(customer)
    }

    pub fn update_status(
        &self,
        inv: &mut Invocation<'_>,
        req: UpdateCustomerStatusRequest,
    ) -> LedgerResult<Customer> {
        authorize(inv, &req.actor_id, Capability::UpdateCustomer)?;
        let mut customer: Customer = load(inv, &req.customer_id)?;
        check_expected_version(&customer, req.expected_version)?;
        apply_transition(inv, &mut customer, req.new_status, &req.actor_id)?;
        Ok(customer)
    }

    pub fn history(
        &self,
        inv: &mut Invocation<'_>,
        actor_id: &str,
        customer_id: &str,
    ) -> LedgerResult<Vec<HistoryRecord>> {
        authorize(inv, actor_id, Capability::ViewHistory)?;
        load::<Customer>(inv, customer_id)?;
        history::read(inv, EntityType::Customer, customer_id)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct KycService {
    validity_days: i64,
}

impl Default for KycService {
    fn default() -> Self {
        Self::new(DEFAULT_KYC_VALIDITY_DAYS)
    }
}

impl KycService {
    pub fn new(validity_days: i64) -> Self {
        Self { validity_days }
    }

    /// Open a PENDING KYC record and make it the customer's current one
    pub fn initiate(&self, inv: &mut Invocation<'_>, req: InitiateKycRequest) -> LedgerResult<KycRecord> {
        authorize(inv, &req.actor_id, Capability::ManageKyc)?;
        require("customerID", req.customer_id.as_str())?;
        let document_hashes: Vec<String> = req
            .document_hashes
            .iter()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();
        if document_hashes.is_empty() {
            return Err(LedgerError::required("documentHashes"));
        }

        let mut customer: Customer = load(inv, &req.customer_id)?;
        if customer.status == CustomerStatus::Closed {
            return Err(LedgerError::Validation(format!(
                "customer {} is closed",
                customer.customer_id
            )));
        }

        let kyc = KycRecord {
            kyc_id: new_entity_id("KYC"),
            customer_id: customer.customer_id.clone(),
            document_hashes,
            status: KycStatus::Pending,
            verification_notes: String::new(),
            verified_at: None,
            expires_at: None,
            meta: EntityMeta::new(req.actor_id.clone(), inv.timestamp()),
        };
        create(inv, &kyc)?;

        let mut update = FieldUpdate::new();
        update.set_optional("currentKycId", &mut customer.current_kyc_id, Some(kyc.kyc_id.clone()));
        apply_field_changes(inv, &mut customer, update, &req.actor_id)?;
        Ok(kyc)
    }

    /// Move a KYC record along its table; VERIFIED stamps the validity window
    pub fn update_status(&self, inv: &mut Invocation<'_>, req: UpdateKycStatusRequest) -> LedgerResult<KycRecord> {
        authorize(inv, &req.actor_id, Capability::ManageKyc)?;
        let mut kyc: KycRecord = load(inv, &req.kyc_id)?;
        check_expected_version(&kyc, req.expected_version)?;

        let mut extra = FieldUpdate::new();
        extra.set("verificationNotes", &mut kyc.verification_notes, req.verification_notes);
        let mut changes = extra.into_changes();

        if req.new_status == KycStatus::Verified && kyc.status != KycStatus::Verified {
            let now = inv.timestamp();
            let expires_at = kyc_expiry(now, self.validity_days)?;
            changes.push(Change::new(
                ChangeKind::Update,
                "verifiedAt",
                kyc.verified_at.map(|t| t.to_rfc3339()),
                Some(now.to_rfc3339()),
            ));
            changes.push(Change::new(
                ChangeKind::Update,
                "expiresAt",
                kyc.expires_at.map(|t| t.to_rfc3339()),
                Some(expires_at.to_rfc3339()),
            ));
            kyc.verified_at = Some(now);
            kyc.expires_at = Some(expires_at);
        }

        apply_transition_with(inv, &mut kyc, req.new_status, ChangeKind::StatusChange, changes, &req.actor_id)?;
        Ok(kyc)
    }

    pub fn get(&self, inv: &mut Invocation<'_>, actor_id: &str, kyc_id: &str) -> LedgerResult<KycRecord> {
        authorize(inv, actor_id, Capability::ViewKyc)?;
        load(inv, kyc_id)
    }

    pub fn history(&self, inv: &mut Invocation<'_>, actor_id: &str, kyc_id: &str) -> LedgerResult<Vec<HistoryRecord>> {
        authorize(inv, actor_id, Capability::ViewHistory)?;
        load::<KycRecord>(inv, kyc_id)?;
        history::read(inv, EntityType::KycRecord, kyc_id)
    }
}

fn kyc_expiry(verified_at: DateTime<Utc>, validity_days: i64) -> LedgerResult<DateTime<Utc>> {
    u64::try_from(validity_days)
        .ok()
        .filter(|days| (1..=MAX_KYC_VALIDITY_DAYS as u64).contains(days))
        .and_then(|days| verified_at.checked_add_days(Days::new(days)))
        .ok_or_else(|| {
            LedgerError::Validation(format!(
                "KYC validity must be between 1 and {} days (got {})",
                MAX_KYC_VALIDITY_DAYS, validity_days
            ))
        })
}
