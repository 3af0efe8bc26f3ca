//! Customer records

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use strum_macros::{Display, EnumString};

use lendledger_lifecycle::{EntityMeta, EntityType, LedgerEntity, Status, StatusEntity, TransitionTable};

/// Index namespace mapping a national ID to its customer id
pub const NATIONAL_ID_PREFIX: &str = "NATIONALID";

pub fn national_id_key(national_id: &str) -> String {
    format!("{}_{}", NATIONAL_ID_PREFIX, national_id.trim())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
pub enum CustomerStatus {
    Active,
    Suspended,
    Closed,
}

impl Status for CustomerStatus {
    fn table() -> &'static TransitionTable<Self> {
        static TABLE: OnceLock<TransitionTable<CustomerStatus>> = OnceLock::new();
        TABLE.get_or_init(|| {
            use CustomerStatus::*;
            TransitionTable::new(EntityType::Customer)
                .allow(Active, &[Suspended, Closed])
                .allow(Suspended, &[Active, Closed])
        })
    }
}

/// What the customer agreed to share and receive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsentPreferences {
    pub data_sharing: bool,
    pub credit_bureau_check: bool,
    pub marketing: bool,
    pub third_party_sharing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(rename = "customerID")]
    pub customer_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    /// `YYYY-MM-DD`
    pub date_of_birth: String,
    #[serde(rename = "nationalID")]
    pub national_id: String,
    pub address: String,
    pub consent_preferences: ConsentPreferences,
    pub status: CustomerStatus,
    #[serde(default)]
    pub current_kyc_id: Option<String>,
    #[serde(default)]
    pub current_cdp_id: Option<String>,
    /// Every passport ever issued to this customer, oldest first
    #[serde(default)]
    pub cdp_history: Vec<String>,
    #[serde(flatten)]
    pub meta: EntityMeta,
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

impl LedgerEntity for Customer {
    const ENTITY_TYPE: EntityType = EntityType::Customer;

    fn id(&self) -> &str {
        &self.customer_id
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }
}

impl StatusEntity for Customer {
    type Status = CustomerStatus;

    fn status(&self) -> CustomerStatus {
        self.status
    }

    fn set_status(&mut self, status: CustomerStatus) {
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_closed_is_terminal() {
        let table = CustomerStatus::table();
        assert!(table.is_terminal(CustomerStatus::Closed));
        assert!(table.is_allowed(CustomerStatus::Suspended, CustomerStatus::Active));
        assert!(!table.is_allowed(CustomerStatus::Closed, CustomerStatus::Active));
    }

    #[test]
    fn test_json_shape() {
        let customer = Customer {
            customer_id: "CUST-1".into(),
            first_name: "Ann".into(),
            last_name: "Lee".into(),
            email: "ann@example.com".into(),
            phone: "555".into(),
            date_of_birth: "1990-01-01".into(),
            national_id: "N1".into(),
            address: "1 Main St".into(),
            consent_preferences: ConsentPreferences::default(),
            status: CustomerStatus::Active,
            current_kyc_id: None,
            current_cdp_id: None,
            cdp_history: Vec::new(),
            meta: EntityMeta::new("ACT-1", Utc::now()),
        };
        let value = serde_json::to_value(&customer).unwrap();
        assert_eq!(value["customerID"], json!("CUST-1"));
        assert_eq!(value["nationalID"], json!("N1"));
        assert_eq!(value["status"], json!("Active"));
        assert_eq!(value["version"], json!(1));
        assert_eq!(value["consentPreferences"]["creditBureauCheck"], json!(false));
        assert_eq!(customer.full_name(), "Ann Lee");
    }

    #[test]
    fn test_consent_fields_default() {
        let consent: ConsentPreferences = serde_json::from_value(json!({ "dataSharing": true })).unwrap();
        assert!(consent.data_sharing);
        assert!(!consent.marketing);
    }
}
