//! Loan application records

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use strum_macros::{Display, EnumIter, EnumString};

use lendledger_core::{Amount, LedgerResult};
use lendledger_lifecycle::{EntityMeta, EntityType, LedgerEntity, Status, StatusEntity, TransitionTable};
use lendledger_store::{composite_key, composite_prefix};

/// Index namespace: customer id -> loan ids
const CUSTOMER_LOANS_NAMESPACE: &str = "CUSTOMER_LOANS";

pub fn customer_loan_key(customer_id: &str, loan_id: &str) -> LedgerResult<String> {
    Ok(composite_key(CUSTOMER_LOANS_NAMESPACE, &[customer_id, loan_id])?)
}

pub fn customer_loan_prefix(customer_id: &str) -> LedgerResult<String> {
    Ok(composite_prefix(CUSTOMER_LOANS_NAMESPACE, &[customer_id])?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanType {
    Personal,
    Home,
    Auto,
    Business,
    Education,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, EnumIter, Display)]
pub enum LoanStatus {
    Submitted,
    Underwriting,
    CreditReview,
    Approved,
    Rejected,
    Disbursed,
    Cancelled,
}

impl Status for LoanStatus {
    fn table() -> &'static TransitionTable<Self> {
        static TABLE: OnceLock<TransitionTable<LoanStatus>> = OnceLock::new();
        TABLE.get_or_init(|| {
            use LoanStatus::*;
            TransitionTable::new(EntityType::LoanApplication)
                .allow(Submitted, &[Underwriting, Cancelled])
                .allow(Underwriting, &[CreditReview, Approved, Rejected, Cancelled])
                .allow(CreditReview, &[Approved, Rejected, Underwriting, Cancelled])
                .allow(Approved, &[Disbursed, Cancelled])
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanApplication {
    #[serde(rename = "loanID")]
    pub loan_id: String,
    #[serde(rename = "customerID")]
    pub customer_id: String,
    pub loan_type: LoanType,
    pub requested_amount: Amount,
    pub term_months: u32,
    pub purpose: String,
    pub status: LoanStatus,
    #[serde(default)]
    pub approved_amount: Option<Amount>,
    /// Annual percentage rate
    #[serde(default)]
    pub interest_rate: Option<Decimal>,
    #[serde(default)]
    pub risk_score: Option<u32>,
    #[serde(default)]
    pub decision_notes: Option<String>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(flatten)]
    pub meta: EntityMeta,
}

impl LedgerEntity for LoanApplication {
    const ENTITY_TYPE: EntityType = EntityType::LoanApplication;

    fn id(&self) -> &str {
        &self.loan_id
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }
}

impl StatusEntity for LoanApplication {
    type Status = LoanStatus;

    fn status(&self) -> LoanStatus {
        self.status
    }

    fn set_status(&mut self, status: LoanStatus) {
        self.status = status;
    }
}
