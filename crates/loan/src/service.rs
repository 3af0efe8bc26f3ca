//! Loan operations

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use lendledger_access::{authorize, Capability};
use lendledger_core::validate::{require, require_all};
use lendledger_core::{new_entity_id, Amount, LedgerError, LedgerResult};
use lendledger_customer::{Customer, CustomerStatus};
use lendledger_lifecycle::{
    apply_transition_with, check_expected_version, create, history, load, Change, ChangeKind, EntityMeta,
    EntityType, FieldUpdate, HistoryRecord, Status,
};
use lendledger_store::Invocation;

use crate::application::{customer_loan_key, customer_loan_prefix, LoanApplication, LoanStatus, LoanType};

pub const MAX_TERM_MONTHS: i64 = 360;
pub const MAX_INTEREST_RATE: Decimal = Decimal::ONE_HUNDRED;
pub const MAX_RISK_SCORE: u32 = 1000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmitLoanRequest {
    #[serde(rename = "customerID")]
    pub customer_id: String,
    pub loan_type: String,
    pub requested_amount: Decimal,
    pub term_months: i64,
    pub purpose: String,
    #[serde(rename = "actorID")]
    pub actor_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLoanStatusRequest {
    #[serde(rename = "loanID")]
    pub loan_id: String,
    pub new_status: LoanStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(rename = "actorID")]
    pub actor_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveLoanRequest {
    #[serde(rename = "loanID")]
    pub loan_id: String,
    pub approved_amount: Decimal,
    pub interest_rate: Decimal,
    pub risk_score: u32,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(rename = "actorID")]
    pub actor_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectLoanRequest {
    #[serde(rename = "loanID")]
    pub loan_id: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(rename = "actorID")]
    pub actor_id: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoanService;

impl LoanService {
    pub fn new() -> Self {
        Self
    }

    /// File a new application for an active customer
    pub fn submit(&self, inv: &mut Invocation<'_>, req: SubmitLoanRequest) -> LedgerResult<LoanApplication> {
        authorize(inv, &req.actor_id, Capability::CreateLoan)?;
        require_all(&[
            ("customerID", req.customer_id.as_str()),
            ("loanType", req.loan_type.as_str()),
            ("purpose", req.purpose.as_str()),
        ])?;

        let loan_type: LoanType = req.loan_type.trim().to_ascii_uppercase().parse().map_err(|_| {
            LedgerError::Validation(format!(
                "loanType must be one of PERSONAL, HOME, AUTO, BUSINESS, EDUCATION (got {})",
                req.loan_type
            ))
        })?;
        let requested_amount = Amount::positive(req.requested_amount)
            .map_err(|e| LedgerError::Validation(format!("requestedAmount: {}", e)))?;
        if !(1..=MAX_TERM_MONTHS).contains(&req.term_months) {
            return Err(LedgerError::Validation(format!(
                "termMonths must be between 1 and {}",
                MAX_TERM_MONTHS
            )));
        }

        let customer: Customer = load(inv, &req.customer_id)?;
        if customer.status != CustomerStatus::Active {
            return Err(LedgerError::Validation(format!(
                "customer {} is {}, not Active",
                customer.customer_id, customer.status
            )));
        }

        let loan = LoanApplication {
            loan_id: new_entity_id("LOAN"),
            customer_id: customer.customer_id,
            loan_type,
            requested_amount,
            term_months: req.term_months as u32,
            purpose: req.purpose,
            status: LoanStatus::Submitted,
            approved_amount: None,
            interest_rate: None,
            risk_score: None,
            decision_notes: None,
            rejection_reason: None,
            meta: EntityMeta::new(req.actor_id, inv.timestamp()),
        };
        create(inv, &loan)?;
        inv.put_json(customer_loan_key(&loan.customer_id, &loan.loan_id)?, &loan.loan_id)?;
        Ok(loan)
    }

    /// Plain status moves; approval and rejection have their own operations
    pub fn update_status(
        &self,
        inv: &mut Invocation<'_>,
        req: UpdateLoanStatusRequest,
    ) -> LedgerResult<LoanApplication> {
        authorize(inv, &req.actor_id, Capability::UpdateLoan)?;
        match req.new_status {
            LoanStatus::Approved => {
                return Err(LedgerError::Validation("use ApproveLoan to approve a loan".into()));
            }
            LoanStatus::Rejected => {
                return Err(LedgerError::Validation("use RejectLoan to reject a loan".into()));
            }
            _ => {}
        }

        let mut loan: LoanApplication = load(inv, &req.loan_id)?;
        check_expected_version(&loan, req.expected_version)?;

        let mut extra = FieldUpdate::new();
        if let Some(notes) = req.notes {
            extra.set_optional("decisionNotes", &mut loan.decision_notes, Some(notes));
        }
        apply_transition_with(
            inv,
            &mut loan,
            req.new_status,
            ChangeKind::StatusChange,
            extra.into_changes(),
            &req.actor_id,
        )?;
        Ok(loan)
    }

    /// Approve with terms: one APPROVE record plus one UPDATE per term
    pub fn approve(&self, inv: &mut Invocation<'_>, req: ApproveLoanRequest) -> LedgerResult<LoanApplication> {
        authorize(inv, &req.actor_id, Capability::ApproveLoan)?;
        let mut loan: LoanApplication = load(inv, &req.loan_id)?;
        check_expected_version(&loan, req.expected_version)?;
        LoanStatus::table().check(loan.status, LoanStatus::Approved)?;

        let approved = Amount::positive(req.approved_amount)
            .map_err(|e| LedgerError::Validation(format!("approvedAmount: {}", e)))?;
        if approved > loan.requested_amount {
            return Err(LedgerError::Validation(format!(
                "approvedAmount {} exceeds requestedAmount {}",
                approved, loan.requested_amount
            )));
        }
        if req.interest_rate < Decimal::ZERO || req.interest_rate > MAX_INTEREST_RATE {
            return Err(LedgerError::Validation(format!(
                "interestRate must be between 0 and {}",
                MAX_INTEREST_RATE
            )));
        }
        if req.risk_score > MAX_RISK_SCORE {
            return Err(LedgerError::Validation(format!(
                "riskScore must be between 0 and {}",
                MAX_RISK_SCORE
            )));
        }

        let mut changes = vec![
            term_change("approvedAmount", loan.approved_amount.map(|a| a.to_string()), approved.to_string()),
            term_change("interestRate", loan.interest_rate.map(|r| r.to_string()), req.interest_rate.to_string()),
            term_change("riskScore", loan.risk_score.map(|s| s.to_string()), req.risk_score.to_string()),
        ];
        loan.approved_amount = Some(approved);
        loan.interest_rate = Some(req.interest_rate);
        loan.risk_score = Some(req.risk_score);

        if let Some(notes) = req.notes {
            let mut update = FieldUpdate::new();
            update.set_optional("decisionNotes", &mut loan.decision_notes, Some(notes));
            changes.extend(update.into_changes());
        }

        apply_transition_with(inv, &mut loan, LoanStatus::Approved, ChangeKind::Approve, changes, &req.actor_id)?;
        Ok(loan)
    }

    pub fn reject(&self, inv: &mut Invocation<'_>, req: RejectLoanRequest) -> LedgerResult<LoanApplication> {
        authorize(inv, &req.actor_id, Capability::RejectLoan)?;
        require("reason", &req.reason)?;
        let mut loan: LoanApplication = load(inv, &req.loan_id)?;
        check_expected_version(&loan, req.expected_version)?;

        let mut extra = FieldUpdate::new();
        extra.set_optional("rejectionReason", &mut loan.rejection_reason, Some(req.reason));
        apply_transition_with(
            inv,
            &mut loan,
            LoanStatus::Rejected,
            ChangeKind::Reject,
            extra.into_changes(),
            &req.actor_id,
        )?;
        Ok(loan)
    }

    pub fn get(&self, inv: &mut Invocation<'_>, actor_id: &str, loan_id: &str) -> LedgerResult<LoanApplication> {
        authorize(inv, actor_id, Capability::ViewLoan)?;
        load(inv, loan_id)
    }

    /// Every application of a customer, in loan-id order
    pub fn by_customer(
        &self,
        inv: &mut Invocation<'_>,
        actor_id: &str,
        customer_id: &str,
    ) -> LedgerResult<Vec<LoanApplication>> {
        authorize(inv, actor_id, Capability::ViewLoan)?;
        load::<Customer>(inv, customer_id)?;

        let index = inv.scan_json::<String>(&customer_loan_prefix(customer_id)?)?;
        tracing::debug!(customer_id, loans = index.len(), "Scanned customer loan index");
        index.into_iter().map(|(_, loan_id)| load(inv, &loan_id)).collect()
    }

    pub fn history(
        &self,
        inv: &mut Invocation<'_>,
        actor_id: &str,
        loan_id: &str,
    ) -> LedgerResult<Vec<HistoryRecord>> {
        authorize(inv, actor_id, Capability::ViewHistory)?;
        load::<LoanApplication>(inv, loan_id)?;
        history::read(inv, EntityType::LoanApplication, loan_id)
    }
}

fn term_change(field: &str, previous: Option<String>, new: String) -> Change {
    Change::new(ChangeKind::Update, field, previous, Some(new))
}
