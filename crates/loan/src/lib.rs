//! LendLedger Loan - loan applications from submission to disbursement
//!
//! ```text
//!   Submitted ──► Underwriting ──► CreditReview ──► Approved ──► Disbursed
//!       │              │   ▲            │   │           │
//!       │              │   └────────────┘   │           │
//!       │              └──► Approved        │           │
//!       └──────────────┴──► Rejected ◄──────┘           │
//!                      └──► Cancelled ◄─────────────────┘
//! ```

pub mod application;
pub mod service;

pub use application::{customer_loan_key, customer_loan_prefix, LoanApplication, LoanStatus, LoanType};
pub use service::{
    ApproveLoanRequest, LoanService, RejectLoanRequest, SubmitLoanRequest, UpdateLoanStatusRequest,
    MAX_INTEREST_RATE, MAX_RISK_SCORE, MAX_TERM_MONTHS,
};
