//! LendLedger Core - Shared types
//!
//! This crate contains the pieces every other LendLedger crate leans on:
//! - `LedgerError`: the caller-facing error taxonomy with stable message prefixes
//! - `Amount`: Non-negative decimal wrapper for loan amounts
//! - `ids`: entity id generation
//! - `validate`: required-field and format checks shared by the domain services

pub mod amount;
pub mod error;
pub mod ids;
pub mod validate;

pub use amount::{Amount, AmountError};
pub use error::{ErrorCategory, LedgerError, LedgerResult};
pub use ids::{new_entity_id, short_uuid};
