//! LendLedger Lifecycle - the generic record-lifecycle engine
//!
//! Every status-bearing entity (customer, loan application, KYC, AML, CDP,
//! actor) shares the same three rules:
//!
//! 1. its `version` grows by exactly one per successful mutation
//! 2. its status only moves along its [`TransitionTable`]
//! 3. every mutation appends immutable [`HistoryRecord`]s in the same invocation
//!
//! ```text
//!   load ──► check expected version ──► table check ──► mutate
//!                                                         │
//!             save state key ◄── append history ◄── bump version
//! ```

pub mod engine;
pub mod entity;
pub mod history;
pub mod transition;

pub use engine::{
    apply_field_changes, apply_transition, apply_transition_with, check_expected_version, commit_changes, create,
    exists, load, FieldUpdate,
};
pub use entity::{EntityMeta, EntityType, LedgerEntity, StatusEntity};
pub use history::{ChangeKind, Change, HistoryCursor, HistoryRecord};
pub use transition::{Status, TransitionTable};
