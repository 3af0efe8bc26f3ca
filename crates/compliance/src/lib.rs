//! LendLedger Compliance - sanction lists, screening and AML checks
//!
//! Sanction lists are versioned reference data fed from outside. Bulk feeds
//! are merged with one of three strategies:
//!
//! - `FULL`: the feed replaces the list
//! - `INCREMENTAL`: entries are upserted by `entryID`
//! - `ADDITIONS`: only unseen `entryID`s are inserted
//!
//! Every entry lives under its own key, so the store's per-key history gives
//! point-in-time searches for free. AML checks screen a customer's name
//! against every active list and record the hits.

pub mod aml;
pub mod reconcile;
pub mod sanction;
pub mod screening;
pub mod service;

pub use aml::{AmlRecord, AmlService, AmlStatus, PerformAmlCheckRequest, UpdateAmlStatusRequest};
pub use reconcile::{reconcile, Reconciliation};
pub use sanction::{
    ListType, SanctionEntityType, SanctionEntry, SanctionListDefinition, SanctionListUpdate, UpdateFrequency,
    UpdateType,
};
pub use screening::{normalize, ScreeningHit, ScreeningResult};
pub use service::{
    CreateSanctionListRequest, SanctionService, ScreenNameRequest, SearchAsOfRequest, SearchEntriesRequest,
    UpdateSanctionListRequest, DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT,
};
