//! LendLedger Access - Actor & Capability Registry
//!
//! Resolves a caller id to an [`Actor`] and gates every operation on an
//! explicit [`Capability`]. Role tables only seed an actor's capability set at
//! registration; the stored set is what gets checked, so changing a role
//! later does not silently widen or narrow what was already granted.

pub mod actor;
pub mod capability;
pub mod registry;

pub use actor::{Actor, ActorType};
pub use capability::{Capability, Role};
pub use registry::{
    authorize, ActorRegistry, ChangeRoleRequest, InitLedgerRequest, RegisterActorRequest,
    SetActorActiveRequest, UpdateCapabilitiesRequest,
};
