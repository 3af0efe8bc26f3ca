//! Capabilities and the static role -> default capability table

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

/// A named permission an actor must hold to run an operation
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, EnumString, Display, EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    CreateCustomer,
    ViewCustomer,
    UpdateCustomer,
    CreateLoan,
    ViewLoan,
    UpdateLoan,
    ApproveLoan,
    RejectLoan,
    ManageKyc,
    ViewKyc,
    ManageAml,
    ViewAml,
    ManageSanctions,
    ViewSanctions,
    GenerateCdp,
    ViewCdp,
    RevokeCdp,
    ViewHistory,
    ManageActors,
}

impl Capability {
    pub fn all() -> BTreeSet<Capability> {
        Capability::iter().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, EnumIter)]
pub enum Role {
    Introducer,
    Underwriter,
    CreditOfficer,
    ComplianceOfficer,
    RiskManager,
    Auditor,
    SystemAdmin,
    System,
}

impl Role {
    /// Capabilities granted to a newly registered actor with this role
    pub fn default_capabilities(&self) -> BTreeSet<Capability> {
        use Capability::*;
        let caps: &[Capability] = match self {
            Role::Introducer => &[CreateCustomer, ViewCustomer, CreateLoan, ViewLoan],
            Role::Underwriter => &[ViewCustomer, ViewLoan, UpdateLoan, ViewKyc, ViewAml, ViewCdp, ViewHistory],
            Role::CreditOfficer => &[
                ViewCustomer,
                ViewLoan,
                UpdateLoan,
                ApproveLoan,
                RejectLoan,
                ViewKyc,
                ViewAml,
                ViewCdp,
                ViewHistory,
            ],
            Role::ComplianceOfficer => &[
                ViewCustomer,
                UpdateCustomer,
                ManageKyc,
                ViewKyc,
                ManageAml,
                ViewAml,
                ManageSanctions,
                ViewSanctions,
                GenerateCdp,
                ViewCdp,
                RevokeCdp,
                ViewHistory,
            ],
            Role::RiskManager => &[ViewCustomer, ViewLoan, RejectLoan, ViewKyc, ViewAml, ViewSanctions, ViewHistory],
            Role::Auditor => &[ViewCustomer, ViewLoan, ViewKyc, ViewAml, ViewSanctions, ViewCdp, ViewHistory],
            Role::SystemAdmin => return Capability::all(),
            Role::System => &[ManageSanctions, ViewSanctions, ViewCdp, ViewCustomer],
        };
        caps.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_introducer_defaults() {
        let caps = Role::Introducer.default_capabilities();
        assert_eq!(caps.len(), 4);
        assert!(caps.contains(&Capability::CreateCustomer));
        assert!(caps.contains(&Capability::ViewLoan));
        assert!(!caps.contains(&Capability::ApproveLoan));
    }

    #[test]
    fn test_admin_holds_everything() {
        assert_eq!(Role::SystemAdmin.default_capabilities(), Capability::all());
    }

    #[test]
    fn test_capability_string_forms() {
        assert_eq!(Capability::ManageKyc.to_string(), "MANAGE_KYC");
        assert_eq!("APPROVE_LOAN".parse::<Capability>().unwrap(), Capability::ApproveLoan);
        assert_eq!(serde_json::to_string(&Capability::RevokeCdp).unwrap(), "\"REVOKE_CDP\"");
    }
}
