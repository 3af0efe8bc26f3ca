//! Actor records

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum_macros::{Display, EnumString};

use lendledger_lifecycle::{EntityMeta, EntityType, LedgerEntity};

use crate::capability::{Capability, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
pub enum ActorType {
    InternalUser,
    ExternalPartner,
    System,
}

/// A caller identity and the capabilities explicitly granted to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    #[serde(rename = "actorID")]
    pub actor_id: String,
    pub actor_type: ActorType,
    pub role: Role,
    pub capabilities: BTreeSet<Capability>,
    pub is_active: bool,
    #[serde(flatten)]
    pub meta: EntityMeta,
}

impl Actor {
    /// Capabilities that actually apply: none at all while inactive
    pub fn effective_capabilities(&self) -> BTreeSet<Capability> {
        if self.is_active {
            self.capabilities.clone()
        } else {
            BTreeSet::new()
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.is_active && self.capabilities.contains(&capability)
    }
}

impl LedgerEntity for Actor {
    const ENTITY_TYPE: EntityType = EntityType::Actor;

    fn id(&self) -> &str {
        &self.actor_id
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }
}
