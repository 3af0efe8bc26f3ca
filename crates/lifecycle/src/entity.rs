//! Versioned entity header shared by every stored entity

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::transition::Status;

/// Entity types known to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Actor,
    Customer,
    LoanApplication,
    KycRecord,
    AmlRecord,
    Cdp,
    SanctionList,
}

impl EntityType {
    /// Prefix of the current-state key: `<PREFIX>_<id>`
    pub fn key_prefix(&self) -> &'static str {
        match self {
            EntityType::Actor => "ACTOR",
            EntityType::Customer => "CUSTOMER",
            EntityType::LoanApplication => "LOAN",
            EntityType::KycRecord => "KYC",
            EntityType::AmlRecord => "AML",
            EntityType::Cdp => "CDP",
            EntityType::SanctionList => "SANCTION_LIST",
        }
    }

    pub fn state_key(&self, id: &str) -> String {
        format!("{}_{}", self.key_prefix(), id)
    }

    /// Prefix covering the state keys of every entity of this type
    pub fn state_prefix(&self) -> String {
        format!("{}_", self.key_prefix())
    }
}

/// Version and authorship header, flattened into every entity's JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMeta {
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl EntityMeta {
    /// Header for a freshly created entity (version 1)
    pub fn new(actor_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        let actor_id = actor_id.into();
        Self {
            version: 1,
            created_at: now,
            created_by: actor_id.clone(),
            updated_at: now,
            updated_by: actor_id,
        }
    }

    /// Record one more successful mutation
    pub fn touch(&mut self, actor_id: &str, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
        self.updated_by = actor_id.to_string();
    }
}

/// An entity stored under `<PREFIX>_<id>` with a versioned header
pub trait LedgerEntity: Serialize + DeserializeOwned {
    const ENTITY_TYPE: EntityType;

    fn id(&self) -> &str;
    fn meta(&self) -> &EntityMeta;
    fn meta_mut(&mut self) -> &mut EntityMeta;

    fn state_key(&self) -> String {
        Self::ENTITY_TYPE.state_key(self.id())
    }

    fn version(&self) -> u64 {
        self.meta().version
    }
}

/// An entity whose status is governed by a transition table
pub trait StatusEntity: LedgerEntity {
    type Status: Status;

    fn status(&self) -> Self::Status;
    fn set_status(&mut self, status: Self::Status);
}
