//! Actor registry operations and the capability gate

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use lendledger_core::validate::require;
use lendledger_core::{LedgerError, LedgerResult};
use lendledger_lifecycle::{
    check_expected_version, commit_changes, create, history, load, Change, ChangeKind, EntityMeta, EntityType,
    HistoryRecord,
};
use lendledger_store::Invocation;

use crate::actor::{Actor, ActorType};
use crate::capability::{Capability, Role};

const INIT_MARKER_KEY: &str = "LEDGER_INITIALIZED";

/// Resolve `actor_id` and require `required`.
///
/// This is the first step of every gated operation; it only reads.
pub fn authorize(inv: &mut Invocation<'_>, actor_id: &str, required: Capability) -> LedgerResult<Actor> {
    if actor_id.trim().is_empty() {
        return Err(LedgerError::required("actorID"));
    }

    let actor: Option<Actor> = inv.get_json(&EntityType::Actor.state_key(actor_id))?;
    let denied = |reason: String| {
        tracing::warn!(actor_id, capability = %required, reason = %reason, "Access denied");
        LedgerError::AccessDenied(reason)
    };

    let actor = actor.ok_or_else(|| denied(format!("actor {} does not exist", actor_id)))?;
    if !actor.is_active {
        return Err(denied(format!("actor {} is inactive", actor_id)));
    }
    if !actor.can(required) {
        return Err(denied(format!("actor {} lacks capability {}", actor_id, required)));
    }
    Ok(actor)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitLedgerRequest {
    #[serde(rename = "adminID")]
    pub admin_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterActorRequest {
    #[serde(rename = "targetActorID")]
    pub target_actor_id: String,
    pub actor_type: ActorType,
    pub role: Role,
    /// Defaults to the role's capability table when omitted
    #[serde(default)]
    pub capabilities: Option<BTreeSet<Capability>>,
    #[serde(rename = "actorID")]
    pub actor_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCapabilitiesRequest {
    #[serde(rename = "targetActorID")]
    pub target_actor_id: String,
    pub capabilities: BTreeSet<Capability>,
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(rename = "actorID")]
    pub actor_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRoleRequest {
    #[serde(rename = "targetActorID")]
    pub target_actor_id: String,
    pub role: Role,
    /// Replace the capability set with the new role's defaults
    #[serde(default)]
    pub reset_capabilities: bool,
    #[serde(rename = "actorID")]
    pub actor_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetActorActiveRequest {
    #[serde(rename = "targetActorID")]
    pub target_actor_id: String,
    #[serde(rename = "actorID")]
    pub actor_id: String,
}

fn capability_list(caps: &BTreeSet<Capability>) -> String {
    caps.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(",")
}

/// Actor management operations (all require `MANAGE_ACTORS`)
#[derive(Debug, Default, Clone, Copy)]
pub struct ActorRegistry;

impl ActorRegistry {
    pub fn new() -> Self {
        Self
    }

    /// Bootstrap the first system administrator. Runs once per ledger.
    pub fn init_ledger(&self, inv: &mut Invocation<'_>, req: InitLedgerRequest) -> LedgerResult<Actor> {
        require("adminID", &req.admin_id)?;
        if inv.exists(INIT_MARKER_KEY)? {
            return Err(LedgerError::AlreadyExists("ledger is already initialized".into()));
        }

        let admin = Actor {
            actor_id: req.admin_id.clone(),
            actor_type: ActorType::InternalUser,
            role: Role::SystemAdmin,
            capabilities: Role::SystemAdmin.default_capabilities(),
            is_active: true,
            meta: EntityMeta::new(req.admin_id.clone(), inv.timestamp()),
        };
        create(inv, &admin)?;
        let marker = serde_json::json!({ "adminID": req.admin_id, "txID": inv.tx_id() });
        inv.put_json(INIT_MARKER_KEY, &marker)?;

        tracing::info!(admin_id = %req.admin_id, "Ledger initialized");
        Ok(admin)
    }

    pub fn register(&self, inv: &mut Invocation<'_>, req: RegisterActorRequest) -> LedgerResult<Actor> {
        authorize(inv, &req.actor_id, Capability::ManageActors)?;
        require("targetActorID", &req.target_actor_id)?;

        let actor = Actor {
            actor_id: req.target_actor_id,
            actor_type: req.actor_type,
            role: req.role,
            capabilities: req.capabilities.unwrap_or_else(|| req.role.default_capabilities()),
            is_active: true,
            meta: EntityMeta::new(req.actor_id, inv.timestamp()),
        };
        create(inv, &actor)?;
        Ok(actor)
    }

    pub fn get(&self, inv: &mut Invocation<'_>, caller_id: &str, target_id: &str) -> LedgerResult<Actor> {
        authorize(inv, caller_id, Capability::ManageActors)?;
        load(inv, target_id)
    }

    pub fn update_capabilities(
        &self,
        inv: &mut Invocation<'_>,
        req: UpdateCapabilitiesRequest,
    ) -> LedgerResult<Actor> {
        authorize(inv, &req.actor_id, Capability::ManageActors)?;
        let mut actor: Actor = load(inv, &req.target_actor_id)?;
        check_expected_version(&actor, req.expected_version)?;

        let mut changes = Vec::new();
        if actor.capabilities != req.capabilities {
            changes.push(Change::update(
                "capabilities",
                capability_list(&actor.capabilities),
                capability_list(&req.capabilities),
            ));
            actor.capabilities = req.capabilities;
        }
        commit_changes(inv, &mut actor, changes, &req.actor_id)?;
        Ok(actor)
    }

    /// Change an actor's role. Granted capabilities stay as they are unless
    /// `resetCapabilities` asks for the new role's defaults.
    pub fn change_role(&self, inv: &mut Invocation<'_>, req: ChangeRoleRequest) -> LedgerResult<Actor> {
        authorize(inv, &req.actor_id, Capability::ManageActors)?;
        let mut actor: Actor = load(inv, &req.target_actor_id)?;

        let mut changes = Vec::new();
        if actor.role != req.role {
            changes.push(Change::update("role", actor.role.to_string(), req.role.to_string()));
            actor.role = req.role;
        }
        if req.reset_capabilities {
            let defaults = req.role.default_capabilities();
            if defaults != actor.capabilities {
                changes.push(Change::update(
                    "capabilities",
                    capability_list(&actor.capabilities),
                    capability_list(&defaults),
                ));
                actor.capabilities = defaults;
            }
        }
        commit_changes(inv, &mut actor, changes, &req.actor_id)?;
        Ok(actor)
    }

    pub fn set_active(
        &self,
        inv: &mut Invocation<'_>,
        req: SetActorActiveRequest,
        active: bool,
    ) -> LedgerResult<Actor> {
        authorize(inv, &req.actor_id, Capability::ManageActors)?;
        if !active && req.actor_id == req.target_actor_id {
            return Err(LedgerError::Validation("an actor cannot deactivate itself".into()));
        }

        let mut actor: Actor = load(inv, &req.target_actor_id)?;
        if actor.is_active == active {
            return Err(LedgerError::Validation(format!(
                "actor {} is already {}",
                actor.actor_id,
                if active { "active" } else { "inactive" }
            )));
        }

        let change = Change::new(
            ChangeKind::StatusChange,
            "isActive",
            Some(actor.is_active.to_string()),
            Some(active.to_string()),
        );
        actor.is_active = active;
        commit_changes(inv, &mut actor, vec![change], &req.actor_id)?;
        Ok(actor)
    }

    pub fn history(
        &self,
        inv: &mut Invocation<'_>,
        caller_id: &str,
        target_id: &str,
    ) -> LedgerResult<Vec<HistoryRecord>> {
        authorize(inv, caller_id, Capability::ManageActors)?;
        load::<Actor>(inv, target_id)?;
        history::read(inv, EntityType::Actor, target_id)
    }
}
