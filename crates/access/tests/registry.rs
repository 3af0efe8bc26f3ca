//! Actor registry against the in-memory store

use chrono::Utc;
use std::collections::BTreeSet;

use lendledger_access::{
    authorize, ActorRegistry, ActorType, Capability, ChangeRoleRequest, InitLedgerRequest, RegisterActorRequest,
    Role, SetActorActiveRequest, UpdateCapabilitiesRequest,
};
use lendledger_core::LedgerError;
use lendledger_lifecycle::{history, EntityType};
use lendledger_store::{Invocation, MemoryStore};

fn bootstrap(store: &MemoryStore) {
    let mut inv = Invocation::new(store, "tx-init", Utc::now());
    ActorRegistry::new()
        .init_ledger(&mut inv, InitLedgerRequest { admin_id: "ADMIN".into() })
        .unwrap();
    inv.commit().unwrap();
}

fn register(store: &MemoryStore, id: &str, role: Role) {
    let mut inv = Invocation::new(store, format!("tx-{}", id), Utc::now());
    ActorRegistry::new()
        .register(
            &mut inv,
            RegisterActorRequest {
                target_actor_id: id.into(),
                actor_type: ActorType::InternalUser,
                role,
                capabilities: None,
                actor_id: "ADMIN".into(),
            },
        )
        .unwrap();
    inv.commit().unwrap();
}

#[test]
fn test_init_runs_once() {
    let store = MemoryStore::new();
    bootstrap(&store);

    let mut inv = Invocation::new(&store, "tx-again", Utc::now());
    let err = ActorRegistry::new()
        .init_ledger(&mut inv, InitLedgerRequest { admin_id: "OTHER".into() })
        .unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyExists(_)));
}

#[test]
fn test_authorize_outcomes() {
    let store = MemoryStore::new();
    bootstrap(&store);
    register(&store, "INTRO-1", Role::Introducer);

    let mut inv = Invocation::new(&store, "tx", Utc::now());
    assert!(authorize(&mut inv, "INTRO-1", Capability::CreateCustomer).is_ok());

    let err = authorize(&mut inv, "INTRO-1", Capability::ApproveLoan).unwrap_err();
    assert!(err.to_string().starts_with("ACCESS_DENIED"));

    let err = authorize(&mut inv, "GHOST", Capability::ViewLoan).unwrap_err();
    assert!(matches!(err, LedgerError::AccessDenied(_)));
}

#[test]
fn test_deactivated_actor_is_denied_everything() {
    let store = MemoryStore::new();
    bootstrap(&store);
    register(&store, "INTRO-1", Role::Introducer);

    let mut inv = Invocation::new(&store, "tx-off", Utc::now());
    let actor = ActorRegistry::new()
        .set_active(
            &mut inv,
            SetActorActiveRequest {
                target_actor_id: "INTRO-1".into(),
                actor_id: "ADMIN".into(),
            },
            false,
        )
        .unwrap();
    inv.commit().unwrap();
    assert_eq!(actor.meta.version, 2);

    let mut inv = Invocation::new(&store, "tx", Utc::now());
    let err = authorize(&mut inv, "INTRO-1", Capability::CreateCustomer).unwrap_err();
    assert!(err.to_string().contains("inactive"));
}

#[test]
fn test_role_change_keeps_granted_capabilities() {
    let store = MemoryStore::new();
    bootstrap(&store);
    register(&store, "INTRO-1", Role::Introducer);

    let mut inv = Invocation::new(&store, "tx-role", Utc::now());
    let actor = ActorRegistry::new()
        .change_role(
            &mut inv,
            ChangeRoleRequest {
                target_actor_id: "INTRO-1".into(),
                role: Role::Auditor,
                reset_capabilities: false,
                actor_id: "ADMIN".into(),
            },
        )
        .unwrap();
    inv.commit().unwrap();

    assert_eq!(actor.role, Role::Auditor);
    assert_eq!(actor.capabilities, Role::Introducer.default_capabilities());

    let mut inv = Invocation::new(&store, "tx", Utc::now());
    assert!(authorize(&mut inv, "INTRO-1", Capability::CreateCustomer).is_ok());
}

#[test]
fn test_capability_update_writes_history() {
    let store = MemoryStore::new();
    bootstrap(&store);
    register(&store, "UW-1", Role::Underwriter);

    let caps: BTreeSet<Capability> = [Capability::ViewLoan].into_iter().collect();
    let mut inv = Invocation::new(&store, "tx-caps", Utc::now());
    ActorRegistry::new()
        .update_capabilities(
            &mut inv,
            UpdateCapabilitiesRequest {
                target_actor_id: "UW-1".into(),
                capabilities: caps.clone(),
                expected_version: Some(1),
                actor_id: "ADMIN".into(),
            },
        )
        .unwrap();
    inv.commit().unwrap();

    let mut inv = Invocation::new(&store, "read", Utc::now());
    let records = history::read(&mut inv, EntityType::Actor, "UW-1").unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].field_name, "capabilities");
    assert_eq!(records[1].new_value.as_deref(), Some("VIEW_LOAN"));
}

#[test]
fn test_non_admin_cannot_register() {
    let store = MemoryStore::new();
    bootstrap(&store);
    register(&store, "INTRO-1", Role::Introducer);

    let mut inv = Invocation::new(&store, "tx", Utc::now());
    let err = ActorRegistry::new()
        .register(
            &mut inv,
            RegisterActorRequest {
                target_actor_id: "X".into(),
                actor_type: ActorType::ExternalPartner,
                role: Role::Introducer,
                capabilities: None,
                actor_id: "INTRO-1".into(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, LedgerError::AccessDenied(_)));
}
