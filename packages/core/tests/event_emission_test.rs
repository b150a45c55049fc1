//! Domain event emission: events fire after successful writes only.

use anyhow::Result;
use orgspace_core::config::OrgConfig;
use orgspace_core::db::{DatabaseService, DomainEvent, TursoStore};
use orgspace_core::models::{
    MemberDraft, MemberSelector, OrganizationCreate, PermissionChange,
};
use orgspace_core::services::hooks::HookError;
use orgspace_core::{Caller, HookRegistry, OrganizationService};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::time::timeout;

async fn create_test_service(
    hooks: HookRegistry,
) -> Result<(OrganizationService, Arc<TursoStore>, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db = DatabaseService::new(temp_dir.path().join("orgspace.db")).await?;
    let store = Arc::new(TursoStore::new(Arc::new(db)));
    let service =
        OrganizationService::new(store.clone(), store.clone(), OrgConfig::default(), hooks);
    Ok((service, store, temp_dir))
}

async fn next_event(rx: &mut broadcast::Receiver<DomainEvent>) -> DomainEvent {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

#[tokio::test]
async fn test_events_fire_in_write_order() -> Result<()> {
    let (service, store, _dir) = create_test_service(HookRegistry::new()).await?;
    store.insert_user("u1", &json!({"username": "u1"})).await?;
    let caller = Caller::user("admin");

    let mut rx = service.subscribe_events();

    let id = service
        .create(OrganizationCreate::new("Acme"), &caller)
        .await?;
    match next_event(&mut rx).await {
        DomainEvent::OrganizationCreated(org) => assert_eq!(org.id, id),
        other => panic!("unexpected event: {:?}", other),
    }

    service
        .add_members(&id, vec![MemberDraft::new("u1")], &caller)
        .await?;
    match next_event(&mut rx).await {
        DomainEvent::MembershipUpserted(m) => {
            assert_eq!(m.user_id, "u1");
            assert_eq!(m.organization, id);
        }
        other => panic!("unexpected event: {:?}", other),
    }

    service
        .change_permissions(
            &id,
            MemberSelector::all(),
            PermissionChange::set(vec!["read".to_string()]),
            &caller,
        )
        .await?;
    assert_eq!(
        next_event(&mut rx).await.event_type(),
        "membership:permissionsChanged"
    );

    service
        .remove_members(&id, vec!["u1".to_string()], &caller)
        .await?;
    assert_eq!(next_event(&mut rx).await.event_type(), "membership:removed");

    service.delete(&id, &caller).await?;
    assert_eq!(
        next_event(&mut rx).await.event_type(),
        "organization:deleted"
    );

    Ok(())
}

#[tokio::test]
async fn test_vetoed_and_noop_writes_emit_nothing() -> Result<()> {
    let mut hooks = HookRegistry::new();
    hooks.before_delete(Box::new(|_, _| {
        Err(HookError::Rejected("organizations are forever".to_string()))
    }));
    let (service, _, _dir) = create_test_service(hooks).await?;
    let caller = Caller::user("admin");

    let id = service
        .create(OrganizationCreate::new("Acme"), &caller)
        .await?;

    let mut rx = service.subscribe_events();

    // Vetoed delete
    assert!(service.delete(&id, &caller).await.is_err());

    // No-op permission change
    assert!(!service
        .change_permissions(
            &id,
            MemberSelector::all(),
            PermissionChange::default(),
            &caller,
        )
        .await?);

    // Validation failure
    assert!(service
        .create(OrganizationCreate::default(), &caller)
        .await
        .is_err());

    assert!(
        timeout(Duration::from_millis(200), rx.recv()).await.is_err(),
        "no event should have fired"
    );
    Ok(())
}
