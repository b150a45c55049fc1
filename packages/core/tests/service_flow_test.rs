//! End-to-end flows through `OrganizationService` over a real libsql file.

use anyhow::Result;
use orgspace_core::config::OrgConfig;
use orgspace_core::db::{DatabaseService, TursoStore};
use orgspace_core::models::{
    MemberDraft, MemberSelector, OrganizationCreate, OrganizationUpdate, PermissionChange,
};
use orgspace_core::services::hooks::HookError;
use orgspace_core::{Caller, HookRegistry, OrganizationService};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

async fn create_test_service(
    config: OrgConfig,
    hooks: HookRegistry,
) -> Result<(OrganizationService, Arc<TursoStore>, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db = DatabaseService::new(temp_dir.path().join("orgspace.db")).await?;
    let store = Arc::new(TursoStore::new(Arc::new(db)));
    let service = OrganizationService::new(store.clone(), store.clone(), config, hooks);
    Ok((service, store, temp_dir))
}

#[tokio::test]
async fn test_full_organization_lifecycle() -> Result<()> {
    let (service, store, _dir) =
        create_test_service(OrgConfig::default(), HookRegistry::new()).await?;
    let admin = Caller::user("admin");

    for user in ["alice", "bob", "carol"] {
        store
            .insert_user(user, &json!({"username": user, "profile": {"name": user}}))
            .await?;
    }

    // Create
    let mut options = OrganizationCreate::new("Brew HK");
    options.description = Some("Coffee people".to_string());
    let id = service.create(options, &admin).await?;

    // Update
    assert!(
        service
            .update(
                &id,
                OrganizationUpdate {
                    name: None,
                    description: Some("Tea people".to_string()),
                },
                &admin,
            )
            .await?
    );
    let org = service.find_by_id(&id).await?.unwrap();
    assert_eq!(org.name, "Brew HK");
    assert_eq!(org.description, "Tea people");

    // Add members
    assert!(
        service
            .add_members(
                &id,
                vec![
                    MemberDraft::with_permissions("alice", vec!["admin".to_string()]),
                    MemberDraft::new("bob"),
                    MemberDraft::new("carol"),
                ],
                &admin,
            )
            .await?
    );
    assert_eq!(service.member_ids_in_organization(&id).await?.len(), 3);

    // Grant everyone but alice the read permission
    assert!(
        service
            .change_permissions(
                &id,
                MemberSelector::except(vec!["alice".to_string()]),
                PermissionChange::add(vec!["read".to_string()]),
                &admin,
            )
            .await?
    );
    assert!(service
        .user_has_permissions(&id, "bob", &["read".to_string()])
        .await?);
    assert!(!service
        .user_has_permissions(&id, "alice", &["read".to_string()])
        .await?);

    // Remove a member
    assert!(
        service
            .remove_members(&id, vec!["carol".to_string()], &admin)
            .await?
    );
    assert_eq!(
        service.member_ids_in_organization(&id).await?,
        vec!["alice".to_string(), "bob".to_string()]
    );

    // Soft delete keeps the document and memberships readable
    assert!(service.delete(&id, &admin).await?);
    let org = service.find_by_id(&id).await?.unwrap();
    assert!(!org.is_active());
    assert_eq!(service.memberships_for_organization(&id).await?.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_configured_minimum_name_length() -> Result<()> {
    let config = OrgConfig {
        min_name_length: 5,
        ..OrgConfig::default()
    };
    let (service, _, _dir) = create_test_service(config, HookRegistry::new()).await?;

    let err = service
        .create(OrganizationCreate::new("tiny"), &Caller::user("admin"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("minimum length 5"));

    assert!(service
        .create(OrganizationCreate::new("big enough"), &Caller::user("admin"))
        .await
        .is_ok());
    Ok(())
}

#[tokio::test]
async fn test_hooks_gate_every_write_entry_point() -> Result<()> {
    // An authorization hook on each entry point rejecting anonymous callers
    let mut hooks = HookRegistry::new();
    let require_login = |caller: &Caller| {
        if caller.user_id.is_some() {
            Ok(())
        } else {
            Err(HookError::Unauthorized("login required".to_string()))
        }
    };
    hooks.before_create(Box::new(move |_, c| require_login(c)));
    hooks.before_update(Box::new(move |_, _, c| require_login(c)));
    hooks.before_delete(Box::new(move |_, c| require_login(c)));
    hooks.before_add_members(Box::new(move |_, _, c| require_login(c)));
    hooks.before_remove_members(Box::new(move |_, _, c| require_login(c)));
    hooks.before_change_permissions(Box::new(move |_, _, _, c| require_login(c)));

    let (service, _, _dir) = create_test_service(OrgConfig::default(), hooks).await?;
    let anon = Caller::anonymous();

    assert!(service
        .create(OrganizationCreate::new("Acme"), &anon)
        .await
        .is_err());
    assert!(service
        .update("o1", OrganizationUpdate::default(), &anon)
        .await
        .is_err());
    assert!(service.delete("o1", &anon).await.is_err());
    assert!(service.add_members("o1", vec![], &anon).await.is_err());
    assert!(service.remove_members("o1", vec![], &anon).await.is_err());
    assert!(service
        .change_permissions(
            "o1",
            MemberSelector::all(),
            PermissionChange::add(vec!["read".to_string()]),
            &anon,
        )
        .await
        .is_err());

    // A logged-in caller passes the same gates
    assert!(service
        .create(OrganizationCreate::new("Acme"), &Caller::user("admin"))
        .await
        .is_ok());
    Ok(())
}
