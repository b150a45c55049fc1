//! Read channels: permission gating at setup and result-set fetching.

use anyhow::Result;
use orgspace_core::config::OrgConfig;
use orgspace_core::db::{DatabaseService, TursoStore};
use orgspace_core::models::{MemberDraft, OrganizationCreate};
use orgspace_core::rpc::handlers::subscriptions::Channel;
use orgspace_core::services::hooks::HookError;
use orgspace_core::{Caller, HookRegistry, OrganizationService, PermissionRegistry};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

async fn create_seeded_service() -> Result<(Arc<OrganizationService>, String, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db = DatabaseService::new(temp_dir.path().join("orgspace.db")).await?;
    let store = Arc::new(TursoStore::new(Arc::new(db)));
    let service = Arc::new(OrganizationService::new(
        store.clone(),
        store.clone(),
        OrgConfig::default(),
        HookRegistry::new(),
    ));

    let admin = Caller::user("admin");
    for user in ["alice", "bob"] {
        store
            .insert_user(
                user,
                &json!({"username": user, "profile": {"name": user}, "email": "hidden"}),
            )
            .await?;
    }
    let id = service
        .create(OrganizationCreate::new("Acme"), &admin)
        .await?;
    service
        .add_members(
            &id,
            vec![
                MemberDraft::with_permissions("alice", vec!["admin".to_string()]),
                MemberDraft::new("bob"),
            ],
            &admin,
        )
        .await?;
    Ok((service, id, temp_dir))
}

#[tokio::test]
async fn test_members_channel_projects_public_fields_only() -> Result<()> {
    let (service, id, _dir) = create_seeded_service().await?;

    let channel = Channel::parse(json!({
        "channel": "membersOfOrganization",
        "organizationId": id,
    }))
    .unwrap();

    let result = channel.fetch(&service).await.unwrap();
    let members = result.as_array().unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0]["fields"]["username"], "alice");
    assert!(members[0]["fields"].get("email").is_none());
    Ok(())
}

#[tokio::test]
async fn test_each_channel_fetches_its_result_set() -> Result<()> {
    let (service, id, _dir) = create_seeded_service().await?;

    let orgs = Channel::parse(json!({"channel": "organization", "ids": [id]}))
        .unwrap()
        .fetch(&service)
        .await
        .unwrap();
    assert_eq!(orgs.as_array().unwrap().len(), 1);
    assert_eq!(orgs[0]["name"], "Acme");

    let memberships = Channel::parse(json!({
        "channel": "membershipForOrganization",
        "organizationId": id,
    }))
    .unwrap()
    .fetch(&service)
    .await
    .unwrap();
    assert_eq!(memberships.as_array().unwrap().len(), 2);

    let alice_memberships = Channel::parse(json!({
        "channel": "membershipForUser",
        "userId": "alice",
    }))
    .unwrap()
    .fetch(&service)
    .await
    .unwrap();
    assert_eq!(alice_memberships.as_array().unwrap().len(), 1);
    assert_eq!(alice_memberships[0]["permissions"], json!(["admin"]));

    let alice_orgs = Channel::parse(json!({
        "channel": "organizationsOfUser",
        "userId": "alice",
    }))
    .unwrap()
    .fetch(&service)
    .await
    .unwrap();
    assert_eq!(alice_orgs[0]["id"], json!(id));
    Ok(())
}

#[tokio::test]
async fn test_permission_checks_gate_channel_setup() -> Result<()> {
    let (_, id, _dir) = create_seeded_service().await?;

    let mut permissions = PermissionRegistry::new();
    permissions.before_access_members_of_organization(Box::new(|_, caller| {
        if caller.user_id.is_some() {
            Ok(())
        } else {
            Err(HookError::Unauthorized("login required".to_string()))
        }
    }));

    let channel = Channel::parse(json!({
        "channel": "membersOfOrganization",
        "organizationId": id,
    }))
    .unwrap();

    assert!(channel
        .check_access(&permissions, &Caller::user("alice"))
        .is_ok());
    assert!(matches!(
        channel.check_access(&permissions, &Caller::anonymous()),
        Err(HookError::Unauthorized(_))
    ));

    // Channels without a registered check are open
    let open = Channel::parse(json!({"channel": "organization", "ids": [id]})).unwrap();
    assert!(open.check_access(&permissions, &Caller::anonymous()).is_ok());
    Ok(())
}
