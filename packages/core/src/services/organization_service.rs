//! Organization Service - Business Logic
//!
//! The six write entry points (create, update, delete, addMembers,
//! removeMembers, changePermissions) and the read accessors backing the
//! subscription channels.
//!
//! Every write follows the same pipeline: before-hooks, normalization,
//! schema validation, store write, after-hooks with the write outcome, then
//! a domain event on success. Before-hook and validation failures abort
//! before anything is written; after-hook failures never change the outcome.
//!
//! Return-value contract: the write entry points return `Ok(true)` whenever
//! the pipeline completed, even when the write matched zero documents.
//! Callers needing the matched count observe it through after-hooks. The one
//! `Ok(false)` is `change_permissions` on a no-op change.

use crate::config::OrgConfig;
use crate::db::events::DomainEvent;
use crate::db::{OrgStore, PublicUser, UserStore};
use crate::models::{
    MemberDraft, MemberSelector, Membership, Organization, OrganizationCreate, OrganizationUpdate,
    PermissionChange,
};
use crate::services::error::OrgServiceError;
use crate::services::hooks::{Caller, HookRegistry};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Capacity of the domain event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Business logic for organizations and memberships.
pub struct OrganizationService {
    store: Arc<dyn OrgStore>,
    users: Arc<dyn UserStore>,
    config: OrgConfig,
    hooks: HookRegistry,
    events: broadcast::Sender<DomainEvent>,
}

impl OrganizationService {
    pub fn new(
        store: Arc<dyn OrgStore>,
        users: Arc<dyn UserStore>,
        config: OrgConfig,
        hooks: HookRegistry,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            users,
            config,
            hooks,
            events,
        }
    }

    /// Subscribe to domain events emitted after successful writes.
    pub fn subscribe_events(&self) -> broadcast::Receiver<DomainEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &OrgConfig {
        &self.config
    }

    fn emit(&self, event: DomainEvent) {
        // A send error only means nobody is subscribed right now.
        if self.events.send(event).is_err() {
            debug!("Domain event dropped: no subscribers");
        }
    }

    //
    // WRITE ENTRY POINTS
    //

    /// Create an organization. Returns the new organization's id.
    pub async fn create(
        &self,
        mut options: OrganizationCreate,
        caller: &Caller,
    ) -> Result<String, OrgServiceError> {
        // Before-hooks see the payload as supplied, prior to normalization.
        self.hooks.run_before_create(&options, caller)?;

        options.normalize();
        options.validate(&self.config)?;

        let organization = Organization::from_create(&options);
        match self.store.insert_organization(organization.clone()).await {
            Ok(id) => {
                self.hooks.run_after_create(Ok(&id), &options, caller);
                info!("Created organization {} ('{}')", id, organization.name);
                self.emit(DomainEvent::OrganizationCreated(organization));
                Ok(id)
            }
            Err(e) => {
                self.hooks.run_after_create(Err(&e), &options, caller);
                Err(e.into())
            }
        }
    }

    /// Update an organization's name and/or description.
    ///
    /// Returns `Ok(true)` even when the id matched no active organization;
    /// the matched count is only visible to after-hooks.
    pub async fn update(
        &self,
        id: &str,
        changes: OrganizationUpdate,
        caller: &Caller,
    ) -> Result<bool, OrgServiceError> {
        self.hooks.run_before_update(id, &changes, caller)?;
        changes.validate(&self.config)?;

        match self.store.update_organization(id, &changes).await {
            Ok(matched) => {
                self.hooks.run_after_update(Ok(matched), id, &changes, caller);
                debug!("Updated organization {} (matched {})", id, matched);
                self.emit(DomainEvent::OrganizationUpdated { id: id.to_string() });
                Ok(true)
            }
            Err(e) => {
                self.hooks.run_after_update(Err(&e), id, &changes, caller);
                Err(e.into())
            }
        }
    }

    /// Soft-delete an organization. Repeat deletion is a zero-match no-op
    /// that still returns `Ok(true)`.
    pub async fn delete(&self, id: &str, caller: &Caller) -> Result<bool, OrgServiceError> {
        self.hooks.run_before_delete(id, caller)?;

        match self.store.soft_delete_organization(id, Utc::now()).await {
            Ok(matched) => {
                self.hooks.run_after_delete(Ok(matched), id, caller);
                info!("Soft-deleted organization {} (matched {})", id, matched);
                self.emit(DomainEvent::OrganizationDeleted { id: id.to_string() });
                Ok(true)
            }
            Err(e) => {
                self.hooks.run_after_delete(Err(&e), id, caller);
                Err(e.into())
            }
        }
    }

    /// Add (or overwrite) members of an organization.
    ///
    /// The proposed list is cleaned before writing: duplicate user ids keep
    /// their first entry, entries without a string user id are dropped, and
    /// so are ids unknown to the user store. Missing permission sets default
    /// to empty. Each surviving entry is upserted individually; a
    /// pre-existing membership has its permission set overwritten.
    pub async fn add_members(
        &self,
        id: &str,
        members: Vec<MemberDraft>,
        caller: &Caller,
    ) -> Result<bool, OrgServiceError> {
        self.hooks.run_before_add_members(id, &members, caller)?;

        // First entry wins on duplicate user ids; anonymous entries dropped.
        let mut seen: Vec<String> = Vec::new();
        let mut candidates: Vec<MemberDraft> = Vec::new();
        for draft in members {
            let Some(user_id) = draft.user_id.as_deref() else {
                continue;
            };
            if seen.iter().any(|s| s == user_id) {
                continue;
            }
            seen.push(user_id.to_string());
            candidates.push(draft);
        }

        let existing = self.users.existing_user_ids(&seen).await?;
        candidates.retain(|draft| {
            draft
                .user_id
                .as_ref()
                .is_some_and(|user_id| existing.contains(user_id))
        });

        // Validate the whole list before writing anything, so a bad entry
        // cannot leave a partial batch behind.
        let mut memberships = Vec::with_capacity(candidates.len());
        for draft in candidates {
            let membership = Membership {
                // user_id is present for every surviving candidate
                user_id: draft.user_id.unwrap_or_default(),
                organization: id.to_string(),
                permissions: draft.permissions.unwrap_or_default(),
            };
            membership.validate()?;
            memberships.push(membership);
        }

        for membership in memberships {
            match self.store.upsert_membership(membership.clone()).await {
                Ok(changed) => {
                    self.hooks
                        .run_after_add_members(Ok(changed), id, &membership, caller);
                    self.emit(DomainEvent::MembershipUpserted(membership));
                }
                Err(e) => {
                    self.hooks
                        .run_after_add_members(Err(&e), id, &membership, caller);
                    return Err(e.into());
                }
            }
        }

        info!("Added members to organization {}", id);
        Ok(true)
    }

    /// Remove members from an organization. Unknown user ids are zero-match
    /// no-ops; the call still returns `Ok(true)`.
    pub async fn remove_members(
        &self,
        id: &str,
        user_ids: Vec<String>,
        caller: &Caller,
    ) -> Result<bool, OrgServiceError> {
        self.hooks.run_before_remove_members(id, &user_ids, caller)?;

        match self.store.remove_memberships(id, &user_ids).await {
            Ok(removed) => {
                self.hooks
                    .run_after_remove_members(Ok(removed), id, &user_ids, caller);
                info!(
                    "Removed {} member(s) from organization {}",
                    removed, id
                );
                self.emit(DomainEvent::MembershipsRemoved {
                    organization: id.to_string(),
                    user_ids,
                });
                Ok(true)
            }
            Err(e) => {
                self.hooks
                    .run_after_remove_members(Err(&e), id, &user_ids, caller);
                Err(e.into())
            }
        }
    }

    /// Change permission sets of the memberships matched by `selector`.
    ///
    /// Returns `Ok(false)` without touching the store when the change
    /// carries no recognized operation; after-hooks do not run in that case.
    pub async fn change_permissions(
        &self,
        id: &str,
        selector: MemberSelector,
        change: PermissionChange,
        caller: &Caller,
    ) -> Result<bool, OrgServiceError> {
        self.hooks
            .run_before_change_permissions(id, &selector, &change, caller)?;
        selector.validate()?;

        if change.is_noop() {
            debug!("No-op permission change for organization {}", id);
            return Ok(false);
        }

        match self
            .store
            .update_membership_permissions(id, &selector, &change)
            .await
        {
            Ok(matched) => {
                self.hooks
                    .run_after_change_permissions(Ok(matched), id, &selector, &change, caller);
                info!(
                    "Changed permissions for {} membership(s) in organization {}",
                    matched, id
                );
                self.emit(DomainEvent::PermissionsChanged {
                    organization: id.to_string(),
                });
                Ok(true)
            }
            Err(e) => {
                self.hooks
                    .run_after_change_permissions(Err(&e), id, &selector, &change, caller);
                Err(e.into())
            }
        }
    }

    //
    // READ ACCESSORS
    //

    /// Fetch an organization by id, soft-deleted ones included.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Organization>, OrgServiceError> {
        Ok(self.store.get_organization(id).await?)
    }

    /// Fetch the organizations with the listed ids.
    pub async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Organization>, OrgServiceError> {
        Ok(self.store.find_organizations(ids).await?)
    }

    /// All memberships of an organization.
    pub async fn memberships_for_organization(
        &self,
        organization: &str,
    ) -> Result<Vec<Membership>, OrgServiceError> {
        Ok(self.store.memberships_for_organization(organization).await?)
    }

    /// All memberships of a user.
    pub async fn memberships_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<Membership>, OrgServiceError> {
        Ok(self.store.memberships_for_user(user_id).await?)
    }

    /// Ids of the members of an organization, deduplicated in first-seen
    /// order.
    pub async fn member_ids_in_organization(
        &self,
        organization: &str,
    ) -> Result<Vec<String>, OrgServiceError> {
        let memberships = self.store.memberships_for_organization(organization).await?;
        let mut ids: Vec<String> = Vec::with_capacity(memberships.len());
        for membership in memberships {
            if !ids.contains(&membership.user_id) {
                ids.push(membership.user_id);
            }
        }
        Ok(ids)
    }

    /// Members of an organization as user documents projected to the
    /// configured public fields.
    pub async fn members_in_organization(
        &self,
        organization: &str,
    ) -> Result<Vec<PublicUser>, OrgServiceError> {
        let ids = self.member_ids_in_organization(organization).await?;
        Ok(self
            .users
            .public_users(&ids, &self.config.public_user_fields)
            .await?)
    }

    /// Every permission granted in an organization, concatenated across
    /// memberships. Duplicates are preserved.
    pub async fn permissions_in_organization(
        &self,
        organization: &str,
    ) -> Result<Vec<String>, OrgServiceError> {
        let memberships = self.store.memberships_for_organization(organization).await?;
        Ok(memberships
            .into_iter()
            .flat_map(|m| m.permissions)
            .collect())
    }

    /// Members of an organization holding at least one of the listed
    /// permissions, as user documents projected to the configured public
    /// fields.
    pub async fn members_with_permission(
        &self,
        organization: &str,
        permissions: &[String],
    ) -> Result<Vec<PublicUser>, OrgServiceError> {
        let memberships = self
            .store
            .memberships_with_any_permission(organization, permissions)
            .await?;
        let mut ids: Vec<String> = Vec::with_capacity(memberships.len());
        for membership in memberships {
            if !ids.contains(&membership.user_id) {
                ids.push(membership.user_id);
            }
        }
        Ok(self
            .users
            .public_users(&ids, &self.config.public_user_fields)
            .await?)
    }

    /// Whether a user holds every listed permission in an organization.
    pub async fn user_has_permissions(
        &self,
        organization: &str,
        user_id: &str,
        permissions: &[String],
    ) -> Result<bool, OrgServiceError> {
        Ok(self
            .store
            .user_has_all_permissions(organization, user_id, permissions)
            .await?)
    }

    /// Organizations a user belongs to.
    pub async fn organizations_of_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<Organization>, OrgServiceError> {
        let memberships = self.store.memberships_for_user(user_id).await?;
        let mut org_ids: Vec<String> = Vec::with_capacity(memberships.len());
        for membership in memberships {
            if !org_ids.contains(&membership.organization) {
                org_ids.push(membership.organization);
            }
        }
        Ok(self.store.find_organizations(&org_ids).await?)
    }
}
