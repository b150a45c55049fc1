//! Hook and Permission Registries
//!
//! Host applications customize the write entry points by registering hooks
//! and gate the read channels by registering permission checks. Both
//! registries are populated at startup and handed to the service by value;
//! there is no runtime registration API.
//!
//! Execution contract:
//!
//! - Before-hooks run in registration order, synchronously, before
//!   validation. The first error aborts the invocation; nothing is written.
//! - After-hooks run in registration order after the store write, and
//!   receive the write outcome. Their failures are logged and swallowed -
//!   an after-hook can never change what the caller observes.

use crate::db::DatabaseError;
use crate::models::{
    MemberDraft, MemberSelector, Membership, OrganizationCreate, OrganizationUpdate,
    PermissionChange,
};
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;
use tracing::warn;

/// Identity of the caller of a write or read entry point.
///
/// `None` means an unauthenticated caller. The package itself attaches no
/// meaning to the id; hooks and permission checks interpret it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Option<String>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }
}

/// Error raised by a before-hook or a permission check to veto an
/// invocation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HookError {
    /// The caller is not allowed to perform the operation
    #[error("Access denied: {0}")]
    Unauthorized(String),

    /// The payload was vetoed on grounds other than identity
    #[error("Rejected by hook: {0}")]
    Rejected(String),
}

/// Entry point labels used in hook failure logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    Create,
    Update,
    Delete,
    AddMembers,
    RemoveMembers,
    ChangePermissions,
}

impl HookPoint {
    pub fn label(&self) -> &'static str {
        match self {
            HookPoint::Create => "createOrganization",
            HookPoint::Update => "updateOrganization",
            HookPoint::Delete => "deleteOrganization",
            HookPoint::AddMembers => "addMembers",
            HookPoint::RemoveMembers => "removeMembers",
            HookPoint::ChangePermissions => "changePermissions",
        }
    }
}

pub type BeforeCreateHook =
    Box<dyn Fn(&OrganizationCreate, &Caller) -> Result<(), HookError> + Send + Sync>;
pub type AfterCreateHook =
    Box<dyn Fn(Result<&str, &DatabaseError>, &OrganizationCreate, &Caller) + Send + Sync>;

pub type BeforeUpdateHook =
    Box<dyn Fn(&str, &OrganizationUpdate, &Caller) -> Result<(), HookError> + Send + Sync>;
pub type AfterUpdateHook =
    Box<dyn Fn(Result<u64, &DatabaseError>, &str, &OrganizationUpdate, &Caller) + Send + Sync>;

pub type BeforeDeleteHook = Box<dyn Fn(&str, &Caller) -> Result<(), HookError> + Send + Sync>;
pub type AfterDeleteHook =
    Box<dyn Fn(Result<u64, &DatabaseError>, &str, &Caller) + Send + Sync>;

pub type BeforeAddMembersHook =
    Box<dyn Fn(&str, &[MemberDraft], &Caller) -> Result<(), HookError> + Send + Sync>;
/// Fires once per membership actually written, with that membership.
///
/// Deliberately finer-grained than the before-hook, which sees the submitted
/// draft list: by after-hook time the list has been cleaned (deduplicated,
/// anonymous and unknown users dropped), so observers get the settled row
/// per write instead of re-deriving it from the raw input.
pub type AfterAddMembersHook =
    Box<dyn Fn(Result<u64, &DatabaseError>, &str, &Membership, &Caller) + Send + Sync>;

pub type BeforeRemoveMembersHook =
    Box<dyn Fn(&str, &[String], &Caller) -> Result<(), HookError> + Send + Sync>;
pub type AfterRemoveMembersHook =
    Box<dyn Fn(Result<u64, &DatabaseError>, &str, &[String], &Caller) + Send + Sync>;

pub type BeforeChangePermissionsHook = Box<
    dyn Fn(&str, &MemberSelector, &PermissionChange, &Caller) -> Result<(), HookError>
        + Send
        + Sync,
>;
pub type AfterChangePermissionsHook = Box<
    dyn Fn(Result<u64, &DatabaseError>, &str, &MemberSelector, &PermissionChange, &Caller)
        + Send
        + Sync,
>;

/// Run one after-hook, containing any panic it raises.
fn run_contained(point: HookPoint, index: usize, hook: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(hook)).is_err() {
        warn!(
            "After-hook #{} for {} panicked; outcome unaffected",
            index,
            point.label()
        );
    }
}

/// Registry of before/after hooks for the six write entry points.
#[derive(Default)]
pub struct HookRegistry {
    pub(crate) before_create: Vec<BeforeCreateHook>,
    pub(crate) after_create: Vec<AfterCreateHook>,
    pub(crate) before_update: Vec<BeforeUpdateHook>,
    pub(crate) after_update: Vec<AfterUpdateHook>,
    pub(crate) before_delete: Vec<BeforeDeleteHook>,
    pub(crate) after_delete: Vec<AfterDeleteHook>,
    pub(crate) before_add_members: Vec<BeforeAddMembersHook>,
    pub(crate) after_add_members: Vec<AfterAddMembersHook>,
    pub(crate) before_remove_members: Vec<BeforeRemoveMembersHook>,
    pub(crate) after_remove_members: Vec<AfterRemoveMembersHook>,
    pub(crate) before_change_permissions: Vec<BeforeChangePermissionsHook>,
    pub(crate) after_change_permissions: Vec<AfterChangePermissionsHook>,
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("before_create", &self.before_create.len())
            .field("after_create", &self.after_create.len())
            .field("before_update", &self.before_update.len())
            .field("after_update", &self.after_update.len())
            .field("before_delete", &self.before_delete.len())
            .field("after_delete", &self.after_delete.len())
            .field("before_add_members", &self.before_add_members.len())
            .field("after_add_members", &self.after_add_members.len())
            .field("before_remove_members", &self.before_remove_members.len())
            .field("after_remove_members", &self.after_remove_members.len())
            .field(
                "before_change_permissions",
                &self.before_change_permissions.len(),
            )
            .field(
                "after_change_permissions",
                &self.after_change_permissions.len(),
            )
            .finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every registered hook.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn before_create(&mut self, hook: BeforeCreateHook) -> &mut Self {
        self.before_create.push(hook);
        self
    }

    pub fn after_create(&mut self, hook: AfterCreateHook) -> &mut Self {
        self.after_create.push(hook);
        self
    }

    pub fn before_update(&mut self, hook: BeforeUpdateHook) -> &mut Self {
        self.before_update.push(hook);
        self
    }

    pub fn after_update(&mut self, hook: AfterUpdateHook) -> &mut Self {
        self.after_update.push(hook);
        self
    }

    pub fn before_delete(&mut self, hook: BeforeDeleteHook) -> &mut Self {
        self.before_delete.push(hook);
        self
    }

    pub fn after_delete(&mut self, hook: AfterDeleteHook) -> &mut Self {
        self.after_delete.push(hook);
        self
    }

    pub fn before_add_members(&mut self, hook: BeforeAddMembersHook) -> &mut Self {
        self.before_add_members.push(hook);
        self
    }

    pub fn after_add_members(&mut self, hook: AfterAddMembersHook) -> &mut Self {
        self.after_add_members.push(hook);
        self
    }

    pub fn before_remove_members(&mut self, hook: BeforeRemoveMembersHook) -> &mut Self {
        self.before_remove_members.push(hook);
        self
    }

    pub fn after_remove_members(&mut self, hook: AfterRemoveMembersHook) -> &mut Self {
        self.after_remove_members.push(hook);
        self
    }

    pub fn before_change_permissions(&mut self, hook: BeforeChangePermissionsHook) -> &mut Self {
        self.before_change_permissions.push(hook);
        self
    }

    pub fn after_change_permissions(&mut self, hook: AfterChangePermissionsHook) -> &mut Self {
        self.after_change_permissions.push(hook);
        self
    }

    pub(crate) fn run_before_create(
        &self,
        options: &OrganizationCreate,
        caller: &Caller,
    ) -> Result<(), HookError> {
        for hook in &self.before_create {
            hook(options, caller)?;
        }
        Ok(())
    }

    pub(crate) fn run_after_create(
        &self,
        outcome: Result<&str, &DatabaseError>,
        options: &OrganizationCreate,
        caller: &Caller,
    ) {
        for (i, hook) in self.after_create.iter().enumerate() {
            run_contained(HookPoint::Create, i, || hook(outcome, options, caller));
        }
    }

    pub(crate) fn run_before_update(
        &self,
        id: &str,
        changes: &OrganizationUpdate,
        caller: &Caller,
    ) -> Result<(), HookError> {
        for hook in &self.before_update {
            hook(id, changes, caller)?;
        }
        Ok(())
    }

    pub(crate) fn run_after_update(
        &self,
        outcome: Result<u64, &DatabaseError>,
        id: &str,
        changes: &OrganizationUpdate,
        caller: &Caller,
    ) {
        for (i, hook) in self.after_update.iter().enumerate() {
            run_contained(HookPoint::Update, i, || hook(outcome, id, changes, caller));
        }
    }

    pub(crate) fn run_before_delete(&self, id: &str, caller: &Caller) -> Result<(), HookError> {
        for hook in &self.before_delete {
            hook(id, caller)?;
        }
        Ok(())
    }

    pub(crate) fn run_after_delete(
        &self,
        outcome: Result<u64, &DatabaseError>,
        id: &str,
        caller: &Caller,
    ) {
        for (i, hook) in self.after_delete.iter().enumerate() {
            run_contained(HookPoint::Delete, i, || hook(outcome, id, caller));
        }
    }

    pub(crate) fn run_before_add_members(
        &self,
        id: &str,
        members: &[MemberDraft],
        caller: &Caller,
    ) -> Result<(), HookError> {
        for hook in &self.before_add_members {
            hook(id, members, caller)?;
        }
        Ok(())
    }

    pub(crate) fn run_after_add_members(
        &self,
        outcome: Result<u64, &DatabaseError>,
        id: &str,
        membership: &Membership,
        caller: &Caller,
    ) {
        for (i, hook) in self.after_add_members.iter().enumerate() {
            run_contained(HookPoint::AddMembers, i, || {
                hook(outcome, id, membership, caller)
            });
        }
    }

    pub(crate) fn run_before_remove_members(
        &self,
        id: &str,
        user_ids: &[String],
        caller: &Caller,
    ) -> Result<(), HookError> {
        for hook in &self.before_remove_members {
            hook(id, user_ids, caller)?;
        }
        Ok(())
    }

    pub(crate) fn run_after_remove_members(
        &self,
        outcome: Result<u64, &DatabaseError>,
        id: &str,
        user_ids: &[String],
        caller: &Caller,
    ) {
        for (i, hook) in self.after_remove_members.iter().enumerate() {
            run_contained(HookPoint::RemoveMembers, i, || {
                hook(outcome, id, user_ids, caller)
            });
        }
    }

    pub(crate) fn run_before_change_permissions(
        &self,
        id: &str,
        selector: &MemberSelector,
        change: &PermissionChange,
        caller: &Caller,
    ) -> Result<(), HookError> {
        for hook in &self.before_change_permissions {
            hook(id, selector, change, caller)?;
        }
        Ok(())
    }

    pub(crate) fn run_after_change_permissions(
        &self,
        outcome: Result<u64, &DatabaseError>,
        id: &str,
        selector: &MemberSelector,
        change: &PermissionChange,
        caller: &Caller,
    ) {
        for (i, hook) in self.after_change_permissions.iter().enumerate() {
            run_contained(HookPoint::ChangePermissions, i, || {
                hook(outcome, id, selector, change, caller)
            });
        }
    }
}

/// Permission check over a list of organization ids.
pub type IdListCheck = Box<dyn Fn(&[String], &Caller) -> Result<(), HookError> + Send + Sync>;

/// Permission check over a single organization or user id.
pub type IdCheck = Box<dyn Fn(&str, &Caller) -> Result<(), HookError> + Send + Sync>;

/// Registry of permission checks gating the five read channels.
///
/// Checks run once at subscription setup. A change notification later pushed
/// down an established subscription is not re-checked.
#[derive(Default)]
pub struct PermissionRegistry {
    pub(crate) before_access_organization: Vec<IdListCheck>,
    pub(crate) before_access_membership_for_user: Vec<IdCheck>,
    pub(crate) before_access_membership_for_organization: Vec<IdCheck>,
    pub(crate) before_access_members_of_organization: Vec<IdCheck>,
    pub(crate) before_access_organizations_of_user: Vec<IdCheck>,
}

impl std::fmt::Debug for PermissionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionRegistry")
            .field(
                "before_access_organization",
                &self.before_access_organization.len(),
            )
            .field(
                "before_access_membership_for_user",
                &self.before_access_membership_for_user.len(),
            )
            .field(
                "before_access_membership_for_organization",
                &self.before_access_membership_for_organization.len(),
            )
            .field(
                "before_access_members_of_organization",
                &self.before_access_members_of_organization.len(),
            )
            .field(
                "before_access_organizations_of_user",
                &self.before_access_organizations_of_user.len(),
            )
            .finish()
    }
}

impl PermissionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn before_access_organization(&mut self, check: IdListCheck) -> &mut Self {
        self.before_access_organization.push(check);
        self
    }

    pub fn before_access_membership_for_user(&mut self, check: IdCheck) -> &mut Self {
        self.before_access_membership_for_user.push(check);
        self
    }

    pub fn before_access_membership_for_organization(&mut self, check: IdCheck) -> &mut Self {
        self.before_access_membership_for_organization.push(check);
        self
    }

    pub fn before_access_members_of_organization(&mut self, check: IdCheck) -> &mut Self {
        self.before_access_members_of_organization.push(check);
        self
    }

    pub fn before_access_organizations_of_user(&mut self, check: IdCheck) -> &mut Self {
        self.before_access_organizations_of_user.push(check);
        self
    }

    pub(crate) fn check_organization(
        &self,
        ids: &[String],
        caller: &Caller,
    ) -> Result<(), HookError> {
        for check in &self.before_access_organization {
            check(ids, caller)?;
        }
        Ok(())
    }

    pub(crate) fn check_membership_for_user(
        &self,
        user_id: &str,
        caller: &Caller,
    ) -> Result<(), HookError> {
        for check in &self.before_access_membership_for_user {
            check(user_id, caller)?;
        }
        Ok(())
    }

    pub(crate) fn check_membership_for_organization(
        &self,
        organization_id: &str,
        caller: &Caller,
    ) -> Result<(), HookError> {
        for check in &self.before_access_membership_for_organization {
            check(organization_id, caller)?;
        }
        Ok(())
    }

    pub(crate) fn check_members_of_organization(
        &self,
        organization_id: &str,
        caller: &Caller,
    ) -> Result<(), HookError> {
        for check in &self.before_access_members_of_organization {
            check(organization_id, caller)?;
        }
        Ok(())
    }

    pub(crate) fn check_organizations_of_user(
        &self,
        user_id: &str,
        caller: &Caller,
    ) -> Result<(), HookError> {
        for check in &self.before_access_organizations_of_user {
            check(user_id, caller)?;
        }
        Ok(())
    }
}
