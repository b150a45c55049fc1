//! Store Trait - Database Abstraction Layer
//!
//! `OrgStore` and `UserStore` abstract the document store underneath
//! `OrganizationService`, so the business logic never depends on a concrete
//! backend. The bundled implementation is [`crate::db::TursoStore`]; host
//! applications with their own account system implement `UserStore`
//! themselves.
//!
//! All methods are async and implementations must be `Send + Sync`.
//!
//! Error handling: every method returns `DatabaseError`, the "store error"
//! kind of this package - terminal for the invocation, passed through to
//! after-hooks and ultimately to the remote caller.

use crate::db::error::DatabaseError;
use crate::models::{MemberSelector, Membership, Organization, OrganizationUpdate, PermissionChange};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A member document projected down to the configured public field set.
///
/// Only the projected fields ever leave the user store; no other profile
/// data is read by this package.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,

    /// Projected profile fields as a JSON object
    pub fields: serde_json::Value,
}

/// Persistence operations for the organization and membership collections.
#[async_trait]
pub trait OrgStore: Send + Sync {
    /// Insert a new organization document, returning its id.
    async fn insert_organization(
        &self,
        organization: Organization,
    ) -> Result<String, DatabaseError>;

    /// Apply an update to the active organization with the given id.
    ///
    /// Targets `id` with `deleted_at IS NULL`; returns the matched count.
    /// Zero matches is not an error. An empty update still issues.
    async fn update_organization(
        &self,
        id: &str,
        changes: &OrganizationUpdate,
    ) -> Result<u64, DatabaseError>;

    /// Soft-delete the active organization with the given id.
    ///
    /// Same `deleted_at IS NULL` targeting as `update_organization`, so a
    /// second delete is a zero-match no-op.
    async fn soft_delete_organization(
        &self,
        id: &str,
        deleted_at: DateTime<Utc>,
    ) -> Result<u64, DatabaseError>;

    /// Fetch an organization by id, soft-deleted ones included.
    async fn get_organization(&self, id: &str) -> Result<Option<Organization>, DatabaseError>;

    /// Fetch the organizations whose ids appear in `ids`, in `ids` order.
    async fn find_organizations(&self, ids: &[String]) -> Result<Vec<Organization>, DatabaseError>;

    /// Create or overwrite the membership keyed by
    /// `(membership.user_id, membership.organization)`.
    ///
    /// Overwrite semantics: a pre-existing row's permission set is replaced,
    /// not merged.
    async fn upsert_membership(&self, membership: Membership) -> Result<u64, DatabaseError>;

    /// Remove the memberships of the listed users in one organization.
    /// Returns the number of rows removed (possibly zero).
    async fn remove_memberships(
        &self,
        organization: &str,
        user_ids: &[String],
    ) -> Result<u64, DatabaseError>;

    /// Apply a permission change to every membership of `organization`
    /// matched by `selector`. Returns the matched row count.
    ///
    /// Each row is updated individually - per-document atomicity is all this
    /// store promises, there is no cross-row transaction.
    async fn update_membership_permissions(
        &self,
        organization: &str,
        selector: &MemberSelector,
        change: &PermissionChange,
    ) -> Result<u64, DatabaseError>;

    /// All memberships of an organization.
    async fn memberships_for_organization(
        &self,
        organization: &str,
    ) -> Result<Vec<Membership>, DatabaseError>;

    /// All memberships of a user, across organizations.
    async fn memberships_for_user(&self, user_id: &str) -> Result<Vec<Membership>, DatabaseError>;

    /// Memberships in an organization holding at least one of the listed
    /// permissions.
    async fn memberships_with_any_permission(
        &self,
        organization: &str,
        permissions: &[String],
    ) -> Result<Vec<Membership>, DatabaseError>;

    /// Whether the user's membership in the organization holds every listed
    /// permission.
    async fn user_has_all_permissions(
        &self,
        organization: &str,
        user_id: &str,
        permissions: &[String],
    ) -> Result<bool, DatabaseError>;
}

/// Read access to the host application's user store.
///
/// Used for two things only: existence checks at member-add time and
/// public-field projection for the members-of-organization read channel.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Filter `ids` down to those present in the user store, preserving
    /// input order.
    async fn existing_user_ids(&self, ids: &[String]) -> Result<Vec<String>, DatabaseError>;

    /// Fetch the listed users with only `fields` projected out of their
    /// profiles. Missing ids are skipped.
    async fn public_users(
        &self,
        ids: &[String],
        fields: &[String],
    ) -> Result<Vec<PublicUser>, DatabaseError>;
}
