//! TursoStore - libsql Store Implementation
//!
//! Implements `OrgStore` and `UserStore` on top of `DatabaseService`. Model
//! conversion lives here: rows come back as text columns, timestamps are
//! RFC3339 strings, permission sets and profiles are JSON text.
//!
//! The permission algebra of `update_membership_permissions` is evaluated in
//! Rust rather than SQL: each targeted row is read, the change applied to its
//! current set, and the row written back individually.

use crate::db::database::DatabaseService;
use crate::db::error::DatabaseError;
use crate::db::org_store::{OrgStore, PublicUser, UserStore};
use crate::models::{
    MemberSelector, Membership, Organization, OrganizationUpdate, PermissionChange,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::sync::Arc;
use tracing::debug;

/// libsql-backed store for organizations, memberships, and users.
#[derive(Debug, Clone)]
pub struct TursoStore {
    db: Arc<DatabaseService>,
}

impl TursoStore {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    /// Access the underlying database service.
    pub fn database(&self) -> &Arc<DatabaseService> {
        &self.db
    }

    /// Seed or replace a user row in the bundled account table.
    ///
    /// Hosts with their own account system implement `UserStore` directly
    /// and never call this.
    pub async fn insert_user(
        &self,
        user_id: &str,
        profile: &serde_json::Value,
    ) -> Result<(), DatabaseError> {
        let profile_json = serde_json::to_string(profile)
            .map_err(|e| DatabaseError::row_decode(format!("Failed to encode profile: {}", e)))?;
        self.db.db_insert_user(user_id, &profile_json).await
    }

    /// Parse a stored timestamp.
    ///
    /// Accepts SQLite's `%Y-%m-%d %H:%M:%S` form as well as RFC3339, since
    /// rows written by `CURRENT_TIMESTAMP` defaults and rows written by this
    /// package differ in format.
    fn parse_timestamp(&self, timestamp_str: &str) -> Result<DateTime<Utc>, DatabaseError> {
        if let Ok(naive) = NaiveDateTime::parse_from_str(timestamp_str, "%Y-%m-%d %H:%M:%S") {
            return Ok(naive.and_utc());
        }
        DateTime::parse_from_rfc3339(timestamp_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                DatabaseError::row_decode(format!(
                    "Invalid timestamp '{}': {}",
                    timestamp_str, e
                ))
            })
    }

    /// Convert an organizations row into the model.
    fn row_to_organization(&self, row: &libsql::Row) -> Result<Organization, DatabaseError> {
        let id: String = row
            .get(0)
            .map_err(|e| DatabaseError::row_decode(format!("organization id: {}", e)))?;
        let name: String = row
            .get(1)
            .map_err(|e| DatabaseError::row_decode(format!("organization name: {}", e)))?;
        let description: String = row
            .get(2)
            .map_err(|e| DatabaseError::row_decode(format!("organization description: {}", e)))?;
        let deleted_at: Option<String> = row
            .get(3)
            .map_err(|e| DatabaseError::row_decode(format!("organization deleted_at: {}", e)))?;
        let created_at: String = row
            .get(4)
            .map_err(|e| DatabaseError::row_decode(format!("organization created_at: {}", e)))?;
        let updated_at: String = row
            .get(5)
            .map_err(|e| DatabaseError::row_decode(format!("organization updated_at: {}", e)))?;

        Ok(Organization {
            id,
            name,
            description,
            deleted_at: match deleted_at {
                Some(ts) => Some(self.parse_timestamp(&ts)?),
                None => None,
            },
            created_at: self.parse_timestamp(&created_at)?,
            updated_at: self.parse_timestamp(&updated_at)?,
        })
    }

    /// Convert a memberships row into the model.
    fn row_to_membership(&self, row: &libsql::Row) -> Result<Membership, DatabaseError> {
        let user_id: String = row
            .get(0)
            .map_err(|e| DatabaseError::row_decode(format!("membership user_id: {}", e)))?;
        let organization: String = row
            .get(1)
            .map_err(|e| DatabaseError::row_decode(format!("membership organization: {}", e)))?;
        let permissions_json: String = row
            .get(2)
            .map_err(|e| DatabaseError::row_decode(format!("membership permissions: {}", e)))?;
        let permissions: Vec<String> = serde_json::from_str(&permissions_json).map_err(|e| {
            DatabaseError::row_decode(format!(
                "membership permissions JSON '{}': {}",
                permissions_json, e
            ))
        })?;

        Ok(Membership {
            user_id,
            organization,
            permissions,
        })
    }

    async fn collect_memberships(
        &self,
        mut rows: libsql::Rows,
    ) -> Result<Vec<Membership>, DatabaseError> {
        let mut memberships = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            memberships.push(self.row_to_membership(&row)?);
        }
        Ok(memberships)
    }
}

#[async_trait]
impl OrgStore for TursoStore {
    async fn insert_organization(
        &self,
        organization: Organization,
    ) -> Result<String, DatabaseError> {
        self.db
            .db_insert_organization(
                &organization.id,
                &organization.name,
                &organization.description,
                &organization.created_at.to_rfc3339(),
                &organization.updated_at.to_rfc3339(),
            )
            .await?;
        debug!("Inserted organization {}", organization.id);
        Ok(organization.id)
    }

    async fn update_organization(
        &self,
        id: &str,
        changes: &OrganizationUpdate,
    ) -> Result<u64, DatabaseError> {
        let matched = self
            .db
            .db_update_organization(
                id,
                changes.name.as_deref(),
                changes.description.as_deref(),
                &Utc::now().to_rfc3339(),
            )
            .await?;
        debug!("Updated organization {} (matched {})", id, matched);
        Ok(matched)
    }

    async fn soft_delete_organization(
        &self,
        id: &str,
        deleted_at: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let matched = self
            .db
            .db_soft_delete_organization(id, &deleted_at.to_rfc3339())
            .await?;
        debug!("Soft-deleted organization {} (matched {})", id, matched);
        Ok(matched)
    }

    async fn get_organization(&self, id: &str) -> Result<Option<Organization>, DatabaseError> {
        match self.db.db_get_organization(id).await? {
            Some(row) => Ok(Some(self.row_to_organization(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_organizations(&self, ids: &[String]) -> Result<Vec<Organization>, DatabaseError> {
        let mut organizations = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(org) = self.get_organization(id).await? {
                organizations.push(org);
            }
        }
        Ok(organizations)
    }

    async fn upsert_membership(&self, membership: Membership) -> Result<u64, DatabaseError> {
        let permissions_json = serde_json::to_string(&membership.permissions).map_err(|e| {
            DatabaseError::row_decode(format!("Failed to encode permissions: {}", e))
        })?;
        self.db
            .db_upsert_membership(
                &membership.user_id,
                &membership.organization,
                &permissions_json,
            )
            .await
    }

    async fn remove_memberships(
        &self,
        organization: &str,
        user_ids: &[String],
    ) -> Result<u64, DatabaseError> {
        let mut removed = 0;
        for user_id in user_ids {
            removed += self.db.db_remove_membership(organization, user_id).await?;
        }
        debug!(
            "Removed {} membership(s) from organization {}",
            removed, organization
        );
        Ok(removed)
    }

    async fn update_membership_permissions(
        &self,
        organization: &str,
        selector: &MemberSelector,
        change: &PermissionChange,
    ) -> Result<u64, DatabaseError> {
        let memberships = self.memberships_for_organization(organization).await?;
        let mut matched = 0;
        for membership in memberships {
            if !selector.matches(&membership.user_id) {
                continue;
            }
            let next = change.apply(&membership.permissions);
            let permissions_json = serde_json::to_string(&next).map_err(|e| {
                DatabaseError::row_decode(format!("Failed to encode permissions: {}", e))
            })?;
            matched += self
                .db
                .db_set_membership_permissions(organization, &membership.user_id, &permissions_json)
                .await?;
        }
        Ok(matched)
    }

    async fn memberships_for_organization(
        &self,
        organization: &str,
    ) -> Result<Vec<Membership>, DatabaseError> {
        let rows = self.db.db_memberships_for_organization(organization).await?;
        self.collect_memberships(rows).await
    }

    async fn memberships_for_user(&self, user_id: &str) -> Result<Vec<Membership>, DatabaseError> {
        let rows = self.db.db_memberships_for_user(user_id).await?;
        self.collect_memberships(rows).await
    }

    async fn memberships_with_any_permission(
        &self,
        organization: &str,
        permissions: &[String],
    ) -> Result<Vec<Membership>, DatabaseError> {
        let memberships = self.memberships_for_organization(organization).await?;
        Ok(memberships
            .into_iter()
            .filter(|m| m.permissions.iter().any(|p| permissions.contains(p)))
            .collect())
    }

    async fn user_has_all_permissions(
        &self,
        organization: &str,
        user_id: &str,
        permissions: &[String],
    ) -> Result<bool, DatabaseError> {
        let memberships = self.memberships_for_user(user_id).await?;
        Ok(memberships
            .iter()
            .filter(|m| m.organization == organization)
            .any(|m| permissions.iter().all(|p| m.permissions.contains(p))))
    }
}

#[async_trait]
impl UserStore for TursoStore {
    async fn existing_user_ids(&self, ids: &[String]) -> Result<Vec<String>, DatabaseError> {
        let mut existing = Vec::with_capacity(ids.len());
        for id in ids {
            if self.db.db_user_exists(id).await? {
                existing.push(id.clone());
            }
        }
        Ok(existing)
    }

    async fn public_users(
        &self,
        ids: &[String],
        fields: &[String],
    ) -> Result<Vec<PublicUser>, DatabaseError> {
        let mut users = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(row) = self.db.db_get_user(id).await? else {
                continue;
            };
            let user_id: String = row
                .get(0)
                .map_err(|e| DatabaseError::row_decode(format!("user id: {}", e)))?;
            let profile_json: String = row
                .get(1)
                .map_err(|e| DatabaseError::row_decode(format!("user profile: {}", e)))?;
            let profile: serde_json::Value =
                serde_json::from_str(&profile_json).map_err(|e| {
                    DatabaseError::row_decode(format!("user profile JSON: {}", e))
                })?;

            // Project only the configured public fields out of the profile.
            let mut projected = serde_json::Map::new();
            if let serde_json::Value::Object(map) = profile {
                for field in fields {
                    if let Some(value) = map.get(field) {
                        projected.insert(field.clone(), value.clone());
                    }
                }
            }

            users.push(PublicUser {
                id: user_id,
                fields: serde_json::Value::Object(projected),
            });
        }
        Ok(users)
    }
}
