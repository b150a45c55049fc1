//! Organization Data Structures
//!
//! The `Organization` document plus the create/update input contracts.
//!
//! Organizations are soft-deleted: `deleted_at` is set instead of removing
//! the row, and the update/delete entry points filter on `deleted_at IS
//! NULL`. Direct find-by-id intentionally does not apply that filter.
//!
//! # Examples
//!
//! ```rust
//! use orgspace_core::models::{Organization, OrganizationCreate};
//! use orgspace_core::config::OrgConfig;
//!
//! let mut draft = OrganizationCreate::new("Acme Corp");
//! draft.normalize();
//! draft.validate(&OrgConfig::default()).unwrap();
//!
//! let org = Organization::from_create(&draft);
//! assert_eq!(org.name, "Acme Corp");
//! assert!(org.deleted_at.is_none());
//! ```

use crate::config::OrgConfig;
use crate::models::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An organization users can belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    /// Unique identifier, assigned on creation
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Free-form description, defaults to empty
    #[serde(default)]
    pub description: String,

    /// Soft-delete marker; `None` means active
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    /// Build a new active organization from a normalized create payload.
    ///
    /// Assigns a fresh UUID v4 id and current timestamps. The payload should
    /// have been normalized and validated first; this constructor does not
    /// re-check it.
    pub fn from_create(options: &OrganizationCreate) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: options.name.clone(),
            description: options.description.clone().unwrap_or_default(),
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the organization is still active (not soft-deleted).
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Payload for creating an organization.
///
/// `name` is required (serde defaults a missing field to the empty string so
/// validation can report it instead of failing deserialization); unknown wire
/// fields are stripped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationCreate {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl OrganizationCreate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    /// Apply defaults: a missing description becomes the empty string.
    pub fn normalize(&mut self) {
        if self.description.is_none() {
            self.description = Some(String::new());
        }
    }

    /// Check the payload against the create schema.
    pub fn validate(&self, config: &OrgConfig) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::MissingField("name".to_string()));
        }
        if self.name.chars().count() < config.min_name_length {
            return Err(ValidationError::TooShort {
                field: "name".to_string(),
                min: config.min_name_length,
            });
        }
        Ok(())
    }
}

/// Payload for updating an organization's name and/or description.
///
/// All fields optional; an empty update is legal and still targets the
/// document (no short-circuit).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl OrganizationUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }

    /// Check the payload against the update schema. The name minimum applies
    /// only when a name is present.
    pub fn validate(&self, config: &OrgConfig) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            if name.chars().count() < config.min_name_length {
                return Err(ValidationError::TooShort {
                    field: "name".to_string(),
                    min: config.min_name_length,
                });
            }
        }
        Ok(())
    }
}
