//! Membership Data Structures
//!
//! `Membership` is the join row between a user and an organization, carrying
//! a permission set (stored as an ordered sequence, semantically a set).
//!
//! The input side is deliberately lenient: proposed member entries with a
//! non-string `userId` deserialize with `user_id = None` and are later
//! dropped by `addMembers` rather than rejecting the whole call, matching
//! the behavior callers rely on. The same applies to a `permissions` value
//! that is not an array of strings - it falls back to the empty set.

use crate::models::ValidationError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Join row linking a user to an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    /// Identifier of the user in the host account table
    pub user_id: String,

    /// Identifier of the organization
    pub organization: String,

    /// Permission strings; duplicates are not meaningful
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Membership {
    /// Check the row against the membership-add schema.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.user_id.is_empty() {
            return Err(ValidationError::MissingField("userId".to_string()));
        }
        if self.organization.is_empty() {
            return Err(ValidationError::MissingField("organization".to_string()));
        }
        if let Some(perm) = self.permissions.iter().find(|p| p.is_empty()) {
            return Err(ValidationError::InvalidPermission(perm.clone()));
        }
        Ok(())
    }
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    // A userId of any other JSON type counts as anonymous and gets dropped.
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn string_vec_or_none<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    // Anything that is not an array of strings falls back to "no permissions".
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(None);
    };
    let mut permissions = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(s) => permissions.push(s),
            _ => return Ok(None),
        }
    }
    Ok(Some(permissions))
}

/// A proposed member as supplied by callers of `addMembers`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDraft {
    /// User id; `None` when the caller supplied a non-string value
    #[serde(default, deserialize_with = "string_or_none")]
    pub user_id: Option<String>,

    /// Requested permission set; `None` defaults to empty at add time
    #[serde(default, deserialize_with = "string_vec_or_none")]
    pub permissions: Option<Vec<String>>,
}

impl MemberDraft {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            permissions: None,
        }
    }

    pub fn with_permissions(user_id: impl Into<String>, permissions: Vec<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            permissions: Some(permissions),
        }
    }
}

/// Selector choosing which memberships of an organization a
/// `changePermissions` call targets.
///
/// `except` and `only` are mutually exclusive; with neither present (or both
/// empty) every membership of the organization is targeted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub except: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only: Option<Vec<String>>,
}

fn non_empty(list: &Option<Vec<String>>) -> Option<&Vec<String>> {
    list.as_ref().filter(|l| !l.is_empty())
}

impl MemberSelector {
    /// Target every membership of the organization.
    pub fn all() -> Self {
        Self::default()
    }

    /// Target only the listed user ids.
    pub fn only(user_ids: Vec<String>) -> Self {
        Self {
            except: None,
            only: Some(user_ids),
        }
    }

    /// Target everyone except the listed user ids.
    pub fn except(user_ids: Vec<String>) -> Self {
        Self {
            except: Some(user_ids),
            only: None,
        }
    }

    /// Check the selector shape: `except` and `only` cannot be combined.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if non_empty(&self.except).is_some() && non_empty(&self.only).is_some() {
            return Err(ValidationError::InvalidSelector(
                "'except' and 'only' are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a membership for `user_id` is targeted by this selector.
    pub fn matches(&self, user_id: &str) -> bool {
        if let Some(except) = non_empty(&self.except) {
            return !except.iter().any(|id| id == user_id);
        }
        if let Some(only) = non_empty(&self.only) {
            return only.iter().any(|id| id == user_id);
        }
        true
    }
}

/// Permission set change applied by `changePermissions`.
///
/// `set` replaces the whole permission set and wins over `add`/`remove` when
/// present; `add` and `remove` may be combined. Empty lists count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove: Option<Vec<String>>,
}

impl PermissionChange {
    pub fn set(permissions: Vec<String>) -> Self {
        Self {
            set: Some(permissions),
            add: None,
            remove: None,
        }
    }

    pub fn add(permissions: Vec<String>) -> Self {
        Self {
            set: None,
            add: Some(permissions),
            remove: None,
        }
    }

    pub fn remove(permissions: Vec<String>) -> Self {
        Self {
            set: None,
            add: None,
            remove: Some(permissions),
        }
    }

    /// Whether the change carries no recognized operation. A no-op change
    /// must not touch the store.
    pub fn is_noop(&self) -> bool {
        non_empty(&self.set).is_none()
            && non_empty(&self.add).is_none()
            && non_empty(&self.remove).is_none()
    }

    /// Compute the new permission set for a membership currently holding
    /// `current`. Set semantics: `add` never introduces duplicates, `remove`
    /// pulls every occurrence, `set` replaces the sequence as given.
    pub fn apply(&self, current: &[String]) -> Vec<String> {
        if let Some(set) = non_empty(&self.set) {
            return set.clone();
        }

        let mut permissions: Vec<String> = current.to_vec();
        if let Some(remove) = non_empty(&self.remove) {
            permissions.retain(|p| !remove.contains(p));
        }
        if let Some(add) = non_empty(&self.add) {
            for perm in add {
                if !permissions.contains(perm) {
                    permissions.push(perm.clone());
                }
            }
        }
        permissions
    }
}
