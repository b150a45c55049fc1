//! Data Models
//!
//! Core data contracts for the organization/membership domain:
//!
//! - `Organization` - the top-level grouped entity users belong to
//! - `Membership` - join row linking a user to an organization with a
//!   permission set
//! - Input contracts (`OrganizationCreate`, `OrganizationUpdate`,
//!   `MemberDraft`, `MemberSelector`, `PermissionChange`) with explicit
//!   normalize + validate pairs replacing dynamic schema cleaning
//!
//! All wire shapes are camelCase JSON; unknown fields are stripped on
//! deserialization rather than rejected.

mod membership;
mod organization;

pub use membership::{MemberDraft, MemberSelector, Membership, PermissionChange};
pub use organization::{Organization, OrganizationCreate, OrganizationUpdate};

use thiserror::Error;

/// Validation errors for organization and membership payloads.
///
/// Returned by the `validate()` half of the normalize + validate pairs so
/// callers can pattern-match the failure kind instead of catching a raised
/// schema exception.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Field '{field}' is shorter than the minimum length {min}")]
    TooShort { field: String, min: usize },

    #[error("Invalid member selector: {0}")]
    InvalidSelector(String),

    #[error("Invalid permission entry: {0}")]
    InvalidPermission(String),
}
