//! Domain Events
//!
//! Change notifications emitted by `OrganizationService` after a successful
//! write. Live read subscriptions listen on the service's broadcast channel
//! and refresh the channels an event is relevant to.
//!
//! Events are emitted only when the store write succeeded; a failed or
//! vetoed invocation emits nothing.

use crate::models::{Membership, Organization};
use serde::{Deserialize, Serialize};

/// A change to the organization or membership collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DomainEvent {
    /// A new organization was created
    OrganizationCreated(Organization),

    /// An organization's name and/or description changed
    OrganizationUpdated { id: String },

    /// An organization was soft-deleted
    OrganizationDeleted { id: String },

    /// A membership was created or overwritten
    MembershipUpserted(Membership),

    /// Memberships were removed from an organization
    MembershipsRemoved {
        organization: String,
        user_ids: Vec<String>,
    },

    /// Permission sets changed within an organization
    PermissionsChanged { organization: String },
}

impl DomainEvent {
    /// Stable label used in logs and subscription notifications.
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::OrganizationCreated(_) => "organization:created",
            DomainEvent::OrganizationUpdated { .. } => "organization:updated",
            DomainEvent::OrganizationDeleted { .. } => "organization:deleted",
            DomainEvent::MembershipUpserted(_) => "membership:upserted",
            DomainEvent::MembershipsRemoved { .. } => "membership:removed",
            DomainEvent::PermissionsChanged { .. } => "membership:permissionsChanged",
        }
    }

    /// Organization id the event concerns.
    pub fn organization_id(&self) -> &str {
        match self {
            DomainEvent::OrganizationCreated(org) => &org.id,
            DomainEvent::OrganizationUpdated { id } => id,
            DomainEvent::OrganizationDeleted { id } => id,
            DomainEvent::MembershipUpserted(membership) => &membership.organization,
            DomainEvent::MembershipsRemoved { organization, .. } => organization,
            DomainEvent::PermissionsChanged { organization } => organization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_labels() {
        let event = DomainEvent::OrganizationDeleted {
            id: "o1".to_string(),
        };
        assert_eq!(event.event_type(), "organization:deleted");
        assert_eq!(event.organization_id(), "o1");

        let event = DomainEvent::MembershipsRemoved {
            organization: "o2".to_string(),
            user_ids: vec!["u1".to_string()],
        };
        assert_eq!(event.event_type(), "membership:removed");
        assert_eq!(event.organization_id(), "o2");
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = DomainEvent::PermissionsChanged {
            organization: "o1".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "permissionsChanged");
        assert_eq!(json["organization"], "o1");
    }
}
