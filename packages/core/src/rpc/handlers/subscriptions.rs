//! Subscription Channels
//!
//! The five read channels remote clients can subscribe to. A subscription
//! answers with the current result set and then pushes a refreshed result
//! set whenever a relevant domain event fires.
//!
//! Permission checks run once, at subscription setup. An established
//! subscription keeps receiving refreshes without re-checking; revoking
//! access means tearing the subscription down.

use crate::db::events::DomainEvent;
use crate::rpc::types::{RpcError, UNKNOWN_CHANNEL};
use crate::services::hooks::{Caller, HookError, PermissionRegistry};
use crate::services::OrganizationService;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Raw subscribe parameters as supplied on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeParams {
    pub channel: String,

    #[serde(default)]
    pub ids: Option<Vec<String>>,

    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub organization_id: Option<String>,
}

/// A parsed, argument-complete subscription target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    /// Organizations with the given ids
    Organization { ids: Vec<String> },

    /// All memberships of one user
    MembershipForUser { user_id: String },

    /// All memberships of one organization
    MembershipForOrganization { organization_id: String },

    /// Member user documents of one organization, public fields only
    MembersOfOrganization { organization_id: String },

    /// Organizations one user belongs to
    OrganizationsOfUser { user_id: String },
}

impl Channel {
    /// Parse wire params into a channel, validating the per-channel
    /// argument.
    pub fn parse(params: Value) -> Result<Self, RpcError> {
        let params: SubscribeParams = serde_json::from_value(params)
            .map_err(|e| RpcError::invalid_params(format!("Invalid subscribe params: {}", e)))?;

        let organization_id = |p: &SubscribeParams| {
            p.organization_id.clone().ok_or_else(|| {
                RpcError::invalid_params("Missing required parameter: organizationId")
            })
        };
        let user_id = |p: &SubscribeParams| {
            p.user_id
                .clone()
                .ok_or_else(|| RpcError::invalid_params("Missing required parameter: userId"))
        };

        match params.channel.as_str() {
            "organization" => Ok(Channel::Organization {
                ids: params
                    .ids
                    .clone()
                    .ok_or_else(|| RpcError::invalid_params("Missing required parameter: ids"))?,
            }),
            "membershipForUser" => Ok(Channel::MembershipForUser {
                user_id: user_id(&params)?,
            }),
            "membershipForOrganization" => Ok(Channel::MembershipForOrganization {
                organization_id: organization_id(&params)?,
            }),
            "membersOfOrganization" => Ok(Channel::MembersOfOrganization {
                organization_id: organization_id(&params)?,
            }),
            "organizationsOfUser" => Ok(Channel::OrganizationsOfUser {
                user_id: user_id(&params)?,
            }),
            other => Err(RpcError::new(
                UNKNOWN_CHANNEL,
                format!("Unknown channel: {}", other),
            )),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Channel::Organization { .. } => "organization",
            Channel::MembershipForUser { .. } => "membershipForUser",
            Channel::MembershipForOrganization { .. } => "membershipForOrganization",
            Channel::MembersOfOrganization { .. } => "membersOfOrganization",
            Channel::OrganizationsOfUser { .. } => "organizationsOfUser",
        }
    }

    /// Run the channel's registered permission checks for `caller`.
    pub fn check_access(
        &self,
        permissions: &PermissionRegistry,
        caller: &Caller,
    ) -> Result<(), HookError> {
        match self {
            Channel::Organization { ids } => permissions.check_organization(ids, caller),
            Channel::MembershipForUser { user_id } => {
                permissions.check_membership_for_user(user_id, caller)
            }
            Channel::MembershipForOrganization { organization_id } => {
                permissions.check_membership_for_organization(organization_id, caller)
            }
            Channel::MembersOfOrganization { organization_id } => {
                permissions.check_members_of_organization(organization_id, caller)
            }
            Channel::OrganizationsOfUser { user_id } => {
                permissions.check_organizations_of_user(user_id, caller)
            }
        }
    }

    /// Compute the channel's current result set.
    pub async fn fetch(&self, service: &Arc<OrganizationService>) -> Result<Value, RpcError> {
        let result = match self {
            Channel::Organization { ids } => {
                serde_json::to_value(service.find_by_ids(ids).await?)
            }
            Channel::MembershipForUser { user_id } => {
                serde_json::to_value(service.memberships_for_user(user_id).await?)
            }
            Channel::MembershipForOrganization { organization_id } => {
                serde_json::to_value(service.memberships_for_organization(organization_id).await?)
            }
            Channel::MembersOfOrganization { organization_id } => {
                serde_json::to_value(service.members_in_organization(organization_id).await?)
            }
            Channel::OrganizationsOfUser { user_id } => {
                serde_json::to_value(service.organizations_of_user(user_id).await?)
            }
        };
        result.map_err(|e| RpcError::internal_error(format!("Failed to encode result: {}", e)))
    }

    /// Whether a domain event can change this channel's result set.
    ///
    /// Deliberately conservative: when relevance cannot be decided from the
    /// event alone (a user's organization set, say), the channel refreshes.
    /// A spurious refresh resends an unchanged result set; a missed one
    /// would leave the client stale.
    pub fn is_relevant(&self, event: &DomainEvent) -> bool {
        match self {
            Channel::Organization { ids } => match event {
                DomainEvent::OrganizationCreated(_)
                | DomainEvent::OrganizationUpdated { .. }
                | DomainEvent::OrganizationDeleted { .. } => {
                    ids.iter().any(|id| id == event.organization_id())
                }
                _ => false,
            },
            Channel::MembershipForUser { user_id } => match event {
                DomainEvent::MembershipUpserted(m) => m.user_id == *user_id,
                DomainEvent::MembershipsRemoved { user_ids, .. } => user_ids.contains(user_id),
                DomainEvent::PermissionsChanged { .. } => true,
                _ => false,
            },
            Channel::MembershipForOrganization { organization_id } => match event {
                DomainEvent::MembershipUpserted(_)
                | DomainEvent::MembershipsRemoved { .. }
                | DomainEvent::PermissionsChanged { .. } => {
                    event.organization_id() == organization_id
                }
                _ => false,
            },
            Channel::MembersOfOrganization { organization_id } => match event {
                DomainEvent::MembershipUpserted(_) | DomainEvent::MembershipsRemoved { .. } => {
                    event.organization_id() == organization_id
                }
                _ => false,
            },
            Channel::OrganizationsOfUser { user_id } => match event {
                DomainEvent::MembershipUpserted(m) => m.user_id == *user_id,
                DomainEvent::MembershipsRemoved { user_ids, .. } => user_ids.contains(user_id),
                DomainEvent::OrganizationUpdated { .. }
                | DomainEvent::OrganizationDeleted { .. } => true,
                _ => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Membership;
    use serde_json::json;

    #[test]
    fn test_parse_known_channels() {
        let channel = Channel::parse(json!({"channel": "organization", "ids": ["o1"]})).unwrap();
        assert_eq!(
            channel,
            Channel::Organization {
                ids: vec!["o1".to_string()]
            }
        );

        let channel = Channel::parse(
            json!({"channel": "membersOfOrganization", "organizationId": "o1"}),
        )
        .unwrap();
        assert_eq!(channel.name(), "membersOfOrganization");
    }

    #[test]
    fn test_parse_rejects_unknown_channel_and_missing_args() {
        let err = Channel::parse(json!({"channel": "everything"})).unwrap_err();
        assert_eq!(err.code, UNKNOWN_CHANNEL);

        let err = Channel::parse(json!({"channel": "organizationsOfUser"})).unwrap_err();
        assert_eq!(err.code, crate::rpc::types::INVALID_PARAMS);
    }

    #[test]
    fn test_relevance_filtering() {
        let channel = Channel::MembersOfOrganization {
            organization_id: "o1".to_string(),
        };

        let upsert = DomainEvent::MembershipUpserted(Membership {
            user_id: "u1".to_string(),
            organization: "o1".to_string(),
            permissions: vec![],
        });
        assert!(channel.is_relevant(&upsert));

        let other_org = DomainEvent::MembershipsRemoved {
            organization: "o2".to_string(),
            user_ids: vec!["u1".to_string()],
        };
        assert!(!channel.is_relevant(&other_org));

        let org_channel = Channel::Organization {
            ids: vec!["o1".to_string()],
        };
        assert!(org_channel.is_relevant(&DomainEvent::OrganizationDeleted {
            id: "o1".to_string()
        }));
        assert!(!org_channel.is_relevant(&upsert));
    }
}
