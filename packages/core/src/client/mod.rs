//! Client Facade
//!
//! Typed wrappers over the six remote write methods. The facade validates
//! payloads locally before calling out, so obviously malformed input fails
//! fast without a round trip; the server validates again regardless.
//!
//! The transport is abstract: implement [`RpcTransport`] over whatever
//! carries JSON-RPC lines to the server (a child process's stdio, a socket,
//! an in-process loopback in tests).

use crate::config::OrgConfig;
use crate::models::{
    MemberDraft, MemberSelector, OrganizationCreate, OrganizationUpdate, PermissionChange,
    ValidationError,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// The payload failed local validation; no call was made
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The server answered with an error
    #[error("Remote error {code}: {message}")]
    Rpc { code: i32, message: String },

    /// The server's answer did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The transport itself failed
    #[error("Transport error: {0}")]
    Transport(String),
}

/// One round trip: send a method call, await its result value.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(&self, method: &str, params: Value) -> Result<Value, ClientError>;
}

/// Typed client over an [`RpcTransport`].
pub struct OrgClient<T: RpcTransport> {
    transport: T,
    config: OrgConfig,
}

impl<T: RpcTransport> OrgClient<T> {
    pub fn new(transport: T, config: OrgConfig) -> Self {
        Self { transport, config }
    }

    fn expect_string(value: Value) -> Result<String, ClientError> {
        value
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ClientError::InvalidResponse("expected a string result".to_string()))
    }

    fn expect_bool(value: Value) -> Result<bool, ClientError> {
        value
            .as_bool()
            .ok_or_else(|| ClientError::InvalidResponse("expected a boolean result".to_string()))
    }

    /// Create an organization; resolves to the new organization's id.
    pub async fn create_organization(
        &self,
        mut options: OrganizationCreate,
    ) -> Result<String, ClientError> {
        options.normalize();
        options.validate(&self.config)?;
        let result = self
            .transport
            .call("organization/create", serde_json::to_value(&options).unwrap_or(json!({})))
            .await?;
        Self::expect_string(result)
    }

    pub async fn update_organization(
        &self,
        id: &str,
        changes: OrganizationUpdate,
    ) -> Result<bool, ClientError> {
        changes.validate(&self.config)?;
        let result = self
            .transport
            .call(
                "organization/update",
                json!({"id": id, "options": changes}),
            )
            .await?;
        Self::expect_bool(result)
    }

    pub async fn delete_organization(&self, id: &str) -> Result<bool, ClientError> {
        let result = self
            .transport
            .call("organization/delete", json!({"id": id}))
            .await?;
        Self::expect_bool(result)
    }

    pub async fn add_members(
        &self,
        id: &str,
        members: Vec<MemberDraft>,
    ) -> Result<bool, ClientError> {
        let result = self
            .transport
            .call(
                "organization/addMembers",
                json!({"id": id, "members": members}),
            )
            .await?;
        Self::expect_bool(result)
    }

    pub async fn remove_members(
        &self,
        id: &str,
        user_ids: Vec<String>,
    ) -> Result<bool, ClientError> {
        let result = self
            .transport
            .call(
                "organization/removeMembers",
                json!({"id": id, "userIds": user_ids}),
            )
            .await?;
        Self::expect_bool(result)
    }

    /// Change member permissions. Resolves to `false` only when the server
    /// treated the change as a no-op.
    pub async fn change_permissions(
        &self,
        id: &str,
        selector: MemberSelector,
        change: PermissionChange,
    ) -> Result<bool, ClientError> {
        selector.validate()?;
        let result = self
            .transport
            .call(
                "organization/changePermissions",
                json!({"id": id, "selector": selector, "permissions": change}),
            )
            .await?;
        Self::expect_bool(result)
    }
}
