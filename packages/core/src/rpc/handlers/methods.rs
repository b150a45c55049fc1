//! Write Method Handlers
//!
//! One handler per write entry point. Params are the JSON payloads the
//! remote client supplies; results are the raw return values of the service
//! (the new id for create, booleans everywhere else).

use crate::models::{
    MemberDraft, MemberSelector, OrganizationCreate, OrganizationUpdate, PermissionChange,
};
use crate::rpc::types::RpcError;
use crate::services::hooks::Caller;
use crate::services::OrganizationService;
use serde_json::{json, Value};
use std::sync::Arc;

fn required_str(params: &Value, field: &str) -> Result<String, RpcError> {
    params
        .get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| RpcError::invalid_params(format!("Missing required parameter: {}", field)))
}

/// `organization/create` - params are the create payload itself.
pub async fn handle_create(
    service: &Arc<OrganizationService>,
    params: Value,
    caller: &Caller,
) -> Result<Value, RpcError> {
    let options: OrganizationCreate = serde_json::from_value(params)
        .map_err(|e| RpcError::invalid_params(format!("Invalid create payload: {}", e)))?;
    let id = service.create(options, caller).await?;
    Ok(json!(id))
}

/// `organization/update` - params: `{id, options}`.
pub async fn handle_update(
    service: &Arc<OrganizationService>,
    params: Value,
    caller: &Caller,
) -> Result<Value, RpcError> {
    let id = required_str(&params, "id")?;
    let changes: OrganizationUpdate =
        serde_json::from_value(params.get("options").cloned().unwrap_or(json!({})))
            .map_err(|e| RpcError::invalid_params(format!("Invalid update payload: {}", e)))?;
    let ok = service.update(&id, changes, caller).await?;
    Ok(json!(ok))
}

/// `organization/delete` - params: `{id}`.
pub async fn handle_delete(
    service: &Arc<OrganizationService>,
    params: Value,
    caller: &Caller,
) -> Result<Value, RpcError> {
    let id = required_str(&params, "id")?;
    let ok = service.delete(&id, caller).await?;
    Ok(json!(ok))
}

/// `organization/addMembers` - params: `{id, members}`.
///
/// Member entries are parsed leniently, matching the service's cleaning
/// rules: an entry that does not even deserialize as an object is dropped
/// rather than failing the call.
pub async fn handle_add_members(
    service: &Arc<OrganizationService>,
    params: Value,
    caller: &Caller,
) -> Result<Value, RpcError> {
    let id = required_str(&params, "id")?;
    let raw_members = params
        .get("members")
        .and_then(|v| v.as_array())
        .cloned()
        .ok_or_else(|| RpcError::invalid_params("Missing required parameter: members"))?;

    let members: Vec<MemberDraft> = raw_members
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect();

    let ok = service.add_members(&id, members, caller).await?;
    Ok(json!(ok))
}

/// `organization/removeMembers` - params: `{id, userIds}`.
pub async fn handle_remove_members(
    service: &Arc<OrganizationService>,
    params: Value,
    caller: &Caller,
) -> Result<Value, RpcError> {
    let id = required_str(&params, "id")?;
    let user_ids: Vec<String> =
        serde_json::from_value(params.get("userIds").cloned().unwrap_or(json!([])))
            .map_err(|e| RpcError::invalid_params(format!("Invalid userIds: {}", e)))?;
    let ok = service.remove_members(&id, user_ids, caller).await?;
    Ok(json!(ok))
}

/// `organization/changePermissions` - params: `{id, selector, permissions}`.
pub async fn handle_change_permissions(
    service: &Arc<OrganizationService>,
    params: Value,
    caller: &Caller,
) -> Result<Value, RpcError> {
    let id = required_str(&params, "id")?;
    let selector: MemberSelector =
        serde_json::from_value(params.get("selector").cloned().unwrap_or(json!({})))
            .map_err(|e| RpcError::invalid_params(format!("Invalid selector: {}", e)))?;
    let change: PermissionChange =
        serde_json::from_value(params.get("permissions").cloned().unwrap_or(json!({})))
            .map_err(|e| RpcError::invalid_params(format!("Invalid permissions change: {}", e)))?;
    let ok = service.change_permissions(&id, selector, change, caller).await?;
    Ok(json!(ok))
}
