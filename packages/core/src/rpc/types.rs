//! JSON-RPC Protocol Types
//!
//! Request/response/notification shapes for the stdio transport, plus the
//! error-code space. One extension over plain JSON-RPC 2.0: requests may
//! carry a `caller` field naming the authenticated user on whose behalf the
//! host application forwards the call.

use crate::services::hooks::HookError;
use crate::services::OrgServiceError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,

    #[serde(default)]
    pub params: Value,

    /// User id the host attributes the call to; absent means anonymous
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller: Option<String>,
}

/// JSON-RPC 2.0 response.
///
/// `id` is `None` (serialized as `null`) only when the request id could not
/// be determined, i.e. the incoming line failed to parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,

    #[serde(default)]
    pub id: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: impl Into<Option<u64>>, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.into(),
            result: None,
            error: Some(error),
        }
    }
}

/// Server-initiated notification (no id, expects no reply). Used to push
/// subscription refreshes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
}

impl RpcNotification {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// Standard JSON-RPC 2.0 error codes
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

// Application error codes
pub const VALIDATION_ERROR: i32 = -32000;
pub const ACCESS_DENIED: i32 = -32001;
pub const STORE_ERROR: i32 = -32002;
pub const SUBSCRIPTION_NOT_FOUND: i32 = -32003;
pub const UNKNOWN_CHANNEL: i32 = -32004;

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(code: i32, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(PARSE_ERROR, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(INVALID_REQUEST, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("Method not found: {}", method))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }
}

impl From<OrgServiceError> for RpcError {
    fn from(err: OrgServiceError) -> Self {
        match &err {
            OrgServiceError::Validation(_) => RpcError::new(VALIDATION_ERROR, err.to_string()),
            OrgServiceError::Hook(HookError::Unauthorized(_)) => {
                RpcError::new(ACCESS_DENIED, err.to_string())
            }
            OrgServiceError::Hook(HookError::Rejected(_)) => {
                RpcError::new(ACCESS_DENIED, err.to_string())
            }
            OrgServiceError::Store(_) => RpcError::new(STORE_ERROR, err.to_string()),
        }
    }
}

impl From<HookError> for RpcError {
    fn from(err: HookError) -> Self {
        RpcError::new(ACCESS_DENIED, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ValidationError;
    use serde_json::json;

    #[test]
    fn test_request_caller_defaults_to_anonymous() {
        let req: RpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "organization/create",
            "params": {"name": "Acme"}
        }))
        .unwrap();
        assert!(req.caller.is_none());
        assert_eq!(req.params["name"], "Acme");
    }

    #[test]
    fn test_success_response_omits_error_field() {
        let response = RpcResponse::success(7, json!(true));
        let encoded = serde_json::to_string(&response).unwrap();
        assert!(!encoded.contains("error"));
        assert!(encoded.contains("\"result\":true"));
    }

    #[test]
    fn test_parse_failure_response_carries_null_id() {
        let response = RpcResponse::error(None, RpcError::parse_error("bad line"));
        let encoded = serde_json::to_value(&response).unwrap();
        assert_eq!(encoded["id"], serde_json::Value::Null);
        assert_eq!(encoded["error"]["code"], PARSE_ERROR);
    }

    #[test]
    fn test_service_error_mapping() {
        let err: RpcError =
            OrgServiceError::Validation(ValidationError::MissingField("name".to_string())).into();
        assert_eq!(err.code, VALIDATION_ERROR);

        let err: RpcError =
            OrgServiceError::Hook(HookError::Unauthorized("no".to_string())).into();
        assert_eq!(err.code, ACCESS_DENIED);
    }
}
