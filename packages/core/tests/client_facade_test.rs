//! Client facade: local validation short-circuits, calls go over the wire
//! with the server's parameter shapes.

use async_trait::async_trait;
use orgspace_core::client::{ClientError, OrgClient, RpcTransport};
use orgspace_core::config::OrgConfig;
use orgspace_core::models::{
    MemberSelector, OrganizationCreate, OrganizationUpdate, PermissionChange,
};
use serde_json::{json, Value};
use std::sync::Mutex;

/// Transport that records calls and replays canned responses.
struct FakeTransport {
    calls: Mutex<Vec<(String, Value)>>,
    response: Value,
}

impl FakeTransport {
    fn returning(response: Value) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            response,
        }
    }

    fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RpcTransport for &FakeTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params));
        Ok(self.response.clone())
    }
}

#[tokio::test]
async fn test_create_normalizes_and_sends_payload() {
    let transport = FakeTransport::returning(json!("org-1"));
    let client = OrgClient::new(&transport, OrgConfig::default());

    let id = client
        .create_organization(OrganizationCreate::new("Acme"))
        .await
        .unwrap();
    assert_eq!(id, "org-1");

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "organization/create");
    // Normalization filled in the empty description before sending
    assert_eq!(calls[0].1, json!({"name": "Acme", "description": ""}));
}

#[tokio::test]
async fn test_invalid_input_never_reaches_the_transport() {
    let transport = FakeTransport::returning(json!(true));
    let config = OrgConfig {
        min_name_length: 3,
        ..OrgConfig::default()
    };
    let client = OrgClient::new(&transport, config);

    let err = client
        .create_organization(OrganizationCreate::new("ab"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));

    let err = client
        .update_organization(
            "o1",
            OrganizationUpdate {
                name: Some("x".to_string()),
                description: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));

    let err = client
        .change_permissions(
            "o1",
            MemberSelector {
                except: Some(vec!["u1".to_string()]),
                only: Some(vec!["u2".to_string()]),
            },
            PermissionChange::add(vec!["read".to_string()]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));

    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_write_methods_use_server_parameter_shapes() {
    let transport = FakeTransport::returning(json!(true));
    let client = OrgClient::new(&transport, OrgConfig::default());

    assert!(client.delete_organization("o1").await.unwrap());
    assert!(client
        .remove_members("o1", vec!["u1".to_string()])
        .await
        .unwrap());
    assert!(client
        .change_permissions(
            "o1",
            MemberSelector::only(vec!["u1".to_string()]),
            PermissionChange::set(vec!["read".to_string()]),
        )
        .await
        .unwrap());

    let calls = transport.calls();
    assert_eq!(calls[0].0, "organization/delete");
    assert_eq!(calls[0].1, json!({"id": "o1"}));
    assert_eq!(calls[1].0, "organization/removeMembers");
    assert_eq!(calls[1].1, json!({"id": "o1", "userIds": ["u1"]}));
    assert_eq!(calls[2].0, "organization/changePermissions");
    assert_eq!(
        calls[2].1,
        json!({
            "id": "o1",
            "selector": {"only": ["u1"]},
            "permissions": {"set": ["read"]},
        })
    );
}

#[tokio::test]
async fn test_unexpected_result_shape_is_an_error() {
    let transport = FakeTransport::returning(json!({"weird": true}));
    let client = OrgClient::new(&transport, OrgConfig::default());

    let err = client.delete_organization("o1").await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidResponse(_)));
}
