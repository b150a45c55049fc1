//! JSON-RPC Server
//!
//! Line-delimited JSON-RPC 2.0 over stdin/stdout. Each line in is one
//! request; each line out is one response or subscription notification.
//! Responses and notifications share a single writer task fed over an mpsc
//! channel, so a subscription refresh can never interleave with a response
//! mid-line.
//!
//! An optional `ResponseCallback` mirrors every outgoing message to the
//! host; embedding applications use it instead of capturing stdout.

use crate::rpc::handlers::{methods, subscriptions::Channel};
use crate::rpc::types::{
    RpcError, RpcNotification, RpcRequest, RpcResponse, SUBSCRIPTION_NOT_FOUND,
};
use crate::services::hooks::{Caller, PermissionRegistry};
use crate::services::OrganizationService;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::EnvFilter;

/// Callback invoked with (method, payload) for every outgoing message.
pub type ResponseCallback = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Install the tracing subscriber. Log output goes to stderr so stdout
/// stays reserved for the protocol.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

/// Notification method used for subscription refreshes.
const SUBSCRIPTION_METHOD: &str = "organization/subscription";

struct SubscriptionHandle {
    channel_name: &'static str,
    task: tokio::task::JoinHandle<()>,
}

/// Shared server state: the live subscriptions and the outgoing writer.
struct ServerState {
    service: Arc<OrganizationService>,
    permissions: Arc<PermissionRegistry>,
    subscriptions: Mutex<HashMap<u64, SubscriptionHandle>>,
    next_subscription_id: AtomicU64,
    out_tx: mpsc::UnboundedSender<String>,
    callback: Option<ResponseCallback>,
}

impl ServerState {
    fn send(&self, method: &str, payload: Value) {
        if let Some(callback) = &self.callback {
            callback(method, &payload);
        }
        match serde_json::to_string(&payload) {
            Ok(line) => {
                if self.out_tx.send(line).is_err() {
                    warn!("Writer task gone; dropping outgoing message");
                }
            }
            Err(e) => error!("Failed to encode outgoing message: {}", e),
        }
    }

    fn send_response(&self, request_method: &str, response: RpcResponse) {
        match serde_json::to_value(&response) {
            Ok(payload) => self.send(request_method, payload),
            Err(e) => error!("Failed to encode response: {}", e),
        }
    }
}

/// Run the server over stdin/stdout until stdin closes.
pub async fn run_rpc_server(
    service: Arc<OrganizationService>,
    permissions: Arc<PermissionRegistry>,
) -> std::io::Result<()> {
    run_rpc_server_with_callback(service, permissions, None).await
}

/// Run the server, mirroring outgoing messages to `callback` when given.
pub async fn run_rpc_server_with_callback(
    service: Arc<OrganizationService>,
    permissions: Arc<PermissionRegistry>,
    callback: Option<ResponseCallback>,
) -> std::io::Result<()> {
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = out_rx.recv().await {
            if stdout.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if stdout.write_all(b"\n").await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    let state = Arc::new(ServerState {
        service,
        permissions,
        subscriptions: Mutex::new(HashMap::new()),
        next_subscription_id: AtomicU64::new(1),
        out_tx,
        callback,
    });

    info!("RPC server listening on stdio");

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        let state = state.clone();
        tokio::spawn(async move {
            handle_line(&state, &line).await;
        });
    }

    // stdin closed: tear down live subscriptions, then the writer
    let mut subs = state.subscriptions.lock().await;
    for (_, handle) in subs.drain() {
        handle.task.abort();
    }
    drop(subs);
    drop(state);
    let _ = writer.await;

    info!("RPC server shut down");
    Ok(())
}

async fn handle_line(state: &Arc<ServerState>, line: &str) {
    let request: RpcRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            // No id recoverable from a parse failure; answer with a null id
            let response = RpcResponse::error(None, RpcError::parse_error(e.to_string()));
            state.send_response("parse", response);
            return;
        }
    };
    let response = handle_request(state, request).await;
    state.send_response("response", response);
}

#[instrument(skip(state, request), fields(method = %request.method, id = request.id))]
async fn handle_request(state: &Arc<ServerState>, request: RpcRequest) -> RpcResponse {
    if request.jsonrpc != "2.0" {
        return RpcResponse::error(
            request.id,
            RpcError::invalid_request("Expected jsonrpc version 2.0"),
        );
    }

    let caller = match &request.caller {
        Some(user_id) => Caller::user(user_id.clone()),
        None => Caller::anonymous(),
    };
    debug!("Dispatching request");

    let result = match request.method.as_str() {
        "organization/create" => {
            methods::handle_create(&state.service, request.params, &caller).await
        }
        "organization/update" => {
            methods::handle_update(&state.service, request.params, &caller).await
        }
        "organization/delete" => {
            methods::handle_delete(&state.service, request.params, &caller).await
        }
        "organization/addMembers" => {
            methods::handle_add_members(&state.service, request.params, &caller).await
        }
        "organization/removeMembers" => {
            methods::handle_remove_members(&state.service, request.params, &caller).await
        }
        "organization/changePermissions" => {
            methods::handle_change_permissions(&state.service, request.params, &caller).await
        }
        "organization/subscribe" => handle_subscribe(state, request.params, &caller).await,
        "organization/unsubscribe" => handle_unsubscribe(state, request.params).await,
        other => Err(RpcError::method_not_found(other)),
    };

    match result {
        Ok(value) => RpcResponse::success(request.id, value),
        Err(error) => {
            warn!("Request failed: {} ({})", error.message, error.code);
            RpcResponse::error(request.id, error)
        }
    }
}

/// Set up a subscription: check access once, answer with the current result
/// set, then push refreshes on relevant domain events.
async fn handle_subscribe(
    state: &Arc<ServerState>,
    params: Value,
    caller: &Caller,
) -> Result<Value, RpcError> {
    let channel = Channel::parse(params)?;
    channel.check_access(&state.permissions, caller)?;

    let initial = channel.fetch(&state.service).await?;
    let subscription_id = state.next_subscription_id.fetch_add(1, Ordering::SeqCst);

    let task_state = state.clone();
    let task_channel = channel.clone();
    let task = tokio::spawn(async move {
        let mut events = BroadcastStream::new(task_state.service.subscribe_events());
        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                // Lagged receiver: skipped events would have triggered a
                // refresh anyway, the next fetch picks up their effects
                Err(_) => continue,
            };
            if !task_channel.is_relevant(&event) {
                continue;
            }
            match task_channel.fetch(&task_state.service).await {
                Ok(result) => {
                    let notification = RpcNotification::new(
                        SUBSCRIPTION_METHOD,
                        json!({
                            "subscriptionId": subscription_id,
                            "channel": task_channel.name(),
                            "event": event.event_type(),
                            "result": result,
                        }),
                    );
                    match serde_json::to_value(&notification) {
                        Ok(payload) => task_state.send(SUBSCRIPTION_METHOD, payload),
                        Err(e) => error!("Failed to encode notification: {}", e),
                    }
                }
                Err(e) => warn!(
                    "Subscription {} refresh failed: {}",
                    subscription_id, e.message
                ),
            }
        }
    });

    let channel_name = channel.name();
    state.subscriptions.lock().await.insert(
        subscription_id,
        SubscriptionHandle { channel_name, task },
    );
    info!(
        "Subscription {} established on channel {}",
        subscription_id, channel_name
    );

    Ok(json!({
        "subscriptionId": subscription_id,
        "result": initial,
    }))
}

async fn handle_unsubscribe(state: &Arc<ServerState>, params: Value) -> Result<Value, RpcError> {
    let subscription_id = params
        .get("subscriptionId")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| RpcError::invalid_params("Missing required parameter: subscriptionId"))?;

    match state.subscriptions.lock().await.remove(&subscription_id) {
        Some(handle) => {
            handle.task.abort();
            info!(
                "Subscription {} on channel {} closed",
                subscription_id, handle.channel_name
            );
            Ok(json!(true))
        }
        None => Err(RpcError::new(
            SUBSCRIPTION_NOT_FOUND,
            format!("Unknown subscription: {}", subscription_id),
        )),
    }
}
