//! JSON-RPC Transport
//!
//! Remote surface of the package: write methods, subscribe/unsubscribe, and
//! the subscription notification stream, all as line-delimited JSON-RPC 2.0
//! over stdio.

pub mod handlers;
pub mod server;
pub mod types;

pub use server::{init_tracing, run_rpc_server, run_rpc_server_with_callback, ResponseCallback};
pub use types::{RpcError, RpcNotification, RpcRequest, RpcResponse};
