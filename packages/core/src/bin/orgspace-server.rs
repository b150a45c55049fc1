//! Standalone Organization RPC Server
//!
//! Runs the JSON-RPC 2.0 server over stdio against the bundled libsql store.
//! Host applications embedding the crate wire their own hooks and permission
//! checks; this binary starts with empty registries, so every method is open.
//!
//! # Usage
//!
//! ```bash
//! ORGSPACE_DB_PATH=./data/orgspace.db cargo run --bin orgspace-server
//! ```
//!
//! Logs go to stderr (`RUST_LOG` controls the filter); stdout carries the
//! protocol.

use orgspace_core::config::OrgConfig;
use orgspace_core::db::{DatabaseService, TursoStore};
use orgspace_core::rpc::{init_tracing, run_rpc_server};
use orgspace_core::{HookRegistry, OrganizationService, PermissionRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let db_path = std::env::var("ORGSPACE_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./data/orgspace.db"));
    let config = OrgConfig::from_env();

    info!("Opening database at {}", db_path.display());
    let db = DatabaseService::new(db_path).await?;
    let store = Arc::new(TursoStore::new(Arc::new(db)));

    let service = Arc::new(OrganizationService::new(
        store.clone(),
        store,
        config,
        HookRegistry::new(),
    ));
    let permissions = Arc::new(PermissionRegistry::new());

    run_rpc_server(service, permissions).await?;
    Ok(())
}
