//! Orgspace Core
//!
//! This crate provides organization and membership management as an embeddable
//! data layer: organizations users can belong to, join rows carrying permission
//! sets, and an extensible before/after hook system used for authorization and
//! notification side effects.
//!
//! # Architecture
//!
//! ```text
//! Host application
//!   ├─ rpc (JSON-RPC 2.0 over stdio: methods + subscriptions)
//!   │     └─ OrganizationService ─→ OrgStore / UserStore (libsql)
//!   │           ├─ HookRegistry (before/after write hooks)
//!   │           └─ DomainEvent broadcast (drives subscriptions)
//!   ├─ PermissionRegistry (gates read channels at subscribe time)
//!   └─ client (pre-validating facade over any RpcTransport)
//! ```
//!
//! # Modules
//!
//! - [`models`] - Data contracts (Organization, Membership) and validation
//! - [`db`] - Store traits, libsql implementation, domain events
//! - [`services`] - OrganizationService, hook and permission registries
//! - [`rpc`] - JSON-RPC transport adapter (write methods, read subscriptions)
//! - [`client`] - Client facade that fails fast on invalid input
//! - [`config`] - Runtime configuration (name minimum, public user fields)

pub mod client;
pub mod config;
pub mod db;
pub mod models;
pub mod rpc;
pub mod services;

// Re-export commonly used types
pub use config::OrgConfig;
pub use db::{DatabaseService, DomainEvent, OrgStore, TursoStore, UserStore};
pub use models::{
    MemberDraft, MemberSelector, Membership, Organization, OrganizationCreate, OrganizationUpdate,
    PermissionChange, ValidationError,
};
pub use services::{Caller, HookError, HookRegistry, OrganizationService, PermissionRegistry};
