//! Service Layer
//!
//! `OrganizationService` owns the business rules: the six write entry points
//! with their hook pipelines, and the read accessors backing the
//! subscription channels. Hook and permission registries live in `hooks`.

mod error;
pub mod hooks;
mod organization_service;


pub use error::OrgServiceError;
pub use hooks::{Caller, HookError, HookRegistry, PermissionRegistry};
pub use organization_service::OrganizationService;
