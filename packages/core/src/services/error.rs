//! Service Error Types
//!
//! The failure modes of the write entry points: schema validation, hook
//! vetoes, and store failures. Each variant maps to its own wire error code
//! at the RPC boundary.

use crate::db::DatabaseError;
use crate::models::ValidationError;
use crate::services::hooks::HookError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrgServiceError {
    /// The payload failed schema validation
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A before-hook or permission check vetoed the invocation
    #[error(transparent)]
    Hook(#[from] HookError),

    /// The store operation failed
    #[error(transparent)]
    Store(#[from] DatabaseError),
}
