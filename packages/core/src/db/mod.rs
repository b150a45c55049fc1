//! Database Layer
//!
//! Storage for the two collections this package owns (organizations,
//! memberships) plus read access to the host application's user table:
//!
//! - `DatabaseService` - libsql connection management and schema init
//! - `OrgStore` / `UserStore` - async trait abstractions over the store
//! - `TursoStore` - libsql implementation of both traits
//! - `DomainEvent` - change notifications consumed by live subscriptions
//!
//! # Architecture
//!
//! Business logic in `OrganizationService` only ever talks to the traits, so
//! a host application can substitute its own document store (the upstream
//! system sat on a managed MongoDB). The bundled `TursoStore` keeps the
//! package self-contained: an embedded libsql database, `:memory:` friendly
//! for tests.

mod database;
mod error;
pub mod events;
mod org_store;
mod turso_store;

pub use database::DatabaseService;
pub use error::DatabaseError;
pub use events::DomainEvent;
pub use org_store::{OrgStore, PublicUser, UserStore};
pub use turso_store::TursoStore;
