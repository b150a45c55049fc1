//! Database Connection Management
//!
//! Core connection handling and schema initialization over libsql.
//!
//! # Architecture
//!
//! - **Path-agnostic**: accepts any valid path, including `:memory:`
//! - **Idempotent schema**: `CREATE TABLE IF NOT EXISTS`, safe to re-run
//! - **WAL mode**: Write-Ahead Logging for better concurrency
//! - **Busy timeout**: concurrent operations wait instead of failing with
//!   `SQLITE_BUSY`
//!
//! In async contexts always obtain connections through
//! `connect_with_timeout()`: the Tokio runtime moves futures between threads
//! at `.await` points and the busy timeout makes concurrent statements
//! serialize gracefully.
//!
//! The SQL in this module is deliberately free of business rules - the
//! `deletedAt IS NULL` targeting filter is the one semantic it owns, because
//! the update/delete entry points are defined in terms of it.

use crate::db::error::DatabaseError;
use libsql::{Builder, Database};
use std::path::PathBuf;
use std::sync::Arc;

/// Database service managing the libsql connection and schema.
///
/// # Examples
///
/// ```no_run
/// use orgspace_core::db::DatabaseService;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db = DatabaseService::new(PathBuf::from("./data/orgspace.db")).await?;
///     let _conn = db.connect_with_timeout().await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,
}

impl DatabaseService {
    /// Open (or create) the database at `db_path` and initialize the schema.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the parent directory cannot be created,
    /// the connection fails, or schema initialization fails.
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        // Ensure parent directory exists (skip for :memory: style paths)
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
        };

        service.initialize_schema().await?;

        Ok(service)
    }

    /// Execute a PRAGMA statement.
    ///
    /// PRAGMA statements return rows, so query() must be used instead of
    /// execute().
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Initialize database schema and configuration.
    ///
    /// # Schema
    ///
    /// - `organizations`: soft-deletable organization documents
    /// - `memberships`: one row per (user_id, organization) pair, the upsert
    ///   key addMembers relies on
    /// - `users`: the host application's account table; this package only
    ///   ever reads ids and the profile JSON from it
    async fn initialize_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;
        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS organizations (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                deleted_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!(
                "Failed to create organizations table: {}",
                e
            ))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS memberships (
                user_id TEXT NOT NULL,
                organization TEXT NOT NULL,
                permissions JSON NOT NULL DEFAULT '[]',
                PRIMARY KEY (user_id, organization)
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!(
                "Failed to create memberships table: {}",
                e
            ))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                profile JSON NOT NULL DEFAULT '{}'
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!("Failed to create users table: {}", e))
        })?;

        self.create_core_indexes(&conn).await?;

        Ok(())
    }

    /// Create core indexes. These never change, so no migration machinery is
    /// needed on host machines.
    async fn create_core_indexes(&self, conn: &libsql::Connection) -> Result<(), DatabaseError> {
        for (name, sql) in [
            (
                "idx_memberships_organization",
                "CREATE INDEX IF NOT EXISTS idx_memberships_organization
                 ON memberships(organization)",
            ),
            (
                "idx_memberships_user",
                "CREATE INDEX IF NOT EXISTS idx_memberships_user ON memberships(user_id)",
            ),
            (
                "idx_organizations_deleted",
                "CREATE INDEX IF NOT EXISTS idx_organizations_deleted
                 ON organizations(deleted_at)",
            ),
        ] {
            conn.execute(sql, ()).await.map_err(|e| {
                DatabaseError::initialization_failed(format!(
                    "Failed to create index '{}': {}",
                    name, e
                ))
            })?;
        }
        Ok(())
    }

    /// Get a synchronous connection to the database.
    ///
    /// Prefer `connect_with_timeout()` in async code.
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get a connection with the busy timeout configured.
    ///
    /// This is the safe default for all async callers: with a 5 second busy
    /// timeout, concurrent statements wait and retry instead of failing
    /// immediately when the database is locked.
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;
        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;
        Ok(conn)
    }

    //
    // ORGANIZATION SQL
    //

    /// Insert an organization row.
    pub async fn db_insert_organization(
        &self,
        id: &str,
        name: &str,
        description: &str,
        created_at: &str,
        updated_at: &str,
    ) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        conn.execute(
            "INSERT INTO organizations (id, name, description, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
            (id, name, description, created_at, updated_at),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to insert organization: {}", e))
        })?;
        Ok(())
    }

    /// Update name/description of an active organization.
    ///
    /// Always issues the statement - an update with neither field present
    /// still targets the row (and still bumps `updated_at`). Returns the
    /// matched row count; zero matches is not an error.
    pub async fn db_update_organization(
        &self,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
        updated_at: &str,
    ) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        let matched = conn
            .execute(
                "UPDATE organizations
                 SET name = COALESCE(?, name),
                     description = COALESCE(?, description),
                     updated_at = ?
                 WHERE id = ? AND deleted_at IS NULL",
                (name, description, updated_at, id),
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to update organization: {}", e))
            })?;
        Ok(matched)
    }

    /// Soft-delete an active organization by stamping `deleted_at`.
    pub async fn db_soft_delete_organization(
        &self,
        id: &str,
        deleted_at: &str,
    ) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        let matched = conn
            .execute(
                "UPDATE organizations
                 SET deleted_at = ?, updated_at = ?
                 WHERE id = ? AND deleted_at IS NULL",
                (deleted_at, deleted_at, id),
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to soft-delete organization: {}", e))
            })?;
        Ok(matched)
    }

    /// Fetch an organization row by id. Deliberately does not filter on
    /// `deleted_at` - soft deletion is a convention of the write entry
    /// points, not a store-level constraint.
    pub async fn db_get_organization(
        &self,
        id: &str,
    ) -> Result<Option<libsql::Row>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        let mut stmt = conn
            .prepare(
                "SELECT id, name, description, deleted_at, created_at, updated_at
                 FROM organizations WHERE id = ?",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!(
                    "Failed to prepare get_organization query: {}",
                    e
                ))
            })?;

        let mut rows = stmt.query([id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute get_organization query: {}", e))
        })?;

        rows.next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))
    }

    //
    // MEMBERSHIP SQL
    //

    /// Upsert a membership keyed on (user_id, organization).
    ///
    /// A conflicting row gets its permission set overwritten - not merged -
    /// so permissions never silently accumulate across repeated adds.
    pub async fn db_upsert_membership(
        &self,
        user_id: &str,
        organization: &str,
        permissions_json: &str,
    ) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        let changed = conn
            .execute(
                "INSERT INTO memberships (user_id, organization, permissions)
                 VALUES (?, ?, ?)
                 ON CONFLICT(user_id, organization)
                 DO UPDATE SET permissions = excluded.permissions",
                (user_id, organization, permissions_json),
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to upsert membership: {}", e))
            })?;
        Ok(changed)
    }

    /// Remove one membership row. Returns the removed count (0 or 1).
    pub async fn db_remove_membership(
        &self,
        organization: &str,
        user_id: &str,
    ) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        let removed = conn
            .execute(
                "DELETE FROM memberships WHERE organization = ? AND user_id = ?",
                (organization, user_id),
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to remove membership: {}", e))
            })?;
        Ok(removed)
    }

    /// Overwrite the permission set of one membership row.
    pub async fn db_set_membership_permissions(
        &self,
        organization: &str,
        user_id: &str,
        permissions_json: &str,
    ) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        let changed = conn
            .execute(
                "UPDATE memberships SET permissions = ?
                 WHERE organization = ? AND user_id = ?",
                (permissions_json, organization, user_id),
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!(
                    "Failed to update membership permissions: {}",
                    e
                ))
            })?;
        Ok(changed)
    }

    /// Fetch all membership rows for an organization.
    pub async fn db_memberships_for_organization(
        &self,
        organization: &str,
    ) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        let mut stmt = conn
            .prepare(
                "SELECT user_id, organization, permissions
                 FROM memberships WHERE organization = ?",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!(
                    "Failed to prepare memberships_for_organization query: {}",
                    e
                ))
            })?;
        stmt.query([organization]).await.map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to execute memberships_for_organization query: {}",
                e
            ))
        })
    }

    /// Fetch all membership rows for a user.
    pub async fn db_memberships_for_user(
        &self,
        user_id: &str,
    ) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        let mut stmt = conn
            .prepare(
                "SELECT user_id, organization, permissions
                 FROM memberships WHERE user_id = ?",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!(
                    "Failed to prepare memberships_for_user query: {}",
                    e
                ))
            })?;
        stmt.query([user_id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to execute memberships_for_user query: {}",
                e
            ))
        })
    }

    //
    // USER SQL
    //

    /// Check whether a user id exists in the host account table.
    pub async fn db_user_exists(&self, user_id: &str) -> Result<bool, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        let mut stmt = conn
            .prepare("SELECT 1 FROM users WHERE id = ?")
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare user_exists query: {}", e))
            })?;
        let mut rows = stmt.query([user_id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute user_exists query: {}", e))
        })?;
        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?;
        Ok(row.is_some())
    }

    /// Fetch a user row (id + profile JSON).
    pub async fn db_get_user(&self, user_id: &str) -> Result<Option<libsql::Row>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        let mut stmt = conn
            .prepare("SELECT id, profile FROM users WHERE id = ?")
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare get_user query: {}", e))
            })?;
        let mut rows = stmt.query([user_id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute get_user query: {}", e))
        })?;
        rows.next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))
    }

    /// Insert (or replace) a user row.
    ///
    /// Integration point for host applications embedding this package with
    /// the bundled store; production setups point `UserStore` at their own
    /// account table instead.
    pub async fn db_insert_user(
        &self,
        user_id: &str,
        profile_json: &str,
    ) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        conn.execute(
            "INSERT INTO users (id, profile) VALUES (?, ?)
             ON CONFLICT(id) DO UPDATE SET profile = excluded.profile",
            (user_id, profile_json),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to insert user: {}", e)))?;
        Ok(())
    }
}
