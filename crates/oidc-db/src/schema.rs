//! Schema definitions and migration runner for SurrealDB.
//!
//! All tables are SCHEMAFULL. UUIDs are stored as strings; an
//! authorization code is its own record id so that marking it used is
//! a single conditional update on one record.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "expiry_indexes",
        sql: SCHEMA_V2,
    },
];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Clients
-- =======================================================================
DEFINE TABLE client SCHEMAFULL;
DEFINE FIELD client_id ON TABLE client TYPE string;
DEFINE FIELD client_secret_hash ON TABLE client TYPE string;
DEFINE FIELD name ON TABLE client TYPE string;
DEFINE FIELD redirect_uris ON TABLE client TYPE array<string>;
DEFINE FIELD grant_types ON TABLE client TYPE array<string>;
DEFINE FIELD response_types ON TABLE client TYPE array<string>;
DEFINE FIELD scopes ON TABLE client TYPE array<string>;
DEFINE FIELD logo_url ON TABLE client TYPE option<string>;
DEFINE FIELD created_at ON TABLE client TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE client TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_client_client_id ON TABLE client \
    COLUMNS client_id UNIQUE;

-- =======================================================================
-- Users
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD name ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD email_verified ON TABLE user TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;

-- =======================================================================
-- Sessions
-- =======================================================================
DEFINE TABLE session SCHEMAFULL;
DEFINE FIELD user_id ON TABLE session TYPE string;
DEFINE FIELD expires_at ON TABLE session TYPE datetime;
DEFINE FIELD created_at ON TABLE session TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_session_user ON TABLE session COLUMNS user_id;

-- =======================================================================
-- Authorization codes (record id = code)
-- =======================================================================
DEFINE TABLE authorization_code SCHEMAFULL;
DEFINE FIELD client_id ON TABLE authorization_code TYPE string;
DEFINE FIELD user_id ON TABLE authorization_code TYPE string;
DEFINE FIELD redirect_uri ON TABLE authorization_code TYPE string;
DEFINE FIELD scopes ON TABLE authorization_code TYPE array<string>;
DEFINE FIELD nonce ON TABLE authorization_code TYPE option<string>;
DEFINE FIELD code_challenge ON TABLE authorization_code \
    TYPE option<string>;
DEFINE FIELD code_challenge_method ON TABLE authorization_code \
    TYPE option<string>;
DEFINE FIELD used ON TABLE authorization_code TYPE bool DEFAULT false;
DEFINE FIELD expires_at ON TABLE authorization_code TYPE datetime;
DEFINE FIELD created_at ON TABLE authorization_code TYPE datetime \
    DEFAULT time::now();

-- =======================================================================
-- Tokens (hashes only)
-- =======================================================================
DEFINE TABLE token SCHEMAFULL;
DEFINE FIELD access_token_hash ON TABLE token TYPE string;
DEFINE FIELD refresh_token_hash ON TABLE token TYPE string;
DEFINE FIELD authorization_code ON TABLE token TYPE option<string>;
DEFINE FIELD client_id ON TABLE token TYPE string;
DEFINE FIELD user_id ON TABLE token TYPE string;
DEFINE FIELD scopes ON TABLE token TYPE array<string>;
DEFINE FIELD token_type ON TABLE token TYPE string DEFAULT 'Bearer';
DEFINE FIELD access_token_expires_at ON TABLE token TYPE datetime;
DEFINE FIELD refresh_token_expires_at ON TABLE token TYPE datetime;
DEFINE FIELD revoked ON TABLE token TYPE bool DEFAULT false;
DEFINE FIELD revoked_at ON TABLE token TYPE option<datetime>;
DEFINE FIELD revoked_reason ON TABLE token TYPE option<string>;
DEFINE FIELD created_at ON TABLE token TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD last_used_at ON TABLE token TYPE option<datetime>;
DEFINE INDEX idx_token_access_hash ON TABLE token \
    COLUMNS access_token_hash UNIQUE;
DEFINE INDEX idx_token_refresh_hash ON TABLE token \
    COLUMNS refresh_token_hash UNIQUE;
DEFINE INDEX idx_token_authorization_code ON TABLE token \
    COLUMNS authorization_code;
";

// -----------------------------------------------------------------------
// Schema v2
// -----------------------------------------------------------------------

const SCHEMA_V2: &str = "\
DEFINE INDEX idx_session_expires ON TABLE session COLUMNS expires_at;
DEFINE INDEX idx_authorization_code_expires ON TABLE authorization_code \
    COLUMNS expires_at;
";

/// Apply every migration newer than the recorded schema version.
///
/// Idempotent: running it against an up-to-date database is a no-op.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let current_version = current_version(db).await?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(version = migration.version, "Migration applied");
        }
    }

    Ok(())
}

/// Highest applied migration version, `0` for an empty database.
pub async fn schema_version<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;
    current_version(db).await
}

async fn current_version<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    Ok(records.first().map(|m| m.version).unwrap_or(0))
}
