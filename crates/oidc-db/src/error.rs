//! Database-specific error types and conversions.

use oidc_core::error::OidcError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Record already exists: {entity}")]
    AlreadyExists { entity: String },
}

impl DbError {
    /// Classify a failed statement, recognising unique-index violations.
    pub(crate) fn from_statement(err: surrealdb::Error, entity: &str) -> Self {
        let message = err.to_string();
        if message.contains("already contains") || message.contains("already exists") {
            DbError::AlreadyExists {
                entity: entity.into(),
            }
        } else {
            DbError::Query(message)
        }
    }
}

impl From<DbError> for OidcError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => OidcError::NotFound { entity, id },
            DbError::AlreadyExists { entity } => OidcError::AlreadyExists { entity },
            other => OidcError::Database(other.to_string()),
        }
    }
}
