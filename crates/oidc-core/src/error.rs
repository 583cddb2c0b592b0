//! Error types shared across the OIDC provider.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OidcError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Authorization denied: {reason}")]
    AuthorizationDenied { reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OidcError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, OidcError::NotFound { .. })
    }
}

pub type OidcResult<T> = Result<T, OidcError>;
