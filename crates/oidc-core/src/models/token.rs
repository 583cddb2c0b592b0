//! Issued token domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Persisted record of one access/refresh token pair.
///
/// Only SHA-256 hashes of the bearer strings are stored. A record is
/// never extended; a refresh produces a new `Token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: Uuid,
    pub access_token_hash: String,
    pub refresh_token_hash: String,
    /// Code this token was redeemed from, if any.
    pub authorization_code: Option<String>,
    pub client_id: String,
    pub user_id: Uuid,
    pub scopes: Vec<String>,
    pub token_type: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Token {
    pub fn is_access_token_expired(&self) -> bool {
        Utc::now() > self.access_token_expires_at
    }

    pub fn is_refresh_token_expired(&self) -> bool {
        Utc::now() > self.refresh_token_expires_at
    }

    /// Usable as a bearer credential.
    pub fn is_valid(&self) -> bool {
        !self.revoked && !self.is_access_token_expired()
    }

    /// Usable for the refresh-token grant.
    pub fn can_refresh(&self) -> bool {
        !self.revoked && !self.is_refresh_token_expired()
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    pub fn has_all_scopes<S: AsRef<str>>(&self, scopes: &[S]) -> bool {
        scopes.iter().all(|s| self.has_scope(s.as_ref()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateToken {
    pub access_token_hash: String,
    pub refresh_token_hash: String,
    pub authorization_code: Option<String>,
    pub client_id: String,
    pub user_id: Uuid,
    pub scopes: Vec<String>,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}
