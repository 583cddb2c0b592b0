//! OAuth2 client domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered OAuth application.
///
/// Redirect URIs, grant types, response types and scopes are
/// exact-match allow-lists. The protocol flow only reads a client;
/// changes go through [`UpdateClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub client_id: String,
    pub client_secret_hash: String,
    pub name: String,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    pub scopes: Vec<String>,
    pub logo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    pub fn has_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == uri)
    }

    pub fn supports_grant_type(&self, grant_type: &str) -> bool {
        self.grant_types.iter().any(|g| g == grant_type)
    }

    pub fn supports_response_type(&self, response_type: &str) -> bool {
        self.response_types.iter().any(|r| r == response_type)
    }

    /// True if every requested scope is in the allow-list.
    ///
    /// Blank entries are ignored, so an empty request is always valid.
    pub fn supports_scopes<S: AsRef<str>>(&self, requested: &[S]) -> bool {
        requested
            .iter()
            .map(|s| s.as_ref().trim())
            .filter(|s| !s.is_empty())
            .all(|s| self.scopes.iter().any(|allowed| allowed == s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClient {
    pub client_id: String,
    /// CredentialVault-encoded hash of the client secret.
    pub client_secret_hash: String,
    pub name: String,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    pub scopes: Vec<String>,
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateClient {
    pub name: Option<String>,
    pub redirect_uris: Option<Vec<String>>,
    pub grant_types: Option<Vec<String>>,
    pub response_types: Option<Vec<String>>,
    pub scopes: Option<Vec<String>>,
    /// `Some(Some(url))` = set, `Some(None)` = clear, `None` = no change.
    pub logo_url: Option<Option<String>>,
}
