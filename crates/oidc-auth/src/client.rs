//! Client registration and client authentication.

use oidc_core::error::OidcError;
use oidc_core::models::client::{Client, CreateClient, UpdateClient};
use oidc_core::repository::ClientRepository;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::password::{CredentialVault, PasswordError};
use crate::token;

pub const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";
pub const GRANT_REFRESH_TOKEN: &str = "refresh_token";
pub const RESPONSE_TYPE_CODE: &str = "code";

/// Input for registering a new client.
///
/// Empty `grant_types` / `response_types` fall back to the
/// authorization-code flow with refresh tokens.
#[derive(Debug, Clone, Default)]
pub struct CreateClientParams {
    pub name: String,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    pub scopes: Vec<String>,
    pub logo_url: Option<String>,
}

pub struct ClientService<C: ClientRepository> {
    client_repo: C,
    vault: CredentialVault,
}

impl<C: ClientRepository> ClientService<C> {
    pub fn new(client_repo: C, vault: CredentialVault) -> Self {
        Self { client_repo, vault }
    }

    /// Register a client. Returns the stored client and the raw
    /// secret, which is not recoverable afterwards.
    pub async fn register_client(&self, params: CreateClientParams) -> AuthResult<(Client, String)> {
        if params.name.trim().is_empty() {
            return Err(AuthError::Validation("client name must not be empty".into()));
        }
        validate_redirect_uris(&params.redirect_uris)?;

        let grant_types = if params.grant_types.is_empty() {
            vec![GRANT_AUTHORIZATION_CODE.into(), GRANT_REFRESH_TOKEN.into()]
        } else {
            params.grant_types
        };
        let response_types = if params.response_types.is_empty() {
            vec![RESPONSE_TYPE_CODE.into()]
        } else {
            params.response_types
        };

        let client_id = Uuid::new_v4().simple().to_string();
        let secret = token::generate_opaque_token();
        let client_secret_hash = self.vault.hash(&secret)?;

        let client = self
            .client_repo
            .create(CreateClient {
                client_id,
                client_secret_hash,
                name: params.name.trim().to_string(),
                redirect_uris: params.redirect_uris,
                grant_types,
                response_types,
                scopes: params.scopes,
                logo_url: params.logo_url,
            })
            .await?;

        info!(client_id = %client.client_id, name = %client.name, "Registered client");
        Ok((client, secret))
    }

    /// Resolve a client and check its secret.
    pub async fn authenticate_client(&self, client_id: &str, secret: &str) -> AuthResult<Client> {
        let client = self
            .client_repo
            .get_by_client_id(client_id)
            .await
            .map_err(|e| match e {
                OidcError::NotFound { .. } => AuthError::InvalidClient,
                other => AuthError::Storage(other),
            })?;

        verify_client_secret(&self.vault, &client, secret)?;
        Ok(client)
    }

    pub async fn update_client(&self, client_id: &str, input: UpdateClient) -> AuthResult<Client> {
        if let Some(name) = &input.name {
            if name.trim().is_empty() {
                return Err(AuthError::Validation("client name must not be empty".into()));
            }
        }
        if let Some(uris) = &input.redirect_uris {
            validate_redirect_uris(uris)?;
        }

        let client = self
            .client_repo
            .update(client_id, input)
            .await
            .map_err(|e| match e {
                OidcError::NotFound { .. } => AuthError::ClientNotFound,
                other => AuthError::Storage(other),
            })?;

        info!(client_id = %client.client_id, "Updated client");
        Ok(client)
    }
}

/// Compare a presented secret with the client's stored hash.
pub(crate) fn verify_client_secret(
    vault: &CredentialVault,
    client: &Client,
    secret: &str,
) -> AuthResult<()> {
    match vault.compare(secret, &client.client_secret_hash) {
        Ok(()) => Ok(()),
        Err(PasswordError::Mismatch) => {
            warn!(client_id = %client.client_id, "Client secret mismatch");
            Err(AuthError::InvalidClient)
        }
        Err(e) => Err(e.into()),
    }
}

fn validate_redirect_uris(uris: &[String]) -> AuthResult<()> {
    if uris.is_empty() {
        return Err(AuthError::Validation(
            "at least one redirect URI is required".into(),
        ));
    }
    for uri in uris {
        let parsed = Url::parse(uri)
            .map_err(|e| AuthError::Validation(format!("invalid redirect URI {uri}: {e}")))?;
        if parsed.fragment().is_some() {
            return Err(AuthError::Validation(format!(
                "redirect URI must not contain a fragment: {uri}"
            )));
        }
    }
    Ok(())
}
