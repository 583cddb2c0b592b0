//! AuthorizationEngine: validates authorization requests against a
//! client's registered policy and issues one-time authorization codes.
//!
//! The engine holds no per-request state; everything a later
//! redemption needs is persisted in the [`AuthorizationCode`].

use chrono::{Duration, Utc};
use oidc_core::error::OidcError;
use oidc_core::models::authorization_code::{AuthorizationCode, CreateAuthorizationCode};
use oidc_core::models::client::Client;
use oidc_core::repository::{AuthorizationCodeRepository, ClientRepository};
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::pkce::CodeChallengeMethod;
use crate::token;

/// Parameters of a `GET /authorize` request.
#[derive(Debug, Clone, Default)]
pub struct AuthorizeRequest {
    pub client_id: String,
    pub redirect_uri: String,
    pub response_type: String,
    pub scopes: Vec<String>,
    pub state: Option<String>,
    pub nonce: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

impl AuthorizeRequest {
    /// Split a space-delimited `scope` parameter.
    pub fn from_scope_string(scope: &str) -> Vec<String> {
        scope.split_whitespace().map(str::to_string).collect()
    }

    /// Rebuild the `/authorize` URL under `base`, for the login page
    /// to send the user back to once a session exists.
    pub fn continue_url(&self, base: &str) -> AuthResult<String> {
        let mut url = Url::parse(base)
            .map_err(|e| AuthError::Validation(format!("invalid base URL: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.client_id);
            query.append_pair("redirect_uri", &self.redirect_uri);
            query.append_pair("response_type", &self.response_type);
            if !self.scopes.is_empty() {
                query.append_pair("scope", &self.scopes.join(" "));
            }
            if let Some(state) = &self.state {
                query.append_pair("state", state);
            }
            if let Some(nonce) = &self.nonce {
                query.append_pair("nonce", nonce);
            }
            if let Some(challenge) = &self.code_challenge {
                query.append_pair("code_challenge", challenge);
                let method = self
                    .code_challenge_method
                    .as_deref()
                    .unwrap_or(CodeChallengeMethod::Plain.as_str());
                query.append_pair("code_challenge_method", method);
            }
        }
        Ok(url.into())
    }
}

/// Build the success redirect carrying `code` and, if present, `state`.
///
/// Existing query parameters on the registered redirect URI are kept.
pub fn redirect_with_code(redirect_uri: &str, code: &str, state: Option<&str>) -> AuthResult<String> {
    let mut url = Url::parse(redirect_uri)
        .map_err(|e| AuthError::Validation(format!("invalid redirect URI: {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("code", code);
        if let Some(state) = state {
            query.append_pair("state", state);
        }
    }
    Ok(url.into())
}

pub struct AuthorizationEngine<C: ClientRepository, A: AuthorizationCodeRepository> {
    client_repo: C,
    code_repo: A,
    code_lifetime: Duration,
}

impl<C: ClientRepository, A: AuthorizationCodeRepository> AuthorizationEngine<C, A> {
    /// Fails if the configured code lifetime is out of range.
    pub fn new(client_repo: C, code_repo: A, config: &AuthConfig) -> AuthResult<Self> {
        Ok(Self {
            client_repo,
            code_repo,
            code_lifetime: config.authorization_code_lifetime()?,
        })
    }

    /// Check a request against the client's allow-lists.
    ///
    /// Checks run in order: client, redirect URI, response type, scopes.
    pub async fn validate_request(&self, request: &AuthorizeRequest) -> AuthResult<Client> {
        let client = self
            .client_repo
            .get_by_client_id(&request.client_id)
            .await
            .map_err(|e| match e {
                OidcError::NotFound { .. } => AuthError::ClientNotFound,
                other => AuthError::Storage(other),
            })?;

        if !client.has_redirect_uri(&request.redirect_uri) {
            return Err(AuthError::InvalidRedirectUri);
        }

        if !client.supports_response_type(&request.response_type) {
            return Err(AuthError::UnsupportedResponseType);
        }

        if !client.supports_scopes(&request.scopes) {
            return Err(AuthError::InvalidScope);
        }

        Ok(client)
    }

    /// Persist a fresh code bound to `user_id`, the client, and the
    /// request's redirect URI, scopes, nonce and PKCE challenge.
    pub async fn issue_code(
        &self,
        user_id: Uuid,
        client: &Client,
        request: &AuthorizeRequest,
    ) -> AuthResult<AuthorizationCode> {
        let code = token::generate_opaque_token();
        let scopes: Vec<String> = request
            .scopes
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let issued = self
            .code_repo
            .create(CreateAuthorizationCode {
                code,
                client_id: client.client_id.clone(),
                user_id,
                redirect_uri: request.redirect_uri.clone(),
                scopes,
                nonce: request.nonce.clone(),
                code_challenge: request.code_challenge.clone(),
                code_challenge_method: request.code_challenge_method.clone(),
                expires_at: Utc::now() + self.code_lifetime,
            })
            .await?;

        info!(
            client_id = %issued.client_id,
            user_id = %user_id,
            code = %token::fingerprint(&issued.code),
            pkce = issued.code_challenge.is_some(),
            "Issued authorization code"
        );

        Ok(issued)
    }

    /// Validate and issue in one step, for an authenticated user.
    pub async fn authorize(
        &self,
        user_id: Uuid,
        request: &AuthorizeRequest,
    ) -> AuthResult<AuthorizationCode> {
        let client = self.validate_request(request).await?;
        self.issue_code(user_id, &client, request).await
    }

    /// Remove expired codes. Used codes are kept until they expire so
    /// that replays are still recognised.
    pub async fn purge_expired_codes(&self) -> AuthResult<u64> {
        let removed = self.code_repo.cleanup_expired().await?;
        debug!(removed, "Purged expired authorization codes");
        Ok(removed)
    }
}
