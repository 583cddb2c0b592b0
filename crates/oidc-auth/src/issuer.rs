//! TokenIssuer: redeems authorization codes and refresh tokens for
//! bearer tokens, and owns the token revocation lifecycle.
//!
//! Raw access, refresh and ID token strings only ever exist in the
//! [`TokenResponse`]; persistence sees their SHA-256 hashes.

use chrono::Utc;
use oidc_core::error::OidcError;
use oidc_core::models::token::{CreateToken, TOKEN_TYPE_BEARER, Token};
use oidc_core::models::user::User;
use oidc_core::repository::{
    AuthorizationCodeRepository, ClientRepository, TokenRepository, UserRepository,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::client::{GRANT_AUTHORIZATION_CODE, GRANT_REFRESH_TOKEN, verify_client_secret};
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::password::CredentialVault;
use crate::pkce;
use crate::token;

pub const REVOKED_REASON_REPLAY: &str = "authorization code replay";
pub const REVOKED_REASON_ROTATED: &str = "rotated";

/// Parameters of a `POST /token` request.
#[derive(Debug, Clone, Default)]
pub struct TokenRequest {
    pub grant_type: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    /// Requested scopes for the refresh grant; empty keeps the original grant.
    pub scopes: Vec<String>,
}

/// Successful token endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Token issuer.
///
/// Generic over repository implementations so that the auth layer
/// has no dependency on the database crate.
pub struct TokenIssuer<A, T, U, C>
where
    A: AuthorizationCodeRepository,
    T: TokenRepository,
    U: UserRepository,
    C: ClientRepository,
{
    code_repo: A,
    token_repo: T,
    user_repo: U,
    client_repo: C,
    vault: CredentialVault,
    config: AuthConfig,
}

impl<A, T, U, C> TokenIssuer<A, T, U, C>
where
    A: AuthorizationCodeRepository,
    T: TokenRepository,
    U: UserRepository,
    C: ClientRepository,
{
    /// Fails if any configured lifetime is out of range.
    pub fn new(
        code_repo: A,
        token_repo: T,
        user_repo: U,
        client_repo: C,
        config: AuthConfig,
    ) -> AuthResult<Self> {
        config.validate()?;
        Ok(Self {
            code_repo,
            token_repo,
            user_repo,
            client_repo,
            vault: CredentialVault::new(config.password_hash),
            config,
        })
    }

    /// Token endpoint entry point: authenticate the client, check the
    /// grant type, and dispatch.
    pub async fn exchange(&self, request: TokenRequest) -> AuthResult<TokenResponse> {
        let grant_type = request.grant_type.as_str();
        if grant_type != GRANT_AUTHORIZATION_CODE && grant_type != GRANT_REFRESH_TOKEN {
            return Err(AuthError::UnsupportedGrantType(request.grant_type.clone()));
        }

        let client = self
            .client_repo
            .get_by_client_id(&request.client_id)
            .await
            .map_err(|e| match e {
                OidcError::NotFound { .. } => AuthError::InvalidClient,
                other => AuthError::Storage(other),
            })?;

        if let Some(secret) = &request.client_secret {
            verify_client_secret(&self.vault, &client, secret)?;
        }

        if !client.supports_grant_type(grant_type) {
            return Err(AuthError::UnauthorizedClient);
        }

        if grant_type == GRANT_AUTHORIZATION_CODE {
            let code = request
                .code
                .as_deref()
                .ok_or_else(|| AuthError::Validation("code is required".into()))?;
            let redirect_uri = request
                .redirect_uri
                .as_deref()
                .ok_or_else(|| AuthError::Validation("redirect_uri is required".into()))?;
            self.exchange_authorization_code(
                code,
                &client.client_id,
                redirect_uri,
                request.code_verifier.as_deref(),
            )
            .await
        } else {
            let refresh_token = request
                .refresh_token
                .as_deref()
                .ok_or_else(|| AuthError::Validation("refresh_token is required".into()))?;
            self.exchange_refresh_token(refresh_token, &client.client_id, &request.scopes)
                .await
        }
    }

    /// Redeem an authorization code.
    ///
    /// Checks run in a fixed order: existence, reuse, expiry, client,
    /// redirect URI, PKCE. Only then is the code atomically marked used.
    pub async fn exchange_authorization_code(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> AuthResult<TokenResponse> {
        // 1. Look up the code.
        let auth_code = self.code_repo.get_by_code(code).await.map_err(|e| match e {
            OidcError::NotFound { .. } => AuthError::InvalidAuthorizationCode,
            other => AuthError::Storage(other),
        })?;

        // 2. Reuse means the code may have been intercepted.
        if auth_code.used {
            self.revoke_replayed_code(code, &auth_code.client_id).await;
            return Err(AuthError::AuthorizationCodeAlreadyUsed);
        }

        // 3. Expiry, regardless of use.
        if auth_code.is_expired() {
            return Err(AuthError::AuthorizationCodeExpired);
        }

        // 4. Bindings captured at issuance.
        if auth_code.client_id != client_id {
            return Err(AuthError::UnauthorizedClient);
        }
        if auth_code.redirect_uri != redirect_uri {
            return Err(AuthError::InvalidRedirectUri);
        }

        // 5. PKCE.
        if !pkce::verify_code_verifier(
            auth_code.code_challenge.as_deref(),
            auth_code.code_challenge_method.as_deref(),
            code_verifier,
        ) {
            return Err(AuthError::InvalidPkceVerification);
        }

        // 6. Single conditional write; only one concurrent caller wins.
        if !self.code_repo.mark_as_used(code).await? {
            warn!(
                client_id = %client_id,
                code = %token::fingerprint(code),
                "Authorization code redeemed concurrently"
            );
            return Err(AuthError::AuthorizationCodeAlreadyUsed);
        }

        // 7-9. Mint, persist hashes, return raw values.
        let user = self.load_user(auth_code.user_id).await?;
        let response = self
            .issue_tokens(
                &user,
                client_id,
                &auth_code.scopes,
                auth_code.nonce.as_deref(),
                Some(code),
            )
            .await?;

        info!(
            client_id = %client_id,
            user_id = %user.id,
            code = %token::fingerprint(code),
            "Authorization code redeemed"
        );
        Ok(response)
    }

    /// Rotate a refresh token into a new token set.
    ///
    /// The presented token is revoked as part of the exchange; a
    /// second use of it fails with [`AuthError::TokenRevoked`].
    pub async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
        client_id: &str,
        scopes: &[String],
    ) -> AuthResult<TokenResponse> {
        // 1. Look up by hash.
        let existing = self
            .token_repo
            .get_by_refresh_token_hash(&token::hash_token(refresh_token))
            .await
            .map_err(|e| match e {
                OidcError::NotFound { .. } => AuthError::InvalidRefreshToken,
                other => AuthError::Storage(other),
            })?;

        // 2. Token state.
        if existing.revoked {
            warn!(
                token_id = %existing.id,
                client_id = %existing.client_id,
                "Refresh attempted with revoked token"
            );
            return Err(AuthError::TokenRevoked);
        }
        if existing.is_refresh_token_expired() {
            return Err(AuthError::TokenExpired);
        }

        // 3. Client binding.
        if existing.client_id != client_id {
            return Err(AuthError::UnauthorizedClient);
        }

        // 4. Scopes may only narrow.
        let granted = if scopes.is_empty() {
            existing.scopes.clone()
        } else if existing.has_all_scopes(scopes) {
            scopes.to_vec()
        } else {
            return Err(AuthError::InvalidScope);
        };

        // 5. Consume the old token.
        if !self
            .token_repo
            .revoke(existing.id, REVOKED_REASON_ROTATED)
            .await?
        {
            warn!(token_id = %existing.id, "Refresh token rotated concurrently");
            return Err(AuthError::TokenRevoked);
        }

        // 6. New token set, still tied to the originating code so a later
        // replay cascade reaches it.
        let user = self.load_user(existing.user_id).await?;
        let response = self
            .issue_tokens(
                &user,
                client_id,
                &granted,
                None,
                existing.authorization_code.as_deref(),
            )
            .await?;

        info!(
            client_id = %client_id,
            user_id = %user.id,
            previous = %existing.id,
            "Refresh token rotated"
        );
        Ok(response)
    }

    pub async fn revoke_by_id(&self, id: Uuid, reason: &str) -> AuthResult<bool> {
        let revoked = self.token_repo.revoke(id, reason).await?;
        if revoked {
            info!(token_id = %id, reason, "Token revoked");
        }
        Ok(revoked)
    }

    /// Revoke the token a raw access token belongs to.
    pub async fn revoke_by_access_token(&self, access_token: &str, reason: &str) -> AuthResult<bool> {
        let hash = token::hash_token(access_token);
        let revoked = self
            .token_repo
            .revoke_by_access_token_hash(&hash, reason)
            .await?;
        if revoked {
            info!(reason, "Token revoked by access token");
        }
        Ok(revoked)
    }

    /// Revoke every token issued from `code`. Returns how many changed.
    pub async fn revoke_by_authorization_code(&self, code: &str, reason: &str) -> AuthResult<u64> {
        let revoked = self
            .token_repo
            .revoke_by_authorization_code(code, reason)
            .await?;
        info!(code = %token::fingerprint(code), revoked, reason, "Tokens revoked by authorization code");
        Ok(revoked)
    }

    /// Resolve a raw bearer access token to its live [`Token`] record
    /// and record its use.
    pub async fn validate_access_token(&self, access_token: &str) -> AuthResult<Token> {
        let mut found = self
            .token_repo
            .get_by_access_token_hash(&token::hash_token(access_token))
            .await
            .map_err(|e| match e {
                OidcError::NotFound { .. } => AuthError::TokenInvalid("unknown access token".into()),
                other => AuthError::Storage(other),
            })?;

        if found.revoked {
            return Err(AuthError::TokenRevoked);
        }
        if found.is_access_token_expired() {
            return Err(AuthError::TokenExpired);
        }

        self.token_repo.update_last_used(found.id).await?;
        found.last_used_at = Some(Utc::now());
        Ok(found)
    }

    /// Look up a refresh token without consuming it.
    pub async fn introspect_refresh_token(&self, refresh_token: &str) -> AuthResult<Token> {
        let found = self
            .token_repo
            .get_by_refresh_token_hash(&token::hash_token(refresh_token))
            .await
            .map_err(|e| match e {
                OidcError::NotFound { .. } => AuthError::InvalidRefreshToken,
                other => AuthError::Storage(other),
            })?;

        if found.revoked {
            return Err(AuthError::TokenRevoked);
        }
        if found.is_refresh_token_expired() {
            return Err(AuthError::TokenExpired);
        }
        Ok(found)
    }

    async fn load_user(&self, user_id: Uuid) -> AuthResult<User> {
        self.user_repo.get_by_id(user_id).await.map_err(|e| match e {
            OidcError::NotFound { .. } => AuthError::UserNotFound,
            other => AuthError::Storage(other),
        })
    }

    async fn issue_tokens(
        &self,
        user: &User,
        client_id: &str,
        scopes: &[String],
        nonce: Option<&str>,
        authorization_code: Option<&str>,
    ) -> AuthResult<TokenResponse> {
        let access_token = token::issue_access_token(user.id, client_id, scopes, &self.config)?;
        let refresh_token = token::generate_opaque_token();
        let id_token = if scopes.iter().any(|s| s == "openid") {
            Some(token::issue_id_token(user, client_id, scopes, nonce, &self.config)?)
        } else {
            None
        };

        let now = Utc::now();
        self.token_repo
            .create(CreateToken {
                access_token_hash: token::hash_token(&access_token),
                refresh_token_hash: token::hash_token(&refresh_token),
                authorization_code: authorization_code.map(str::to_string),
                client_id: client_id.to_string(),
                user_id: user.id,
                scopes: scopes.to_vec(),
                access_token_expires_at: now + self.config.access_token_lifetime()?,
                refresh_token_expires_at: now + self.config.refresh_token_lifetime()?,
            })
            .await?;

        Ok(TokenResponse {
            access_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: self.config.access_token_lifetime_secs,
            refresh_token,
            id_token,
            scope: if scopes.is_empty() {
                None
            } else {
                Some(scopes.join(" "))
            },
        })
    }

    async fn revoke_replayed_code(&self, code: &str, client_id: &str) {
        match self
            .token_repo
            .revoke_by_authorization_code(code, REVOKED_REASON_REPLAY)
            .await
        {
            Ok(revoked) => warn!(
                client_id = %client_id,
                code = %token::fingerprint(code),
                revoked,
                "Authorization code replay detected, tokens revoked"
            ),
            Err(e) => error!(
                client_id = %client_id,
                code = %token::fingerprint(code),
                error = %e,
                "Authorization code replay detected, revocation failed"
            ),
        }
    }
}
