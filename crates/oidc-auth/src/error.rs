//! Protocol-level error taxonomy.

use oidc_core::error::OidcError;
use thiserror::Error;

use crate::password::PasswordError;

#[derive(Debug, Error)]
pub enum AuthError {
    // -- authorization request validation --
    #[error("client not found")]
    ClientNotFound,

    #[error("invalid redirect URI")]
    InvalidRedirectUri,

    #[error("unsupported response type")]
    UnsupportedResponseType,

    #[error("invalid scope")]
    InvalidScope,

    // -- code redemption --
    #[error("invalid authorization code")]
    InvalidAuthorizationCode,

    #[error("authorization code already used")]
    AuthorizationCodeAlreadyUsed,

    #[error("authorization code expired")]
    AuthorizationCodeExpired,

    #[error("invalid PKCE verification")]
    InvalidPkceVerification,

    #[error("unauthorized client")]
    UnauthorizedClient,

    #[error("unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    #[error("client authentication failed")]
    InvalidClient,

    // -- token state --
    #[error("invalid refresh token")]
    InvalidRefreshToken,

    #[error("token has expired")]
    TokenExpired,

    #[error("token has been revoked")]
    TokenRevoked,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    // -- credentials & sessions --
    #[error("password does not match")]
    PasswordMismatch,

    #[error("user not found")]
    UserNotFound,

    #[error("user already exists")]
    UserAlreadyExists,

    #[error("email not verified")]
    EmailNotVerified,

    #[error("invalid session signature")]
    InvalidSessionSignature,

    #[error("session has expired")]
    SessionExpired,

    #[error("session not found")]
    SessionNotFound,

    // -- input & infrastructure --
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("cryptography error: {0}")]
    Crypto(String),

    #[error(transparent)]
    Storage(#[from] OidcError),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// RFC 6749 error code for the transport layer.
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            AuthError::ClientNotFound | AuthError::InvalidClient => "invalid_client",
            AuthError::InvalidRedirectUri | AuthError::Validation(_) => "invalid_request",
            AuthError::UnsupportedResponseType => "unsupported_response_type",
            AuthError::InvalidScope => "invalid_scope",
            AuthError::InvalidAuthorizationCode
            | AuthError::AuthorizationCodeAlreadyUsed
            | AuthError::AuthorizationCodeExpired
            | AuthError::InvalidPkceVerification
            | AuthError::InvalidRefreshToken
            | AuthError::TokenExpired
            | AuthError::TokenRevoked
            | AuthError::TokenInvalid(_) => "invalid_grant",
            AuthError::UnauthorizedClient => "unauthorized_client",
            AuthError::UnsupportedGrantType(_) => "unsupported_grant_type",
            AuthError::PasswordMismatch
            | AuthError::UserNotFound
            | AuthError::UserAlreadyExists
            | AuthError::EmailNotVerified
            | AuthError::InvalidSessionSignature
            | AuthError::SessionExpired
            | AuthError::SessionNotFound => "access_denied",
            AuthError::Crypto(_) | AuthError::Storage(_) => "server_error",
        }
    }

    /// A redeemed code was presented again: possible interception.
    pub fn is_replay_signal(&self) -> bool {
        matches!(self, AuthError::AuthorizationCodeAlreadyUsed)
    }

    /// Storage and crypto failures, as opposed to caller errors.
    pub fn is_internal(&self) -> bool {
        matches!(self, AuthError::Crypto(_) | AuthError::Storage(_))
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::Mismatch => AuthError::PasswordMismatch,
            PasswordError::Decode(msg) | PasswordError::Hash(msg) => AuthError::Crypto(msg),
        }
    }
}

impl From<AuthError> for OidcError {
    fn from(err: AuthError) -> Self {
        match err {
            // Never reveal which of the two checks failed.
            AuthError::UserNotFound | AuthError::PasswordMismatch => {
                OidcError::AuthenticationFailed {
                    reason: "invalid credentials".into(),
                }
            }
            AuthError::EmailNotVerified
            | AuthError::InvalidSessionSignature
            | AuthError::SessionExpired
            | AuthError::SessionNotFound
            | AuthError::InvalidClient
            | AuthError::TokenExpired
            | AuthError::TokenRevoked
            | AuthError::TokenInvalid(_) => OidcError::AuthenticationFailed {
                reason: err.to_string(),
            },
            AuthError::UserAlreadyExists => OidcError::AlreadyExists {
                entity: "user".into(),
            },
            AuthError::Validation(message) => OidcError::Validation { message },
            AuthError::Crypto(msg) => OidcError::Crypto(msg),
            AuthError::Storage(inner) => inner,
            other => OidcError::AuthorizationDenied {
                reason: other.to_string(),
            },
        }
    }
}
