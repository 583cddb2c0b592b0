//! JWT access/ID token issuance and verification, plus opaque
//! random tokens and their storage hashes.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use oidc_core::models::user::User;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;

/// JWT claims embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Issuer.
    pub iss: String,
    /// Subject: user ID (UUID string).
    pub sub: String,
    /// Audience: the client's public `client_id`.
    pub aud: String,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Space-delimited granted scopes.
    pub scope: String,
    /// Unique token ID (UUID string).
    pub jti: String,
}

/// OpenID Connect ID token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Present when `profile` was granted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Present when `email` was granted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
}

fn encoding_key(config: &AuthConfig) -> Result<EncodingKey, AuthError> {
    EncodingKey::from_ed_pem(config.jwt_private_key_pem.as_bytes())
        .map_err(|e| AuthError::Crypto(format!("bad private key: {e}")))
}

fn decoding_key(config: &AuthConfig) -> Result<DecodingKey, AuthError> {
    DecodingKey::from_ed_pem(config.jwt_public_key_pem.as_bytes())
        .map_err(|e| AuthError::Crypto(format!("bad public key: {e}")))
}

fn validation(config: &AuthConfig, audience: Option<&str>) -> Validation {
    let mut validation = Validation::new(Algorithm::EdDSA);
    validation.set_issuer(&[&config.jwt_issuer]);
    validation.set_required_spec_claims(&["sub", "exp", "iat", "iss", "aud"]);
    match audience {
        Some(aud) => validation.set_audience(&[aud]),
        None => validation.validate_aud = false,
    }
    validation
}

fn map_decode_error(e: jsonwebtoken::errors::Error) -> AuthError {
    match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::TokenInvalid(e.to_string()),
    }
}

/// Issue a signed EdDSA (Ed25519) JWT access token.
pub fn issue_access_token(
    user_id: Uuid,
    client_id: &str,
    scopes: &[String],
    config: &AuthConfig,
) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = AccessTokenClaims {
        iss: config.jwt_issuer.clone(),
        sub: user_id.to_string(),
        aud: client_id.to_string(),
        exp: now + config.access_token_lifetime()?.num_seconds(),
        iat: now,
        scope: scopes.join(" "),
        jti: Uuid::new_v4().to_string(),
    };

    jsonwebtoken::encode(&Header::new(Algorithm::EdDSA), &claims, &encoding_key(config)?)
        .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))
}

/// Decode and verify an EdDSA JWT access token.
///
/// When `audience` is given the `aud` claim must equal it.
pub fn decode_access_token(
    token: &str,
    audience: Option<&str>,
    config: &AuthConfig,
) -> Result<AccessTokenClaims, AuthError> {
    jsonwebtoken::decode::<AccessTokenClaims>(
        token,
        &decoding_key(config)?,
        &validation(config, audience),
    )
    .map(|data| data.claims)
    .map_err(map_decode_error)
}

/// Issue a signed ID token for `user`, with claims gated by scope.
pub fn issue_id_token(
    user: &User,
    client_id: &str,
    scopes: &[String],
    nonce: Option<&str>,
    config: &AuthConfig,
) -> Result<String, AuthError> {
    let granted = |scope: &str| scopes.iter().any(|s| s == scope);
    let now = Utc::now().timestamp();

    let mut claims = IdTokenClaims {
        iss: config.jwt_issuer.clone(),
        sub: user.id.to_string(),
        aud: client_id.to_string(),
        exp: now + config.id_token_lifetime()?.num_seconds(),
        iat: now,
        nonce: nonce.map(str::to_string),
        name: None,
        email: None,
        email_verified: None,
    };
    if granted("profile") {
        claims.name = Some(user.name.clone());
    }
    if granted("email") {
        claims.email = Some(user.email.clone());
        claims.email_verified = Some(user.email_verified);
    }

    jsonwebtoken::encode(&Header::new(Algorithm::EdDSA), &claims, &encoding_key(config)?)
        .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))
}

/// Decode and verify an ID token issued to `client_id`.
pub fn decode_id_token(
    token: &str,
    client_id: &str,
    config: &AuthConfig,
) -> Result<IdTokenClaims, AuthError> {
    jsonwebtoken::decode::<IdTokenClaims>(
        token,
        &decoding_key(config)?,
        &validation(config, Some(client_id)),
    )
    .map(|data| data.claims)
    .map_err(map_decode_error)
}

/// Generate a cryptographically random opaque token
/// (32 bytes → base64url-encoded, no padding).
///
/// Used for authorization codes, refresh tokens and client secrets.
pub fn generate_opaque_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rand::Rng::random(&mut rng);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hash of a raw bearer string, hex-encoded.
///
/// This is the value persisted as the token lookup key.
pub fn hash_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// Short non-reversible tag for log lines.
pub fn fingerprint(raw: &str) -> String {
    let mut hash = hash_token(raw);
    hash.truncate(12);
    hash
}
