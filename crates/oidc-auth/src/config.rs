//! Authentication configuration.

use chrono::Duration;

use crate::error::{AuthError, AuthResult};

/// Upper bound for every configured lifetime: ten years.
pub const MAX_LIFETIME_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Cost parameters for Argon2id password hashing.
///
/// Only used when producing new hashes; verification always uses the
/// parameters embedded in the stored hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    /// Memory cost in KiB (default: 65536 = 64 MiB).
    pub memory_kib: u32,
    /// Number of passes (default: 3).
    pub iterations: u32,
    /// Degree of parallelism (default: 2).
    pub parallelism: u32,
    /// Derived key length in bytes (default: 32).
    pub output_len: usize,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 2,
            output_len: 32,
        }
    }
}

/// Configuration for the authentication and token services.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// PEM-encoded Ed25519 private key for JWT signing.
    pub jwt_private_key_pem: String,
    /// PEM-encoded Ed25519 public key for JWT verification.
    pub jwt_public_key_pem: String,
    /// JWT issuer (`iss` claim).
    pub jwt_issuer: String,
    /// Access token lifetime in seconds (default: 900 = 15 minutes).
    pub access_token_lifetime_secs: u64,
    /// Refresh token lifetime in seconds (default: 2_592_000 = 30 days).
    pub refresh_token_lifetime_secs: u64,
    /// ID token lifetime in seconds (default: 3600 = 1 hour).
    pub id_token_lifetime_secs: u64,
    /// Authorization code lifetime in seconds (default: 600 = 10 minutes).
    pub authorization_code_lifetime_secs: u64,
    /// HMAC key for signing session cookies.
    pub session_secret: String,
    /// Session lifetime used when the caller has no explicit TTL
    /// (default: 86_400 = 24 hours).
    pub session_lifetime_secs: u64,
    /// Argon2id cost parameters for new password and secret hashes.
    pub password_hash: HashParams,
    /// Minimum password length for policy enforcement.
    pub min_password_length: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_private_key_pem: String::new(),
            jwt_public_key_pem: String::new(),
            jwt_issuer: "oidc".into(),
            access_token_lifetime_secs: 900,
            refresh_token_lifetime_secs: 2_592_000,
            id_token_lifetime_secs: 3600,
            authorization_code_lifetime_secs: 600,
            session_secret: String::new(),
            session_lifetime_secs: 86_400,
            password_hash: HashParams::default(),
            min_password_length: 8,
        }
    }
}

impl AuthConfig {
    pub fn access_token_lifetime(&self) -> AuthResult<Duration> {
        lifetime("access token", self.access_token_lifetime_secs)
    }

    pub fn refresh_token_lifetime(&self) -> AuthResult<Duration> {
        lifetime("refresh token", self.refresh_token_lifetime_secs)
    }

    pub fn id_token_lifetime(&self) -> AuthResult<Duration> {
        lifetime("ID token", self.id_token_lifetime_secs)
    }

    pub fn authorization_code_lifetime(&self) -> AuthResult<Duration> {
        lifetime("authorization code", self.authorization_code_lifetime_secs)
    }

    pub fn session_lifetime(&self) -> AuthResult<Duration> {
        lifetime("session", self.session_lifetime_secs)
    }

    /// Reject lifetimes that cannot be added to the current time.
    pub fn validate(&self) -> AuthResult<()> {
        self.access_token_lifetime()?;
        self.refresh_token_lifetime()?;
        self.id_token_lifetime()?;
        self.authorization_code_lifetime()?;
        self.session_lifetime()?;
        Ok(())
    }
}

fn lifetime(name: &str, secs: u64) -> AuthResult<Duration> {
    i64::try_from(secs)
        .ok()
        .filter(|_| secs <= MAX_LIFETIME_SECS)
        .and_then(Duration::try_seconds)
        .ok_or_else(|| {
            AuthError::Validation(format!(
                "{name} lifetime of {secs}s exceeds the {MAX_LIFETIME_SECS}s maximum"
            ))
        })
}
