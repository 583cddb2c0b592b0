//! CredentialVault: Argon2id password hashing and verification.
//!
//! Hashes are serialized as
//! `$argon2id$v=19$m=<mem>,t=<iter>,p=<par>$<salt>$<key>` with
//! unpadded base64. The cost parameters travel with the hash, so
//! changing [`HashParams`] never invalidates stored credentials.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use std::sync::{Arc, OnceLock};

use argon2::{Algorithm, Argon2, Params, Version};
use thiserror::Error;

use crate::config::HashParams;
use crate::token::generate_opaque_token;

#[derive(Debug, Error)]
pub enum PasswordError {
    /// The stored string is not a supported Argon2id hash.
    #[error("unrecognized password hash: {0}")]
    Decode(String),

    #[error("password does not match")]
    Mismatch,

    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Hashes and verifies secrets with Argon2id.
#[derive(Debug, Clone, Default)]
pub struct CredentialVault {
    params: HashParams,
    /// Hash of a random secret nobody knows, shared between clones.
    decoy: Arc<OnceLock<String>>,
}

impl CredentialVault {
    pub fn new(params: HashParams) -> Self {
        Self {
            params,
            decoy: Arc::default(),
        }
    }

    /// Hash `plaintext` under a fresh random 16-byte salt.
    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let params = Params::new(
            self.params.memory_kib,
            self.params.iterations,
            self.params.parallelism,
            Some(self.params.output_len),
        )
        .map_err(|e| PasswordError::Hash(format!("argon2 params error: {e}")))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let salt = SaltString::generate(&mut OsRng);
        argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordError::Hash(e.to_string()))
    }

    /// Verify `plaintext` against an encoded hash.
    ///
    /// The key is re-derived with the parameters embedded in
    /// `encoded`, not the vault's current defaults, and compared in
    /// constant time.
    pub fn compare(&self, plaintext: &str, encoded: &str) -> Result<(), PasswordError> {
        let parsed = parse(encoded)?;

        match Argon2::default().verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(()),
            Err(argon2::password_hash::Error::Password) => Err(PasswordError::Mismatch),
            Err(e) => Err(PasswordError::Decode(e.to_string())),
        }
    }

    /// Derive the decoy hash up front so the first [`Self::compare_decoy`]
    /// costs the same as every later one.
    pub fn prepare_decoy(&self) -> Result<(), PasswordError> {
        self.decoy_hash().map(|_| ())
    }

    /// Run a full verification against the decoy hash.
    ///
    /// For callers with no stored credential to check: a missing account
    /// then costs one Argon2id derivation, like a wrong password.
    /// Always fails.
    pub fn compare_decoy(&self, plaintext: &str) -> Result<(), PasswordError> {
        let decoy = self.decoy_hash()?;
        self.compare(plaintext, decoy)?;
        Err(PasswordError::Mismatch)
    }

    fn decoy_hash(&self) -> Result<&str, PasswordError> {
        if let Some(hash) = self.decoy.get() {
            return Ok(hash.as_str());
        }
        let hash = self.hash(&generate_opaque_token())?;
        Ok(self.decoy.get_or_init(|| hash).as_str())
    }

    /// True if `encoded` was produced with different cost parameters
    /// than the vault currently uses.
    pub fn needs_rehash(&self, encoded: &str) -> Result<bool, PasswordError> {
        let parsed = parse(encoded)?;
        let embedded =
            Params::try_from(&parsed).map_err(|e| PasswordError::Decode(e.to_string()))?;
        Ok(embedded.m_cost() != self.params.memory_kib
            || embedded.t_cost() != self.params.iterations
            || embedded.p_cost() != self.params.parallelism
            || embedded.output_len() != Some(self.params.output_len))
    }
}

fn parse(encoded: &str) -> Result<PasswordHash<'_>, PasswordError> {
    let parsed = PasswordHash::new(encoded)
        .map_err(|e| PasswordError::Decode(format!("invalid hash format: {e}")))?;

    if parsed.algorithm != argon2::ARGON2ID_IDENT {
        return Err(PasswordError::Decode(format!(
            "unsupported algorithm: {}",
            parsed.algorithm
        )));
    }
    if parsed.version != Some(Version::V0x13 as u32) {
        return Err(PasswordError::Decode("unsupported argon2 version".into()));
    }
    if parsed.hash.is_none() || parsed.salt.is_none() {
        return Err(PasswordError::Decode("missing salt or key".into()));
    }

    Ok(parsed)
}
