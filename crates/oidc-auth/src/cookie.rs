//! SessionSigner: HMAC-SHA256 signed cookie values.
//!
//! A signed value is `<value>.<lowercase hex HMAC-SHA256(value)>`.
//! This authenticates the session id but does not hide it; the id
//! itself must be an opaque random identifier.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Shortest accepted signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Clone)]
pub struct SessionSigner {
    mac: HmacSha256,
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner").finish_non_exhaustive()
    }
}

impl SessionSigner {
    /// Fails if the secret is shorter than [`MIN_SECRET_LEN`] bytes.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, AuthError> {
        let secret = secret.as_ref();
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::Crypto(format!(
                "session secret must be at least {MIN_SECRET_LEN} bytes, got {}",
                secret.len()
            )));
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| AuthError::Crypto(format!("HMAC key: {e}")))?;
        Ok(Self { mac })
    }

    pub fn sign(&self, value: &str) -> String {
        format!("{value}.{}", self.signature(value))
    }

    /// Verify a signed value and return the original value.
    pub fn verify(&self, signed: &str) -> Result<String, AuthError> {
        let (value, signature) = signed
            .rsplit_once('.')
            .ok_or(AuthError::InvalidSessionSignature)?;

        let expected = self.signature(value);
        if bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
            Ok(value.to_string())
        } else {
            Err(AuthError::InvalidSessionSignature)
        }
    }

    fn signature(&self, value: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(value.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> SessionSigner {
        SessionSigner::new("test-session-secret-0123456789abcdef").unwrap()
    }

    #[test]
    fn sign_verify_roundtrip() {
        let s = signer();
        let id = "0b6f7a2e-3c1d-4a8e-9f00-123456789abc";
        let signed = s.sign(id);
        assert_eq!(s.verify(&signed).unwrap(), id);
    }

    #[test]
    fn signature_is_lowercase_hex() {
        let signed = signer().sign("sid");
        let (_, sig) = signed.rsplit_once('.').unwrap();
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn value_containing_dots_roundtrips() {
        let s = signer();
        let signed = s.sign("a.b.c");
        assert_eq!(s.verify(&signed).unwrap(), "a.b.c");
    }

    #[test]
    fn tampered_cookie_is_rejected() {
        assert!(matches!(
            signer().verify("sid.deadbeef"),
            Err(AuthError::InvalidSessionSignature)
        ));
    }

    #[test]
    fn flipping_any_byte_fails() {
        let s = signer();
        let signed = s.sign("session-id");
        let bytes = signed.as_bytes();
        for i in 0..bytes.len() {
            let mut tampered = bytes.to_vec();
            tampered[i] = if tampered[i] == b'0' { b'1' } else { b'0' };
            let Ok(tampered) = String::from_utf8(tampered) else {
                continue;
            };
            assert!(s.verify(&tampered).is_err(), "byte {i} flip accepted");
        }
    }

    #[test]
    fn uppercase_signature_is_rejected() {
        let s = signer();
        let signed = s.sign("sid");
        let (value, sig) = signed.rsplit_once('.').unwrap();
        let upper = format!("{value}.{}", sig.to_uppercase());
        assert!(s.verify(&upper).is_err());
    }

    #[test]
    fn missing_separator_is_rejected() {
        assert!(signer().verify("no-signature-here").is_err());
    }

    #[test]
    fn different_secret_is_rejected() {
        let signed = signer().sign("sid");
        assert!(SessionSigner::new("another-session-secret-0123456789abcdef").unwrap().verify(&signed).is_err());
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(SessionSigner::new(""), Err(AuthError::Crypto(_))));
    }

    #[test]
    fn short_secret_is_rejected() {
        assert!(SessionSigner::new([7u8; MIN_SECRET_LEN - 1]).is_err());
        assert!(SessionSigner::new([7u8; MIN_SECRET_LEN]).is_ok());
    }
}
