//! PKCE (RFC 7636): Proof Key for Code Exchange.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// PKCE code challenge methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeChallengeMethod {
    Plain,
    S256,
}

impl CodeChallengeMethod {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "plain" => Some(Self::Plain),
            "S256" => Some(Self::S256),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::S256 => "S256",
        }
    }
}

/// Derive the challenge a client would send for `verifier`.
pub fn generate_code_challenge(verifier: &str, method: CodeChallengeMethod) -> String {
    match method {
        CodeChallengeMethod::Plain => verifier.to_string(),
        CodeChallengeMethod::S256 => URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes())),
    }
}

/// Check a redemption-time verifier against what was bound at issuance.
///
/// With no bound challenge nothing is required. With a challenge, an
/// unknown or missing method, or a missing verifier, fails closed.
pub fn verify_code_verifier(
    challenge: Option<&str>,
    method: Option<&str>,
    verifier: Option<&str>,
) -> bool {
    let Some(challenge) = challenge else {
        return true;
    };
    let Some(method) = method.and_then(CodeChallengeMethod::parse) else {
        return false;
    };
    let Some(verifier) = verifier else {
        return false;
    };

    let computed = generate_code_challenge(verifier, method);
    computed.as_bytes().ct_eq(challenge.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 7636 Appendix B.
    const RFC_VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const RFC_CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    #[test]
    fn s256_matches_rfc_vector() {
        assert_eq!(
            generate_code_challenge(RFC_VERIFIER, CodeChallengeMethod::S256),
            RFC_CHALLENGE
        );
        assert!(verify_code_verifier(
            Some(RFC_CHALLENGE),
            Some("S256"),
            Some(RFC_VERIFIER)
        ));
    }

    #[test]
    fn s256_rejects_other_verifiers() {
        assert!(!verify_code_verifier(
            Some(RFC_CHALLENGE),
            Some("S256"),
            Some("wrong_verifier")
        ));
        // Sending the challenge itself as verifier must not work.
        assert!(!verify_code_verifier(
            Some(RFC_CHALLENGE),
            Some("S256"),
            Some(RFC_CHALLENGE)
        ));
    }

    #[test]
    fn plain_requires_exact_equality() {
        assert!(verify_code_verifier(Some("abc"), Some("plain"), Some("abc")));
        assert!(!verify_code_verifier(Some("abc"), Some("plain"), Some("abcd")));
        assert!(!verify_code_verifier(Some("abc"), Some("plain"), Some("ABC")));
    }

    #[test]
    fn bound_challenge_fails_closed() {
        assert!(!verify_code_verifier(Some("abc"), None, Some("abc")));
        assert!(!verify_code_verifier(Some("abc"), Some("S512"), Some("abc")));
        assert!(!verify_code_verifier(Some("abc"), Some("plain"), None));
    }

    #[test]
    fn no_challenge_needs_no_verifier() {
        assert!(verify_code_verifier(None, None, None));
        assert!(verify_code_verifier(None, None, Some("ignored")));
    }

    #[test]
    fn method_parsing() {
        assert_eq!(
            CodeChallengeMethod::parse("S256"),
            Some(CodeChallengeMethod::S256)
        );
        assert_eq!(
            CodeChallengeMethod::parse("plain"),
            Some(CodeChallengeMethod::Plain)
        );
        assert_eq!(CodeChallengeMethod::parse("s256"), None);
    }
}
