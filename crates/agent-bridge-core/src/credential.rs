//! Bearer credentials.

use std::fmt;

use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::Deserialize;

/// Credential error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CredentialError {
    #[error("Credential fetch failed: {0}")]
    Fetch(String),
    #[error("Credential is not a token with a session claim")]
    Invalid,
    #[error("Credential store error: {0}")]
    Store(String),
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sid: Option<String>,
}

/// Opaque bearer token with a validated session claim.
///
/// The signature is not verified; only the token structure and a non-empty
/// `sid` claim are checked.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Validate a raw token.
    ///
    /// # Errors
    /// Returns [`CredentialError::Invalid`] if the token does not decode or
    /// its `sid` claim is missing or empty.
    pub fn parse(token: impl Into<String>) -> Result<Self, CredentialError> {
        let token = token.into();
        if Self::is_valid(&token) {
            Ok(Self(token))
        } else {
            Err(CredentialError::Invalid)
        }
    }

    /// Whether a raw token decodes with a non-empty `sid` claim.
    #[must_use]
    pub fn is_valid(token: &str) -> bool {
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
            .ok()
            .and_then(|data| data.claims.sid)
            .is_some_and(|sid| !sid.is_empty())
    }

    /// The raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    use super::*;

    fn token_with(claims: &serde_json::Value) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(b"agent")).unwrap()
    }

    #[test]
    fn test_valid_token() {
        let token = token_with(&json!({"sid": "abc"}));
        let credential = Credential::parse(token.clone()).unwrap();
        assert_eq!(credential.as_str(), token);
    }

    #[test]
    fn test_signature_not_checked() {
        let token = encode(
            &Header::default(),
            &json!({"sid": "abc"}),
            &EncodingKey::from_secret(b"someone-else"),
        )
        .unwrap();
        assert!(Credential::is_valid(&token));
    }

    #[test]
    fn test_missing_or_empty_sid() {
        assert!(!Credential::is_valid(&token_with(&json!({"sub": "u"}))));
        assert!(!Credential::is_valid(&token_with(&json!({"sid": ""}))));
        assert!(!Credential::is_valid(&token_with(&json!({"sid": 7}))));
    }

    #[test]
    fn test_garbage() {
        assert!(!Credential::is_valid(""));
        assert!(!Credential::is_valid("not.a.token"));
        assert!(matches!(Credential::parse("x"), Err(CredentialError::Invalid)));
    }

    #[test]
    fn test_debug_redacts() {
        let credential = Credential::parse(token_with(&json!({"sid": "abc"}))).unwrap();
        assert_eq!(format!("{credential:?}"), "Credential(<redacted>)");
    }
}
