//! # Credentials
//!
//! Signed, time-limited bearer credentials.
//!
//! ```text
//! v1.<user_id>.<expires_unix>.<mac_hex>
//! ```
//!
//! The MAC is a keyed BLAKE3 hash over `v1.<user_id>.<expires_unix>`. User ids
//! may not contain `.`, so the credential splits unambiguously.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::AuthError;

/// User identifier.
pub type UserId = String;

const VERSION: &str = "v1";

/// Resolves a credential to a user id.
pub trait Authenticator: Send + Sync {
    /// Verifies `credential`.
    ///
    /// # Errors
    ///
    /// Fails if the credential is missing, malformed, tampered with or expired.
    fn verify(&self, credential: Option<&str>) -> Result<UserId, AuthError>;
}

/// Issues and verifies BLAKE3-signed credentials.
#[derive(Clone)]
pub struct TokenAuthenticator {
    key: [u8; 32],
}

impl TokenAuthenticator {
    /// Creates an authenticator from a 32-byte signing key.
    #[must_use]
    pub const fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Issues a credential for `user_id` valid for `ttl_secs` from now.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Malformed`] if the user id is empty or contains `.`.
    pub fn issue(&self, user_id: &str, ttl_secs: u64) -> Result<String, AuthError> {
        self.issue_at(user_id, now_unix().saturating_add(ttl_secs))
    }

    /// Issues a credential expiring at `expires_unix`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Malformed`] if the user id is empty or contains `.`.
    pub fn issue_at(&self, user_id: &str, expires_unix: u64) -> Result<String, AuthError> {
        if user_id.is_empty() || user_id.contains('.') {
            return Err(AuthError::Malformed("user id must be non-empty and dot-free"));
        }
        let payload = format!("{VERSION}.{user_id}.{expires_unix}");
        let mac = blake3::keyed_hash(&self.key, payload.as_bytes());
        Ok(format!("{payload}.{}", mac.to_hex()))
    }

    /// Verifies a credential against an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`Authenticator::verify`].
    pub fn verify_at(&self, credential: Option<&str>, now_unix: u64) -> Result<UserId, AuthError> {
        let credential = credential.ok_or(AuthError::Missing)?.trim();
        if credential.is_empty() {
            return Err(AuthError::Missing);
        }

        let (payload, mac_hex) = credential
            .rsplit_once('.')
            .ok_or(AuthError::Malformed("missing signature"))?;

        let mut parts = payload.split('.');
        let (Some(version), Some(user_id), Some(expires), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::Malformed("expected four fields"));
        };
        if version != VERSION {
            return Err(AuthError::Malformed("unsupported version"));
        }
        if user_id.is_empty() {
            return Err(AuthError::Malformed("empty user id"));
        }
        let expires: u64 = expires
            .parse()
            .map_err(|_| AuthError::Malformed("expiry is not a unix timestamp"))?;

        let presented =
            blake3::Hash::from_hex(mac_hex).map_err(|_| AuthError::Malformed("signature is not hex"))?;
        // blake3::Hash equality is constant time.
        if presented != blake3::keyed_hash(&self.key, payload.as_bytes()) {
            return Err(AuthError::BadSignature);
        }

        if now_unix >= expires {
            return Err(AuthError::Expired(expires));
        }

        Ok(user_id.to_owned())
    }
}

impl Authenticator for TokenAuthenticator {
    fn verify(&self, credential: Option<&str>) -> Result<UserId, AuthError> {
        self.verify_at(credential, now_unix())
    }
}

impl std::fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose the key.
        f.debug_struct("TokenAuthenticator")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> TokenAuthenticator {
        TokenAuthenticator::new([9u8; 32])
    }

    #[test]
    fn test_issue_then_verify() {
        let token = auth().issue_at("alice", 1_000).unwrap();
        assert!(token.starts_with("v1.alice.1000."));
        assert_eq!(auth().verify_at(Some(&token), 999).unwrap(), "alice");
    }

    #[test]
    fn test_missing_and_blank() {
        assert_eq!(auth().verify_at(None, 0), Err(AuthError::Missing));
        assert_eq!(auth().verify_at(Some("  "), 0), Err(AuthError::Missing));
    }

    #[test]
    fn test_expired() {
        let token = auth().issue_at("alice", 1_000).unwrap();
        assert_eq!(
            auth().verify_at(Some(&token), 1_000),
            Err(AuthError::Expired(1_000))
        );
    }

    #[test]
    fn test_tampered_user_rejected() {
        let token = auth().issue_at("alice", 1_000).unwrap();
        let forged = token.replacen("alice", "mallory", 1);
        assert_eq!(auth().verify_at(Some(&forged), 0), Err(AuthError::BadSignature));
    }

    #[test]
    fn test_other_key_rejected() {
        let token = TokenAuthenticator::new([1u8; 32]).issue_at("alice", 1_000).unwrap();
        assert_eq!(auth().verify_at(Some(&token), 0), Err(AuthError::BadSignature));
    }

    #[test]
    fn test_malformed_shapes() {
        for bad in ["garbage", "v1.alice.1000", "v2.alice.1000.00", "v1.alice.soon.00", "v1.a.b.c.d"] {
            assert!(
                matches!(auth().verify_at(Some(bad), 0), Err(AuthError::Malformed(_))),
                "{bad} should be malformed"
            );
        }
    }

    #[test]
    fn test_dotted_user_cannot_be_issued() {
        assert!(auth().issue("a.b", 60).is_err());
        assert!(auth().issue("", 60).is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", auth());
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains('9'));
    }
}
