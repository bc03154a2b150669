//! Maps opaque session tokens to identities.
//!
//! The provider does the cryptographic work; this module only fixes the
//! contract and collapses every provider rejection into `InvalidSession` so
//! callers never learn why a token was refused.

pub mod signed;

use crate::common::{FaceAuthError, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

pub use signed::SignedSessionProvider;

/// Externally issued, stable user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(String);

impl Identity {
    /// `None` for blank identifiers.
    pub fn parse(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() || value.chars().any(char::is_control) {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a provider refused a token. Only ever logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRejection {
    Malformed,
    BadSignature,
    Expired,
    Revoked,
    MissingSubject,
    Unavailable(String),
}

pub trait IdentityProvider {
    fn verify_session(&self, token: &str) -> std::result::Result<Identity, SessionRejection>;
}

impl<T: IdentityProvider + ?Sized> IdentityProvider for &T {
    fn verify_session(&self, token: &str) -> std::result::Result<Identity, SessionRejection> {
        (**self).verify_session(token)
    }
}

impl<T: IdentityProvider + ?Sized> IdentityProvider for Arc<T> {
    fn verify_session(&self, token: &str) -> std::result::Result<Identity, SessionRejection> {
        (**self).verify_session(token)
    }
}

pub struct IdentityResolver<P> {
    provider: P,
}

impl<P: IdentityProvider> IdentityResolver<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn resolve(&self, token: Option<&str>) -> Result<Identity> {
        let token = match token {
            Some(token) if !token.trim().is_empty() => token,
            _ => return Err(FaceAuthError::MissingSession),
        };

        self.provider.verify_session(token).map_err(|reason| {
            tracing::debug!(
                "Session {} rejected by identity provider: {:?}",
                session_fingerprint(token),
                reason
            );
            FaceAuthError::InvalidSession
        })
    }
}

/// Short, non-reversible handle for a bearer token, safe to put in logs.
pub fn session_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().take(6).map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider(std::result::Result<&'static str, SessionRejection>);

    impl IdentityProvider for FixedProvider {
        fn verify_session(&self, _token: &str) -> std::result::Result<Identity, SessionRejection> {
            self.0
                .clone()
                .map(|id| Identity::parse(id).unwrap())
        }
    }

    #[test]
    fn missing_or_blank_token_is_missing_session() {
        let resolver = IdentityResolver::new(FixedProvider(Ok("u1")));
        assert!(matches!(resolver.resolve(None), Err(FaceAuthError::MissingSession)));
        assert!(matches!(resolver.resolve(Some("")), Err(FaceAuthError::MissingSession)));
        assert!(matches!(resolver.resolve(Some("   ")), Err(FaceAuthError::MissingSession)));
    }

    #[test]
    fn every_rejection_collapses_to_invalid_session() {
        for reason in [
            SessionRejection::Malformed,
            SessionRejection::BadSignature,
            SessionRejection::Expired,
            SessionRejection::Revoked,
            SessionRejection::MissingSubject,
            SessionRejection::Unavailable("timeout".into()),
        ] {
            let resolver = IdentityResolver::new(FixedProvider(Err(reason)));
            assert!(matches!(resolver.resolve(Some("tok")), Err(FaceAuthError::InvalidSession)));
        }
    }

    #[test]
    fn accepted_token_resolves_identity() {
        let resolver = IdentityResolver::new(FixedProvider(Ok("u1")));
        assert_eq!(resolver.resolve(Some("tok")).unwrap().as_str(), "u1");
    }

    #[test]
    fn fingerprint_is_stable_and_short() {
        assert_eq!(session_fingerprint("abc"), session_fingerprint("abc"));
        assert_ne!(session_fingerprint("abc"), session_fingerprint("abd"));
        assert_eq!(session_fingerprint("abc").len(), 12);
    }

    #[test]
    fn blank_identities_do_not_parse() {
        assert!(Identity::parse("").is_none());
        assert!(Identity::parse(" \t").is_none());
        assert!(Identity::parse("u\n1").is_none());
        assert!(Identity::parse("u1").is_some());
    }
}
