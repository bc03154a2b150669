use crate::common::{FaceAuthError, Result};
use crate::identity::{Identity, IdentityProvider, SessionRejection};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::path::Path;

type HmacSha256 = Hmac<Sha256>;

const MIN_SECRET_LEN: usize = 16;

/// Verifies shared-secret session tokens of the form
/// `<identity>:<expires_at_unix>:<hex hmac-sha256>`, the signature covering
/// `<identity>:<expires_at_unix>`.
pub struct SignedSessionProvider {
    keyed: HmacSha256,
    leeway_seconds: i64,
}

impl SignedSessionProvider {
    pub fn new(secret: impl Into<Vec<u8>>, leeway_seconds: u64) -> Result<Self> {
        let secret = secret.into();
        if secret.len() < MIN_SECRET_LEN {
            return Err(FaceAuthError::Config(format!(
                "Session secret must be at least {} bytes, got {}",
                MIN_SECRET_LEN,
                secret.len()
            )));
        }

        let keyed = HmacSha256::new_from_slice(&secret)
            .map_err(|e| FaceAuthError::Config(format!("Invalid session secret: {}", e)))?;

        Ok(Self {
            keyed,
            leeway_seconds: i64::try_from(leeway_seconds).unwrap_or(i64::MAX),
        })
    }

    pub fn from_secret_file(path: &Path, leeway_seconds: u64) -> Result<Self> {
        if !path.exists() {
            return Err(FaceAuthError::Config(format!(
                "Session secret file not found: {}", path.display()
            )));
        }

        let contents = std::fs::read_to_string(path)?;
        Self::new(contents.trim().as_bytes().to_vec(), leeway_seconds)
    }

    /// Signs a token the way the issuing side does.
    pub fn sign(&self, identity: &Identity, expires_at: i64) -> String {
        let payload = format!("{}:{}", identity, expires_at);
        let signature = self.mac(payload.as_bytes()).finalize().into_bytes();
        format!("{}:{}", payload, to_hex(&signature))
    }

    pub fn verify_at(&self, token: &str, now: i64) -> std::result::Result<Identity, SessionRejection> {
        let mut parts = token.rsplitn(3, ':');
        let (signature, expires_at, identity) = match (parts.next(), parts.next(), parts.next()) {
            (Some(sig), Some(exp), Some(id)) => (sig, exp, id),
            _ => return Err(SessionRejection::Malformed),
        };

        let signature = from_hex(signature).ok_or(SessionRejection::Malformed)?;
        let payload_len = identity.len() + 1 + expires_at.len();
        self.mac(token[..payload_len].as_bytes())
            .verify_slice(&signature)
            .map_err(|_| SessionRejection::BadSignature)?;

        let expires_at: i64 = expires_at.parse().map_err(|_| SessionRejection::Malformed)?;
        if now > expires_at.saturating_add(self.leeway_seconds) {
            return Err(SessionRejection::Expired);
        }

        Identity::parse(identity).ok_or(SessionRejection::MissingSubject)
    }

    fn mac(&self, payload: &[u8]) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(payload);
        mac
    }
}

impl IdentityProvider for SignedSessionProvider {
    fn verify_session(&self, token: &str) -> std::result::Result<Identity, SessionRejection> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn from_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const NOW: i64 = 1_760_000_000;

    fn provider() -> SignedSessionProvider {
        SignedSessionProvider::new("0123456789abcdef0123456789abcdef", 30).unwrap()
    }

    fn u1() -> Identity {
        Identity::parse("u1").unwrap()
    }

    #[test]
    fn valid_token_yields_identity() {
        let p = provider();
        let token = p.sign(&u1(), NOW + 600);
        assert_eq!(p.verify_at(&token, NOW), Ok(u1()));
    }

    #[test]
    fn identities_may_contain_separators() {
        let p = provider();
        let id = Identity::parse("tenant:42:user").unwrap();
        let token = p.sign(&id, NOW + 600);
        assert_eq!(p.verify_at(&token, NOW), Ok(id));
    }

    #[test]
    fn expiry_honours_leeway() {
        let p = provider();
        let token = p.sign(&u1(), NOW);
        assert!(p.verify_at(&token, NOW + 30).is_ok());
        assert_eq!(p.verify_at(&token, NOW + 31), Err(SessionRejection::Expired));
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let p = provider();
        let token = p.sign(&u1(), NOW + 600);

        let forged = token.replacen("u1", "u2", 1);
        assert_eq!(p.verify_at(&forged, NOW), Err(SessionRejection::BadSignature));

        let extended = token.replacen(&(NOW + 600).to_string(), &(NOW + 6000).to_string(), 1);
        assert_eq!(p.verify_at(&extended, NOW), Err(SessionRejection::BadSignature));

        let other = SignedSessionProvider::new("another-secret-of-enough-length", 30).unwrap();
        assert_eq!(other.verify_at(&token, NOW), Err(SessionRejection::BadSignature));
    }

    #[test]
    fn garbage_is_malformed() {
        let p = provider();
        assert_eq!(p.verify_at("not-a-token", NOW), Err(SessionRejection::Malformed));
        assert_eq!(p.verify_at("u1:123:zz", NOW), Err(SessionRejection::Malformed));
    }

    #[test]
    fn short_or_missing_secrets_are_config_errors() {
        assert!(matches!(SignedSessionProvider::new("short", 0), Err(FaceAuthError::Config(_))));

        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("session.key");
        assert!(matches!(
            SignedSessionProvider::from_secret_file(&missing, 0),
            Err(FaceAuthError::Config(_))
        ));

        std::fs::write(&missing, "0123456789abcdef0123456789abcdef\n").unwrap();
        let p = SignedSessionProvider::from_secret_file(&missing, 0).unwrap();
        let token = provider().sign(&u1(), NOW + 10);
        assert_eq!(p.verify_at(&token, NOW), Ok(u1()));
    }
}
