//! Digest Provider
//!
//! One-way digests of secrets and constant-time verification against a
//! stored digest. Plaintext secrets are never stored; only the hex digest
//! produced here is.
//!
//! An optional HMAC key upgrades [`DigestProvider::secret_digest`] from plain
//! SHA-256 to HMAC-SHA256. Short secrets such as six-symbol codes have a
//! small keyspace, so an unkeyed digest table can be reversed offline; a keyed
//! one cannot without the key. Explicit signing without a key reports
//! [`DigestError::HmacUnavailable`] instead of producing an empty signature.

use std::fmt;

use thiserror::Error;

use crate::crypto::{constant_time_eq, hmac_sha256, sha256, to_hex};

/// Digest / signature errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DigestError {
    /// No HMAC secret was provisioned
    #[error("HMAC signing is unavailable: no secret configured")]
    HmacUnavailable,

    /// Signature is not valid hex
    #[error("Malformed signature")]
    MalformedSignature,

    /// The MAC rejected the configured key
    #[error("HMAC key rejected")]
    InvalidKey,
}

/// Hashing and verification of secrets
#[derive(Clone, Default)]
pub struct DigestProvider {
    hmac_secret: Option<Vec<u8>>,
}

impl DigestProvider {
    /// Provider without an HMAC key. Empty keys are treated as absent.
    pub fn new(hmac_secret: Option<Vec<u8>>) -> Self {
        Self {
            hmac_secret: hmac_secret.filter(|k| !k.is_empty()),
        }
    }

    pub fn has_hmac_secret(&self) -> bool {
        self.hmac_secret.is_some()
    }

    /// SHA-256 of `value`, lowercase hex.
    pub fn hash(&self, value: &str) -> String {
        to_hex(&sha256(value.as_bytes()))
    }

    /// Constant-time check of `value` against a digest from [`Self::hash`].
    pub fn verify(&self, value: &str, stored: &str) -> bool {
        constant_time_eq(self.hash(value).as_bytes(), stored.as_bytes())
    }

    /// Digest for short-lived secrets: HMAC-SHA256 when keyed, else SHA-256.
    pub fn secret_digest(&self, value: &str) -> Result<String, DigestError> {
        match &self.hmac_secret {
            Some(key) => keyed(key, value),
            None => Ok(self.hash(value)),
        }
    }

    /// Constant-time check against a digest from [`Self::secret_digest`].
    /// A digest that cannot be computed never matches.
    pub fn verify_secret(&self, value: &str, stored: &str) -> bool {
        self.secret_digest(value)
            .is_ok_and(|digest| constant_time_eq(digest.as_bytes(), stored.as_bytes()))
    }

    /// HMAC-SHA256 signature of `data`, lowercase hex.
    pub fn sign(&self, data: &str) -> Result<String, DigestError> {
        let key = self.hmac_secret.as_ref().ok_or(DigestError::HmacUnavailable)?;
        keyed(key, data)
    }

    /// Verify a signature from [`Self::sign`] in constant time.
    pub fn verify_signature(&self, data: &str, signature: &str) -> Result<bool, DigestError> {
        let key = self.hmac_secret.as_ref().ok_or(DigestError::HmacUnavailable)?;
        let tag = hex::decode(signature).map_err(|_| DigestError::MalformedSignature)?;
        Ok(crate::crypto::hmac_sha256_verify(key, data.as_bytes(), &tag))
    }
}

fn keyed(key: &[u8], data: &str) -> Result<String, DigestError> {
    hmac_sha256(key, data.as_bytes())
        .map(|mac| to_hex(&mac))
        .ok_or(DigestError::InvalidKey)
}

impl fmt::Debug for DigestProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestProvider")
            .field(
                "hmac_secret",
                &self.hmac_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_sha256_hex() {
        let provider = DigestProvider::default();
        assert_eq!(
            provider.hash("hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_verify() {
        let provider = DigestProvider::default();
        let stored = provider.hash("K7MX2Q");
        assert!(provider.verify("K7MX2Q", &stored));
        assert!(!provider.verify("K7MX2R", &stored));
        assert!(!provider.verify("K7MX2Q", "deadbeef"));
    }

    #[test]
    fn test_secret_digest_keyed_differs_from_plain() {
        let plain = DigestProvider::default();
        let keyed = DigestProvider::new(Some(b"otp-pepper".to_vec()));

        let a = plain.secret_digest("ABC234").unwrap();
        let b = keyed.secret_digest("ABC234").unwrap();
        assert_ne!(a, b);
        assert_eq!(a, plain.hash("ABC234"));

        assert!(keyed.verify_secret("ABC234", &b));
        assert!(!keyed.verify_secret("ABC234", &a));
    }

    #[test]
    fn test_hmac_unavailable_without_secret() {
        let provider = DigestProvider::new(None);
        assert_eq!(provider.sign("data"), Err(DigestError::HmacUnavailable));
        assert_eq!(
            provider.verify_signature("data", "00"),
            Err(DigestError::HmacUnavailable)
        );

        // Empty key counts as no key
        let empty = DigestProvider::new(Some(Vec::new()));
        assert!(!empty.has_hmac_secret());
        assert_eq!(empty.sign("data"), Err(DigestError::HmacUnavailable));
    }

    #[test]
    fn test_sign_and_verify_signature() {
        let provider = DigestProvider::new(Some(b"Jefe".to_vec()));
        let signature = provider.sign("what do ya want for nothing?").unwrap();
        assert_eq!(
            signature,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
        assert_eq!(
            provider.verify_signature("what do ya want for nothing?", &signature),
            Ok(true)
        );
        assert_eq!(provider.verify_signature("tampered", &signature), Ok(false));
        assert_eq!(
            provider.verify_signature("data", "zz"),
            Err(DigestError::MalformedSignature)
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let provider = DigestProvider::new(Some(b"super-secret".to_vec()));
        let debug = format!("{:?}", provider);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("super-secret"));
    }
}
