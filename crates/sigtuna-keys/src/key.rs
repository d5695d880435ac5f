#![forbid(unsafe_code)]

//! Key types used for signing and verification.

use sigtuna_crypto::SigningKey;

/// Intended usage of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUsage {
    Sign,
    Verify,
    Any,
}

/// The underlying key material.
pub enum KeyData {
    Rsa {
        private: Option<rsa::RsaPrivateKey>,
        public: rsa::RsaPublicKey,
    },
    Dsa {
        private: Option<dsa::SigningKey>,
        public: dsa::VerifyingKey,
    },
    EcP256 {
        private: Option<p256::ecdsa::SigningKey>,
        public: p256::ecdsa::VerifyingKey,
    },
    EcP384 {
        private: Option<p384::ecdsa::SigningKey>,
        public: p384::ecdsa::VerifyingKey,
    },
    Hmac(Vec<u8>),
}

impl std::fmt::Debug for KeyData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rsa { private, .. } => {
                if private.is_some() {
                    write!(f, "RSA private+public key")
                } else {
                    write!(f, "RSA public key")
                }
            }
            Self::Dsa { private, .. } => {
                if private.is_some() {
                    write!(f, "DSA private+public key")
                } else {
                    write!(f, "DSA public key")
                }
            }
            Self::EcP256 { private, .. } => {
                if private.is_some() {
                    write!(f, "EC P-256 private+public key")
                } else {
                    write!(f, "EC P-256 public key")
                }
            }
            Self::EcP384 { private, .. } => {
                if private.is_some() {
                    write!(f, "EC P-384 private+public key")
                } else {
                    write!(f, "EC P-384 public key")
                }
            }
            Self::Hmac(k) => write!(f, "HMAC key ({} bytes)", k.len()),
        }
    }
}

/// A key with an optional name and certificate chain.
#[derive(Debug)]
pub struct Key {
    /// Optional name, matched against `<KeyName>` clauses.
    pub name: Option<String>,
    /// The key material.
    pub data: KeyData,
    /// The intended usage.
    pub usage: KeyUsage,
    /// X.509 certificate chain (DER-encoded), leaf first when known.
    pub x509_chain: Vec<Vec<u8>>,
}

impl Key {
    /// Create a new key.
    pub fn new(data: KeyData, usage: KeyUsage) -> Self {
        Self {
            name: None,
            data,
            usage,
            x509_chain: Vec::new(),
        }
    }

    /// Set the key name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Convert to the crypto layer's `SigningKey`.
    ///
    /// Prefers the private half when present so the same `Key` can both
    /// sign and verify.
    pub fn to_signing_key(&self) -> SigningKey {
        match &self.data {
            KeyData::Rsa { private: Some(pk), .. } => SigningKey::Rsa(pk.clone()),
            KeyData::Rsa { public, .. } => SigningKey::RsaPublic(public.clone()),
            KeyData::Dsa { private: Some(sk), .. } => SigningKey::Dsa(sk.clone()),
            KeyData::Dsa { public, .. } => SigningKey::DsaPublic(public.clone()),
            KeyData::EcP256 { private: Some(sk), .. } => SigningKey::EcP256(sk.clone()),
            KeyData::EcP256 { public, .. } => SigningKey::EcP256Public(*public),
            KeyData::EcP384 { private: Some(sk), .. } => SigningKey::EcP384(sk.clone()),
            KeyData::EcP384 { public, .. } => SigningKey::EcP384Public(*public),
            KeyData::Hmac(k) => SigningKey::Hmac(k.clone()),
        }
    }

    /// Whether the key carries private material.
    pub fn has_private(&self) -> bool {
        match &self.data {
            KeyData::Rsa { private, .. } => private.is_some(),
            KeyData::Dsa { private, .. } => private.is_some(),
            KeyData::EcP256 { private, .. } => private.is_some(),
            KeyData::EcP384 { private, .. } => private.is_some(),
            KeyData::Hmac(_) => true,
        }
    }

    /// The RSA public key, if this is an RSA key.
    pub fn rsa_public_key(&self) -> Option<&rsa::RsaPublicKey> {
        match &self.data {
            KeyData::Rsa { public, .. } => Some(public),
            _ => None,
        }
    }

    /// The RSA private key, if present.
    pub fn rsa_private_key(&self) -> Option<&rsa::RsaPrivateKey> {
        match &self.data {
            KeyData::Rsa { private: Some(pk), .. } => Some(pk),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_key_converts_to_signing_key() {
        let key = Key::new(KeyData::Hmac(b"secret".to_vec()), KeyUsage::Any);
        assert!(key.has_private());
        match key.to_signing_key() {
            SigningKey::Hmac(bytes) => assert_eq!(bytes, b"secret"),
            _ => panic!("expected HMAC signing key"),
        }
    }

    #[test]
    fn debug_never_prints_key_material() {
        let key = Key::new(KeyData::Hmac(b"secret".to_vec()), KeyUsage::Sign)
            .with_name("test-key");
        let text = format!("{key:?}");
        assert!(!text.contains("secret"));
        assert!(text.contains("HMAC key (6 bytes)"));
    }
}
