#![forbid(unsafe_code)]

//! Key loading from PEM, DER, and raw binary formats.

use crate::key::{Key, KeyData, KeyUsage};
use sigtuna_core::{Error, Result};

/// Load an RSA private key from PEM data (PKCS#8 or PKCS#1).
pub fn load_rsa_private_pem(pem_data: &[u8]) -> Result<Key> {
    use pkcs8::DecodePrivateKey;
    let pem_str = std::str::from_utf8(pem_data)
        .map_err(|e| Error::Key(format!("invalid PEM encoding: {e}")))?;

    // Try PKCS#8 first
    if let Ok(pk) = rsa::RsaPrivateKey::from_pkcs8_pem(pem_str) {
        let public = pk.to_public_key();
        return Ok(Key::new(
            KeyData::Rsa {
                private: Some(pk),
                public,
            },
            KeyUsage::Any,
        ));
    }

    // Try PKCS#1
    use pkcs1::DecodeRsaPrivateKey;
    let pk = rsa::RsaPrivateKey::from_pkcs1_pem(pem_str)
        .map_err(|e| Error::Key(format!("failed to parse RSA private key PEM: {e}")))?;
    let public = pk.to_public_key();
    Ok(Key::new(
        KeyData::Rsa {
            private: Some(pk),
            public,
        },
        KeyUsage::Any,
    ))
}

/// Load an RSA public key from PEM data (SPKI or PKCS#1).
pub fn load_rsa_public_pem(pem_data: &[u8]) -> Result<Key> {
    use pkcs8::DecodePublicKey;
    let pem_str = std::str::from_utf8(pem_data)
        .map_err(|e| Error::Key(format!("invalid PEM encoding: {e}")))?;

    // Try SPKI first
    if let Ok(pk) = rsa::RsaPublicKey::from_public_key_pem(pem_str) {
        return Ok(Key::new(
            KeyData::Rsa {
                private: None,
                public: pk,
            },
            KeyUsage::Verify,
        ));
    }

    // Try PKCS#1
    use pkcs1::DecodeRsaPublicKey;
    let pk = rsa::RsaPublicKey::from_pkcs1_pem(pem_str)
        .map_err(|e| Error::Key(format!("failed to parse RSA public key PEM: {e}")))?;
    Ok(Key::new(
        KeyData::Rsa {
            private: None,
            public: pk,
        },
        KeyUsage::Verify,
    ))
}

/// Load an EC P-256 private key from PKCS#8 PEM data.
pub fn load_ec_p256_private_pem(pem_data: &[u8]) -> Result<Key> {
    use pkcs8::DecodePrivateKey;
    let pem_str = std::str::from_utf8(pem_data)
        .map_err(|e| Error::Key(format!("invalid PEM encoding: {e}")))?;

    let sk = p256::ecdsa::SigningKey::from_pkcs8_pem(pem_str)
        .map_err(|e| Error::Key(format!("failed to parse EC P-256 private key: {e}")))?;
    let vk = *sk.verifying_key();
    Ok(Key::new(
        KeyData::EcP256 {
            private: Some(sk),
            public: vk,
        },
        KeyUsage::Any,
    ))
}

/// Load an EC P-384 private key from PKCS#8 PEM data.
pub fn load_ec_p384_private_pem(pem_data: &[u8]) -> Result<Key> {
    use pkcs8::DecodePrivateKey;
    let pem_str = std::str::from_utf8(pem_data)
        .map_err(|e| Error::Key(format!("invalid PEM encoding: {e}")))?;

    let sk = p384::ecdsa::SigningKey::from_pkcs8_pem(pem_str)
        .map_err(|e| Error::Key(format!("failed to parse EC P-384 private key: {e}")))?;
    let vk = *sk.verifying_key();
    Ok(Key::new(
        KeyData::EcP384 {
            private: Some(sk),
            public: vk,
        },
        KeyUsage::Any,
    ))
}

/// Load an HMAC key from raw binary data.
pub fn load_hmac_key(data: &[u8]) -> Key {
    Key::new(KeyData::Hmac(data.to_vec()), KeyUsage::Any)
}

/// Load a private key from PKCS#8 DER, trying RSA, the EC curves, then DSA.
pub fn load_private_key_pkcs8_der(der: &[u8]) -> Result<Key> {
    use pkcs8::DecodePrivateKey;

    if let Ok(pk) = rsa::RsaPrivateKey::from_pkcs8_der(der) {
        let public = pk.to_public_key();
        return Ok(Key::new(
            KeyData::Rsa {
                private: Some(pk),
                public,
            },
            KeyUsage::Any,
        ));
    }
    if let Ok(sk) = p256::ecdsa::SigningKey::from_pkcs8_der(der) {
        let vk = *sk.verifying_key();
        return Ok(Key::new(
            KeyData::EcP256 {
                private: Some(sk),
                public: vk,
            },
            KeyUsage::Any,
        ));
    }
    if let Ok(sk) = p384::ecdsa::SigningKey::from_pkcs8_der(der) {
        let vk = *sk.verifying_key();
        return Ok(Key::new(
            KeyData::EcP384 {
                private: Some(sk),
                public: vk,
            },
            KeyUsage::Any,
        ));
    }
    {
        use pkcs8::der::Decode;
        if let Ok(pki) = pkcs8::PrivateKeyInfo::from_der(der) {
            if let Ok(sk) = dsa::SigningKey::try_from(pki) {
                let vk = sk.verifying_key().clone();
                return Ok(Key::new(
                    KeyData::Dsa {
                        private: Some(sk),
                        public: vk,
                    },
                    KeyUsage::Any,
                ));
            }
        }
    }
    Err(Error::Key("unsupported PKCS#8 private key type".into()))
}

/// Auto-detect key format and load from PEM data.
///
/// Tries RSA private, RSA public, SPKI public, EC P-256 private, EC P-384
/// private, then X.509 certificate, in order.
pub fn load_pem_auto(pem_data: &[u8]) -> Result<Key> {
    if let Ok(key) = load_rsa_private_pem(pem_data) {
        return Ok(key);
    }
    if let Ok(key) = load_rsa_public_pem(pem_data) {
        return Ok(key);
    }
    // SPKI PEM covers EC public keys too
    if let Ok(key) = load_spki_pem(pem_data) {
        return Ok(key);
    }
    if let Ok(key) = load_ec_p256_private_pem(pem_data) {
        return Ok(key);
    }
    if let Ok(key) = load_ec_p384_private_pem(pem_data) {
        return Ok(key);
    }
    if let Ok(key) = load_x509_cert_pem(pem_data) {
        return Ok(key);
    }
    Err(Error::Key(
        "unable to auto-detect key format from PEM data".into(),
    ))
}

/// Load a public key from a PEM-encoded SubjectPublicKeyInfo (`-----BEGIN PUBLIC KEY-----`).
pub fn load_spki_pem(pem_data: &[u8]) -> Result<Key> {
    let (label, der_bytes) = pem_rfc7468::decode_vec(pem_data)
        .map_err(|e| Error::Key(format!("failed to decode SPKI PEM: {e}")))?;
    if label != "PUBLIC KEY" {
        return Err(Error::Key(format!(
            "expected PUBLIC KEY PEM label, got: {label}"
        )));
    }
    load_spki_der(&der_bytes)
}

/// Load a public key from DER-encoded SubjectPublicKeyInfo.
pub fn load_spki_der(spki_der: &[u8]) -> Result<Key> {
    use spki::DecodePublicKey;

    if let Ok(pk) = rsa::RsaPublicKey::from_public_key_der(spki_der) {
        return Ok(Key::new(
            KeyData::Rsa {
                private: None,
                public: pk,
            },
            KeyUsage::Verify,
        ));
    }
    if let Ok(vk) = p256::ecdsa::VerifyingKey::from_public_key_der(spki_der) {
        return Ok(Key::new(
            KeyData::EcP256 {
                private: None,
                public: vk,
            },
            KeyUsage::Verify,
        ));
    }
    if let Ok(vk) = p384::ecdsa::VerifyingKey::from_public_key_der(spki_der) {
        return Ok(Key::new(
            KeyData::EcP384 {
                private: None,
                public: vk,
            },
            KeyUsage::Verify,
        ));
    }
    Err(Error::Key("unsupported public key type in SPKI".into()))
}

/// Load a public key from a PEM-encoded X.509 certificate.
pub fn load_x509_cert_pem(pem_data: &[u8]) -> Result<Key> {
    let pem_str = std::str::from_utf8(pem_data)
        .map_err(|e| Error::Key(format!("invalid PEM encoding: {e}")))?;

    // Some PEM files carry extra trailing newlines
    let trimmed = pem_str.trim();

    let (label, der_bytes) = pem_rfc7468::decode_vec(trimmed.as_bytes())
        .map_err(|e| Error::Certificate(format!("failed to decode certificate PEM: {e}")))?;

    if label != "CERTIFICATE" {
        return Err(Error::Certificate(format!(
            "expected CERTIFICATE PEM label, got: {label}"
        )));
    }

    load_x509_cert_der(&der_bytes)
}

/// Load a public key from a DER-encoded X.509 certificate.
///
/// The certificate itself is attached as the key's `x509_chain`.
pub fn load_x509_cert_der(data: &[u8]) -> Result<Key> {
    use der::{Decode, Encode};

    let cert = x509_cert::Certificate::from_der(data)
        .map_err(|e| Error::Certificate(format!("failed to parse certificate: {e}")))?;

    let spki_der = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| Error::Certificate(format!("failed to encode certificate SPKI: {e}")))?;

    let mut key = load_spki_der(&spki_der)?;
    key.x509_chain = vec![data.to_vec()];
    Ok(key)
}

/// Load a key from a file, auto-detecting format.
pub fn load_key_file(path: &std::path::Path) -> Result<Key> {
    let data = std::fs::read(path)?;

    // Certificate files by extension
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if ext.eq_ignore_ascii_case("crt") || ext.eq_ignore_ascii_case("cer") {
        if data.starts_with(b"-----BEGIN") {
            return load_x509_cert_pem(&data);
        }
        return load_x509_cert_der(&data);
    }

    if data.starts_with(b"-----BEGIN") {
        return load_pem_auto(&data);
    }

    // DER fallbacks
    if let Ok(key) = load_private_key_pkcs8_der(&data) {
        return Ok(key);
    }
    use pkcs1::DecodeRsaPrivateKey;
    if let Ok(pk) = rsa::RsaPrivateKey::from_pkcs1_der(&data) {
        let public = pk.to_public_key();
        return Ok(Key::new(
            KeyData::Rsa {
                private: Some(pk),
                public,
            },
            KeyUsage::Any,
        ));
    }
    if let Ok(key) = load_spki_der(&data) {
        return Ok(key);
    }
    if let Ok(key) = load_x509_cert_der(&data) {
        return Ok(key);
    }

    Err(Error::Key(format!(
        "unable to auto-detect key format from file: {}",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ec_p256_pkcs8_pem_round_trip() {
        use pkcs8::{EncodePrivateKey, LineEnding};
        let sk = p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        let pem = sk.to_pkcs8_pem(LineEnding::LF).unwrap();
        let key = load_pem_auto(pem.as_bytes()).unwrap();
        assert!(key.has_private());
        match key.data {
            KeyData::EcP256 { public, .. } => assert_eq!(&public, sk.verifying_key()),
            other => panic!("unexpected key data: {other:?}"),
        }
    }

    #[test]
    fn ec_p256_spki_pem_loads_public_key() {
        use pkcs8::LineEnding;
        use spki::EncodePublicKey;
        let sk = p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        let vk = sk.verifying_key();
        let pem = vk.to_public_key_pem(LineEnding::LF).unwrap();
        let key = load_spki_pem(pem.as_bytes()).unwrap();
        assert!(!key.has_private());
        match key.data {
            KeyData::EcP256 { public, .. } => assert_eq!(&public, vk),
            other => panic!("unexpected key data: {other:?}"),
        }
    }

    #[test]
    fn garbage_pem_is_rejected() {
        assert!(matches!(
            load_pem_auto(b"not a key at all"),
            Err(Error::Key(_))
        ));
    }

    #[test]
    fn hmac_key_keeps_raw_bytes() {
        let key = load_hmac_key(b"raw bytes");
        match key.data {
            KeyData::Hmac(ref bytes) => assert_eq!(bytes, b"raw bytes"),
            other => panic!("unexpected key data: {other:?}"),
        }
    }
}
