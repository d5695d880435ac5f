#![forbid(unsafe_code)]

//! Signature algorithm implementations (RSA, RSA-PSS, DSA, ECDSA, HMAC).

use sigtuna_core::{algorithm, Error, Result};

/// Key material for signature operations.
pub enum SigningKey {
    Rsa(rsa::RsaPrivateKey),
    RsaPublic(rsa::RsaPublicKey),
    Dsa(dsa::SigningKey),
    DsaPublic(dsa::VerifyingKey),
    EcP256(p256::ecdsa::SigningKey),
    EcP256Public(p256::ecdsa::VerifyingKey),
    EcP384(p384::ecdsa::SigningKey),
    EcP384Public(p384::ecdsa::VerifyingKey),
    Hmac(Vec<u8>),
}

/// Algorithm parameters declared in the `SignatureMethod` element.
///
/// These flow from the parsed or constructed SignedInfo into the provider,
/// so the declared parameters are what the provider actually uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignatureParams {
    /// RSA-PSS salt length in bytes.  Defaults to the digest length.
    pub pss_salt_length: Option<usize>,
    /// HMAC output length in bits (truncated HMAC).
    pub hmac_output_bits: Option<usize>,
}

/// Trait for signature algorithms.
pub trait SignatureAlgorithm: Send {
    fn uri(&self) -> &'static str;
    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>>;
    fn verify(&self, key: &SigningKey, data: &[u8], signature: &[u8]) -> Result<bool>;
}

/// URIs of the built-in signature algorithms.
pub fn standard_uris() -> &'static [&'static str] {
    &[
        algorithm::RSA_SHA1,
        algorithm::RSA_SHA224,
        algorithm::RSA_SHA256,
        algorithm::RSA_SHA384,
        algorithm::RSA_SHA512,
        algorithm::RSA_PSS_SHA1,
        algorithm::RSA_PSS_SHA224,
        algorithm::RSA_PSS_SHA256,
        algorithm::RSA_PSS_SHA384,
        algorithm::RSA_PSS_SHA512,
        algorithm::DSA_SHA1,
        algorithm::DSA_SHA256,
        algorithm::ECDSA_SHA1,
        algorithm::ECDSA_SHA256,
        algorithm::ECDSA_SHA384,
        algorithm::ECDSA_SHA512,
        algorithm::HMAC_SHA1,
        algorithm::HMAC_SHA224,
        algorithm::HMAC_SHA256,
        algorithm::HMAC_SHA384,
        algorithm::HMAC_SHA512,
    ]
}

/// Create a built-in signature algorithm from its URI.
pub fn from_uri(uri: &str, params: &SignatureParams) -> Result<Box<dyn SignatureAlgorithm>> {
    match uri {
        algorithm::RSA_SHA1 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA1, hash: HashType::Sha1 })),
        algorithm::RSA_SHA224 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA224, hash: HashType::Sha224 })),
        algorithm::RSA_SHA256 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA256, hash: HashType::Sha256 })),
        algorithm::RSA_SHA384 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA384, hash: HashType::Sha384 })),
        algorithm::RSA_SHA512 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA512, hash: HashType::Sha512 })),

        algorithm::RSA_PSS_SHA1 => Ok(Box::new(RsaPss { uri: algorithm::RSA_PSS_SHA1, hash: HashType::Sha1, salt_length: params.pss_salt_length })),
        algorithm::RSA_PSS_SHA224 => Ok(Box::new(RsaPss { uri: algorithm::RSA_PSS_SHA224, hash: HashType::Sha224, salt_length: params.pss_salt_length })),
        algorithm::RSA_PSS_SHA256 => Ok(Box::new(RsaPss { uri: algorithm::RSA_PSS_SHA256, hash: HashType::Sha256, salt_length: params.pss_salt_length })),
        algorithm::RSA_PSS_SHA384 => Ok(Box::new(RsaPss { uri: algorithm::RSA_PSS_SHA384, hash: HashType::Sha384, salt_length: params.pss_salt_length })),
        algorithm::RSA_PSS_SHA512 => Ok(Box::new(RsaPss { uri: algorithm::RSA_PSS_SHA512, hash: HashType::Sha512, salt_length: params.pss_salt_length })),

        algorithm::DSA_SHA1 => Ok(Box::new(DsaSign { uri: algorithm::DSA_SHA1, hash: HashType::Sha1, half_len: 20 })),
        algorithm::DSA_SHA256 => Ok(Box::new(DsaSign { uri: algorithm::DSA_SHA256, hash: HashType::Sha256, half_len: 32 })),

        algorithm::ECDSA_SHA1 => Ok(Box::new(EcdsaP256 { uri: algorithm::ECDSA_SHA1 })),
        algorithm::ECDSA_SHA256 => Ok(Box::new(EcdsaP256 { uri: algorithm::ECDSA_SHA256 })),
        algorithm::ECDSA_SHA384 => Ok(Box::new(EcdsaP384 { uri: algorithm::ECDSA_SHA384 })),
        algorithm::ECDSA_SHA512 => Ok(Box::new(EcdsaP384 { uri: algorithm::ECDSA_SHA512 })),

        algorithm::HMAC_SHA1 => Ok(Box::new(HmacSign { uri: algorithm::HMAC_SHA1, hash: HashType::Sha1, output_bits: params.hmac_output_bits })),
        algorithm::HMAC_SHA224 => Ok(Box::new(HmacSign { uri: algorithm::HMAC_SHA224, hash: HashType::Sha224, output_bits: params.hmac_output_bits })),
        algorithm::HMAC_SHA256 => Ok(Box::new(HmacSign { uri: algorithm::HMAC_SHA256, hash: HashType::Sha256, output_bits: params.hmac_output_bits })),
        algorithm::HMAC_SHA384 => Ok(Box::new(HmacSign { uri: algorithm::HMAC_SHA384, hash: HashType::Sha384, output_bits: params.hmac_output_bits })),
        algorithm::HMAC_SHA512 => Ok(Box::new(HmacSign { uri: algorithm::HMAC_SHA512, hash: HashType::Sha512, output_bits: params.hmac_output_bits })),

        _ => Err(Error::UnknownAlgorithm(format!("signature algorithm: {uri}"))),
    }
}

#[derive(Debug, Clone, Copy)]
enum HashType { Sha1, Sha224, Sha256, Sha384, Sha512 }

impl HashType {
    fn output_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha224 => 28,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }
}

// ── RSA PKCS#1 v1.5 ─────────────────────────────────────────────────

struct RsaPkcs1v15 { uri: &'static str, hash: HashType }

impl RsaPkcs1v15 {
    fn sign_with_key(&self, private_key: &rsa::RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>> {
        use signature::{SignatureEncoding, Signer};
        macro_rules! do_sign {
            ($hasher:ty) => {{
                let sk = rsa::pkcs1v15::SigningKey::<$hasher>::new(private_key.clone());
                Ok(sk.sign(data).to_vec())
            }};
        }
        match self.hash {
            HashType::Sha1 => do_sign!(sha1::Sha1),
            HashType::Sha224 => do_sign!(sha2::Sha224),
            HashType::Sha256 => do_sign!(sha2::Sha256),
            HashType::Sha384 => do_sign!(sha2::Sha384),
            HashType::Sha512 => do_sign!(sha2::Sha512),
        }
    }

    fn verify_with_key(&self, public_key: &rsa::RsaPublicKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool> {
        use signature::Verifier;
        let Ok(sig) = rsa::pkcs1v15::Signature::try_from(sig_bytes) else {
            return Ok(false);
        };
        macro_rules! do_verify {
            ($hasher:ty) => {{
                let vk = rsa::pkcs1v15::VerifyingKey::<$hasher>::new(public_key.clone());
                Ok(vk.verify(data, &sig).is_ok())
            }};
        }
        match self.hash {
            HashType::Sha1 => do_verify!(sha1::Sha1),
            HashType::Sha224 => do_verify!(sha2::Sha224),
            HashType::Sha256 => do_verify!(sha2::Sha256),
            HashType::Sha384 => do_verify!(sha2::Sha384),
            HashType::Sha512 => do_verify!(sha2::Sha512),
        }
    }
}

impl SignatureAlgorithm for RsaPkcs1v15 {
    fn uri(&self) -> &'static str { self.uri }

    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>> {
        match key {
            SigningKey::Rsa(pk) => self.sign_with_key(pk, data),
            _ => Err(Error::Key("RSA private key required".into())),
        }
    }

    fn verify(&self, key: &SigningKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool> {
        let pubk = match key {
            SigningKey::Rsa(pk) => pk.to_public_key(),
            SigningKey::RsaPublic(pk) => pk.clone(),
            _ => return Err(Error::Key("RSA key required".into())),
        };
        self.verify_with_key(&pubk, data, sig_bytes)
    }
}

// ── RSA-PSS ──────────────────────────────────────────────────────────

struct RsaPss { uri: &'static str, hash: HashType, salt_length: Option<usize> }

impl RsaPss {
    fn scheme_and_hash(&self, data: &[u8]) -> (rsa::Pss, Vec<u8>) {
        use digest::Digest;
        let salt = self.salt_length.unwrap_or(self.hash.output_len());
        macro_rules! pss {
            ($hasher:ty) => {
                (
                    rsa::Pss::new_with_salt::<$hasher>(salt),
                    <$hasher>::digest(data).to_vec(),
                )
            };
        }
        match self.hash {
            HashType::Sha1 => pss!(sha1::Sha1),
            HashType::Sha224 => pss!(sha2::Sha224),
            HashType::Sha256 => pss!(sha2::Sha256),
            HashType::Sha384 => pss!(sha2::Sha384),
            HashType::Sha512 => pss!(sha2::Sha512),
        }
    }
}

impl SignatureAlgorithm for RsaPss {
    fn uri(&self) -> &'static str { self.uri }

    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>> {
        let SigningKey::Rsa(private_key) = key else {
            return Err(Error::Key("RSA private key required for PSS".into()));
        };
        let mut rng = rand::thread_rng();
        let (scheme, hashed) = self.scheme_and_hash(data);
        private_key
            .sign_with_rng(&mut rng, scheme, &hashed)
            .map_err(|e| Error::CryptoProvider(format!("RSA-PSS signing failed: {e}")))
    }

    fn verify(&self, key: &SigningKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool> {
        let pubk = match key {
            SigningKey::Rsa(pk) => pk.to_public_key(),
            SigningKey::RsaPublic(pk) => pk.clone(),
            _ => return Err(Error::Key("RSA key required for PSS".into())),
        };
        let (scheme, hashed) = self.scheme_and_hash(data);
        Ok(pubk.verify(scheme, &hashed, sig_bytes).is_ok())
    }
}

// ── DSA ──────────────────────────────────────────────────────────────

struct DsaSign {
    uri: &'static str,
    hash: HashType,
    /// Byte length of each signature half, fixed by the subgroup size.
    half_len: usize,
}

fn biguint_to_fixed(n: &dsa::BigUint, len: usize) -> Result<Vec<u8>> {
    let bytes = n.to_bytes_be();
    if bytes.len() > len {
        return Err(Error::CryptoProvider(format!(
            "DSA component is {} bytes, expected at most {len}",
            bytes.len()
        )));
    }
    let mut out = vec![0u8; len - bytes.len()];
    out.extend_from_slice(&bytes);
    Ok(out)
}

impl DsaSign {
    /// Convert to XML-DSig `r||s` with zero-padded fixed-width halves.
    fn to_xmldsig(&self, sig: &dsa::Signature) -> Result<Vec<u8>> {
        let mut out = biguint_to_fixed(sig.r(), self.half_len)?;
        out.extend(biguint_to_fixed(sig.s(), self.half_len)?);
        Ok(out)
    }

    fn from_xmldsig(&self, rs: &[u8]) -> Option<dsa::Signature> {
        if rs.len() != self.half_len * 2 {
            return None;
        }
        let r = dsa::BigUint::from_bytes_be(&rs[..self.half_len]);
        let s = dsa::BigUint::from_bytes_be(&rs[self.half_len..]);
        dsa::Signature::from_components(r, s).ok()
    }
}

impl SignatureAlgorithm for DsaSign {
    fn uri(&self) -> &'static str { self.uri }

    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>> {
        use digest::Digest;
        use signature::DigestSigner;
        let SigningKey::Dsa(sk) = key else {
            return Err(Error::Key("DSA private key required".into()));
        };
        let sig: dsa::Signature = match self.hash {
            HashType::Sha1 => sk.try_sign_digest(sha1::Sha1::new_with_prefix(data)),
            HashType::Sha256 => sk.try_sign_digest(sha2::Sha256::new_with_prefix(data)),
            _ => {
                return Err(Error::Unsupported(format!(
                    "DSA with this digest: {}",
                    self.uri
                )))
            }
        }
        .map_err(|e| Error::CryptoProvider(format!("DSA signing failed: {e}")))?;
        self.to_xmldsig(&sig)
    }

    fn verify(&self, key: &SigningKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool> {
        use digest::Digest;
        use signature::DigestVerifier;
        let vk = match key {
            SigningKey::Dsa(sk) => sk.verifying_key().clone(),
            SigningKey::DsaPublic(vk) => vk.clone(),
            _ => return Err(Error::Key("DSA key required".into())),
        };
        let Some(sig) = self.from_xmldsig(sig_bytes) else {
            return Ok(false);
        };
        let ok = match self.hash {
            HashType::Sha1 => vk
                .verify_digest(sha1::Sha1::new_with_prefix(data), &sig)
                .is_ok(),
            HashType::Sha256 => vk
                .verify_digest(sha2::Sha256::new_with_prefix(data), &sig)
                .is_ok(),
            _ => {
                return Err(Error::Unsupported(format!(
                    "DSA with this digest: {}",
                    self.uri
                )))
            }
        };
        Ok(ok)
    }
}

// ── ECDSA P-256 ──────────────────────────────────────────────────────

struct EcdsaP256 { uri: &'static str }

/// Convert XML-DSig ECDSA r||s to a typed Signature for P-256.
pub fn xmldsig_to_p256(rs: &[u8]) -> Result<p256::ecdsa::Signature> {
    if rs.len() != 64 {
        return Err(Error::CryptoProvider(format!(
            "P-256 signature must be 64 bytes, got {}",
            rs.len()
        )));
    }
    let r = p256::FieldBytes::from_slice(&rs[..32]);
    let s = p256::FieldBytes::from_slice(&rs[32..]);
    p256::ecdsa::Signature::from_scalars(*r, *s)
        .map_err(|e| Error::CryptoProvider(format!("invalid P-256 signature: {e}")))
}

/// Convert P-256 signature to XML-DSig r||s format.
pub fn p256_to_xmldsig(sig: &p256::ecdsa::Signature) -> Vec<u8> {
    let (r, s) = sig.split_bytes();
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(&r);
    out.extend_from_slice(&s);
    out
}

impl SignatureAlgorithm for EcdsaP256 {
    fn uri(&self) -> &'static str { self.uri }

    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>> {
        use signature::Signer;
        let SigningKey::EcP256(sk) = key else {
            return Err(Error::Key("P-256 signing key required".into()));
        };
        let sig: p256::ecdsa::Signature = sk.sign(data);
        Ok(p256_to_xmldsig(&sig))
    }

    fn verify(&self, key: &SigningKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool> {
        use signature::Verifier;
        let vk = match key {
            SigningKey::EcP256(sk) => *sk.verifying_key(),
            SigningKey::EcP256Public(vk) => *vk,
            _ => return Err(Error::Key("P-256 key required".into())),
        };
        let Ok(sig) = xmldsig_to_p256(sig_bytes) else {
            return Ok(false);
        };
        Ok(vk.verify(data, &sig).is_ok())
    }
}

// ── ECDSA P-384 ──────────────────────────────────────────────────────

struct EcdsaP384 { uri: &'static str }

/// Convert XML-DSig ECDSA r||s to a typed Signature for P-384.
pub fn xmldsig_to_p384(rs: &[u8]) -> Result<p384::ecdsa::Signature> {
    if rs.len() != 96 {
        return Err(Error::CryptoProvider(format!(
            "P-384 signature must be 96 bytes, got {}",
            rs.len()
        )));
    }
    let r = p384::FieldBytes::from_slice(&rs[..48]);
    let s = p384::FieldBytes::from_slice(&rs[48..]);
    p384::ecdsa::Signature::from_scalars(*r, *s)
        .map_err(|e| Error::CryptoProvider(format!("invalid P-384 signature: {e}")))
}

/// Convert P-384 signature to XML-DSig r||s format.
pub fn p384_to_xmldsig(sig: &p384::ecdsa::Signature) -> Vec<u8> {
    let (r, s) = sig.split_bytes();
    let mut out = Vec::with_capacity(96);
    out.extend_from_slice(&r);
    out.extend_from_slice(&s);
    out
}

impl SignatureAlgorithm for EcdsaP384 {
    fn uri(&self) -> &'static str { self.uri }

    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>> {
        use signature::Signer;
        let SigningKey::EcP384(sk) = key else {
            return Err(Error::Key("P-384 signing key required".into()));
        };
        let sig: p384::ecdsa::Signature = sk.sign(data);
        Ok(p384_to_xmldsig(&sig))
    }

    fn verify(&self, key: &SigningKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool> {
        use signature::Verifier;
        let vk = match key {
            SigningKey::EcP384(sk) => *sk.verifying_key(),
            SigningKey::EcP384Public(vk) => *vk,
            _ => return Err(Error::Key("P-384 key required".into())),
        };
        let Ok(sig) = xmldsig_to_p384(sig_bytes) else {
            return Ok(false);
        };
        Ok(vk.verify(data, &sig).is_ok())
    }
}

// ── HMAC ─────────────────────────────────────────────────────────────

struct HmacSign { uri: &'static str, hash: HashType, output_bits: Option<usize> }

impl HmacSign {
    /// Output length in bytes, validated against the truncation floor of
    /// max(half the digest length, 80 bits).
    fn output_len(&self) -> Result<usize> {
        let full = self.hash.output_len();
        let Some(bits) = self.output_bits else {
            return Ok(full);
        };
        if bits % 8 != 0 {
            return Err(Error::Unsupported(format!(
                "HMAC output length {bits} is not a whole number of bytes"
            )));
        }
        let len = bits / 8;
        let min = (full / 2).max(10);
        if len < min || len > full {
            return Err(Error::Unsupported(format!(
                "HMAC output length {bits} outside the allowed range"
            )));
        }
        Ok(len)
    }
}

impl SignatureAlgorithm for HmacSign {
    fn uri(&self) -> &'static str { self.uri }

    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>> {
        let SigningKey::Hmac(key_bytes) = key else {
            return Err(Error::Key("HMAC key required".into()));
        };
        let mut mac = compute_hmac(self.hash, key_bytes, data)?;
        mac.truncate(self.output_len()?);
        Ok(mac)
    }

    fn verify(&self, key: &SigningKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool> {
        let SigningKey::Hmac(key_bytes) = key else {
            return Err(Error::Key("HMAC key required".into()));
        };
        let expected = compute_hmac(self.hash, key_bytes, data)?;
        let out_len = self.output_len()?;
        if sig_bytes.len() != out_len {
            return Ok(false);
        }
        Ok(constant_time_eq(&expected[..out_len], sig_bytes))
    }
}

fn compute_hmac(hash: HashType, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    use hmac::{Hmac, Mac};
    macro_rules! hmac_compute {
        ($hasher:ty) => {{
            let mut mac = <Hmac<$hasher>>::new_from_slice(key)
                .map_err(|e| Error::Key(format!("invalid HMAC key: {e}")))?;
            mac.update(data);
            Ok(mac.finalize().into_bytes().to_vec())
        }};
    }
    match hash {
        HashType::Sha1 => hmac_compute!(sha1::Sha1),
        HashType::Sha224 => hmac_compute!(sha2::Sha224),
        HashType::Sha256 => hmac_compute!(sha2::Sha256),
        HashType::Sha384 => hmac_compute!(sha2::Sha384),
        HashType::Sha512 => hmac_compute!(sha2::Sha512),
    }
}

/// Compare two byte strings without early exit.  Used for digest and MAC
/// comparison on the verification path.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
