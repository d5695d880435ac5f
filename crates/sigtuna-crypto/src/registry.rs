#![forbid(unsafe_code)]

//! Extensible algorithm registry mapping URIs to factory functions.
//!
//! Resolution is strict: a URI with no registered factory fails with
//! `UnknownAlgorithm`, never a silent default.

use crate::digest::{self, DigestAlgorithm};
use crate::sign::{self, SignatureAlgorithm, SignatureParams};
use sigtuna_core::{Error, Result};
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

/// Factory producing a fresh digest instance.
pub type DigestFactory = Box<dyn Fn() -> Result<Box<dyn DigestAlgorithm>> + Send + Sync>;

/// Factory producing a signature algorithm configured with the declared
/// method parameters.
pub type SignatureFactory =
    Box<dyn Fn(&SignatureParams) -> Result<Box<dyn SignatureAlgorithm>> + Send + Sync>;

/// URI-keyed registry of digest and signature algorithms.
pub struct AlgorithmRegistry {
    digests: RwLock<HashMap<String, DigestFactory>>,
    signatures: RwLock<HashMap<String, SignatureFactory>>,
}

impl AlgorithmRegistry {
    /// Create a registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            digests: RwLock::new(HashMap::new()),
            signatures: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry populated with the standard XML-DSig algorithms.
    pub fn standard() -> Self {
        let registry = Self::empty();
        for uri in digest::standard_uris() {
            registry.register_digest(uri, Box::new(move || digest::from_uri(uri)));
        }
        for uri in sign::standard_uris() {
            registry.register_signature(uri, Box::new(move |params| sign::from_uri(uri, params)));
        }
        registry
    }

    /// The process-wide default registry with the standard algorithms.
    pub fn global() -> &'static AlgorithmRegistry {
        static GLOBAL: OnceLock<AlgorithmRegistry> = OnceLock::new();
        GLOBAL.get_or_init(AlgorithmRegistry::standard)
    }

    /// Register (or replace) a digest algorithm factory.
    pub fn register_digest(&self, uri: &str, factory: DigestFactory) {
        if let Ok(mut map) = self.digests.write() {
            map.insert(uri.to_owned(), factory);
        }
    }

    /// Register (or replace) a signature algorithm factory.
    pub fn register_signature(&self, uri: &str, factory: SignatureFactory) {
        if let Ok(mut map) = self.signatures.write() {
            map.insert(uri.to_owned(), factory);
        }
    }

    /// Look up a digest algorithm by URI.
    pub fn digest(&self, uri: &str) -> Result<Box<dyn DigestAlgorithm>> {
        let map = self
            .digests
            .read()
            .map_err(|_| Error::CryptoProvider("algorithm registry lock poisoned".into()))?;
        match map.get(uri) {
            Some(factory) => factory(),
            None => Err(Error::UnknownAlgorithm(format!("digest algorithm: {uri}"))),
        }
    }

    /// Look up a signature algorithm by URI, configured with `params`.
    pub fn signature(
        &self,
        uri: &str,
        params: &SignatureParams,
    ) -> Result<Box<dyn SignatureAlgorithm>> {
        let map = self
            .signatures
            .read()
            .map_err(|_| Error::CryptoProvider("algorithm registry lock poisoned".into()))?;
        match map.get(uri) {
            Some(factory) => factory(params),
            None => Err(Error::UnknownAlgorithm(format!(
                "signature algorithm: {uri}"
            ))),
        }
    }
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigtuna_core::algorithm;

    #[test]
    fn standard_registry_resolves_builtins() {
        let registry = AlgorithmRegistry::standard();
        assert!(registry.digest(algorithm::SHA256).is_ok());
        assert!(registry
            .signature(algorithm::RSA_SHA256, &SignatureParams::default())
            .is_ok());
    }

    #[test]
    fn empty_registry_rejects_everything() {
        let registry = AlgorithmRegistry::empty();
        assert!(matches!(
            registry.digest(algorithm::SHA256),
            Err(Error::UnknownAlgorithm(_))
        ));
        assert!(matches!(
            registry.signature(algorithm::RSA_SHA256, &SignatureParams::default()),
            Err(Error::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn caller_registered_algorithm_is_resolved() {
        let registry = AlgorithmRegistry::empty();
        registry.register_digest(
            "urn:example:sha256",
            Box::new(|| digest::from_uri(algorithm::SHA256)),
        );
        let mut hasher = registry.digest("urn:example:sha256").unwrap();
        hasher.update(b"hello");
        assert_eq!(hasher.finalize().len(), 32);
    }
}
