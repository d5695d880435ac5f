#![forbid(unsafe_code)]

//! Extensible transform registry.
//!
//! Like the crypto registry, resolution is strict: a transform URI with no
//! registered factory fails with `UnknownAlgorithm`.  The XPath filter URI
//! is intentionally absent from the standard set, so declaring it fails
//! loudly instead of passing data through unfiltered.

use crate::base64_transform::Base64DecodeTransform;
use crate::enveloped::EnvelopedSignatureTransform;
use crate::pipeline::{C14nTransform, Transform};
use sigtuna_c14n::C14nMode;
use sigtuna_core::{algorithm, Error, Result};
use sigtuna_xml::NodeId;
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

/// Per-reference parameters a transform factory may need.
#[derive(Debug, Clone, Default)]
pub struct TransformParams {
    /// Exclusive C14N `InclusiveNamespaces` PrefixList entries.
    pub inclusive_prefixes: Vec<String>,
    /// The containing `<Signature>` element, for enveloped-signature removal.
    pub signature_node: Option<NodeId>,
}

/// Factory producing a transform configured with per-reference parameters.
pub type TransformFactory =
    Box<dyn Fn(&TransformParams) -> Result<Box<dyn Transform>> + Send + Sync>;

/// URI-keyed registry of transforms.
pub struct TransformRegistry {
    transforms: RwLock<HashMap<String, TransformFactory>>,
}

impl TransformRegistry {
    /// Create a registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            transforms: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry with the standard transforms: the four C14N
    /// variants, enveloped-signature removal, and base64 decoding.
    pub fn standard() -> Self {
        let registry = Self::empty();
        for mode in [
            C14nMode::Inclusive,
            C14nMode::InclusiveWithComments,
            C14nMode::Exclusive,
            C14nMode::ExclusiveWithComments,
        ] {
            registry.register(
                mode.uri(),
                Box::new(move |params| {
                    Ok(Box::new(C14nTransform::new(
                        mode,
                        params.inclusive_prefixes.clone(),
                    )))
                }),
            );
        }
        registry.register(
            algorithm::ENVELOPED_SIGNATURE,
            Box::new(|params| {
                let node = params.signature_node.ok_or_else(|| {
                    Error::MissingArgument(
                        "Signature node for enveloped-signature transform".into(),
                    )
                })?;
                Ok(Box::new(EnvelopedSignatureTransform::new(node)))
            }),
        );
        registry.register(algorithm::BASE64, Box::new(|_| Ok(Box::new(Base64DecodeTransform))));
        registry
    }

    /// The process-wide default registry.
    pub fn global() -> &'static TransformRegistry {
        static GLOBAL: OnceLock<TransformRegistry> = OnceLock::new();
        GLOBAL.get_or_init(TransformRegistry::standard)
    }

    /// Register (or replace) a transform factory.
    pub fn register(&self, uri: &str, factory: TransformFactory) {
        if let Ok(mut map) = self.transforms.write() {
            map.insert(uri.to_owned(), factory);
        }
    }

    /// Look up a transform by URI, configured with `params`.
    pub fn resolve(&self, uri: &str, params: &TransformParams) -> Result<Box<dyn Transform>> {
        let map = self
            .transforms
            .read()
            .map_err(|_| Error::CryptoProvider("transform registry lock poisoned".into()))?;
        match map.get(uri) {
            Some(factory) => factory(params),
            None => Err(Error::UnknownAlgorithm(format!("transform: {uri}"))),
        }
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_resolves_c14n_and_base64() {
        let registry = TransformRegistry::standard();
        let params = TransformParams::default();
        assert!(registry.resolve(algorithm::EXC_C14N, &params).is_ok());
        assert!(registry.resolve(algorithm::BASE64, &params).is_ok());
    }

    #[test]
    fn xpath_uri_is_not_registered() {
        let registry = TransformRegistry::standard();
        assert!(matches!(
            registry.resolve(algorithm::XPATH, &TransformParams::default()),
            Err(Error::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn enveloped_requires_a_signature_node() {
        let registry = TransformRegistry::standard();
        assert!(matches!(
            registry.resolve(algorithm::ENVELOPED_SIGNATURE, &TransformParams::default()),
            Err(Error::MissingArgument(_))
        ));
    }
}
