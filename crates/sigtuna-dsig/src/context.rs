#![forbid(unsafe_code)]

//! Processing context for signature operations.
//!
//! The context carries the algorithm and transform registries plus document
//! processing configuration.  Registries are plain values here rather than
//! hidden globals; `DsigContext::new` wires in the process-wide defaults.

use sigtuna_crypto::AlgorithmRegistry;
use sigtuna_transforms::TransformRegistry;
use std::collections::HashMap;
use std::path::PathBuf;

/// Context for XML-DSig operations.
pub struct DsigContext {
    /// Digest and signature algorithm registry.
    pub algorithms: &'static AlgorithmRegistry,
    /// Transform and canonicalization registry.
    pub transforms: &'static TransformRegistry,
    /// Additional ID attribute names recognized when resolving `#id` URIs.
    pub id_attrs: Vec<String>,
    /// External URI to local file mappings.
    pub url_map: HashMap<String, PathBuf>,
}

impl DsigContext {
    /// Create a context backed by the process-wide default registries.
    pub fn new() -> Self {
        Self {
            algorithms: AlgorithmRegistry::global(),
            transforms: TransformRegistry::global(),
            id_attrs: Vec::new(),
            url_map: HashMap::new(),
        }
    }

    /// Create a context with caller-supplied registries, for custom or
    /// restricted algorithm sets.
    pub fn with_registries(
        algorithms: &'static AlgorithmRegistry,
        transforms: &'static TransformRegistry,
    ) -> Self {
        Self {
            algorithms,
            transforms,
            id_attrs: Vec::new(),
            url_map: HashMap::new(),
        }
    }

    /// Register an additional ID attribute name.
    pub fn add_id_attr(&mut self, name: &str) {
        self.id_attrs.push(name.to_owned());
    }

    /// Map an external URI to a local file path.
    pub fn add_url_map(&mut self, url: &str, path: impl Into<PathBuf>) {
        self.url_map.insert(url.to_owned(), path.into());
    }
}

impl Default for DsigContext {
    fn default() -> Self {
        Self::new()
    }
}
