#![forbid(unsafe_code)]

//! Transform chain and trait definitions.

use sigtuna_c14n::C14nMode;
use sigtuna_core::{Error, Result};
use sigtuna_xml::{Document, NodeSet};
use std::sync::Arc;

/// Data flowing through a transform chain.
pub enum TransformData {
    /// An XML document, optionally restricted to a node set.
    Xml {
        doc: Arc<Document>,
        node_set: Option<NodeSet>,
    },
    /// Raw octets.
    Binary(Vec<u8>),
}

impl TransformData {
    /// Convert to octets for digesting.
    ///
    /// XML data with no explicit canonicalization transform is serialized
    /// with inclusive C14N, the identity the standard defines for it.
    pub fn to_octets(&self) -> Result<Vec<u8>> {
        match self {
            TransformData::Binary(data) => Ok(data.clone()),
            TransformData::Xml { doc, node_set } => {
                sigtuna_c14n::canonicalize(doc, C14nMode::Inclusive, node_set.as_ref(), &[])
            }
        }
    }
}

/// A single transform step.
pub trait Transform: Send {
    /// The algorithm URI for this transform.
    fn uri(&self) -> &str;

    /// Apply the transform.  Pure: identical input and parameters yield
    /// identical output.
    fn execute(&self, input: TransformData) -> Result<TransformData>;
}

/// An ordered sequence of transforms.
pub struct TransformChain {
    transforms: Vec<Box<dyn Transform>>,
}

impl TransformChain {
    pub fn new() -> Self {
        Self {
            transforms: Vec::new(),
        }
    }

    pub fn push(&mut self, transform: Box<dyn Transform>) {
        self.transforms.push(transform);
    }

    /// Apply every transform in declared order.
    pub fn run(&self, input: TransformData) -> Result<TransformData> {
        let mut data = input;
        for transform in &self.transforms {
            data = transform.execute(data)?;
        }
        Ok(data)
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl Default for TransformChain {
    fn default() -> Self {
        Self::new()
    }
}

// ── C14N transform ───────────────────────────────────────────────────

/// A canonicalization transform in any of the four C14N variants.
pub struct C14nTransform {
    mode: C14nMode,
    inclusive_prefixes: Vec<String>,
}

impl C14nTransform {
    pub fn new(mode: C14nMode, inclusive_prefixes: Vec<String>) -> Self {
        Self {
            mode,
            inclusive_prefixes,
        }
    }
}

impl Transform for C14nTransform {
    fn uri(&self) -> &str {
        self.mode.uri()
    }

    fn execute(&self, input: TransformData) -> Result<TransformData> {
        match input {
            TransformData::Xml { doc, node_set } => {
                let bytes = sigtuna_c14n::canonicalize(
                    &doc,
                    self.mode,
                    node_set.as_ref(),
                    &self.inclusive_prefixes,
                )?;
                Ok(TransformData::Binary(bytes))
            }
            TransformData::Binary(data) => {
                // Octet input is reparsed before canonicalizing
                let text = std::str::from_utf8(&data)
                    .map_err(|e| Error::Transform(format!("invalid UTF-8: {e}")))?;
                let bytes =
                    sigtuna_c14n::canonicalize_str(text, self.mode, &self.inclusive_prefixes)?;
                Ok(TransformData::Binary(bytes))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_chain_is_identity() {
        let chain = TransformChain::new();
        let out = chain.run(TransformData::Binary(b"abc".to_vec())).unwrap();
        assert_eq!(out.to_octets().unwrap(), b"abc");
    }

    #[test]
    fn xml_data_defaults_to_inclusive_c14n() {
        let doc = Document::parse("<a  x=\"1\"><b/></a>").unwrap();
        let data = TransformData::Xml {
            doc: Arc::new(doc),
            node_set: None,
        };
        assert_eq!(data.to_octets().unwrap(), b"<a x=\"1\"><b></b></a>");
    }

    #[test]
    fn c14n_transform_strips_comments_by_default() {
        let doc = Document::parse("<a><!-- hidden --><b/></a>").unwrap();
        let chain = {
            let mut chain = TransformChain::new();
            chain.push(Box::new(C14nTransform::new(C14nMode::Inclusive, Vec::new())));
            chain
        };
        let out = chain
            .run(TransformData::Xml {
                doc: Arc::new(doc),
                node_set: None,
            })
            .unwrap();
        assert_eq!(out.to_octets().unwrap(), b"<a><b></b></a>");
    }
}
