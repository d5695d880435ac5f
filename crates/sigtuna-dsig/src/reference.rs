#![forbid(unsafe_code)]

//! `<ds:Reference>`: the unit of "what is signed".

use crate::context::DsigContext;
use base64::Engine;
use sigtuna_core::{ns, Error, Result};
use sigtuna_transforms::uri::resolve_uri;
use sigtuna_transforms::{TransformChain, TransformParams};
use sigtuna_xml::{Document, NodeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A transform as declared in the XML, before registry resolution.
#[derive(Debug, Clone)]
pub struct TransformDescriptor {
    pub uri: String,
    /// Exclusive C14N `InclusiveNamespaces` PrefixList entries.
    pub inclusive_prefixes: Vec<String>,
}

/// Binds a URI to a transform chain and a digest.
///
/// The digest value is derived state: it is set by [`Reference::compute_digest`]
/// and trusted only transiently after a load; verification always recomputes.
#[derive(Debug, Clone)]
pub struct Reference {
    uri: Option<String>,
    id: Option<String>,
    ref_type: Option<String>,
    transforms: Vec<TransformDescriptor>,
    digest_method: String,
    digest_value: Vec<u8>,
}

impl Reference {
    /// Create a reference.  `uri: None` means the whole target document and
    /// is omitted when serializing.
    pub fn new(uri: Option<String>, digest_method: impl Into<String>) -> Self {
        Self {
            uri,
            id: None,
            ref_type: None,
            transforms: Vec::new(),
            digest_method: digest_method.into(),
            digest_value: Vec::new(),
        }
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub fn set_type(&mut self, ref_type: impl Into<String>) {
        self.ref_type = Some(ref_type.into());
    }

    /// Append a transform to the chain.
    pub fn add_transform(&mut self, uri: impl Into<String>) {
        self.transforms.push(TransformDescriptor {
            uri: uri.into(),
            inclusive_prefixes: Vec::new(),
        });
    }

    /// Append an exclusive C14N transform with an InclusiveNamespaces list.
    pub fn add_transform_with_prefixes(
        &mut self,
        uri: impl Into<String>,
        inclusive_prefixes: Vec<String>,
    ) {
        self.transforms.push(TransformDescriptor {
            uri: uri.into(),
            inclusive_prefixes,
        });
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn digest_method(&self) -> &str {
        &self.digest_method
    }

    pub fn digest_value(&self) -> &[u8] {
        &self.digest_value
    }

    pub fn transforms(&self) -> &[TransformDescriptor] {
        &self.transforms
    }

    /// A human-readable name for error messages: the URI when present,
    /// otherwise the Id, otherwise a placeholder.
    fn display_name(&self) -> String {
        self.uri
            .clone()
            .or_else(|| self.id.clone())
            .unwrap_or_else(|| "(whole document)".into())
    }

    // ── Digest computation ───────────────────────────────────────────

    /// Resolve the URI, run the transform chain, and digest the result.
    fn digest_input(
        &self,
        ctx: &DsigContext,
        doc: &Arc<Document>,
        id_map: &HashMap<String, NodeId>,
        signature_node: Option<NodeId>,
    ) -> Result<Vec<u8>> {
        let data = resolve_uri(self.uri.as_deref(), doc, id_map, &ctx.url_map)?;

        let mut chain = TransformChain::new();
        for descriptor in &self.transforms {
            let params = TransformParams {
                inclusive_prefixes: descriptor.inclusive_prefixes.clone(),
                signature_node,
            };
            chain.push(ctx.transforms.resolve(&descriptor.uri, &params)?);
        }
        let bytes = chain.run(data)?.to_octets()?;

        let mut hasher = ctx.algorithms.digest(&self.digest_method)?;
        hasher.update(&bytes);
        let digest = hasher.finalize();
        debug!(
            reference = %self.display_name(),
            algorithm = %self.digest_method,
            input_len = bytes.len(),
            "computed reference digest"
        );
        Ok(digest)
    }

    /// Compute and store the digest value.
    pub fn compute_digest(
        &mut self,
        ctx: &DsigContext,
        doc: &Arc<Document>,
        id_map: &HashMap<String, NodeId>,
        signature_node: Option<NodeId>,
    ) -> Result<()> {
        self.digest_value = self.digest_input(ctx, doc, id_map, signature_node)?;
        Ok(())
    }

    /// Recompute the digest and compare against the stored value in
    /// constant time.  Fails with `DigestMismatch` naming this reference.
    pub fn verify_digest(
        &self,
        ctx: &DsigContext,
        doc: &Arc<Document>,
        id_map: &HashMap<String, NodeId>,
        signature_node: Option<NodeId>,
    ) -> Result<()> {
        let computed = self.digest_input(ctx, doc, id_map, signature_node)?;
        if computed.len() == self.digest_value.len()
            && sigtuna_crypto::constant_time_eq(&computed, &self.digest_value)
        {
            Ok(())
        } else {
            Err(Error::DigestMismatch(self.display_name()))
        }
    }

    // ── XML serialization ────────────────────────────────────────────

    /// Append a `<Reference>` element under `parent`.
    pub fn get_xml(&self, doc: &mut Document, parent: NodeId) -> NodeId {
        let prefix = doc.element(parent).and_then(|el| el.prefix.clone());
        let prefix = prefix.as_deref();
        let engine = base64::engine::general_purpose::STANDARD;

        let reference = doc.push_element(parent, prefix, ns::node::REFERENCE);
        if let Some(uri) = &self.uri {
            doc.push_attr(reference, None, ns::attr::URI, uri);
        }
        if let Some(id) = &self.id {
            doc.push_attr(reference, None, ns::attr::ID, id);
        }
        if let Some(ref_type) = &self.ref_type {
            doc.push_attr(reference, None, ns::attr::TYPE, ref_type);
        }

        if !self.transforms.is_empty() {
            let transforms = doc.push_element(reference, prefix, ns::node::TRANSFORMS);
            for descriptor in &self.transforms {
                let transform = doc.push_element(transforms, prefix, ns::node::TRANSFORM);
                doc.push_attr(transform, None, ns::attr::ALGORITHM, &descriptor.uri);
                if !descriptor.inclusive_prefixes.is_empty() {
                    let inc = doc.push_element(transform, Some("ec"), ns::node::INCLUSIVE_NAMESPACES);
                    doc.push_ns_decl(inc, Some("ec"), ns::EXC_C14N);
                    doc.push_attr(
                        inc,
                        None,
                        ns::attr::PREFIX_LIST,
                        &descriptor.inclusive_prefixes.join(" "),
                    );
                }
            }
        }

        let digest_method = doc.push_element(reference, prefix, ns::node::DIGEST_METHOD);
        doc.push_attr(digest_method, None, ns::attr::ALGORITHM, &self.digest_method);
        let digest_value = doc.push_element(reference, prefix, ns::node::DIGEST_VALUE);
        if !self.digest_value.is_empty() {
            doc.push_text(digest_value, &engine.encode(&self.digest_value));
        }

        reference
    }

    /// Read a `<Reference>` element.
    pub fn load_xml(doc: &Document, node: NodeId) -> Result<Self> {
        let uri = doc.attribute(node, ns::attr::URI).map(str::to_owned);
        let id = doc.attribute(node, ns::attr::ID).map(str::to_owned);
        let ref_type = doc.attribute(node, ns::attr::TYPE).map(str::to_owned);

        let mut transforms = Vec::new();
        if let Some(transforms_node) =
            doc.find_child_element(node, ns::DSIG, ns::node::TRANSFORMS)
        {
            for transform in doc.find_child_elements(transforms_node, ns::DSIG, ns::node::TRANSFORM)
            {
                let algorithm = doc
                    .attribute(transform, ns::attr::ALGORITHM)
                    .ok_or_else(|| {
                        Error::MalformedSignedInfo("Transform missing Algorithm".into())
                    })?
                    .to_owned();
                transforms.push(TransformDescriptor {
                    uri: algorithm,
                    inclusive_prefixes: read_inclusive_prefixes(doc, transform),
                });
            }
        }

        let digest_method_node = doc
            .find_child_element(node, ns::DSIG, ns::node::DIGEST_METHOD)
            .ok_or_else(|| Error::MalformedSignedInfo("Reference missing DigestMethod".into()))?;
        let digest_method = doc
            .attribute(digest_method_node, ns::attr::ALGORITHM)
            .ok_or_else(|| {
                Error::MalformedSignedInfo("DigestMethod missing Algorithm".into())
            })?
            .to_owned();

        let digest_value_node = doc
            .find_child_element(node, ns::DSIG, ns::node::DIGEST_VALUE)
            .ok_or_else(|| Error::MalformedSignedInfo("Reference missing DigestValue".into()))?;
        let digest_text = doc.text_content(digest_value_node);
        let clean: String = digest_text.chars().filter(|c| !c.is_whitespace()).collect();
        let digest_value = if clean.is_empty() {
            Vec::new()
        } else {
            base64::engine::general_purpose::STANDARD
                .decode(&clean)
                .map_err(|e| Error::Base64(format!("DigestValue: {e}")))?
        };

        Ok(Self {
            uri,
            id,
            ref_type,
            transforms,
            digest_method,
            digest_value,
        })
    }
}

/// Read an `InclusiveNamespaces` PrefixList child, if any.
pub(crate) fn read_inclusive_prefixes(doc: &Document, node: NodeId) -> Vec<String> {
    for child in doc.children(node) {
        if let Some(el) = doc.element(*child) {
            if el.local == ns::node::INCLUSIVE_NAMESPACES {
                if let Some(list) = doc.attribute(*child, ns::attr::PREFIX_LIST) {
                    return list.split_whitespace().map(str::to_owned).collect();
                }
            }
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigtuna_core::algorithm;

    fn ctx() -> DsigContext {
        DsigContext::new()
    }

    #[test]
    fn digest_round_trip_on_fragment() {
        let doc = Arc::new(Document::parse(r#"<a><b Id="x">payload</b></a>"#).unwrap());
        let id_map = doc.build_id_map(&[]);
        let ctx = ctx();

        let mut reference = Reference::new(Some("#x".into()), algorithm::SHA256);
        reference.compute_digest(&ctx, &doc, &id_map, None).unwrap();
        assert_eq!(reference.digest_value().len(), 32);
        reference.verify_digest(&ctx, &doc, &id_map, None).unwrap();
    }

    #[test]
    fn corrupted_digest_fails_with_reference_name() {
        let doc = Arc::new(Document::parse(r#"<a><b Id="x">payload</b></a>"#).unwrap());
        let id_map = doc.build_id_map(&[]);
        let ctx = ctx();

        let mut reference = Reference::new(Some("#x".into()), algorithm::SHA256);
        reference.compute_digest(&ctx, &doc, &id_map, None).unwrap();
        reference.digest_value[0] ^= 0x01;
        match reference.verify_digest(&ctx, &doc, &id_map, None) {
            Err(Error::DigestMismatch(name)) => assert_eq!(name, "#x"),
            other => panic!("expected DigestMismatch, got {other:?}"),
        }
    }

    #[test]
    fn serialization_round_trip() {
        let mut reference = Reference::new(Some("#data".into()), algorithm::SHA256);
        reference.add_transform(algorithm::ENVELOPED_SIGNATURE);
        reference.add_transform_with_prefixes(algorithm::EXC_C14N, vec!["soap".into()]);
        reference.digest_value = vec![1, 2, 3, 4];

        let mut doc = Document::new();
        let root = doc.push_element(doc.root(), Some("ds"), "root");
        doc.push_ns_decl(root, Some("ds"), ns::DSIG);
        reference.get_xml(&mut doc, root);

        let reparsed = Document::parse(&doc.to_xml_string()).unwrap();
        let node = reparsed
            .find_element(reparsed.root(), ns::DSIG, ns::node::REFERENCE)
            .unwrap();
        let loaded = Reference::load_xml(&reparsed, node).unwrap();

        assert_eq!(loaded.uri(), Some("#data"));
        assert_eq!(loaded.transforms().len(), 2);
        assert_eq!(loaded.transforms()[1].inclusive_prefixes, ["soap"]);
        assert_eq!(loaded.digest_value(), [1, 2, 3, 4]);
    }

    #[test]
    fn missing_digest_method_is_malformed() {
        let xml = r##"<Reference xmlns="http://www.w3.org/2000/09/xmldsig#" URI="#x">
            <DigestValue>AAAA</DigestValue>
        </Reference>"##;
        let doc = Document::parse(xml).unwrap();
        let node = doc.root_element().unwrap();
        assert!(matches!(
            Reference::load_xml(&doc, node),
            Err(Error::MalformedSignedInfo(_))
        ));
    }
}
