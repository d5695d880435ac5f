#![forbid(unsafe_code)]

//! `<ds:Signature>`: assembly, signing and verification.
//!
//! Signing serializes the complete `Signature` element into its final
//! document context first, then computes reference digests and the
//! signature value in place.  Verification re-canonicalizes the loaded
//! `SignedInfo` exactly as found, checks the signature value with the
//! declared method, then recomputes every reference digest.

use crate::context::DsigContext;
use crate::signed_info::SignedInfo;
use base64::Engine;
use sigtuna_core::{ns, Error, Result};
use sigtuna_keys::{Key, KeyInfo};
use sigtuna_xml::{Document, NodeId};
use std::sync::Arc;
use tracing::debug;

/// Content of a `<ds:Object>` for enveloping signatures.
#[derive(Debug)]
pub enum ObjectContent {
    Text(String),
    Xml(Document),
}

/// A `<ds:Object>` element carried inside the signature.
#[derive(Debug)]
pub struct ObjectElement {
    id: Option<String>,
    content: ObjectContent,
}

impl ObjectElement {
    pub fn text(id: Option<String>, text: impl Into<String>) -> Self {
        Self {
            id,
            content: ObjectContent::Text(text.into()),
        }
    }

    pub fn xml(id: Option<String>, doc: Document) -> Self {
        Self {
            id,
            content: ObjectContent::Xml(doc),
        }
    }
}

/// A parsed signature keeps its source document; digests are recomputed
/// against the very octets that were loaded.
struct Loaded {
    doc: Arc<Document>,
    signature: NodeId,
    signed_info: NodeId,
}

/// A complete XML signature.
pub struct SignedXml {
    signed_info: SignedInfo,
    key_info: Option<KeyInfo>,
    signature_id: Option<String>,
    signature_value: Vec<u8>,
    objects: Vec<ObjectElement>,
    loaded: Option<Loaded>,
}

impl SignedXml {
    pub fn new(signed_info: SignedInfo) -> Self {
        Self {
            signed_info,
            key_info: None,
            signature_id: None,
            signature_value: Vec::new(),
            objects: Vec::new(),
            loaded: None,
        }
    }

    pub fn set_signature_id(&mut self, id: impl Into<String>) {
        self.signature_id = Some(id.into());
    }

    pub fn set_key_info(&mut self, key_info: KeyInfo) {
        self.key_info = Some(key_info);
    }

    pub fn add_object(&mut self, object: ObjectElement) {
        self.objects.push(object);
    }

    pub fn signed_info(&self) -> &SignedInfo {
        &self.signed_info
    }

    pub fn signed_info_mut(&mut self) -> &mut SignedInfo {
        &mut self.signed_info
    }

    pub fn key_info(&self) -> Option<&KeyInfo> {
        self.key_info.as_ref()
    }

    pub fn signature_value(&self) -> &[u8] {
        &self.signature_value
    }

    // ── Signing ──────────────────────────────────────────────────────

    /// Produce a standalone signature document.  Signed content travels in
    /// `<Object>` elements (enveloping) or outside the document entirely
    /// (detached, through the context's URL map).
    pub fn sign(&mut self, ctx: &DsigContext, key: &Key) -> Result<Document> {
        let mut doc = Document::new();
        let signature = doc.push_element(doc.root(), Some("ds"), ns::node::SIGNATURE);
        doc.push_ns_decl(signature, Some("ds"), ns::DSIG);
        self.sign_in_doc(ctx, key, doc, signature)
    }

    /// Sign a target document in place, appending the signature as the last
    /// child of its root element (enveloped).
    pub fn sign_enveloped(&mut self, ctx: &DsigContext, key: &Key, target: &str) -> Result<Document> {
        let mut doc = Document::parse(target)?;
        let root = doc
            .root_element()
            .ok_or_else(|| Error::XmlStructure("target document has no root element".into()))?;
        let signature = doc.push_element(root, Some("ds"), ns::node::SIGNATURE);
        doc.push_ns_decl(signature, Some("ds"), ns::DSIG);
        self.sign_in_doc(ctx, key, doc, signature)
    }

    /// Serialize the full structure under `signature`, then fill digest and
    /// signature values in place.
    fn sign_in_doc(
        &mut self,
        ctx: &DsigContext,
        key: &Key,
        mut doc: Document,
        signature: NodeId,
    ) -> Result<Document> {
        if let Some(id) = &self.signature_id {
            doc.push_attr(signature, None, ns::attr::ID, id);
        }

        let signed_info_node = self.signed_info.get_xml(&mut doc, signature)?;
        let reference_nodes =
            doc.find_child_elements(signed_info_node, ns::DSIG, ns::node::REFERENCE);

        let signature_value_node =
            doc.push_element(signature, Some("ds"), ns::node::SIGNATURE_VALUE);

        if let Some(key_info) = &self.key_info {
            if !key_info.is_empty() {
                key_info.get_xml(&mut doc, signature);
            }
        }

        for object in &self.objects {
            let object_node = doc.push_element(signature, Some("ds"), ns::node::OBJECT);
            if let Some(id) = &object.id {
                doc.push_attr(object_node, None, ns::attr::ID, id);
            }
            match &object.content {
                ObjectContent::Text(text) => {
                    doc.push_text(object_node, text);
                }
                ObjectContent::Xml(content) => {
                    if let Some(content_root) = content.root_element() {
                        doc.import_subtree(object_node, content, content_root);
                    }
                }
            }
        }

        // Digests are computed against the final document context, so the
        // canonical form already includes inherited namespace declarations.
        let id_map = doc.build_id_map(&ctx.id_attrs);
        let doc_arc = Arc::new(doc);
        for reference in self.signed_info.references_mut() {
            reference.compute_digest(ctx, &doc_arc, &id_map, Some(signature))?;
        }
        let mut doc = Arc::try_unwrap(doc_arc)
            .map_err(|_| Error::XmlStructure("signing document still referenced".into()))?;

        let engine = base64::engine::general_purpose::STANDARD;
        for (reference, ref_node) in self.signed_info.references().iter().zip(&reference_nodes) {
            if let Some(dv) = doc.find_child_element(*ref_node, ns::DSIG, ns::node::DIGEST_VALUE)
            {
                doc.set_text_content(dv, &engine.encode(reference.digest_value()));
            }
        }

        let canonical = self.signed_info.canonical_bytes(&doc, signed_info_node)?;
        let method = self
            .signed_info
            .signature_method()
            .ok_or(Error::MissingSignatureMethod)?;
        let algorithm = ctx.algorithms.signature(method, self.signed_info.params())?;
        let value = algorithm.sign(&key.to_signing_key(), &canonical)?;
        debug!(
            method = %method,
            signed_info_len = canonical.len(),
            signature_len = value.len(),
            "signed SignedInfo"
        );
        doc.set_text_content(signature_value_node, &engine.encode(&value));
        self.signature_value = value;

        Ok(doc)
    }

    // ── Loading ──────────────────────────────────────────────────────

    /// Parse a signature from XML text.  The document is retained so that
    /// verification operates on the loaded octets.
    pub fn load(xml: &str) -> Result<Self> {
        let doc = Document::parse(xml)?;
        Self::from_document(doc)
    }

    /// Parse the first `<ds:Signature>` found in `doc`.
    pub fn from_document(doc: Document) -> Result<Self> {
        let signature = doc
            .find_element(doc.root(), ns::DSIG, ns::node::SIGNATURE)
            .ok_or_else(|| Error::MissingElement(ns::node::SIGNATURE.into()))?;

        let signed_info_node = doc
            .find_child_element(signature, ns::DSIG, ns::node::SIGNED_INFO)
            .ok_or_else(|| Error::MissingElement(ns::node::SIGNED_INFO.into()))?;
        let signed_info = SignedInfo::load_xml(&doc, signed_info_node)?;

        let signature_value_node = doc
            .find_child_element(signature, ns::DSIG, ns::node::SIGNATURE_VALUE)
            .ok_or_else(|| Error::MissingElement(ns::node::SIGNATURE_VALUE.into()))?;
        let value_text = doc.text_content(signature_value_node);
        let clean: String = value_text.chars().filter(|c| !c.is_whitespace()).collect();
        let signature_value = base64::engine::general_purpose::STANDARD
            .decode(&clean)
            .map_err(|e| Error::Base64(format!("SignatureValue: {e}")))?;

        let key_info = match doc.find_child_element(signature, ns::DSIG, ns::node::KEY_INFO) {
            Some(node) => Some(KeyInfo::load_xml(&doc, node)?),
            None => None,
        };

        let signature_id = doc.attribute(signature, ns::attr::ID).map(str::to_owned);

        Ok(Self {
            signed_info,
            key_info,
            signature_id,
            signature_value,
            objects: Vec::new(),
            loaded: Some(Loaded {
                doc: Arc::new(doc),
                signature,
                signed_info: signed_info_node,
            }),
        })
    }

    // ── Verification ─────────────────────────────────────────────────

    /// Verify the signature.  `key` overrides any key material carried in
    /// `KeyInfo`; when `None`, the key is resolved from `KeyInfo`.
    ///
    /// Every reference digest is recomputed and compared first, then the
    /// signature value is checked with the algorithm the `SignatureMethod`
    /// declares (never one inferred from the key).  Both must pass.
    pub fn verify(&self, ctx: &DsigContext, key: Option<&Key>) -> Result<()> {
        let loaded = self
            .loaded
            .as_ref()
            .ok_or_else(|| Error::XmlStructure("no loaded signature to verify".into()))?;

        let method = self
            .signed_info
            .signature_method()
            .ok_or(Error::MissingSignatureMethod)?;

        let resolved;
        let key = match key {
            Some(key) => key,
            None => {
                resolved = self
                    .key_info
                    .as_ref()
                    .and_then(KeyInfo::resolve_key)
                    .ok_or_else(|| Error::Key("no verification key available".into()))?;
                &resolved
            }
        };

        let id_map = loaded.doc.build_id_map(&ctx.id_attrs);
        for reference in self.signed_info.references() {
            reference.verify_digest(ctx, &loaded.doc, &id_map, Some(loaded.signature))?;
        }
        debug!("reference digests verified, checking signature value");

        let canonical = self
            .signed_info
            .canonical_bytes(&loaded.doc, loaded.signed_info)?;
        let algorithm = ctx.algorithms.signature(method, self.signed_info.params())?;
        let ok = algorithm.verify(&key.to_signing_key(), &canonical, &self.signature_value)?;
        if !ok {
            return Err(Error::SignatureInvalid(
                "SignatureValue does not match SignedInfo".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::Reference;
    use sigtuna_core::algorithm;
    use sigtuna_keys::{KeyData, KeyUsage};

    fn hmac_key() -> Key {
        Key::new(KeyData::Hmac(b"0123456789abcdef".to_vec()), KeyUsage::Any)
    }

    fn enveloping_hmac_signature() -> (SignedXml, String) {
        let mut si = SignedInfo::new();
        si.set_signature_method(algorithm::HMAC_SHA256);
        si.add_reference(Reference::new(Some("#obj".into()), algorithm::SHA256));

        let mut signed = SignedXml::new(si);
        signed.add_object(ObjectElement::text(Some("obj".into()), "signed payload"));

        let ctx = DsigContext::new();
        let doc = signed.sign(&ctx, &hmac_key()).unwrap();
        let xml = doc.to_xml_string();
        (signed, xml)
    }

    #[test]
    fn enveloping_sign_and_verify() {
        let (_, xml) = enveloping_hmac_signature();
        let loaded = SignedXml::load(&xml).unwrap();
        let ctx = DsigContext::new();
        loaded.verify(&ctx, Some(&hmac_key())).unwrap();
    }

    #[test]
    fn tampered_object_fails_digest() {
        let (_, xml) = enveloping_hmac_signature();
        let tampered = xml.replace("signed payload", "evil payload");
        let loaded = SignedXml::load(&tampered).unwrap();
        let ctx = DsigContext::new();
        assert!(matches!(
            loaded.verify(&ctx, Some(&hmac_key())),
            Err(Error::DigestMismatch(_))
        ));
    }

    #[test]
    fn corrupted_digest_value_fails_as_digest_mismatch() {
        let (_, xml) = enveloping_hmac_signature();
        let open = "<ds:DigestValue>";
        let start = xml.find(open).unwrap() + open.len();
        let mut chars: Vec<char> = xml.chars().collect();
        chars[start] = if chars[start] == 'A' { 'B' } else { 'A' };
        let corrupted: String = chars.into_iter().collect();

        let loaded = SignedXml::load(&corrupted).unwrap();
        let ctx = DsigContext::new();
        assert!(matches!(
            loaded.verify(&ctx, Some(&hmac_key())),
            Err(Error::DigestMismatch(_))
        ));
    }

    #[test]
    fn wrong_key_fails_signature_check() {
        let (_, xml) = enveloping_hmac_signature();
        let loaded = SignedXml::load(&xml).unwrap();
        let ctx = DsigContext::new();
        let other = Key::new(KeyData::Hmac(b"another-secret-key".to_vec()), KeyUsage::Any);
        assert!(matches!(
            loaded.verify(&ctx, Some(&other)),
            Err(Error::SignatureInvalid(_))
        ));
    }

    #[test]
    fn missing_signature_element_is_reported() {
        assert!(matches!(
            SignedXml::load("<doc/>"),
            Err(Error::MissingElement(_))
        ));
    }

    #[test]
    fn verify_without_key_material_fails() {
        let (_, xml) = enveloping_hmac_signature();
        let loaded = SignedXml::load(&xml).unwrap();
        let ctx = DsigContext::new();
        assert!(matches!(
            loaded.verify(&ctx, None),
            Err(Error::Key(_))
        ));
    }
}
