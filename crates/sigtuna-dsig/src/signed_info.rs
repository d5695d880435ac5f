#![forbid(unsafe_code)]

//! `<ds:SignedInfo>`: canonicalization method, signature method and the
//! reference list.  This subtree is what the signature value actually covers.

use crate::reference::{read_inclusive_prefixes, Reference};
use sigtuna_c14n::C14nMode;
use sigtuna_core::{algorithm, ns, Error, Result};
use sigtuna_crypto::SignatureParams;
use sigtuna_xml::{Document, NodeId, NodeSet};

/// The signed core of a signature.
///
/// Construction is incremental; [`SignedInfo::get_xml`] refuses to serialize
/// until a signature method and at least one reference are present.
#[derive(Debug, Clone)]
pub struct SignedInfo {
    id: Option<String>,
    c14n_mode: C14nMode,
    c14n_prefixes: Vec<String>,
    signature_method: Option<String>,
    params: SignatureParams,
    references: Vec<Reference>,
}

impl SignedInfo {
    /// Create an empty SignedInfo with exclusive canonicalization.
    pub fn new() -> Self {
        Self {
            id: None,
            c14n_mode: C14nMode::Exclusive,
            c14n_prefixes: Vec::new(),
            signature_method: None,
            params: SignatureParams::default(),
            references: Vec::new(),
        }
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub fn set_c14n_method(&mut self, mode: C14nMode) {
        self.c14n_mode = mode;
    }

    /// InclusiveNamespaces PrefixList for exclusive canonicalization of
    /// the SignedInfo itself.
    pub fn set_c14n_prefixes(&mut self, prefixes: Vec<String>) {
        self.c14n_prefixes = prefixes;
    }

    pub fn set_signature_method(&mut self, uri: impl Into<String>) {
        self.signature_method = Some(uri.into());
    }

    pub fn set_signature_params(&mut self, params: SignatureParams) {
        self.params = params;
    }

    pub fn add_reference(&mut self, reference: Reference) {
        self.references.push(reference);
    }

    pub fn c14n_mode(&self) -> C14nMode {
        self.c14n_mode
    }

    pub fn signature_method(&self) -> Option<&str> {
        self.signature_method.as_deref()
    }

    pub fn params(&self) -> &SignatureParams {
        &self.params
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    pub fn references_mut(&mut self) -> &mut [Reference] {
        &mut self.references
    }

    // ── Canonical form ───────────────────────────────────────────────

    /// Canonicalize a SignedInfo subtree with this SignedInfo's declared
    /// method.  `node` is the `<SignedInfo>` element inside `doc`.
    pub fn canonical_bytes(&self, doc: &Document, node: NodeId) -> Result<Vec<u8>> {
        let node_set = if self.c14n_mode.with_comments() {
            NodeSet::tree_with_comments(doc, node)
        } else {
            NodeSet::tree_without_comments(doc, node)
        };
        sigtuna_c14n::canonicalize(doc, self.c14n_mode, Some(&node_set), &self.c14n_prefixes)
    }

    // ── XML serialization ────────────────────────────────────────────

    /// Append a `<SignedInfo>` element under `parent`.
    ///
    /// Fails with `MissingSignatureMethod` or `EmptyReferenceList` when the
    /// structure is incomplete; an unsigned-looking but schema-valid
    /// SignedInfo is never produced.
    pub fn get_xml(&self, doc: &mut Document, parent: NodeId) -> Result<NodeId> {
        let method = self
            .signature_method
            .as_deref()
            .ok_or(Error::MissingSignatureMethod)?;
        if self.references.is_empty() {
            return Err(Error::EmptyReferenceList);
        }

        let prefix = doc.element(parent).and_then(|el| el.prefix.clone());
        let prefix = prefix.as_deref();

        let signed_info = doc.push_element(parent, prefix, ns::node::SIGNED_INFO);
        if let Some(id) = &self.id {
            doc.push_attr(signed_info, None, ns::attr::ID, id);
        }

        let c14n = doc.push_element(signed_info, prefix, ns::node::CANONICALIZATION_METHOD);
        doc.push_attr(c14n, None, ns::attr::ALGORITHM, self.c14n_mode.uri());
        if self.c14n_mode.is_exclusive() && !self.c14n_prefixes.is_empty() {
            let inc = doc.push_element(c14n, Some("ec"), ns::node::INCLUSIVE_NAMESPACES);
            doc.push_ns_decl(inc, Some("ec"), ns::EXC_C14N);
            doc.push_attr(inc, None, ns::attr::PREFIX_LIST, &self.c14n_prefixes.join(" "));
        }

        let sig_method = doc.push_element(signed_info, prefix, ns::node::SIGNATURE_METHOD);
        doc.push_attr(sig_method, None, ns::attr::ALGORITHM, method);
        if let (Some(salt), Some((digest_uri, mgf_uri))) =
            (self.params.pss_salt_length, pss_digest_and_mgf(method))
        {
            let pss = doc.push_element(sig_method, Some("pss"), ns::node::RSA_PSS_PARAMS);
            doc.push_ns_decl(pss, Some("pss"), ns::DSIG_MORE);
            let dm = doc.push_element(pss, prefix, ns::node::DIGEST_METHOD);
            doc.push_attr(dm, None, ns::attr::ALGORITHM, digest_uri);
            let mgf = doc.push_element(pss, Some("pss"), ns::node::RSA_MGF);
            doc.push_attr(mgf, None, ns::attr::ALGORITHM, mgf_uri);
            let salt_node = doc.push_element(pss, Some("pss"), ns::node::SALT_LENGTH);
            doc.push_text(salt_node, &salt.to_string());
        }
        if let Some(bits) = self.params.hmac_output_bits {
            if is_hmac(method) {
                let out = doc.push_element(sig_method, prefix, ns::node::HMAC_OUTPUT_LENGTH);
                doc.push_text(out, &bits.to_string());
            }
        }

        if self.references.is_empty() {
            return Err(Error::EmptyReferenceList);
        }
        for reference in &self.references {
            reference.get_xml(doc, signed_info);
        }

        Ok(signed_info)
    }

    /// Read a `<SignedInfo>` element.
    ///
    /// A present `HMACOutputLength` child is deliberately not read back;
    /// truncated-HMAC verification requires the caller to supply the output
    /// length through [`SignatureParams`].
    pub fn load_xml(doc: &Document, node: NodeId) -> Result<Self> {
        let id = doc.attribute(node, ns::attr::ID).map(str::to_owned);

        let c14n_node = doc
            .find_child_element(node, ns::DSIG, ns::node::CANONICALIZATION_METHOD)
            .ok_or_else(|| {
                Error::MalformedSignedInfo("missing CanonicalizationMethod".into())
            })?;
        let c14n_uri = doc.attribute(c14n_node, ns::attr::ALGORITHM).ok_or_else(|| {
            Error::MalformedSignedInfo("CanonicalizationMethod missing Algorithm".into())
        })?;
        let c14n_mode = C14nMode::from_uri(c14n_uri).ok_or_else(|| {
            Error::UnknownAlgorithm(format!("canonicalization method: {c14n_uri}"))
        })?;
        let c14n_prefixes = read_inclusive_prefixes(doc, c14n_node);

        let method_node = doc
            .find_child_element(node, ns::DSIG, ns::node::SIGNATURE_METHOD)
            .ok_or_else(|| Error::MalformedSignedInfo("missing SignatureMethod".into()))?;
        let signature_method = doc
            .attribute(method_node, ns::attr::ALGORITHM)
            .ok_or_else(|| {
                Error::MalformedSignedInfo("SignatureMethod missing Algorithm".into())
            })?
            .to_owned();

        let mut params = SignatureParams::default();
        if let Some(pss_node) =
            doc.find_child_element(method_node, ns::DSIG_MORE, ns::node::RSA_PSS_PARAMS)
        {
            if let Some(salt_node) =
                doc.find_child_element(pss_node, ns::DSIG_MORE, ns::node::SALT_LENGTH)
            {
                let text = doc.text_content(salt_node);
                let salt = text.trim().parse::<usize>().map_err(|_| {
                    Error::MalformedSignedInfo(format!("invalid SaltLength: {text}"))
                })?;
                params.pss_salt_length = Some(salt);
            }
        }

        let mut references = Vec::new();
        for ref_node in doc.find_child_elements(node, ns::DSIG, ns::node::REFERENCE) {
            references.push(Reference::load_xml(doc, ref_node)?);
        }
        if references.is_empty() {
            return Err(Error::EmptyReferenceList);
        }

        Ok(Self {
            id,
            c14n_mode,
            c14n_prefixes,
            signature_method: Some(signature_method),
            params,
            references,
        })
    }
}

impl Default for SignedInfo {
    fn default() -> Self {
        Self::new()
    }
}

/// Digest and MGF URIs implied by an RSA-PSS signature method.
fn pss_digest_and_mgf(uri: &str) -> Option<(&'static str, &'static str)> {
    match uri {
        algorithm::RSA_PSS_SHA1 => Some((algorithm::SHA1, algorithm::MGF1_SHA1)),
        algorithm::RSA_PSS_SHA224 => Some((algorithm::SHA224, algorithm::MGF1_SHA224)),
        algorithm::RSA_PSS_SHA256 => Some((algorithm::SHA256, algorithm::MGF1_SHA256)),
        algorithm::RSA_PSS_SHA384 => Some((algorithm::SHA384, algorithm::MGF1_SHA384)),
        algorithm::RSA_PSS_SHA512 => Some((algorithm::SHA512, algorithm::MGF1_SHA512)),
        _ => None,
    }
}

fn is_hmac(uri: &str) -> bool {
    matches!(
        uri,
        algorithm::HMAC_SHA1
            | algorithm::HMAC_SHA224
            | algorithm::HMAC_SHA256
            | algorithm::HMAC_SHA384
            | algorithm::HMAC_SHA512
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_doc() -> (Document, NodeId) {
        let mut doc = Document::new();
        let root = doc.push_element(doc.root(), Some("ds"), ns::node::SIGNATURE);
        doc.push_ns_decl(root, Some("ds"), ns::DSIG);
        (doc, root)
    }

    #[test]
    fn serialization_requires_signature_method() {
        let mut si = SignedInfo::new();
        si.add_reference(Reference::new(Some("#x".into()), algorithm::SHA256));
        let (mut doc, root) = host_doc();
        assert!(matches!(
            si.get_xml(&mut doc, root),
            Err(Error::MissingSignatureMethod)
        ));
    }

    #[test]
    fn serialization_requires_references() {
        let mut si = SignedInfo::new();
        si.set_signature_method(algorithm::RSA_SHA256);
        let (mut doc, root) = host_doc();
        assert!(matches!(
            si.get_xml(&mut doc, root),
            Err(Error::EmptyReferenceList)
        ));
    }

    #[test]
    fn serialization_round_trip() {
        let mut si = SignedInfo::new();
        si.set_c14n_method(C14nMode::Exclusive);
        si.set_c14n_prefixes(vec!["soap".into()]);
        si.set_signature_method(algorithm::RSA_SHA256);
        si.add_reference(Reference::new(Some("#data".into()), algorithm::SHA256));

        let (mut doc, root) = host_doc();
        si.get_xml(&mut doc, root).unwrap();

        let reparsed = Document::parse(&doc.to_xml_string()).unwrap();
        let node = reparsed
            .find_element(reparsed.root(), ns::DSIG, ns::node::SIGNED_INFO)
            .unwrap();
        let loaded = SignedInfo::load_xml(&reparsed, node).unwrap();

        assert_eq!(loaded.c14n_mode(), C14nMode::Exclusive);
        assert_eq!(loaded.c14n_prefixes, ["soap"]);
        assert_eq!(loaded.signature_method(), Some(algorithm::RSA_SHA256));
        assert_eq!(loaded.references().len(), 1);
        assert_eq!(loaded.references()[0].uri(), Some("#data"));
    }

    #[test]
    fn pss_salt_length_round_trip() {
        let mut si = SignedInfo::new();
        si.set_signature_method(algorithm::RSA_PSS_SHA256);
        si.set_signature_params(SignatureParams {
            pss_salt_length: Some(20),
            ..Default::default()
        });
        si.add_reference(Reference::new(Some("#x".into()), algorithm::SHA256));

        let (mut doc, root) = host_doc();
        si.get_xml(&mut doc, root).unwrap();

        let reparsed = Document::parse(&doc.to_xml_string()).unwrap();
        let node = reparsed
            .find_element(reparsed.root(), ns::DSIG, ns::node::SIGNED_INFO)
            .unwrap();
        let loaded = SignedInfo::load_xml(&reparsed, node).unwrap();
        assert_eq!(loaded.params().pss_salt_length, Some(20));
    }

    #[test]
    fn hmac_output_length_is_emitted_but_not_reloaded() {
        let mut si = SignedInfo::new();
        si.set_signature_method(algorithm::HMAC_SHA256);
        si.set_signature_params(SignatureParams {
            hmac_output_bits: Some(128),
            ..Default::default()
        });
        si.add_reference(Reference::new(Some("#x".into()), algorithm::SHA256));

        let (mut doc, root) = host_doc();
        si.get_xml(&mut doc, root).unwrap();
        let xml = doc.to_xml_string();
        assert!(xml.contains("HMACOutputLength"));
        assert!(xml.contains("128"));

        let reparsed = Document::parse(&xml).unwrap();
        let node = reparsed
            .find_element(reparsed.root(), ns::DSIG, ns::node::SIGNED_INFO)
            .unwrap();
        let loaded = SignedInfo::load_xml(&reparsed, node).unwrap();
        assert_eq!(loaded.params().hmac_output_bits, None);
    }

    #[test]
    fn load_without_canonicalization_method_is_malformed() {
        let xml = r#"<SignedInfo xmlns="http://www.w3.org/2000/09/xmldsig#">
            <SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"/>
        </SignedInfo>"#;
        let doc = Document::parse(xml).unwrap();
        let node = doc.root_element().unwrap();
        assert!(matches!(
            SignedInfo::load_xml(&doc, node),
            Err(Error::MalformedSignedInfo(_))
        ));
    }

    #[test]
    fn load_without_references_is_rejected() {
        let xml = r#"<SignedInfo xmlns="http://www.w3.org/2000/09/xmldsig#">
            <CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/>
            <SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"/>
        </SignedInfo>"#;
        let doc = Document::parse(xml).unwrap();
        let node = doc.root_element().unwrap();
        assert!(matches!(
            SignedInfo::load_xml(&doc, node),
            Err(Error::EmptyReferenceList)
        ));
    }
}
