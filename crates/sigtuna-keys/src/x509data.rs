#![forbid(unsafe_code)]

//! `<ds:X509Data>` content: certificates, issuer/serial pairs, subject key
//! identifiers, subject names, and an optional CRL.

use base64::Engine;
use sigtuna_core::{ns, Error, Result};
use sigtuna_xml::{Document, NodeId};

/// An `<X509IssuerSerial>` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X509IssuerSerial {
    pub issuer_name: String,
    pub serial_number: String,
}

/// The contents of one `<ds:X509Data>` element.
///
/// The groups are independent ordered lists; XML-DSig allows any mix of
/// them, in any order, within one element.
#[derive(Debug, Default)]
pub struct X509Data {
    issuer_serials: Vec<X509IssuerSerial>,
    subject_key_ids: Vec<Vec<u8>>,
    subject_names: Vec<String>,
    certificates: Vec<Vec<u8>>,
    crl: Option<Vec<u8>>,
}

impl X509Data {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Adders ───────────────────────────────────────────────────────

    /// Add a DER-encoded certificate.
    pub fn add_certificate(&mut self, der: &[u8]) -> Result<()> {
        if der.is_empty() {
            return Err(Error::MissingArgument("certificate data".into()));
        }
        self.certificates.push(der.to_vec());
        Ok(())
    }

    /// Add an issuer name / serial number pair.
    pub fn add_issuer_serial(&mut self, issuer_name: &str, serial_number: &str) -> Result<()> {
        if issuer_name.is_empty() {
            return Err(Error::MissingArgument("issuer name".into()));
        }
        if serial_number.is_empty() {
            return Err(Error::MissingArgument("serial number".into()));
        }
        self.issuer_serials.push(X509IssuerSerial {
            issuer_name: issuer_name.to_owned(),
            serial_number: serial_number.to_owned(),
        });
        Ok(())
    }

    /// Add a subject key identifier (raw octets).
    pub fn add_subject_key_id(&mut self, ski: &[u8]) -> Result<()> {
        if ski.is_empty() {
            return Err(Error::MissingArgument("subject key identifier".into()));
        }
        self.subject_key_ids.push(ski.to_vec());
        Ok(())
    }

    /// Add a subject name.
    pub fn add_subject_name(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::MissingArgument("subject name".into()));
        }
        self.subject_names.push(name.to_owned());
        Ok(())
    }

    /// Set the DER-encoded CRL.  At most one CRL per X509Data.
    pub fn set_crl(&mut self, der: &[u8]) -> Result<()> {
        if der.is_empty() {
            return Err(Error::MissingArgument("CRL data".into()));
        }
        self.crl = Some(der.to_vec());
        Ok(())
    }

    /// Build the certificate chain for a leaf certificate from a store.
    pub fn add_certificates_chain_from(&mut self, _leaf_der: &[u8]) -> Result<()> {
        Err(Error::NotImplemented(
            "certificate chain construction".into(),
        ))
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn certificates(&self) -> &[Vec<u8>] {
        &self.certificates
    }

    pub fn issuer_serials(&self) -> &[X509IssuerSerial] {
        &self.issuer_serials
    }

    pub fn subject_key_ids(&self) -> &[Vec<u8>] {
        &self.subject_key_ids
    }

    pub fn subject_names(&self) -> &[String] {
        &self.subject_names
    }

    pub fn crl(&self) -> Option<&[u8]> {
        self.crl.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.issuer_serials.is_empty()
            && self.subject_key_ids.is_empty()
            && self.subject_names.is_empty()
            && self.certificates.is_empty()
            && self.crl.is_none()
    }

    /// Public key of the leaf certificate, parsed on demand.
    ///
    /// With multiple certificates the leaf is the one whose subject does not
    /// appear as the issuer of any other certificate in the set.
    pub fn public_key(&self) -> Result<crate::Key> {
        if self.certificates.is_empty() {
            return Err(Error::Certificate("X509Data holds no certificate".into()));
        }
        let leaf_idx = find_leaf_cert(&self.certificates);
        let mut key = crate::loader::load_x509_cert_der(&self.certificates[leaf_idx])?;
        key.x509_chain = self.certificates.clone();
        Ok(key)
    }

    // ── XML serialization ────────────────────────────────────────────

    /// Append an `<X509Data>` element under `parent`.
    ///
    /// Groups are emitted in a fixed order (issuer/serials, subject key ids,
    /// subject names, certificates, CRL); empty groups are omitted.
    pub fn get_xml(&self, doc: &mut Document, parent: NodeId) -> NodeId {
        let prefix = element_prefix(doc, parent);
        let prefix = prefix.as_deref();
        let engine = base64::engine::general_purpose::STANDARD;

        let data = doc.push_element(parent, prefix, ns::node::X509_DATA);

        for pair in &self.issuer_serials {
            let is = doc.push_element(data, prefix, ns::node::X509_ISSUER_SERIAL);
            let name = doc.push_element(is, prefix, ns::node::X509_ISSUER_NAME);
            doc.push_text(name, &pair.issuer_name);
            let serial = doc.push_element(is, prefix, ns::node::X509_SERIAL_NUMBER);
            doc.push_text(serial, &pair.serial_number);
        }
        for ski in &self.subject_key_ids {
            let el = doc.push_element(data, prefix, ns::node::X509_SKI);
            doc.push_text(el, &engine.encode(ski));
        }
        for name in &self.subject_names {
            let el = doc.push_element(data, prefix, ns::node::X509_SUBJECT_NAME);
            doc.push_text(el, name);
        }
        for cert in &self.certificates {
            let el = doc.push_element(data, prefix, ns::node::X509_CERTIFICATE);
            doc.push_text(el, &engine.encode(cert));
        }
        if let Some(crl) = &self.crl {
            let el = doc.push_element(data, prefix, ns::node::X509_CRL);
            doc.push_text(el, &engine.encode(crl));
        }

        data
    }

    /// Read the contents of an `<X509Data>` element.
    ///
    /// All lists are reset first, so loading twice does not accumulate.
    pub fn load_xml(&mut self, doc: &Document, node: NodeId) -> Result<()> {
        self.issuer_serials.clear();
        self.subject_key_ids.clear();
        self.subject_names.clear();
        self.certificates.clear();
        self.crl = None;

        for child in doc.children(node) {
            let Some(el) = doc.element(*child) else {
                continue;
            };
            if !in_dsig_ns(doc, *child) {
                continue;
            }
            match el.local.as_str() {
                ns::node::X509_ISSUER_SERIAL => {
                    let issuer = dsig_child_text(doc, *child, ns::node::X509_ISSUER_NAME)
                        .ok_or_else(|| Error::MissingElement("X509IssuerName".into()))?;
                    let serial = dsig_child_text(doc, *child, ns::node::X509_SERIAL_NUMBER)
                        .ok_or_else(|| Error::MissingElement("X509SerialNumber".into()))?;
                    self.issuer_serials.push(X509IssuerSerial {
                        issuer_name: issuer,
                        serial_number: serial,
                    });
                }
                ns::node::X509_SKI => {
                    self.subject_key_ids
                        .push(decode_base64_text(&doc.text_content(*child), "X509SKI")?);
                }
                ns::node::X509_SUBJECT_NAME => {
                    self.subject_names.push(doc.text_content(*child).trim().to_owned());
                }
                ns::node::X509_CERTIFICATE => {
                    self.certificates.push(decode_base64_text(
                        &doc.text_content(*child),
                        "X509Certificate",
                    )?);
                }
                ns::node::X509_CRL => {
                    self.crl = Some(decode_base64_text(&doc.text_content(*child), "X509CRL")?);
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// The prefix of the element `id`, for emitting children in the same prefix.
pub(crate) fn element_prefix(doc: &Document, id: NodeId) -> Option<String> {
    doc.element(id).and_then(|el| el.prefix.clone())
}

/// Whether the element is in the dsig namespace (or none, for lax inputs).
pub(crate) fn in_dsig_ns(doc: &Document, id: NodeId) -> bool {
    matches!(doc.element_ns(id), Some(ns::DSIG) | None)
}

/// Text of the first dsig-namespaced child with the given local name.
pub(crate) fn dsig_child_text(doc: &Document, parent: NodeId, local: &str) -> Option<String> {
    doc.children(parent)
        .iter()
        .find(|c| {
            doc.element(**c)
                .is_some_and(|el| el.local == local && in_dsig_ns(doc, **c))
        })
        .map(|c| doc.text_content(*c).trim().to_owned())
}

/// Decode base64 element content, tolerating embedded whitespace.
pub(crate) fn decode_base64_text(text: &str, what: &str) -> Result<Vec<u8>> {
    let clean: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(&clean)
        .map_err(|e| Error::Base64(format!("{what}: {e}")))
}

/// Pick the end-entity certificate: the one whose subject is not the issuer
/// of any other certificate in the set.  Falls back to the last one.
fn find_leaf_cert(certs: &[Vec<u8>]) -> usize {
    use der::{Decode, Encode};

    if certs.len() <= 1 {
        return 0;
    }

    let parsed: Vec<Option<x509_cert::Certificate>> = certs
        .iter()
        .map(|der| x509_cert::Certificate::from_der(der).ok())
        .collect();

    let name_der = |n: &x509_cert::name::Name| n.to_der().unwrap_or_default();
    let subjects: Vec<Vec<u8>> = parsed
        .iter()
        .map(|c| c.as_ref().map(|c| name_der(&c.tbs_certificate.subject)).unwrap_or_default())
        .collect();
    let issuers: Vec<Vec<u8>> = parsed
        .iter()
        .map(|c| c.as_ref().map(|c| name_der(&c.tbs_certificate.issuer)).unwrap_or_default())
        .collect();

    let mut leaf = certs.len() - 1;
    for (i, subject) in subjects.iter().enumerate() {
        if subject.is_empty() {
            continue;
        }
        let issues_another = issuers
            .iter()
            .enumerate()
            .any(|(j, issuer)| i != j && issuer == subject);
        if !issues_another {
            leaf = i;
            break;
        }
    }
    leaf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adders_reject_empty_arguments() {
        let mut data = X509Data::new();
        assert!(matches!(
            data.add_certificate(b""),
            Err(Error::MissingArgument(_))
        ));
        assert!(matches!(
            data.add_issuer_serial("", "123"),
            Err(Error::MissingArgument(_))
        ));
        assert!(matches!(
            data.add_issuer_serial("CN=Issuer", ""),
            Err(Error::MissingArgument(_))
        ));
        assert!(matches!(
            data.add_subject_name(""),
            Err(Error::MissingArgument(_))
        ));
        assert!(matches!(data.set_crl(b""), Err(Error::MissingArgument(_))));
        assert!(data.is_empty());
    }

    #[test]
    fn chain_construction_is_not_implemented() {
        let mut data = X509Data::new();
        assert!(matches!(
            data.add_certificates_chain_from(b"\x30\x03\x02\x01\x01"),
            Err(Error::NotImplemented(_))
        ));
    }

    #[test]
    fn groups_are_emitted_in_fixed_order() {
        let mut data = X509Data::new();
        data.add_certificate(b"cert-bytes").unwrap();
        data.add_subject_name("CN=Subject").unwrap();
        data.add_subject_key_id(b"ski").unwrap();
        data.add_issuer_serial("CN=Issuer", "42").unwrap();

        let mut doc = Document::new();
        let root = doc.push_element(doc.root(), None, "root");
        data.get_xml(&mut doc, root);
        let xml = doc.to_xml_string();

        let is = xml.find("X509IssuerSerial").unwrap();
        let ski = xml.find("X509SKI").unwrap();
        let subject = xml.find("X509SubjectName").unwrap();
        let cert = xml.find("X509Certificate").unwrap();
        assert!(is < ski && ski < subject && subject < cert);
        assert!(!xml.contains("X509CRL"));
    }

    #[test]
    fn lists_stay_independent_through_round_trip() {
        let mut data = X509Data::new();
        data.add_subject_name("CN=First").unwrap();
        data.add_subject_name("CN=Second").unwrap();
        data.add_certificate(b"cert-bytes").unwrap();

        let mut doc = Document::new();
        let root = doc.push_element(doc.root(), None, "root");
        let node = data.get_xml(&mut doc, root);
        let xml = doc.to_xml_string();
        assert_eq!(xml.matches("<X509SubjectName").count(), 2);
        assert_eq!(xml.matches("<X509Certificate").count(), 1);
        assert!(!xml.contains("X509SKI"));
        assert!(!xml.contains("X509IssuerSerial"));
        assert!(!xml.contains("X509CRL"));

        let mut reloaded = X509Data::new();
        reloaded.load_xml(&doc, node).unwrap();
        assert_eq!(reloaded.subject_names(), ["CN=First", "CN=Second"]);
        assert_eq!(reloaded.certificates(), [b"cert-bytes".to_vec()]);
        assert!(reloaded.subject_key_ids().is_empty());
        assert!(reloaded.issuer_serials().is_empty());
        assert!(reloaded.crl().is_none());
    }

    #[test]
    fn load_xml_resets_previous_contents() {
        let xml = r#"<X509Data xmlns="http://www.w3.org/2000/09/xmldsig#">
            <X509SubjectName>CN=Loaded</X509SubjectName>
            <X509IssuerSerial>
                <X509IssuerName>CN=Issuer</X509IssuerName>
                <X509SerialNumber>7</X509SerialNumber>
            </X509IssuerSerial>
        </X509Data>"#;
        let doc = Document::parse(xml).unwrap();
        let root = doc.root_element().unwrap();

        let mut data = X509Data::new();
        data.add_subject_name("CN=Stale").unwrap();
        data.add_certificate(b"stale").unwrap();
        data.load_xml(&doc, root).unwrap();

        assert_eq!(data.subject_names(), ["CN=Loaded"]);
        assert!(data.certificates().is_empty());
        assert_eq!(
            data.issuer_serials(),
            [X509IssuerSerial {
                issuer_name: "CN=Issuer".into(),
                serial_number: "7".into(),
            }]
        );
    }

    #[test]
    fn public_key_requires_a_certificate() {
        let data = X509Data::new();
        assert!(matches!(data.public_key(), Err(Error::Certificate(_))));
    }
}
