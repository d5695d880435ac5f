#![forbid(unsafe_code)]

//! `<ds:KeyInfo>` reading and writing.
//!
//! A `KeyInfo` is an ordered list of clauses.  KeyName, KeyValue (RSA and
//! EC), and X509Data are understood; other clauses are skipped on load.

use crate::key::{Key, KeyData, KeyUsage};
use crate::x509data::{
    decode_base64_text, dsig_child_text, element_prefix, in_dsig_ns, X509Data,
};
use base64::Engine;
use rsa::traits::PublicKeyParts;
use sigtuna_core::{ns, Error, Result};
use sigtuna_xml::{Document, NodeId};

/// NamedCurve URI for NIST P-256.
const CURVE_P256: &str = "urn:oid:1.2.840.10045.3.1.7";
/// NamedCurve URI for NIST P-384.
const CURVE_P384: &str = "urn:oid:1.3.132.0.34";

/// An inline public key carried in a `<KeyValue>` element.
#[derive(Debug, Clone)]
pub enum KeyValue {
    Rsa(rsa::RsaPublicKey),
    EcP256(p256::ecdsa::VerifyingKey),
    EcP384(p384::ecdsa::VerifyingKey),
}

impl KeyValue {
    /// The public half of `key` as a KeyValue, when it has an XML form.
    pub fn from_key(key: &Key) -> Option<Self> {
        match &key.data {
            KeyData::Rsa { public, .. } => Some(Self::Rsa(public.clone())),
            KeyData::EcP256 { public, .. } => Some(Self::EcP256(*public)),
            KeyData::EcP384 { public, .. } => Some(Self::EcP384(*public)),
            KeyData::Dsa { .. } | KeyData::Hmac(_) => None,
        }
    }

    /// Wrap this public key as a verification [`Key`].
    pub fn to_key(&self) -> Key {
        let data = match self {
            Self::Rsa(pk) => KeyData::Rsa {
                private: None,
                public: pk.clone(),
            },
            Self::EcP256(vk) => KeyData::EcP256 {
                private: None,
                public: *vk,
            },
            Self::EcP384(vk) => KeyData::EcP384 {
                private: None,
                public: *vk,
            },
        };
        Key::new(data, KeyUsage::Verify)
    }
}

/// One clause inside `<KeyInfo>`.
#[derive(Debug)]
pub enum KeyInfoClause {
    KeyName(String),
    KeyValue(KeyValue),
    X509Data(X509Data),
}

/// An ordered list of KeyInfo clauses.
#[derive(Debug, Default)]
pub struct KeyInfo {
    clauses: Vec<KeyInfoClause>,
}

impl KeyInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_key_name(&mut self, name: impl Into<String>) {
        self.clauses.push(KeyInfoClause::KeyName(name.into()));
    }

    pub fn add_key_value(&mut self, value: KeyValue) {
        self.clauses.push(KeyInfoClause::KeyValue(value));
    }

    pub fn add_x509_data(&mut self, data: X509Data) {
        self.clauses.push(KeyInfoClause::X509Data(data));
    }

    pub fn clauses(&self) -> &[KeyInfoClause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Derive a verification key from the clauses.
    ///
    /// X509Data certificates take precedence over inline KeyValue clauses;
    /// a bare KeyName identifies a key but does not carry one.
    pub fn resolve_key(&self) -> Option<Key> {
        for clause in &self.clauses {
            if let KeyInfoClause::X509Data(data) = clause {
                if let Ok(key) = data.public_key() {
                    return Some(key);
                }
            }
        }
        for clause in &self.clauses {
            if let KeyInfoClause::KeyValue(value) = clause {
                return Some(value.to_key());
            }
        }
        None
    }

    // ── XML serialization ────────────────────────────────────────────

    /// Append a `<KeyInfo>` element under `parent`, one child per clause.
    pub fn get_xml(&self, doc: &mut Document, parent: NodeId) -> NodeId {
        let prefix = element_prefix(doc, parent);
        let prefix = prefix.as_deref();
        let key_info = doc.push_element(parent, prefix, ns::node::KEY_INFO);

        for clause in &self.clauses {
            match clause {
                KeyInfoClause::KeyName(name) => {
                    let el = doc.push_element(key_info, prefix, ns::node::KEY_NAME);
                    doc.push_text(el, name);
                }
                KeyInfoClause::KeyValue(value) => {
                    emit_key_value(doc, key_info, prefix, value);
                }
                KeyInfoClause::X509Data(data) => {
                    data.get_xml(doc, key_info);
                }
            }
        }
        key_info
    }

    /// Read the clauses of an existing `<KeyInfo>` element.
    pub fn load_xml(doc: &Document, node: NodeId) -> Result<Self> {
        let mut info = Self::new();
        for child in doc.children(node) {
            let Some(el) = doc.element(*child) else {
                continue;
            };
            if !in_dsig_ns(doc, *child) {
                continue;
            }
            match el.local.as_str() {
                ns::node::KEY_NAME => {
                    info.add_key_name(doc.text_content(*child).trim());
                }
                ns::node::KEY_VALUE => {
                    if let Some(value) = parse_key_value(doc, *child)? {
                        info.add_key_value(value);
                    }
                }
                ns::node::X509_DATA => {
                    let mut data = X509Data::new();
                    data.load_xml(doc, *child)?;
                    info.add_x509_data(data);
                }
                _ => {}
            }
        }
        Ok(info)
    }
}

// ── KeyValue XML forms ───────────────────────────────────────────────

fn emit_key_value(doc: &mut Document, parent: NodeId, prefix: Option<&str>, value: &KeyValue) {
    let engine = base64::engine::general_purpose::STANDARD;
    let key_value = doc.push_element(parent, prefix, ns::node::KEY_VALUE);

    match value {
        KeyValue::Rsa(pk) => {
            let rsa_kv = doc.push_element(key_value, prefix, ns::node::RSA_KEY_VALUE);
            let modulus = doc.push_element(rsa_kv, prefix, ns::node::RSA_MODULUS);
            doc.push_text(modulus, &engine.encode(pk.n().to_bytes_be()));
            let exponent = doc.push_element(rsa_kv, prefix, ns::node::RSA_EXPONENT);
            doc.push_text(exponent, &engine.encode(pk.e().to_bytes_be()));
        }
        KeyValue::EcP256(vk) => {
            let point = vk.to_encoded_point(false);
            emit_ec_key_value(doc, key_value, CURVE_P256, point.as_bytes());
        }
        KeyValue::EcP384(vk) => {
            let point = vk.to_encoded_point(false);
            emit_ec_key_value(doc, key_value, CURVE_P384, point.as_bytes());
        }
    }
}

/// ECKeyValue lives in the xmldsig 1.1 namespace.
fn emit_ec_key_value(doc: &mut Document, key_value: NodeId, curve_uri: &str, point: &[u8]) {
    let engine = base64::engine::general_purpose::STANDARD;
    let ec_kv = doc.push_element(key_value, Some("dsig11"), ns::node::EC_KEY_VALUE);
    doc.push_ns_decl(ec_kv, Some("dsig11"), ns::DSIG11);
    let curve = doc.push_element(ec_kv, Some("dsig11"), ns::node::NAMED_CURVE);
    doc.push_attr(curve, None, ns::attr::URI, curve_uri);
    let public = doc.push_element(ec_kv, Some("dsig11"), ns::node::PUBLIC_KEY);
    doc.push_text(public, &engine.encode(point));
}

/// Parse a `<KeyValue>` child element.  Returns `Ok(None)` for key types the
/// library does not understand.
fn parse_key_value(doc: &Document, node: NodeId) -> Result<Option<KeyValue>> {
    for child in doc.children(node) {
        let Some(el) = doc.element(*child) else {
            continue;
        };
        match (doc.element_ns(*child), el.local.as_str()) {
            (Some(ns::DSIG) | None, ns::node::RSA_KEY_VALUE) => {
                return parse_rsa_key_value(doc, *child).map(Some);
            }
            (Some(ns::DSIG11) | Some(ns::DSIG), ns::node::EC_KEY_VALUE) => {
                return parse_ec_key_value(doc, *child).map(Some);
            }
            _ => {}
        }
    }
    Ok(None)
}

fn parse_rsa_key_value(doc: &Document, node: NodeId) -> Result<KeyValue> {
    let modulus_text = dsig_child_text(doc, node, ns::node::RSA_MODULUS)
        .ok_or_else(|| Error::MissingElement("Modulus".into()))?;
    let exponent_text = dsig_child_text(doc, node, ns::node::RSA_EXPONENT)
        .ok_or_else(|| Error::MissingElement("Exponent".into()))?;

    let modulus = decode_crypto_binary(&modulus_text)
        .map_err(|e| Error::Base64(format!("Modulus: {e}")))?;
    let exponent = decode_crypto_binary(&exponent_text)
        .map_err(|e| Error::Base64(format!("Exponent: {e}")))?;

    let n = rsa::BigUint::from_bytes_be(&modulus);
    let e = rsa::BigUint::from_bytes_be(&exponent);
    let public = rsa::RsaPublicKey::new(n, e)
        .map_err(|err| Error::Key(format!("invalid RSA public key: {err}")))?;
    Ok(KeyValue::Rsa(public))
}

fn parse_ec_key_value(doc: &Document, node: NodeId) -> Result<KeyValue> {
    let curve_node = doc
        .children(node)
        .iter()
        .copied()
        .find(|c| {
            doc.element(*c)
                .is_some_and(|el| el.local == ns::node::NAMED_CURVE)
        })
        .ok_or_else(|| Error::MissingElement("NamedCurve".into()))?;
    let curve_uri = doc
        .attribute(curve_node, ns::attr::URI)
        .ok_or_else(|| Error::MissingAttribute("URI on NamedCurve".into()))?
        .to_owned();

    let point_text = doc
        .children(node)
        .iter()
        .copied()
        .find(|c| {
            doc.element(*c)
                .is_some_and(|el| el.local == ns::node::PUBLIC_KEY)
        })
        .map(|c| doc.text_content(c))
        .ok_or_else(|| Error::MissingElement("PublicKey".into()))?;
    let point = decode_base64_text(&point_text, "EC PublicKey")?;

    match curve_uri.as_str() {
        CURVE_P256 => {
            let vk = p256::ecdsa::VerifyingKey::from_sec1_bytes(&point)
                .map_err(|e| Error::Key(format!("invalid P-256 public key point: {e}")))?;
            Ok(KeyValue::EcP256(vk))
        }
        CURVE_P384 => {
            let vk = p384::ecdsa::VerifyingKey::from_sec1_bytes(&point)
                .map_err(|e| Error::Key(format!("invalid P-384 public key point: {e}")))?;
            Ok(KeyValue::EcP384(vk))
        }
        _ => Err(Error::Unsupported(format!("EC curve: {curve_uri}"))),
    }
}

/// Decode a CryptoBinary value that may be base64 or hex encoded.
///
/// Some interop test vectors carry RSA modulus/exponent values as hex
/// strings rather than base64.
fn decode_crypto_binary(text: &str) -> std::result::Result<Vec<u8>, String> {
    let clean: String = text.trim().chars().filter(|c| !c.is_whitespace()).collect();
    if clean.is_empty() {
        return Err("empty value".into());
    }

    let engine = base64::engine::general_purpose::STANDARD;
    if let Ok(bytes) = engine.decode(&clean) {
        return Ok(bytes);
    }

    if clean.len() % 2 == 0 && clean.chars().all(|c| c.is_ascii_hexdigit()) {
        let bytes: std::result::Result<Vec<u8>, _> = (0..clean.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&clean[i..i + 2], 16))
            .collect();
        if let Ok(bytes) = bytes {
            return Ok(bytes);
        }
    }

    Err(format!(
        "value is neither base64 nor hex: {}",
        &clean[..clean.len().min(20)]
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_rsa_public_key() -> rsa::RsaPublicKey {
        // 512-bit odd modulus, enough to satisfy key validation
        let mut n_bytes = [0xc3u8; 64];
        n_bytes[0] = 0xe1;
        let n = rsa::BigUint::from_bytes_be(&n_bytes);
        let e = rsa::BigUint::from(65537u32);
        rsa::RsaPublicKey::new(n, e).unwrap()
    }

    #[test]
    fn key_info_round_trip_with_rsa_key_value() {
        let public = test_rsa_public_key();
        let mut info = KeyInfo::new();
        info.add_key_name("signer-1");
        info.add_key_value(KeyValue::Rsa(public.clone()));

        let mut doc = Document::new();
        let root = doc.push_element(doc.root(), Some("ds"), "root");
        doc.push_ns_decl(root, Some("ds"), ns::DSIG);
        info.get_xml(&mut doc, root);
        let xml = doc.to_xml_string();

        let reparsed = Document::parse(&xml).unwrap();
        let key_info_node = reparsed
            .find_element(reparsed.root(), ns::DSIG, ns::node::KEY_INFO)
            .unwrap();
        let loaded = KeyInfo::load_xml(&reparsed, key_info_node).unwrap();

        assert_eq!(loaded.clauses().len(), 2);
        let key = loaded.resolve_key().unwrap();
        assert_eq!(key.rsa_public_key(), Some(&public));
    }

    #[test]
    fn ec_key_value_round_trip() {
        let sk = p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        let vk = *sk.verifying_key();
        let mut info = KeyInfo::new();
        info.add_key_value(KeyValue::EcP256(vk));

        let mut doc = Document::new();
        let root = doc.push_element(doc.root(), None, "root");
        doc.push_ns_decl(root, None, ns::DSIG);
        info.get_xml(&mut doc, root);
        let xml = doc.to_xml_string();

        let reparsed = Document::parse(&xml).unwrap();
        let key_info_node = reparsed
            .find_element(reparsed.root(), ns::DSIG, ns::node::KEY_INFO)
            .unwrap();
        let loaded = KeyInfo::load_xml(&reparsed, key_info_node).unwrap();

        let key = loaded.resolve_key().unwrap();
        match key.data {
            KeyData::EcP256 { public, .. } => assert_eq!(public, vk),
            other => panic!("unexpected key data: {other:?}"),
        }
    }

    #[test]
    fn hex_encoded_modulus_is_accepted() {
        let xml = r#"<KeyInfo xmlns="http://www.w3.org/2000/09/xmldsig#">
            <KeyValue><RSAKeyValue>
                <Modulus>e1c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3</Modulus>
                <Exponent>010001</Exponent>
            </RSAKeyValue></KeyValue>
        </KeyInfo>"#;
        let doc = Document::parse(xml).unwrap();
        let node = doc.root_element().unwrap();
        let info = KeyInfo::load_xml(&doc, node).unwrap();
        assert!(info.resolve_key().is_some());
    }

    #[test]
    fn key_name_alone_resolves_no_key() {
        let mut info = KeyInfo::new();
        info.add_key_name("only-a-name");
        assert!(info.resolve_key().is_none());
    }
}
