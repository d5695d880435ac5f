#![forbid(unsafe_code)]

//! Enveloped signature transform.
//!
//! Removes the containing `<Signature>` element and its subtree from the
//! node set, so a signature embedded in the signed document does not sign
//! itself.

use crate::pipeline::{Transform, TransformData};
use sigtuna_core::{algorithm, Error, Result};
use sigtuna_xml::{NodeId, NodeSet};

pub struct EnvelopedSignatureTransform {
    /// The `<Signature>` element to exclude.
    signature_node: NodeId,
}

impl EnvelopedSignatureTransform {
    pub fn new(signature_node: NodeId) -> Self {
        Self { signature_node }
    }
}

impl Transform for EnvelopedSignatureTransform {
    fn uri(&self) -> &str {
        algorithm::ENVELOPED_SIGNATURE
    }

    fn execute(&self, input: TransformData) -> Result<TransformData> {
        match input {
            TransformData::Xml { doc, node_set } => {
                let mut set = node_set.unwrap_or_else(|| NodeSet::all_without_comments(&doc));
                set.remove_subtree(&doc, self.signature_node);
                Ok(TransformData::Xml {
                    doc,
                    node_set: Some(set),
                })
            }
            TransformData::Binary(_) => Err(Error::Transform(
                "enveloped-signature transform requires XML input".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigtuna_core::ns;
    use sigtuna_xml::Document;
    use std::sync::Arc;

    #[test]
    fn signature_subtree_is_removed() {
        let xml = r#"<doc><data>payload</data><Signature xmlns="http://www.w3.org/2000/09/xmldsig#"><SignedInfo/></Signature></doc>"#;
        let doc = Document::parse(xml).unwrap();
        let sig = doc
            .find_element(doc.root(), ns::DSIG, ns::node::SIGNATURE)
            .unwrap();

        let transform = EnvelopedSignatureTransform::new(sig);
        let out = transform
            .execute(TransformData::Xml {
                doc: Arc::new(doc),
                node_set: None,
            })
            .unwrap();

        let bytes = out.to_octets().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("<data>payload</data>"));
        assert!(!text.contains("Signature"));
    }

    #[test]
    fn binary_input_is_rejected() {
        let doc = Document::parse("<a/>").unwrap();
        let transform = EnvelopedSignatureTransform::new(doc.root());
        assert!(matches!(
            transform.execute(TransformData::Binary(Vec::new())),
            Err(Error::Transform(_))
        ));
    }
}
