#![forbid(unsafe_code)]

//! Reference URI resolution.
//!
//! - omitted or empty URI: the whole document, comments excluded
//! - `#id`: the subtree of the element carrying that ID, comments excluded
//! - anything else: external, resolved through the caller's URL map

use crate::pipeline::TransformData;
use sigtuna_core::{Error, Result};
use sigtuna_xml::{Document, NodeId, NodeSet};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Resolve a reference URI into the initial transform input.
pub fn resolve_uri(
    uri: Option<&str>,
    doc: &Arc<Document>,
    id_map: &HashMap<String, NodeId>,
    url_map: &HashMap<String, PathBuf>,
) -> Result<TransformData> {
    match uri {
        None | Some("") => Ok(TransformData::Xml {
            doc: Arc::clone(doc),
            node_set: Some(NodeSet::all_without_comments(doc)),
        }),
        Some(reference) => {
            if let Some(id) = reference.strip_prefix('#') {
                let node = id_map.get(id).copied().ok_or_else(|| {
                    Error::InvalidUri(format!("unresolved same-document reference: #{id}"))
                })?;
                Ok(TransformData::Xml {
                    doc: Arc::clone(doc),
                    node_set: Some(NodeSet::tree_without_comments(doc, node)),
                })
            } else if let Some(path) = url_map.get(reference) {
                let data = std::fs::read(path)?;
                Ok(TransformData::Binary(data))
            } else {
                Err(Error::InvalidUri(format!(
                    "external URI not mapped: {reference}"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_uri_selects_whole_document_without_comments() {
        let doc = Arc::new(Document::parse("<a><!-- c --><b/></a>").unwrap());
        let data = resolve_uri(Some(""), &doc, &HashMap::new(), &HashMap::new()).unwrap();
        assert_eq!(data.to_octets().unwrap(), b"<a><b></b></a>");
    }

    #[test]
    fn fragment_uri_selects_subtree() {
        let doc = Arc::new(Document::parse(r#"<a><b Id="x"><c/></b><d/></a>"#).unwrap());
        let id_map = doc.build_id_map(&[]);
        let data = resolve_uri(Some("#x"), &doc, &id_map, &HashMap::new()).unwrap();
        assert_eq!(data.to_octets().unwrap(), b"<b Id=\"x\"><c></c></b>");
    }

    #[test]
    fn unknown_fragment_fails() {
        let doc = Arc::new(Document::parse("<a/>").unwrap());
        assert!(matches!(
            resolve_uri(Some("#missing"), &doc, &HashMap::new(), &HashMap::new()),
            Err(Error::InvalidUri(_))
        ));
    }

    #[test]
    fn unmapped_external_uri_fails() {
        let doc = Arc::new(Document::parse("<a/>").unwrap());
        assert!(matches!(
            resolve_uri(
                Some("http://example.com/doc.xml"),
                &doc,
                &HashMap::new(),
                &HashMap::new()
            ),
            Err(Error::InvalidUri(_))
        ));
    }
}
