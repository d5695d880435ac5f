#![forbid(unsafe_code)]

//! Base64 decode transform.

use crate::pipeline::{Transform, TransformData};
use base64::Engine;
use sigtuna_core::{algorithm, Error, Result};

/// Decodes base64 text content into raw octets.
///
/// With XML input the text content of the selected element (or the document
/// root) is decoded; this covers references into base64-carrying `<Object>`
/// elements.
pub struct Base64DecodeTransform;

impl Transform for Base64DecodeTransform {
    fn uri(&self) -> &str {
        algorithm::BASE64
    }

    fn execute(&self, input: TransformData) -> Result<TransformData> {
        let text = match &input {
            TransformData::Binary(data) => std::str::from_utf8(data)
                .map_err(|e| Error::Transform(format!("base64 input not UTF-8: {e}")))?
                .to_owned(),
            TransformData::Xml { doc, .. } => {
                let root = doc
                    .root_element()
                    .ok_or_else(|| Error::Transform("base64 input has no content".into()))?;
                doc.text_content(root)
            }
        };

        let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&cleaned)
            .map_err(|e| Error::Base64(format!("decode error: {e}")))?;
        Ok(TransformData::Binary(decoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigtuna_xml::Document;
    use std::sync::Arc;

    #[test]
    fn decodes_binary_input() {
        let out = Base64DecodeTransform
            .execute(TransformData::Binary(b"aGVsbG8=".to_vec()))
            .unwrap();
        assert_eq!(out.to_octets().unwrap(), b"hello");
    }

    #[test]
    fn decodes_element_text_ignoring_whitespace() {
        let doc = Document::parse("<data>aGVs\n  bG8=</data>").unwrap();
        let out = Base64DecodeTransform
            .execute(TransformData::Xml {
                doc: Arc::new(doc),
                node_set: None,
            })
            .unwrap();
        assert_eq!(out.to_octets().unwrap(), b"hello");
    }

    #[test]
    fn invalid_base64_is_an_error() {
        assert!(matches!(
            Base64DecodeTransform.execute(TransformData::Binary(b"!!!".to_vec())),
            Err(Error::Base64(_))
        ));
    }
}
