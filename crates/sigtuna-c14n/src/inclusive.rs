#![forbid(unsafe_code)]

//! Inclusive Canonical XML 1.0 (C14N 1.0).
//!
//! Algorithm URI: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315`
//! With comments: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments`
//!
//! The canonical form:
//! - Outputs namespace declarations sorted by prefix (default first)
//! - Outputs attributes sorted by (namespace-URI, local-name)
//! - Escapes text and attribute values per C14N rules
//! - Optionally preserves or strips comments
//! - Supports document-subset canonicalization via NodeSet

use crate::escape;
use crate::render::{Attr, NsDecl};
use sigtuna_core::{ns, Result};
use sigtuna_xml::{Document, NodeId, NodeKind, NodeSet};
use std::collections::BTreeMap;

/// Canonicalize a document using Inclusive C14N 1.0.
pub fn canonicalize(
    doc: &Document,
    with_comments: bool,
    node_set: Option<&NodeSet>,
) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    let ctx = C14nContext {
        doc,
        with_comments,
        node_set,
    };
    ctx.process_node(doc.root(), &mut output, &BTreeMap::new())?;
    Ok(output)
}

struct C14nContext<'a> {
    doc: &'a Document,
    with_comments: bool,
    node_set: Option<&'a NodeSet>,
}

impl C14nContext<'_> {
    fn is_visible(&self, id: NodeId) -> bool {
        match self.node_set {
            None => true,
            Some(set) => set.contains(id),
        }
    }

    fn process_node(
        &self,
        id: NodeId,
        output: &mut Vec<u8>,
        inherited_ns: &BTreeMap<String, String>,
    ) -> Result<()> {
        match self.doc.kind(id) {
            NodeKind::Root => {
                for child in self.doc.children(id) {
                    self.process_node(*child, output, inherited_ns)?;
                }
            }
            NodeKind::Element(_) => {
                self.process_element(id, output, inherited_ns)?;
            }
            NodeKind::Text(text) => {
                // Text directly under the document node is not part of the
                // canonical form.
                let at_doc_level = self.doc.parent(id) == Some(self.doc.root());
                if self.is_visible(id) && !at_doc_level {
                    output.extend_from_slice(escape::escape_text(text).as_bytes());
                }
            }
            NodeKind::Comment(text) => {
                if self.with_comments && self.is_visible(id) {
                    let at_doc_level = self.doc.parent(id) == Some(self.doc.root());
                    if at_doc_level && has_preceding_element(self.doc, id) {
                        output.push(b'\n');
                    }
                    output.extend_from_slice(b"<!--");
                    output.extend_from_slice(text.as_bytes());
                    output.extend_from_slice(b"-->");
                    if at_doc_level && has_following_element(self.doc, id) {
                        output.push(b'\n');
                    }
                }
            }
            NodeKind::Pi { target, data } => {
                if self.is_visible(id) {
                    let at_doc_level = self.doc.parent(id) == Some(self.doc.root());
                    if at_doc_level && has_preceding_element(self.doc, id) {
                        output.push(b'\n');
                    }
                    output.extend_from_slice(b"<?");
                    output.extend_from_slice(target.as_bytes());
                    if let Some(value) = data {
                        if !value.is_empty() {
                            output.push(b' ');
                            output.extend_from_slice(escape::escape_pi(value).as_bytes());
                        }
                    }
                    output.extend_from_slice(b"?>");
                    if at_doc_level && has_following_element(self.doc, id) {
                        output.push(b'\n');
                    }
                }
            }
        }
        Ok(())
    }

    fn process_element(
        &self,
        id: NodeId,
        output: &mut Vec<u8>,
        inherited_ns: &BTreeMap<String, String>,
    ) -> Result<()> {
        if !self.is_visible(id) {
            // Invisible elements contribute nothing themselves; visible
            // descendants still render against the same inherited context.
            for child in self.doc.children(id) {
                self.process_node(*child, output, inherited_ns)?;
            }
            return Ok(());
        }

        let element = self.doc.element(id).expect("element node");

        // All namespaces in scope at this element; a declaration is output
        // when it is new or different from what the nearest visible
        // ancestor rendered.
        let current_ns = collect_inscope_namespaces(self.doc, id);
        let mut ns_decls: Vec<NsDecl> = Vec::new();
        for (prefix, uri) in &current_ns {
            if prefix == "xml" {
                continue;
            }
            if inherited_ns.get(prefix) != Some(uri) {
                ns_decls.push(NsDecl {
                    prefix: prefix.clone(),
                    uri: uri.clone(),
                });
            }
        }
        ns_decls.sort();

        let mut attrs: Vec<Attr> = Vec::new();
        for attr in &element.attributes {
            attrs.push(render_attr(self.doc, id, attr));
        }

        // Per C14N 1.0 (and libxml2): when the element is in the node set
        // but its immediate parent is not, xml:* attributes of ancestors
        // are inherited onto this element unless overridden locally.
        if self.node_set.is_some() {
            let parent_not_visible = self
                .doc
                .parent(id)
                .map_or(true, |p| !self.doc.is_element(p) || !self.is_visible(p));
            if parent_not_visible {
                let extra = self.collect_inherited_xml_attrs(id, &attrs);
                attrs.extend(extra);
            }
        }
        attrs.sort();

        let elem_name = element.qualified_name();
        output.push(b'<');
        output.extend_from_slice(elem_name.as_bytes());
        for decl in &ns_decls {
            output.extend_from_slice(decl.render().as_bytes());
        }
        for attr in &attrs {
            output.extend_from_slice(attr.render().as_bytes());
        }
        output.push(b'>');

        let mut child_ns = inherited_ns.clone();
        for (prefix, uri) in &current_ns {
            if prefix != "xml" {
                child_ns.insert(prefix.clone(), uri.clone());
            }
        }
        for child in self.doc.children(id) {
            self.process_node(*child, output, &child_ns)?;
        }

        output.extend_from_slice(b"</");
        output.extend_from_slice(elem_name.as_bytes());
        output.push(b'>');
        Ok(())
    }

    /// Collect xml:* attributes from all ancestors, nearest value winning,
    /// excluding names already present on the element itself.
    fn collect_inherited_xml_attrs(&self, id: NodeId, existing_attrs: &[Attr]) -> Vec<Attr> {
        let mut inherited_xml: BTreeMap<String, String> = BTreeMap::new();
        let mut current = self.doc.parent(id);
        while let Some(ancestor) = current {
            if let Some(el) = self.doc.element(ancestor) {
                for attr in &el.attributes {
                    if attr.prefix.as_deref() == Some("xml")
                        && !inherited_xml.contains_key(&attr.local)
                    {
                        inherited_xml.insert(attr.local.clone(), attr.value.clone());
                    }
                }
            }
            current = self.doc.parent(ancestor);
        }

        let mut result = Vec::new();
        for (name, value) in &inherited_xml {
            let already_present = existing_attrs
                .iter()
                .any(|a| a.ns_uri == ns::XML && a.local_name == *name);
            if !already_present {
                result.push(Attr {
                    ns_uri: ns::XML.to_owned(),
                    local_name: name.clone(),
                    qualified_name: format!("xml:{name}"),
                    value: value.clone(),
                });
            }
        }
        result
    }
}

/// Build a renderable attribute with its resolved namespace URI.
pub(crate) fn render_attr(
    doc: &Document,
    element: NodeId,
    attr: &sigtuna_xml::Attribute,
) -> Attr {
    let ns_uri = match attr.prefix.as_deref() {
        Some("xml") => ns::XML.to_owned(),
        Some(p) => doc
            .lookup_prefix(element, Some(p))
            .unwrap_or("")
            .to_owned(),
        // Unprefixed attributes are in no namespace.
        None => String::new(),
    };
    Attr {
        ns_uri,
        local_name: attr.local.clone(),
        qualified_name: attr.qualified_name(),
        value: attr.value.clone(),
    }
}

/// Collect all in-scope namespaces for an element.
///
/// Walks up the ancestor chain; closer declarations override more distant
/// ones, and empty-URI declarations undeclare.
pub(crate) fn collect_inscope_namespaces(doc: &Document, id: NodeId) -> BTreeMap<String, String> {
    let mut ns_stack: Vec<BTreeMap<String, String>> = Vec::new();
    let mut current = Some(id);
    while let Some(n) = current {
        if let Some(el) = doc.element(n) {
            let mut level = BTreeMap::new();
            for decl in &el.ns_decls {
                level.insert(
                    decl.prefix.clone().unwrap_or_default(),
                    decl.uri.clone(),
                );
            }
            ns_stack.push(level);
        }
        current = doc.parent(n);
    }

    let mut result = BTreeMap::new();
    for level in ns_stack.into_iter().rev() {
        for (prefix, uri) in level {
            if uri.is_empty() {
                result.remove(&prefix);
            } else {
                result.insert(prefix, uri);
            }
        }
    }
    result
}

pub(crate) fn has_preceding_element(doc: &Document, id: NodeId) -> bool {
    let Some(parent) = doc.parent(id) else { return false };
    doc.children(parent)
        .iter()
        .take_while(|sib| **sib != id)
        .any(|sib| doc.is_element(*sib))
}

pub(crate) fn has_following_element(doc: &Document, id: NodeId) -> bool {
    let Some(parent) = doc.parent(id) else { return false };
    doc.children(parent)
        .iter()
        .skip_while(|sib| **sib != id)
        .skip(1)
        .any(|sib| doc.is_element(*sib))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c14n(xml: &str, with_comments: bool) -> String {
        let doc = Document::parse(xml).unwrap();
        String::from_utf8(canonicalize(&doc, with_comments, None).unwrap()).unwrap()
    }

    #[test]
    fn test_simple_c14n() {
        // Attributes sorted by local name (no namespace); empty elements
        // expand to start/end pairs.
        assert_eq!(
            c14n(r#"<root><a b="1" a="2"/></root>"#, false),
            r#"<root><a a="2" b="1"></a></root>"#
        );
    }

    #[test]
    fn test_namespace_rendering() {
        let output = c14n(
            r#"<root xmlns:b="http://b" xmlns:a="http://a"><a:child/></root>"#,
            false,
        );
        assert_eq!(
            output,
            r#"<root xmlns:a="http://a" xmlns:b="http://b"><a:child></a:child></root>"#
        );
    }

    #[test]
    fn test_inherited_namespace_not_redeclared() {
        let output = c14n(
            r#"<a xmlns:p="urn:p"><b xmlns:p="urn:p"><p:c/></b></a>"#,
            false,
        );
        assert_eq!(output, r#"<a xmlns:p="urn:p"><b><p:c></p:c></b></a>"#);
    }

    #[test]
    fn test_text_escaping() {
        assert_eq!(
            c14n(r#"<root>a &amp; b &lt; c</root>"#, false),
            "<root>a &amp; b &lt; c</root>"
        );
    }

    #[test]
    fn test_comments_stripped_and_kept() {
        let xml = "<root><!--note--><a/></root>";
        assert_eq!(c14n(xml, false), "<root><a></a></root>");
        assert_eq!(c14n(xml, true), "<root><!--note--><a></a></root>");
    }

    #[test]
    fn test_doc_level_comment_newlines() {
        let xml = "<?pi data?><root/><!--after-->";
        assert_eq!(c14n(xml, true), "<?pi data?>\n<root></root>\n<!--after-->");
    }

    #[test]
    fn test_subset_skips_invisible_subtree() {
        let doc = Document::parse("<a><b>hide</b><c>keep</c></a>").unwrap();
        let a = doc.root_element().unwrap();
        let b = doc.children(a)[0];
        let mut set = NodeSet::all(&doc);
        set.remove_subtree(&doc, b);
        let out = canonicalize(&doc, false, Some(&set)).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "<a><c>keep</c></a>");
    }

    #[test]
    fn test_subset_inherits_xml_attrs() {
        let doc =
            Document::parse(r#"<a xml:lang="en"><b><c/></b></a>"#).unwrap();
        let a = doc.root_element().unwrap();
        let b = doc.children(a)[0];
        let set = NodeSet::tree_without_comments(&doc, b);
        let out = canonicalize(&doc, false, Some(&set)).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"<b xml:lang="en"><c></c></b>"#
        );
    }
}
