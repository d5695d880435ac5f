#![forbid(unsafe_code)]

//! Exclusive Canonical XML 1.0 (exc-C14N).
//!
//! Algorithm URI: `http://www.w3.org/2001/10/xml-exc-c14n#`
//! With comments: `http://www.w3.org/2001/10/xml-exc-c14n#WithComments`
//!
//! The key difference from inclusive C14N: only "visibly utilized" namespace
//! declarations are output.  A namespace is visibly utilized if:
//! 1. Its prefix is used by the element's tag name, OR
//! 2. Its prefix is used by one of the element's attributes, OR
//! 3. The prefix appears in the InclusiveNamespaces PrefixList
//!    (`#default` stands for the default namespace).

use crate::escape;
use crate::inclusive::{
    collect_inscope_namespaces, has_following_element, has_preceding_element, render_attr,
};
use crate::render::{Attr, NsDecl};
use sigtuna_core::Result;
use sigtuna_xml::{Document, NodeId, NodeKind, NodeSet};
use std::collections::{BTreeMap, HashSet};

/// Canonicalize using Exclusive C14N 1.0.
pub fn canonicalize(
    doc: &Document,
    with_comments: bool,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>> {
    let prefix_set: HashSet<String> = inclusive_prefixes.iter().cloned().collect();
    let mut output = Vec::new();
    let ctx = ExcC14nContext {
        doc,
        with_comments,
        node_set,
        inclusive_prefixes: prefix_set,
    };
    ctx.process_node(doc.root(), &mut output, &BTreeMap::new())?;
    Ok(output)
}

struct ExcC14nContext<'a> {
    doc: &'a Document,
    with_comments: bool,
    node_set: Option<&'a NodeSet>,
    inclusive_prefixes: HashSet<String>,
}

impl ExcC14nContext<'_> {
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
        rendered_ns: &BTreeMap<String, String>,
    ) -> Result<()> {
        match self.doc.kind(id) {
            NodeKind::Root => {
                for child in self.doc.children(id) {
                    self.process_node(*child, output, rendered_ns)?;
                }
            }
            NodeKind::Element(_) => {
                self.process_element(id, output, rendered_ns)?;
            }
            NodeKind::Text(text) => {
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
        rendered_ns: &BTreeMap<String, String>,
    ) -> Result<()> {
        if !self.is_visible(id) {
            // Exclusive C14N renders namespace declarations only on visible
            // element start tags.
            for child in self.doc.children(id) {
                self.process_node(*child, output, rendered_ns)?;
            }
            return Ok(());
        }

        let element = self.doc.element(id).expect("element node");

        // Determine which namespace prefixes are visibly utilized.
        let mut utilized_prefixes: HashSet<String> = HashSet::new();
        utilized_prefixes.insert(element.prefix.clone().unwrap_or_default());
        for attr in &element.attributes {
            match attr.prefix.as_deref() {
                // Unprefixed attributes never utilize the default namespace.
                None | Some("xml") => {}
                Some(p) => {
                    utilized_prefixes.insert(p.to_owned());
                }
            }
        }
        for p in &self.inclusive_prefixes {
            if p == "#default" {
                utilized_prefixes.insert(String::new());
            } else {
                utilized_prefixes.insert(p.clone());
            }
        }

        let inscope_ns = collect_inscope_namespaces(self.doc, id);

        let mut ns_decls: Vec<NsDecl> = Vec::new();
        for prefix in &utilized_prefixes {
            if prefix == "xml" {
                continue;
            }
            if let Some(uri) = inscope_ns.get(prefix) {
                if rendered_ns.get(prefix) != Some(uri) {
                    ns_decls.push(NsDecl {
                        prefix: prefix.clone(),
                        uri: uri.clone(),
                    });
                }
            } else if prefix.is_empty() {
                // Default namespace utilized but not in scope: undeclare it
                // if an ancestor rendered a non-empty default.
                if rendered_ns.get("").is_some_and(|uri| !uri.is_empty()) {
                    ns_decls.push(NsDecl {
                        prefix: String::new(),
                        uri: String::new(),
                    });
                }
            }
        }
        ns_decls.sort();

        let mut attrs: Vec<Attr> = Vec::new();
        for attr in &element.attributes {
            attrs.push(render_attr(self.doc, id, attr));
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

        let mut child_rendered_ns = rendered_ns.clone();
        for decl in &ns_decls {
            child_rendered_ns.insert(decl.prefix.clone(), decl.uri.clone());
        }
        for child in self.doc.children(id) {
            self.process_node(*child, output, &child_rendered_ns)?;
        }

        output.extend_from_slice(b"</");
        output.extend_from_slice(elem_name.as_bytes());
        output.push(b'>');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exc_c14n(xml: &str, prefixes: &[&str]) -> String {
        let doc = Document::parse(xml).unwrap();
        let prefixes: Vec<String> = prefixes.iter().map(|s| s.to_string()).collect();
        String::from_utf8(canonicalize(&doc, false, None, &prefixes).unwrap()).unwrap()
    }

    #[test]
    fn test_unused_namespace_dropped() {
        // xmlns:unused is in scope but not visibly utilized.
        let output = exc_c14n(
            r#"<p:a xmlns:p="urn:p" xmlns:unused="urn:u"><p:b/></p:a>"#,
            &[],
        );
        assert_eq!(output, r#"<p:a xmlns:p="urn:p"><p:b></p:b></p:a>"#);
    }

    #[test]
    fn test_prefix_list_forces_rendering() {
        let output = exc_c14n(
            r#"<p:a xmlns:p="urn:p" xmlns:extra="urn:e"><p:b/></p:a>"#,
            &["extra"],
        );
        assert_eq!(
            output,
            r#"<p:a xmlns:extra="urn:e" xmlns:p="urn:p"><p:b></p:b></p:a>"#
        );
    }

    #[test]
    fn test_namespace_rendered_where_first_utilized() {
        // q is declared on the root but only utilized on the inner element.
        let output = exc_c14n(
            r#"<p:a xmlns:p="urn:p" xmlns:q="urn:q"><q:b/></p:a>"#,
            &[],
        );
        assert_eq!(
            output,
            r#"<p:a xmlns:p="urn:p"><q:b xmlns:q="urn:q"></q:b></p:a>"#
        );
    }

    #[test]
    fn test_attribute_prefix_utilizes_namespace() {
        let output = exc_c14n(
            r#"<a xmlns:q="urn:q" q:attr="v"/>"#,
            &[],
        );
        assert_eq!(output, r#"<a xmlns:q="urn:q" q:attr="v"></a>"#);
    }

    #[test]
    fn test_default_namespace_utilized_by_unprefixed_element() {
        let output = exc_c14n(r#"<a xmlns="urn:d"><b/></a>"#, &[]);
        assert_eq!(output, r#"<a xmlns="urn:d"><b></b></a>"#);
    }

    #[test]
    fn test_subset_renders_subtree_standalone() {
        // Canonicalizing an embedded subtree must not drag in ancestor
        // declarations the subtree does not use.
        let doc = Document::parse(
            r#"<w:env xmlns:w="urn:wrap" xmlns:d="urn:d"><d:inner d:x="1"/></w:env>"#,
        )
        .unwrap();
        let env = doc.root_element().unwrap();
        let inner = doc.children(env)[0];
        let set = NodeSet::tree_without_comments(&doc, inner);
        let out = canonicalize(&doc, false, Some(&set), &[]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"<d:inner xmlns:d="urn:d" d:x="1"></d:inner>"#
        );
    }
}
