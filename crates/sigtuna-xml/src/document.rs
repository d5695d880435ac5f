#![forbid(unsafe_code)]

//! Arena-based XML document with prefix preservation.

use quick_xml::events::Event;
use quick_xml::Reader;
use sigtuna_core::{ns, Error, Result};
use std::collections::HashMap;

/// Index of a node in the document arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A namespace declaration as written in the source (`xmlns` or `xmlns:p`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsDecl {
    /// `None` for the default namespace declaration.
    pub prefix: Option<String>,
    pub uri: String,
}

/// A regular (non-namespace) attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub prefix: Option<String>,
    pub local: String,
    pub value: String,
}

impl Attribute {
    /// The attribute name as written, `prefix:local` or `local`.
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{}", self.local),
            None => self.local.clone(),
        }
    }
}

/// An element with its name, namespace declarations and attributes in
/// document order.
#[derive(Debug, Clone)]
pub struct Element {
    pub prefix: Option<String>,
    pub local: String,
    pub ns_decls: Vec<NsDecl>,
    pub attributes: Vec<Attribute>,
}

impl Element {
    /// The element name as written, `prefix:local` or `local`.
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{}", self.local),
            None => self.local.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    /// The document node; parent of the root element and any top-level
    /// comments or processing instructions.
    Root,
    Element(Element),
    Text(String),
    Comment(String),
    Pi { target: String, data: Option<String> },
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An owned XML document.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    /// Create an empty document containing only the document node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Parse XML text into an owned document.
    pub fn parse(text: &str) -> Result<Self> {
        let mut doc = Self::new();
        let mut reader = Reader::from_str(text);
        let mut stack: Vec<NodeId> = vec![doc.root()];

        loop {
            let event = reader
                .read_event()
                .map_err(|e| Error::XmlParse(e.to_string()))?;
            let parent = *stack.last().ok_or_else(|| {
                Error::XmlParse("unbalanced element nesting".to_owned())
            })?;
            match event {
                Event::Start(start) => {
                    let id = doc.push_parsed_element(parent, &start)?;
                    stack.push(id);
                }
                Event::Empty(start) => {
                    doc.push_parsed_element(parent, &start)?;
                }
                Event::End(_) => {
                    if stack.len() <= 1 {
                        return Err(Error::XmlParse("unexpected end tag".to_owned()));
                    }
                    stack.pop();
                }
                Event::Text(text) => {
                    let value = text
                        .unescape()
                        .map_err(|e| Error::XmlParse(e.to_string()))?;
                    // Whitespace between the prolog and the root element
                    // carries no information.
                    if parent == doc.root() && value.trim().is_empty() {
                        continue;
                    }
                    doc.push_text(parent, &value);
                }
                Event::CData(cdata) => {
                    let value = String::from_utf8(cdata.into_inner().into_owned())
                        .map_err(|e| Error::XmlParse(e.to_string()))?;
                    doc.push_text(parent, &value);
                }
                Event::Comment(comment) => {
                    let value = String::from_utf8(comment.into_inner().into_owned())
                        .map_err(|e| Error::XmlParse(e.to_string()))?;
                    doc.push_node(parent, NodeKind::Comment(value));
                }
                Event::PI(pi) => {
                    let raw = String::from_utf8(pi.into_inner().into_owned())
                        .map_err(|e| Error::XmlParse(e.to_string()))?;
                    let (target, data) = match raw.split_once(char::is_whitespace) {
                        Some((t, d)) => (t.to_owned(), Some(d.trim_start().to_owned())),
                        None => (raw, None),
                    };
                    doc.push_node(parent, NodeKind::Pi { target, data });
                }
                Event::Decl(_) | Event::DocType(_) => {}
                Event::Eof => break,
            }
        }
        if stack.len() != 1 {
            return Err(Error::XmlParse("unclosed element".to_owned()));
        }
        if doc.root_element().is_none() {
            return Err(Error::XmlParse("document has no root element".to_owned()));
        }
        Ok(doc)
    }

    /// Parse XML from bytes.
    pub fn parse_bytes(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::XmlParse(format!("invalid UTF-8: {e}")))?;
        Self::parse(text)
    }

    fn push_parsed_element(
        &mut self,
        parent: NodeId,
        start: &quick_xml::events::BytesStart<'_>,
    ) -> Result<NodeId> {
        let (prefix, local) = split_qname(start.name().as_ref())?;
        let mut element = Element {
            prefix,
            local,
            ns_decls: Vec::new(),
            attributes: Vec::new(),
        };
        for attr in start.attributes().with_checks(false) {
            let attr = attr.map_err(|e| Error::XmlParse(e.to_string()))?;
            let key = attr.key.as_ref();
            let value = attr
                .unescape_value()
                .map_err(|e| Error::XmlParse(e.to_string()))?
                .into_owned();
            if key == b"xmlns" {
                element.ns_decls.push(NsDecl { prefix: None, uri: value });
            } else if let Some(rest) = key.strip_prefix(b"xmlns:") {
                let prefix = std::str::from_utf8(rest)
                    .map_err(|e| Error::XmlParse(e.to_string()))?
                    .to_owned();
                element.ns_decls.push(NsDecl { prefix: Some(prefix), uri: value });
            } else {
                let (prefix, local) = split_qname(key)?;
                element.attributes.push(Attribute { prefix, local, value });
            }
        }
        Ok(self.push_node(parent, NodeKind::Element(element)))
    }

    // ── Tree construction ────────────────────────────────────────────

    fn push_node(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Append a new element under `parent`.
    pub fn push_element(
        &mut self,
        parent: NodeId,
        prefix: Option<&str>,
        local: &str,
    ) -> NodeId {
        self.push_node(
            parent,
            NodeKind::Element(Element {
                prefix: prefix.map(str::to_owned),
                local: local.to_owned(),
                ns_decls: Vec::new(),
                attributes: Vec::new(),
            }),
        )
    }

    /// Append a text node under `parent`.
    pub fn push_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push_node(parent, NodeKind::Text(text.to_owned()))
    }

    /// Add a namespace declaration to an element.
    pub fn push_ns_decl(&mut self, element: NodeId, prefix: Option<&str>, uri: &str) {
        if let NodeKind::Element(el) = &mut self.nodes[element.0].kind {
            el.ns_decls.push(NsDecl {
                prefix: prefix.map(str::to_owned),
                uri: uri.to_owned(),
            });
        }
    }

    /// Add an attribute to an element.
    pub fn push_attr(&mut self, element: NodeId, prefix: Option<&str>, local: &str, value: &str) {
        if let NodeKind::Element(el) = &mut self.nodes[element.0].kind {
            el.attributes.push(Attribute {
                prefix: prefix.map(str::to_owned),
                local: local.to_owned(),
                value: value.to_owned(),
            });
        }
    }

    /// Replace an element's children with a single text node.
    ///
    /// Used to fill in computed `DigestValue` and `SignatureValue` content.
    pub fn set_text_content(&mut self, element: NodeId, text: &str) {
        self.nodes[element.0].children.clear();
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind: NodeKind::Text(text.to_owned()),
            parent: Some(element),
            children: Vec::new(),
        });
        self.nodes[element.0].children.push(id);
    }

    /// Copy an element subtree from another document under `parent`.
    ///
    /// The copied nodes keep their prefixes, namespace declarations, and
    /// attributes exactly as written in the source document.
    pub fn import_subtree(&mut self, parent: NodeId, src: &Document, src_node: NodeId) -> NodeId {
        let id = self.push_node(parent, src.kind(src_node).clone());
        for &child in src.children(src_node) {
            self.import_subtree(id, src, child);
        }
        id
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// The document node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The root element of the document, if any.
    pub fn root_element(&self) -> Option<NodeId> {
        self.nodes[0]
            .children
            .iter()
            .copied()
            .find(|id| self.is_element(*id))
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].kind, NodeKind::Element(_))
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    /// All nodes of the subtree rooted at `id`, pre-order, including `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            for child in self.nodes[n.0].children.iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// Concatenated text content of the subtree rooted at `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for n in self.descendants(id) {
            if let NodeKind::Text(t) = &self.nodes[n.0].kind {
                out.push_str(t);
            }
        }
        out
    }

    /// Look up an attribute value on an element by local name, ignoring
    /// the namespace prefix.
    pub fn attribute(&self, id: NodeId, local: &str) -> Option<&str> {
        self.element(id)?
            .attributes
            .iter()
            .find(|a| a.local == local)
            .map(|a| a.value.as_str())
    }

    // ── Namespace resolution ─────────────────────────────────────────

    /// Resolve a namespace prefix in the scope of `id` by walking toward
    /// the document node.  `None` resolves the default namespace.
    pub fn lookup_prefix(&self, id: NodeId, prefix: Option<&str>) -> Option<&str> {
        if prefix == Some("xml") {
            return Some(ns::XML);
        }
        let mut current = Some(id);
        while let Some(n) = current {
            if let NodeKind::Element(el) = &self.nodes[n.0].kind {
                if let Some(decl) = el
                    .ns_decls
                    .iter()
                    .find(|d| d.prefix.as_deref() == prefix)
                {
                    if decl.uri.is_empty() {
                        return None;
                    }
                    return Some(&decl.uri);
                }
            }
            current = self.nodes[n.0].parent;
        }
        None
    }

    /// Namespace URI of an element, or `None` if unbound.
    pub fn element_ns(&self, id: NodeId) -> Option<&str> {
        let el = self.element(id)?;
        self.lookup_prefix(id, el.prefix.as_deref())
    }

    /// Check an element against an expected namespace and local name.
    pub fn is_named(&self, id: NodeId, ns_uri: &str, local: &str) -> bool {
        match self.element(id) {
            Some(el) => el.local == local && self.element_ns(id) == Some(ns_uri),
            None => false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Find the first element in the subtree of `from` with the given
    /// namespace and local name.
    pub fn find_element(&self, from: NodeId, ns_uri: &str, local: &str) -> Option<NodeId> {
        self.descendants(from)
            .into_iter()
            .find(|id| self.is_named(*id, ns_uri, local))
    }

    /// Find all elements in the subtree of `from` with the given namespace
    /// and local name, in document order.
    pub fn find_elements(&self, from: NodeId, ns_uri: &str, local: &str) -> Vec<NodeId> {
        self.descendants(from)
            .into_iter()
            .filter(|id| self.is_named(*id, ns_uri, local))
            .collect()
    }

    /// Find the first direct child element with the given name.
    pub fn find_child_element(&self, parent: NodeId, ns_uri: &str, local: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|id| self.is_named(*id, ns_uri, local))
    }

    /// Find all direct child elements with the given name, in document order.
    pub fn find_child_elements(&self, parent: NodeId, ns_uri: &str, local: &str) -> Vec<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .filter(|id| self.is_named(*id, ns_uri, local))
            .collect()
    }

    /// Build the ID value → element mapping.
    ///
    /// Registers the conventional `Id`, `ID` and `id` attributes plus any
    /// extra names (matched against local or qualified attribute names).
    pub fn build_id_map(&self, extra_id_attrs: &[String]) -> HashMap<String, NodeId> {
        let default_attrs = ["Id", "ID", "id"];
        let mut map = HashMap::new();
        for id in self.descendants(self.root()) {
            let Some(el) = self.element(id) else { continue };
            for attr in &el.attributes {
                let matches = default_attrs.contains(&attr.local.as_str())
                    || extra_id_attrs
                        .iter()
                        .any(|n| *n == attr.local || *n == attr.qualified_name());
                if matches {
                    map.insert(attr.value.clone(), id);
                }
            }
        }
        map
    }

    // ── Serialization ────────────────────────────────────────────────

    /// Serialize the whole document, prefixes and declarations as stored.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        for child in self.children(self.root()) {
            self.write_node(*child, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Root => {}
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(&el.qualified_name());
                for decl in &el.ns_decls {
                    match &decl.prefix {
                        Some(p) => out.push_str(&format!(" xmlns:{p}=\"")),
                        None => out.push_str(" xmlns=\""),
                    }
                    escape_attr_into(&decl.uri, out);
                    out.push('"');
                }
                for attr in &el.attributes {
                    out.push(' ');
                    out.push_str(&attr.qualified_name());
                    out.push_str("=\"");
                    escape_attr_into(&attr.value, out);
                    out.push('"');
                }
                let children = &self.nodes[id.0].children;
                if children.is_empty() {
                    out.push_str("/>");
                } else {
                    out.push('>');
                    for child in children {
                        self.write_node(*child, out);
                    }
                    out.push_str("</");
                    out.push_str(&el.qualified_name());
                    out.push('>');
                }
            }
            NodeKind::Text(t) => escape_text_into(t, out),
            NodeKind::Comment(t) => {
                out.push_str("<!--");
                out.push_str(t);
                out.push_str("-->");
            }
            NodeKind::Pi { target, data } => {
                out.push_str("<?");
                out.push_str(target);
                if let Some(d) = data {
                    out.push(' ');
                    out.push_str(d);
                }
                out.push_str("?>");
            }
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

fn split_qname(name: &[u8]) -> Result<(Option<String>, String)> {
    let name = std::str::from_utf8(name)
        .map_err(|e| Error::XmlParse(e.to_string()))?;
    match name.split_once(':') {
        Some((prefix, local)) => Ok((Some(prefix.to_owned()), local.to_owned())),
        None => Ok((None, name.to_owned())),
    }
}

fn escape_text_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr_into(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_preserves_prefixes() {
        let doc = Document::parse(
            r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:SignedInfo/></ds:Signature>"#,
        )
        .unwrap();
        let root = doc.root_element().unwrap();
        let el = doc.element(root).unwrap();
        assert_eq!(el.prefix.as_deref(), Some("ds"));
        assert_eq!(el.local, "Signature");
        assert_eq!(doc.element_ns(root), Some(ns::DSIG));
        let si = doc
            .find_child_element(root, ns::DSIG, "SignedInfo")
            .unwrap();
        assert_eq!(doc.element(si).unwrap().local, "SignedInfo");
    }

    #[test]
    fn namespace_scoping_walks_ancestors() {
        let doc = Document::parse(
            r#"<a xmlns="urn:one"><b><c xmlns="urn:two"/></b></a>"#,
        )
        .unwrap();
        let a = doc.root_element().unwrap();
        let b = doc.children(a)[0];
        let c = doc.children(b)[0];
        assert_eq!(doc.element_ns(b), Some("urn:one"));
        assert_eq!(doc.element_ns(c), Some("urn:two"));
    }

    #[test]
    fn default_namespace_undeclaration() {
        let doc = Document::parse(r#"<a xmlns="urn:one"><b xmlns=""/></a>"#).unwrap();
        let a = doc.root_element().unwrap();
        let b = doc.children(a)[0];
        assert_eq!(doc.element_ns(b), None);
    }

    #[test]
    fn id_map_covers_default_and_extra_attrs() {
        let doc = Document::parse(
            r#"<r xmlns:wsu="urn:wsu"><a Id="one"/><b wsu:Id="two"/></r>"#,
        )
        .unwrap();
        let map = doc.build_id_map(&["wsu:Id".to_owned()]);
        assert!(map.contains_key("one"));
        assert!(map.contains_key("two"));
        let map = doc.build_id_map(&[]);
        assert!(!map.contains_key("two"));
    }

    #[test]
    fn text_content_concatenates() {
        let doc = Document::parse("<a>he<b>ll</b>o</a>").unwrap();
        let a = doc.root_element().unwrap();
        assert_eq!(doc.text_content(a), "hello");
    }

    #[test]
    fn serializer_round_trips_escapes() {
        let doc = Document::parse(r#"<a t="x&amp;y">a &lt; b</a>"#).unwrap();
        let out = doc.to_xml_string();
        assert_eq!(out, r#"<a t="x&amp;y">a &lt; b</a>"#);
    }

    #[test]
    fn set_text_content_replaces_children() {
        let mut doc = Document::parse("<a><v>old</v></a>").unwrap();
        let a = doc.root_element().unwrap();
        let v = doc.children(a)[0];
        doc.set_text_content(v, "new");
        assert_eq!(doc.text_content(v), "new");
    }

    #[test]
    fn builder_produces_serializable_tree() {
        let mut doc = Document::new();
        let root = doc.push_element(doc.root(), Some("ds"), "Signature");
        doc.push_ns_decl(root, Some("ds"), ns::DSIG);
        let si = doc.push_element(root, Some("ds"), "SignedInfo");
        doc.push_attr(si, None, "Id", "si-1");
        assert_eq!(
            doc.to_xml_string(),
            r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:SignedInfo Id="si-1"/></ds:Signature>"#
        );
    }
}
