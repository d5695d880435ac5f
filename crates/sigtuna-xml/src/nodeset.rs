#![forbid(unsafe_code)]

//! Node-set membership for document-subset canonicalization.

use crate::document::{Document, NodeId, NodeKind};
use std::collections::HashSet;

/// A set of document nodes, identified by arena index.
///
/// Canonicalization renders exactly the member nodes; transforms such as
/// enveloped-signature removal operate by shrinking the set rather than
/// mutating the tree.
#[derive(Debug, Clone, Default)]
pub struct NodeSet {
    nodes: HashSet<usize>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// All nodes of the document.
    pub fn all(doc: &Document) -> Self {
        let mut nodes = HashSet::new();
        for id in doc.descendants(doc.root()) {
            nodes.insert(id.index());
        }
        Self { nodes }
    }

    /// All nodes of the document except comments.
    ///
    /// Per the W3C DSig spec, `URI=""` selects the document without
    /// comments.
    pub fn all_without_comments(doc: &Document) -> Self {
        let mut nodes = HashSet::new();
        for id in doc.descendants(doc.root()) {
            if !matches!(doc.kind(id), NodeKind::Comment(_)) {
                nodes.insert(id.index());
            }
        }
        Self { nodes }
    }

    /// The subtree rooted at `root`, excluding comments.
    pub fn tree_without_comments(doc: &Document, root: NodeId) -> Self {
        let mut nodes = HashSet::new();
        for id in doc.descendants(root) {
            if !matches!(doc.kind(id), NodeKind::Comment(_)) {
                nodes.insert(id.index());
            }
        }
        Self { nodes }
    }

    /// The subtree rooted at `root`, comments included.
    pub fn tree_with_comments(doc: &Document, root: NodeId) -> Self {
        let mut nodes = HashSet::new();
        for id in doc.descendants(root) {
            nodes.insert(id.index());
        }
        Self { nodes }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id.index())
    }

    pub fn insert(&mut self, id: NodeId) {
        self.nodes.insert(id.index());
    }

    pub fn remove(&mut self, id: NodeId) {
        self.nodes.remove(&id.index());
    }

    /// Remove the whole subtree rooted at `root` from the set.
    pub fn remove_subtree(&mut self, doc: &Document, root: NodeId) {
        for id in doc.descendants(root) {
            self.nodes.remove(&id.index());
        }
    }

    pub fn intersection(&self, other: &NodeSet) -> NodeSet {
        NodeSet {
            nodes: self.nodes.intersection(&other.nodes).copied().collect(),
        }
    }

    pub fn union(&self, other: &NodeSet) -> NodeSet {
        NodeSet {
            nodes: self.nodes.union(&other.nodes).copied().collect(),
        }
    }

    pub fn subtract(&self, other: &NodeSet) -> NodeSet {
        NodeSet {
            nodes: self.nodes.difference(&other.nodes).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_without_comments_skips_comments() {
        let doc = Document::parse("<a><!--c--><b/></a>").unwrap();
        let all = NodeSet::all(&doc);
        let no_comments = NodeSet::all_without_comments(&doc);
        assert_eq!(all.len(), no_comments.len() + 1);
    }

    #[test]
    fn remove_subtree_excludes_descendants() {
        let doc = Document::parse("<a><b><c/></b><d/></a>").unwrap();
        let a = doc.root_element().unwrap();
        let b = doc.children(a)[0];
        let mut set = NodeSet::all(&doc);
        set.remove_subtree(&doc, b);
        assert!(!set.contains(b));
        assert!(!set.contains(doc.children(b)[0]));
        assert!(set.contains(doc.children(a)[1]));
    }
}
