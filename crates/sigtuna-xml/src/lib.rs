#![forbid(unsafe_code)]

//! Owned XML document model for XML-DSig processing.
//!
//! Canonicalization must reproduce the original namespace prefixes and
//! attribute text byte for byte, so the tree keeps prefixes and namespace
//! declarations exactly as written instead of resolving them away.

pub mod document;
pub mod nodeset;

pub use document::{Attribute, Document, Element, NodeId, NodeKind, NsDecl};
pub use nodeset::NodeSet;
