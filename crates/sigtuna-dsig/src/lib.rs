#![forbid(unsafe_code)]

//! XML Digital Signature (XML-DSig) creation and verification.
//!
//! The object model mirrors the standard: a [`SignedXml`] owns a
//! [`SignedInfo`], which owns an ordered list of [`Reference`]s.  Signing
//! assembles the `Signature` element in its final document context before
//! any digest is computed; verification re-canonicalizes the loaded
//! `SignedInfo` exactly as found.

pub mod context;
pub mod reference;
pub mod signed_info;
pub mod signed_xml;

pub use context::DsigContext;
pub use reference::{Reference, TransformDescriptor};
pub use signed_info::SignedInfo;
pub use signed_xml::{ObjectContent, ObjectElement, SignedXml};
