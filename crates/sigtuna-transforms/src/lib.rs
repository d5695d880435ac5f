#![forbid(unsafe_code)]

//! Transform chain engine for the Sigtuna XML-DSig library.
//!
//! Each reference carries a sequence of transforms that are applied in
//! declared order; canonicalization is the most important of them.

pub mod base64_transform;
pub mod enveloped;
pub mod pipeline;
pub mod registry;
pub mod uri;

pub use pipeline::{C14nTransform, Transform, TransformChain, TransformData};
pub use registry::{TransformParams, TransformRegistry};
