#![forbid(unsafe_code)]

//! Cryptographic algorithm implementations for the Sigtuna XML-DSig library.
//!
//! Provides digest and signature algorithms behind URI-keyed traits, plus
//! the extensible [`AlgorithmRegistry`] that resolves `Algorithm` attribute
//! values to implementations.

pub mod digest;
pub mod registry;
pub mod sign;

pub use digest::DigestAlgorithm;
pub use registry::AlgorithmRegistry;
pub use sign::{constant_time_eq, SignatureAlgorithm, SignatureParams, SigningKey};
