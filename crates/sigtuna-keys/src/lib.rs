#![forbid(unsafe_code)]

//! Key material handling for the Sigtuna XML-DSig library.
//!
//! Loads keys from PEM, DER, and raw binary formats and reads/writes
//! `<ds:KeyInfo>` structures (KeyName, KeyValue, X509Data).

pub mod key;
pub mod keyinfo;
pub mod loader;
pub mod x509data;

pub use key::{Key, KeyData, KeyUsage};
pub use keyinfo::{KeyInfo, KeyInfoClause, KeyValue};
pub use x509data::X509Data;
