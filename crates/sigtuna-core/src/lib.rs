#![forbid(unsafe_code)]

//! Core definitions shared by every Sigtuna crate: the error type,
//! algorithm URI constants and XML name constants.

pub mod algorithm;
pub mod error;
pub mod ns;

pub use error::{Error, Result};
