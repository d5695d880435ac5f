#![forbid(unsafe_code)]

/// Errors produced by the Sigtuna XML-DSig library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("invalid XML structure: {0}")]
    XmlStructure(String),

    #[error("SignedInfo has no signature method")]
    MissingSignatureMethod,

    #[error("SignedInfo has no references")]
    EmptyReferenceList,

    #[error("malformed SignedInfo: {0}")]
    MalformedSignedInfo(String),

    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("digest mismatch for reference: {0}")]
    DigestMismatch(String),

    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("missing required argument: {0}")]
    MissingArgument(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("cryptographic provider error: {0}")]
    CryptoProvider(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("canonicalization error: {0}")]
    Canonicalization(String),

    #[error("transform error: {0}")]
    Transform(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("missing required attribute: {0}")]
    MissingAttribute(String),

    #[error("invalid URI reference: {0}")]
    InvalidUri(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
