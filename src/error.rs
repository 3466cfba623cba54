//! Error types shared by the handlers and the configuration layer.

use thiserror::Error;

use crate::compression::CodecError;

/// Failure while producing a response. Always request-local.
#[derive(Error, Debug)]
pub enum ServeError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejected configuration, reported at startup.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("document root is empty")]
    EmptyDocumentRoot,

    #[error("URL prefix must start with '/': {0}")]
    InvalidPrefix(String),

    #[error("invalid MIME mapping '{0}', expected EXT=TYPE")]
    InvalidMimeMapping(String),

    #[error("invalid header '{0}', expected 'Name: value'")]
    InvalidHeader(String),

    #[error("default document must be a plain file name: {0}")]
    InvalidDefaultDocument(String),

    #[error("compression level {0} out of range 0-9")]
    InvalidLevel(u32),
}
