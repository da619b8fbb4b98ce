use std::io;

use thiserror::Error;

use crate::xmlrpc::encoding::SerializeError;
use crate::xmlrpc::parser::ParseError;
use crate::xmlrpc::protocol::Fault;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(ParseError),
    #[error(transparent)]
    Serialize(#[from] SerializeError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("invalid server URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("HTTP transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("server answered with HTTP status {status} {reason}")]
    Status { status: u16, reason: String },
    #[error(transparent)]
    Fault(#[from] Fault),
}

impl From<ParseError> for Error {
    /// A read failure while parsing stays a transport-level error.
    fn from(err: ParseError) -> Error {
        match err {
            ParseError::Io(e) => Error::Io(e),
            other => Error::Parse(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
