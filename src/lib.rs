//! Streaming XML-RPC client.
//!
//! Values are parsed from XML events as the response body arrives, and
//! request bodies can be rendered while they are sent.

#[macro_use]
extern crate log;

pub mod config;
pub mod error;
pub mod xmlrpc;

pub use crate::config::{BasicEncoding, ClientConfig, StreamConfig};
pub use crate::error::{Error, Result};
