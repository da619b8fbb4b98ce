// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

#![forbid(non_camel_case_types)]
#![allow(missing_docs)]

//! XML-RPC library, including both serialization and remote procedure calling
//!
//! # What is XML-RPC?
//!
//! A remote procedure call protocol which uses XML to encode its calls and
//! HTTP as a transport mechanism.
//!
//! Basic documentation found on Wikipedia
//! http://en.wikipedia.org/wiki/XML-RPC
//!
//! Full specification of the XML-RPC protocol is found here:
//! http://xmlrpc.scripting.com/spec.html
//!
//! Additional errata and hints can be found here:
//! http://effbot.org/zone/xmlrpc-errata.htm
//!
//! # Extensions
//!
//! With extensions enabled, the types of the Apache namespace
//! `http://ws.apache.org/xmlrpc/namespaces/extensions` are read and
//! written as well: `nil`, `i1`, `i2`, `i8`, `float`, `biginteger` and
//! `dom`. With extensions disabled they are rejected in both directions.

pub mod client;
pub mod encoding;
pub mod events;
pub mod namespace;
pub mod parser;
pub mod protocol;
pub mod registry;
pub mod scalar;
pub mod value;

pub use self::client::{Client, Connection, Framing, HttpConnection};
pub use self::encoding::{encode_request, RequestStream, SerializeError, ValueWriter};
pub use self::parser::{parse_value, ParseError, RecursiveParser};
pub use self::protocol::{parse_request, parse_response, Fault, Request, Response};
pub use self::registry::{TypeKind, TypeRegistry};
pub use self::value::{Node, Value};
