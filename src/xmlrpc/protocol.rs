// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

use std::collections::BTreeMap;
use std::io::Read;
use std::mem;

use thiserror::Error;

use crate::config::StreamConfig;
use crate::xmlrpc::events::{Event, Location};
use crate::xmlrpc::namespace::QName;
use crate::xmlrpc::parser::{ensure_blank, parse_document, DocumentHandler, ParseError, RecursiveParser};
use crate::xmlrpc::registry::TypeRegistry;
use crate::xmlrpc::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: String,
    pub params: Vec<Value>,
}

impl Request {
    pub fn new(method: &str) -> Request {
        Request {
            method: method.to_string(),
            params: Vec::new(),
        }
    }

    pub fn with_params(method: &str, params: Vec<Value>) -> Request {
        Request {
            method: method.to_string(),
            params: params,
        }
    }

    pub fn arg<T: Into<Value>>(mut self, param: T) -> Request {
        self.params.push(param.into());
        self
    }
}

/// An error reported by the server in place of a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fault {code}: {message}")]
pub struct Fault {
    pub code: i32,
    pub message: String,
}

impl Fault {
    pub fn new(code: i32, message: &str) -> Fault {
        Fault {
            code: code,
            message: message.to_string(),
        }
    }

    /// The `faultCode`/`faultString` struct carried inside `<fault>`.
    pub fn to_value(&self) -> Value {
        let mut members = BTreeMap::new();
        members.insert("faultCode".to_string(), Value::Int(self.code));
        members.insert("faultString".to_string(), Value::String(self.message.clone()));
        Value::Struct(members)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Success(Value),
    Fault(Fault),
}

impl Response {
    pub fn into_result(self) -> Result<Value, Fault> {
        match self {
            Response::Success(value) => Ok(value),
            Response::Fault(fault) => Err(fault),
        }
    }
}

/// Decides between a result and a fault.
///
/// A struct holding an integer `faultCode` and a string `faultString` is a
/// fault wherever it appears. Inside `<fault>` the payload must have that
/// shape, except that `faultString` may be missing.
pub fn map_result(value: Value, under_fault: bool, location: Location) -> Result<Response, ParseError> {
    let mut members = match value {
        Value::Struct(members) => members,
        other if under_fault => {
            return Err(ParseError::structure(format!("Expected a fault struct, got {}", other.kind()),
                                             location));
        }
        other => return Ok(Response::Success(other)),
    };

    let code = match members.get("faultCode") {
        Some(&Value::Int(code)) => Some(code),
        _ => None,
    };
    let message = match members.get("faultString") {
        Some(&Value::String(_)) => true,
        None => under_fault,
        Some(_) => false,
    };

    match code {
        Some(code) if message => {
            let message = match members.remove("faultString") {
                Some(Value::String(message)) => message,
                _ => String::new(),
            };
            Ok(Response::Fault(Fault {
                code: code,
                message: message,
            }))
        }
        _ if under_fault => {
            Err(ParseError::structure("The fault must be a struct with an integer faultCode and a string faultString",
                                      location))
        }
        _ => Ok(Response::Success(Value::Struct(members))),
    }
}

fn expect_element(name: &QName, expected: &str, location: Location) -> Result<(), ParseError> {
    if name.is_core(expected) {
        Ok(())
    } else {
        Err(ParseError::structure(format!("Expected {} element, got {}", expected, name), location))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Params,
    Fault,
}

/// `<methodResponse>` containing either `<params>` with one `<param>`, or
/// `<fault>`.
struct ResponseDocument<'r> {
    level: usize,
    inner: RecursiveParser<'r>,
    section: Option<Section>,
    result: Option<Value>,
    done: bool,
}

impl<'r> ResponseDocument<'r> {
    fn value_level(&self) -> usize {
        match self.section {
            Some(Section::Fault) => 2,
            _ => 3,
        }
    }
}

impl<'r> DocumentHandler for ResponseDocument<'r> {
    type Output = Response;

    fn handle(&mut self, event: &Event, location: Location) -> Result<(), ParseError> {
        match *event {
            Event::Start { ref name, .. } => {
                if self.inner.in_value() {
                    self.inner.handle(event, location)?;
                    self.level += 1;
                    return Ok(());
                }
                match (self.level, self.section) {
                    (0, _) => {
                        if self.done {
                            return Err(ParseError::structure("Unexpected second root element", location));
                        }
                        expect_element(name, "methodResponse", location)?;
                    }
                    (1, None) => {
                        if name.is_core("params") {
                            self.section = Some(Section::Params);
                        } else if name.is_core("fault") {
                            self.section = Some(Section::Fault);
                        } else {
                            return Err(ParseError::structure(format!("Expected params or fault element, got {}",
                                                                     name),
                                                             location));
                        }
                    }
                    (1, Some(_)) => {
                        return Err(ParseError::structure(format!("Unexpected element {} after the response body",
                                                                 name),
                                                         location));
                    }
                    (2, Some(Section::Params)) => {
                        expect_element(name, "param", location)?;
                        if self.result.is_some() {
                            return Err(ParseError::structure("The response contains more than one param",
                                                             location));
                        }
                    }
                    (level, _) if level == self.value_level() => {
                        expect_element(name, "value", location)?;
                        if self.result.is_some() {
                            return Err(ParseError::structure("Expected a single value element", location));
                        }
                        self.inner.start_value_tag();
                    }
                    _ => {
                        return Err(ParseError::structure(format!("Unexpected element {}", name), location));
                    }
                }
                self.level += 1;
            }
            Event::End { .. } => {
                self.level -= 1;
                if self.level == self.value_level() && self.inner.in_value() {
                    self.result = Some(self.inner.end_value_tag(location)?);
                } else if self.inner.in_value() {
                    self.inner.handle(event, location)?;
                } else if self.level == 0 {
                    self.done = true;
                }
            }
            Event::Text(ref s) => {
                if self.inner.in_value() {
                    self.inner.handle(event, location)?;
                } else {
                    ensure_blank(s, location)?;
                }
            }
        }
        Ok(())
    }

    fn finish(self, location: Location) -> Result<Response, ParseError> {
        if !self.done {
            return Err(ParseError::structure("The document contains no methodResponse element", location));
        }
        match (self.section, self.result) {
            (Some(Section::Params), Some(value)) => map_result(value, false, location),
            (Some(Section::Fault), Some(value)) => map_result(value, true, location),
            (Some(Section::Params), None) => Err(ParseError::structure("The response contains no result", location)),
            (Some(Section::Fault), None) => Err(ParseError::structure("The fault contains no value", location)),
            (None, _) => {
                Err(ParseError::structure("The response contains neither params nor fault", location))
            }
        }
    }
}

/// Parses a `methodResponse` document as it is read from `source`.
pub fn parse_response<R: Read>(source: R, registry: &TypeRegistry, config: StreamConfig) -> Result<Response, ParseError> {
    let handler = ResponseDocument {
        level: 0,
        inner: RecursiveParser::new(registry, config),
        section: None,
        result: None,
        done: false,
    };
    parse_document(source, handler)
}

/// `<methodCall>` with a `<methodName>` and optional `<params>`.
struct RequestDocument<'r> {
    level: usize,
    inner: RecursiveParser<'r>,
    method: Option<String>,
    in_method: bool,
    method_text: String,
    seen_params: bool,
    params: Vec<Value>,
    param_has_value: bool,
    done: bool,
}

impl<'r> DocumentHandler for RequestDocument<'r> {
    type Output = Request;

    fn handle(&mut self, event: &Event, location: Location) -> Result<(), ParseError> {
        match *event {
            Event::Start { ref name, .. } => {
                if self.inner.in_value() {
                    self.inner.handle(event, location)?;
                    self.level += 1;
                    return Ok(());
                }
                match self.level {
                    0 => {
                        if self.done {
                            return Err(ParseError::structure("Unexpected second root element", location));
                        }
                        expect_element(name, "methodCall", location)?;
                    }
                    1 if name.is_core("methodName") => {
                        if self.method.is_some() {
                            return Err(ParseError::structure("The call contains more than one methodName",
                                                             location));
                        }
                        self.in_method = true;
                    }
                    1 if name.is_core("params") => {
                        if self.seen_params {
                            return Err(ParseError::structure("The call contains more than one params element",
                                                             location));
                        }
                        self.seen_params = true;
                    }
                    1 => {
                        return Err(ParseError::structure(format!("Expected methodName or params element, got {}",
                                                                 name),
                                                         location));
                    }
                    2 if self.in_method => {
                        return Err(ParseError::structure("The methodName element must not contain child elements",
                                                         location));
                    }
                    2 => {
                        expect_element(name, "param", location)?;
                        self.param_has_value = false;
                    }
                    3 => {
                        expect_element(name, "value", location)?;
                        if self.param_has_value {
                            return Err(ParseError::structure("The param contains more than one value", location));
                        }
                        self.inner.start_value_tag();
                    }
                    _ => {
                        return Err(ParseError::structure(format!("Unexpected element {}", name), location));
                    }
                }
                self.level += 1;
            }
            Event::End { .. } => {
                self.level -= 1;
                match self.level {
                    3 if self.inner.in_value() => {
                        let param = self.inner.end_value_tag(location)?;
                        self.params.push(param);
                        self.param_has_value = true;
                    }
                    _ if self.inner.in_value() => self.inner.handle(event, location)?,
                    2 if !self.param_has_value => {
                        return Err(ParseError::structure("The param contains no value", location));
                    }
                    1 if self.in_method => {
                        self.in_method = false;
                        self.method = Some(mem::take(&mut self.method_text));
                    }
                    0 => self.done = true,
                    _ => {}
                }
            }
            Event::Text(ref s) => {
                if self.inner.in_value() {
                    self.inner.handle(event, location)?;
                } else if self.in_method {
                    self.method_text.push_str(s);
                } else {
                    ensure_blank(s, location)?;
                }
            }
        }
        Ok(())
    }

    fn finish(self, location: Location) -> Result<Request, ParseError> {
        if !self.done {
            return Err(ParseError::structure("The document contains no methodCall element", location));
        }
        let method = self.method
            .ok_or_else(|| ParseError::structure("The call contains no methodName", location))?;
        Ok(Request {
            method: method.trim().to_string(),
            params: self.params,
        })
    }
}

/// Parses a `methodCall` document as it is read from `source`.
pub fn parse_request<R: Read>(source: R, registry: &TypeRegistry, config: StreamConfig) -> Result<Request, ParseError> {
    let handler = RequestDocument {
        level: 0,
        inner: RecursiveParser::new(registry, config),
        method: None,
        in_method: false,
        method_text: String::new(),
        seen_params: false,
        params: Vec::new(),
        param_has_value: false,
        done: false,
    };
    parse_document(source, handler)
}
