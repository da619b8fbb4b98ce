// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

//! Streaming reconstruction of values from [`Event`]s.
//!
//! A [`RecursiveParser`] owns everything between one `<value>` start tag and
//! its end tag. Until a type tag shows up it collects character data; the
//! first type tag is resolved through the [`TypeRegistry`] and from then on
//! every event is handed to the parser built for that type. Arrays and
//! structs embed their own `RecursiveParser` for their members, which is
//! where the recursion of the grammar comes from: nesting depth is bounded
//! only by the stack.

use std::collections::BTreeMap;
use std::io::{self, Read};
use std::mem;

use thiserror::Error;
use xml::common::Position;

use crate::config::StreamConfig;
use crate::xmlrpc::events::{Event, EventSource, Location};
use crate::xmlrpc::namespace::QName;
use crate::xmlrpc::registry::{ResolveError, TypeKind, TypeRegistry};
use crate::xmlrpc::scalar;
use crate::xmlrpc::value::{Node, Value};

/// The errors that can arise while parsing an XML-RPC stream. All of them
/// abort the parse.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{location}: {message}")]
    Structure { message: String, location: Location },
    #[error("{location}: unknown type: {name}")]
    UnknownType { name: QName, location: Location },
    #[error("{location}: the tag {name} is invalid if extensions are disabled")]
    ExtensionDisallowed { name: QName, location: Location },
    #[error("{location}: failed to parse {kind} value {text:?}: {reason}")]
    Conversion {
        kind: TypeKind,
        text: String,
        reason: String,
        location: Location,
    },
    #[error("malformed XML: {0}")]
    Xml(#[from] xml::reader::Error),
    /// The input could not be read.
    #[error("failed to read XML-RPC data: {0}")]
    Io(#[from] io::Error),
}

impl ParseError {
    pub fn structure<S: Into<String>>(message: S, location: Location) -> ParseError {
        ParseError::Structure {
            message: message.into(),
            location: location,
        }
    }

    pub fn location(&self) -> Option<Location> {
        match *self {
            ParseError::Structure { location, .. }
            | ParseError::UnknownType { location, .. }
            | ParseError::ExtensionDisallowed { location, .. }
            | ParseError::Conversion { location, .. } => Some(location),
            ParseError::Xml(ref e) => Some(Location::from(e.position())),
            ParseError::Io(_) => None,
        }
    }
}

fn is_blank(text: &str) -> bool {
    text.chars().all(char::is_whitespace)
}

pub(crate) fn ensure_blank(text: &str, location: Location) -> Result<(), ParseError> {
    if is_blank(text) {
        Ok(())
    } else {
        Err(ParseError::structure(format!("Unexpected non-whitespace content: {:?}", text.trim()),
                                  location))
    }
}

fn second_type(name: &QName, location: Location) -> ParseError {
    ParseError::structure(format!("The value already has a type, got a second type element {}", name),
                          location)
}

fn unexpected_end(location: Location) -> ParseError {
    ParseError::structure("Unexpected end of element", location)
}

enum State<'r> {
    Idle,
    AwaitingType(String),
    Delegated(Box<TypeParser<'r>>),
}

/// State machine for the content of a single `<value>` element.
///
/// The owner of the value tag reports its start and end through
/// `start_value_tag` and `end_value_tag` and forwards every event in
/// between to `handle`.
///
/// Every nested composite adds a few stack frames to each event it
/// forwards. Documents nested several hundred levels deep need a thread
/// with a larger stack than the default.
pub struct RecursiveParser<'r> {
    registry: &'r TypeRegistry,
    config: StreamConfig,
    state: State<'r>,
}

impl<'r> RecursiveParser<'r> {
    pub fn new(registry: &'r TypeRegistry, config: StreamConfig) -> RecursiveParser<'r> {
        RecursiveParser {
            registry: registry,
            config: config,
            state: State::Idle,
        }
    }

    pub fn in_value(&self) -> bool {
        match self.state {
            State::Idle => false,
            _ => true,
        }
    }

    pub fn start_value_tag(&mut self) {
        self.state = State::AwaitingType(String::new());
    }

    /// Finishes the current value. A value tag that never saw a type tag is
    /// an implicit string made of its text.
    pub fn end_value_tag(&mut self, location: Location) -> Result<Value, ParseError> {
        match mem::replace(&mut self.state, State::Idle) {
            State::Idle => Err(ParseError::structure("Invalid state: not inside value tag", location)),
            State::AwaitingType(text) => Ok(Value::String(text)),
            State::Delegated(parser) => parser.finish(location),
        }
    }

    pub fn handle(&mut self, event: &Event, location: Location) -> Result<(), ParseError> {
        let delegate = match self.state {
            State::Idle => {
                return match *event {
                    Event::Text(ref s) => ensure_blank(s, location),
                    Event::Start { ref name, .. } => {
                        Err(ParseError::structure(format!("Invalid state: not inside value tag, got {}", name),
                                                  location))
                    }
                    Event::End { .. } => {
                        Err(ParseError::structure("Invalid state: not inside value tag", location))
                    }
                };
            }
            State::Delegated(ref mut parser) => return parser.handle(event, location),
            State::AwaitingType(ref mut text) => {
                match *event {
                    Event::Text(ref s) => {
                        text.push_str(s);
                        return Ok(());
                    }
                    Event::End { .. } => {
                        return Err(ParseError::structure("Invalid state: no type parser configured",
                                                         location));
                    }
                    Event::Start { ref name, .. } => {
                        let kind = self.registry
                            .resolve(name, self.config.enabled_for_extensions)
                            .map_err(|e| match e {
                                ResolveError::Unknown => {
                                    ParseError::UnknownType { name: name.clone(), location: location }
                                }
                                ResolveError::ExtensionDisallowed => {
                                    ParseError::ExtensionDisallowed { name: name.clone(), location: location }
                                }
                            })?;
                        trace!("{}: value type {}", location, kind);
                        let mut parser = TypeParser::for_kind(kind, self.registry, self.config);
                        let pending = mem::take(text);
                        if !pending.is_empty() {
                            parser.handle(&Event::Text(pending), location)?;
                        }
                        parser.handle(event, location)?;
                        parser
                    }
                }
            }
        };
        self.state = State::Delegated(Box::new(delegate));
        Ok(())
    }
}

/// Parser owning the events of one type element, its own start tag included.
enum TypeParser<'r> {
    Atomic(AtomicParser),
    Nil(NilParser),
    Array(ArrayParser<'r>),
    Struct(StructParser<'r>),
    Dom(DomParser),
}

impl<'r> TypeParser<'r> {
    fn for_kind(kind: TypeKind, registry: &'r TypeRegistry, config: StreamConfig) -> TypeParser<'r> {
        match kind {
            TypeKind::Nil => TypeParser::Nil(NilParser::default()),
            TypeKind::Array => TypeParser::Array(ArrayParser::new(registry, config)),
            TypeKind::Struct => TypeParser::Struct(StructParser::new(registry, config)),
            TypeKind::Dom => TypeParser::Dom(DomParser::default()),
            atomic => TypeParser::Atomic(AtomicParser::new(atomic)),
        }
    }

    fn handle(&mut self, event: &Event, location: Location) -> Result<(), ParseError> {
        match *self {
            TypeParser::Atomic(ref mut p) => p.handle(event, location),
            TypeParser::Nil(ref mut p) => p.handle(event, location),
            TypeParser::Array(ref mut p) => p.handle(event, location),
            TypeParser::Struct(ref mut p) => p.handle(event, location),
            TypeParser::Dom(ref mut p) => p.handle(event, location),
        }
    }

    fn finish(self, location: Location) -> Result<Value, ParseError> {
        match self {
            TypeParser::Atomic(p) => p.finish(location),
            TypeParser::Nil(p) => p.finish(location),
            TypeParser::Array(p) => p.finish(location),
            TypeParser::Struct(p) => p.finish(location),
            TypeParser::Dom(p) => p.finish(location),
        }
    }
}

struct AtomicParser {
    kind: TypeKind,
    level: usize,
    text: String,
    result: Option<Value>,
}

impl AtomicParser {
    fn new(kind: TypeKind) -> AtomicParser {
        AtomicParser {
            kind: kind,
            level: 0,
            text: String::new(),
            result: None,
        }
    }

    fn handle(&mut self, event: &Event, location: Location) -> Result<(), ParseError> {
        match *event {
            Event::Start { ref name, .. } => {
                if self.result.is_some() {
                    return Err(second_type(name, location));
                }
                if self.level > 0 {
                    return Err(ParseError::structure(format!("The element {} must not contain child elements, got {}",
                                                             self.kind,
                                                             name),
                                                     location));
                }
                self.level = 1;
                Ok(())
            }
            Event::End { .. } => {
                if self.level == 0 {
                    return Err(unexpected_end(location));
                }
                self.level = 0;
                let kind = self.kind;
                let text = mem::take(&mut self.text);
                match scalar::parse_scalar(kind, &text) {
                    Ok(value) => {
                        self.result = Some(value);
                        Ok(())
                    }
                    Err(reason) => {
                        Err(ParseError::Conversion {
                            kind: kind,
                            text: text,
                            reason: reason,
                            location: location,
                        })
                    }
                }
            }
            Event::Text(ref s) if self.level > 0 => {
                self.text.push_str(s);
                Ok(())
            }
            Event::Text(ref s) => ensure_blank(s, location),
        }
    }

    fn finish(self, location: Location) -> Result<Value, ParseError> {
        let kind = self.kind;
        self.result
            .ok_or_else(|| ParseError::structure(format!("Unterminated {} element", kind), location))
    }
}

#[derive(Default)]
struct NilParser {
    level: usize,
    done: bool,
}

impl NilParser {
    fn handle(&mut self, event: &Event, location: Location) -> Result<(), ParseError> {
        match *event {
            Event::Start { ref name, .. } => {
                if self.done {
                    return Err(second_type(name, location));
                }
                if self.level > 0 {
                    return Err(ParseError::structure(format!("The nil element must be empty, got {}", name),
                                                     location));
                }
                self.level = 1;
            }
            Event::End { .. } => {
                if self.level == 0 {
                    return Err(unexpected_end(location));
                }
                self.level = 0;
                self.done = true;
            }
            Event::Text(ref s) => ensure_blank(s, location)?,
        }
        Ok(())
    }

    fn finish(self, location: Location) -> Result<Value, ParseError> {
        if self.done {
            Ok(Value::Nil)
        } else {
            Err(ParseError::structure("Unterminated nil element", location))
        }
    }
}

/// `<array><data><value/>*</data></array>`
struct ArrayParser<'r> {
    level: usize,
    inner: RecursiveParser<'r>,
    items: Vec<Value>,
    seen_data: bool,
    done: bool,
}

impl<'r> ArrayParser<'r> {
    fn new(registry: &'r TypeRegistry, config: StreamConfig) -> ArrayParser<'r> {
        ArrayParser {
            level: 0,
            inner: RecursiveParser::new(registry, config),
            items: Vec::new(),
            seen_data: false,
            done: false,
        }
    }

    fn handle(&mut self, event: &Event, location: Location) -> Result<(), ParseError> {
        match *event {
            Event::Start { ref name, .. } => {
                match self.level {
                    0 if self.done => return Err(second_type(name, location)),
                    0 => {}
                    1 => {
                        if !name.is_core("data") {
                            return Err(ParseError::structure(format!("Expected data element, got {}", name),
                                                             location));
                        }
                        if self.seen_data {
                            return Err(ParseError::structure("The array contains more than one data element",
                                                             location));
                        }
                        self.seen_data = true;
                    }
                    2 => {
                        if !name.is_core("value") {
                            return Err(ParseError::structure(format!("Expected value element, got {}", name),
                                                             location));
                        }
                        self.inner.start_value_tag();
                    }
                    _ => self.inner.handle(event, location)?,
                }
                self.level += 1;
            }
            Event::End { .. } => {
                if self.level == 0 {
                    return Err(unexpected_end(location));
                }
                self.level -= 1;
                match self.level {
                    0 => {
                        if !self.seen_data {
                            return Err(ParseError::structure("Expected data element, got end of array",
                                                             location));
                        }
                        self.done = true;
                    }
                    1 => {}
                    2 => {
                        let item = self.inner.end_value_tag(location)?;
                        self.items.push(item);
                    }
                    _ => self.inner.handle(event, location)?,
                }
            }
            Event::Text(ref s) => {
                if self.level >= 3 {
                    self.inner.handle(event, location)?;
                } else {
                    ensure_blank(s, location)?;
                }
            }
        }
        Ok(())
    }

    fn finish(self, location: Location) -> Result<Value, ParseError> {
        if self.done {
            Ok(Value::Array(self.items))
        } else {
            Err(ParseError::structure("Unterminated array element", location))
        }
    }
}

/// `<struct><member><name/><value/></member>*</struct>`; name and value may
/// come in either order.
struct StructParser<'r> {
    level: usize,
    inner: RecursiveParser<'r>,
    members: BTreeMap<String, Value>,
    in_name: bool,
    name_text: String,
    name: Option<String>,
    value: Option<Value>,
    done: bool,
}

impl<'r> StructParser<'r> {
    fn new(registry: &'r TypeRegistry, config: StreamConfig) -> StructParser<'r> {
        StructParser {
            level: 0,
            inner: RecursiveParser::new(registry, config),
            members: BTreeMap::new(),
            in_name: false,
            name_text: String::new(),
            name: None,
            value: None,
            done: false,
        }
    }

    fn handle(&mut self, event: &Event, location: Location) -> Result<(), ParseError> {
        match *event {
            Event::Start { ref name, .. } => {
                match self.level {
                    0 if self.done => return Err(second_type(name, location)),
                    0 => {}
                    1 => {
                        if !name.is_core("member") {
                            return Err(ParseError::structure(format!("Expected member element, got {}", name),
                                                             location));
                        }
                    }
                    2 => {
                        if name.is_core("name") {
                            if self.name.is_some() {
                                return Err(ParseError::structure("The member contains more than one name element",
                                                                 location));
                            }
                            self.in_name = true;
                        } else if name.is_core("value") {
                            if self.value.is_some() {
                                return Err(ParseError::structure("The member contains more than one value element",
                                                                 location));
                            }
                            self.inner.start_value_tag();
                        } else {
                            return Err(ParseError::structure(format!("Expected name or value element, got {}",
                                                                     name),
                                                             location));
                        }
                    }
                    _ if self.in_name => {
                        return Err(ParseError::structure(format!("The name element must not contain child elements, got {}",
                                                                 name),
                                                         location));
                    }
                    _ => self.inner.handle(event, location)?,
                }
                self.level += 1;
            }
            Event::End { .. } => {
                if self.level == 0 {
                    return Err(unexpected_end(location));
                }
                self.level -= 1;
                match self.level {
                    0 => self.done = true,
                    1 => self.end_member(location)?,
                    2 if self.in_name => {
                        self.in_name = false;
                        self.name = Some(mem::take(&mut self.name_text));
                    }
                    2 => self.value = Some(self.inner.end_value_tag(location)?),
                    _ => self.inner.handle(event, location)?,
                }
            }
            Event::Text(ref s) => {
                if self.level >= 3 && self.in_name {
                    self.name_text.push_str(s);
                } else if self.level >= 3 {
                    self.inner.handle(event, location)?;
                } else {
                    ensure_blank(s, location)?;
                }
            }
        }
        Ok(())
    }

    fn end_member(&mut self, location: Location) -> Result<(), ParseError> {
        let name = self.name
            .take()
            .ok_or_else(|| ParseError::structure("The member has no name element", location))?;
        let value = self.value
            .take()
            .ok_or_else(|| ParseError::structure(format!("The member {} has no value element", name), location))?;
        if self.members.contains_key(&name) {
            return Err(ParseError::structure(format!("Duplicate member name: {}", name), location));
        }
        self.members.insert(name, value);
        Ok(())
    }

    fn finish(self, location: Location) -> Result<Value, ParseError> {
        if self.done {
            Ok(Value::Struct(self.members))
        } else {
            Err(ParseError::structure("Unterminated struct element", location))
        }
    }
}

struct OpenElement {
    name: QName,
    attributes: Vec<(QName, String)>,
    namespaces: Vec<(String, String)>,
    children: Vec<Node>,
}

/// Captures the single element inside `<ex:dom>` as a [`Node`] tree.
#[derive(Default)]
struct DomParser {
    level: usize,
    stack: Vec<OpenElement>,
    root: Option<Node>,
    done: bool,
}

impl DomParser {
    fn handle(&mut self, event: &Event, location: Location) -> Result<(), ParseError> {
        match *event {
            Event::Start { ref name, ref attributes, ref declared } => {
                if self.level == 0 && self.done {
                    return Err(second_type(name, location));
                }
                if self.level == 1 && self.root.is_some() {
                    return Err(ParseError::structure("The dom element must contain a single element",
                                                     location));
                }
                if self.level > 0 {
                    self.stack.push(OpenElement {
                        name: name.clone(),
                        attributes: attributes.clone(),
                        namespaces: declared.clone(),
                        children: Vec::new(),
                    });
                }
                self.level += 1;
            }
            Event::End { .. } => {
                if self.level == 0 {
                    return Err(unexpected_end(location));
                }
                self.level -= 1;
                if self.level == 0 {
                    if self.root.is_none() {
                        return Err(ParseError::structure("The dom element contains no element", location));
                    }
                    self.done = true;
                } else {
                    let open = self.stack.pop().ok_or_else(|| unexpected_end(location))?;
                    let node = Node::Element {
                        name: open.name,
                        attributes: open.attributes,
                        namespaces: open.namespaces,
                        children: open.children,
                    };
                    match self.stack.last_mut() {
                        Some(parent) => parent.children.push(node),
                        None => self.root = Some(node),
                    }
                }
            }
            Event::Text(ref s) => {
                match self.stack.last_mut() {
                    Some(open) => open.children.push(Node::Text(s.clone())),
                    None => ensure_blank(s, location)?,
                }
            }
        }
        Ok(())
    }

    fn finish(self, location: Location) -> Result<Value, ParseError> {
        match self.root {
            Some(node) if self.done => Ok(Value::Dom(node)),
            _ => Err(ParseError::structure("Unterminated dom element", location)),
        }
    }
}

/// Root-level consumer of a whole document's events.
pub(crate) trait DocumentHandler {
    type Output;

    fn handle(&mut self, event: &Event, location: Location) -> Result<(), ParseError>;

    /// Called once the document has ended.
    fn finish(self, location: Location) -> Result<Self::Output, ParseError>;
}

pub(crate) fn parse_document<R, H>(source: R, mut handler: H) -> Result<H::Output, ParseError>
    where R: Read,
          H: DocumentHandler
{
    let mut events = EventSource::new(source);
    while let Some((event, location)) = events.next_event()? {
        trace!("{}: {:?}", location, event);
        handler.handle(&event, location)?;
    }
    let location = events.location();
    handler.finish(location)
}

/// A document whose root element is a single `<value>`.
struct ValueDocument<'r> {
    level: usize,
    inner: RecursiveParser<'r>,
    result: Option<Value>,
}

impl<'r> DocumentHandler for ValueDocument<'r> {
    type Output = Value;

    fn handle(&mut self, event: &Event, location: Location) -> Result<(), ParseError> {
        match *event {
            Event::Start { ref name, .. } => {
                if self.level == 0 {
                    if !name.is_core("value") {
                        return Err(ParseError::structure(format!("Expected value element, got {}", name),
                                                         location));
                    }
                    self.inner.start_value_tag();
                } else {
                    self.inner.handle(event, location)?;
                }
                self.level += 1;
            }
            Event::End { .. } => {
                self.level -= 1;
                if self.level == 0 {
                    self.result = Some(self.inner.end_value_tag(location)?);
                } else {
                    self.inner.handle(event, location)?;
                }
            }
            Event::Text(ref s) => {
                if self.level > 0 {
                    self.inner.handle(event, location)?;
                } else {
                    ensure_blank(s, location)?;
                }
            }
        }
        Ok(())
    }

    fn finish(self, location: Location) -> Result<Value, ParseError> {
        self.result
            .ok_or_else(|| ParseError::structure("The document contains no value element", location))
    }
}

/// Parses a document consisting of one `<value>` element.
pub fn parse_value<R: Read>(source: R, registry: &TypeRegistry, config: StreamConfig) -> Result<Value, ParseError> {
    let handler = ValueDocument {
        level: 0,
        inner: RecursiveParser::new(registry, config),
        result: None,
    };
    parse_document(source, handler)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{parse_value, ParseError, RecursiveParser};
    use crate::config::StreamConfig;
    use crate::xmlrpc::events::{Event, Location};
    use crate::xmlrpc::namespace::QName;
    use crate::xmlrpc::registry::{TypeKind, TypeRegistry, EXTENSIONS_URI};
    use crate::xmlrpc::value::{Node, Value};

    const CORE: StreamConfig = StreamConfig {
        enabled_for_extensions: false,
        content_length_optional: false,
    };

    const EXTENDED: StreamConfig = StreamConfig {
        enabled_for_extensions: true,
        content_length_optional: false,
    };

    fn parse(xml: &str) -> Result<Value, ParseError> {
        parse_value(xml.as_bytes(), TypeRegistry::standard(), CORE)
    }

    fn parse_ext(xml: &str) -> Result<Value, ParseError> {
        parse_value(xml.as_bytes(), TypeRegistry::standard(), EXTENDED)
    }

    fn ext(body: &str) -> String {
        format!("<value xmlns:ex=\"{}\">{}</value>", EXTENSIONS_URI, body)
    }

    fn structure_message(result: Result<Value, ParseError>) -> String {
        match result {
            Err(ParseError::Structure { message, .. }) => message,
            other => panic!("expected a structural error, got {:?}", other),
        }
    }

    #[test]
    fn test_implicit_string() {
        assert_eq!(Value::from("hello world"), parse("<value>hello world</value>").unwrap());
        assert_eq!(Value::from("  spaced\n"), parse("<value>  spaced\n</value>").unwrap());
        assert_eq!(Value::from(""), parse("<value></value>").unwrap());
        assert_eq!(Value::from(""), parse("<value/>").unwrap());
        assert_eq!(Value::from("a&b<c"), parse("<value>a&amp;b&lt;c</value>").unwrap());
    }

    #[test]
    fn test_typed_scalars() {
        assert_eq!(Value::Int(42), parse("<value><i4>42</i4></value>").unwrap());
        assert_eq!(Value::Int(-3), parse("<value>\n  <int>-3</int>\n</value>").unwrap());
        assert_eq!(Value::Boolean(true), parse("<value><boolean>1</boolean></value>").unwrap());
        assert_eq!(Value::Double(4.2), parse("<value><double>4.2</double></value>").unwrap());
        assert_eq!(Value::from(" keep "), parse("<value><string> keep </string></value>").unwrap());
        assert_eq!(Value::from(""), parse("<value><string/></value>").unwrap());
        assert_eq!(Value::Base64(b"hi".to_vec()), parse("<value><base64>aGk=</base64></value>").unwrap());
        match parse("<value><dateTime.iso8601>19980717T14:08:55</dateTime.iso8601></value>").unwrap() {
            Value::DateTime(dt) => assert_eq!(1998, dt.year()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_nested_composites() {
        let xml = "<value><struct>
              <member><name>list</name><value><array><data>
                  <value><i4>1</i4></value>
                  <value>two</value>
                  <value><array><data>
                      <value><struct><member><name>deep</name><value><boolean>0</boolean></value></member></struct></value>
                  </data></array></value>
              </data></array></value></member>
              <member><name>empty</name><value><array><data/></array></value></member>
            </struct></value>";

        let mut deep = BTreeMap::new();
        deep.insert("deep".to_string(), Value::Boolean(false));
        let inner = Value::Array(vec![Value::Struct(deep)]);
        let mut expected = BTreeMap::new();
        expected.insert("list".to_string(), Value::Array(vec![Value::Int(1), Value::from("two"), inner]));
        expected.insert("empty".to_string(), Value::Array(vec![]));

        assert_eq!(Value::Struct(expected), parse(xml).unwrap());
    }

    #[test]
    fn test_deeply_nested_arrays() {
        let depth = 64;
        let xml = format!("{}<value>x</value>{}",
                          "<value><array><data>".repeat(depth),
                          "</data></array></value>".repeat(depth));
        let mut value = parse(&xml).unwrap();
        for _ in 0..depth {
            value = match value {
                Value::Array(mut items) => {
                    assert_eq!(1, items.len());
                    items.remove(0)
                }
                other => panic!("expected an array, got {:?}", other),
            };
        }
        assert_eq!(Value::from("x"), value);
    }

    #[test]
    fn test_struct_member_order_is_irrelevant() {
        let a = parse("<value><struct>\
                         <member><name>x</name><value><i4>1</i4></value></member>\
                         <member><name>y</name><value>b</value></member>\
                       </struct></value>")
            .unwrap();
        let b = parse("<value><struct>\
                         <member><name>y</name><value>b</value></member>\
                         <member><value><i4>1</i4></value><name>x</name></member>\
                       </struct></value>")
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_extension_disallowed_is_not_unknown() {
        match parse(&ext("<ex:i8>5</ex:i8>")) {
            Err(ParseError::ExtensionDisallowed { name, .. }) => {
                assert_eq!(QName::new(Some(EXTENSIONS_URI), "i8"), name)
            }
            other => panic!("unexpected {:?}", other),
        }
        match parse("<value><float32>5</float32></value>") {
            Err(ParseError::UnknownType { name, .. }) => assert_eq!(QName::local("float32"), name),
            other => panic!("unexpected {:?}", other),
        }
        match parse_ext(&ext("<ex:serializable>AA==</ex:serializable>")) {
            Err(ParseError::UnknownType { .. }) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_extension_types() {
        assert_eq!(Value::Long(9_000_000_000), parse_ext(&ext("<ex:i8>9000000000</ex:i8>")).unwrap());
        assert_eq!(Value::Nil, parse_ext(&ext("<ex:nil/>")).unwrap());
        assert_eq!(Value::Short(-2), parse_ext(&ext("<ex:i2>-2</ex:i2>")).unwrap());
        assert_eq!(Value::Byte(7), parse_ext(&ext("<ex:i1>7</ex:i1>")).unwrap());
        assert_eq!(Value::Float(1.5), parse_ext(&ext("<ex:float>1.5</ex:float>")).unwrap());
        assert_eq!(Value::BigInteger("123456789012345678901234567890".parse().unwrap()),
                   parse_ext(&ext("<ex:biginteger>123456789012345678901234567890</ex:biginteger>")).unwrap());
        // a prefix bound further up also works
        let xml = format!("<value xmlns:x=\"{}\"><array><data><value><x:i8>1</x:i8></value></data></array></value>",
                          EXTENSIONS_URI);
        assert_eq!(Value::Array(vec![Value::Long(1)]), parse_ext(&xml).unwrap());
    }

    #[test]
    fn test_dom_payload() {
        let value = parse_ext(&ext("<ex:dom> <doc xmlns=\"urn:doc\" id=\"7\"><p>hi <b>there</b></p></doc> </ex:dom>"))
            .unwrap();
        let node = match value {
            Value::Dom(node) => node,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(Some(&QName::new(Some("urn:doc"), "doc")), node.name());
        assert_eq!("hi there", node.text());
        match node {
            Node::Element { ref attributes, ref namespaces, .. } => {
                assert_eq!(vec![(QName::local("id"), "7".to_string())], *attributes);
                assert_eq!(vec![("".to_string(), "urn:doc".to_string())], *namespaces);
            }
            Node::Text(_) => unreachable!(),
        }
        structure_message(parse_ext(&ext("<ex:dom><a/><b/></ex:dom>")));
        structure_message(parse_ext(&ext("<ex:dom>text only</ex:dom>")));
    }

    #[test]
    fn test_conversion_error_carries_text_and_location() {
        match parse("<value>\n\n  <i4>abc</i4></value>") {
            Err(ParseError::Conversion { kind, text, location, .. }) => {
                assert_eq!(TypeKind::Int, kind);
                assert_eq!("abc", text);
                assert_eq!(3, location.row);
            }
            other => panic!("unexpected {:?}", other),
        }
        match parse("<value><boolean>yes</boolean></value>") {
            Err(ParseError::Conversion { kind: TypeKind::Boolean, .. }) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_structural_errors() {
        structure_message(parse("<value><i4>1</i4><i4>2</i4></value>"));
        structure_message(parse("<value><i4>1<b/></i4></value>"));
        structure_message(parse("<value>text<i4>1</i4></value>"));
        structure_message(parse("<value><i4>1</i4> trailing</value>"));
        structure_message(parse("<value><array><value>1</value></array></value>"));
        structure_message(parse("<value><array></array></value>"));
        structure_message(parse("<value><array><data/><data/></array></value>"));
        structure_message(parse("<value><struct><value>1</value></struct></value>"));
        structure_message(parse("<value><struct><member><value>1</value></member></struct></value>"));
        structure_message(parse("<value><struct><member><name>a</name></member></struct></value>"));
        structure_message(parse("<value><struct><member><name>a<b/></name><value/></member></struct></value>"));
        structure_message(parse("<params/>"));

        let message = structure_message(parse("<value><struct>\
                                                  <member><name>a</name><value>1</value></member>\
                                                  <member><name>a</name><value>2</value></member>\
                                                </struct></value>"));
        assert!(message.contains("Duplicate"), "{}", message);
    }

    #[test]
    fn test_driving_events_by_hand() {
        let registry = TypeRegistry::standard();
        let mut parser = RecursiveParser::new(registry, CORE);
        let here = Location::default();

        assert!(parser.end_value_tag(here).is_err());
        assert!(parser.handle(&Event::start(QName::local("i4")), here).is_err());

        parser.start_value_tag();
        assert!(parser.in_value());
        parser.handle(&Event::Text(" ".to_string()), here).unwrap();
        parser.handle(&Event::start(QName::local("i4")), here).unwrap();
        parser.handle(&Event::Text("12".to_string()), here).unwrap();
        parser.handle(&Event::End { name: QName::local("i4") }, here).unwrap();
        assert_eq!(Value::Int(12), parser.end_value_tag(here).unwrap());
        assert!(!parser.in_value());
    }
}
