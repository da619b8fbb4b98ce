// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

//! Pull-style token stream over `xml-rs`.
//!
//! The reader's events are reduced to the three the value grammar cares
//! about: element start, element end and character data. Whitespace and
//! CDATA sections arrive as plain text; comments, processing instructions
//! and the prolog are dropped.

use std::fmt;
use std::io::{self, Read};

use xml::common::{Position, TextPosition};
use xml::name::OwnedName;
use xml::reader::{self, EventReader, ParserConfig, XmlEvent};

use crate::xmlrpc::namespace::{NamespaceContext, QName};
use crate::xmlrpc::parser::ParseError;

/// One-based position in the input.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Location {
    pub row: u64,
    pub column: u64,
}

impl From<TextPosition> for Location {
    fn from(pos: TextPosition) -> Location {
        Location {
            row: pos.row + 1,
            column: pos.column + 1,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "line {}, column {}", self.row, self.column)
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum Event {
    Start {
        name: QName,
        attributes: Vec<(QName, String)>,
        /// Prefix bindings newly declared on this element.
        declared: Vec<(String, String)>,
    },
    End { name: QName },
    Text(String),
}

impl Event {
    /// Shorthand for a start tag without attributes or declarations.
    pub fn start(name: QName) -> Event {
        Event::Start {
            name: name,
            attributes: Vec::new(),
            declared: Vec::new(),
        }
    }
}

/// Failures of the underlying reader are not XML errors; they are passed on
/// as I/O errors with their original kind.
fn read_error(e: reader::Error) -> ParseError {
    match *e.kind() {
        reader::ErrorKind::Io(ref cause) => ParseError::Io(io::Error::new(cause.kind(), cause.to_string())),
        _ => ParseError::Xml(e),
    }
}

fn qname(name: OwnedName) -> QName {
    QName::new(name.namespace.as_deref(), &name.local_name)
}

pub struct EventSource<R: Read> {
    reader: EventReader<R>,
    context: NamespaceContext,
    finished: bool,
}

impl<R: Read> EventSource<R> {
    pub fn new(source: R) -> EventSource<R> {
        let reader = ParserConfig::new()
            .trim_whitespace(false)
            .whitespace_to_characters(true)
            .cdata_to_characters(true)
            .coalesce_characters(true)
            .ignore_comments(true)
            .create_reader(source);
        EventSource {
            reader: reader,
            context: NamespaceContext::new(),
            finished: false,
        }
    }

    /// Position of the most recently returned event.
    pub fn location(&self) -> Location {
        Location::from(self.reader.position())
    }

    /// Returns the next token, or None once the document has ended.
    pub fn next_event(&mut self) -> Result<Option<(Event, Location)>, ParseError> {
        while !self.finished {
            let event = match self.reader.next() {
                Ok(event) => event,
                Err(e) => {
                    self.finished = true;
                    return Err(read_error(e));
                }
            };
            let location = self.location();
            match event {
                XmlEvent::StartElement { name, attributes, namespace } => {
                    let declared = self.context
                        .declared_in(namespace.0.iter().map(|(p, u)| (p.as_str(), u.as_str())));
                    self.context.push_scope();
                    for &(ref prefix, ref uri) in &declared {
                        self.context.start_prefix_mapping(prefix, uri);
                    }
                    let attributes = attributes.into_iter()
                        .map(|attr| (qname(attr.name), attr.value))
                        .collect();
                    let event = Event::Start {
                        name: qname(name),
                        attributes: attributes,
                        declared: declared,
                    };
                    return Ok(Some((event, location)));
                }
                XmlEvent::EndElement { name } => {
                    self.context.pop_scope();
                    return Ok(Some((Event::End { name: qname(name) }, location)));
                }
                XmlEvent::Characters(s) | XmlEvent::Whitespace(s) | XmlEvent::CData(s) => {
                    return Ok(Some((Event::Text(s), location)));
                }
                XmlEvent::EndDocument => self.finished = true,
                _ => {}
            }
        }
        Ok(None)
    }
}

impl<R: Read> Iterator for EventSource<R> {
    type Item = Result<(Event, Location), ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}
