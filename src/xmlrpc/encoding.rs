// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

use std::io::{self, Read, Write};

use thiserror::Error;
use xml::escape::{escape_str_attribute, escape_str_pcdata};

use crate::config::StreamConfig;
use crate::xmlrpc::namespace::{NamespaceContext, QName};
use crate::xmlrpc::protocol::{Request, Response};
use crate::xmlrpc::registry::{Tag, TypeKind, TypeRegistry, EXTENSIONS_PREFIX, EXTENSIONS_URI};
use crate::xmlrpc::scalar;
use crate::xmlrpc::value::{Node, Value};

#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("cannot write a {kind} value while extensions are disabled")]
    ExtensionDisallowed { kind: TypeKind },
    #[error("failed to write XML-RPC data: {0}")]
    Io(#[from] io::Error),
}

pub type EncodeResult = Result<(), SerializeError>;

/// Walks `value` and fails if any part of it needs a disabled extension.
/// Nothing is written.
pub fn check_value(registry: &TypeRegistry, value: &Value, extensions_enabled: bool) -> EncodeResult {
    registry.serializer_for(value, extensions_enabled)?;
    match *value {
        Value::Array(ref items) => items.iter().try_for_each(|v| check_value(registry, v, extensions_enabled)),
        Value::Struct(ref members) => {
            members.values().try_for_each(|v| check_value(registry, v, extensions_enabled))
        }
        _ => Ok(()),
    }
}

/// Shortcut function to render a complete `methodCall` document.
pub fn encode_request(request: &Request, registry: &TypeRegistry, config: StreamConfig) -> Result<Vec<u8>, SerializeError> {
    let mut writer = ValueWriter::new(Vec::new(), registry, config);
    writer.write_request(request)?;
    Ok(writer.into_inner())
}

/// Shortcut function to render a single `<value>` element.
pub fn encode_value(value: &Value, registry: &TypeRegistry, config: StreamConfig) -> Result<String, SerializeError> {
    let mut writer = ValueWriter::new(Vec::new(), registry, config);
    writer.write_value(value)?;
    String::from_utf8(writer.into_inner())
        .map_err(|e| SerializeError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

/// A structure for implementing serialization to XML-RPC.
pub struct ValueWriter<'r, W: Write> {
    writer: W,
    registry: &'r TypeRegistry,
    config: StreamConfig,
    context: NamespaceContext,
    generated_prefixes: usize,
}

impl<'r, W: Write> ValueWriter<'r, W> {
    /// Creates a new XML-RPC writer whose output will be written to the writer
    /// specified.
    pub fn new(writer: W, registry: &'r TypeRegistry, config: StreamConfig) -> ValueWriter<'r, W> {
        ValueWriter {
            writer: writer,
            registry: registry,
            config: config,
            context: NamespaceContext::new(),
            generated_prefixes: 0,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn extensions_enabled(&self) -> bool {
        self.config.enabled_for_extensions
    }

    pub fn write_value(&mut self, value: &Value) -> EncodeResult {
        check_value(self.registry, value, self.extensions_enabled())?;
        self.emit_value(value)
    }

    pub fn write_request(&mut self, request: &Request) -> EncodeResult {
        for param in &request.params {
            check_value(self.registry, param, self.extensions_enabled())?;
        }
        self.write_request_start(&request.method)?;
        for param in &request.params {
            self.write_param(param)?;
        }
        self.write_request_end()
    }

    pub fn write_request_start(&mut self, method: &str) -> EncodeResult {
        self.writer.write_all(b"<?xml version=\"1.0\"?><methodCall")?;
        self.declare_extensions()?;
        write!(self.writer, "><methodName>{}</methodName><params>", escape_str_pcdata(method))?;
        Ok(())
    }

    pub fn write_param(&mut self, value: &Value) -> EncodeResult {
        check_value(self.registry, value, self.extensions_enabled())?;
        self.writer.write_all(b"<param>")?;
        self.emit_value(value)?;
        self.writer.write_all(b"</param>")?;
        Ok(())
    }

    pub fn write_request_end(&mut self) -> EncodeResult {
        self.writer.write_all(b"</params></methodCall>")?;
        self.release_extensions();
        self.writer.flush()?;
        Ok(())
    }

    /// Renders a `methodResponse`, either one result parameter or a fault.
    pub fn write_response(&mut self, response: &Response) -> EncodeResult {
        let value = match *response {
            Response::Success(ref value) => value.clone(),
            Response::Fault(ref fault) => fault.to_value(),
        };
        check_value(self.registry, &value, self.extensions_enabled())?;

        self.writer.write_all(b"<?xml version=\"1.0\"?><methodResponse")?;
        self.declare_extensions()?;
        match *response {
            Response::Success(_) => {
                self.writer.write_all(b"><params><param>")?;
                self.emit_value(&value)?;
                self.writer.write_all(b"</param></params></methodResponse>")?;
            }
            Response::Fault(_) => {
                self.writer.write_all(b"><fault>")?;
                self.emit_value(&value)?;
                self.writer.write_all(b"</fault></methodResponse>")?;
            }
        }
        self.release_extensions();
        self.writer.flush()?;
        Ok(())
    }

    /// Binds the extension prefix on the document element, so that values
    /// below it need no declaration of their own.
    fn declare_extensions(&mut self) -> EncodeResult {
        if self.extensions_enabled() {
            write!(self.writer, " xmlns:{}=\"{}\"", EXTENSIONS_PREFIX, EXTENSIONS_URI)?;
            self.context.push_scope();
            self.context.start_prefix_mapping(EXTENSIONS_PREFIX, EXTENSIONS_URI);
        }
        Ok(())
    }

    fn release_extensions(&mut self) {
        if self.extensions_enabled() {
            self.context.pop_scope();
        }
    }

    fn emit_value(&mut self, value: &Value) -> EncodeResult {
        let tag = self.registry.serializer_for(value, self.extensions_enabled())?;
        self.writer.write_all(b"<value>")?;
        match *value {
            Value::Nil => {
                self.open(tag, true)?;
            }
            Value::Array(ref items) => {
                let declared = self.open(tag, false)?;
                self.writer.write_all(b"<data>")?;
                for item in items {
                    self.emit_value(item)?;
                }
                self.writer.write_all(b"</data>")?;
                self.close(tag, declared)?;
            }
            Value::Struct(ref members) => {
                let declared = self.open(tag, false)?;
                for (name, member) in members {
                    write!(self.writer, "<member><name>{}</name>", escape_str_pcdata(name))?;
                    self.emit_value(member)?;
                    self.writer.write_all(b"</member>")?;
                }
                self.close(tag, declared)?;
            }
            Value::Dom(ref node) => {
                let declared = self.open(tag, false)?;
                self.emit_node(node)?;
                self.close(tag, declared)?;
            }
            _ => {
                let text = scalar::format_scalar(value).unwrap_or_default();
                let declared = self.open(tag, false)?;
                self.writer.write_all(escape_str_pcdata(&text).as_bytes())?;
                self.close(tag, declared)?;
            }
        }
        self.writer.write_all(b"</value>")?;
        Ok(())
    }

    fn tag_name(&self, tag: Tag) -> String {
        if !tag.extension {
            return tag.local.to_string();
        }
        match self.context.lookup_prefix(EXTENSIONS_URI) {
            Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, tag.local),
            _ => tag.local.to_string(),
        }
    }

    /// Writes the start tag (or an empty element). Returns whether the
    /// extension prefix had to be declared on it.
    fn open(&mut self, tag: Tag, empty: bool) -> Result<bool, SerializeError> {
        let declare = tag.extension && self.context.lookup_prefix(EXTENSIONS_URI).is_none();
        if declare {
            self.context.push_scope();
            self.context.start_prefix_mapping(EXTENSIONS_PREFIX, EXTENSIONS_URI);
        }
        let name = self.tag_name(tag);
        write!(self.writer, "<{}", name)?;
        if declare {
            write!(self.writer, " xmlns:{}=\"{}\"", EXTENSIONS_PREFIX, EXTENSIONS_URI)?;
        }
        if empty {
            self.writer.write_all(b"/>")?;
            if declare {
                self.context.pop_scope();
            }
            return Ok(false);
        }
        self.writer.write_all(b">")?;
        Ok(declare)
    }

    fn close(&mut self, tag: Tag, declared: bool) -> EncodeResult {
        let name = self.tag_name(tag);
        write!(self.writer, "</{}>", name)?;
        if declared {
            self.context.pop_scope();
        }
        Ok(())
    }

    fn emit_node(&mut self, node: &Node) -> EncodeResult {
        let (name, attributes, namespaces, children) = match *node {
            Node::Text(ref text) => {
                self.writer.write_all(escape_str_pcdata(text).as_bytes())?;
                return Ok(());
            }
            Node::Element { ref name, ref attributes, ref namespaces, ref children } => {
                (name, attributes, namespaces, children)
            }
        };

        self.context.push_scope();
        let mut declarations = Vec::new();
        for &(ref prefix, ref uri) in namespaces {
            if self.context.lookup_uri(prefix).unwrap_or("") != uri.as_str() {
                self.context.start_prefix_mapping(prefix, uri);
                declarations.push((prefix.clone(), uri.clone()));
            }
        }
        let element = self.node_name(name, true, &mut declarations);
        let mut attrs = Vec::with_capacity(attributes.len());
        for &(ref attr, ref value) in attributes {
            attrs.push((self.node_name(attr, false, &mut declarations), value));
        }

        write!(self.writer, "<{}", element)?;
        for &(ref prefix, ref uri) in &declarations {
            if prefix.is_empty() {
                write!(self.writer, " xmlns=\"{}\"", escape_str_attribute(uri))?;
            } else {
                write!(self.writer, " xmlns:{}=\"{}\"", prefix, escape_str_attribute(uri))?;
            }
        }
        for &(ref attr, value) in &attrs {
            write!(self.writer, " {}=\"{}\"", attr, escape_str_attribute(value))?;
        }
        if children.is_empty() {
            self.writer.write_all(b"/>")?;
        } else {
            self.writer.write_all(b">")?;
            for child in children {
                self.emit_node(child)?;
            }
            write!(self.writer, "</{}>", element)?;
        }
        self.context.pop_scope();
        Ok(())
    }

    /// Qualified name for a DOM element or attribute, binding a generated
    /// prefix when its namespace is not in scope.
    fn node_name(&mut self, name: &QName, is_element: bool, declarations: &mut Vec<(String, String)>) -> String {
        let uri = match name.namespace() {
            Some(uri) => uri,
            None => {
                if is_element && self.context.lookup_uri("").is_some() {
                    self.context.start_prefix_mapping("", "");
                    declarations.push((String::new(), String::new()));
                }
                return name.local.clone();
            }
        };
        if let Some(prefix) = self.context.lookup_prefix(uri) {
            if !prefix.is_empty() {
                return format!("{}:{}", prefix, name.local);
            }
            // attributes never pick up the default namespace
            if is_element {
                return name.local.clone();
            }
        }
        self.generated_prefixes += 1;
        let prefix = format!("ns{}", self.generated_prefixes);
        self.context.start_prefix_mapping(&prefix, uri);
        declarations.push((prefix.clone(), uri.to_string()));
        format!("{}:{}", prefix, name.local)
    }
}

#[derive(Clone, Copy)]
enum Stage {
    Start,
    Param(usize),
    Done,
}

/// A `methodCall` document rendered lazily, one parameter at a time, as the
/// body is read.
pub struct RequestStream {
    writer: ValueWriter<'static, Vec<u8>>,
    request: Request,
    stage: Stage,
    pos: usize,
}

impl RequestStream {
    /// Fails, before anything is rendered, if a parameter needs a disabled
    /// extension.
    pub fn new(request: Request, registry: &'static TypeRegistry, config: StreamConfig) -> Result<RequestStream, SerializeError> {
        for param in &request.params {
            check_value(registry, param, config.enabled_for_extensions)?;
        }
        Ok(RequestStream {
            writer: ValueWriter::new(Vec::new(), registry, config),
            request: request,
            stage: Stage::Start,
            pos: 0,
        })
    }

    /// Renders the next piece into the buffer. Returns false once the
    /// document is complete.
    fn fill(&mut self) -> Result<bool, SerializeError> {
        self.writer.get_mut().clear();
        self.pos = 0;
        match self.stage {
            Stage::Start => {
                self.writer.write_request_start(&self.request.method)?;
                self.stage = Stage::Param(0);
            }
            Stage::Param(idx) => {
                match self.request.params.get(idx) {
                    Some(param) => {
                        self.writer.write_param(param)?;
                        self.stage = Stage::Param(idx + 1);
                    }
                    None => {
                        self.writer.write_request_end()?;
                        self.stage = Stage::Done;
                    }
                }
            }
            Stage::Done => return Ok(false),
        }
        Ok(true)
    }
}

impl Read for RequestStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.writer.get_ref().len() {
            let more = self.fill().map_err(|e| match e {
                SerializeError::Io(e) => e,
                other => io::Error::new(io::ErrorKind::InvalidData, other),
            })?;
            if !more {
                return Ok(0);
            }
        }
        let pending = &self.writer.get_ref()[self.pos..];
        let n = pending.len().min(buf.len());
        buf[..n].copy_from_slice(&pending[..n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io::Read;

    use time::macros::datetime;

    use super::{encode_request, encode_value, RequestStream, SerializeError, ValueWriter};
    use crate::config::StreamConfig;
    use crate::xmlrpc::namespace::QName;
    use crate::xmlrpc::parser::parse_value;
    use crate::xmlrpc::protocol::Request;
    use crate::xmlrpc::registry::{TypeKind, TypeRegistry, EXTENSIONS_URI};
    use crate::xmlrpc::value::{Node, Value};

    const CORE: StreamConfig = StreamConfig {
        enabled_for_extensions: false,
        content_length_optional: false,
    };

    const EXTENDED: StreamConfig = StreamConfig {
        enabled_for_extensions: true,
        content_length_optional: true,
    };

    fn registry() -> &'static TypeRegistry {
        TypeRegistry::standard()
    }

    fn round_trip(value: &Value, config: StreamConfig) -> Value {
        let xml = encode_value(value, registry(), config).unwrap();
        parse_value(xml.as_bytes(), registry(), config).unwrap()
    }

    #[test]
    fn test_encode() {
        let expected = "<?xml version=\"1.0\"?><methodCall><methodName>method_name_value</methodName><params><param><value><string>string_value</string></value></param><param><value><double>4.2</double></value></param><param><value><boolean>1</boolean></value></param></params></methodCall>";

        let request = Request::new("method_name_value")
            .arg("string_value")
            .arg(4.2)
            .arg(true);
        let body = encode_request(&request, registry(), CORE).unwrap();

        assert_eq!(expected, String::from_utf8(body).unwrap());
    }

    #[test]
    fn test_text_is_escaped() {
        let xml = encode_value(&Value::from("a<b&c>"), registry(), CORE).unwrap();
        assert!(xml.contains("a&lt;b&amp;c"), "{}", xml);

        let mut members = BTreeMap::new();
        members.insert("k&v".to_string(), Value::Int(1));
        let xml = encode_value(&Value::Struct(members), registry(), CORE).unwrap();
        assert!(xml.contains("<name>k&amp;v</name>"), "{}", xml);
    }

    #[test]
    fn test_struct_members_in_key_order() {
        let mut members = BTreeMap::new();
        members.insert("b".to_string(), Value::Int(2));
        members.insert("a".to_string(), Value::Int(1));
        assert_eq!("<value><struct>\
                      <member><name>a</name><value><i4>1</i4></value></member>\
                      <member><name>b</name><value><i4>2</i4></value></member>\
                    </struct></value>",
                   encode_value(&Value::Struct(members), registry(), CORE).unwrap());
    }

    #[test]
    fn test_extension_values_rejected_before_output() {
        let nested = Value::Array(vec![Value::Int(1), Value::Array(vec![Value::Long(5)])]);
        let mut writer = ValueWriter::new(Vec::new(), registry(), CORE);
        match writer.write_value(&nested) {
            Err(SerializeError::ExtensionDisallowed { kind }) => assert_eq!(TypeKind::Long, kind),
            other => panic!("unexpected {:?}", other),
        }
        assert!(writer.get_ref().is_empty());

        let request = Request::new("m").arg(1).arg(Value::Nil);
        let mut writer = ValueWriter::new(Vec::new(), registry(), CORE);
        assert!(writer.write_request(&request).is_err());
        assert!(writer.get_ref().is_empty());
    }

    #[test]
    fn test_extension_prefix_declared_once() {
        let xml = encode_value(&Value::Long(5), registry(), EXTENDED).unwrap();
        assert_eq!(format!("<value><ex:i8 xmlns:ex=\"{}\">5</ex:i8></value>", EXTENSIONS_URI), xml);

        let xml = encode_value(&Value::Nil, registry(), EXTENDED).unwrap();
        assert_eq!(format!("<value><ex:nil xmlns:ex=\"{}\"/></value>", EXTENSIONS_URI), xml);

        let request = Request::new("m").arg(Value::Long(1)).arg(Value::Nil);
        let body = String::from_utf8(encode_request(&request, registry(), EXTENDED).unwrap()).unwrap();
        assert_eq!(1, body.matches("xmlns:ex").count());
        assert!(body.contains("<value><ex:i8>1</ex:i8></value>"), "{}", body);
        assert!(body.contains("<value><ex:nil/></value>"), "{}", body);
    }

    #[test]
    fn test_scalars_round_trip() {
        let values = vec![
            Value::Int(i32::MIN),
            Value::Boolean(false),
            Value::Double(-0.000123),
            Value::Double(1e300),
            Value::from("<tag> & \"quotes\" 'apos' and ünïcödé"),
            Value::from(""),
            Value::from("  leading and trailing  "),
            Value::DateTime(datetime!(2024-02-29 23:59:59)),
            Value::Base64((0..=255).collect()),
        ];
        for value in &values {
            assert_eq!(*value, round_trip(value, CORE));
            assert_eq!(*value, round_trip(value, EXTENDED));
        }

        let extended = vec![
            Value::Nil,
            Value::Byte(-1),
            Value::Short(i16::MAX),
            Value::Long(i64::MIN),
            Value::Float(0.25),
            Value::BigInteger("-98765432109876543210987654321".parse().unwrap()),
        ];
        for value in &extended {
            assert_eq!(*value, round_trip(value, EXTENDED));
        }
    }

    #[test]
    fn test_nested_round_trip() {
        let mut leaf = BTreeMap::new();
        leaf.insert("flag".to_string(), Value::Boolean(true));
        leaf.insert("when".to_string(), Value::DateTime(datetime!(1970-01-01 00:00:00)));
        leaf.insert("blob".to_string(), Value::Base64(vec![0, 1, 2]));
        let level3 = Value::Array(vec![Value::Struct(leaf), Value::Array(vec![]), Value::from("x")]);
        let mut level2 = BTreeMap::new();
        level2.insert("items".to_string(), level3);
        level2.insert("empty".to_string(), Value::Struct(BTreeMap::new()));
        let level1 = Value::Array(vec![Value::Struct(level2), Value::Int(7)]);

        assert_eq!(level1, round_trip(&level1, CORE));

        let extended = Value::Array(vec![level1, Value::Array(vec![Value::Nil, Value::Long(1 << 40)])]);
        assert_eq!(extended, round_trip(&extended, EXTENDED));
    }

    #[test]
    fn test_dom_round_trip() {
        let doc = QName::new(Some("urn:doc"), "doc");
        let node = Node::Element {
            name: doc.clone(),
            attributes: vec![(QName::local("id"), "1 & 2".to_string()),
                             (QName::new(Some("urn:attr"), "lang"), "en".to_string())],
            namespaces: vec![("".to_string(), "urn:doc".to_string())],
            children: vec![Node::Text("hello ".to_string()),
                           Node::Element {
                               name: QName::local("plain"),
                               attributes: vec![],
                               namespaces: vec![],
                               children: vec![Node::Text("<x>".to_string())],
                           }],
        };
        let xml = encode_value(&Value::Dom(node.clone()), registry(), EXTENDED).unwrap();
        assert!(xml.contains("<doc xmlns=\"urn:doc\""), "{}", xml);
        assert!(xml.contains("<plain xmlns=\"\">&lt;x"), "{}", xml);

        match parse_value(xml.as_bytes(), registry(), EXTENDED).unwrap() {
            Value::Dom(parsed) => {
                assert_eq!(Some(&doc), parsed.name());
                assert_eq!(node.text(), parsed.text());
                assert_eq!(Some(&QName::local("plain")), parsed.children()[1].name());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_request_stream_matches_buffered_rendering() {
        let mut members = BTreeMap::new();
        members.insert("n".to_string(), Value::Long(3));
        let request = Request::new("sample.call")
            .arg(Value::Struct(members))
            .arg("text")
            .arg(Value::Array(vec![Value::Nil, Value::Int(2)]));

        let buffered = encode_request(&request, registry(), EXTENDED).unwrap();

        let mut stream = RequestStream::new(request, registry(), EXTENDED).unwrap();
        let mut streamed = Vec::new();
        let mut chunk = [0u8; 7];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            streamed.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(buffered, streamed);
    }

    #[test]
    fn test_request_stream_checks_up_front() {
        let request = Request::new("m").arg(Value::Long(1));
        match RequestStream::new(request, registry(), CORE) {
            Err(SerializeError::ExtensionDisallowed { kind: TypeKind::Long }) => {}
            Err(other) => panic!("unexpected {:?}", other),
            Ok(_) => panic!("extension value accepted"),
        }
    }
}
