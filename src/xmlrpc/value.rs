// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

use std::collections::BTreeMap;
use std::ops::Index;

use num::BigInt;
use time::PrimitiveDateTime;

use crate::xmlrpc::namespace::QName;
use crate::xmlrpc::registry::TypeKind;

/// Represents an XML-RPC data value
#[derive(Clone, PartialEq, Debug)]
pub enum Value {
    Nil,
    Boolean(bool),
    Int(i32),
    Byte(i8),
    Short(i16),
    Long(i64),
    Double(f64),
    Float(f32),
    String(String),
    DateTime(PrimitiveDateTime),
    Base64(Vec<u8>),
    BigInteger(BigInt),
    Array(self::Array),
    Struct(self::Struct),
    Dom(Node),
}

pub type Array = Vec<Value>;
pub type Struct = BTreeMap<String, Value>;

/// An opaque XML fragment carried by the `dom` extension type.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Node {
    Element {
        name: QName,
        attributes: Vec<(QName, String)>,
        /// Prefix bindings declared on this element, `""` for the default
        /// namespace.
        namespaces: Vec<(String, String)>,
        children: Vec<Node>,
    },
    Text(String),
}

impl Node {
    pub fn name(&self) -> Option<&QName> {
        match *self {
            Node::Element { ref name, .. } => Some(name),
            Node::Text(_) => None,
        }
    }

    pub fn children(&self) -> &[Node] {
        match *self {
            Node::Element { ref children, .. } => children,
            Node::Text(_) => &[],
        }
    }

    /// Concatenated text of this node and its descendants.
    pub fn text(&self) -> String {
        match *self {
            Node::Text(ref s) => s.clone(),
            Node::Element { ref children, .. } => children.iter().map(Node::text).collect(),
        }
    }
}

static NIL: Value = Value::Nil;

impl Value {
    /// The registry kind this value is written as.
    pub fn kind(&self) -> TypeKind {
        match *self {
            Value::Nil => TypeKind::Nil,
            Value::Boolean(_) => TypeKind::Boolean,
            Value::Int(_) => TypeKind::Int,
            Value::Byte(_) => TypeKind::Byte,
            Value::Short(_) => TypeKind::Short,
            Value::Long(_) => TypeKind::Long,
            Value::Double(_) => TypeKind::Double,
            Value::Float(_) => TypeKind::Float,
            Value::String(_) => TypeKind::String,
            Value::DateTime(_) => TypeKind::DateTime,
            Value::Base64(_) => TypeKind::Base64,
            Value::BigInteger(_) => TypeKind::BigInteger,
            Value::Array(_) => TypeKind::Array,
            Value::Struct(_) => TypeKind::Struct,
            Value::Dom(_) => TypeKind::Dom,
        }
    }

    /// If the value is a Struct, returns the member associated with the provided key.
    /// Otherwise, returns None.
    pub fn find<'a>(&'a self, key: &str) -> Option<&'a Value> {
        match *self {
            Value::Struct(ref map) => map.get(key),
            _ => None,
        }
    }

    /// Attempts to get a nested Struct member for each key in `keys`.
    /// If any key is found not to exist, find_path will return None.
    /// Otherwise, it will return the value associated with the final key.
    pub fn find_path<'a>(&'a self, keys: &[&str]) -> Option<&'a Value> {
        let mut target = self;
        for key in keys {
            target = target.find(key)?;
        }
        Some(target)
    }

    /// If the value is a Struct, performs a depth-first search until
    /// a value associated with the provided key is found. If no value is found
    /// or the value is not a Struct, returns None.
    pub fn search<'a>(&'a self, key: &str) -> Option<&'a Value> {
        match *self {
            Value::Struct(ref map) => {
                map.get(key).or_else(|| map.values().filter_map(|v| v.search(key)).next())
            }
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        match *self {
            Value::Struct(ref map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match *self {
            Value::Array(ref array) => Some(array),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match *self {
            Value::String(ref s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Value::Int(n) => Some(n),
            Value::Byte(n) => Some(n as i32),
            Value::Short(n) => Some(n as i32),
            _ => None,
        }
    }

    /// Widens any of the fixed-size integer kinds.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Long(n) => Some(n),
            _ => self.as_i32().map(|n| n as i64),
        }
    }

    /// If the value is a number, return or cast it to a f64.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Double(n) => Some(n),
            Value::Float(n) => Some(n as f64),
            _ => self.as_i64().map(|n| n as f64),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match *self {
            Value::Base64(ref bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<PrimitiveDateTime> {
        match *self {
            Value::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        *self == Value::Nil
    }
}

impl<'a> Index<&'a str> for Value {
    type Output = Value;

    /// Missing members and non-struct values index to `Nil`.
    fn index(&self, idx: &str) -> &Value {
        self.find(idx).unwrap_or(&NIL)
    }
}

impl Index<usize> for Value {
    type Output = Value;

    fn index(&self, idx: usize) -> &Value {
        self.as_array().and_then(|v| v.get(idx)).unwrap_or(&NIL)
    }
}

macro_rules! from_impl {
    ($($ty:ty => $variant:ident),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Value {
                    Value::$variant(v)
                }
            }
        )*
    }
}

from_impl! {
    bool => Boolean,
    i32 => Int,
    i64 => Long,
    f64 => Double,
    String => String,
    Vec<u8> => Base64,
    Array => Array,
    Struct => Struct,
    BigInt => BigInteger,
    PrimitiveDateTime => DateTime,
    Node => Dom
}

impl<'a> From<&'a str> for Value {
    fn from(v: &'a str) -> Value {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Value {
        v.map_or(Value::Nil, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::Value;
    use crate::xmlrpc::registry::TypeKind;

    fn record() -> Value {
        let mut inner = BTreeMap::new();
        inner.insert("ip".to_string(), Value::from("10.0.0.1"));
        let mut outer = BTreeMap::new();
        outer.insert("id".to_string(), Value::Int(42));
        outer.insert("zone".to_string(), Value::Struct(inner));
        Value::Struct(outer)
    }

    #[test]
    fn test_lookup_helpers() {
        let v = record();
        assert_eq!(Some(42), v.find("id").and_then(Value::as_i32));
        assert_eq!(Some("10.0.0.1"), v.find_path(&["zone", "ip"]).and_then(Value::as_str));
        assert_eq!(Some("10.0.0.1"), v.search("ip").and_then(Value::as_str));
        assert_eq!(None, v.find_path(&["zone", "missing"]));
        assert_eq!(Value::Nil, v["missing"]);
        assert_eq!(Value::Nil, v[0]);
        assert_eq!(Value::Int(42), v["id"]);
    }

    #[test]
    fn test_numeric_widening() {
        assert_eq!(Some(7), Value::Byte(7).as_i32());
        assert_eq!(Some(1 << 40), Value::Long(1 << 40).as_i64());
        assert_eq!(None, Value::Long(1).as_i32());
        assert_eq!(Some(2.0), Value::Int(2).as_f64());
    }

    #[test]
    fn test_kind_and_conversions() {
        assert_eq!(TypeKind::Long, Value::from(5i64).kind());
        assert_eq!(TypeKind::Nil, Value::from(None::<i32>).kind());
        assert_eq!(Value::Int(1), Value::from(Some(1)));
        assert_eq!(TypeKind::Array, Value::from(vec![Value::Nil]).kind());
    }
}
