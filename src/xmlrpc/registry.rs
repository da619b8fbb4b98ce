// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

//! The closed mapping between wire tags and value kinds.
//!
//! Core tags live in the empty namespace and are always available. The
//! extension tags (`nil`, `i1`, `i2`, `i8`, `float`, `biginteger`, `dom`)
//! live in [`EXTENSIONS_URI`] and are only resolvable, or writable, when the
//! stream configuration enables extensions.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use crate::xmlrpc::encoding::SerializeError;
use crate::xmlrpc::namespace::QName;
use crate::xmlrpc::value::Value;

/// Namespace URI of the extension types.
pub const EXTENSIONS_URI: &str = "http://ws.apache.org/xmlrpc/namespaces/extensions";

/// Prefix the serializer binds to [`EXTENSIONS_URI`].
pub const EXTENSIONS_PREFIX: &str = "ex";

/// The kind of a value, which doubles as the handle used to construct the
/// parser for a resolved tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TypeKind {
    Nil,
    Boolean,
    Int,
    Byte,
    Short,
    Long,
    Double,
    Float,
    String,
    DateTime,
    Base64,
    BigInteger,
    Array,
    Struct,
    Dom,
}

impl TypeKind {
    /// Local name written for this kind.
    pub fn tag(self) -> &'static str {
        match self {
            TypeKind::Nil => "nil",
            TypeKind::Boolean => "boolean",
            TypeKind::Int => "i4",
            TypeKind::Byte => "i1",
            TypeKind::Short => "i2",
            TypeKind::Long => "i8",
            TypeKind::Double => "double",
            TypeKind::Float => "float",
            TypeKind::String => "string",
            TypeKind::DateTime => "dateTime.iso8601",
            TypeKind::Base64 => "base64",
            TypeKind::BigInteger => "biginteger",
            TypeKind::Array => "array",
            TypeKind::Struct => "struct",
            TypeKind::Dom => "dom",
        }
    }

    pub fn is_extension(self) -> bool {
        match self {
            TypeKind::Nil
            | TypeKind::Byte
            | TypeKind::Short
            | TypeKind::Long
            | TypeKind::Float
            | TypeKind::BigInteger
            | TypeKind::Dom => true,
            _ => false,
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Why a tag could not be resolved.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ResolveError {
    /// No kind is registered under that name.
    Unknown,
    /// The tag is in the extension namespace and extensions are disabled.
    ExtensionDisallowed,
}

/// The tag a value is written with.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Tag {
    pub kind: TypeKind,
    pub extension: bool,
    pub local: &'static str,
}

#[derive(Debug)]
pub struct TypeRegistry {
    core: HashMap<&'static str, TypeKind>,
    extensions: HashMap<&'static str, TypeKind>,
}

impl Default for TypeRegistry {
    fn default() -> TypeRegistry {
        TypeRegistry::new()
    }
}

impl TypeRegistry {
    pub fn new() -> TypeRegistry {
        let core = [
            ("i4", TypeKind::Int),
            ("int", TypeKind::Int),
            ("boolean", TypeKind::Boolean),
            ("double", TypeKind::Double),
            ("string", TypeKind::String),
            ("dateTime.iso8601", TypeKind::DateTime),
            ("base64", TypeKind::Base64),
            ("array", TypeKind::Array),
            ("struct", TypeKind::Struct),
        ];
        let extensions = [
            ("nil", TypeKind::Nil),
            ("i1", TypeKind::Byte),
            ("i2", TypeKind::Short),
            ("i8", TypeKind::Long),
            ("float", TypeKind::Float),
            ("biginteger", TypeKind::BigInteger),
            ("dom", TypeKind::Dom),
        ];
        TypeRegistry {
            core: core.iter().cloned().collect(),
            extensions: extensions.iter().cloned().collect(),
        }
    }

    /// The process-wide registry. It is never mutated after construction,
    /// so every client shares it.
    pub fn standard() -> &'static TypeRegistry {
        static STANDARD: OnceLock<TypeRegistry> = OnceLock::new();
        STANDARD.get_or_init(TypeRegistry::new)
    }

    pub fn resolve(&self, name: &QName, extensions_enabled: bool) -> Result<TypeKind, ResolveError> {
        match name.namespace() {
            None => self.core.get(name.local.as_str()).cloned().ok_or(ResolveError::Unknown),
            Some(EXTENSIONS_URI) => {
                if !extensions_enabled {
                    return Err(ResolveError::ExtensionDisallowed);
                }
                self.extensions.get(name.local.as_str()).cloned().ok_or(ResolveError::Unknown)
            }
            Some(_) => Err(ResolveError::Unknown),
        }
    }

    /// Picks the tag for `value` from its kind alone.
    pub fn serializer_for(&self, value: &Value, extensions_enabled: bool) -> Result<Tag, SerializeError> {
        let kind = value.kind();
        if kind.is_extension() && !extensions_enabled {
            return Err(SerializeError::ExtensionDisallowed { kind: kind });
        }
        Ok(Tag {
            kind: kind,
            extension: kind.is_extension(),
            local: kind.tag(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ResolveError, TypeKind, TypeRegistry, EXTENSIONS_URI};
    use crate::xmlrpc::encoding::SerializeError;
    use crate::xmlrpc::namespace::QName;
    use crate::xmlrpc::value::Value;

    #[test]
    fn test_core_tags_always_resolve() {
        let registry = TypeRegistry::new();
        for &enabled in &[false, true] {
            assert_eq!(Ok(TypeKind::Int), registry.resolve(&QName::local("int"), enabled));
            assert_eq!(Ok(TypeKind::Int), registry.resolve(&QName::local("i4"), enabled));
            assert_eq!(Ok(TypeKind::Struct), registry.resolve(&QName::local("struct"), enabled));
            assert_eq!(Ok(TypeKind::DateTime),
                       registry.resolve(&QName::local("dateTime.iso8601"), enabled));
        }
    }

    #[test]
    fn test_extension_tags_are_gated() {
        let registry = TypeRegistry::new();
        let i8_tag = QName::new(Some(EXTENSIONS_URI), "i8");
        assert_eq!(Ok(TypeKind::Long), registry.resolve(&i8_tag, true));
        assert_eq!(Err(ResolveError::ExtensionDisallowed), registry.resolve(&i8_tag, false));
    }

    #[test]
    fn test_unknown_tags() {
        let registry = TypeRegistry::new();
        assert_eq!(Err(ResolveError::Unknown), registry.resolve(&QName::local("float32"), true));
        // extension names are not core names
        assert_eq!(Err(ResolveError::Unknown), registry.resolve(&QName::local("i8"), true));
        assert_eq!(Err(ResolveError::Unknown),
                   registry.resolve(&QName::new(Some(EXTENSIONS_URI), "serializable"), true));
        assert_eq!(Err(ResolveError::Unknown),
                   registry.resolve(&QName::new(Some("urn:other"), "int"), true));
    }

    #[test]
    fn test_serializer_for_values() {
        let registry = TypeRegistry::standard();
        let tag = registry.serializer_for(&Value::Int(3), false).unwrap();
        assert_eq!("i4", tag.local);
        assert!(!tag.extension);

        let tag = registry.serializer_for(&Value::Long(3), true).unwrap();
        assert_eq!("i8", tag.local);
        assert!(tag.extension);

        match registry.serializer_for(&Value::Long(3), false) {
            Err(SerializeError::ExtensionDisallowed { kind }) => assert_eq!(TypeKind::Long, kind),
            other => panic!("unexpected {:?}", other),
        }
    }
}
