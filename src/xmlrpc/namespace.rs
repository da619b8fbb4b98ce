// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

//! Qualified names and the prefix bindings active while reading or writing
//! a document.

use std::fmt;

use xml::namespace::{NS_XMLNS_PREFIX, NS_XMLNS_URI, NS_XML_PREFIX, NS_XML_URI};

/// A namespace-qualified element or attribute name.
///
/// `namespace` is `None` for names in the empty (core XML-RPC) namespace.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct QName {
    pub namespace: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(namespace: Option<&str>, local: &str) -> QName {
        QName {
            namespace: namespace.filter(|ns| !ns.is_empty()).map(|ns| ns.to_string()),
            local: local.to_string(),
        }
    }

    /// A name in the empty namespace.
    pub fn local(local: &str) -> QName {
        QName::new(None, local)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Returns true if this name is `local` in the empty namespace.
    pub fn is_core(&self, local: &str) -> bool {
        self.namespace.is_none() && self.local == local
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.namespace {
            Some(ref ns) => write!(f, "{{{}}}{}", ns, self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// Stack of prefix to URI bindings.
///
/// Bindings made after a `push_scope` are released by the matching
/// `pop_scope`; inner bindings shadow outer ones for the same prefix. The
/// empty prefix stands for the default namespace.
#[derive(Clone, Debug)]
pub struct NamespaceContext {
    bindings: Vec<(String, String)>,
    scopes: Vec<usize>,
}

impl Default for NamespaceContext {
    fn default() -> NamespaceContext {
        NamespaceContext::new()
    }
}

impl NamespaceContext {
    pub fn new() -> NamespaceContext {
        NamespaceContext {
            bindings: vec![
                (NS_XML_PREFIX.to_string(), NS_XML_URI.to_string()),
                (NS_XMLNS_PREFIX.to_string(), NS_XMLNS_URI.to_string()),
            ],
            scopes: Vec::new(),
        }
    }

    pub fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) {
        self.bindings.push((prefix.to_string(), uri.to_string()));
    }

    pub fn lookup_uri(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
            .filter(|uri| !uri.is_empty())
    }

    /// Returns a prefix currently bound to `uri`, skipping prefixes that an
    /// inner binding has redirected elsewhere.
    pub fn lookup_prefix(&self, uri: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .filter(|(_, u)| u == uri)
            .map(|(p, _)| p.as_str())
            .find(|p| self.lookup_uri(p) == Some(uri))
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(self.bindings.len());
    }

    pub fn pop_scope(&mut self) {
        if let Some(mark) = self.scopes.pop() {
            self.bindings.truncate(mark);
        }
    }

    /// Filters a full in-scope mapping (as an XML reader reports it on each
    /// start tag) down to the bindings that differ from this context, i.e.
    /// the ones the element itself declared.
    pub fn declared_in<'a, I>(&self, in_scope: I) -> Vec<(String, String)>
        where I: IntoIterator<Item = (&'a str, &'a str)>
    {
        in_scope
            .into_iter()
            .filter(|&(prefix, uri)| self.lookup_uri(prefix).unwrap_or("") != uri)
            .map(|(prefix, uri)| (prefix.to_string(), uri.to_string()))
            .collect()
    }
}
