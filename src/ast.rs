//! Markup tree for specification documents
//!
//! The parser produces a [`Document`] with exactly one root [`Element`].
//! The tree keeps spans so the reader can report `line:column` positions
//! for structural errors.

use crate::span::{Span, Spanned};

/// A complete specification document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub root: Element,
    pub span: Span,
}

/// An element: `<parameter name="k" type="uint64" default="256"/>`
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: Ident,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Element>,
    pub span: Span,
}

impl Element {
    /// Look up an attribute by name
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|attr| attr.name.name == name)
    }

    /// Value of an attribute, if present
    pub fn attr_value(&self, name: &str) -> Option<&str> {
        self.attribute(name).map(|attr| attr.value.as_str())
    }

    /// Tag name of this element
    pub fn tag(&self) -> &str {
        &self.name.name
    }
}

impl Spanned for Element {
    fn span(&self) -> Span {
        self.span
    }
}

/// Attribute with its decoded value: `type="const float*"`
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: Ident,
    /// Value with quotes stripped and entities decoded
    pub value: String,
    pub span: Span,
}

impl Spanned for Attribute {
    fn span(&self) -> Span {
        self.span
    }
}

/// A name with its location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}
