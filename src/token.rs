//! Token definitions for kernel specification markup
//!
//! Specification documents use a small XML subset: elements, attributes with
//! quoted values, comments, an optional XML declaration and document type
//! declaration. Character data carries no meaning in the format; the lexer
//! produces it as [`TokenKind::Text`] and the parser discards it.

use crate::span::Span;
use logos::Logos;
use std::fmt;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Get the text of this token from source
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        self.span.text(source)
    }
}

/// All possible token types in a specification document
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"<!--([^-]|-[^-])*-->")]
#[logos(skip r"<\?([^?]|\?[^>])*\?>")]
#[logos(skip r"<!DOCTYPE[^\[>]*(\[[^\]]*\])?[^>]*>")]
pub enum TokenKind {
    // ============ Tags ============

    /// Start of an opening tag: `<`
    #[token("<")]
    Lt,

    /// Start of a closing tag: `</`
    #[token("</")]
    LtSlash,

    /// End of a tag: `>`
    #[token(">")]
    Gt,

    /// End of a self-closing tag: `/>`
    #[token("/>")]
    SlashGt,

    /// Attribute assignment: `=`
    #[token("=")]
    Eq,

    // ============ Values ============

    /// Quoted attribute value: "uint64", 'size_t'
    #[regex(r#""[^"<]*""#)]
    #[regex(r#"'[^'<]*'"#)]
    StringLiteral,

    /// Element or attribute name: kernel, namespace, max-size
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_.\-]*")]
    Name,

    /// Character data between tags, produced by the lexer after `>` or `/>`
    Text,

    // ============ Special ============

    /// End of file
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Lt => "<",
            TokenKind::LtSlash => "</",
            TokenKind::Gt => ">",
            TokenKind::SlashGt => "/>",
            TokenKind::Eq => "=",
            TokenKind::StringLiteral => "string",
            TokenKind::Name => "name",
            TokenKind::Text => "text",
            TokenKind::Eof => "end of file",
        };
        write!(f, "{}", s)
    }
}
