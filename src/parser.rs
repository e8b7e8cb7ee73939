//! Parser for specification markup
//!
//! A recursive descent parser that converts tokens into a [`Document`].
//! The grammar is the XML subset used by kernel specifications:
//!
//! ```text
//! document  := element EOF
//! element   := '<' Name attribute* ( '/>' | '>' content* '</' Name '>' )
//! content   := element | Text
//! attribute := Name '=' String
//! ```
//!
//! Character data is accepted wherever XML allows it and dropped from the
//! tree. Elements nest at most [`MAX_DEPTH`] levels.

use crate::ast::{Attribute, Document, Element, Ident};
use crate::lexer::{Lexer, LexerError};
use crate::span::Span;
use crate::token::{Token, TokenKind};
use thiserror::Error;

/// Deepest element nesting accepted; specifications use three levels
pub const MAX_DEPTH: usize = 16;

/// Parser errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected token: expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: TokenKind,
        span: Span,
    },

    #[error("unexpected end of file")]
    UnexpectedEof { span: Span },

    #[error("closing tag </{found}> does not match <{expected}>")]
    MismatchedTag {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("duplicate attribute `{name}`")]
    DuplicateAttribute { name: String, span: Span },

    #[error("unknown entity `{entity}` in attribute value")]
    UnknownEntity { entity: String, span: Span },

    #[error("elements nested deeper than {limit} levels")]
    TooDeep { limit: usize, span: Span },

    #[error(transparent)]
    Lexer(#[from] LexerError),
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedToken { span, .. } => *span,
            ParseError::UnexpectedEof { span } => *span,
            ParseError::MismatchedTag { span, .. } => *span,
            ParseError::DuplicateAttribute { span, .. } => *span,
            ParseError::UnknownEntity { span, .. } => *span,
            ParseError::TooDeep { span, .. } => *span,
            ParseError::Lexer(err) => err.span(),
        }
    }
}

/// Parse result
pub type ParseResult<T> = Result<T, ParseError>;

/// The parser for specification documents
pub struct Parser<'src> {
    lexer: Lexer<'src>,
    current: Token,
    previous: Token,
    depth: usize,
}

impl<'src> Parser<'src> {
    /// Create a new parser
    pub fn new(source: &'src str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token().unwrap_or(Token::new(
            TokenKind::Eof,
            Span::new(source.len(), source.len()),
        ));
        let previous = current.clone();

        Self {
            lexer,
            current,
            previous,
            depth: 0,
        }
    }

    /// Get the source document
    pub fn source(&self) -> &'src str {
        self.lexer.source()
    }

    /// Advance to next token
    fn advance(&mut self) -> Token {
        self.previous = self.current.clone();
        self.current = self.lexer.next_token().unwrap_or(Token::new(
            TokenKind::Eof,
            Span::new(self.source().len(), self.source().len()),
        ));
        self.previous.clone()
    }

    /// Check if current token matches
    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    /// Consume token if it matches, otherwise error
    fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if self.check(kind.clone()) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    /// Consume token if it matches
    fn consume(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        if self.check(TokenKind::Eof) {
            ParseError::UnexpectedEof {
                span: self.current.span,
            }
        } else {
            ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: self.current.kind.clone(),
                span: self.current.span,
            }
        }
    }

    /// Get text of a token
    fn text(&self, token: &Token) -> &'src str {
        token.text(self.source())
    }

    /// Surface the first lexer error, if any
    fn lexer_error(&self) -> ParseResult<()> {
        match self.lexer.errors().first() {
            Some(err) => Err(ParseError::Lexer(err.clone())),
            None => Ok(()),
        }
    }

    // ============ Document parsing ============

    /// Parse a complete document with a single root element
    pub fn parse_document(&mut self) -> ParseResult<Document> {
        let start = self.current.span.start;
        let root = self.parse_element();
        // Lexer errors explain most token-level failures, report them first
        self.lexer_error()?;
        let root = root?;

        if !self.check(TokenKind::Eof) {
            return Err(self.unexpected("end of file"));
        }
        self.lexer_error()?;

        Ok(Document {
            root,
            span: Span::new(start, self.previous.span.end),
        })
    }

    fn parse_element(&mut self) -> ParseResult<Element> {
        if self.depth == MAX_DEPTH {
            return Err(ParseError::TooDeep {
                limit: MAX_DEPTH,
                span: self.current.span,
            });
        }
        self.depth += 1;
        let element = self.parse_element_body();
        self.depth -= 1;
        element
    }

    fn parse_element_body(&mut self) -> ParseResult<Element> {
        let start = self.current.span.start;
        self.expect(TokenKind::Lt)?;
        let name = self.parse_name()?;

        let mut attributes: Vec<Attribute> = Vec::new();
        while self.check(TokenKind::Name) {
            let attribute = self.parse_attribute()?;
            if attributes.iter().any(|a| a.name.name == attribute.name.name) {
                return Err(ParseError::DuplicateAttribute {
                    name: attribute.name.name,
                    span: attribute.span,
                });
            }
            attributes.push(attribute);
        }

        let mut children = Vec::new();
        if !self.consume(TokenKind::SlashGt) {
            self.expect(TokenKind::Gt)?;
            loop {
                match self.current.kind {
                    TokenKind::Lt => children.push(self.parse_element()?),
                    TokenKind::Text => {
                        self.advance();
                    }
                    _ => break,
                }
            }
            if !self.check(TokenKind::LtSlash) {
                return Err(self.unexpected(&format!("</{}>", name.name)));
            }
            self.advance();
            let closing = self.parse_name()?;
            if closing.name != name.name {
                return Err(ParseError::MismatchedTag {
                    expected: name.name,
                    found: closing.name,
                    span: closing.span,
                });
            }
            self.expect(TokenKind::Gt)?;
        }

        Ok(Element {
            name,
            attributes,
            children,
            span: Span::new(start, self.previous.span.end),
        })
    }

    fn parse_attribute(&mut self) -> ParseResult<Attribute> {
        let name = self.parse_name()?;
        self.expect(TokenKind::Eq)?;
        let token = self.expect(TokenKind::StringLiteral)?;
        let raw = self.text(&token);
        // Strip the surrounding quotes; the body starts one byte in
        let body = &raw[1..raw.len() - 1];
        let value = decode_entities(body, token.span.start + 1)?;

        Ok(Attribute {
            span: name.span.merge(token.span),
            name,
            value,
        })
    }

    fn parse_name(&mut self) -> ParseResult<Ident> {
        let token = self.expect(TokenKind::Name)?;
        Ok(Ident::new(self.text(&token), token.span))
    }
}

/// Decode the predefined XML entities and numeric character references
fn decode_entities(raw: &str, offset: usize) -> ParseResult<String> {
    let mut value = String::with_capacity(raw.len());
    let mut rest = raw;
    let mut pos = offset;

    while let Some(amp) = rest.find('&') {
        value.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';') else {
            return Err(ParseError::UnknownEntity {
                entity: tail.to_string(),
                span: Span::new(pos + amp, pos + rest.len()),
            });
        };
        let entity = &tail[..=semi];
        let span = Span::new(pos + amp, pos + amp + entity.len());
        let decoded = match entity {
            "&lt;" => Some('<'),
            "&gt;" => Some('>'),
            "&amp;" => Some('&'),
            "&quot;" => Some('"'),
            "&apos;" => Some('\''),
            _ => decode_char_reference(&entity[1..entity.len() - 1]),
        };
        match decoded {
            Some(c) => value.push(c),
            None => {
                return Err(ParseError::UnknownEntity {
                    entity: entity.to_string(),
                    span,
                })
            }
        }
        let consumed = amp + entity.len();
        rest = &rest[consumed..];
        pos += consumed;
    }

    value.push_str(rest);
    Ok(value)
}

fn decode_char_reference(body: &str) -> Option<char> {
    let code = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        body.strip_prefix('#')?.parse::<u32>().ok()?
    };
    char::from_u32(code)
}

/// Parse a specification document into a markup tree
pub fn parse(source: &str) -> ParseResult<Document> {
    Parser::new(source).parse_document()
}
