//! Lexer for kernel specification markup
//!
//! The lexer converts a specification document into a stream of tokens.
//! It uses the `logos` crate for efficient lexing.

use crate::span::Span;
use crate::token::{Token, TokenKind};
use logos::Logos;
use thiserror::Error;

/// Lexer errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexerError {
    #[error("unexpected character at position {0}")]
    UnexpectedChar(usize),

    #[error("unterminated attribute value at position {0}")]
    UnterminatedString(usize),
}

impl LexerError {
    pub fn span(&self) -> Span {
        match self {
            LexerError::UnexpectedChar(pos) | LexerError::UnterminatedString(pos) => {
                Span::new(*pos, *pos + 1)
            }
        }
    }
}

/// UTF-8 byte order mark, allowed once at the very start of a document
const BYTE_ORDER_MARK: char = '\u{feff}';

/// The lexer for specification documents
pub struct Lexer<'src> {
    source: &'src str,
    inner: logos::Lexer<'src, TokenKind>,
    /// Set after `>` or `/>`, where character data may follow
    in_content: bool,
    errors: Vec<LexerError>,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given document
    pub fn new(source: &'src str) -> Self {
        let mut inner = TokenKind::lexer(source);
        if source.starts_with(BYTE_ORDER_MARK) {
            // Spans stay relative to the undecoded source
            inner.bump(BYTE_ORDER_MARK.len_utf8());
        }
        Self {
            source,
            inner,
            in_content: false,
            errors: Vec::new(),
        }
    }

    /// Get the source document
    pub fn source(&self) -> &'src str {
        self.source
    }

    /// Get any errors that occurred during lexing
    pub fn errors(&self) -> &[LexerError] {
        &self.errors
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Option<Token> {
        if std::mem::take(&mut self.in_content) {
            if let Some(text) = self.character_data() {
                return Some(text);
            }
        }

        loop {
            match self.inner.next() {
                Some(Ok(kind)) => {
                    let span = self.inner.span();
                    self.in_content = matches!(kind, TokenKind::Gt | TokenKind::SlashGt);
                    return Some(Token::new(kind, Span::new(span.start, span.end)));
                }
                Some(Err(())) => {
                    // Skip invalid input and record error
                    let span = self.inner.span();
                    let error = match self.source[span.start..].chars().next() {
                        Some('"') | Some('\'') => LexerError::UnterminatedString(span.start),
                        _ => LexerError::UnexpectedChar(span.start),
                    };
                    self.errors.push(error);
                    continue;
                }
                None => {
                    let pos = self.source.len();
                    return Some(Token::new(TokenKind::Eof, Span::new(pos, pos)));
                }
            }
        }
    }

    /// Consume character data up to the next tag
    ///
    /// Comments and processing instructions inside the run are consumed with
    /// it. Whitespace-only runs produce no token.
    fn character_data(&mut self) -> Option<Token> {
        let start = self.inner.span().end;
        let rest = self.inner.remainder();
        let mut end = 0;
        let mut text: Option<(usize, usize)> = None;

        loop {
            let tag = rest[end..].find('<').map_or(rest.len(), |i| end + i);
            let run = &rest[end..tag];
            if !run.trim().is_empty() {
                let first = end + (run.len() - run.trim_start().len());
                let last = end + run.trim_end().len();
                text = Some(text.map_or((first, last), |(from, _)| (from, last)));
            }
            end = tag;

            let close = if rest[end..].starts_with("<!--") {
                rest[end..].find("-->").map(|i| i + 3)
            } else if rest[end..].starts_with("<?") {
                rest[end..].find("?>").map(|i| i + 2)
            } else {
                None
            };
            match close {
                Some(len) => end += len,
                None => break,
            }
        }

        self.inner.bump(end);
        text.map(|(from, to)| Token::new(TokenKind::Text, Span::new(start + from, start + to)))
    }

    /// Collect all tokens into a vector
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<LexerError>) {
        let mut tokens = Vec::new();

        loop {
            match self.next_token() {
                Some(token) if token.kind == TokenKind::Eof => {
                    tokens.push(token);
                    break;
                }
                Some(token) => tokens.push(token),
                None => break,
            }
        }

        (tokens, self.errors)
    }
}

/// Helper function to lex a specification document
pub fn lex(source: &str) -> (Vec<Token>, Vec<LexerError>) {
    Lexer::new(source).tokenize()
}
