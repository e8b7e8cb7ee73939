//! Specification Error Definitions
//!
//! Every way a specification document can be rejected. Reading is
//! all-or-nothing: the first error aborts and no partial kernel is produced.

use crate::parser::ParseError;
use crate::span::Span;
use thiserror::Error;

/// Result type for reading specifications
pub type SpecResult<T> = Result<T, SpecError>;

/// Specification error with the location it refers to
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}")]
pub struct SpecError {
    pub kind: SpecErrorKind,
    pub span: Span,
}

impl SpecError {
    pub fn new(kind: SpecErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    // ============ Error Constructors ============

    pub fn unexpected_root(found: &str, span: Span) -> Self {
        Self::new(SpecErrorKind::UnexpectedRoot { found: found.to_string() }, span)
    }

    pub fn unexpected_section(found: &str, span: Span) -> Self {
        Self::new(SpecErrorKind::UnexpectedSection { found: found.to_string() }, span)
    }

    pub fn duplicate_section(section: &str, span: Span) -> Self {
        Self::new(SpecErrorKind::DuplicateSection { section: section.to_string() }, span)
    }

    pub fn unexpected_declaration(section: &str, expected: &str, found: &str, span: Span) -> Self {
        Self::new(
            SpecErrorKind::UnexpectedDeclaration {
                section: section.to_string(),
                expected: expected.to_string(),
                found: found.to_string(),
            },
            span,
        )
    }

    pub fn unexpected_child(parent: &str, found: &str, span: Span) -> Self {
        Self::new(
            SpecErrorKind::UnexpectedChild {
                parent: parent.to_string(),
                found: found.to_string(),
            },
            span,
        )
    }

    pub fn missing_attribute(element: &str, attribute: &str, span: Span) -> Self {
        Self::new(
            SpecErrorKind::MissingAttribute {
                element: element.to_string(),
                attribute: attribute.to_string(),
            },
            span,
        )
    }

    pub fn invalid_identifier(what: &str, value: &str, span: Span) -> Self {
        Self::new(
            SpecErrorKind::InvalidIdentifier {
                what: what.to_string(),
                value: value.to_string(),
            },
            span,
        )
    }

    pub fn unknown_parameter_type(found: &str, span: Span) -> Self {
        Self::new(SpecErrorKind::UnknownParameterType { found: found.to_string() }, span)
    }

    pub fn unknown_argument_type(found: &str, span: Span) -> Self {
        Self::new(SpecErrorKind::UnknownArgumentType { found: found.to_string() }, span)
    }

    pub fn invalid_literal(parameter: &str, attribute: &str, value: &str, ty: &str, span: Span) -> Self {
        Self::new(
            SpecErrorKind::InvalidLiteral {
                parameter: parameter.to_string(),
                attribute: attribute.to_string(),
                value: value.to_string(),
                ty: ty.to_string(),
            },
            span,
        )
    }

    pub fn empty_range(parameter: &str, min: u64, max: u64, span: Span) -> Self {
        Self::new(
            SpecErrorKind::EmptyRange {
                parameter: parameter.to_string(),
                min,
                max,
            },
            span,
        )
    }

    pub fn default_out_of_range(parameter: &str, default: u64, min: u64, max: u64, span: Span) -> Self {
        Self::new(
            SpecErrorKind::DefaultOutOfRange {
                parameter: parameter.to_string(),
                default,
                min,
                max,
            },
            span,
        )
    }

    pub fn duplicate_parameter(name: &str, span: Span) -> Self {
        Self::new(SpecErrorKind::DuplicateParameter { name: name.to_string() }, span)
    }

    pub fn duplicate_argument(name: &str, span: Span) -> Self {
        Self::new(SpecErrorKind::DuplicateArgument { name: name.to_string() }, span)
    }
}

impl From<ParseError> for SpecError {
    fn from(err: ParseError) -> Self {
        let span = err.span();
        Self::new(SpecErrorKind::Markup(err), span)
    }
}

/// Kinds of specification errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpecErrorKind {
    #[error("malformed document: {0}")]
    Markup(ParseError),

    #[error("root element must be <kernel>, found <{found}>")]
    UnexpectedRoot { found: String },

    #[error("unknown section <{found}>, expected <query> or <call>")]
    UnexpectedSection { found: String },

    #[error("section <{section}> appears more than once")]
    DuplicateSection { section: String },

    #[error("unknown declaration <{found}> in <{section}>, expected <{expected}>")]
    UnexpectedDeclaration {
        section: String,
        expected: String,
        found: String,
    },

    #[error("<{parent}> does not take child elements, found <{found}>")]
    UnexpectedChild { parent: String, found: String },

    #[error("<{element}> is missing required attribute `{attribute}`")]
    MissingAttribute { element: String, attribute: String },

    #[error("{what} `{value}` is not a valid C identifier")]
    InvalidIdentifier { what: String, value: String },

    #[error("unknown parameter type `{found}`, expected uint32 or uint64")]
    UnknownParameterType { found: String },

    #[error("unsupported argument type `{found}`")]
    UnknownArgumentType { found: String },

    #[error("{attribute} value `{value}` of parameter `{parameter}` is not a valid {ty} literal")]
    InvalidLiteral {
        parameter: String,
        attribute: String,
        value: String,
        ty: String,
    },

    #[error("parameter `{parameter}` has min {min} greater than max {max}")]
    EmptyRange { parameter: String, min: u64, max: u64 },

    #[error("default {default} of parameter `{parameter}` lies outside [{min}, {max}]")]
    DefaultOutOfRange {
        parameter: String,
        default: u64,
        min: u64,
        max: u64,
    },

    #[error("parameter `{name}` is declared more than once")]
    DuplicateParameter { name: String },

    #[error("argument `{name}` is declared more than once")]
    DuplicateArgument { name: String },
}
