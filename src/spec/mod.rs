//! Kernel specification model
//!
//! A [`Kernel`] is the in-memory form of one specification document: its
//! identity, the tunable [`Parameter`]s with their defaults and bounds, and
//! the [`Argument`]s of the kernel's native call signature in ABI order.

mod error;
mod reader;

pub use error::{SpecError, SpecErrorKind, SpecResult};
pub use reader::{is_c_identifier, parse_kernel, read_kernel};

use crate::span::Span;
use std::fmt;

/// Directory under which generated kernel headers are included
pub const DEFAULT_HEADER_ROOT: &str = "kernels";

/// Suffix of generated header and source files
pub const GENERATED_SUFFIX: &str = "-gen";

/// A benchmarkable kernel described by one specification document
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    pub name: String,
    pub namespace: Option<String>,
    pub parameters: Vec<Parameter>,
    pub arguments: Vec<Argument>,
    pub span: Span,
}

impl Kernel {
    pub fn new(name: impl Into<String>, namespace: Option<String>) -> Self {
        Self {
            name: name.into(),
            namespace,
            parameters: Vec::new(),
            arguments: Vec::new(),
            span: Span::default(),
        }
    }

    /// `namespace::name`, or just `name` without a namespace
    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!("{}::{}", namespace, self.name),
            None => self.name.clone(),
        }
    }

    /// `namespace_name`, or just `name`; the stem of every generated symbol
    pub fn prefix(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!("{}_{}", namespace, self.name),
            None => self.name.clone(),
        }
    }

    /// Include path of the generated kernel header under the default root
    pub fn header_path(&self) -> String {
        self.header_path_in(DEFAULT_HEADER_ROOT)
    }

    /// Include path of the generated kernel header under `root`
    pub fn header_path_in(&self, root: &str) -> String {
        let mut path = String::new();
        if !root.is_empty() {
            path.push_str(root.trim_end_matches('/'));
            path.push('/');
        }
        if let Some(namespace) = &self.namespace {
            path.push_str(namespace);
            path.push('/');
        }
        path.push_str(&self.name);
        path.push_str(GENERATED_SUFFIX);
        path.push_str(".h");
        path
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.full_name())?;
        for (i, argument) in self.arguments.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", argument.ty, argument.name)?;
        }
        write!(f, ")")
    }
}

/// Scalar type of a tunable parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Uint32,
    Uint64,
}

impl ScalarType {
    pub const ALL: [ScalarType; 2] = [ScalarType::Uint32, ScalarType::Uint64];

    /// Spelling used in specification documents
    pub fn keyword(self) -> &'static str {
        match self {
            ScalarType::Uint32 => "uint32",
            ScalarType::Uint64 => "uint64",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.keyword() == keyword)
    }

    /// Width in bits
    pub fn bits(self) -> u8 {
        match self {
            ScalarType::Uint32 => 32,
            ScalarType::Uint64 => 64,
        }
    }

    /// Largest representable value
    pub fn max_value(self) -> u64 {
        match self {
            ScalarType::Uint32 => u64::from(u32::MAX),
            ScalarType::Uint64 => u64::MAX,
        }
    }

    /// Name of the runtime primitive converting text into this type
    pub fn parse_function(self) -> String {
        format!("parse_{}", self.keyword())
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// A named, boundable, benchmark-tunable scalar
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: ScalarType,
    pub default: u64,
    pub min: Option<u64>,
    pub max: Option<u64>,
    pub span: Span,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: ScalarType, default: u64) -> Self {
        Self {
            name: name.into(),
            ty,
            default,
            min: None,
            max: None,
            span: Span::default(),
        }
    }

    pub fn with_min(mut self, min: u64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn with_max(mut self, max: u64) -> Self {
        self.max = Some(max);
        self
    }

    /// Whether the generated bound checks let `value` through.
    /// A missing bound means no check on that side.
    pub fn accepts(&self, value: u64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }

    pub fn is_bounded(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }
}

/// Type of a native call argument, drawn from a closed set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgType {
    Size,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    ConstFloatPtr,
    FloatPtr,
    ConstDoublePtr,
    DoublePtr,
}

impl ArgType {
    pub const ALL: [ArgType; 13] = [
        ArgType::Size,
        ArgType::Int8,
        ArgType::Int16,
        ArgType::Int32,
        ArgType::Int64,
        ArgType::Uint8,
        ArgType::Uint16,
        ArgType::Uint32,
        ArgType::Uint64,
        ArgType::ConstFloatPtr,
        ArgType::FloatPtr,
        ArgType::ConstDoublePtr,
        ArgType::DoublePtr,
    ];

    /// C spelling, which is also the spelling used in specification documents
    pub fn c_spelling(self) -> &'static str {
        match self {
            ArgType::Size => "size_t",
            ArgType::Int8 => "int8_t",
            ArgType::Int16 => "int16_t",
            ArgType::Int32 => "int32_t",
            ArgType::Int64 => "int64_t",
            ArgType::Uint8 => "uint8_t",
            ArgType::Uint16 => "uint16_t",
            ArgType::Uint32 => "uint32_t",
            ArgType::Uint64 => "uint64_t",
            ArgType::ConstFloatPtr => "const float*",
            ArgType::FloatPtr => "float*",
            ArgType::ConstDoublePtr => "const double*",
            ArgType::DoublePtr => "double*",
        }
    }

    /// Parse a type spelling. Whitespace around `*` and between words is
    /// not significant: `const float *` and `const float*` are the same type.
    pub fn from_spelling(spelling: &str) -> Option<Self> {
        let normalized = normalize_spelling(spelling);
        Self::ALL
            .into_iter()
            .find(|ty| ty.c_spelling() == normalized)
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.c_spelling())
    }
}

fn normalize_spelling(spelling: &str) -> String {
    let words: Vec<&str> = spelling.split_whitespace().collect();
    words.join(" ").replace(" *", "*")
}

/// A named, typed slot in the kernel's native call signature
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    pub ty: ArgType,
    pub span: Span,
}

impl Argument {
    pub fn new(name: impl Into<String>, ty: ArgType) -> Self {
        Self {
            name: name.into(),
            ty,
            span: Span::default(),
        }
    }
}
