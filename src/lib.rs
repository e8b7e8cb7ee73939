//! Kernel Specification Compiler
//!
//! Generates the C glue a benchmark harness needs to drive numeric kernels.
//! Each kernel is described by a small XML document listing its tunable
//! parameters (with defaults and optional bounds) and the arguments of its
//! native call signature.
//!
//! # Architecture
//!
//! ```text
//! Specification (.xml)
//!       │
//!       ▼
//! ┌─────────────┐
//! │    Lexer    │  → Tokens
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │   Parser    │  → Markup tree
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │   Reader    │  → Kernel
//! └─────────────┘
//!       │
//!       ├──────────────────────┐
//!       ▼                      ▼
//! ┌─────────────┐      ┌─────────────┐
//! │  Compiler   │      │  Collector  │  → C IR
//! └─────────────┘      └─────────────┘
//!       │                      │
//!       └──────────┬───────────┘
//!                  ▼
//!           ┌─────────────┐
//!           │   Printer   │  → header + source
//!           └─────────────┘
//! ```

pub mod lexer;
pub mod token;
pub mod span;
pub mod ast;
pub mod parser;
pub mod spec;
pub mod ir;
pub mod codegen;
pub mod config;
pub mod driver;
pub mod error;

// Re-exports for convenience
pub use codegen::{collect, compile, GeneratedUnits, KernelUnits, RegistryUnits, Rendered};
pub use config::Config;
pub use error::{Error, Result};
pub use lexer::Lexer;
pub use span::Span;
pub use spec::{parse_kernel, Kernel};
pub use token::{Token, TokenKind};

/// Compiler version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
