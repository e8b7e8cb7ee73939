//! C Intermediate Representation
//!
//! A typed model of the C subset the generators emit. Generators build
//! `TranslationUnit`s; the printer renders them to text last, and the
//! evaluator can run the generated functions without a C toolchain.

mod types;
mod stmt;
mod item;
mod builder;
mod print;
pub mod eval;

pub use types::*;
pub use stmt::*;
pub use item::*;
pub use builder::*;
pub use print::*;
pub use eval::{EvalError, Machine, Outcome, RecordId, Value};
