//! Code generation
//!
//! Lowers kernel specifications into C translation units:
//!
//! - [`compile`]: one kernel → header/source pair with the parameter struct,
//!   defaults, parameter parser and call trampoline
//! - [`collect`]: all kernels → registry header/source pair with the kernel
//!   enumeration, the kernel-name parser and the descriptor table

mod dispatch;
mod kernel;
mod registry;

pub use dispatch::DispatchPlan;
pub use kernel::compile;
pub use registry::{collect, CollectError, PARSE_KERNEL_NAME, SPECIFICATIONS_TABLE};

use crate::ir::{print_unit, CType, Expr, Param, TranslationUnit};

/// A generated header/source pair
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedUnits {
    pub header: TranslationUnit,
    pub source: TranslationUnit,
}

/// Header and source of one kernel
pub type KernelUnits = GeneratedUnits;

/// Header and source of the kernel registry
pub type RegistryUnits = GeneratedUnits;

/// Rendered text of a generated pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub header: String,
    pub source: String,
}

impl GeneratedUnits {
    pub fn render(&self) -> Rendered {
        Rendered {
            header: print_unit(&self.header),
            source: print_unit(&self.source),
        }
    }
}

/// Names of the symbols generated for one kernel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSymbols {
    pub prefix: String,
}

impl KernelSymbols {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn with_suffix(&self, suffix: &str) -> String {
        format!("{}_{}", self.prefix, suffix)
    }

    pub fn parameters_struct(&self) -> String {
        self.with_suffix("parameters")
    }

    pub fn parameters_default(&self) -> String {
        self.with_suffix("parameters_default")
    }

    pub fn arguments_struct(&self) -> String {
        self.with_suffix("arguments")
    }

    pub fn call(&self) -> String {
        self.with_suffix("call")
    }

    pub fn profile(&self) -> String {
        self.with_suffix("profile")
    }

    pub fn parse_parameter(&self) -> String {
        self.with_suffix("parse_parameter")
    }

    pub fn create_arguments(&self) -> String {
        self.with_suffix("create_arguments")
    }

    pub fn free_arguments(&self) -> String {
        self.with_suffix("free_arguments")
    }

    /// `struct <prefix>_parameters parameters[restrict static 1]`
    fn parameters_param(&self, constant: bool) -> Param {
        let mut ty = CType::structure(self.parameters_struct());
        if constant {
            ty = CType::constant(ty);
        }
        Param::restrict_static(ty, "parameters", Expr::Int(1))
    }

    /// `struct <prefix>_arguments arguments[restrict static 1]`
    fn arguments_param(&self, constant: bool) -> Param {
        let mut ty = CType::structure(self.arguments_struct());
        if constant {
            ty = CType::constant(ty);
        }
        Param::restrict_static(ty, "arguments", Expr::Int(1))
    }
}

/// `size_t <n>_size, const char <n>[restrict static <n>_size]`
fn sized_string_params(name: &str) -> [Param; 2] {
    let size = format!("{}_size", name);
    [
        Param::new(CType::Size, size.clone()),
        Param::restrict_static(CType::constant(CType::Char), name, Expr::ident(size)),
    ]
}
