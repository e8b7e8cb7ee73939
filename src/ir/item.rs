//! IR Items
//!
//! File-scope declarations and the translation unit that holds them.

use super::stmt::{Expr, Stmt};
use super::types::CType;

/// A generated C file (header or source)
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationUnit {
    /// File label, used for logging only
    pub name: String,
    pub items: Vec<Item>,
}

impl TranslationUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
        }
    }

    pub fn push(&mut self, item: Item) {
        self.items.push(item);
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.items.iter().filter_map(|item| match item {
            Item::Function(func) => Some(func),
            _ => None,
        })
    }

    /// Function with a body named `name`
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions().find(|f| f.name == name && f.body.is_some())
    }

    pub fn struct_def(&self, name: &str) -> Option<&StructDef> {
        self.items.iter().find_map(|item| match item {
            Item::Struct(def) if def.name == name => Some(def),
            _ => None,
        })
    }

    pub fn enum_def(&self, name: &str) -> Option<&EnumDef> {
        self.items.iter().find_map(|item| match item {
            Item::Enum(def) if def.name == name => Some(def),
            _ => None,
        })
    }

    pub fn enums(&self) -> impl Iterator<Item = &EnumDef> {
        self.items.iter().filter_map(|item| match item {
            Item::Enum(def) => Some(def),
            _ => None,
        })
    }

    pub fn global(&self, name: &str) -> Option<&Global> {
        self.items.iter().find_map(|item| match item {
            Item::Global(global) if global.name == name => Some(global),
            _ => None,
        })
    }
}

/// File-scope items
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// `#pragma once`
    Pragma(String),
    /// `#include <..>` or `#include ".."`
    Include(Include),
    Struct(StructDef),
    Enum(EnumDef),
    Typedef(FnPtrTypedef),
    Global(Global),
    Function(Function),
    /// Top-level macro invocation: `DEFINE_PROFILE_FUNCTION(prefix)`
    MacroCall(MacroCall),
}

/// `#include <path>`
#[derive(Debug, Clone, PartialEq)]
pub struct Include {
    pub path: String,
    pub kind: IncludeKind,
}

/// Standard and project headers print as separate groups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeKind {
    /// C library header
    Standard,
    /// Header resolved through the project include path
    Project,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub ty: CType,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    pub name: String,
    pub variants: Vec<Enumerator>,
}

impl EnumDef {
    /// Values of all enumerators, following C's implicit numbering
    pub fn values(&self) -> Vec<(&str, i64)> {
        let mut next = 0;
        self.variants
            .iter()
            .map(|variant| {
                let value = variant.value.unwrap_or(next);
                next = value + 1;
                (variant.name.as_str(), value)
            })
            .collect()
    }

    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.values()
            .into_iter()
            .find(|(variant, _)| *variant == name)
            .map(|(_, value)| value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enumerator {
    pub name: String,
    pub value: Option<i64>,
}

/// `typedef ret (*name)(params);`
#[derive(Debug, Clone, PartialEq)]
pub struct FnPtrTypedef {
    pub name: String,
    pub ret: CType,
    pub params: Vec<CType>,
}

/// Storage class and inline specifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Storage {
    #[default]
    None,
    Extern,
    Static,
    StaticInline,
}

impl Storage {
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            Storage::None => None,
            Storage::Extern => Some("extern"),
            Storage::Static => Some("static"),
            Storage::StaticInline => Some("static inline"),
        }
    }
}

/// Shape of a declarator
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Declarator {
    /// `ty name`
    #[default]
    Plain,
    /// `ty name[restrict static len]`
    RestrictStatic(Expr),
    /// `ty name[]`
    Unsized,
}

/// A file-scope object
#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub storage: Storage,
    pub ty: CType,
    pub name: String,
    pub declarator: Declarator,
    pub init: Option<Initializer>,
}

/// Initializers for globals
#[derive(Debug, Clone, PartialEq)]
pub enum Initializer {
    Expr(Expr),
    /// Brace list with designators: `{ .a = 1, [x] = { .. } }`
    List(Vec<(Designator, Initializer)>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Designator {
    /// `.field`
    Field(String),
    /// `[index]`
    Index(Expr),
}

/// A function parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: CType,
    pub name: String,
    pub declarator: Declarator,
}

impl Param {
    pub fn new(ty: CType, name: impl Into<String>) -> Self {
        Self {
            ty,
            name: name.into(),
            declarator: Declarator::Plain,
        }
    }

    /// `ty name[restrict static len]`
    pub fn restrict_static(ty: CType, name: impl Into<String>, len: Expr) -> Self {
        Self {
            ty,
            name: name.into(),
            declarator: Declarator::RestrictStatic(len),
        }
    }
}

/// A function definition, or a prototype when `body` is `None`
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub storage: Storage,
    pub ret: CType,
    pub name: String,
    pub params: Vec<Param>,
    pub body: Option<Vec<Stmt>>,
}

impl Function {
    pub fn new(name: impl Into<String>, params: Vec<Param>, ret: CType) -> Self {
        Self {
            storage: Storage::None,
            ret,
            name: name.into(),
            params,
            body: None,
        }
    }

    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_body(mut self, body: Vec<Stmt>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn is_prototype(&self) -> bool {
        self.body.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacroCall {
    pub name: String,
    pub args: Vec<Expr>,
}
