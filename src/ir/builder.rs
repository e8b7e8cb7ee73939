//! IR Builder
//!
//! Helper for assembling translation units item by item.

use super::item::{
    Declarator, Field, FnPtrTypedef, Function, Global, Include, IncludeKind, Initializer, Item, MacroCall,
    Storage, StructDef, TranslationUnit,
};
use super::item::{EnumDef, Enumerator};
use super::stmt::Expr;
use super::types::CType;

/// Builder for constructing translation units
pub struct UnitBuilder {
    /// Unit being built
    unit: TranslationUnit,
}

impl UnitBuilder {
    /// Create a new builder for a unit labelled `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            unit: TranslationUnit::new(name),
        }
    }

    /// Finish building and return the unit
    pub fn finish(self) -> TranslationUnit {
        self.unit
    }

    pub fn item(&mut self, item: Item) -> &mut Self {
        self.unit.push(item);
        self
    }

    // ============ Preprocessor ============

    pub fn pragma_once(&mut self) -> &mut Self {
        self.item(Item::Pragma("once".to_string()))
    }

    /// `#include <path>` for a C library header
    pub fn include_system(&mut self, path: impl Into<String>) -> &mut Self {
        self.include(path, IncludeKind::Standard)
    }

    /// `#include <path>` for project headers resolved through the include
    /// path, matching how the runtime includes its own headers
    pub fn include_project(&mut self, path: impl Into<String>) -> &mut Self {
        self.include(path, IncludeKind::Project)
    }

    fn include(&mut self, path: impl Into<String>, kind: IncludeKind) -> &mut Self {
        self.item(Item::Include(Include {
            path: path.into(),
            kind,
        }))
    }

    pub fn macro_call(&mut self, name: impl Into<String>, args: Vec<Expr>) -> &mut Self {
        self.item(Item::MacroCall(MacroCall {
            name: name.into(),
            args,
        }))
    }

    // ============ Types ============

    /// `struct name { ty field; ... };`
    pub fn struct_def<I, S>(&mut self, name: impl Into<String>, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = (CType, S)>,
        S: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|(ty, name)| Field {
                ty,
                name: name.into(),
            })
            .collect();
        self.item(Item::Struct(StructDef {
            name: name.into(),
            fields,
        }))
    }

    /// `enum name { first = 0, rest... };`
    pub fn enum_def<I, S>(&mut self, name: impl Into<String>, first: impl Into<String>, rest: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut variants = vec![Enumerator {
            name: first.into(),
            value: Some(0),
        }];
        variants.extend(rest.into_iter().map(|name| Enumerator {
            name: name.into(),
            value: None,
        }));
        self.item(Item::Enum(EnumDef {
            name: name.into(),
            variants,
        }))
    }

    pub fn typedef(&mut self, def: FnPtrTypedef) -> &mut Self {
        self.item(Item::Typedef(def))
    }

    // ============ Objects ============

    /// `extern ty name;`
    pub fn extern_global(&mut self, ty: CType, name: impl Into<String>) -> &mut Self {
        self.item(Item::Global(Global {
            storage: Storage::Extern,
            ty,
            name: name.into(),
            declarator: Declarator::Plain,
            init: None,
        }))
    }

    /// `extern ty name[];`
    pub fn extern_array(&mut self, ty: CType, name: impl Into<String>) -> &mut Self {
        self.item(Item::Global(Global {
            storage: Storage::Extern,
            ty,
            name: name.into(),
            declarator: Declarator::Unsized,
            init: None,
        }))
    }

    /// `ty name = init;` or `ty name[] = init;`
    pub fn define_global(&mut self, ty: CType, name: impl Into<String>, declarator: Declarator, init: Initializer) -> &mut Self {
        self.item(Item::Global(Global {
            storage: Storage::None,
            ty,
            name: name.into(),
            declarator,
            init: Some(init),
        }))
    }

    // ============ Functions ============

    pub fn function(&mut self, func: Function) -> &mut Self {
        self.item(Item::Function(func))
    }

    /// Prototype of a function definition
    pub fn prototype(&mut self, func: &Function) -> &mut Self {
        let mut proto = func.clone();
        proto.body = None;
        self.function(proto)
    }
}
