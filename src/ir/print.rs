//! IR Printer
//!
//! Renders translation units as C text. This is the only place that knows
//! about layout: indentation, blank lines and line wrapping.

use super::item::{
    Declarator, EnumDef, FnPtrTypedef, Function, Global, Include, IncludeKind, Initializer, Designator, Item,
    MacroCall, Param, StructDef, TranslationUnit,
};
use super::stmt::{Expr, Stmt};
use super::types::{CType, IntWidth};
use std::fmt;

const INDENT: &str = "    ";

/// Signatures longer than this put one parameter per line
const MAX_SIGNATURE_WIDTH: usize = 110;

/// Render a translation unit as C source text
pub fn print_unit(unit: &TranslationUnit) -> String {
    let mut printer = Printer::default();
    printer.unit(unit);
    printer.out
}

impl fmt::Display for TranslationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&print_unit(self))
    }
}

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
}

/// Items that sit on consecutive lines when adjacent to each other
#[derive(PartialEq)]
enum Group {
    Include(IncludeKind),
    Typedef,
    Prototype,
    Other,
}

fn group(item: &Item) -> Group {
    match item {
        Item::Include(include) => Group::Include(include.kind),
        Item::Typedef(_) => Group::Typedef,
        Item::Function(func) if func.is_prototype() => Group::Prototype,
        _ => Group::Other,
    }
}

impl Printer {
    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn unit(&mut self, unit: &TranslationUnit) {
        let mut previous: Option<Group> = None;
        for item in &unit.items {
            let current = group(item);
            if let Some(prev) = previous {
                if prev == Group::Other || prev != current {
                    self.blank();
                }
            }
            self.item(item);
            previous = Some(current);
        }
    }

    fn item(&mut self, item: &Item) {
        match item {
            Item::Pragma(text) => self.line(&format!("#pragma {}", text)),
            Item::Include(include) => self.include(include),
            Item::Struct(def) => self.struct_def(def),
            Item::Enum(def) => self.enum_def(def),
            Item::Typedef(def) => self.line(&format!("{};", typedef(def))),
            Item::Global(global) => self.global(global),
            Item::Function(func) => self.function(func),
            Item::MacroCall(call) => self.line(&macro_call(call)),
        }
    }

    fn include(&mut self, include: &Include) {
        self.line(&format!("#include <{}>", include.path));
    }

    fn struct_def(&mut self, def: &StructDef) {
        self.line(&format!("struct {} {{", def.name));
        self.indent += 1;
        for field in &def.fields {
            self.line(&format!("{};", declaration(&field.ty, &field.name, &Declarator::Plain)));
        }
        self.indent -= 1;
        self.line("};");
    }

    fn enum_def(&mut self, def: &EnumDef) {
        self.line(&format!("enum {} {{", def.name));
        self.indent += 1;
        for variant in &def.variants {
            match variant.value {
                Some(value) => self.line(&format!("{} = {},", variant.name, value)),
                None => self.line(&format!("{},", variant.name)),
            }
        }
        self.indent -= 1;
        self.line("};");
    }

    fn global(&mut self, global: &Global) {
        let mut head = String::new();
        if let Some(keyword) = global.storage.keyword() {
            head.push_str(keyword);
            head.push(' ');
        }
        head.push_str(&declaration(&global.ty, &global.name, &global.declarator));

        match &global.init {
            None => self.line(&format!("{};", head)),
            Some(Initializer::Expr(expr)) => self.line(&format!("{} = {};", head, expr)),
            Some(Initializer::List(entries)) if entries.is_empty() => {
                self.line(&format!("{} = {{}};", head))
            }
            Some(Initializer::List(entries)) => {
                self.line(&format!("{} = {{", head));
                self.indent += 1;
                self.initializer_entries(entries);
                self.indent -= 1;
                self.line("};");
            }
        }
    }

    fn initializer_entries(&mut self, entries: &[(Designator, Initializer)]) {
        for (designator, init) in entries {
            let designator = match designator {
                Designator::Field(name) => format!(".{}", name),
                Designator::Index(expr) => format!("[{}]", expr),
            };
            match init {
                Initializer::Expr(expr) => self.line(&format!("{} = {},", designator, expr)),
                Initializer::List(inner) if inner.is_empty() => {
                    self.line(&format!("{} = {{}},", designator))
                }
                Initializer::List(inner) => {
                    self.line(&format!("{} = {{", designator));
                    self.indent += 1;
                    self.initializer_entries(inner);
                    self.indent -= 1;
                    self.line("},");
                }
            }
        }
    }

    fn function(&mut self, func: &Function) {
        let mut head = String::new();
        if let Some(keyword) = func.storage.keyword() {
            head.push_str(keyword);
            head.push(' ');
        }
        head.push_str(&format!("{} {}(", func.ret, func.name));

        let params: Vec<String> = func.params.iter().map(param).collect();
        let suffix = if func.is_prototype() { ");" } else { ") {" };
        let single = format!("{}{}{}", head, params.join(", "), suffix);

        if params.is_empty() {
            self.line(&format!("{}void{}", head, suffix));
        } else if single.len() <= MAX_SIGNATURE_WIDTH {
            self.line(&single);
        } else {
            self.line(&head);
            self.indent += 1;
            let last = params.len() - 1;
            for (i, text) in params.iter().enumerate() {
                if i == last {
                    self.line(&format!("{}{}", text, suffix));
                } else {
                    self.line(&format!("{},", text));
                }
            }
            self.indent -= 1;
        }

        if let Some(body) = &func.body {
            self.indent += 1;
            self.block(body);
            self.indent -= 1;
            self.line("}");
        }
    }

    fn block(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(expr) => self.line(&format!("{};", expr)),
            Stmt::Decl { ty, name, init } => match init {
                Some(init) => self.line(&format!("{} {} = {};", ty, name, init)),
                None => self.line(&format!("{} {};", ty, name)),
            },
            Stmt::Typedef(def) => self.line(&format!("{};", typedef(def))),
            Stmt::If { .. } => {
                self.if_chain(stmt, "");
                self.line("}");
            }
            Stmt::Switch { scrutinee, cases } => {
                self.line(&format!("switch ({}) {{", scrutinee));
                self.indent += 1;
                for case in cases {
                    self.line(&format!("case {}:", case.value));
                    self.indent += 1;
                    self.block(&case.body);
                    self.indent -= 1;
                }
                self.indent -= 1;
                self.line("}");
            }
            Stmt::Return(None) => self.line("return;"),
            Stmt::Return(Some(expr)) => self.line(&format!("return {};", expr)),
            Stmt::Break => self.line("break;"),
        }
    }

    /// Print an `if` and its `else if` continuations, leaving the final
    /// closing brace to the caller
    fn if_chain(&mut self, stmt: &Stmt, lead: &str) {
        let Stmt::If { cond, then_body, else_body } = stmt else {
            return;
        };
        self.line(&format!("{}if ({}) {{", lead, cond));
        self.indent += 1;
        self.block(then_body);
        self.indent -= 1;

        match else_body.as_deref() {
            None => {}
            Some([nested @ Stmt::If { .. }]) => self.if_chain(nested, "} else "),
            Some(body) => {
                self.line("} else {");
                self.indent += 1;
                self.block(body);
                self.indent -= 1;
            }
        }
    }
}

fn declaration(ty: &CType, name: &str, declarator: &Declarator) -> String {
    match declarator {
        Declarator::Plain => format!("{} {}", ty, name),
        Declarator::RestrictStatic(len) => format!("{} {}[restrict static {}]", ty, name, len),
        Declarator::Unsized => format!("{} {}[]", ty, name),
    }
}

fn param(param: &Param) -> String {
    declaration(&param.ty, &param.name, &param.declarator)
}

fn typedef(def: &FnPtrTypedef) -> String {
    let params = if def.params.is_empty() {
        "void".to_string()
    } else {
        def.params
            .iter()
            .map(|ty| ty.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!("typedef {} (*{})({})", def.ret, def.name, params)
}

fn macro_call(call: &MacroCall) -> String {
    let args: Vec<String> = call.args.iter().map(|arg| arg.to_string()).collect();
    format!("{}({})", call.name, args.join(", "))
}

fn uint_const_macro(width: IntWidth) -> String {
    format!("UINT{}_C", width.bits())
}

/// Escape a string for use inside a C string literal
fn escape_c_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            '\r' => escaped.push_str("\\r"),
            c if c.is_ascii() && !c.is_ascii_control() => escaped.push(c),
            c => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    escaped.push_str(&format!("\\{:03o}", byte));
                }
            }
        }
    }
    escaped
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Ident(name) => write!(f, "{}", name),
            Expr::Int(value) => write!(f, "{}", value),
            Expr::UintConst { value, width } => write!(f, "{}({})", uint_const_macro(*width), value),
            Expr::Str(value) => write!(f, "\"{}\"", escape_c_string(value)),
            Expr::Call { func, args } => {
                write!(f, "{}(", func)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::Arrow { base, field } => write!(f, "{}->{}", base, field),
            Expr::AddrOf(expr) => write!(f, "&{}", expr),
            Expr::Cast { ty, expr } => write!(f, "({}) {}", ty, expr),
            Expr::Binary { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op.symbol(), rhs),
            Expr::Not(expr) => match expr.as_ref() {
                Expr::Binary { .. } | Expr::Cast { .. } => write!(f, "!({})", expr),
                _ => write!(f, "!{}", expr),
            },
            Expr::SizeOf(ty) => write!(f, "sizeof({})", ty),
        }
    }
}
