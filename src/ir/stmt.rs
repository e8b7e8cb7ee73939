//! IR Statements and Expressions
//!
//! The statement-level subset of C used inside generated function bodies.

use super::item::FnPtrTypedef;
use super::types::{CType, IntWidth};

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    Ne,
    Lt,
    Gt,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
        }
    }
}

/// An expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Variable, function or enumeration constant
    Ident(String),
    /// Plain integer literal
    Int(i64),
    /// Width-suffixed unsigned literal: `UINT64_C(64)`
    UintConst { value: u64, width: IntWidth },
    /// String literal; the printer escapes it
    Str(String),
    /// Direct call: `f(a, b)`
    Call { func: String, args: Vec<Expr> },
    /// Member access through a pointer: `base->field`
    Arrow { base: Box<Expr>, field: String },
    /// Address-of: `&expr`
    AddrOf(Box<Expr>),
    /// Cast: `(ty) expr`
    Cast { ty: CType, expr: Box<Expr> },
    /// Binary operation
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
    /// Logical negation: `!expr`
    Not(Box<Expr>),
    /// `sizeof(ty)`
    SizeOf(CType),
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    pub fn str(value: impl Into<String>) -> Self {
        Expr::Str(value.into())
    }

    pub fn call(func: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            func: func.into(),
            args,
        }
    }

    pub fn arrow(base: Expr, field: impl Into<String>) -> Self {
        Expr::Arrow {
            base: Box::new(base),
            field: field.into(),
        }
    }

    pub fn addr_of(expr: Expr) -> Self {
        Expr::AddrOf(Box::new(expr))
    }

    pub fn cast(ty: CType, expr: Expr) -> Self {
        Expr::Cast {
            ty,
            expr: Box::new(expr),
        }
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn not(expr: Expr) -> Self {
        Expr::Not(Box::new(expr))
    }
}

/// One `case` of a switch statement
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub value: Expr,
    pub body: Vec<Stmt>,
}

/// A statement
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Expression statement: `f(x);`
    Expr(Expr),
    /// Local declaration: `ty name = init;`
    Decl {
        ty: CType,
        name: String,
        init: Option<Expr>,
    },
    /// Local function-pointer typedef
    Typedef(FnPtrTypedef),
    /// `if (cond) { .. } else { .. }`; an else body holding a single `if`
    /// prints as `else if`
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Option<Vec<Stmt>>,
    },
    /// `switch (scrutinee) { case ..: .. }` without a default label
    Switch {
        scrutinee: Expr,
        cases: Vec<SwitchCase>,
    },
    Return(Option<Expr>),
    Break,
}

impl Stmt {
    pub fn if_then(cond: Expr, then_body: Vec<Stmt>) -> Self {
        Stmt::If {
            cond,
            then_body,
            else_body: None,
        }
    }
}
