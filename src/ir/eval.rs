//! IR Evaluator
//!
//! A small interpreter for the statement subset the generators emit. It runs
//! generated functions directly on the IR, with the runtime externals the glue
//! links against (`memcmp`, `parse_uint32`, `parse_uint64` and the fatal
//! logging function) modelled in Rust.

use super::item::{Designator, Function, Initializer, TranslationUnit};
use super::stmt::{BinOp, Expr, Stmt};
use super::types::{CType, IntWidth};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

/// Default name of the fatal logging function
pub const DEFAULT_FATAL_FUNCTION: &str = "log_fatal";

/// Handle to a struct instance owned by the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(usize);

/// Runtime values
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Result of a `void` call
    Unit,
    Int(i128),
    /// Character data (string literals and `const char*` buffers)
    Bytes(Vec<u8>),
    /// Pointer to a struct instance
    Record(RecordId),
    /// Pointer to a struct field: `&record->field`
    Field(RecordId, String),
    /// Pointer to a function, by symbol name
    Function(String),
}

impl Value {
    pub fn bytes(text: &str) -> Self {
        Value::Bytes(text.as_bytes().to_vec())
    }

    pub fn as_int(&self) -> Option<i128> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "void"),
            Value::Int(value) => write!(f, "{}", value),
            Value::Bytes(bytes) => write!(f, "{:?}", String::from_utf8_lossy(bytes)),
            Value::Record(id) => write!(f, "&record#{}", id.0),
            Value::Field(id, field) => write!(f, "&record#{}->{}", id.0, field),
            Value::Function(name) => write!(f, "{}", name),
        }
    }
}

/// How a call finished
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Returned(Value),
    /// The fatal function was invoked; holds the formatted message without
    /// its trailing newline
    Fatal(String),
}

impl Outcome {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Outcome::Fatal(_))
    }
}

/// Evaluation failures (the IR does something the machine cannot model)
#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    #[error("unknown identifier `{0}`")]
    UnknownIdentifier(String),

    #[error("unknown struct `{0}`")]
    UnknownStruct(String),

    #[error("unknown global `{0}`")]
    UnknownGlobal(String),

    #[error("struct has no field `{0}`")]
    UnknownField(String),

    #[error("`{function}` expects {expected} arguments, got {found}")]
    Arity {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: String },

    #[error("read of {len} bytes from a buffer of {available}")]
    OutOfBounds { len: usize, available: usize },

    #[error("unsupported construct: {0}")]
    Unsupported(String),
}

pub type EvalResult<T> = Result<T, EvalError>;

type Native = Box<dyn Fn(&[Value]) -> Value>;

/// Non-local exits while evaluating
enum Stop {
    Fatal(String),
    Error(EvalError),
}

impl From<EvalError> for Stop {
    fn from(err: EvalError) -> Self {
        Stop::Error(err)
    }
}

enum Flow {
    Normal,
    Break,
    Return(Value),
}

#[derive(Debug)]
struct Record {
    ty: String,
    fields: BTreeMap<String, Value>,
}

/// Interpreter over a set of translation units
pub struct Machine<'a> {
    units: Vec<&'a TranslationUnit>,
    fatal_function: String,
    records: Vec<Record>,
    natives: HashMap<String, Native>,
}

impl<'a> Machine<'a> {
    pub fn new(units: &[&'a TranslationUnit]) -> Self {
        Self {
            units: units.to_vec(),
            fatal_function: DEFAULT_FATAL_FUNCTION.to_string(),
            records: Vec::new(),
            natives: HashMap::new(),
        }
    }

    pub fn with_fatal_function(mut self, name: impl Into<String>) -> Self {
        self.fatal_function = name.into();
        self
    }

    /// Provide a Rust implementation for a symbol the units only reference
    pub fn define_native(&mut self, name: impl Into<String>, native: impl Fn(&[Value]) -> Value + 'static) {
        self.natives.insert(name.into(), Box::new(native));
    }

    /// Allocate a zero-initialized instance of `struct name`
    pub fn alloc_record(&mut self, name: &str) -> EvalResult<RecordId> {
        let def = self
            .units
            .iter()
            .copied()
            .find_map(|unit| unit.struct_def(name))
            .ok_or_else(|| EvalError::UnknownStruct(name.to_string()))?;
        let fields = def
            .fields
            .iter()
            .map(|field| (field.name.clone(), Value::Int(0)))
            .collect();
        self.records.push(Record {
            ty: name.to_string(),
            fields,
        });
        Ok(RecordId(self.records.len() - 1))
    }

    /// Copy a global struct instance (such as `<prefix>_parameters_default`)
    /// into a fresh record
    pub fn instantiate(&mut self, global: &str) -> EvalResult<RecordId> {
        let decl = self
            .units
            .iter()
            .copied()
            .filter_map(|unit| unit.global(global))
            .find(|g| g.init.is_some())
            .ok_or_else(|| EvalError::UnknownGlobal(global.to_string()))?;
        let CType::Struct(ty) = &decl.ty else {
            return Err(EvalError::Unsupported(format!("global `{}` is not a struct", global)));
        };
        let entries = match &decl.init {
            Some(Initializer::List(entries)) => entries.clone(),
            _ => return Err(EvalError::Unsupported(format!("initializer of `{}`", global))),
        };

        let id = self.alloc_record(ty)?;
        for (designator, init) in entries {
            let (Designator::Field(field), Initializer::Expr(expr)) = (designator, init) else {
                return Err(EvalError::Unsupported(format!("initializer of `{}`", global)));
            };
            let value = match self.eval(&expr, &HashMap::new()) {
                Ok(value) => value,
                Err(Stop::Error(err)) => return Err(err),
                Err(Stop::Fatal(_)) => {
                    return Err(EvalError::Unsupported("call in initializer".to_string()))
                }
            };
            self.set_field(id, &field, value)?;
        }
        Ok(id)
    }

    pub fn field(&self, id: RecordId, name: &str) -> EvalResult<&Value> {
        self.record(id)
            .fields
            .get(name)
            .ok_or_else(|| EvalError::UnknownField(name.to_string()))
    }

    pub fn set_field(&mut self, id: RecordId, name: &str, value: Value) -> EvalResult<()> {
        let slot = self
            .records
            .get_mut(id.0)
            .and_then(|record| record.fields.get_mut(name))
            .ok_or_else(|| EvalError::UnknownField(name.to_string()))?;
        *slot = value;
        Ok(())
    }

    /// Struct name of a record
    pub fn record_type(&self, id: RecordId) -> &str {
        &self.record(id).ty
    }

    /// Value of an enumeration constant defined in any unit
    pub fn enum_constant(&self, name: &str) -> Option<i128> {
        self.units
            .iter()
            .flat_map(|unit| unit.enums())
            .find_map(|def| def.value_of(name))
            .map(i128::from)
    }

    /// Call a function defined (with a body) in one of the units
    pub fn call(&mut self, name: &str, args: Vec<Value>) -> EvalResult<Outcome> {
        match self.invoke(name, args) {
            Ok(value) => Ok(Outcome::Returned(value)),
            Err(Stop::Fatal(message)) => Ok(Outcome::Fatal(message)),
            Err(Stop::Error(err)) => Err(err),
        }
    }

    fn record(&self, id: RecordId) -> &Record {
        // ids are only minted by alloc_record
        &self.records[id.0]
    }

    fn find_function(&self, name: &str) -> Option<&'a Function> {
        self.units.iter().copied().find_map(|unit| unit.function(name))
    }

    fn invoke(&mut self, name: &str, args: Vec<Value>) -> Result<Value, Stop> {
        if name == self.fatal_function {
            return Err(Stop::Fatal(format_message(&args)?));
        }
        match name {
            "memcmp" => return Ok(memcmp(&args)?),
            "parse_uint32" => return self.parse_uint(IntWidth::W32, &args),
            "parse_uint64" => return self.parse_uint(IntWidth::W64, &args),
            _ => {}
        }
        if let Some(native) = self.natives.get(name) {
            return Ok(native(&args));
        }

        let func = self
            .find_function(name)
            .ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;
        if func.params.len() != args.len() {
            return Err(EvalError::Arity {
                function: name.to_string(),
                expected: func.params.len(),
                found: args.len(),
            }
            .into());
        }
        let mut env: HashMap<String, Value> = func
            .params
            .iter()
            .map(|param| param.name.clone())
            .zip(args)
            .collect();

        let body = func.body.as_deref().unwrap_or_default();
        match self.exec_block(body, &mut env)? {
            Flow::Return(value) => Ok(value),
            Flow::Normal | Flow::Break => Ok(Value::Unit),
        }
    }

    fn exec_block(&mut self, stmts: &[Stmt], env: &mut HashMap<String, Value>) -> Result<Flow, Stop> {
        for stmt in stmts {
            match self.exec(stmt, env)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt, env: &mut HashMap<String, Value>) -> Result<Flow, Stop> {
        match stmt {
            Stmt::Expr(expr) => {
                self.eval(expr, env)?;
                Ok(Flow::Normal)
            }
            Stmt::Decl { name, init, .. } => {
                let value = match init {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Int(0),
                };
                env.insert(name.clone(), value);
                Ok(Flow::Normal)
            }
            Stmt::Typedef(_) => Ok(Flow::Normal),
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                if truthy(&self.eval(cond, env)?)? {
                    self.exec_block(then_body, env)
                } else if let Some(body) = else_body {
                    self.exec_block(body, env)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::Switch { scrutinee, cases } => {
                let value = self.eval(scrutinee, env)?;
                let mut matched = None;
                for (i, case) in cases.iter().enumerate() {
                    if self.eval(&case.value, env)? == value {
                        matched = Some(i);
                        break;
                    }
                }
                let Some(start) = matched else {
                    return Ok(Flow::Normal);
                };
                // C fallthrough: run every case body from the match until a break
                for case in &cases[start..] {
                    match self.exec_block(&case.body, env)? {
                        Flow::Normal => {}
                        Flow::Break => return Ok(Flow::Normal),
                        flow => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Unit,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Break => Ok(Flow::Break),
        }
    }

    fn eval(&mut self, expr: &Expr, env: &HashMap<String, Value>) -> Result<Value, Stop> {
        match expr {
            Expr::Ident(name) => self.lookup(name, env),
            Expr::Int(value) => Ok(Value::Int(i128::from(*value))),
            Expr::UintConst { value, .. } => Ok(Value::Int(i128::from(*value))),
            Expr::Str(text) => Ok(Value::bytes(text)),
            Expr::Call { func, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, env))
                    .collect::<Result<Vec<_>, _>>()?;
                let target = match env.get(func) {
                    Some(Value::Function(name)) => name.clone(),
                    Some(other) => {
                        return Err(EvalError::TypeMismatch {
                            expected: "function",
                            found: other.to_string(),
                        }
                        .into())
                    }
                    None => func.clone(),
                };
                self.invoke(&target, args)
            }
            Expr::Arrow { base, field } => {
                let id = self.eval_record(base, env)?;
                Ok(self.field(id, field)?.clone())
            }
            Expr::AddrOf(inner) => match inner.as_ref() {
                Expr::Arrow { base, field } => {
                    let id = self.eval_record(base, env)?;
                    self.field(id, field)?;
                    Ok(Value::Field(id, field.clone()))
                }
                Expr::Ident(name) => match self.lookup(name, env)? {
                    function @ Value::Function(_) => Ok(function),
                    other => Err(EvalError::Unsupported(format!("address of {}", other)).into()),
                },
                other => Err(EvalError::Unsupported(format!("address of {:?}", other)).into()),
            },
            Expr::Cast { ty, expr } => {
                let value = self.eval(expr, env)?;
                match (ty, value) {
                    (CType::Int, Value::Int(v)) => Ok(Value::Int(i128::from(v as i32))),
                    (_, value) => Ok(value),
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs, env)?;
                let rhs = self.eval(rhs, env)?;
                let result = match op {
                    BinOp::Eq => lhs == rhs,
                    BinOp::Ne => lhs != rhs,
                    BinOp::Lt => expect_int(&lhs)? < expect_int(&rhs)?,
                    BinOp::Gt => expect_int(&lhs)? > expect_int(&rhs)?,
                };
                Ok(Value::Int(i128::from(result)))
            }
            Expr::Not(inner) => {
                let value = self.eval(inner, env)?;
                Ok(Value::Int(i128::from(!truthy(&value)?)))
            }
            Expr::SizeOf(ty) => Err(EvalError::Unsupported(format!("sizeof({})", ty)).into()),
        }
    }

    fn eval_record(&mut self, expr: &Expr, env: &HashMap<String, Value>) -> Result<RecordId, Stop> {
        match self.eval(expr, env)? {
            Value::Record(id) => Ok(id),
            other => Err(EvalError::TypeMismatch {
                expected: "struct pointer",
                found: other.to_string(),
            }
            .into()),
        }
    }

    fn lookup(&self, name: &str, env: &HashMap<String, Value>) -> Result<Value, Stop> {
        if let Some(value) = env.get(name) {
            return Ok(value.clone());
        }
        if let Some(value) = self.enum_constant(name) {
            return Ok(Value::Int(value));
        }
        if self.find_function(name).is_some() || self.natives.contains_key(name) {
            return Ok(Value::Function(name.to_string()));
        }
        Err(EvalError::UnknownIdentifier(name.to_string()).into())
    }

    /// `bool parse_uintN(size_t size, const char string[size], uintN_t* value)`
    ///
    /// The runtime copies the first `size` bytes into a C string and converts
    /// it with `sscanf("%" SCNuN)`; see [`scan_unsigned`]. The target is left
    /// untouched on failure.
    fn parse_uint(&mut self, width: IntWidth, args: &[Value]) -> Result<Value, Stop> {
        let [size, string, Value::Field(id, field)] = args else {
            return Err(EvalError::Arity {
                function: format!("parse_uint{}", width.bits()),
                expected: 3,
                found: args.len(),
            }
            .into());
        };
        let text = prefix(string, expect_int(size)?)?;
        match scan_unsigned(text, width) {
            Some(value) => {
                self.set_field(*id, field, Value::Int(i128::from(value)))?;
                Ok(Value::Int(1))
            }
            None => Ok(Value::Int(0)),
        }
    }
}

/// Unsigned `scanf` conversion of an `N`-bit integer
///
/// Leading whitespace is skipped, one sign is accepted and conversion stops at
/// the first non-digit, so `" 12"`, `"+12"` and `"12abc"` all yield 12. A
/// minus sign negates modulo 2^N as `strtoul` does. Magnitudes past the width
/// fail; C leaves them undefined.
fn scan_unsigned(text: &[u8], width: IntWidth) -> Option<u64> {
    let start = text
        .iter()
        .position(|b| !matches!(b, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r'))?;
    let text = &text[start..];
    let (negative, digits) = match text.split_first() {
        Some((b'-', rest)) => (true, rest),
        Some((b'+', rest)) => (false, rest),
        _ => (false, text),
    };
    let len = digits.iter().take_while(|b| b.is_ascii_digit()).count();
    if len == 0 {
        return None;
    }
    let magnitude = digits[..len].iter().try_fold(0u64, |acc, b| {
        acc.checked_mul(10)?.checked_add(u64::from(b - b'0'))
    })?;
    let max = width.unsigned_max();
    if magnitude > max {
        return None;
    }
    Some(if negative {
        magnitude.wrapping_neg() & max
    } else {
        magnitude
    })
}

fn expect_int(value: &Value) -> EvalResult<i128> {
    value.as_int().ok_or_else(|| EvalError::TypeMismatch {
        expected: "integer",
        found: value.to_string(),
    })
}

fn truthy(value: &Value) -> EvalResult<bool> {
    Ok(expect_int(value)? != 0)
}

/// First `len` bytes of a character buffer
fn prefix(value: &Value, len: i128) -> EvalResult<&[u8]> {
    let Value::Bytes(bytes) = value else {
        return Err(EvalError::TypeMismatch {
            expected: "character buffer",
            found: value.to_string(),
        });
    };
    let len = usize::try_from(len).map_err(|_| EvalError::OutOfBounds {
        len: 0,
        available: bytes.len(),
    })?;
    bytes.get(..len).ok_or(EvalError::OutOfBounds {
        len,
        available: bytes.len(),
    })
}

/// `int memcmp(const void* a, const void* b, size_t n)`
fn memcmp(args: &[Value]) -> EvalResult<Value> {
    let [a, b, n] = args else {
        return Err(EvalError::Arity {
            function: "memcmp".to_string(),
            expected: 3,
            found: args.len(),
        });
    };
    let n = expect_int(n)?;
    let ordering = prefix(a, n)?.cmp(prefix(b, n)?);
    Ok(Value::Int(ordering as i128))
}

/// printf-style formatting for the fatal function
///
/// Supports `%.*s`, `%s`, `%d`, `%u`, `%zu` and `%%`.
fn format_message(args: &[Value]) -> EvalResult<String> {
    let Some((format, rest)) = args.split_first() else {
        return Err(EvalError::Arity {
            function: "fatal".to_string(),
            expected: 1,
            found: 0,
        });
    };
    let Value::Bytes(format) = format else {
        return Err(EvalError::TypeMismatch {
            expected: "format string",
            found: format.to_string(),
        });
    };
    let format = String::from_utf8_lossy(format);
    let mut rest = rest.iter();
    let mut next = || {
        rest.next().ok_or(EvalError::Arity {
            function: "fatal".to_string(),
            expected: args.len() + 1,
            found: args.len(),
        })
    };

    let mut out = String::new();
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut spec = String::new();
        while let Some(&s) = chars.peek() {
            chars.next();
            spec.push(s);
            if s.is_ascii_alphabetic() && s != 'z' || s == '%' {
                break;
            }
        }
        match spec.as_str() {
            "%" => out.push('%'),
            ".*s" => {
                let len = expect_int(next()?)?;
                let text = prefix(next()?, len)?;
                out.push_str(&String::from_utf8_lossy(text));
            }
            "s" => {
                let value = next()?;
                let Value::Bytes(bytes) = value else {
                    return Err(EvalError::TypeMismatch {
                        expected: "string",
                        found: value.to_string(),
                    });
                };
                out.push_str(&String::from_utf8_lossy(bytes));
            }
            "d" | "u" | "zu" => out.push_str(&expect_int(next()?)?.to_string()),
            other => return Err(EvalError::Unsupported(format!("format `%{}`", other))),
        }
    }
    Ok(out.trim_end_matches('\n').to_string())
}
