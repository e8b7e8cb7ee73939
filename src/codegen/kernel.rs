//! Per-kernel compiler
//!
//! Emits the kernel header (parameter and argument structs, call trampoline,
//! prototypes) and the kernel source (defaults, parameter parser, profiling
//! function).

use super::dispatch::DispatchPlan;
use super::{sized_string_params, KernelSymbols, KernelUnits};
use crate::config::Config;
use crate::ir::{
    BinOp, CType, Declarator, Designator, Expr, FnPtrTypedef, Function, Initializer, IntWidth,
    Param, Stmt, Storage, UnitBuilder,
};
use crate::spec::{ArgType, Kernel, Parameter, ScalarType};
use tracing::debug;

/// Compile one kernel into its header/source pair
pub fn compile(kernel: &Kernel, config: &Config) -> KernelUnits {
    debug!(
        kernel = %kernel.full_name(),
        parameters = kernel.parameters.len(),
        arguments = kernel.arguments.len(),
        "compiling kernel"
    );
    let symbols = KernelSymbols::new(kernel.prefix());
    let header_path = kernel.header_path_in(&config.header_root);

    KernelUnits {
        header: build_header(kernel, &symbols, &header_path),
        source: build_source(kernel, &symbols, &header_path, config),
    }
}

pub(super) fn scalar_ctype(ty: ScalarType) -> CType {
    CType::Uint(scalar_width(ty))
}

fn scalar_width(ty: ScalarType) -> IntWidth {
    match ty {
        ScalarType::Uint32 => IntWidth::W32,
        ScalarType::Uint64 => IntWidth::W64,
    }
}

pub(super) fn argument_ctype(ty: ArgType) -> CType {
    match ty {
        ArgType::Size => CType::Size,
        ArgType::Int8 => CType::Sint(IntWidth::W8),
        ArgType::Int16 => CType::Sint(IntWidth::W16),
        ArgType::Int32 => CType::Sint(IntWidth::W32),
        ArgType::Int64 => CType::Sint(IntWidth::W64),
        ArgType::Uint8 => CType::Uint(IntWidth::W8),
        ArgType::Uint16 => CType::Uint(IntWidth::W16),
        ArgType::Uint32 => CType::Uint(IntWidth::W32),
        ArgType::Uint64 => CType::Uint(IntWidth::W64),
        ArgType::ConstFloatPtr => CType::ptr(CType::constant(CType::Float)),
        ArgType::FloatPtr => CType::ptr(CType::Float),
        ArgType::ConstDoublePtr => CType::ptr(CType::constant(CType::Double)),
        ArgType::DoublePtr => CType::ptr(CType::Double),
    }
}

/// Typed literal for a parameter value: `UINT64_C(64)`
fn literal(ty: ScalarType, value: u64) -> Expr {
    Expr::UintConst {
        value,
        width: scalar_width(ty),
    }
}

fn build_header(kernel: &Kernel, symbols: &KernelSymbols, header_path: &str) -> crate::ir::TranslationUnit {
    let mut builder = UnitBuilder::new(header_path);
    builder
        .pragma_once()
        .include_system("stddef.h")
        .include_system("stdint.h")
        .struct_def(
            symbols.parameters_struct(),
            kernel
                .parameters
                .iter()
                .map(|p| (scalar_ctype(p.ty), p.name.as_str())),
        )
        .extern_global(
            CType::structure(symbols.parameters_struct()),
            symbols.parameters_default(),
        )
        .struct_def(
            symbols.arguments_struct(),
            kernel
                .arguments
                .iter()
                .map(|a| (argument_ctype(a.ty), a.name.as_str())),
        )
        .function(call_trampoline(kernel, symbols));

    for prototype in prototypes(symbols) {
        builder.function(prototype);
    }
    builder.finish()
}

/// `static inline void <prefix>_call(void* function, arguments)`
///
/// Converts the opaque function pointer to the native signature and calls it
/// with the argument fields in declared order. Kernels return `float`; the
/// result is discarded.
fn call_trampoline(kernel: &Kernel, symbols: &KernelSymbols) -> Function {
    let function_type = format!("{}_function", kernel.name);
    let native = FnPtrTypedef {
        name: function_type.clone(),
        ret: CType::Float,
        params: kernel.arguments.iter().map(|a| argument_ctype(a.ty)).collect(),
    };
    let args = kernel
        .arguments
        .iter()
        .map(|a| Expr::arrow(Expr::ident("arguments"), a.name.as_str()))
        .collect();

    Function::new(
        symbols.call(),
        vec![
            Param::new(CType::void_ptr(), "function"),
            symbols.arguments_param(true),
        ],
        CType::Void,
    )
    .with_storage(Storage::StaticInline)
    .with_body(vec![
        Stmt::Typedef(native),
        Stmt::Decl {
            ty: CType::named(function_type.clone()),
            name: "kernel".to_string(),
            init: Some(Expr::cast(CType::named(function_type), Expr::ident("function"))),
        },
        Stmt::Expr(Expr::call("kernel", args)),
    ])
}

fn prototypes(symbols: &KernelSymbols) -> Vec<Function> {
    let [name_size, name] = sized_string_params("name");
    let [value_size, value] = sized_string_params("value");
    vec![
        Function::new(
            symbols.profile(),
            vec![
                Param::new(CType::void_ptr(), "function"),
                symbols.arguments_param(true),
                Param::new(CType::Int, "perf_counter_fd"),
                Param::new(CType::Size, "max_iterations"),
            ],
            CType::UnsignedLongLong,
        ),
        parse_parameter_signature(symbols, [name_size, name, value_size, value]),
        Function::new(
            symbols.create_arguments(),
            vec![symbols.arguments_param(false), symbols.parameters_param(true)],
            CType::Void,
        ),
        Function::new(
            symbols.free_arguments(),
            vec![symbols.arguments_param(false), symbols.parameters_param(true)],
            CType::Void,
        ),
    ]
}

fn parse_parameter_signature(symbols: &KernelSymbols, strings: [Param; 4]) -> Function {
    let mut params = vec![symbols.parameters_param(false)];
    params.extend(strings);
    Function::new(symbols.parse_parameter(), params, CType::Void)
}

fn build_source(
    kernel: &Kernel,
    symbols: &KernelSymbols,
    header_path: &str,
    config: &Config,
) -> crate::ir::TranslationUnit {
    let source_name = header_path.trim_end_matches(".h").to_string() + ".c";
    let mut builder = UnitBuilder::new(source_name);
    builder.include_system("string.h");
    for header in &config.runtime_headers {
        builder.include_project(header.as_str());
    }
    builder.include_project(header_path);

    let defaults = kernel
        .parameters
        .iter()
        .map(|p| {
            (
                Designator::Field(p.name.clone()),
                Initializer::Expr(literal(p.ty, p.default)),
            )
        })
        .collect();
    builder
        .define_global(
            CType::structure(symbols.parameters_struct()),
            symbols.parameters_default(),
            Declarator::Plain,
            Initializer::List(defaults),
        )
        .function(parse_parameter(kernel, symbols, &config.fatal_function))
        .macro_call(
            "DEFINE_PROFILE_FUNCTION",
            vec![Expr::ident(symbols.prefix.as_str())],
        );
    builder.finish()
}

/// `<fatal>(message, (int) <n>_size, <n>)`
pub(super) fn fatal(function: &str, message: String, string: &str) -> Stmt {
    Stmt::Expr(Expr::call(
        function,
        vec![
            Expr::str(message),
            Expr::cast(CType::Int, Expr::ident(format!("{}_size", string))),
            Expr::ident(string),
        ],
    ))
}

/// Parameter parser: dispatch on the parameter name, parse and bound-check
/// the value, and treat an unknown name as fatal
fn parse_parameter(kernel: &Kernel, symbols: &KernelSymbols, fatal_function: &str) -> Function {
    let full_name = kernel.full_name();
    let plan = DispatchPlan::new(kernel.parameters.iter().map(|p| p.name.as_str()));
    let dispatch = plan.lower("name_size", "name", |index| {
        parameter_arm(&kernel.parameters[index], &full_name, fatal_function)
    });
    let unknown = fatal(
        fatal_function,
        format!("invalid parameter %.*s for {}\n", full_name),
        "name",
    );

    let [name_size, name] = sized_string_params("name");
    let [value_size, value] = sized_string_params("value");
    parse_parameter_signature(symbols, [name_size, name, value_size, value])
        .with_body(vec![dispatch, unknown])
}

fn parameter_arm(parameter: &Parameter, full_name: &str, fatal_function: &str) -> Vec<Stmt> {
    let field = || Expr::arrow(Expr::ident("parameters"), parameter.name.as_str());
    let invalid = || {
        fatal(
            fatal_function,
            format!(
                "invalid value %.*s for parameter {} in {}\n",
                parameter.name, full_name
            ),
            "value",
        )
    };

    let parsed = Expr::call(
        parameter.ty.parse_function(),
        vec![
            Expr::ident("value_size"),
            Expr::ident("value"),
            Expr::addr_of(field()),
        ],
    );
    let mut body = vec![Stmt::if_then(Expr::not(parsed), vec![invalid()])];

    if let Some(min) = parameter.min {
        body.push(Stmt::if_then(
            Expr::binary(BinOp::Lt, field(), literal(parameter.ty, min)),
            vec![invalid()],
        ));
    }
    if let Some(max) = parameter.max {
        body.push(Stmt::if_then(
            Expr::binary(BinOp::Gt, field(), literal(parameter.ty, max)),
            vec![invalid()],
        ));
    }
    body.push(Stmt::Return(None));
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Machine, Outcome, Value};
    use crate::spec::{parse_kernel, Argument};

    const DGEMM: &str = r#"<?xml version="1.0"?>
<kernel name="dgemm" namespace="blas">
    <query>
        <parameter name="size" type="uint64" default="64" min="1" max="4096"/>
    </query>
    <call>
        <argument name="n" type="size_t"/>
    </call>
</kernel>
"#;

    fn dgemm() -> Kernel {
        parse_kernel(DGEMM).unwrap()
    }

    fn parse_param(machine: &mut Machine, name: &str, value: &str) -> (Outcome, Value) {
        let params = machine.instantiate("blas_dgemm_parameters_default").unwrap();
        let outcome = machine
            .call(
                "blas_dgemm_parse_parameter",
                vec![
                    Value::Record(params),
                    Value::Int(name.len() as i128),
                    Value::bytes(name),
                    Value::Int(value.len() as i128),
                    Value::bytes(value),
                ],
            )
            .unwrap();
        let size = machine.field(params, "size").unwrap().clone();
        (outcome, size)
    }

    #[test]
    fn test_header_text() {
        let units = compile(&dgemm(), &Config::default());
        let header = units.render().header;
        assert_eq!(
            header,
            r#"#pragma once

#include <stddef.h>
#include <stdint.h>

struct blas_dgemm_parameters {
    uint64_t size;
};

extern struct blas_dgemm_parameters blas_dgemm_parameters_default;

struct blas_dgemm_arguments {
    size_t n;
};

static inline void blas_dgemm_call(
    void* function,
    const struct blas_dgemm_arguments arguments[restrict static 1]) {
    typedef float (*dgemm_function)(size_t);
    dgemm_function kernel = (dgemm_function) function;
    kernel(arguments->n);
}

unsigned long long blas_dgemm_profile(
    void* function,
    const struct blas_dgemm_arguments arguments[restrict static 1],
    int perf_counter_fd,
    size_t max_iterations);
void blas_dgemm_parse_parameter(
    struct blas_dgemm_parameters parameters[restrict static 1],
    size_t name_size,
    const char name[restrict static name_size],
    size_t value_size,
    const char value[restrict static value_size]);
void blas_dgemm_create_arguments(
    struct blas_dgemm_arguments arguments[restrict static 1],
    const struct blas_dgemm_parameters parameters[restrict static 1]);
void blas_dgemm_free_arguments(
    struct blas_dgemm_arguments arguments[restrict static 1],
    const struct blas_dgemm_parameters parameters[restrict static 1]);
"#
        );
    }

    #[test]
    fn test_source_text() {
        let units = compile(&dgemm(), &Config::default());
        let source = units.render().source;
        assert!(source.starts_with(
            "#include <string.h>\n\
             \n\
             #include <webserver/parse.h>\n\
             #include <webserver/logs.h>\n\
             #include <runner/benchmark.h>\n\
             #include <kernels/blas/dgemm-gen.h>\n\
             \n\
             struct blas_dgemm_parameters blas_dgemm_parameters_default = {\n    .size = UINT64_C(64),\n};\n"
        ));
        assert!(source.contains("if (!parse_uint64(value_size, value, &parameters->size)) {"));
        assert!(source.contains("if (parameters->size < UINT64_C(1)) {"));
        assert!(source.contains("if (parameters->size > UINT64_C(4096)) {"));
        assert!(source.contains(
            r#"log_fatal("invalid parameter %.*s for blas::dgemm\n", (int) name_size, name);"#
        ));
        assert!(source.ends_with("}\n\nDEFINE_PROFILE_FUNCTION(blas_dgemm)\n"));
    }

    #[test]
    fn test_parser_accepts_in_range_value() {
        let units = compile(&dgemm(), &Config::default());
        let mut machine = Machine::new(&[&units.header, &units.source]);
        let (outcome, size) = parse_param(&mut machine, "size", "128");
        assert_eq!(outcome, Outcome::Returned(Value::Unit));
        assert_eq!(size, Value::Int(128));

        let (outcome, size) = parse_param(&mut machine, "size", "4096");
        assert!(!outcome.is_fatal());
        assert_eq!(size, Value::Int(4096));
    }

    #[test]
    fn test_parser_rejects_out_of_range_values() {
        let units = compile(&dgemm(), &Config::default());
        let mut machine = Machine::new(&[&units.header, &units.source]);
        for value in ["0", "5000"] {
            let (outcome, _) = parse_param(&mut machine, "size", value);
            assert_eq!(
                outcome,
                Outcome::Fatal(format!("invalid value {} for parameter size in blas::dgemm", value))
            );
        }
        let (outcome, size) = parse_param(&mut machine, "size", "twelve");
        assert!(outcome.is_fatal());
        assert_eq!(size, Value::Int(64));
    }

    #[test]
    fn test_parser_rejects_unknown_names() {
        let units = compile(&dgemm(), &Config::default());
        let mut machine = Machine::new(&[&units.header, &units.source]);
        for name in ["sizf", "n", "SIZE", "sizes", ""] {
            let (outcome, _) = parse_param(&mut machine, name, "1");
            assert_eq!(
                outcome,
                Outcome::Fatal(format!("invalid parameter {} for blas::dgemm", name))
            );
        }
    }

    #[test]
    fn test_unbounded_parameters_skip_checks() {
        let mut kernel = Kernel::new("playground", None);
        kernel.parameters.push(Parameter::new("mr", ScalarType::Uint32, 4));
        kernel.parameters.push(Parameter::new("nr", ScalarType::Uint32, 8).with_min(2));
        let units = compile(&kernel, &Config::default());
        let source = units.render().source;
        assert!(!source.contains("parameters->mr <"));
        assert!(!source.contains("parameters->mr >"));
        assert!(source.contains("if (parameters->nr < UINT32_C(2)) {"));
        assert!(!source.contains("parameters->nr >"));
        assert!(source.contains("} else if (memcmp(name, \"nr\", 2) == 0) {"));

        let mut machine = Machine::new(&[&units.header, &units.source]);
        let params = machine.instantiate("playground_parameters_default").unwrap();
        let outcome = machine
            .call(
                "playground_parse_parameter",
                vec![
                    Value::Record(params),
                    Value::Int(2),
                    Value::bytes("nr"),
                    Value::Int(2),
                    Value::bytes("16"),
                ],
            )
            .unwrap();
        assert!(!outcome.is_fatal());
        assert_eq!(machine.field(params, "nr").unwrap(), &Value::Int(16));
        assert_eq!(machine.field(params, "mr").unwrap(), &Value::Int(4));
    }

    #[test]
    fn test_trampoline_passes_arguments_in_order() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut kernel = Kernel::new("sdot", Some("blis".to_string()));
        kernel.arguments.push(Argument::new("n", ArgType::Size));
        kernel.arguments.push(Argument::new("x", ArgType::ConstFloatPtr));
        kernel.arguments.push(Argument::new("y", ArgType::ConstFloatPtr));
        let units = compile(&kernel, &Config::default());
        assert!(units
            .render()
            .header
            .contains("typedef float (*sdot_function)(size_t, const float*, const float*);"));

        let mut machine = Machine::new(&[&units.header, &units.source]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        machine.define_native("blis_sdot", move |args| {
            log.borrow_mut().extend_from_slice(args);
            Value::Unit
        });
        let args = machine.alloc_record("blis_sdot_arguments").unwrap();
        machine.set_field(args, "n", Value::Int(3)).unwrap();
        machine.set_field(args, "x", Value::Int(100)).unwrap();
        machine.set_field(args, "y", Value::Int(200)).unwrap();
        let outcome = machine
            .call(
                "blis_sdot_call",
                vec![Value::Function("blis_sdot".to_string()), Value::Record(args)],
            )
            .unwrap();
        assert_eq!(outcome, Outcome::Returned(Value::Unit));
        assert_eq!(*seen.borrow(), vec![Value::Int(3), Value::Int(100), Value::Int(200)]);
    }

    #[test]
    fn test_custom_config() {
        let config = Config {
            header_root: "gen".to_string(),
            fatal_function: "die".to_string(),
            runtime_headers: vec!["rt.h".to_string()],
            ..Config::default()
        };
        let units = compile(&dgemm(), &config);
        let source = units.render().source;
        assert!(source.starts_with("#include <string.h>\n\n#include <rt.h>\n#include <gen/blas/dgemm-gen.h>\n"));
        assert!(source.contains("die(\"invalid parameter"));

        let mut machine = Machine::new(&[&units.header, &units.source]).with_fatal_function("die");
        let (outcome, _) = parse_param(&mut machine, "size", "0");
        assert!(outcome.is_fatal());
    }
}
