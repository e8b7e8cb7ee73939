//! Cross-kernel collector
//!
//! Emits the kernel registry: an enumeration with one constant per kernel
//! (zero is reserved for "no such kernel"), a parser mapping kernel names to
//! constants, and a table of uniform descriptors indexed by constant.
//!
//! Descriptor slots hold generic function-pointer types. Each kernel gets one
//! adapter per slot with exactly the generic signature, so the table never
//! casts between function-pointer types.

use super::dispatch::DispatchPlan;
use super::{sized_string_params, KernelSymbols, RegistryUnits};
use crate::config::Config;
use crate::ir::{
    CType, Declarator, Designator, Expr, FnPtrTypedef, Function, Initializer, Param, Stmt,
    Storage, TranslationUnit, UnitBuilder,
};
use crate::spec::Kernel;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Name of the kernel-name parser
pub const PARSE_KERNEL_NAME: &str = "parse_kernel_name";

/// Name of the descriptor table
pub const SPECIFICATIONS_TABLE: &str = "kernel_specifications";

const SPECIFICATION_STRUCT: &str = "kernel_specification";
const GENERIC_FUNCTION: &str = "generic_function";
const GENERIC_PARSE_PARAMETER: &str = "generic_parse_parameter_function";
const GENERIC_CREATE_ARGUMENTS: &str = "generic_create_arguments_function";
const GENERIC_FREE_ARGUMENTS: &str = "generic_free_arguments_function";
const GENERIC_PROFILE: &str = "generic_profile_function";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CollectError {
    #[error("no kernels to collect")]
    Empty,

    #[error("kernels {first} and {second} share the symbol prefix `{prefix}`")]
    DuplicatePrefix {
        prefix: String,
        first: String,
        second: String,
    },

    #[error("kernels {first} and {second} share the name `{name}`")]
    DuplicateName {
        name: String,
        first: String,
        second: String,
    },
}

/// Collect all kernels into the registry header/source pair
pub fn collect(kernels: &[Kernel], config: &Config) -> Result<RegistryUnits, CollectError> {
    check_unique(kernels)?;
    debug!(kernels = kernels.len(), "collecting kernel registry");

    Ok(RegistryUnits {
        header: build_header(kernels, config),
        source: build_source(kernels, config),
    })
}

/// Reject registries whose generated symbols or dispatch names would collide
fn check_unique(kernels: &[Kernel]) -> Result<(), CollectError> {
    if kernels.is_empty() {
        return Err(CollectError::Empty);
    }
    let mut prefixes: HashMap<String, &Kernel> = HashMap::new();
    let mut names: HashMap<&str, &Kernel> = HashMap::new();
    for kernel in kernels {
        if let Some(first) = prefixes.insert(kernel.prefix(), kernel) {
            return Err(CollectError::DuplicatePrefix {
                prefix: kernel.prefix(),
                first: first.full_name(),
                second: kernel.full_name(),
            });
        }
        if let Some(first) = names.insert(kernel.name.as_str(), kernel) {
            return Err(CollectError::DuplicateName {
                name: kernel.name.clone(),
                first: first.full_name(),
                second: kernel.full_name(),
            });
        }
    }
    Ok(())
}

fn enum_type(config: &Config) -> CType {
    CType::Enum(config.enum_prefix.clone())
}

fn generic_typedefs() -> Vec<FnPtrTypedef> {
    vec![
        FnPtrTypedef {
            name: GENERIC_FUNCTION.to_string(),
            ret: CType::Void,
            params: vec![],
        },
        FnPtrTypedef {
            name: GENERIC_PARSE_PARAMETER.to_string(),
            ret: CType::Void,
            params: vec![
                CType::void_ptr(),
                CType::Size,
                CType::const_char_ptr(),
                CType::Size,
                CType::const_char_ptr(),
            ],
        },
        FnPtrTypedef {
            name: GENERIC_CREATE_ARGUMENTS.to_string(),
            ret: CType::Void,
            params: vec![CType::void_ptr(), CType::const_void_ptr()],
        },
        FnPtrTypedef {
            name: GENERIC_FREE_ARGUMENTS.to_string(),
            ret: CType::Void,
            params: vec![CType::void_ptr(), CType::const_void_ptr()],
        },
        FnPtrTypedef {
            name: GENERIC_PROFILE.to_string(),
            ret: CType::UnsignedLongLong,
            params: vec![
                CType::named(GENERIC_FUNCTION),
                CType::const_void_ptr(),
                CType::Int,
                CType::Size,
            ],
        },
    ]
}

fn parse_kernel_name_signature(config: &Config) -> Function {
    Function::new(
        PARSE_KERNEL_NAME,
        sized_string_params("name").to_vec(),
        enum_type(config),
    )
}

fn build_header(kernels: &[Kernel], config: &Config) -> TranslationUnit {
    let mut builder = UnitBuilder::new(config.registry_header.as_str());
    builder
        .pragma_once()
        .include_system("stddef.h")
        .enum_def(
            config.enum_prefix.as_str(),
            config.invalid_kernel_constant(),
            kernels.iter().map(|k| config.kernel_constant(&k.prefix())),
        )
        .function(parse_kernel_name_signature(config));
    for def in generic_typedefs() {
        builder.typedef(def);
    }

    let descriptor = [
        (CType::const_char_ptr(), "name"),
        (CType::Size, "parameters_size"),
        (CType::Size, "arguments_size"),
        (CType::void_ptr(), "parameters_default"),
        (CType::named(GENERIC_PARSE_PARAMETER), "parse_parameter"),
        (CType::named(GENERIC_CREATE_ARGUMENTS), "create_arguments"),
        (CType::named(GENERIC_FREE_ARGUMENTS), "free_arguments"),
        (CType::named(GENERIC_PROFILE), "profile"),
    ];
    builder
        .struct_def(SPECIFICATION_STRUCT, descriptor)
        .extern_array(
            CType::constant(CType::structure(SPECIFICATION_STRUCT)),
            SPECIFICATIONS_TABLE,
        );
    builder.finish()
}

fn build_source(kernels: &[Kernel], config: &Config) -> TranslationUnit {
    let source_name = config.registry_header.trim_end_matches(".h").to_string() + ".c";
    let mut builder = UnitBuilder::new(source_name);
    builder
        .include_system("string.h")
        .include_system("inttypes.h")
        .include_project(config.registry_header.as_str());
    for kernel in kernels {
        builder.include_project(kernel.header_path_in(&config.header_root));
    }

    for kernel in kernels {
        for adapter in adapters(&KernelSymbols::new(kernel.prefix())) {
            builder.function(adapter);
        }
    }

    builder
        .function(parse_kernel_name(kernels, config))
        .define_global(
            CType::constant(CType::structure(SPECIFICATION_STRUCT)),
            SPECIFICATIONS_TABLE,
            Declarator::Unsized,
            Initializer::List(kernels.iter().map(|k| table_entry(k, config)).collect()),
        );
    builder.finish()
}

/// Name of the adapter for `slot` of the kernel with `symbols`
fn adapter_name(symbols: &KernelSymbols, slot: &str) -> String {
    format!("{}_generic_{}", symbols.prefix, slot)
}

/// One `static` function per descriptor slot, converting the type-erased
/// pointers back to the kernel's own types
fn adapters(symbols: &KernelSymbols) -> Vec<Function> {
    let forward = |target: String, params: &[Param], ret: CType, slot: &str| {
        let args: Vec<Expr> = params.iter().map(|p| Expr::ident(p.name.as_str())).collect();
        let call = Expr::call(target, args);
        let body = if ret == CType::Void {
            vec![Stmt::Expr(call)]
        } else {
            vec![Stmt::Return(Some(call))]
        };
        Function::new(adapter_name(symbols, slot), params.to_vec(), ret)
            .with_storage(Storage::Static)
            .with_body(body)
    };

    let parse_params = [
        Param::new(CType::void_ptr(), "parameters"),
        Param::new(CType::Size, "name_size"),
        Param::new(CType::const_char_ptr(), "name"),
        Param::new(CType::Size, "value_size"),
        Param::new(CType::const_char_ptr(), "value"),
    ];
    let arguments_params = [
        Param::new(CType::void_ptr(), "arguments"),
        Param::new(CType::const_void_ptr(), "parameters"),
    ];

    let profile_params = vec![
        Param::new(CType::named(GENERIC_FUNCTION), "function"),
        Param::new(CType::const_void_ptr(), "arguments"),
        Param::new(CType::Int, "perf_counter_fd"),
        Param::new(CType::Size, "max_iterations"),
    ];
    let profile = Function::new(
        adapter_name(symbols, "profile"),
        profile_params,
        CType::UnsignedLongLong,
    )
    .with_storage(Storage::Static)
    .with_body(vec![Stmt::Return(Some(Expr::call(
        symbols.profile(),
        vec![
            Expr::cast(CType::void_ptr(), Expr::ident("function")),
            Expr::ident("arguments"),
            Expr::ident("perf_counter_fd"),
            Expr::ident("max_iterations"),
        ],
    )))]);

    vec![
        forward(symbols.parse_parameter(), &parse_params, CType::Void, "parse_parameter"),
        forward(symbols.create_arguments(), &arguments_params, CType::Void, "create_arguments"),
        forward(symbols.free_arguments(), &arguments_params, CType::Void, "free_arguments"),
        profile,
    ]
}

/// Kernel-name parser: dispatch on the kernel's name (without namespace);
/// unknown names yield the invalid constant
fn parse_kernel_name(kernels: &[Kernel], config: &Config) -> Function {
    let plan = DispatchPlan::new(kernels.iter().map(|k| k.name.as_str()));
    let dispatch = plan.lower("name_size", "name", |index| {
        vec![Stmt::Return(Some(Expr::ident(
            config.kernel_constant(&kernels[index].prefix()),
        )))]
    });
    parse_kernel_name_signature(config).with_body(vec![
        dispatch,
        Stmt::Return(Some(Expr::ident(config.invalid_kernel_constant()))),
    ])
}

fn table_entry(kernel: &Kernel, config: &Config) -> (Designator, Initializer) {
    let symbols = KernelSymbols::new(kernel.prefix());
    let field = |name: &str, expr: Expr| (Designator::Field(name.to_string()), Initializer::Expr(expr));
    let fields = vec![
        field("name", Expr::str(kernel.name.as_str())),
        field(
            "parameters_size",
            Expr::SizeOf(CType::structure(symbols.parameters_struct())),
        ),
        field(
            "arguments_size",
            Expr::SizeOf(CType::structure(symbols.arguments_struct())),
        ),
        field(
            "parameters_default",
            Expr::addr_of(Expr::ident(symbols.parameters_default())),
        ),
        field(
            "parse_parameter",
            Expr::ident(adapter_name(&symbols, "parse_parameter")),
        ),
        field(
            "create_arguments",
            Expr::ident(adapter_name(&symbols, "create_arguments")),
        ),
        field(
            "free_arguments",
            Expr::ident(adapter_name(&symbols, "free_arguments")),
        ),
        field("profile", Expr::ident(adapter_name(&symbols, "profile"))),
    ];
    (
        Designator::Index(Expr::ident(config.kernel_constant(&kernel.prefix()))),
        Initializer::List(fields),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::compile;
    use crate::ir::{Field, Machine, Outcome, Value};

    /// Fields of the descriptor struct, in declaration order
    fn descriptor_fields(header: &TranslationUnit) -> Vec<&Field> {
        header
            .struct_def(SPECIFICATION_STRUCT)
            .map(|def| def.fields.iter().collect())
            .unwrap_or_default()
    }

    fn kernel(namespace: Option<&str>, name: &str) -> Kernel {
        Kernel::new(name, namespace.map(str::to_string))
    }

    fn resolve(machine: &mut Machine, name: &str) -> i128 {
        let outcome = machine
            .call(
                PARSE_KERNEL_NAME,
                vec![Value::Int(name.len() as i128), Value::bytes(name)],
            )
            .unwrap();
        match outcome {
            Outcome::Returned(Value::Int(value)) => value,
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_rejects_empty_and_duplicates() {
        let config = Config::default();
        assert_eq!(collect(&[], &config), Err(CollectError::Empty));

        let err = collect(&[kernel(Some("blas"), "dgemm"), kernel(Some("blas"), "dgemm")], &config).unwrap_err();
        assert!(matches!(err, CollectError::DuplicatePrefix { ref prefix, .. } if prefix == "blas_dgemm"));

        // `a_b::c` and `a::b_c` both map to prefix `a_b_c`
        let err = collect(&[kernel(Some("a_b"), "c"), kernel(Some("a"), "b_c")], &config).unwrap_err();
        assert!(matches!(err, CollectError::DuplicatePrefix { .. }));

        let err = collect(&[kernel(Some("blas"), "dgemm"), kernel(Some("blis"), "dgemm")], &config).unwrap_err();
        assert_eq!(
            err,
            CollectError::DuplicateName {
                name: "dgemm".to_string(),
                first: "blas::dgemm".to_string(),
                second: "blis::dgemm".to_string(),
            }
        );
    }

    #[test]
    fn test_header_text() {
        let units = collect(&[kernel(Some("blas"), "dgemm"), kernel(None, "playground")], &Config::default()).unwrap();
        assert_eq!(
            units.render().header,
            r#"#pragma once

#include <stddef.h>

enum webrunner_kernel {
    webrunner_kernel_invalid = 0,
    webrunner_kernel_blas_dgemm,
    webrunner_kernel_playground,
};

enum webrunner_kernel parse_kernel_name(size_t name_size, const char name[restrict static name_size]);

typedef void (*generic_function)(void);
typedef void (*generic_parse_parameter_function)(void*, size_t, const char*, size_t, const char*);
typedef void (*generic_create_arguments_function)(void*, const void*);
typedef void (*generic_free_arguments_function)(void*, const void*);
typedef unsigned long long (*generic_profile_function)(generic_function, const void*, int, size_t);

struct kernel_specification {
    const char* name;
    size_t parameters_size;
    size_t arguments_size;
    void* parameters_default;
    generic_parse_parameter_function parse_parameter;
    generic_create_arguments_function create_arguments;
    generic_free_arguments_function free_arguments;
    generic_profile_function profile;
};

extern const struct kernel_specification kernel_specifications[];
"#
        );
    }

    #[test]
    fn test_source_text() {
        let units = collect(&[kernel(Some("blas"), "dgemm")], &Config::default()).unwrap();
        let source = units.render().source;
        assert!(source.starts_with(
            "#include <string.h>\n#include <inttypes.h>\n\n#include <runner/spec.h>\n#include <kernels/blas/dgemm-gen.h>\n\n"
        ));
        assert!(source.contains(
            "static unsigned long long blas_dgemm_generic_profile(\n    \
             generic_function function,\n    \
             const void* arguments,\n    \
             int perf_counter_fd,\n    \
             size_t max_iterations) {\n    \
             return blas_dgemm_profile((void*) function, arguments, perf_counter_fd, max_iterations);\n}\n"
        ));
        assert!(source.contains(
            "static void blas_dgemm_generic_create_arguments(void* arguments, const void* parameters) {\n    \
             blas_dgemm_create_arguments(arguments, parameters);\n}\n"
        ));
        assert!(source.ends_with(
            r#"const struct kernel_specification kernel_specifications[] = {
    [webrunner_kernel_blas_dgemm] = {
        .name = "dgemm",
        .parameters_size = sizeof(struct blas_dgemm_parameters),
        .arguments_size = sizeof(struct blas_dgemm_arguments),
        .parameters_default = &blas_dgemm_parameters_default,
        .parse_parameter = blas_dgemm_generic_parse_parameter,
        .create_arguments = blas_dgemm_generic_create_arguments,
        .free_arguments = blas_dgemm_generic_free_arguments,
        .profile = blas_dgemm_generic_profile,
    },
};
"#
        ));
    }

    #[test]
    fn test_kernel_name_parser() {
        let kernels = [
            kernel(Some("blas"), "dgemm"),
            kernel(Some("blas"), "daxpy"),
            kernel(Some("blis"), "sdot"),
            kernel(None, "playground"),
        ];
        let units = collect(&kernels, &Config::default()).unwrap();
        let mut machine = Machine::new(&[&units.header, &units.source]);

        let dgemm = machine.enum_constant("webrunner_kernel_blas_dgemm").unwrap();
        let daxpy = machine.enum_constant("webrunner_kernel_blas_daxpy").unwrap();
        assert_eq!((dgemm, daxpy), (1, 2));
        assert_eq!(machine.enum_constant("webrunner_kernel_invalid"), Some(0));

        assert_eq!(resolve(&mut machine, "dgemm"), 1);
        assert_eq!(resolve(&mut machine, "daxpy"), 2);
        assert_eq!(resolve(&mut machine, "sdot"), 3);
        assert_eq!(resolve(&mut machine, "playground"), 4);
        // dispatch is on the bare name, never the qualified one
        assert_eq!(resolve(&mut machine, "blas::dgemm"), 0);
        assert_eq!(resolve(&mut machine, "foo"), 0);
        assert_eq!(resolve(&mut machine, "dgemn"), 0);
        assert_eq!(resolve(&mut machine, ""), 0);
    }

    #[test]
    fn test_table_is_indexed_by_constant() {
        let kernels = [kernel(Some("blas"), "dgemm"), kernel(Some("blas"), "daxpy")];
        let units = collect(&kernels, &Config::default()).unwrap();
        let table = units.source.global(SPECIFICATIONS_TABLE).unwrap();
        let Some(Initializer::List(entries)) = &table.init else {
            panic!("table has no initializer list");
        };
        let indices: Vec<String> = entries
            .iter()
            .map(|(designator, _)| match designator {
                Designator::Index(expr) => expr.to_string(),
                Designator::Field(name) => name.clone(),
            })
            .collect();
        assert_eq!(indices, vec!["webrunner_kernel_blas_dgemm", "webrunner_kernel_blas_daxpy"]);

        let names: Vec<&str> = descriptor_fields(&units.header).iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "name",
                "parameters_size",
                "arguments_size",
                "parameters_default",
                "parse_parameter",
                "create_arguments",
                "free_arguments",
                "profile"
            ]
        );
    }

    #[test]
    fn test_adapter_forwards_to_kernel_parser() {
        let dgemm = crate::spec::parse_kernel(
            r#"<kernel name="dgemm" namespace="blas">
                <query><parameter name="size" type="uint64" default="64" min="1" max="4096"/></query>
                <call><argument name="n" type="size_t"/></call>
            </kernel>"#,
        )
        .unwrap();
        let config = Config::default();
        let kernel_units = compile(&dgemm, &config);
        let registry = collect(std::slice::from_ref(&dgemm), &config).unwrap();
        let mut machine = Machine::new(&[
            &registry.header,
            &registry.source,
            &kernel_units.header,
            &kernel_units.source,
        ]);

        let params = machine.instantiate("blas_dgemm_parameters_default").unwrap();
        let call = |machine: &mut Machine, value: &str| {
            machine
                .call(
                    "blas_dgemm_generic_parse_parameter",
                    vec![
                        Value::Record(params),
                        Value::Int(4),
                        Value::bytes("size"),
                        Value::Int(value.len() as i128),
                        Value::bytes(value),
                    ],
                )
                .unwrap()
        };
        assert_eq!(call(&mut machine, "256"), Outcome::Returned(Value::Unit));
        assert_eq!(machine.field(params, "size").unwrap(), &Value::Int(256));
        assert!(call(&mut machine, "5000").is_fatal());
    }

    #[test]
    fn test_custom_enum_prefix() {
        let config = Config {
            enum_prefix: "bench_kernel".to_string(),
            ..Config::default()
        };
        let units = collect(&[kernel(Some("blas"), "dgemm")], &config).unwrap();
        let rendered = units.render();
        assert!(rendered.header.contains("enum bench_kernel {\n    bench_kernel_invalid = 0,\n    bench_kernel_blas_dgemm,\n};"));
        assert!(rendered.source.contains("return bench_kernel_invalid;"));
    }
}
