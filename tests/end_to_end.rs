//! End-to-end tests: documents on disk through the driver to generated files,
//! with the generated parsers run on the evaluator.

use kernelspec::codegen::{self, PARSE_KERNEL_NAME};
use kernelspec::driver::{self, OutputPaths};
use kernelspec::ir::{Machine, Outcome, Value};
use kernelspec::{Config, Error};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const DGEMM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- double-precision matrix multiply -->
<kernel name="dgemm" namespace="blas">
    <query>
        <parameter name="size" type="uint64" default="64" min="1" max="4096"/>
    </query>
    <call>
        <argument name="n" type="size_t"/>
    </call>
</kernel>
"#;

const DAXPY: &str = r#"<kernel name="daxpy" namespace="blas">
    <query>
        <parameter name="n" type="uint32" default="1024" max="0x100000"/>
    </query>
    <call>
        <argument name="n" type="size_t"/>
        <argument name="x" type="const double*"/>
        <argument name="y" type="double*"/>
    </call>
</kernel>
"#;

const SGEMM: &str = r#"<kernel name="sgemm" namespace="blis">
    <query>
        <parameter name="mr" type="uint32" default="8" min="1"/>
        <parameter name="nr" type="uint32" default="4" min="1"/>
        <parameter name="kc" type="uint32" default="256" min="1"/>
    </query>
    <call>
        <argument name="k" type="size_t"/>
        <argument name="a" type="const float*"/>
        <argument name="b" type="const float*"/>
        <argument name="c" type="float*"/>
    </call>
</kernel>
"#;

fn write_spec(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

fn call_parser(machine: &mut Machine, prefix: &str, name: &str, value: &str) -> Outcome {
    let params = machine
        .instantiate(&format!("{}_parameters_default", prefix))
        .unwrap();
    machine
        .call(
            &format!("{}_parse_parameter", prefix),
            vec![
                Value::Record(params),
                Value::Int(name.len() as i128),
                Value::bytes(name),
                Value::Int(value.len() as i128),
                Value::bytes(value),
            ],
        )
        .unwrap()
}

fn kernel_id(machine: &mut Machine, name: &str) -> i128 {
    match machine
        .call(
            PARSE_KERNEL_NAME,
            vec![Value::Int(name.len() as i128), Value::bytes(name)],
        )
        .unwrap()
    {
        Outcome::Returned(Value::Int(id)) => id,
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn test_compile_writes_default_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_spec(&dir, "dgemm.xml", DGEMM);
    let outputs = OutputPaths::resolve(&input, None, None).unwrap();
    let kernel = driver::compile_file(&input, &outputs, &Config::default()).unwrap();

    assert_eq!(kernel.full_name(), "blas::dgemm");
    assert_eq!(kernel.prefix(), "blas_dgemm");
    assert_eq!(outputs.header, dir.path().join("dgemm-gen.h"));
    assert_eq!(outputs.code, dir.path().join("dgemm-gen.c"));

    let header = fs::read_to_string(&outputs.header).unwrap();
    let source = fs::read_to_string(&outputs.code).unwrap();
    assert!(header.starts_with("#pragma once\n"));
    assert!(header.contains("struct blas_dgemm_parameters {\n    uint64_t size;\n};"));
    assert!(header.contains("struct blas_dgemm_arguments {\n    size_t n;\n};"));
    assert!(source.contains("#include <kernels/blas/dgemm-gen.h>"));
    assert!(source.contains(".size = UINT64_C(64),"));
}

#[test]
fn test_generated_parser_semantics() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_spec(&dir, "dgemm.xml", DGEMM);
    let kernel = driver::read_kernel_file(&input).unwrap();
    let units = codegen::compile(&kernel, &Config::default());
    let mut machine = Machine::new(&[&units.header, &units.source]);

    assert_eq!(
        call_parser(&mut machine, "blas_dgemm", "size", "128"),
        Outcome::Returned(Value::Unit)
    );
    for value in ["0", "5000"] {
        assert!(call_parser(&mut machine, "blas_dgemm", "size", value).is_fatal());
    }
    for name in ["n", "sizes", "Size", "blas::size"] {
        assert_eq!(
            call_parser(&mut machine, "blas_dgemm", name, "128"),
            Outcome::Fatal(format!("invalid parameter {} for blas::dgemm", name))
        );
    }
}

#[test]
fn test_collect_registry() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = vec![
        write_spec(&dir, "dgemm.xml", DGEMM),
        write_spec(&dir, "daxpy.xml", DAXPY),
    ];
    let outputs = OutputPaths::new(dir.path().join("spec.c"), dir.path().join("spec.h"));
    let kernels = driver::collect_files(&inputs, &outputs, &Config::default()).unwrap();
    assert_eq!(kernels.len(), 2);

    let header = fs::read_to_string(&outputs.header).unwrap();
    assert!(header.contains(
        "enum webrunner_kernel {\n    \
         webrunner_kernel_invalid = 0,\n    \
         webrunner_kernel_blas_dgemm,\n    \
         webrunner_kernel_blas_daxpy,\n};"
    ));
    let source = fs::read_to_string(&outputs.code).unwrap();
    assert!(source.contains("#include <kernels/blas/dgemm-gen.h>\n#include <kernels/blas/daxpy-gen.h>\n"));
    assert!(source.contains("[webrunner_kernel_blas_daxpy] = {\n        .name = \"daxpy\","));

    let registry = codegen::collect(&kernels, &Config::default()).unwrap();
    let mut machine = Machine::new(&[&registry.header, &registry.source]);
    let dgemm = machine.enum_constant("webrunner_kernel_blas_dgemm").unwrap();
    let daxpy = machine.enum_constant("webrunner_kernel_blas_daxpy").unwrap();
    assert!(dgemm != 0 && daxpy != 0 && dgemm != daxpy);
    assert_eq!(kernel_id(&mut machine, "dgemm"), dgemm);
    assert_eq!(kernel_id(&mut machine, "daxpy"), daxpy);
    assert_eq!(kernel_id(&mut machine, "foo"), 0);
}

#[test]
fn test_whole_build_links_on_the_evaluator() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = vec![
        write_spec(&dir, "dgemm.xml", DGEMM),
        write_spec(&dir, "daxpy.xml", DAXPY),
        write_spec(&dir, "sgemm.xml", SGEMM),
    ];
    let config = Config::default();
    let kernels = driver::check_files(&inputs).unwrap();
    let compiled: Vec<_> = kernels.iter().map(|k| codegen::compile(k, &config)).collect();
    let registry = codegen::collect(&kernels, &config).unwrap();

    let mut units = vec![&registry.header, &registry.source];
    for pair in &compiled {
        units.push(&pair.header);
        units.push(&pair.source);
    }
    let mut machine = Machine::new(&units);

    assert_eq!(kernel_id(&mut machine, "sgemm"), 3);
    // hex bound on daxpy: 0x100000
    assert!(!call_parser(&mut machine, "blas_daxpy", "n", "1048576").is_fatal());
    assert!(call_parser(&mut machine, "blas_daxpy", "n", "1048577").is_fatal());
    // same-length names in one bucket
    assert!(!call_parser(&mut machine, "blis_sgemm", "kc", "1").is_fatal());
    assert!(call_parser(&mut machine, "blis_sgemm", "nr", "0").is_fatal());
    assert!(call_parser(&mut machine, "blis_sgemm", "xx", "1").is_fatal());
}

#[test]
fn test_failed_collect_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = vec![
        write_spec(&dir, "a.xml", DGEMM),
        write_spec(&dir, "b.xml", DGEMM),
    ];
    let outputs = OutputPaths::new(dir.path().join("spec.c"), dir.path().join("spec.h"));
    let err = driver::collect_files(&inputs, &outputs, &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Collect(_)));
    assert!(!outputs.header.exists());
    assert!(!outputs.code.exists());
}

#[test]
fn test_invalid_document_reports_location() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_spec(
        &dir,
        "bad.xml",
        "<kernel name=\"k\">\n  <query>\n    <parameter name=\"p\" type=\"int\" default=\"1\"/>\n  </query>\n</kernel>\n",
    );
    let outputs = OutputPaths::resolve(&input, None, None).unwrap();
    let err = driver::compile_file(&input, &outputs, &Config::default()).unwrap_err();
    let Error::Spec { path, position, .. } = &err else {
        panic!("expected a specification error, got {:?}", err);
    };
    assert_eq!(path.as_path(), input.as_path());
    assert_eq!(position.line, 3);
    assert!(err.to_string().contains("bad.xml:3:"));
    assert!(!outputs.header.exists());
    assert!(!outputs.code.exists());
}

#[test]
fn test_config_file_changes_output() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("kspec.toml");
    fs::write(
        &config_path,
        "header_root = \"gen\"\nfatal_function = \"die\"\nenum_prefix = \"bench_kernel\"\n",
    )
    .unwrap();
    let config = Config::load_or_default(Some(Path::new(&config_path))).unwrap();

    let input = write_spec(&dir, "dgemm.xml", DGEMM);
    let outputs = OutputPaths::new(dir.path().join("out.c"), dir.path().join("out.h"));
    driver::compile_file(&input, &outputs, &config).unwrap();
    let source = fs::read_to_string(&outputs.code).unwrap();
    assert!(source.contains("#include <gen/blas/dgemm-gen.h>"));
    assert!(source.contains("die(\"invalid parameter %.*s for blas::dgemm\\n\", (int) name_size, name);"));
}

#[test]
fn test_prologue_and_text_content_are_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let bom = dir.path().join("bom.xml");
    fs::write(&bom, b"\xEF\xBB\xBF<kernel name=\"k\"/>").unwrap();
    let doctype = write_spec(&dir, "doctype.xml", "<!DOCTYPE kernel>\n<kernel name=\"k\"/>\n");
    let text = write_spec(
        &dir,
        "text.xml",
        "<kernel name=\"k\">\n  <query>\n    \
         <parameter name=\"n\" type=\"uint32\" default=\"8\">number of items</parameter>\n  \
         </query>\n</kernel>\n",
    );

    let kernels = driver::check_files(&[bom, doctype, text]).unwrap();
    assert!(kernels.iter().all(|kernel| kernel.full_name() == "k"));
    assert_eq!(kernels[2].parameters.len(), 1);
    assert_eq!(kernels[2].parameters[0].default, 8);
}
