//! File-level driver
//!
//! Reads specification documents from disk, runs the generators and writes
//! the outputs. Both outputs of a pair are rendered before either is
//! written, so a failing invocation leaves no partial output behind.

use crate::codegen::{self, Rendered};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::spec::{self, Kernel, GENERATED_SUFFIX};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where a generated header/source pair goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub code: PathBuf,
    pub header: PathBuf,
}

impl OutputPaths {
    pub fn new(code: impl Into<PathBuf>, header: impl Into<PathBuf>) -> Self {
        Self {
            code: code.into(),
            header: header.into(),
        }
    }

    /// `<stem>-gen.c` and `<stem>-gen.h` next to `input`
    pub fn beside(input: &Path) -> Result<Self> {
        let stem = input
            .file_stem()
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| Error::OutputPath {
                path: input.to_path_buf(),
            })?
            .to_string_lossy();
        let base = format!("{}{}", stem, GENERATED_SUFFIX);
        Ok(Self {
            code: input.with_file_name(format!("{}.c", base)),
            header: input.with_file_name(format!("{}.h", base)),
        })
    }

    /// Explicit paths where given, derived ones otherwise
    pub fn resolve(input: &Path, code: Option<PathBuf>, header: Option<PathBuf>) -> Result<Self> {
        match (code, header) {
            (Some(code), Some(header)) => Ok(Self { code, header }),
            (code, header) => {
                let derived = Self::beside(input)?;
                Ok(Self {
                    code: code.unwrap_or(derived.code),
                    header: header.unwrap_or(derived.header),
                })
            }
        }
    }
}

/// Read and validate one specification document
pub fn read_kernel_file(path: &Path) -> Result<Kernel> {
    let text = fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = text.len(), "read specification");
    spec::parse_kernel(&text).map_err(|err| Error::spec(path, &text, err))
}

/// Read every document, stopping at the first failure
pub fn read_kernel_files(paths: &[PathBuf]) -> Result<Vec<Kernel>> {
    paths.iter().map(|path| read_kernel_file(path)).collect()
}

/// Compile one document into its header/source pair
pub fn compile_file(input: &Path, outputs: &OutputPaths, config: &Config) -> Result<Kernel> {
    let kernel = read_kernel_file(input)?;
    let rendered = codegen::compile(&kernel, config).render();
    write_outputs(outputs, &rendered)?;
    Ok(kernel)
}

/// Collect all documents into the registry header/source pair
pub fn collect_files(inputs: &[PathBuf], outputs: &OutputPaths, config: &Config) -> Result<Vec<Kernel>> {
    let kernels = read_kernel_files(inputs)?;
    let rendered = codegen::collect(&kernels, config)?.render();
    write_outputs(outputs, &rendered)?;
    Ok(kernels)
}

/// Parse and validate documents without generating anything
pub fn check_files(inputs: &[PathBuf]) -> Result<Vec<Kernel>> {
    read_kernel_files(inputs)
}

fn write_outputs(outputs: &OutputPaths, rendered: &Rendered) -> Result<()> {
    write_file(&outputs.header, &rendered.header)?;
    write_file(&outputs.code, &rendered.source)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), bytes = contents.len(), "wrote");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outputs_beside_input() {
        let outputs = OutputPaths::beside(Path::new("src/kernels/blis/sgemm.xml")).unwrap();
        assert_eq!(outputs.code, PathBuf::from("src/kernels/blis/sgemm-gen.c"));
        assert_eq!(outputs.header, PathBuf::from("src/kernels/blis/sgemm-gen.h"));
    }

    #[test]
    fn test_resolve_mixes_explicit_and_derived() {
        let outputs = OutputPaths::resolve(
            Path::new("spec/dgemm.xml"),
            Some(PathBuf::from("out/dgemm.c")),
            None,
        )
        .unwrap();
        assert_eq!(outputs.code, PathBuf::from("out/dgemm.c"));
        assert_eq!(outputs.header, PathBuf::from("spec/dgemm-gen.h"));
    }

    #[test]
    fn test_beside_rejects_pathless_input() {
        assert!(matches!(
            OutputPaths::beside(Path::new("/")),
            Err(Error::OutputPath { .. })
        ));
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_kernel_file(&dir.path().join("nope.xml")).unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
    }
}
