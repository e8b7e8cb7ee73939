//! Crate-level errors
//!
//! Wraps the per-stage errors with the file they concern.

use crate::codegen::CollectError;
use crate::config::ConfigError;
use crate::span::Position;
use crate::spec::SpecError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Rejected specification document, located by `line:column`
    #[error("{}:{position}: {source}", path.display())]
    Spec {
        path: PathBuf,
        position: Position,
        #[source]
        source: SpecError,
    },

    #[error("cannot derive output paths from {}", path.display())]
    OutputPath { path: PathBuf },

    #[error(transparent)]
    Collect(#[from] CollectError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Attach the document path and resolve the span against its text
    pub fn spec(path: impl Into<PathBuf>, source_text: &str, err: SpecError) -> Self {
        Error::Spec {
            path: path.into(),
            position: err.span.position(source_text),
            source: err,
        }
    }
}
