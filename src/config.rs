//! Generator configuration
//!
//! Every field has a default matching the benchmark runtime's layout, so an
//! empty (or absent) configuration file is valid.

use crate::spec::{is_c_identifier, DEFAULT_HEADER_ROOT};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("`{field}` must be a C identifier, got `{value}`")]
    InvalidIdentifier { field: &'static str, value: String },
}

/// Paths and symbol names the generated glue depends on
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Include root of generated kernel headers
    pub header_root: String,
    /// Runtime headers included by every kernel source
    pub runtime_headers: Vec<String>,
    /// Header declaring `struct kernel_specification`, included by the
    /// registry source
    pub registry_header: String,
    /// Prefix of the kernel enumeration and its constants
    pub enum_prefix: String,
    /// Runtime function that logs a message and aborts
    pub fatal_function: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            header_root: DEFAULT_HEADER_ROOT.to_string(),
            runtime_headers: vec![
                "webserver/parse.h".to_string(),
                "webserver/logs.h".to_string(),
                "runner/benchmark.h".to_string(),
            ],
            registry_header: "runner/spec.h".to_string(),
            enum_prefix: "webrunner_kernel".to_string(),
            fatal_function: "log_fatal".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Load `path` if given, else the defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("enum_prefix", &self.enum_prefix),
            ("fatal_function", &self.fatal_function),
        ] {
            if !is_c_identifier(value) {
                return Err(ConfigError::InvalidIdentifier {
                    field,
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    /// `<enum_prefix>_invalid`, the "no such kernel" constant
    pub fn invalid_kernel_constant(&self) -> String {
        format!("{}_invalid", self.enum_prefix)
    }

    /// Enumeration constant naming the kernel with `prefix`
    pub fn kernel_constant(&self, prefix: &str) -> String {
        format!("{}_{}", self.enum_prefix, prefix)
    }
}
