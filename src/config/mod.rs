//! Project configuration loading
//!
//! Handles discovery and parsing of the project config file, selection of the
//! target environment and lookup of topology definitions.

use std::path::PathBuf;
use thiserror::Error;

pub mod env;
pub mod loader;
pub mod topology;

pub use env::{resolve_serializer, select_environment};
pub use loader::load_config;
pub use topology::{find_topology, list_topologies};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no project config found in {dir} (looked for {candidates})")]
    NotFound { dir: PathBuf, candidates: String },
    #[error("failed reading {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config in {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
    #[error("unsupported config extension '.{ext}' for {path}")]
    UnsupportedFormat { path: PathBuf, ext: String },
    #[error("environment '{name}' not found (available: {available})")]
    UnknownEnvironment { name: String, available: String },
    #[error("no environments defined in the `envs` section of the project config")]
    NoEnvironments,
    #[error("several environments defined ({0}); pick one with --environment")]
    AmbiguousEnvironment(String),
    #[error("topology '{name}' not found in {dir}")]
    UnknownTopology { name: String, dir: PathBuf },
    #[error("no topology definitions found in {0}")]
    NoTopologies(PathBuf),
    #[error("several topologies defined ({0}); pick one with --name")]
    AmbiguousTopology(String),
}

/// Parse a config document by file extension into any deserializable type.
pub(crate) fn parse_document<T>(content: &str, path: &std::path::Path) -> Result<T, ConfigError>
where
    T: serde::de::DeserializeOwned,
{
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
    let parse_err =
        |reason: String| ConfigError::Parse { path: path.to_path_buf(), reason };
    match ext.as_str() {
        "json" => serde_json::from_str(content).map_err(|e| parse_err(e.to_string())),
        "toml" => toml::from_str(content).map_err(|e| parse_err(e.to_string())),
        "yaml" | "yml" => serde_yaml::from_str(content).map_err(|e| parse_err(e.to_string())),
        other => {
            Err(ConfigError::UnsupportedFormat { path: path.to_path_buf(), ext: other.to_string() })
        }
    }
}
