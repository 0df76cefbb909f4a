//! Topology definition discovery
//!
//! Every `.yaml`, `.yml`, `.toml` or `.json` file directly under the
//! `topology_specs` directory defines one topology named after its file stem.

use std::fs;
use std::path::{Path, PathBuf};

use super::{parse_document, ConfigError};
use crate::domain::{ProjectConfig, TopologyDefinition, TopologyFile};

const DEFINITION_EXTENSIONS: [&str; 4] = ["yaml", "yml", "toml", "json"];

pub fn list_topologies(config: &ProjectConfig) -> Result<Vec<TopologyDefinition>, ConfigError> {
    definition_paths(config)?
        .iter()
        .map(|path| load_definition(config, path))
        .collect()
}

/// Find the named topology, or the only one defined when no name is given.
/// Only the selected definition file is parsed.
pub fn find_topology(
    config: &ProjectConfig,
    name: Option<&str>,
) -> Result<TopologyDefinition, ConfigError> {
    let mut paths = definition_paths(config)?;
    let dir = config.topology_specs_dir();
    let path = match name {
        Some(name) => paths
            .into_iter()
            .find(|path| topology_name(path) == name)
            .ok_or_else(|| ConfigError::UnknownTopology { name: name.to_string(), dir })?,
        None => match paths.len() {
            0 => return Err(ConfigError::NoTopologies(dir)),
            1 => paths.remove(0),
            _ => {
                return Err(ConfigError::AmbiguousTopology(
                    paths.iter().map(|p| topology_name(p)).collect::<Vec<_>>().join(", "),
                ))
            }
        },
    };
    load_definition(config, &path)
}

/// Definition files under `topology_specs`, sorted by topology name.
fn definition_paths(config: &ProjectConfig) -> Result<Vec<PathBuf>, ConfigError> {
    let dir = config.topology_specs_dir();
    let entries = fs::read_dir(&dir).map_err(|source| ConfigError::Read { path: dir.clone(), source })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|source| ConfigError::Read { path: dir.clone(), source })?.path();
        if path.is_file() && is_definition_file(&path) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| topology_name(a).cmp(topology_name(b)));
    Ok(paths)
}

fn topology_name(path: &Path) -> &str {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or_default()
}

fn is_definition_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| DEFINITION_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn load_definition(config: &ProjectConfig, path: &Path) -> Result<TopologyDefinition, ConfigError> {
    let content = fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    // An empty YAML file is a topology with no options.
    let parsed: TopologyFile = if content.trim().is_empty() {
        TopologyFile::default()
    } else {
        parse_document(&content, path)?
    };
    let name = topology_name(path).to_string();
    let file: PathBuf = match parsed.file {
        Some(file) => config.resolve_path(&file),
        None => path.to_path_buf(),
    };
    Ok(TopologyDefinition { name, path: path.to_path_buf(), file, config: parsed.config })
}
