//! Core configuration types shared by the loader, the resolver and the commands

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::options::is_truthy;

/// Flat option set handed to the cluster tooling. Keys keep insertion order.
pub type OptionMap = Map<String, Value>;

pub const DEFAULT_TOPOLOGY_SPECS: &str = "topologies";
pub const DEFAULT_VIRTUALENV_SPECS: &str = "virtualenvs";
pub const DEFAULT_JAR_MAIN_CLASS: &str = "org.apache.storm.flux.Flux";
pub const DEFAULT_SERIALIZER: &str = "json";

/// Project-wide configuration (`config.json` or `topoctl.{toml,yaml,yml}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Directory holding the config file. Relative paths resolve against it.
    #[serde(skip)]
    pub root: PathBuf,
    pub topology_specs: PathBuf,
    pub virtualenv_specs: PathBuf,
    pub serializer: Option<String>,
    pub jar_main_class: String,
    pub envs: BTreeMap<String, EnvConfig>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            topology_specs: PathBuf::from(DEFAULT_TOPOLOGY_SPECS),
            virtualenv_specs: PathBuf::from(DEFAULT_VIRTUALENV_SPECS),
            serializer: None,
            jar_main_class: DEFAULT_JAR_MAIN_CLASS.to_string(),
            envs: BTreeMap::new(),
        }
    }
}

impl ProjectConfig {
    pub fn topology_specs_dir(&self) -> PathBuf {
        self.resolve_path(&self.topology_specs)
    }

    pub fn virtualenv_specs_dir(&self) -> PathBuf {
        self.resolve_path(&self.virtualenv_specs)
    }

    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// One entry of the `envs` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// SSH user on the cluster machines.
    pub user: Option<String>,
    /// Nimbus `host[:port]`.
    pub nimbus: Option<String>,
    pub workers: Vec<String>,
    pub log: Option<LogConfig>,
    /// Legacy spelling of `log.path`.
    pub log_path: Option<String>,
    /// Legacy spelling of `log.file`.
    pub log_file: Option<String>,
    pub virtualenv_root: Option<String>,
    /// Truthy unless switched off; forwarded into the options as written.
    pub use_virtualenv: Option<Value>,
    pub install_virtualenv: Option<Value>,
    pub virtualenv_flags: Option<String>,
    pub virtualenv_name: Option<String>,
    pub serializer: Option<String>,
    /// Storm release running on the cluster, e.g. `"1.2.3"`.
    pub storm_version: Option<String>,
    pub options: OptionMap,
}

impl EnvConfig {
    pub fn uses_virtualenv(&self) -> bool {
        self.use_virtualenv.as_ref().map_or(true, is_truthy)
    }

    /// Log directory, preferring the nested `log` table over `log_path`.
    pub fn log_path(&self) -> Option<&str> {
        self.log
            .as_ref()
            .and_then(|log| log.path.as_deref())
            .filter(|p| !p.is_empty())
            .or_else(|| self.log_path.as_deref().filter(|p| !p.is_empty()))
    }

    pub fn log_file(&self) -> Option<&str> {
        self.log
            .as_ref()
            .and_then(|log| log.file.as_deref())
            .filter(|f| !f.is_empty())
            .or_else(|| self.log_file.as_deref().filter(|f| !f.is_empty()))
    }

    /// Virtualenv keys that are forwarded verbatim into the option set.
    pub fn virtualenv_options(&self) -> Vec<(&'static str, Value)> {
        let mut entries = Vec::new();
        if let Some(v) = &self.install_virtualenv {
            entries.push(("install_virtualenv", v.clone()));
        }
        if let Some(v) = &self.use_virtualenv {
            entries.push(("use_virtualenv", v.clone()));
        }
        if let Some(v) = &self.virtualenv_flags {
            entries.push(("virtualenv_flags", Value::String(v.clone())));
        }
        if let Some(v) = &self.virtualenv_root {
            entries.push(("virtualenv_root", Value::String(v.clone())));
        }
        if let Some(v) = &self.virtualenv_name {
            entries.push(("virtualenv_name", Value::String(v.clone())));
        }
        entries
    }
}

/// The `log` table. Rotation and level values are kept loosely typed; only
/// integers and strings respectively are forwarded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub path: Option<String>,
    pub file: Option<String>,
    pub max_bytes: Option<Value>,
    pub backup_count: Option<Value>,
    pub level: Option<Value>,
}

/// A topology definition discovered under `topology_specs`.
#[derive(Debug, Clone, PartialEq)]
pub struct TopologyDefinition {
    pub name: String,
    /// The definition file itself.
    pub path: PathBuf,
    /// File handed to the external runner.
    pub file: PathBuf,
    /// Topology-level options, the middle precedence tier.
    pub config: OptionMap,
}

/// On-disk shape of a topology definition file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TopologyFile {
    pub file: Option<PathBuf>,
    pub config: OptionMap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_table_wins_over_legacy_keys() {
        let env = EnvConfig {
            log: Some(LogConfig { path: Some("/var/log/storm".into()), ..Default::default() }),
            log_path: Some("/old".into()),
            log_file: Some("topo.log".into()),
            ..Default::default()
        };
        assert_eq!(env.log_path(), Some("/var/log/storm"));
        assert_eq!(env.log_file(), Some("topo.log"));
    }

    #[test]
    fn empty_log_path_falls_back() {
        let env = EnvConfig {
            log: Some(LogConfig { path: Some(String::new()), ..Default::default() }),
            log_path: Some("/legacy".into()),
            ..Default::default()
        };
        assert_eq!(env.log_path(), Some("/legacy"));
    }

    #[test]
    fn virtualenv_enabled_by_default() {
        assert!(EnvConfig::default().uses_virtualenv());
    }

    #[test]
    fn use_virtualenv_follows_truthiness() {
        let env = EnvConfig { use_virtualenv: Some(Value::from(0)), ..Default::default() };
        assert!(!env.uses_virtualenv());
        assert_eq!(env.virtualenv_options(), vec![("use_virtualenv", Value::from(0))]);

        let env = EnvConfig { use_virtualenv: Some(Value::from("yes")), ..Default::default() };
        assert!(env.uses_virtualenv());
    }

    #[test]
    fn relative_spec_dirs_resolve_against_root() {
        let cfg = ProjectConfig { root: PathBuf::from("/proj"), ..Default::default() };
        assert_eq!(cfg.topology_specs_dir(), PathBuf::from("/proj/topologies"));
        assert_eq!(cfg.virtualenv_specs_dir(), PathBuf::from("/proj/virtualenvs"));
    }
}
