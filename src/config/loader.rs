//! Config file loading

use std::fs;
use std::path::{Path, PathBuf};

use super::{parse_document, ConfigError};
use crate::domain::ProjectConfig;

pub const CONFIG_CANDIDATES: [&str; 4] =
    ["config.json", "topoctl.toml", "topoctl.yaml", "topoctl.yml"];

/// Load the project config, either from `config_path` or by discovery in
/// `project_dir`. Relative paths inside the config resolve against the
/// directory holding the file.
pub fn load_config(project_dir: &Path, config_path: Option<&Path>) -> Result<ProjectConfig, ConfigError> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => discover_config(project_dir).ok_or_else(|| ConfigError::NotFound {
            dir: project_dir.to_path_buf(),
            candidates: CONFIG_CANDIDATES.join(", "),
        })?,
    };

    let content = fs::read_to_string(&config_file)
        .map_err(|source| ConfigError::Read { path: config_file.clone(), source })?;

    let mut config: ProjectConfig = parse_document(&content, &config_file)?;
    config.root = match config_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tracing::debug!(
        path = %config_file.display(),
        envs = config.envs.len(),
        "loaded project config"
    );
    Ok(config)
}

fn discover_config(project_dir: &Path) -> Option<PathBuf> {
    CONFIG_CANDIDATES
        .iter()
        .map(|candidate| project_dir.join(candidate))
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn missing_config_lists_candidates() {
        let tmp = TempDir::new().expect("tmp");
        let err = load_config(tmp.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
        assert!(err.to_string().contains("config.json"));
    }

    #[test]
    fn discovers_json_config() {
        let tmp = TempDir::new().expect("tmp");
        fs::write(
            tmp.path().join("config.json"),
            r#"{
                "topology_specs": "topos/",
                "envs": {
                    "prod": {
                        "user": "storm",
                        "nimbus": "nimbus.example.com",
                        "workers": ["w1", "w2"],
                        "log": {"path": "/var/log/storm", "level": "info"},
                        "virtualenv_root": "/data/virtualenvs",
                        "options": {"topology.max.spout.pending": 500}
                    }
                }
            }"#,
        )
        .expect("write");

        let cfg = load_config(tmp.path(), None).expect("config");
        assert_eq!(cfg.root, tmp.path());
        assert_eq!(cfg.topology_specs_dir(), tmp.path().join("topos/"));
        let prod = &cfg.envs["prod"];
        assert_eq!(prod.user.as_deref(), Some("storm"));
        assert_eq!(prod.workers, vec!["w1", "w2"]);
        assert_eq!(prod.log_path(), Some("/var/log/storm"));
        assert_eq!(prod.options["topology.max.spout.pending"], json!(500));
    }

    #[test]
    fn loads_explicit_toml_config() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("cluster.toml");
        fs::write(
            &path,
            "serializer = 'msgpack'\n\n[envs.dev]\nuser = 'dev'\nuse_virtualenv = false\n\n[envs.dev.options]\n'topology.debug' = true\n",
        )
        .expect("write");

        let cfg = load_config(Path::new("/nonexistent"), Some(&path)).expect("config");
        assert_eq!(cfg.serializer.as_deref(), Some("msgpack"));
        let dev = &cfg.envs["dev"];
        assert!(!dev.uses_virtualenv());
        assert_eq!(dev.options["topology.debug"], json!(true));
    }

    #[test]
    fn loads_yaml_config() {
        let tmp = TempDir::new().expect("tmp");
        fs::write(
            tmp.path().join("topoctl.yaml"),
            "envs:\n  prod:\n    workers: [a, b, c]\n    log:\n      max_bytes: 1024\n",
        )
        .expect("write");

        let cfg = load_config(tmp.path(), None).expect("config");
        assert_eq!(cfg.envs["prod"].workers.len(), 3);
        assert_eq!(cfg.envs["prod"].log.as_ref().and_then(|l| l.max_bytes.clone()), Some(json!(1024)));
    }

    #[test]
    fn loosely_typed_log_values_still_load() {
        let tmp = TempDir::new().expect("tmp");
        fs::write(
            tmp.path().join("config.json"),
            r#"{"envs": {"prod": {"log": {"max_bytes": "10MB", "level": 20}, "use_virtualenv": 0}}}"#,
        )
        .expect("write");

        let cfg = load_config(tmp.path(), None).expect("config");
        let prod = &cfg.envs["prod"];
        assert_eq!(prod.log.as_ref().and_then(|l| l.max_bytes.clone()), Some(json!("10MB")));
        assert!(!prod.uses_virtualenv());
    }

    #[test]
    fn invalid_types_are_errors() {
        let tmp = TempDir::new().expect("tmp");
        fs::write(tmp.path().join("config.json"), r#"{"envs": {"prod": {"workers": 3}}}"#)
            .expect("write");

        let err = load_config(tmp.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("config.ini");
        fs::write(&path, "[envs]\n").expect("write");

        let err = load_config(tmp.path(), Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
    }

    #[test]
    fn explicit_missing_file_is_read_error() {
        let tmp = TempDir::new().expect("tmp");
        let err = load_config(tmp.path(), Some(&tmp.path().join("nope.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
