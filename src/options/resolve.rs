//! Precedence merge: CLI > topology > environment
//!
//! The environment tier is expanded first (its `options` table plus values
//! derived from the virtualenv and logging settings), topology options are
//! laid over it, CLI options over those, and finally defaults fill whatever
//! is still missing.

use serde_json::Value;
use thiserror::Error;

use super::workers::{WorkerError, WorkerSource};
use super::{
    is_truthy, ACKER_EXECUTORS, DEBUG, LOG_BACKUP_COUNT, LOG_FILE, LOG_LEVEL, LOG_MAX_BYTES,
    LOG_PATH, PYTHON_PATH, SERIALIZER, SUDO_USER, WORKERS, WORKERS_LIST,
};
use crate::domain::{EnvConfig, OptionMap};

pub const DEFAULT_SUDO_USER: &str = "root";

#[derive(Debug, Error, PartialEq)]
pub enum ResolveError {
    #[error("environment '{0}' uses virtualenvs but has no `virtualenv_root`")]
    MissingVirtualenvRoot(String),
    #[error("`storm.workers.list` must be a list or a comma-separated string, got {0}")]
    InvalidWorkersList(Value),
    #[error(transparent)]
    Workers(#[from] WorkerError),
}

/// Inputs for one resolution.
#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    pub cli_options: &'a OptionMap,
    pub env_name: &'a str,
    pub env: &'a EnvConfig,
    pub topology_options: &'a OptionMap,
    /// Name used for the virtualenv path (the override name when given).
    pub topology_name: &'a str,
    /// Serializer already chosen from the environment and project config.
    pub serializer: Option<&'a str>,
    /// Skip worker discovery; the topology will run on a single machine.
    pub local_only: bool,
}

pub fn resolve_options(
    request: &ResolveRequest<'_>,
    workers: &dyn WorkerSource,
) -> Result<OptionMap, ResolveError> {
    let env = request.env;
    let mut options = env.options.clone();

    if let Some(serializer) = request.serializer {
        if !options.contains_key(SERIALIZER) {
            options.insert(SERIALIZER.to_string(), Value::String(serializer.to_string()));
        }
    }

    if env.uses_virtualenv() {
        let root = env
            .virtualenv_root
            .as_deref()
            .ok_or_else(|| ResolveError::MissingVirtualenvRoot(request.env_name.to_string()))?;
        let python_path =
            [root.trim_end_matches('/'), request.topology_name, "bin", "python"].join("/");
        // Informational only; nothing on the workers reads it back.
        options.insert(PYTHON_PATH.to_string(), Value::String(python_path));
    }

    apply_log_settings(&mut options, env);

    for (key, value) in env.virtualenv_options() {
        options.insert(key.to_string(), value);
    }

    options.insert(
        SUDO_USER.to_string(),
        env.user.clone().map(Value::String).unwrap_or(Value::Null),
    );

    for (key, value) in request.topology_options {
        options.insert(key.clone(), value.clone());
    }
    for (key, value) in request.cli_options {
        options.insert(key.clone(), value.clone());
    }

    if options.get(DEBUG).is_some_and(is_truthy) {
        options.insert(LOG_LEVEL.to_string(), Value::String("debug".to_string()));
    }

    let worker_count = if request.local_only {
        options.insert(WORKERS_LIST.to_string(), Value::Array(Vec::new()));
        1
    } else {
        let hosts = match options.get(WORKERS_LIST) {
            Some(value) if is_truthy(value) => normalize_workers_list(value)?,
            _ => workers
                .workers(request.env_name, env)?
                .into_iter()
                .map(Value::String)
                .collect(),
        };
        let count = hosts.len();
        options.insert(WORKERS_LIST.to_string(), Value::Array(hosts));
        count
    };

    for key in [ACKER_EXECUTORS, WORKERS] {
        if options.get(key).map_or(true, Value::is_null) {
            options.insert(key.to_string(), Value::from(worker_count));
        }
    }

    if options.get(SUDO_USER).map_or(true, Value::is_null) {
        options.insert(SUDO_USER.to_string(), Value::String(DEFAULT_SUDO_USER.to_string()));
    }

    tracing::debug!(
        env = request.env_name,
        topology = request.topology_name,
        keys = options.len(),
        "resolved topology options"
    );
    Ok(options)
}

fn apply_log_settings(options: &mut OptionMap, env: &EnvConfig) {
    if let Some(path) = env.log_path() {
        options.insert(LOG_PATH.to_string(), Value::String(path.to_string()));
    }
    if let Some(file) = env.log_file() {
        options.insert(LOG_FILE.to_string(), Value::String(file.to_string()));
    }
    let Some(log) = env.log.as_ref() else {
        return;
    };
    // Values of any other type are ignored.
    for (key, value) in [(LOG_MAX_BYTES, &log.max_bytes), (LOG_BACKUP_COUNT, &log.backup_count)] {
        if let Some(value) = value.as_ref().filter(|v| v.is_i64() || v.is_u64()) {
            options.insert(key.to_string(), value.clone());
        }
    }
    if let Some(level) = log.level.as_ref().and_then(Value::as_str) {
        options.insert(LOG_LEVEL.to_string(), Value::String(level.to_lowercase()));
    }
}

fn normalize_workers_list(value: &Value) -> Result<Vec<Value>, ResolveError> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        Value::String(raw) => Ok(raw
            .split(',')
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .map(|host| Value::String(host.to_string()))
            .collect()),
        other => Err(ResolveError::InvalidWorkersList(other.clone())),
    }
}

/// Single-machine adjustments for local runs: one worker, and at most one
/// acker unless ackers were switched off.
pub fn apply_local_mode(options: &mut OptionMap) {
    let ackers_off = options.get(ACKER_EXECUTORS).and_then(Value::as_i64) == Some(0);
    if !ackers_off {
        options.insert(ACKER_EXECUTORS.to_string(), Value::from(1));
    }
    options.insert(WORKERS.to_string(), Value::from(1));
}
