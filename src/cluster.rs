//! Settings the remote commands need, derived from the environment and the
//! resolved option set

use serde_json::Value;

use crate::domain::{EnvConfig, OptionMap};
use crate::options::{resolve::DEFAULT_SUDO_USER, LOG_PATH, SUDO_USER, WORKERS_LIST};

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEnv {
    pub env_name: String,
    /// SSH login user.
    pub user: String,
    /// User that owns the virtualenvs.
    pub sudo_user: String,
    pub log_path: Option<String>,
    pub virtualenv_root: Option<String>,
    pub workers: Vec<String>,
    pub is_old_storm: bool,
}

impl RemoteEnv {
    pub fn from_options(env_name: &str, env: &EnvConfig, options: &OptionMap) -> Self {
        let user = env.user.clone().unwrap_or_else(|| DEFAULT_SUDO_USER.to_string());
        let sudo_user = options
            .get(SUDO_USER)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| user.clone());
        let log_path = options
            .get(LOG_PATH)
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| env.log_path().map(str::to_string));
        let virtualenv_root = options
            .get("virtualenv_root")
            .and_then(Value::as_str)
            .or(env.virtualenv_root.as_deref())
            .map(|root| root.trim_end_matches('/').to_string());
        let workers = options
            .get(WORKERS_LIST)
            .and_then(Value::as_array)
            .map(|hosts| hosts.iter().filter_map(host_name).collect())
            .unwrap_or_else(|| env.workers.clone());
        Self {
            env_name: env_name.to_string(),
            user,
            sudo_user,
            log_path,
            virtualenv_root,
            workers,
            is_old_storm: env.storm_version.as_deref().is_some_and(is_pre_1_0),
        }
    }

    /// Whether deleting virtualenvs needs `sudo`.
    pub fn needs_sudo(&self) -> bool {
        self.sudo_user != self.user
    }
}

fn host_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// `true` for `0.x` releases, whose worker logs sit flat in the log directory.
fn is_pre_1_0(version: &str) -> bool {
    version
        .trim()
        .trim_start_matches('v')
        .split('.')
        .next()
        .and_then(|major| major.parse::<u64>().ok())
        .is_some_and(|major| major < 1)
}
