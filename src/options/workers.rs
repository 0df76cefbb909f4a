//! Worker host discovery

use thiserror::Error;

use crate::domain::EnvConfig;

#[derive(Debug, Error, PartialEq)]
pub enum WorkerError {
    #[error(
        "no worker hosts known for environment '{0}': set `workers` in its config \
         or pass -o storm.workers.list=host1,host2"
    )]
    NoWorkers(String),
}

/// Source of the worker host list used to size a topology.
pub trait WorkerSource {
    fn workers(&self, env_name: &str, env: &EnvConfig) -> Result<Vec<String>, WorkerError>;
}

/// Reads the `workers` list from the environment config.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfiguredWorkers;

impl WorkerSource for ConfiguredWorkers {
    fn workers(&self, env_name: &str, env: &EnvConfig) -> Result<Vec<String>, WorkerError> {
        let hosts: Vec<String> = env
            .workers
            .iter()
            .map(|h| h.trim())
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .collect();
        if hosts.is_empty() {
            return Err(WorkerError::NoWorkers(env_name.to_string()));
        }
        tracing::debug!(env = env_name, count = hosts.len(), "using configured worker hosts");
        Ok(hosts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_skips_blank_hosts() {
        let env = EnvConfig {
            workers: vec![" w1 ".into(), "".into(), "w2".into()],
            ..Default::default()
        };
        assert_eq!(ConfiguredWorkers.workers("prod", &env).unwrap(), vec!["w1", "w2"]);
    }

    #[test]
    fn empty_list_names_the_environment() {
        let err = ConfiguredWorkers.workers("prod", &EnvConfig::default()).unwrap_err();
        assert_eq!(err, WorkerError::NoWorkers("prod".into()));
        assert!(err.to_string().contains("storm.workers.list"));
    }
}
