//! Shared lookup of config, environment and topology for the subcommands

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::{find_topology, load_config, resolve_serializer, select_environment};
use crate::domain::{EnvConfig, OptionMap, ProjectConfig, TopologyDefinition};
use crate::options::{resolve_options, ConfiguredWorkers, ResolveRequest};

/// Everything a command needs once config, environment and topology are known.
pub struct TopologyContext {
    pub config: ProjectConfig,
    pub env_name: String,
    pub env: EnvConfig,
    pub topology: TopologyDefinition,
    /// `--override-name` if given, else the topology name.
    pub name: String,
}

impl TopologyContext {
    pub fn load(
        config_path: Option<&Path>,
        environment: Option<&str>,
        name: Option<&str>,
        override_name: Option<&str>,
    ) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed reading current directory")?;
        let config = load_config(&cwd, config_path)?;
        let (env_name, env) = select_environment(&config, environment)?;
        let (env_name, env) = (env_name.to_string(), env.clone());
        let topology = find_topology(&config, name)?;
        let name = override_name.unwrap_or(&topology.name).to_string();
        tracing::info!(env = %env_name, topology = %topology.name, name = %name, "selected topology");
        Ok(Self { config, env_name, env, topology, name })
    }

    /// Merge CLI options over the topology and environment tiers.
    pub fn resolve(&self, cli_options: &OptionMap, local_only: bool) -> Result<OptionMap> {
        let request = ResolveRequest {
            cli_options,
            env_name: &self.env_name,
            env: &self.env,
            topology_options: &self.topology.config,
            topology_name: &self.name,
            serializer: Some(resolve_serializer(&self.config, &self.env)),
            local_only,
        };
        resolve_options(&request, &ConfiguredWorkers).with_context(|| {
            format!("Failed resolving options for topology '{}' in '{}'", self.name, self.env_name)
        })
    }
}
