//! Reusable flag groups, flattened into the subcommands that need them.
//!
//! Flags that stand for a topology option (`--ackers`, `--workers`,
//! `--debug`, `--user`) are aliases for `-o KEY=VALUE` and land in the same
//! CLI option map, in the order they were given.

use clap::{ArgMatches, Args};
use std::path::PathBuf;

use crate::domain::OptionMap;
use crate::exec::{CommandRunner, DryRunner, SystemRunner};
use crate::options::{
    collect_assignments, option_alias, OptionError, ACKER_EXECUTORS, DEBUG, SUDO_USER, WORKERS,
};

pub const DEFAULT_POOL_SIZE: usize = 10;
pub const DEFAULT_TIMEOUT_MS: u64 = 7000;
pub const DEFAULT_WAIT_SECS: u64 = 5;

/// Clap id of the repeatable `-o/--option` argument.
const OPTION_ARG_ID: &str = "options";

/// A flag that stands for one `KEY=VALUE` topology option.
pub trait OptionFlag {
    /// Clap id of the argument, used to find its position on the command line.
    fn arg_id(&self) -> &'static str;
    fn assignment(&self) -> Option<String>;
}

#[derive(Args, Debug, Clone, Default)]
pub struct AckersArg {
    /// Number of acker executors for the topology. Defaults to the number of
    /// worker nodes in the environment.
    #[arg(short = 'a', long, value_name = "N")]
    pub ackers: Option<String>,
}

impl OptionFlag for AckersArg {
    fn arg_id(&self) -> &'static str {
        "ackers"
    }

    fn assignment(&self) -> Option<String> {
        self.ackers.as_deref().map(|v| option_alias(ACKER_EXECUTORS, v))
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArg {
    /// Path to the project config (config.json, topoctl.toml or topoctl.yaml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct DebugArg {
    /// Set topology.debug and switch worker logging to debug
    #[arg(
        short = 'd',
        long,
        value_name = "VALUE",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub debug: Option<String>,
}

impl OptionFlag for DebugArg {
    fn arg_id(&self) -> &'static str {
        "debug"
    }

    fn assignment(&self) -> Option<String> {
        self.debug.as_deref().map(|v| option_alias(DEBUG, v))
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct EnvironmentArg {
    /// Environment from the `envs` section of the project config. Optional
    /// when only one environment is defined.
    #[arg(short = 'e', long, value_name = "ENV", env = "TOPOCTL_ENV")]
    pub environment: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct NameArg {
    /// Topology to act on. Optional when only one topology is defined.
    #[arg(short = 'n', long, value_name = "NAME")]
    pub name: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OptionArgs {
    /// Topology option passed on to the cluster, e.g. `-o topology.debug=true`.
    /// May be repeated.
    #[arg(short = 'o', long = "option", value_name = "KEY=VALUE")]
    pub options: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OverrideNameArg {
    /// Use this name instead of NAME for virtualenvs and when submitting or
    /// killing, so one definition can run twice
    #[arg(short = 'N', long, value_name = "NAME")]
    pub override_name: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OverwriteVirtualenvArg {
    /// Recreate the virtualenv even if it already exists
    #[arg(long)]
    pub overwrite_virtualenv: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PatternArg {
    /// Pattern (extended regex) of log files to operate on
    #[arg(long, value_name = "PATTERN")]
    pub pattern: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct PoolSizeArg {
    /// Number of simultaneous SSH connections
    #[arg(long, value_name = "N", default_value_t = DEFAULT_POOL_SIZE)]
    pub pool_size: usize,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RequirementsArg {
    /// Requirements files for the topology's virtualenv. Defaults to
    /// NAME.txt in the `virtualenv_specs` directory.
    #[arg(short = 'r', long, value_name = "FILE", num_args = 1..)]
    pub requirements: Vec<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SimpleJarArg {
    /// Build a plain JAR with only the project code instead of an uber-JAR
    #[arg(short = 's', long)]
    pub simple_jar: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TimeoutArg {
    /// Milliseconds to wait for Nimbus to respond
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout: u64,
}

#[derive(Args, Debug, Clone, Default)]
pub struct UserArg {
    /// User to sudo as when creating and deleting virtualenvs
    #[arg(long, value_name = "USER")]
    pub user: Option<String>,
}

impl OptionFlag for UserArg {
    fn arg_id(&self) -> &'static str {
        "user"
    }

    fn assignment(&self) -> Option<String> {
        self.user.as_deref().map(|v| option_alias(SUDO_USER, v))
    }
}

/// [`UserArg`] with `-u` as well.
#[derive(Args, Debug, Clone, Default)]
pub struct UserShortArg {
    /// User to sudo as when creating and deleting virtualenvs
    #[arg(short = 'u', long, value_name = "USER")]
    pub user: Option<String>,
}

impl OptionFlag for UserShortArg {
    fn arg_id(&self) -> &'static str {
        "user"
    }

    fn assignment(&self) -> Option<String> {
        self.user.as_deref().map(|v| option_alias(SUDO_USER, v))
    }
}

#[derive(Args, Debug, Clone)]
pub struct WaitArg {
    /// Seconds to wait before killing the topology
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_WAIT_SECS)]
    pub wait: u64,
}

#[derive(Args, Debug, Clone, Default)]
pub struct WorkersArg {
    /// Number of workers for the topology. Defaults to the number of worker
    /// nodes in the environment.
    #[arg(short = 'w', long, value_name = "N")]
    pub workers: Option<String>,
}

impl OptionFlag for WorkersArg {
    fn arg_id(&self) -> &'static str {
        "workers"
    }

    fn assignment(&self) -> Option<String> {
        self.workers.as_deref().map(|v| option_alias(WORKERS, v))
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct DryRunArg {
    /// Print the external commands instead of running them
    #[arg(long)]
    pub dry_run: bool,
}

impl DryRunArg {
    pub fn runner(&self) -> Box<dyn CommandRunner> {
        if self.dry_run {
            Box::new(DryRunner)
        } else {
            Box::new(SystemRunner)
        }
    }
}

/// Fold `-o` assignments and the alias flags into one option map in
/// command-line order, so whichever comes last wins.
pub fn collect_cli_options(
    matches: &ArgMatches,
    options: &OptionArgs,
    flags: &[&dyn OptionFlag],
) -> Result<OptionMap, OptionError> {
    let positions: Vec<usize> =
        matches.indices_of(OPTION_ARG_ID).map(Iterator::collect).unwrap_or_default();
    let mut ordered: Vec<(usize, String)> = options
        .options
        .iter()
        .enumerate()
        .map(|(i, raw)| (positions.get(i).copied().unwrap_or(usize::MAX), raw.clone()))
        .collect();
    ordered.extend(flags.iter().filter_map(|flag| {
        let assignment = flag.assignment()?;
        let position = matches.indices_of(flag.arg_id()).and_then(Iterator::last);
        Some((position.unwrap_or(usize::MAX), assignment))
    }));
    // Stable, so entries without a recorded position keep their relative order.
    ordered.sort_by_key(|(position, _)| *position);
    collect_assignments(ordered.into_iter().map(|(_, raw)| raw))
}
