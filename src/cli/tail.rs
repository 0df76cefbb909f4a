//! Tail command implementation

use anyhow::Result;
use clap::Args;

use super::context::TopologyContext;
use super::flags::{
    ConfigArg, DryRunArg, EnvironmentArg, NameArg, OverrideNameArg, PatternArg, PoolSizeArg,
};
use crate::cluster::RemoteEnv;
use crate::domain::OptionMap;
use crate::exec::{shell_quote, RemoteShell};

#[derive(Args)]
pub struct TailArgs {
    #[command(flatten)]
    pub config: ConfigArg,
    #[command(flatten)]
    pub environment: EnvironmentArg,

    /// Keep files open and print lines as they are appended (`tail -f`)
    #[arg(short = 'f', long)]
    pub follow: bool,

    /// Print the last NUM_LINES lines of each log
    #[arg(short = 'l', long, value_name = "NUM_LINES", default_value_t = 10)]
    pub num_lines: usize,

    #[command(flatten)]
    pub name: NameArg,
    #[command(flatten)]
    pub override_name: OverrideNameArg,
    #[command(flatten)]
    pub pool_size: PoolSizeArg,
    #[command(flatten)]
    pub pattern: PatternArg,
    #[command(flatten)]
    pub dry_run: DryRunArg,
}

pub fn run(args: TailArgs) -> Result<()> {
    let ctx = TopologyContext::load(
        args.config.config.as_deref(),
        args.environment.environment.as_deref(),
        args.name.name.as_deref(),
        args.override_name.override_name.as_deref(),
    )?;
    let resolved = ctx.resolve(&OptionMap::new(), false)?;
    let remote = RemoteEnv::from_options(&ctx.env_name, &ctx.env, &resolved);

    let Some(log_path) = remote.log_path.as_deref() else {
        anyhow::bail!(
            "Cannot find log files without `log_path` or `log.path` for environment '{}'",
            remote.env_name
        );
    };

    let command = tail_command(
        &LogQuery {
            topology_name: &ctx.name,
            pattern: args.pattern.pattern.as_deref(),
            is_old_storm: remote.is_old_storm,
            log_path,
        },
        args.num_lines,
        args.follow,
    );
    let runner = args.dry_run.runner();
    let shell = RemoteShell::new(runner.as_ref(), remote.user.clone(), args.pool_size.pool_size);
    shell.stream_all(&remote.workers, &command)?;
    Ok(())
}

/// Which log files to look at on a worker.
#[derive(Debug, Clone, Copy)]
pub struct LogQuery<'a> {
    pub topology_name: &'a str,
    pub pattern: Option<&'a str>,
    pub is_old_storm: bool,
    pub log_path: &'a str,
}

/// Shell pipeline listing the topology's log files. Pre-1.0 clusters keep
/// worker logs flat in the log directory with the topology name in the file
/// name; newer ones nest them under `workers-artifacts/<topology-id>/`.
pub fn logfiles_command(query: &LogQuery<'_>) -> String {
    let glob = shell_quote(&format!("*{}*", query.topology_name));
    let mut cmd = if query.is_old_storm {
        format!("find {} -maxdepth 1 -type f -name {glob}", shell_quote(query.log_path))
    } else {
        format!("find {} -type f -path {glob}", shell_quote(query.log_path))
    };
    if let Some(pattern) = query.pattern {
        cmd.push_str(&format!(" | grep -E {}", shell_quote(pattern)));
    }
    cmd
}

pub fn tail_command(query: &LogQuery<'_>, num_lines: usize, follow: bool) -> String {
    let mut cmd = format!("{} | xargs -r tail -n {num_lines}", logfiles_command(query));
    if follow {
        cmd.push_str(" -f");
    }
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(is_old_storm: bool, pattern: Option<&'static str>) -> LogQuery<'static> {
        LogQuery { topology_name: "wordcount", pattern, is_old_storm, log_path: "/var/log/storm" }
    }

    #[test]
    fn new_storm_matches_nested_paths() {
        assert_eq!(
            tail_command(&query(false, None), 10, false),
            "find /var/log/storm -type f -path '*wordcount*' | xargs -r tail -n 10"
        );
    }

    #[test]
    fn old_storm_stays_flat() {
        assert_eq!(
            logfiles_command(&query(true, Some("worker-67"))),
            "find /var/log/storm -maxdepth 1 -type f -name '*wordcount*' | grep -E worker-67"
        );
    }

    #[test]
    fn follow_appends_flag() {
        assert!(tail_command(&query(false, Some("worker.log$")), 50, true)
            .ends_with("| grep -E 'worker.log$' | xargs -r tail -n 50 -f"));
    }
}
