//! Submit command implementation
//!
//! Resolves the final option set, prepares virtualenvs and the JAR, and hands
//! everything to `storm jar`.

use anyhow::{Context, Result};
use clap::{ArgMatches, Args};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::context::TopologyContext;
use super::flags::{
    collect_cli_options, AckersArg, ConfigArg, DebugArg, DryRunArg, EnvironmentArg, NameArg,
    OptionArgs, OverrideNameArg, OverwriteVirtualenvArg, PoolSizeArg, RequirementsArg,
    SimpleJarArg, TimeoutArg, UserShortArg, WaitArg, WorkersArg,
};
use super::jar::build_jar;
use super::kill::{client_options, config_args, kill_topology};
use super::virtualenv::{create_or_update, requirements_or_default, VirtualenvPlan};
use crate::cluster::RemoteEnv;
use crate::domain::OptionMap;
use crate::exec::{run_checked, CommandSpec};
use crate::options::is_truthy;

const TOPOLOGY_NAME: &str = "topology.name";

#[derive(Args)]
pub struct SubmitArgs {
    #[command(flatten)]
    pub ackers: AckersArg,
    #[command(flatten)]
    pub config: ConfigArg,
    #[command(flatten)]
    pub debug: DebugArg,
    #[command(flatten)]
    pub environment: EnvironmentArg,

    /// Kill a running topology with the same name before submitting
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Submit this JAR instead of building one
    #[arg(long, value_name = "JAR")]
    pub jar: Option<PathBuf>,

    #[command(flatten)]
    pub name: NameArg,
    #[command(flatten)]
    pub options: OptionArgs,
    #[command(flatten)]
    pub override_name: OverrideNameArg,
    #[command(flatten)]
    pub overwrite: OverwriteVirtualenvArg,
    #[command(flatten)]
    pub pool_size: PoolSizeArg,
    #[command(flatten)]
    pub requirements: RequirementsArg,
    #[command(flatten)]
    pub simple_jar: SimpleJarArg,
    #[command(flatten)]
    pub timeout: TimeoutArg,
    #[command(flatten)]
    pub user: UserShortArg,
    #[command(flatten)]
    pub wait: WaitArg,
    #[command(flatten)]
    pub workers: WorkersArg,
    #[command(flatten)]
    pub dry_run: DryRunArg,
}

pub fn run(args: SubmitArgs, matches: &ArgMatches) -> Result<()> {
    let ctx = TopologyContext::load(
        args.config.config.as_deref(),
        args.environment.environment.as_deref(),
        args.name.name.as_deref(),
        args.override_name.override_name.as_deref(),
    )?;
    let cli_options = collect_cli_options(
        matches,
        &args.options,
        &[&args.ackers, &args.workers, &args.debug, &args.user],
    )?;
    let mut resolved = ctx.resolve(&cli_options, false)?;
    resolved.insert(TOPOLOGY_NAME.to_string(), Value::String(ctx.name.clone()));

    let runner = args.dry_run.runner();
    let remote = RemoteEnv::from_options(&ctx.env_name, &ctx.env, &resolved);

    if installs_virtualenv(&resolved) {
        let plan = VirtualenvPlan {
            name: ctx.name.clone(),
            requirements: requirements_or_default(&ctx, &args.requirements.requirements),
            flags: resolved.get("virtualenv_flags").and_then(Value::as_str).map(str::to_string),
            overwrite: args.overwrite.overwrite_virtualenv,
        };
        create_or_update(runner.as_ref(), &remote, &plan, args.pool_size.pool_size)?;
    }

    let jar = match args.jar {
        Some(jar) => jar,
        None => {
            let project_root = std::env::current_dir().context("Failed reading current directory")?;
            build_jar(runner.as_ref(), &project_root, args.simple_jar.simple_jar)?
        }
    };

    let client = client_options(&ctx.env, args.timeout.timeout);
    if args.force {
        kill_topology(runner.as_ref(), &ctx.name, args.wait.wait, &client)?;
        if !runner.is_dry_run() {
            // The name stays taken until the kill wait has passed.
            std::thread::sleep(Duration::from_secs(args.wait.wait));
        }
    }

    let command = submit_command(&jar, &ctx.config.jar_main_class, &ctx.topology.file, &client, &resolved);
    let output = run_checked(runner.as_ref(), &command)
        .with_context(|| format!("Failed submitting topology '{}'", ctx.name))?;
    if !output.stdout.trim().is_empty() {
        println!("{}", output.stdout.trim_end());
    }
    tracing::info!(topology = %ctx.name, env = %ctx.env_name, "topology submitted");
    Ok(())
}

/// Virtualenvs are built unless `use_virtualenv` or `install_virtualenv` is
/// switched off.
pub fn installs_virtualenv(options: &OptionMap) -> bool {
    let enabled = |key: &str| options.get(key).map_or(true, is_truthy);
    enabled("use_virtualenv") && enabled("install_virtualenv")
}

pub fn submit_command(
    jar: &Path,
    main_class: &str,
    topology_file: &Path,
    client: &OptionMap,
    options: &OptionMap,
) -> CommandSpec {
    CommandSpec::new("storm")
        .args(config_args(client))
        .args(config_args(options))
        .arg("jar")
        .arg(jar.display().to_string())
        .arg(main_class)
        .arg("--remote")
        .arg(topology_file.display().to_string())
}
