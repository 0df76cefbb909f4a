//! Update-virtualenv command implementation
//!
//! Creates or refreshes the topology's virtualenv on every worker. `submit`
//! does this on its own; the command exists for testing and debugging.

use anyhow::{Context, Result};
use clap::{ArgMatches, Args};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use super::context::TopologyContext;
use super::flags::{
    collect_cli_options, ConfigArg, DryRunArg, EnvironmentArg, NameArg, OptionArgs,
    OverrideNameArg, OverwriteVirtualenvArg, PoolSizeArg, RequirementsArg, UserArg,
};
use crate::cluster::RemoteEnv;
use crate::exec::{shell_quote, CommandRunner, RemoteShell};
use crate::utils::content_hash;

/// Package every topology virtualenv must contain.
pub const REQUIRED_PACKAGE: &str = "streamparse";

#[derive(Args)]
pub struct UpdateVirtualenvArgs {
    #[command(flatten)]
    pub config: ConfigArg,
    #[command(flatten)]
    pub environment: EnvironmentArg,
    #[command(flatten)]
    pub overwrite: OverwriteVirtualenvArg,
    #[command(flatten)]
    pub name: NameArg,
    #[command(flatten)]
    pub options: OptionArgs,
    #[command(flatten)]
    pub override_name: OverrideNameArg,
    #[command(flatten)]
    pub pool_size: PoolSizeArg,
    #[command(flatten)]
    pub requirements: RequirementsArg,
    #[command(flatten)]
    pub user: UserArg,
    #[command(flatten)]
    pub dry_run: DryRunArg,
}

pub fn run(args: UpdateVirtualenvArgs, matches: &ArgMatches) -> Result<()> {
    let ctx = TopologyContext::load(
        args.config.config.as_deref(),
        args.environment.environment.as_deref(),
        args.name.name.as_deref(),
        args.override_name.override_name.as_deref(),
    )?;
    let cli_options = collect_cli_options(matches, &args.options, &[&args.user])?;
    let resolved = ctx.resolve(&cli_options, false)?;
    let remote = RemoteEnv::from_options(&ctx.env_name, &ctx.env, &resolved);

    let plan = VirtualenvPlan {
        name: ctx.name.clone(),
        requirements: requirements_or_default(&ctx, &args.requirements.requirements),
        flags: resolved.get("virtualenv_flags").and_then(Value::as_str).map(str::to_string),
        overwrite: args.overwrite.overwrite_virtualenv,
    };
    let runner = args.dry_run.runner();
    create_or_update(runner.as_ref(), &remote, &plan, args.pool_size.pool_size)
}

/// What to build on the workers.
#[derive(Debug, Clone)]
pub struct VirtualenvPlan {
    pub name: String,
    pub requirements: Vec<PathBuf>,
    pub flags: Option<String>,
    pub overwrite: bool,
}

/// Explicit requirements files, or `<virtualenv_specs>/<topology>.txt`.
pub fn requirements_or_default(ctx: &TopologyContext, explicit: &[PathBuf]) -> Vec<PathBuf> {
    if !explicit.is_empty() {
        return explicit.to_vec();
    }
    vec![ctx.config.virtualenv_specs_dir().join(format!("{}.txt", ctx.topology.name))]
}

pub fn create_or_update(
    runner: &dyn CommandRunner,
    remote: &RemoteEnv,
    plan: &VirtualenvPlan,
    pool_size: usize,
) -> Result<()> {
    ensure_required_package(&plan.requirements)?;
    let root = remote.virtualenv_root.as_deref().ok_or_else(|| {
        anyhow::anyhow!("environment '{}' has no `virtualenv_root`", remote.env_name)
    })?;
    if remote.workers.is_empty() {
        anyhow::bail!("environment '{}' has no worker hosts", remote.env_name);
    }
    let venv_path = format!("{}/{}", root, plan.name);
    let quoted_venv = shell_quote(&venv_path);
    let shell = RemoteShell::new(runner, remote.user.clone(), pool_size);
    let hosts = &remote.workers;

    let targets: Vec<String> = if plan.overwrite {
        let sudo = remote.needs_sudo().then_some(remote.sudo_user.as_str());
        shell.run_all(hosts, &format!("rm -rf {quoted_venv}"), sudo)?;
        hosts.clone()
    } else {
        let probe = format!("if [ -d {quoted_venv} ]; then echo present; fi");
        shell
            .run_all(hosts, &probe, None)?
            .into_iter()
            .filter(|out| out.output.stdout.trim().is_empty())
            .map(|out| out.host)
            .collect()
    };

    if !targets.is_empty() {
        eprintln!("Creating virtualenvs as necessary...");
        let create = match plan.flags.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
            Some(flags) => format!("virtualenv {quoted_venv} {flags}"),
            None => format!("virtualenv {quoted_venv}"),
        };
        shell.run_all(&targets, &create, None)?;
    }

    let mut remote_requirements = Vec::with_capacity(plan.requirements.len());
    for local in &plan.requirements {
        let content = fs::read_to_string(local)
            .with_context(|| format!("Failed reading {}", local.display()))?;
        let remote_path = format!("/tmp/{}_requirements-{}.txt", REQUIRED_PACKAGE, content_hash(&content));
        shell.copy_to_all(hosts, local, &remote_path)?;
        remote_requirements.push(remote_path);
    }

    let install = format!(
        "source {activate} && pip install --upgrade 'pip>=9.0' && pip install --exists-action w \
         --upgrade --upgrade-strategy only-if-needed -r {reqs}",
        activate = shell_quote(&format!("{venv_path}/bin/activate")),
        reqs = remote_requirements.join(" -r "),
    );
    shell.run_all(hosts, &install, None)?;
    shell.run_all(hosts, &format!("rm -f {}", remote_requirements.join(" ")), None)?;

    tracing::info!(
        env = %remote.env_name,
        hosts = hosts.len(),
        user = shell.user(),
        "virtualenvs updated"
    );
    eprintln!("Updated virtualenvs on all workers.");
    Ok(())
}

fn ensure_required_package(requirements: &[PathBuf]) -> Result<()> {
    for path in requirements {
        if mentions_required_package(path)? {
            return Ok(());
        }
    }
    let checked: Vec<String> = requirements.iter().map(|p| p.display().to_string()).collect();
    anyhow::bail!(
        "Could not find {pkg} in your requirements files (checked {checked}). \
         {pkg} is required for all topologies.",
        pkg = REQUIRED_PACKAGE,
        checked = checked.join(", ")
    )
}

fn mentions_required_package(path: &Path) -> Result<bool> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed reading {}", path.display()))?;
    Ok(content.lines().any(|line| line.contains(REQUIRED_PACKAGE)))
}
