//! Options command implementation

use anyhow::{Context, Result};
use clap::{ArgMatches, Args, ValueEnum};
use serde_json::Value;

use super::context::TopologyContext;
use super::flags::{
    collect_cli_options, AckersArg, ConfigArg, DebugArg, EnvironmentArg, NameArg, OptionArgs,
    OverrideNameArg, UserArg, WorkersArg,
};
use crate::domain::OptionMap;
use crate::options::resolve::apply_local_mode;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

#[derive(Args)]
pub struct OptionsArgs {
    #[command(flatten)]
    pub ackers: AckersArg,
    #[command(flatten)]
    pub config: ConfigArg,
    #[command(flatten)]
    pub debug: DebugArg,
    #[command(flatten)]
    pub environment: EnvironmentArg,
    #[command(flatten)]
    pub name: NameArg,
    #[command(flatten)]
    pub options: OptionArgs,
    #[command(flatten)]
    pub override_name: OverrideNameArg,
    #[command(flatten)]
    pub user: UserArg,
    #[command(flatten)]
    pub workers: WorkersArg,

    /// Resolve for a single-machine run: no worker discovery, one worker
    #[arg(long)]
    pub local: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

pub fn run(args: OptionsArgs, matches: &ArgMatches) -> Result<()> {
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

    let mut resolved = ctx.resolve(&cli_options, args.local)?;
    if args.local {
        apply_local_mode(&mut resolved);
    }

    println!("{}", render(resolved, args.format)?);
    Ok(())
}

pub fn render(options: OptionMap, format: OutputFormat) -> Result<String> {
    let value = Value::Object(options);
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&value).context("Failed rendering options as JSON")
        }
        OutputFormat::Yaml => serde_yaml::to_string(&value)
            .map(|s| s.trim_end().to_string())
            .context("Failed rendering options as YAML"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_yaml() {
        let options = json!({"topology.workers": 2, "sudo_user": "root"});
        let out = render(options.as_object().cloned().unwrap(), OutputFormat::Yaml).unwrap();
        assert_eq!(out, "topology.workers: 2\nsudo_user: root");
    }

    #[test]
    fn renders_json_in_insertion_order() {
        let mut options = OptionMap::new();
        options.insert("z".into(), json!(1));
        options.insert("a".into(), json!(true));
        let out = render(options, OutputFormat::Json).unwrap();
        assert_eq!(out, "{\n  \"z\": 1,\n  \"a\": true\n}");
    }
}
