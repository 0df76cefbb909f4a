//! Kill command implementation

use anyhow::Result;
use clap::Args;
use serde_json::Value;

use super::context::TopologyContext;
use super::flags::{
    ConfigArg, DryRunArg, EnvironmentArg, NameArg, OverrideNameArg, TimeoutArg, WaitArg,
};
use crate::domain::{EnvConfig, OptionMap};
use crate::exec::{run_checked, CommandRunner, CommandSpec};
use crate::options::{NIMBUS_SEEDS, THRIFT_TIMEOUT_MS};

const NIMBUS_PORT: &str = "nimbus.thrift.port";

#[derive(Args)]
pub struct KillArgs {
    #[command(flatten)]
    pub config: ConfigArg,
    #[command(flatten)]
    pub environment: EnvironmentArg,
    #[command(flatten)]
    pub name: NameArg,
    #[command(flatten)]
    pub override_name: OverrideNameArg,
    #[command(flatten)]
    pub timeout: TimeoutArg,
    #[command(flatten)]
    pub wait: WaitArg,
    #[command(flatten)]
    pub dry_run: DryRunArg,
}

pub fn run(args: KillArgs) -> Result<()> {
    let ctx = TopologyContext::load(
        args.config.config.as_deref(),
        args.environment.environment.as_deref(),
        args.name.name.as_deref(),
        args.override_name.override_name.as_deref(),
    )?;
    let runner = args.dry_run.runner();
    let client = client_options(&ctx.env, args.timeout.timeout);
    kill_topology(runner.as_ref(), &ctx.name, args.wait.wait, &client)
}

pub fn kill_topology(
    runner: &dyn CommandRunner,
    name: &str,
    wait_secs: u64,
    client: &OptionMap,
) -> Result<()> {
    let command = CommandSpec::new("storm")
        .args(config_args(client))
        .args(["kill".to_string(), name.to_string(), "-w".to_string(), wait_secs.to_string()]);
    run_checked(runner, &command)?;
    tracing::info!(topology = name, wait_secs, "kill requested");
    Ok(())
}

/// Settings for the `storm` client itself: where Nimbus is and how long to
/// wait for it.
pub fn client_options(env: &EnvConfig, timeout_ms: u64) -> OptionMap {
    let mut client = OptionMap::new();
    if let Some(nimbus) = env.nimbus.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        let (host, port) = match nimbus.rsplit_once(':') {
            Some((host, port)) => match port.parse::<u16>() {
                Ok(port) => (host, Some(port)),
                Err(_) => (nimbus, None),
            },
            None => (nimbus, None),
        };
        client.insert(NIMBUS_SEEDS.to_string(), Value::Array(vec![Value::String(host.to_string())]));
        if let Some(port) = port {
            client.insert(NIMBUS_PORT.to_string(), Value::from(port));
        }
    }
    client.insert(THRIFT_TIMEOUT_MS.to_string(), Value::from(timeout_ms));
    client
}

/// `-c key=value` pairs for the `storm` client; values are JSON encoded.
pub fn config_args(options: &OptionMap) -> Vec<String> {
    options
        .iter()
        .flat_map(|(key, value)| ["-c".to_string(), format!("{key}={value}")])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::RecordingRunner;
    use serde_json::json;

    #[test]
    fn client_options_split_nimbus_port() {
        let env = EnvConfig { nimbus: Some("nimbus.local:6627".into()), ..Default::default() };
        assert_eq!(
            Value::Object(client_options(&env, 7000)),
            json!({
                "nimbus.seeds": ["nimbus.local"],
                "nimbus.thrift.port": 6627,
                "storm.thrift.socket.timeout.ms": 7000,
            })
        );

        let env = EnvConfig { nimbus: Some("nimbus.local".into()), ..Default::default() };
        assert!(!client_options(&env, 1).contains_key("nimbus.thrift.port"));
    }

    #[test]
    fn config_args_encode_values_as_json() {
        let options = json!({"topology.workers": 2, "sudo_user": "root", "hosts": ["a"]});
        assert_eq!(
            config_args(options.as_object().unwrap()),
            vec!["-c", "topology.workers=2", "-c", "sudo_user=\"root\"", "-c", "hosts=[\"a\"]"]
        );
    }

    #[test]
    fn kill_waits() {
        let runner = RecordingRunner::default();
        kill_topology(&runner, "wordcount", 5, &OptionMap::new()).expect("kill");
        assert_eq!(runner.rendered(), vec!["storm kill wordcount -w 5"]);
    }
}
