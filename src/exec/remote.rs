//! SSH fan-out over the worker hosts

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::path::Path;

use super::{describe_status, shell_quote, CommandOutput, CommandRunner, CommandSpec, ExecError};

const SSH_OPTIONS: [&str; 2] = ["-o", "BatchMode=yes"];

#[derive(Debug, Clone)]
pub struct HostOutput {
    pub host: String,
    pub output: CommandOutput,
}

/// Runs shell commands on a set of hosts through the `ssh`/`scp` binaries,
/// at most `pool_size` at a time.
pub struct RemoteShell<'a> {
    runner: &'a dyn CommandRunner,
    user: String,
    pool_size: usize,
}

impl<'a> RemoteShell<'a> {
    pub fn new(runner: &'a dyn CommandRunner, user: impl Into<String>, pool_size: usize) -> Self {
        Self { runner, user: user.into(), pool_size: pool_size.max(1) }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Build the `ssh` invocation for one host. With `sudo_user` the command
    /// runs under `sudo -u USER sh -c`.
    pub fn ssh_command(&self, host: &str, command: &str, sudo_user: Option<&str>) -> CommandSpec {
        let remote = match sudo_user {
            Some(user) => {
                format!("sudo -u {} sh -c {}", shell_quote(user), shell_quote(command))
            }
            None => command.to_string(),
        };
        CommandSpec::new("ssh")
            .args(SSH_OPTIONS)
            .arg(format!("{}@{}", self.user, host))
            .arg(remote)
    }

    pub fn scp_command(&self, host: &str, local: &Path, remote: &str) -> CommandSpec {
        CommandSpec::new("scp")
            .args(SSH_OPTIONS)
            .arg(local.display().to_string())
            .arg(format!("{}@{}:{}", self.user, host, remote))
    }

    /// Run `command` on every host and return the captured outputs in host
    /// order. Any failing host fails the whole call.
    pub fn run_all(
        &self,
        hosts: &[String],
        command: &str,
        sudo_user: Option<&str>,
    ) -> Result<Vec<HostOutput>, ExecError> {
        let results = self.fan_out(hosts, |host| {
            let spec = self.ssh_command(host, command, sudo_user);
            self.runner.run(&spec)
        })?;
        collect_outputs(hosts, results)
    }

    /// Like [`run_all`](Self::run_all) but with output streamed to the terminal.
    pub fn stream_all(&self, hosts: &[String], command: &str) -> Result<(), ExecError> {
        let results = self.fan_out(hosts, |host| {
            let spec = self.ssh_command(host, command, None);
            self.runner
                .stream(&spec)
                .map(|status| CommandOutput { status, ..Default::default() })
        })?;
        collect_outputs(hosts, results).map(|_| ())
    }

    /// Copy a local file to the same remote path on every host.
    pub fn copy_to_all(&self, hosts: &[String], local: &Path, remote: &str) -> Result<(), ExecError> {
        let results = self.fan_out(hosts, |host| {
            let spec = self.scp_command(host, local, remote);
            self.runner.run(&spec)
        })?;
        collect_outputs(hosts, results).map(|_| ())
    }

    fn fan_out<F>(
        &self,
        hosts: &[String],
        task: F,
    ) -> Result<Vec<Result<CommandOutput, ExecError>>, ExecError>
    where
        F: Fn(&str) -> Result<CommandOutput, ExecError> + Send + Sync,
    {
        tracing::debug!(hosts = hosts.len(), pool_size = self.pool_size, "ssh fan-out");
        let pool = ThreadPoolBuilder::new().num_threads(self.pool_size).build()?;
        Ok(pool.install(|| hosts.par_iter().map(|host| task(host.as_str())).collect()))
    }
}

fn collect_outputs(
    hosts: &[String],
    results: Vec<Result<CommandOutput, ExecError>>,
) -> Result<Vec<HostOutput>, ExecError> {
    let mut outputs = Vec::with_capacity(hosts.len());
    let mut failures = Vec::new();
    for (host, result) in hosts.iter().zip(results) {
        match result {
            Ok(output) if output.is_success() => {
                outputs.push(HostOutput { host: host.clone(), output })
            }
            Ok(output) => {
                let stderr = output.stderr.trim();
                let message = if stderr.is_empty() {
                    format!("exit status {}", describe_status(output.status))
                } else {
                    format!("exit status {}: {}", describe_status(output.status), stderr)
                };
                tracing::warn!(host = %host, "{}", message);
                failures.push((host.clone(), message));
            }
            Err(err) => failures.push((host.clone(), err.to_string())),
        }
    }
    if failures.is_empty() {
        Ok(outputs)
    } else {
        Err(ExecError::Remote(failures))
    }
}
