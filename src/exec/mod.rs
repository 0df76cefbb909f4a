//! External command hand-off
//!
//! Everything that touches the cluster goes through a [`CommandRunner`], so
//! commands can be printed instead of run (`--dry-run`) and scripted in tests.

use std::fmt;
use std::process::{Command, Stdio};
use thiserror::Error;

pub mod remote;

pub use remote::{HostOutput, RemoteShell};

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to start `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with status {status}: {stderr}")]
    Failed { command: String, status: String, stderr: String },
    #[error("could not build SSH worker pool")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("command failed on {} host(s):\n{}", .0.len(), format_host_failures(.0))]
    Remote(Vec<(String, String)>),
}

fn format_host_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(host, message)| format!("  {host}: {message}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), args: Vec::new() }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success() -> Self {
        Self { status: Some(0), ..Default::default() }
    }

    pub fn is_success(&self) -> bool {
        self.status == Some(0)
    }
}

pub trait CommandRunner: Send + Sync {
    /// Run and capture output.
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput, ExecError>;

    /// Run with inherited stdout/stderr, for long-lived output such as `tail -f`.
    fn stream(&self, command: &CommandSpec) -> Result<Option<i32>, ExecError>;

    /// Whether commands are only being printed.
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Runs commands on this machine.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput, ExecError> {
        tracing::debug!(command = %command, "running");
        let output = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ExecError::Spawn { program: command.program.clone(), source })?;
        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn stream(&self, command: &CommandSpec) -> Result<Option<i32>, ExecError> {
        tracing::debug!(command = %command, "streaming");
        let status = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .status()
            .map_err(|source| ExecError::Spawn { program: command.program.clone(), source })?;
        Ok(status.code())
    }
}

/// Prints each command to stdout and reports success without running it.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunner;

impl CommandRunner for DryRunner {
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput, ExecError> {
        println!("{command}");
        Ok(CommandOutput::success())
    }

    fn stream(&self, command: &CommandSpec) -> Result<Option<i32>, ExecError> {
        println!("{command}");
        Ok(Some(0))
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}

/// Run a command and turn a non-zero exit into an error.
pub fn run_checked(
    runner: &dyn CommandRunner,
    command: &CommandSpec,
) -> Result<CommandOutput, ExecError> {
    let output = runner.run(command)?;
    if output.is_success() {
        Ok(output)
    } else {
        Err(ExecError::Failed {
            command: command.to_string(),
            status: describe_status(output.status),
            stderr: output.stderr.trim().to_string(),
        })
    }
}

pub(crate) fn describe_status(status: Option<i32>) -> String {
    status.map(|code| code.to_string()).unwrap_or_else(|| "signal".to_string())
}

/// Quote a word for a POSIX shell. Plain words pass through untouched.
pub fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=:,@%+".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingRunner;
    use super::*;

    #[test]
    fn quotes_only_when_needed() {
        assert_eq!(shell_quote("topology.workers=4"), "topology.workers=4");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn command_display_is_shell_ready() {
        let cmd = CommandSpec::new("storm").arg("kill").args(["my topo", "-w", "5"]);
        assert_eq!(cmd.to_string(), "storm kill 'my topo' -w 5");
    }

    #[test]
    fn run_checked_reports_failures() {
        let runner = RecordingRunner::default().respond(
            "lein",
            CommandOutput { status: Some(1), stdout: String::new(), stderr: "boom\n".into() },
        );
        let err = run_checked(&runner, &CommandSpec::new("lein").arg("clean")).unwrap_err();
        assert_eq!(err.to_string(), "`lein clean` exited with status 1: boom");
    }
}
