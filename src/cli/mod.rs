//! Command-line interface for topoctl
//!
//! Every subcommand is assembled from the reusable flag groups in [`flags`];
//! those that talk to the cluster resolve the topology options first and then
//! hand off to `storm`, `ssh` or `lein`.

use anyhow::Result;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use clap_complete::Shell;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub mod context;
pub mod flags;
mod jar;
mod kill;
mod options;
mod submit;
mod tail;
mod virtualenv;

/// Resolve topology options and drive Storm-style cluster tooling
#[derive(Parser)]
#[command(name = "topoctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (sets log level to DEBUG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the fully resolved option set for a topology
    Options(options::OptionsArgs),

    /// Build, prepare and submit a topology to the cluster
    Submit(Box<submit::SubmitArgs>),

    /// Kill a running topology
    Kill(kill::KillArgs),

    /// Create a JAR that can be used to deploy a topology
    Jar(jar::JarArgs),

    /// Tail the topology's log files on every worker
    Tail(tail::TailArgs),

    /// Create or update the topology's virtualenv on every worker
    UpdateVirtualenv(virtualenv::UpdateVirtualenvArgs),

    /// Generate a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run() -> Result<()> {
    // Raw matches are kept so option flags can be folded in command-line order.
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    let sub_matches = matches.subcommand().map(|(_, m)| m.clone()).unwrap_or_default();

    // RUST_LOG in the environment always takes precedence; --verbose falls back to DEBUG.
    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    match cli.command {
        Commands::Options(args) => options::run(args, &sub_matches),
        Commands::Submit(args) => submit::run(*args, &sub_matches),
        Commands::Kill(args) => kill::run(args),
        Commands::Jar(args) => jar::run(args),
        Commands::Tail(args) => tail::run(args),
        Commands::UpdateVirtualenv(args) => virtualenv::run(args, &sub_matches),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "topoctl", &mut std::io::stdout());
            Ok(())
        }
    }
}
