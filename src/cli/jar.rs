//! Jar command implementation
//!
//! Packages the project with Leiningen. Topology sources under `src/` are
//! staged into `_resources/resources` so they end up inside the JAR.

use anyhow::{Context, Result};
use clap::Args;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::flags::{DryRunArg, SimpleJarArg};
use crate::exec::{run_checked, CommandRunner, CommandSpec};

const SOURCE_DIR: &str = "src";
const RESOURCES_DIR: &str = "_resources/resources";

#[derive(Args)]
pub struct JarArgs {
    #[command(flatten)]
    pub simple_jar: SimpleJarArg,
    #[command(flatten)]
    pub dry_run: DryRunArg,
}

pub fn run(args: JarArgs) -> Result<()> {
    let runner = args.dry_run.runner();
    let project_root = std::env::current_dir().context("Failed reading current directory")?;
    let jar = build_jar(runner.as_ref(), &project_root, args.simple_jar.simple_jar)?;
    println!("{}", jar.display());
    Ok(())
}

/// Build the JAR and return its path.
pub fn build_jar(runner: &dyn CommandRunner, project_root: &Path, simple_jar: bool) -> Result<PathBuf> {
    let jar_type = if simple_jar { "JAR" } else { "Uber-JAR" };
    let resources = project_root.join(RESOURCES_DIR);

    if !runner.is_dry_run() {
        let copied = stage_sources(&project_root.join(SOURCE_DIR), &resources)?;
        tracing::debug!(files = copied, dir = %resources.display(), "staged topology sources");
    }

    eprintln!("Cleaning from prior builds...");
    run_checked(runner, &CommandSpec::new("lein").arg("clean"))?;

    eprintln!("Creating topology {jar_type}...");
    let task = if simple_jar { "jar" } else { "uberjar" };
    let output = run_checked(runner, &CommandSpec::new("lein").arg(task))?;

    if runner.is_dry_run() {
        return Ok(PathBuf::from(format!("<{}>", task)));
    }

    let jar = find_created_jar(&output.stdout, simple_jar).ok_or_else(|| {
        anyhow::anyhow!("Failed to find JAR in 'lein {}' output:\n{}", task, output.stdout)
    })?;
    eprintln!("{jar_type} created: {jar}");

    if resources.is_dir() {
        fs::remove_dir_all(&resources)
            .with_context(|| format!("Failed removing {}", resources.display()))?;
    }
    Ok(PathBuf::from(jar))
}

/// Pick the `Created ...` line for the requested JAR type. Uber-JARs are the
/// ones ending in `standalone.jar`.
pub fn find_created_jar(output: &str, simple_jar: bool) -> Option<String> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("Created "))
        .find(|path| simple_jar != path.ends_with("standalone.jar"))
        .map(|path| path.trim().to_string())
}

/// Copy `src` into `dest`, replacing whatever was there. Returns the number of
/// files copied; a missing source directory copies nothing.
fn stage_sources(src: &Path, dest: &Path) -> Result<usize> {
    if dest.exists() {
        fs::remove_dir_all(dest).with_context(|| format!("Failed removing {}", dest.display()))?;
    }
    if !src.is_dir() {
        return Ok(0);
    }
    let mut copied = 0;
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.with_context(|| format!("Failed walking {}", src.display()))?;
        let relative = entry.path().strip_prefix(src)?;
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed creating {}", target.display()))?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed copying {}", entry.path().display()))?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::RecordingRunner;
    use crate::exec::CommandOutput;
    use tempfile::TempDir;

    const LEIN_OUTPUT: &str = "Compiling foo\nCreated /p/target/foo-0.1.jar\nCreated /p/target/foo-0.1-standalone.jar\n";

    #[test]
    fn picks_jar_matching_type() {
        assert_eq!(find_created_jar(LEIN_OUTPUT, true).as_deref(), Some("/p/target/foo-0.1.jar"));
        assert_eq!(
            find_created_jar(LEIN_OUTPUT, false).as_deref(),
            Some("/p/target/foo-0.1-standalone.jar")
        );
        assert_eq!(find_created_jar("nothing here", false), None);
    }

    #[test]
    fn builds_uberjar_and_cleans_resources() {
        let tmp = TempDir::new().expect("tmp");
        fs::create_dir_all(tmp.path().join("src/bolts")).expect("mkdir");
        fs::write(tmp.path().join("src/bolts/count.py"), "pass\n").expect("write");

        let runner = RecordingRunner::default().respond(
            "uberjar",
            CommandOutput { status: Some(0), stdout: LEIN_OUTPUT.into(), stderr: String::new() },
        );
        let jar = build_jar(&runner, tmp.path(), false).expect("jar");
        assert_eq!(jar, PathBuf::from("/p/target/foo-0.1-standalone.jar"));
        assert_eq!(runner.rendered(), vec!["lein clean", "lein uberjar"]);
        assert!(!tmp.path().join(RESOURCES_DIR).exists());
    }

    #[test]
    fn missing_jar_line_is_an_error() {
        let tmp = TempDir::new().expect("tmp");
        let runner = RecordingRunner::default();
        let err = build_jar(&runner, tmp.path(), true).unwrap_err();
        assert!(err.to_string().contains("Failed to find JAR"));
    }

    #[test]
    fn stages_sources_recursively() {
        let tmp = TempDir::new().expect("tmp");
        fs::create_dir_all(tmp.path().join("src/a/b")).expect("mkdir");
        fs::write(tmp.path().join("src/a/b/x.py"), "x").expect("write");
        fs::write(tmp.path().join("src/y.py"), "y").expect("write");
        let dest = tmp.path().join("out");
        assert_eq!(stage_sources(&tmp.path().join("src"), &dest).expect("stage"), 2);
        assert_eq!(fs::read_to_string(dest.join("a/b/x.py")).expect("read"), "x");
    }
}
