//! topoctl: resolve topology options and drive Storm-style cluster tooling
//!
//! Merges options from the command line, the topology definition and the
//! environment config, then hands the result to `storm`, `ssh` and `lein`.

use anyhow::Result;

fn main() -> Result<()> {
    topoctl::cli::run()
}
