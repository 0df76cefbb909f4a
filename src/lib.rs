//! Option composition and configuration resolution for Storm-style clusters.
//!
//! The core is [`options::resolve_options`], which layers CLI options over
//! topology options over environment config and fills in derived defaults.

pub mod cli;
pub mod cluster;
pub mod config;
pub mod domain;
pub mod exec;
pub mod options;
pub mod utils;
