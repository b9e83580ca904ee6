//! CLI command definitions for the `stagecoach` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod run;
pub mod status;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use stagecoach_types::config::BackendKind;

/// Run and inspect resumable multi-stage workflows.
#[derive(Parser)]
#[command(name = "stagecoach", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors. `--json` output is still printed.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Sync backend (sqlite, file or memory). Overrides config.toml.
    #[arg(long, global = true, env = "STAGECOACH_BACKEND")]
    pub backend: Option<BackendKind>,

    /// Stage lease in seconds. Overrides config.toml.
    #[arg(long, global = true)]
    pub lease_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run (or resume) the demo workflow for an instance.
    Run {
        /// Instance id.
        #[arg(long)]
        id: String,

        /// Seed handed to the first stage and to every handler.
        #[arg(long, default_value = "seed")]
        seed: String,

        /// Parse the seed as JSON instead of taking it as a string.
        #[arg(long)]
        seed_json: bool,

        /// Stage that should bookmark, suspending the run after it.
        #[arg(long, value_parser = stage_name)]
        bookmark_at: Option<String>,

        /// Stage whose handler should fail.
        #[arg(long, value_parser = stage_name)]
        fail_at: Option<String>,
    },

    /// Show the persisted state of an instance.
    Status {
        /// Instance id.
        #[arg(long)]
        id: String,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// How a command reports its result on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Styled,
    Json,
    Quiet,
}

impl Cli {
    /// `--json` wins over `--quiet`.
    pub fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Styled
        }
    }
}

/// Accept only names of demo stages.
fn stage_name(raw: &str) -> Result<String, String> {
    if crate::demo::STAGES.contains(&raw) {
        Ok(raw.to_string())
    } else {
        Err(format!(
            "unknown stage '{raw}' (expected one of: {})",
            crate::demo::STAGES.join(", ")
        ))
    }
}

/// Log filter derived from `--quiet` / `-v`.
pub fn log_filter(quiet: bool, verbose: u8) -> &'static str {
    match verbose {
        0 if quiet => "error",
        0 => "warn",
        1 => "info,stagecoach=debug",
        _ => "trace",
    }
}
