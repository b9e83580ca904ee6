//! Stagecoach CLI entry point.
//!
//! Binary name: `stagecoach`
//!
//! Parses CLI arguments, loads `config.toml`, opens the selected sync backend
//! and dispatches to the command handler.

mod cli;
mod demo;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use demo::DemoOptions;
use stagecoach_infra::config::load_config;
use stagecoach_infra::filesystem::resolve_data_dir;
use stagecoach_observe::tracing_setup::{init_tracing, shutdown_tracing};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need config or a backend
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "stagecoach", &mut std::io::stdout());
        return Ok(());
    }

    let data_dir = resolve_data_dir();
    let config = load_config(&data_dir).await;

    let enable_otel = std::env::var_os("STAGECOACH_OTEL").is_some();
    if let Err(e) = init_tracing(cli::log_filter(cli.quiet, cli.verbose), config.log_format, enable_otel) {
        eprintln!("Warning: tracing setup failed: {e}");
    }

    let result = dispatch(cli, data_dir, &config).await;
    shutdown_tracing();
    result
}

async fn dispatch(
    cli: Cli,
    data_dir: std::path::PathBuf,
    config: &stagecoach_types::config::EngineConfig,
) -> anyhow::Result<()> {
    let state = AppState::init(data_dir, config, cli.backend, cli.lease_secs).await?;
    let mode = cli.output_mode();

    match cli.command {
        Commands::Run {
            id,
            seed,
            seed_json,
            bookmark_at,
            fail_at,
        } => {
            let options = DemoOptions {
                bookmark_at,
                fail_at,
            };
            cli::run::run(&state, &id, &seed, seed_json, options, mode).await?;
        }

        Commands::Status { id } => {
            cli::status::status(&state, &id, mode).await?;
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}
