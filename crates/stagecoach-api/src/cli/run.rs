//! `stagecoach run`: drive the demo workflow for one instance.

use anyhow::{Context, Result};
use console::style;
use serde_json::Value;

use super::OutputMode;
use crate::demo::{self, DemoOptions};
use crate::state::AppState;
use stagecoach_types::run::RunStatus;

/// Run or resume instance `id`, then print the outcome.
pub async fn run(
    state: &AppState,
    id: &str,
    seed: &str,
    seed_json: bool,
    options: DemoOptions,
    mode: OutputMode,
) -> Result<()> {
    let seed = if seed_json {
        serde_json::from_str(seed).with_context(|| format!("--seed is not valid JSON: {seed}"))?
    } else {
        Value::String(seed.to_string())
    };

    let workflow = demo::build(state.store.clone(), state.lease, &options)?;
    let outcome = workflow
        .run(id, seed)
        .await
        .with_context(|| format!("workflow run for '{id}' failed"))?;

    if mode == OutputMode::Quiet {
        return Ok(());
    }
    if mode == OutputMode::Json {
        let out = serde_json::json!({
            "instance_id": outcome.instance_id,
            "status": outcome.status,
            "result": outcome.payload,
            "executed": outcome.executed,
            "resumed": outcome.resumed,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let badge = match outcome.status {
        RunStatus::Completed => style("completed").green().bold(),
        RunStatus::Suspended => style("suspended").yellow().bold(),
    };

    println!();
    println!(
        "  {} Instance '{}' {}",
        style("⚡").bold(),
        style(&outcome.instance_id).cyan(),
        badge
    );
    println!();
    println!("  Result:   {}", style(outcome.result()).bold());
    println!("  Executed: {}", list_or_dash(&outcome.executed));
    println!("  Resumed:  {}", style(list_or_dash(&outcome.resumed)).dim());
    if outcome.status == RunStatus::Suspended {
        println!();
        println!(
            "  {}",
            style(format!("Run `stagecoach run --id {id}` again to continue.")).dim()
        );
    }
    println!();

    Ok(())
}

fn list_or_dash(stages: &[String]) -> String {
    if stages.is_empty() {
        "-".to_string()
    } else {
        stages.join(", ")
    }
}
