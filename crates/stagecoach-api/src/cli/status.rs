//! `stagecoach status`: show the persisted stages of an instance.

use anyhow::{Context, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use stagecoach_types::stage::StageStatus;

use super::OutputMode;
use crate::demo::{self, DemoOptions};
use crate::state::AppState;

/// Print every demo stage with its persisted status and payload.
pub async fn status(state: &AppState, id: &str, mode: OutputMode) -> Result<()> {
    let workflow = demo::build(state.store.clone(), state.lease, &DemoOptions::default())?;
    let reports = workflow
        .status(id)
        .await
        .with_context(|| format!("cannot read state of '{id}'"))?;

    if mode == OutputMode::Quiet {
        return Ok(());
    }
    if mode == OutputMode::Json {
        let stages: Vec<_> = reports
            .iter()
            .map(|r| {
                serde_json::json!({
                    "stage": r.name,
                    "status": r.status,
                    "payload": r.payload,
                })
            })
            .collect();
        let out = serde_json::json!({
            "instance_id": id,
            "backend": state.store.kind().to_string(),
            "stages": stages,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let done = reports
        .iter()
        .filter(|r| r.status == StageStatus::Done)
        .count();

    println!();
    println!(
        "  Instance '{}' ({}/{} stages done)",
        style(id).cyan(),
        done,
        reports.len()
    );
    println!();

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Stage").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Payload").fg(Color::White),
    ]);

    for report in &reports {
        let status_cell = match report.status {
            StageStatus::Done => Cell::new("done").fg(Color::Green),
            StageStatus::Pending => Cell::new("pending").fg(Color::DarkGrey),
        };
        let payload = report
            .payload
            .as_ref()
            .map(|p| preview(&p.to_string()))
            .unwrap_or_else(|| "-".to_string());

        table.add_row(vec![
            Cell::new(&report.name).fg(Color::Cyan),
            status_cell,
            Cell::new(payload).fg(Color::DarkGrey),
        ]);
    }

    println!("{table}");
    println!();
    println!(
        "  {} {} ({})",
        style("Backend:").dim(),
        state.store.kind(),
        style(state.data_dir.display()).dim()
    );
    println!();

    Ok(())
}

fn preview(raw: &str) -> String {
    if raw.chars().count() > 60 {
        let head: String = raw.chars().take(57).collect();
        format!("{head}...")
    } else {
        raw.to_string()
    }
}
