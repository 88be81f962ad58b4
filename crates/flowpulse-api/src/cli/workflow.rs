//! Workflow list and detail commands.

use anyhow::{Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use flowpulse_types::event::ExecutionStatus;
use flowpulse_types::progress::{WorkflowProgress, WorkflowStatus};

use crate::cli::status::format_relative_time;
use crate::state::AppState;

/// List the most recently started workflows.
pub async fn list_workflows(state: &AppState, limit: usize, json: bool) -> Result<()> {
    let workflows = state.status_service.list_recent(Some(limit));

    if json {
        println!("{}", serde_json::to_string_pretty(&workflows)?);
        return Ok(());
    }

    if workflows.is_empty() {
        println!();
        println!(
            "  No workflows yet. Point the agent system at {}",
            style(state.config.webhook.webhook_path()).yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Workflow").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Agents").fg(Color::White),
        Cell::new("Run").fg(Color::White),
        Cell::new("Started").fg(Color::White),
    ]);

    for progress in &workflows {
        let started = match &progress.started_at {
            Some(dt) => format_relative_time(dt),
            None => "-".to_string(),
        };

        table.add_row(vec![
            Cell::new(workflow_label(progress)).fg(Color::Cyan),
            status_cell(progress.status),
            Cell::new(agent_counts(progress)),
            Cell::new(format!("#{}", progress.run_attempt)).fg(Color::DarkGrey),
            Cell::new(started).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} workflow{}",
        style(workflows.len()).bold(),
        if workflows.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

/// Show aggregated progress and per-agent state for one workflow.
pub async fn show_workflow(state: &AppState, workflow_id: &str, json: bool) -> Result<()> {
    let Some(progress) = state.status_service.get_workflow(workflow_id) else {
        bail!("workflow '{workflow_id}' not found");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&progress)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}  {}",
        style(&progress.workflow_name).cyan().bold(),
        style(&progress.workflow_id).dim(),
        format_status(progress.status)
    );
    println!();

    println!("  {}", style("── Progress ──").dim());
    println!(
        "  Agents:    {}  ({:.0}%)",
        agent_counts(&progress),
        progress.percent_complete()
    );
    println!("  Run:       #{}", progress.run_attempt);
    if let Some(started) = &progress.started_at {
        println!("  Started:   {}", format_relative_time(started));
    }
    if let Some(completed) = &progress.completed_at {
        println!("  Finished:  {}", format_relative_time(completed));
    }
    println!("  Events:    {}", progress.events_applied);
    println!();

    if !progress.agents.is_empty() {
        let mut table = Table::new();
        table.load_preset(presets::UTF8_FULL_CONDENSED);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Agent").fg(Color::White),
            Cell::new("Status").fg(Color::White),
            Cell::new("Last event").fg(Color::White),
            Cell::new("Error").fg(Color::White),
        ]);

        for agent in &progress.agents {
            let name = agent.agent_name.as_deref().unwrap_or(&agent.agent_id);
            let agent_status = match agent.status {
                ExecutionStatus::Triggered => Cell::new("○ triggered").fg(Color::DarkGrey),
                ExecutionStatus::Running => Cell::new("● running").fg(Color::Yellow),
                ExecutionStatus::Success => Cell::new("✓ success").fg(Color::Green),
                ExecutionStatus::Failed => Cell::new("✗ failed").fg(Color::Red),
            };
            table.add_row(vec![
                Cell::new(name).fg(Color::Cyan),
                agent_status,
                Cell::new(format_relative_time(&agent.last_event_at)).fg(Color::DarkGrey),
                Cell::new(agent.last_error.as_deref().unwrap_or("")),
            ]);
        }

        println!("{table}");
        println!();
    }

    Ok(())
}

// --- Formatting helpers ---

fn workflow_label(progress: &WorkflowProgress) -> String {
    if progress.workflow_name == progress.workflow_id {
        progress.workflow_id.clone()
    } else {
        format!("{} ({})", progress.workflow_name, progress.workflow_id)
    }
}

fn agent_counts(progress: &WorkflowProgress) -> String {
    let mut counts = format!("{}/{}", progress.agents_completed, progress.agents_total);
    if progress.agents_failed > 0 {
        counts.push_str(&format!(" ({} failed)", progress.agents_failed));
    }
    counts
}

fn status_cell(status: WorkflowStatus) -> Cell {
    match status {
        WorkflowStatus::Triggered => Cell::new("○ triggered").fg(Color::DarkGrey),
        WorkflowStatus::Running => Cell::new("● running").fg(Color::Yellow),
        WorkflowStatus::Completed => Cell::new("✓ completed").fg(Color::Green),
        WorkflowStatus::Failed => Cell::new("✗ failed").fg(Color::Red),
    }
}

fn format_status(status: WorkflowStatus) -> String {
    match status {
        WorkflowStatus::Triggered => format!("{}", style("○ triggered").dim()),
        WorkflowStatus::Running => format!("{}", style("● running").yellow()),
        WorkflowStatus::Completed => format!("{}", style("✓ completed").green()),
        WorkflowStatus::Failed => format!("{}", style("✗ failed").red()),
    }
}
