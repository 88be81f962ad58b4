//! Recent activity, health and sync commands.

use anyhow::Result;
use console::style;

use flowpulse_types::status::{ActivityStatus, HealthStatus};

use crate::state::AppState;

/// Display the recent activity summary the dashboards poll.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let recent = state.status_service.get_recent_activity();

    if json {
        println!("{}", serde_json::to_string_pretty(&recent)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} flowpulse v{}",
        style("⚡").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    println!("  {}", style("── Activity ──").dim());
    println!("  Status:        {}", format_activity(recent.status));
    println!("  Last webhook:  {}", format_optional_time(recent.last_webhook_at));
    println!("  Last agent:    {}", format_optional_time(recent.last_agent_data_at));
    println!("  Last sync:     {}", format_optional_time(recent.last_force_sync_at));
    println!();

    if let Some(workflow_id) = &recent.workflow_id {
        println!("  {}", style("── Latest workflow ──").dim());
        println!(
            "  {} ({})",
            style(recent.workflow_name.as_deref().unwrap_or(workflow_id)).cyan(),
            style(workflow_id).dim()
        );
        println!();
    }

    println!("  {}", style(&recent.message).dim());
    println!();

    println!("  {}", style("── System ──").dim());
    println!("  Data dir: {}", style(state.data_dir.display()).dim());
    println!("  Storage:  {}", style(state.store.root().display()).dim());
    println!(
        "  Webhook:  {}",
        style(state.config.webhook.webhook_path()).dim()
    );
    println!();

    Ok(())
}

/// Run the health check and print every component.
///
/// Returns `false` when the service is unhealthy so the caller can set the
/// exit code.
pub async fn health(state: &AppState, json: bool) -> Result<bool> {
    let report = state.status_service.perform_health_check().await;
    let ok = report.overall != HealthStatus::Unhealthy;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(ok);
    }

    println!();
    println!(
        "  {} Health: {}",
        style("🔍").bold(),
        format_health(report.overall)
    );
    println!();
    for (name, component) in &report.components {
        let critical = if component.critical { " (critical)" } else { "" };
        println!(
            "  {} {}{}  {}",
            health_mark(component.status),
            style(name).bold(),
            style(critical).dim(),
            style(&component.details).dim()
        );
    }
    println!();

    Ok(ok)
}

/// Re-aggregate every stream and report how many workflows were rebuilt.
pub async fn sync(state: &AppState, json: bool, quiet: bool) -> Result<()> {
    let workflows = state.status_service.force_sync().await?;

    if json {
        println!("{}", serde_json::json!({ "workflows": workflows }));
    } else if !quiet {
        println!();
        println!(
            "  {} Re-aggregated {} workflow{}",
            style("✓").green().bold(),
            style(workflows).bold(),
            if workflows == 1 { "" } else { "s" }
        );
        println!();
    }
    Ok(())
}

// --- Formatting helpers ---

fn format_activity(status: ActivityStatus) -> String {
    match status {
        ActivityStatus::None => format!("{}", style("○ none").dim()),
        ActivityStatus::Processing => format!("{}", style("● processing").yellow()),
        ActivityStatus::Success => format!("{}", style("✓ success").green()),
        ActivityStatus::Failed => format!("{}", style("✗ failed").red()),
    }
}

fn format_health(status: HealthStatus) -> String {
    match status {
        HealthStatus::Healthy => format!("{}", style("healthy").green().bold()),
        HealthStatus::Degraded => format!("{}", style("degraded").yellow().bold()),
        HealthStatus::Unhealthy => format!("{}", style("unhealthy").red().bold()),
    }
}

fn health_mark(status: HealthStatus) -> String {
    match status {
        HealthStatus::Healthy => format!("{}", style("✓").green()),
        HealthStatus::Degraded => format!("{}", style("!").yellow()),
        HealthStatus::Unhealthy => format!("{}", style("✗").red()),
    }
}

fn format_optional_time(dt: Option<chrono::DateTime<chrono::Utc>>) -> String {
    match dt {
        Some(dt) => format_relative_time(&dt),
        None => "never".to_string(),
    }
}

pub(crate) fn format_relative_time(dt: &chrono::DateTime<chrono::Utc>) -> String {
    let now = chrono::Utc::now();
    let diff = now - *dt;

    if diff.num_minutes() < 1 {
        "just now".to_string()
    } else if diff.num_hours() < 1 {
        format!("{}m ago", diff.num_minutes())
    } else if diff.num_days() < 1 {
        format!("{}h ago", diff.num_hours())
    } else if diff.num_days() < 30 {
        format!("{}d ago", diff.num_days())
    } else {
        dt.format("%Y-%m-%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    #[test]
    fn relative_time_buckets() {
        let now = Utc::now();
        assert_eq!(format_relative_time(&now), "just now");
        assert_eq!(format_relative_time(&(now - Duration::minutes(5))), "5m ago");
        assert_eq!(format_relative_time(&(now - Duration::hours(3))), "3h ago");
        assert_eq!(format_relative_time(&(now - Duration::days(2))), "2d ago");
        assert_eq!(format_optional_time(None), "never");
    }
}
