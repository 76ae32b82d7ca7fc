//! Output formatting helpers for CLI commands

use crate::balancer::{BackendStatus, BalancerStatus};
use crate::health::HealthStatus;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};

fn health_label(backend: &BackendStatus) -> String {
    match (backend.backend.alive, backend.health) {
        (true, HealthStatus::Unhealthy) => "Alive (failing)".yellow().to_string(),
        (true, _) => "Alive".green().to_string(),
        (false, HealthStatus::Healthy) => "Dead (recovering)".yellow().to_string(),
        (false, _) => "Dead".red().to_string(),
    }
}

/// Format backends as a table
pub fn format_backends_table(backends: &[BackendStatus]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "URL", "Weight", "State", "Last Probe", "Active", "Requests", "Errors",
    ]);

    for b in backends {
        let probe = match b.last_check_ms {
            Some(ms) => format!("{} ({}ms)", b.health, ms),
            None => b.health.to_string(),
        };
        table.add_row(vec![
            Cell::new(&b.backend.url),
            Cell::new(b.backend.weight),
            Cell::new(health_label(b)),
            Cell::new(probe),
            Cell::new(b.backend.active_connections),
            Cell::new(b.backend.requests),
            Cell::new(b.backend.errors),
        ]);
    }

    table.to_string()
}

/// Format a balancer snapshot: summary line followed by the backend table
pub fn format_status(status: &BalancerStatus) -> String {
    let overall = match status.overall() {
        crate::balancer::OverallHealth::Healthy => "healthy".green(),
        crate::balancer::OverallHealth::Degraded => "degraded".yellow(),
        crate::balancer::OverallHealth::Unhealthy => "unhealthy".red(),
    };

    format!(
        "Strategy: {} ({})\nBackends: {}/{} alive, {}\nHealth checks: {}\n\n{}",
        status.strategy,
        status.strategy_kind,
        status.alive_backends,
        status.total_backends,
        overall,
        if status.health_checking {
            "running"
        } else {
            "stopped"
        },
        format_backends_table(&status.backends)
    )
}

/// Format a balancer snapshot as JSON
pub fn format_status_json(status: &BalancerStatus) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(status)
}
