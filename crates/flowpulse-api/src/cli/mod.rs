//! CLI command definitions for the `fpulse` binary.
//!
//! Uses clap derive macros for argument parsing. `serve` runs the webhook
//! receiver and query API; the other commands read the same event store
//! directly and print what the dashboards would see.

pub mod sign;
pub mod status;
pub mod workflow;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Track multi-agent workflow executions from webhook events.
#[derive(Parser)]
#[command(name = "fpulse", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the webhook receiver and REST API server.
    Serve {
        /// Port to listen on (defaults to [server].port).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to [server].host).
        #[arg(long)]
        host: Option<String>,
    },

    /// Show recent webhook activity and the latest workflow.
    Status,

    /// List the most recently started workflows.
    #[command(alias = "ls")]
    List {
        /// Maximum number of workflows (1-100).
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show aggregated progress of one workflow.
    Show {
        /// Workflow id to display.
        workflow_id: String,
    },

    /// Run the health check.
    Health,

    /// Re-aggregate every stream in the event store.
    Sync,

    /// Produce a signature header for a request body.
    Sign {
        /// File containing the exact body to sign.
        file: PathBuf,

        /// Shared webhook secret.
        #[arg(long, env = "FLOWPULSE_WEBHOOK_SECRET", hide_env_values = true)]
        secret: String,

        /// Unix timestamp to sign at (defaults to now).
        #[arg(long)]
        timestamp: Option<i64>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["fpulse", "list", "--limit", "5", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::List { limit: 5 }));
    }

    #[test]
    fn serve_overrides_are_optional() {
        let cli = Cli::try_parse_from(["fpulse", "serve"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { port: None, host: None }));
    }
}
