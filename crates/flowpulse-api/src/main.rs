//! flowpulse CLI and REST API entry point.
//!
//! Binary name: `fpulse`
//!
//! Parses CLI arguments, loads configuration, rebuilds the workflow
//! aggregates from the event store, then dispatches to the appropriate
//! command handler or starts the webhook receiver.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;
use secrecy::SecretString;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise verbosity picks the default filter.
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,flowpulse=debug",
        _ => "trace",
    };
    if let Err(e) = flowpulse_observe::tracing_setup::init_tracing(filter, cli.otel) {
        eprintln!("Warning: failed to initialize tracing: {e}");
    }

    let result = run(cli).await;
    flowpulse_observe::tracing_setup::shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Commands that don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "fpulse", &mut std::io::stdout());
        return Ok(());
    }
    if let Commands::Sign {
        file,
        secret,
        timestamp,
    } = &cli.command
    {
        let secret = SecretString::from(secret.clone());
        return cli::sign::sign_body(file, secret, *timestamp, cli.json).await;
    }

    // Initialize application state (config, store, aggregates)
    let state = AppState::init().await?;

    match cli.command {
        Commands::Status => {
            cli::status::status(&state, cli.json).await?;
        }

        Commands::List { limit } => {
            cli::workflow::list_workflows(&state, limit, cli.json).await?;
        }

        Commands::Show { workflow_id } => {
            cli::workflow::show_workflow(&state, &workflow_id, cli.json).await?;
        }

        Commands::Health => {
            if !cli::status::health(&state, cli.json).await? {
                anyhow::bail!("service is unhealthy");
            }
        }

        Commands::Sync => {
            cli::status::sync(&state, cli.json, cli.quiet).await?;
        }

        Commands::Serve { port, host } => {
            let host = host.unwrap_or_else(|| state.config.server.host.clone());
            let port = port.unwrap_or(state.config.server.port);
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            if !cli.quiet {
                println!(
                    "  {} flowpulse listening on {}",
                    console::style("⚡").bold(),
                    console::style(format!("http://{addr}")).cyan()
                );
                println!(
                    "  {} {}",
                    console::style("Webhook:").dim(),
                    console::style(state.config.webhook.webhook_path()).yellow()
                );
                println!("  {}", console::style("Press Ctrl+C to stop").dim());
            }
            tracing::info!(%addr, "server started");

            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            if !cli.quiet {
                println!("\n  Server stopped.");
            }
        }

        Commands::Completions { .. } | Commands::Sign { .. } => {}
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
///
/// A handler that cannot be installed never fires; the other still can.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
