//! Switchboard relay entry point.
//!
//! Binary name: `swbd`
//!
//! Parses CLI arguments, initializes tracing, the database and services,
//! then dispatches to the appropriate command handler or starts the relay
//! server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;

use switchboard_core::storage::Durability;
use switchboard_observe::tracing_setup::{TracingOptions, init_tracing, otel_requested, shutdown_tracing};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&TracingOptions {
        verbosity: cli.verbose,
        quiet: cli.quiet,
        json: cli.log_json,
        otel: cli.otel || otel_requested(),
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Commands that don't need app state
    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            generate(shell, &mut cmd, "swbd", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Normalize { ref phone } => return cli::tools::normalize(phone, cli.json),
        Commands::Sign {
            ref body,
            ref file,
            ref secret,
        } => {
            return cli::tools::sign(body.clone(), file.as_deref(), secret.clone(), cli.json).await;
        }
        _ => {}
    }

    // Initialize application state (config, DB, services)
    let state = AppState::init().await?;

    match cli.command {
        Commands::Accounts(cmd) => {
            cli::accounts::handle_accounts_command(cmd, &state, cli.json).await?;
        }

        Commands::Send {
            to,
            message,
            account,
            template,
        } => {
            cli::message::send(&state, to, message, account.as_deref(), template, cli.json).await?;
        }

        Commands::History { phone, account } => {
            cli::message::history(&state, &phone, account.as_deref(), cli.json).await?;
        }

        Commands::Status => {
            cli::status::status(&state, cli.json).await?;
        }

        Commands::Serve { port, host } => {
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            if !cli.quiet {
                println!(
                    "  {} Switchboard relay listening on {}",
                    console::style("⚡").bold(),
                    console::style(format!("http://{addr}")).cyan()
                );
                println!(
                    "  {} webhook: {}",
                    console::style("→").dim(),
                    console::style(format!("http://{addr}/webhook")).dim()
                );
                println!("  {}", console::style("Press Ctrl+C to stop").dim());
            }

            let registry = state.registry.clone();
            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            if let Durability::MemoryOnly(reason) = registry.shutdown().await {
                tracing::warn!(%reason, "final account registry snapshot not saved");
            }
            if !cli.quiet {
                println!("\n  Server stopped.");
            }
        }

        Commands::Completions { .. } | Commands::Normalize { .. } | Commands::Sign { .. } => {
            unreachable!("handled above")
        }
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {e}");
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
                tracing::error!("failed to install SIGTERM handler: {e}");
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
