//! Binary entry point (spec.md §9 "Module-startup wiring"): parses a
//! config path, builds the component DAG, and either runs the HTTP server
//! or a one-shot compaction pass depending on the subcommand.

mod block_writer;
mod compaction_loop;
mod dag;
mod error;
mod idle_sweep;
mod objectstore_factory;
mod runtime;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use trace_config::Config;
use trace_server::AppState;

use crate::error::CliError;
use crate::runtime::Runtime;

#[derive(Parser)]
#[command(name = "trace-cli", about = "distributed tracing backend")]
struct Cli {
    /// Path to a TOML config file. Missing sections fall back to
    /// compiled-in defaults (spec.md §9 "config with many optional
    /// sections").
    #[arg(long, default_value = "trace-cli.toml")]
    config: std::path::PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Starts every component and serves the HTTP API (the default).
    Serve,
    /// Runs one compaction pass against every discoverable tenant, then
    /// exits — useful for a cron-driven deployment instead of the
    /// always-on background loop.
    Compact,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(error) => {
            tracing::error!(%error, "failed to start the async runtime");
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::from(0),
        Err(error) => {
            tracing::error!(%error, "trace-cli exiting with an error");
            ExitCode::from(error.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = if cli.config.exists() {
        Config::from_toml_file(&cli.config)?
    } else {
        tracing::warn!(path = %cli.config.display(), "config file not found; using compiled-in defaults");
        Config::default()
    };

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Compact => compact_once(config).await,
    }
}

async fn serve(config: Config) -> Result<(), CliError> {
    let listen_addr = config.server.listen_addr.clone();
    let server_config = config.server.clone();
    let mut app = Runtime::start(config).await?;

    let state = AppState {
        accumulator: app.accumulator.clone(),
        coordinator: app.coordinator.clone(),
        config: server_config,
    };
    let router = trace_server::build_router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr.as_str())
        .await
        .map_err(|source| CliError::Generic(anyhow::anyhow!("failed to bind {listen_addr}: {source}")))?;
    tracing::info!(%listen_addr, "listening");

    let serve_result = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await;

    app.stop().await;
    serve_result.map_err(|source| CliError::Generic(source.into()))
}

async fn compact_once(config: Config) -> Result<(), CliError> {
    let store = objectstore_factory::build(&config.objectstore).await?;
    let max_query_deadline_secs = config.query.max_deadline_secs;
    let compactor = trace_compactor::Compactor::new(store.clone(), config.compactor.clone(), config.block.clone());

    let tenants = crate::compaction_loop::discover_tenants(store.as_ref()).await.map_err(|source| CliError::Generic(source.into()))?;
    tracing::info!(tenants = tenants.len(), "running one compaction pass");

    for tenant_id in tenants {
        loop {
            match compactor.compact_once(&tenant_id).await {
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(source) => return Err(CliError::DataIntegrity(source.to_string())),
            }
        }
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        compactor
            .sweep_expired(&tenant_id, now, max_query_deadline_secs)
            .await
            .map_err(|source| CliError::DataIntegrity(source.to_string()))?;
    }
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("received ctrl-c, shutting down");
}
