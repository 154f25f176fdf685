//! Trade Reconciler Binary
//!
//! Runs the polling driver, or reports health for a container healthcheck.
//!
//! # Usage
//!
//! ```bash
//! trade-reconciler [run|health] [--config <path>]
//! ```
//!
//! - `run` (default): reconcile open trade groups and accept entry signals
//!   until SIGINT or SIGTERM.
//! - `health`: print the latest heartbeat verdict as JSON. Exits 0 when
//!   healthy, 1 otherwise.
//!
//! # Environment Variables
//!
//! - `RECONCILER_CONFIG`: Config file path (default: `config.yaml`)
//! - `BROKER`: `alpaca` | `manual` (default: `alpaca`)
//! - `APCA_API_KEY_ID` / `APCA_API_SECRET_KEY`: Required for `alpaca`
//! - `ALPACA_ENV`: `paper` | `live` (default: `paper`)
//! - `DB_PATH`: SQLite file (default: `app.db`)
//! - `RUST_LOG`: Log filter override

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use trade_reconciler::config::{Config, load_config};
use trade_reconciler::infrastructure::config::ProductionContainer;
use trade_reconciler::telemetry::init_telemetry;

/// Time allowed for an in-flight cycle to finish after a shutdown signal.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Order lifecycle and exit-leg reconciliation engine.
#[derive(Parser, Debug)]
#[command(name = "trade-reconciler", version, about)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, env = "RECONCILER_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Reconcile open trade groups and accept entry signals until SIGINT or SIGTERM.
    Run,
    /// Print the latest heartbeat verdict as JSON. Exits 0 when healthy.
    Health,
}

#[tokio::main]
async fn main() -> ExitCode {
    load_dotenv();

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_telemetry(&config.logging);

    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Health => health(&config).await,
        Command::Run => run(config).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Trade reconciler failed");
            ExitCode::FAILURE
        }
    }
}

/// Print the health verdict as JSON.
async fn health(config: &Config) -> anyhow::Result<ExitCode> {
    let status = ProductionContainer::health_check(config)
        .context("opening heartbeat store")?
        .execute()
        .await;

    println!(
        "{}",
        serde_json::to_string(&status).context("serializing health status")?
    );

    Ok(if status.healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Run the polling driver until a shutdown signal arrives.
async fn run(config: Config) -> anyhow::Result<ExitCode> {
    tracing::info!(
        broker = ?config.broker.kind,
        db_path = %config.persistence.db_path,
        interval_secs = config.polling.interval_secs,
        "Starting trade reconciler"
    );

    let container = ProductionContainer::from_config(config).context("wiring adapters")?;
    let driver = container.polling_driver();

    let shutdown = CancellationToken::new();
    let driver_shutdown = shutdown.clone();
    let mut driver_handle = tokio::spawn(async move { driver.run(driver_shutdown).await });

    tokio::select! {
        () = shutdown_signal() => {
            shutdown.cancel();
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut driver_handle).await.is_err() {
                tracing::warn!(
                    timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
                    "Polling driver did not stop in time"
                );
                driver_handle.abort();
            }
        }
        joined = &mut driver_handle => {
            joined.context("polling driver task panicked")?;
        }
    }

    tracing::info!("Trade reconciler stopped");
    Ok(ExitCode::SUCCESS)
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. Without them the process
/// cannot stop cleanly, so failing at startup is preferred.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn parse(list: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("trade-reconciler").chain(list.iter().copied()))
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_to_run() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.command.unwrap_or(Command::Run), Command::Run);
    }

    #[test]
    fn parses_health_with_config() {
        let cli = parse(&["health", "--config", "/etc/bot.yaml"]).unwrap();
        assert_eq!(cli.command, Some(Command::Health));
        assert_eq!(cli.config.as_deref(), Some("/etc/bot.yaml"));
    }

    #[test]
    fn config_flag_is_accepted_before_subcommand() {
        let cli = parse(&["-c", "bot.yaml", "run"]).unwrap();
        assert_eq!(cli.command, Some(Command::Run));
        assert_eq!(cli.config.as_deref(), Some("bot.yaml"));
    }

    #[test]
    fn rejects_unknown_arguments() {
        assert!(parse(&["reconcile-now"]).is_err());
        assert!(parse(&["--config"]).is_err());
    }
}
