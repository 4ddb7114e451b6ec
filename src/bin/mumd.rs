//! mum daemon - real-time message relay over HTTP
//!
//! Clients join with a nick, post messages, and read them back either by
//! long-polling `/recv` or by holding open the `/update` stream.
//!
//! # Usage
//!
//! ```bash
//! # Start the relay (foreground)
//! mumd serve
//!
//! # Listen on another address
//! mumd serve --listen 0.0.0.0:8001
//! MUM_LISTEN=0.0.0.0:8001 mumd
//!
//! # Use a specific config file
//! mumd serve --config ./mumd.toml
//!
//! # Print the effective configuration
//! mumd config
//!
//! # Enable debug logging
//! RUST_LOG=mumd=debug mumd serve
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown

use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mumd::config::{parse_listen, RelayConfig};
use mumd::relay::spawn_relay;
use mumd::server::HttpServer;

/// How long open requests may run after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// mum daemon - real-time message relay
#[derive(Parser, Debug)]
#[command(name = "mumd", version, about)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the relay server
    Serve {
        /// Config file (defaults to <config dir>/mum/mumd.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Listen address, overriding the config file and MUM_LISTEN
        #[arg(short, long)]
        listen: Option<String>,
    },
    /// Print the effective configuration as TOML
    Config {
        /// Config file (defaults to <config dir>/mum/mumd.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Default to 'serve' if no subcommand given
    let command = args.command.unwrap_or(Command::Serve {
        config: None,
        listen: None,
    });

    match command {
        Command::Serve { config, listen } => {
            let config = resolve_config(config.as_deref(), listen.as_deref())?;
            run_daemon(config)
        }
        Command::Config { config } => {
            let config = resolve_config(config.as_deref(), None)?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

/// Layers defaults, the config file, `MUM_LISTEN` and `--listen`.
fn resolve_config(path: Option<&Path>, listen: Option<&str>) -> Result<RelayConfig> {
    let file = match path {
        Some(path) => Some(path.to_path_buf()),
        None => RelayConfig::default_path().filter(|p| p.exists()),
    };

    let mut config = match file {
        Some(path) => RelayConfig::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RelayConfig::default(),
    };

    config.apply_env().context("Invalid MUM_LISTEN")?;

    if let Some(listen) = listen {
        config.listen = parse_listen(listen).context("Invalid --listen")?;
    }

    config.validate()?;
    Ok(config)
}

/// Runs the daemon (async entry point).
#[tokio::main]
async fn run_daemon(config: RelayConfig) -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("mumd=info".parse()?)
                .add_directive("mum_core=info".parse()?)
                .add_directive("mum_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "mum daemon starting"
    );

    // Create cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Setup signal handlers
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    // Spawn the relay
    let relay = spawn_relay(&config);
    info!(
        channel = %relay.default_channel(),
        session_timeout_secs = config.session_timeout_secs,
        pending_timeout_secs = config.pending_timeout_secs,
        "Relay started"
    );

    // Create and run the server
    let server = HttpServer::new(config.listen, relay, cancel_token.clone());
    let mut server_task = tokio::spawn(async move { server.run().await });

    // Parked /recv requests would otherwise hold shutdown open until flushed
    let grace_token = cancel_token.clone();
    let grace = async move {
        grace_token.cancelled().await;
        tokio::time::sleep(SHUTDOWN_GRACE).await;
    };

    tokio::select! {
        joined = &mut server_task => {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(error = %e, "Server error");
                    return Err(e.into());
                }
                Err(e) => return Err(e).context("Server task failed"),
            }
        }
        _ = grace => {
            warn!(
                grace_secs = SHUTDOWN_GRACE.as_secs(),
                "Open requests still pending after grace period, closing them"
            );
            server_task.abort();
        }
    }

    info!("mum daemon stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    #[test]
    fn test_cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_listen_flag_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen = \"127.0.0.1:9000\"").unwrap();
        writeln!(file, "heartbeat_secs = 5").unwrap();

        let config = resolve_config(Some(file.path()), Some("127.0.0.1:9100")).unwrap();
        assert_eq!(config.listen.port(), 9100);
        assert_eq!(config.heartbeat_secs, 5);
    }

    #[test]
    fn test_bad_listen_flag_is_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(resolve_config(Some(file.path()), Some("nowhere")).is_err());
    }
}
