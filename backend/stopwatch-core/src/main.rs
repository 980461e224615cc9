// src/main.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stopwatch_core::server::{router, AppState};
use stopwatch_core::{Config, LogSink, StopwatchSession, SystemClock};

#[derive(Parser, Debug)]
#[command(
    name = "stopwatch-core",
    version,
    about = "Attendance stopwatch reconciliation service"
)]
struct Cli {
    /// Override the tick period in milliseconds
    #[arg(long, global = true)]
    tick_ms: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the stopwatch over HTTP (default)
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run one session locally and log its frames
    Watch {
        /// Clock-in timestamp, e.g. 2024-03-04T08:00:00
        #[arg(long)]
        start: Option<String>,
        /// Clock-out timestamp
        #[arg(long)]
        end: Option<String>,
        /// Treat the open interval as running
        #[arg(long)]
        running: bool,
        #[arg(long, default_value_t = 5)]
        duration_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env().context("Loading configuration failed")?;
    if let Some(tick_ms) = cli.tick_ms {
        config.tick_interval_ms = tick_ms;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("Setting tracing subscriber failed")?;

    config.validate().context("Invalid configuration")?;

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server_host = host;
            }
            if let Some(port) = port {
                config.server_port = port;
            }
            serve(config).await
        }
        Command::Watch {
            start,
            end,
            running,
            duration_secs,
        } => watch(config, start, end, running, duration_secs).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting stopwatch server in {} mode", config.environment);

    let state = AppState::new(Arc::new(SystemClock), config.tick_period()?)
        .context("Creating stopwatch session failed")?;
    let session = state.session.clone();
    let app = router(state);

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Binding {} failed", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    session.lock().await.dispose();
    info!("Server stopped");
    Ok(())
}

async fn watch(
    config: Config,
    start: Option<String>,
    end: Option<String>,
    running: bool,
    duration_secs: u64,
) -> Result<()> {
    let mut session = StopwatchSession::new(
        Arc::new(SystemClock),
        Arc::new(LogSink::new("elapsed")),
        config.tick_period()?,
    )?;

    let snapshot = session.boundary_changed(start.as_deref(), end.as_deref(), Some(running));
    info!(
        "Watching for {}s (closed={}, ticking={})",
        duration_secs, snapshot.closed, snapshot.ticking
    );

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(duration_secs)) => {}
        _ = shutdown_signal() => {}
    }

    session.dispose();
    info!("Final elapsed time: {}", session.display());
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
