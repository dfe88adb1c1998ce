//! # BFT Replica
//!
//! Entry point of a replica process.
//!
//! ## Lifecycle
//!
//! 1. Parse flags and load the optional config file
//! 2. Resolve the replica setup (keys, addresses, parameters)
//! 3. Start the replica (core, client gateway, maintenance timer)
//! 4. Run the event loop until SIGINT or SIGTERM
//! 5. Log the run summary and the elapsed time

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use replica_runtime::{Cli, Replica, ReplicaConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let started = Instant::now();

    let result = run(&cli).await;
    if let Err(e) = &result {
        error!("exception: {:#}", e);
    }
    info!(elapsed = ?started.elapsed(), "Replica exited");
    result
}

async fn run(cli: &Cli) -> Result<()> {
    let setup = ReplicaConfig::from_cli(cli)
        .context("Failed to load configuration")?
        .resolve()
        .context("Invalid configuration")?;

    let mut replica = Replica::start(setup)
        .await
        .context("Failed to start replica")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(()) => info!("Termination signal received"),
            Err(e) => error!("Failed to listen for termination signals: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    let summary = replica.run(shutdown_rx).await;
    info!("Run summary: {}", summary);
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
