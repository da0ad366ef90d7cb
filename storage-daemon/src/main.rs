// SPDX-License-Identifier: GPL-3.0-only

//! COSMIC Ext Storage block device daemon
//!
//! Watches the kernel for block devices and publishes one D-Bus object per
//! device under the configured object root, with an ObjectManager on top so
//! clients can discover them.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use storage_provider::{BlockInterface, Daemon, DeviceRegistry, LinuxProvider, ZbusPublisher};
use storage_udev::UdevClient;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use zbus::connection::Builder as ConnectionBuilder;

mod config;
mod logging;

use config::{BusKind, Config, LoggingLevel};

/// Publishes kernel block devices on D-Bus
#[derive(Parser)]
#[command(name = "cosmic-ext-storage-blockd")]
#[command(about = "Block device provider for COSMIC Ext Storage", long_about = None)]
struct Cli {
    /// Configuration file (defaults to /etc/cosmic-ext-storage/blockd.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the session bus instead of the system bus
    #[arg(long)]
    session: bool,

    /// Override the configured log level
    #[arg(long, value_enum)]
    log_level: Option<LoggingLevel>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if cli.session {
        config.bus = BusKind::Session;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    if cli.print_config {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let _log_guard = logging::init(&config.logging)?;

    tracing::info!(
        "Starting COSMIC Ext Storage block device daemon v{}",
        env!("CARGO_PKG_VERSION")
    );

    if config.bus == BusKind::System && unsafe { libc::geteuid() } != 0 {
        tracing::error!("Block device daemon must run as root on the system bus");
        anyhow::bail!("Daemon must run with root privileges");
    }

    let daemon = Arc::new(
        Daemon::new(&config.object_root)?
            .with_subsystems(&config.subsystems)?
            .with_seed_order(config.seed_order),
    );

    // Without the uevent socket there is nothing to track.
    let udev = UdevClient::with_sysfs_root(&config.sysfs_root, &config.subsystems)
        .context("Cannot monitor kernel device events")?;

    let builder = match config.bus {
        BusKind::System => ConnectionBuilder::system()?,
        BusKind::Session => ConnectionBuilder::session()?,
    };
    let connection = builder
        .name(config.bus_name.as_str())?
        .serve_at(config.object_root.as_str(), zbus::fdo::ObjectManager)?
        .build()
        .await
        .with_context(|| format!("Failed to register {} on D-Bus", config.bus_name))?;

    tracing::info!("Service registered on D-Bus {:?} bus", config.bus);
    tracing::info!("  - {} at {}", config.bus_name, config.object_root);
    tracing::info!(
        "  - {} objects under {}/block_devices",
        BlockInterface::interface_name(),
        config.object_root
    );

    let mut provider: LinuxProvider =
        DeviceRegistry::new(daemon, udev, ZbusPublisher::new(connection.clone()));
    provider
        .initialize()
        .await
        .context("Failed to seed block devices")?;

    let cancel = CancellationToken::new();
    tokio::spawn(wait_for_shutdown(cancel.clone()));

    tracing::info!("Daemon ready, watching for device events...");
    let outcome = provider.run(cancel).await;
    if let Err(e) = &outcome {
        tracing::error!("Stopped tracking devices: {}", e);
    }

    tracing::info!("Block device daemon shutting down");
    provider.shutdown().await;
    outcome.context("Block device tracking failed")
}

async fn wait_for_shutdown(cancel: CancellationToken) {
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => Some(stream),
        Err(e) => {
            tracing::warn!("Cannot listen for SIGTERM: {}", e);
            None
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!("Cannot listen for SIGINT: {}", e);
                return;
            }
            tracing::info!("Received SIGINT");
        }
        Some(_) = async {
            match terminate.as_mut() {
                Some(stream) => stream.recv().await,
                None => std::future::pending().await,
            }
        } => {
            tracing::info!("Received SIGTERM");
        }
    }

    cancel.cancel();
}
