// SPDX-License-Identifier: GPL-3.0-only

use std::fs;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "blockd.log";
const OUR_CRATES: &[&str] = &[
    "cosmic_ext_storage_blockd",
    "storage_provider",
    "storage_udev",
];

/// Installs the global subscriber: stderr always, plus a daily rolling file
/// when enabled. `RUST_LOG` overrides the configured level.
///
/// The returned guard flushes the file writer and must be held until exit.
pub(crate) fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    if !config.log_to_disk {
        tracing_subscriber::registry()
            .with(env_filter(config)?)
            .with(stderr_layer)
            .init();
        return Ok(None);
    }

    fs::create_dir_all(&config.log_dir).with_context(|| {
        format!("Failed to create log directory {}", config.log_dir.display())
    })?;
    let appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter(config)?)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(Some(guard))
}

fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    // Our crates at the configured level, everything else at warn.
    let mut filter = EnvFilter::new("warn");
    for krate in OUR_CRATES {
        let directive = format!("{krate}={}", config.level.as_directive());
        filter = filter.add_directive(
            directive
                .parse()
                .with_context(|| format!("Invalid log directive: {directive}"))?,
        );
    }
    Ok(filter)
}
