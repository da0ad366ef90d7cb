// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

/// Errors that stop the provider from starting or running
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Device source error: {0}")]
    Udev(#[from] storage_udev::UdevError),

    #[error("Invalid object root {path}: {reason}")]
    InvalidObjectRoot { path: String, reason: String },

    #[error("No subsystems configured")]
    NoSubsystems,

    #[error("Registry has no event stream; call initialize() first")]
    NotInitialized,

    #[error("Device event stream closed; hotplug events are no longer received")]
    EventStreamClosed,
}

/// Failure to construct a managed object from a device snapshot
#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("Device {0} has no device name")]
    MissingDeviceName(String),

    #[error("Invalid object path {path}: {reason}")]
    InvalidObjectPath { path: String, reason: String },
}

/// Export/unexport failures. These are logged, never escalated.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("An object is already exported at {0}")]
    AlreadyExported(String),

    #[error("No object exported at {0}")]
    NotExported(String),

    #[error("D-Bus error: {0}")]
    DBus(#[from] zbus::Error),
}

pub type Result<T> = std::result::Result<T, ProviderError>;
