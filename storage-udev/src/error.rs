// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

/// Errors raised while talking to the kernel device model
#[derive(Error, Debug)]
pub enum UdevError {
    #[error("Failed to open uevent transport: {0}")]
    Transport(#[source] std::io::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed uevent: {0}")]
    Malformed(String),

    #[error("Unknown uevent action: {0}")]
    UnknownAction(String),

    #[error("Event stream already handed out")]
    AlreadySubscribed,
}

impl UdevError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        UdevError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, UdevError>;
