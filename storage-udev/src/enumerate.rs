// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::device::Device;
use crate::error::{Result, UdevError};

/// Lists the devices currently present in `subsystem`.
///
/// Looks in `class/<subsystem>` first and falls back to `bus/<subsystem>/devices`.
/// Entries that vanish or cannot be read while walking are skipped.
pub fn enumerate_subsystem(sysfs_root: &Path, subsystem: &str) -> Result<Vec<Device>> {
    let sysfs_root = fs::canonicalize(sysfs_root).map_err(|e| UdevError::io(sysfs_root, e))?;
    let dir = subsystem_dir(&sysfs_root, subsystem);

    let entries = fs::read_dir(&dir).map_err(|e| UdevError::io(&dir, e))?;

    let mut devices = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };

        let syspath = match fs::canonicalize(entry.path()) {
            Ok(path) => path,
            Err(e) => {
                debug!("Device {} went away during enumeration: {}", entry.path().display(), e);
                continue;
            }
        };

        match Device::from_sysfs(&sysfs_root, &syspath) {
            Ok(device) => devices.push(device),
            Err(e) => warn!("Could not read device {}: {}", syspath.display(), e),
        }
    }

    debug!("Enumerated {} {} devices", devices.len(), subsystem);
    Ok(devices)
}

fn subsystem_dir(sysfs_root: &Path, subsystem: &str) -> PathBuf {
    let class = sysfs_root.join("class").join(subsystem);
    if class.is_dir() {
        class
    } else {
        sysfs_root.join("bus").join(subsystem).join("devices")
    }
}
