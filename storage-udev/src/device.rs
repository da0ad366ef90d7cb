// SPDX-License-Identifier: GPL-3.0-only

//! Device descriptors: a snapshot of what the kernel reported for one device
//! at one point in time.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, UdevError};

/// Read-only snapshot of a kernel device.
///
/// The sysfs path is the stable identity of the device for as long as it is
/// present. Everything else is whatever the kernel put in the uevent
/// environment (`DEVNAME`, `DEVTYPE`, `MAJOR`, `MINOR`, ...). Attributes that
/// are not part of the uevent can be read on demand with [`Device::sysfs_attr`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Device {
    sysfs_path: Option<String>,
    subsystem: Option<String>,
    properties: BTreeMap<String, String>,
}

impl Device {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sysfs_path(mut self, path: impl Into<String>) -> Self {
        self.sysfs_path = Some(path.into());
        self
    }

    pub fn with_subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = Some(subsystem.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Builds a descriptor from a kernel uevent environment.
    ///
    /// `DEVPATH` is relative to the sysfs mount, so it is joined onto
    /// `sysfs_root` to produce the identity key.
    pub(crate) fn from_uevent_env(sysfs_root: &Path, properties: BTreeMap<String, String>) -> Self {
        let sysfs_path = properties
            .get("DEVPATH")
            .map(|devpath| join_sysfs(sysfs_root, devpath));
        let subsystem = properties.get("SUBSYSTEM").cloned();

        Self {
            sysfs_path,
            subsystem,
            properties,
        }
    }

    /// Reads a device straight out of sysfs: its `uevent` file for the
    /// properties and the `subsystem` link for the subsystem name.
    pub fn from_sysfs(sysfs_root: &Path, syspath: &Path) -> Result<Self> {
        let uevent_path = syspath.join("uevent");
        let contents =
            fs::read_to_string(&uevent_path).map_err(|e| UdevError::io(&uevent_path, e))?;
        let mut properties = parse_uevent_file(&contents);

        let subsystem = fs::read_link(syspath.join("subsystem"))
            .ok()
            .and_then(|link| link.file_name().map(|n| n.to_string_lossy().into_owned()));

        if let Ok(relative) = syspath.strip_prefix(sysfs_root) {
            properties
                .entry("DEVPATH".to_string())
                .or_insert_with(|| format!("/{}", relative.display()));
        }
        if let Some(subsystem) = &subsystem {
            properties
                .entry("SUBSYSTEM".to_string())
                .or_insert_with(|| subsystem.clone());
        }

        Ok(Self {
            sysfs_path: Some(syspath.display().to_string()),
            subsystem,
            properties,
        })
    }

    /// The identity key of this device, if the kernel supplied one.
    pub fn sysfs_path(&self) -> Option<&str> {
        self.sysfs_path.as_deref()
    }

    pub fn subsystem(&self) -> Option<&str> {
        self.subsystem.as_deref()
    }

    /// `disk` or `partition` for block devices.
    pub fn devtype(&self) -> Option<&str> {
        self.property("DEVTYPE")
    }

    /// Kernel device name, e.g. `sda1` or `mapper/luks-...`.
    pub fn name(&self) -> Option<&str> {
        self.property("DEVNAME")
            .map(|name| name.strip_prefix("/dev/").unwrap_or(name))
            .filter(|name| !name.is_empty())
    }

    pub fn device_file(&self) -> Option<String> {
        self.name().map(|name| format!("/dev/{name}"))
    }

    pub fn device_number(&self) -> Option<(u32, u32)> {
        let major = self.property("MAJOR")?.parse().ok()?;
        let minor = self.property("MINOR")?.parse().ok()?;
        Some((major, minor))
    }

    pub fn seqnum(&self) -> Option<u64> {
        self.property("SEQNUM")?.parse().ok()
    }

    /// Previous sysfs path of a device that was renamed or reparented.
    pub fn previous_sysfs_path(&self, sysfs_root: &Path) -> Option<String> {
        self.property("DEVPATH_OLD")
            .map(|devpath| join_sysfs(sysfs_root, devpath))
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Reads `<sysfs_path>/<name>`, trimmed. `None` when the device has no
    /// sysfs path, the attribute is missing, or it is unreadable.
    pub fn sysfs_attr(&self, name: &str) -> Option<String> {
        let path = Path::new(self.sysfs_path.as_deref()?).join(name);
        fs::read_to_string(path)
            .ok()
            .map(|value| value.trim().to_string())
    }

    pub fn sysfs_attr_u64(&self, name: &str) -> Option<u64> {
        self.sysfs_attr(name)?.parse().ok()
    }

    pub fn sysfs_attr_bool(&self, name: &str) -> Option<bool> {
        self.sysfs_attr_u64(name).map(|v| v != 0)
    }
}

fn join_sysfs(sysfs_root: &Path, devpath: &str) -> String {
    let mut path = PathBuf::from(sysfs_root);
    path.push(devpath.trim_start_matches('/'));
    path.display().to_string()
}

/// Parses the `KEY=VALUE` lines of a sysfs `uevent` file.
pub(crate) fn parse_uevent_file(contents: &str) -> BTreeMap<String, String> {
    contents
        .lines()
        .filter_map(|line| line.split_once('='))
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
