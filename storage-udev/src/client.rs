// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::path::{Path, PathBuf};

use crate::device::Device;
use crate::enumerate::enumerate_subsystem;
use crate::error::{Result, UdevError};
use crate::monitor::{DeviceEventStream, UeventSocket, spawn_reader};

pub const DEFAULT_SYSFS_ROOT: &str = "/sys";

/// Where device snapshots and hotplug events come from.
pub trait DeviceEventSource: Send {
    /// One-pass snapshot of the devices present in `subsystem`.
    fn enumerate(&self, subsystem: &str) -> Result<Vec<Device>>;

    /// Hands over the event stream for the subsystems the source watches.
    /// Can only be called once.
    fn subscribe(&mut self) -> Result<DeviceEventStream>;

    /// Mount point of sysfs, used to resolve relative kernel paths.
    fn sysfs_root(&self) -> &Path;
}

/// Kernel-backed device source.
///
/// Opening the client resolves the sysfs root and binds the uevent socket
/// immediately; failure to do so is fatal since nothing can be tracked
/// without it.
#[derive(Debug)]
pub struct UdevClient {
    sysfs_root: PathBuf,
    subsystems: Vec<String>,
    socket: Option<UeventSocket>,
}

impl UdevClient {
    pub fn new<S: AsRef<str>>(subsystems: &[S]) -> Result<Self> {
        Self::with_sysfs_root(DEFAULT_SYSFS_ROOT, subsystems)
    }

    pub fn with_sysfs_root<S: AsRef<str>>(
        sysfs_root: impl Into<PathBuf>,
        subsystems: &[S],
    ) -> Result<Self> {
        let sysfs_root: PathBuf = sysfs_root.into();
        let sysfs_root = resolve_sysfs_root(&sysfs_root)?;
        let socket = UeventSocket::open()?;
        Ok(Self {
            sysfs_root,
            subsystems: subsystems.iter().map(|s| s.as_ref().to_string()).collect(),
            socket: Some(socket),
        })
    }

    pub fn subsystems(&self) -> &[String] {
        &self.subsystems
    }

    pub fn is_subscribed(&self) -> bool {
        self.socket.is_none()
    }

    pub fn query_by_subsystem(&self, subsystem: &str) -> Result<Vec<Device>> {
        enumerate_subsystem(&self.sysfs_root, subsystem)
    }

    pub fn query_by_sysfs_path(&self, sysfs_path: impl AsRef<Path>) -> Result<Device> {
        let syspath = fs::canonicalize(sysfs_path.as_ref())
            .map_err(|e| UdevError::io(sysfs_path.as_ref(), e))?;
        Device::from_sysfs(&self.sysfs_root, &syspath)
    }

    /// Looks a block device up by its `major:minor` number.
    pub fn query_by_device_number(&self, major: u32, minor: u32) -> Result<Device> {
        self.query_by_sysfs_path(
            self.sysfs_root
                .join("dev/block")
                .join(format!("{major}:{minor}")),
        )
    }
}

/// Resolves symlinks and `.` components once, so that enumerated devices and
/// kernel events build identical sysfs paths.
pub(crate) fn resolve_sysfs_root(sysfs_root: &Path) -> Result<PathBuf> {
    fs::canonicalize(sysfs_root).map_err(|e| UdevError::io(sysfs_root, e))
}

impl DeviceEventSource for UdevClient {
    fn enumerate(&self, subsystem: &str) -> Result<Vec<Device>> {
        self.query_by_subsystem(subsystem)
    }

    fn subscribe(&mut self) -> Result<DeviceEventStream> {
        let socket = self.socket.take().ok_or(UdevError::AlreadySubscribed)?;
        spawn_reader(socket, self.sysfs_root.clone(), self.subsystems.clone())
    }

    fn sysfs_root(&self) -> &Path {
        &self.sysfs_root
    }
}
