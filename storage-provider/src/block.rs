// SPDX-License-Identifier: GPL-3.0-only

//! Managed object for one kernel block device.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use storage_udev::{Device, UeventAction};
use tracing::trace;

use crate::daemon::Daemon;
use crate::error::ObjectError;
use crate::object::ManagedObject;

const SECTOR_SIZE: u64 = 512;

/// Property snapshot of a block device as shown on the bus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockProperties {
    pub device: String,
    pub preferred_device: String,
    pub device_number: u64,
    pub size: u64,
    pub read_only: bool,
    pub dev_type: String,
    pub sysfs_path: String,
    pub hint_partitionable: bool,
    pub hint_removable: bool,
}

impl BlockProperties {
    /// Refreshes every field the snapshot carries and leaves the rest alone,
    /// so a sparse change event does not blank out known values.
    fn apply(&mut self, device: &Device) {
        if let Some(sysfs_path) = device.sysfs_path() {
            self.sysfs_path = sysfs_path.to_string();
        }
        if let Some(device_file) = device.device_file() {
            self.preferred_device = device
                .property("DEVLINKS")
                .and_then(preferred_link)
                .unwrap_or_else(|| device_file.clone());
            self.device = device_file;
        }
        if let Some((major, minor)) = device.device_number() {
            self.device_number = makedev(major, minor);
        }
        if let Some(dev_type) = device.devtype() {
            self.dev_type = dev_type.to_string();
        }
        if let Some(sectors) = device.sysfs_attr_u64("size") {
            self.size = sectors * SECTOR_SIZE;
        }
        if let Some(read_only) = device.sysfs_attr_bool("ro") {
            self.read_only = read_only;
        }

        self.hint_partitionable = self.dev_type == "disk"
            && device.sysfs_attr_u64("ext_range").unwrap_or(1) > 1;
        if let Some(removable) = removable(device, &self.dev_type) {
            self.hint_removable = removable;
        }
    }
}

/// Picks a stable symlink out of a space-separated `DEVLINKS` list.
fn preferred_link(devlinks: &str) -> Option<String> {
    const PREFERENCE: &[&str] = &["/dev/mapper/", "/dev/md/", "/dev/disk/by-id/"];

    let links: Vec<&str> = devlinks.split_whitespace().collect();
    PREFERENCE.iter().find_map(|prefix| {
        links
            .iter()
            .find(|link| link.starts_with(prefix))
            .map(|link| link.to_string())
    })
}

fn removable(device: &Device, dev_type: &str) -> Option<bool> {
    if dev_type != "partition" {
        return device.sysfs_attr_bool("removable");
    }

    // Partitions inherit the flag from the disk they live on.
    let parent = Path::new(device.sysfs_path()?).parent()?.to_str()?;
    Device::new()
        .with_sysfs_path(parent)
        .sysfs_attr_bool("removable")
}

/// Same encoding as glibc's `makedev`.
pub fn makedev(major: u32, minor: u32) -> u64 {
    let major = major as u64;
    let minor = minor as u64;
    ((major & 0xffff_f000) << 32)
        | ((major & 0x0000_0fff) << 8)
        | ((minor & 0xffff_ff00) << 12)
        | (minor & 0x0000_00ff)
}

/// Appends `name` to `root`, escaping every byte outside `[A-Za-z0-9]` as `_xx`.
pub fn block_object_path(root: &str, name: &str) -> String {
    let mut path = format!("{}/block_devices/", root.trim_end_matches('/'));
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() {
            path.push(byte as char);
        } else {
            path.push_str(&format!("_{byte:02x}"));
        }
    }
    path
}

/// A published block device.
///
/// The property snapshot is shared with the bus interface serving it; the
/// interface only reads it and is dropped when the object is unexported.
#[derive(Debug)]
pub struct LinuxBlock {
    object_path: String,
    properties: Arc<RwLock<BlockProperties>>,
}

impl LinuxBlock {
    pub fn properties(&self) -> BlockProperties {
        self.properties
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn shared_properties(&self) -> Arc<RwLock<BlockProperties>> {
        Arc::clone(&self.properties)
    }
}

impl ManagedObject for LinuxBlock {
    fn construct(daemon: &Daemon, device: &Device) -> Result<Self, ObjectError> {
        let sysfs_path = device.sysfs_path().unwrap_or("<none>");
        let name = device
            .name()
            .ok_or_else(|| ObjectError::MissingDeviceName(sysfs_path.to_string()))?;

        let object_path = block_object_path(daemon.object_root(), name);
        zbus::zvariant::ObjectPath::try_from(object_path.as_str()).map_err(|e| {
            ObjectError::InvalidObjectPath {
                path: object_path.clone(),
                reason: e.to_string(),
            }
        })?;

        let mut properties = BlockProperties::default();
        properties.apply(device);

        Ok(Self {
            object_path,
            properties: Arc::new(RwLock::new(properties)),
        })
    }

    fn update(&mut self, action: UeventAction, device: &Device) {
        trace!("{} on {}", action, self.object_path);
        self.properties
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(device);
    }

    fn object_path(&self) -> &str {
        &self.object_path
    }

    fn destroy(self) {
        trace!("Destroying {}", self.object_path);
    }
}
