// SPDX-License-Identifier: GPL-3.0-only

use storage_udev::{Device, UeventAction};

use crate::daemon::Daemon;
use crate::error::ObjectError;

/// In-process representation of one live device.
///
/// A managed object is owned by exactly one registry entry. It is built from
/// the first snapshot seen for its sysfs path, refreshed in place from later
/// ones, and torn down explicitly once the device is gone.
pub trait ManagedObject: Send + Sync + Sized {
    fn construct(daemon: &Daemon, device: &Device) -> Result<Self, ObjectError>;

    /// Applies a later snapshot of the same device. Applying the same
    /// snapshot twice must leave the object in the same state as once.
    fn update(&mut self, action: UeventAction, device: &Device);

    /// Bus path the object is published under. Stable for the object's life.
    fn object_path(&self) -> &str;

    fn destroy(self) {}
}
