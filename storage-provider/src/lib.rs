// SPDX-License-Identifier: GPL-3.0-only

//! Block device provider
//!
//! Mirrors the kernel's block devices onto D-Bus objects:
//! - [`DeviceRegistry`] reconciles hotplug events into one object per device
//! - [`ManagedObject`] / [`ObjectPublisher`] are the seams it drives
//! - [`LinuxBlock`] / [`ZbusPublisher`] are the production implementations

pub mod block;
pub mod bus;
pub mod daemon;
pub mod error;
pub mod object;
pub mod publisher;
pub mod registry;

pub use block::{BlockProperties, LinuxBlock, block_object_path, makedev};
pub use bus::{BlockInterface, ZbusPublisher};
pub use daemon::{DEFAULT_OBJECT_ROOT, DEFAULT_SUBSYSTEMS, Daemon, SeedOrder};
pub use error::{ObjectError, ProviderError, PublishError, Result};
pub use object::ManagedObject;
pub use publisher::ObjectPublisher;
pub use registry::DeviceRegistry;

/// The registry as the daemon runs it.
pub type LinuxProvider = DeviceRegistry<storage_udev::UdevClient, LinuxBlock, ZbusPublisher>;
