// SPDX-License-Identifier: GPL-3.0-only

//! Kernel device model access for block device tracking
//!
//! This crate covers the two things a device provider needs from the kernel:
//! - A snapshot of the devices currently present (sysfs enumeration)
//! - A stream of hotplug events (`NETLINK_KOBJECT_UEVENT`)

pub mod action;
pub mod client;
pub mod device;
pub mod enumerate;
pub mod error;
pub mod monitor;
pub mod uevent;

pub use action::UeventAction;
pub use client::{DEFAULT_SYSFS_ROOT, DeviceEventSource, UdevClient};
pub use device::Device;
pub use enumerate::enumerate_subsystem;
pub use error::{Result, UdevError};
pub use monitor::DeviceEventStream;
pub use uevent::DeviceEvent;
