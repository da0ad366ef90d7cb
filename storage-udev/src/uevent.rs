// SPDX-License-Identifier: GPL-3.0-only

//! Kernel uevent wire format.
//!
//! A kernel message is a `ACTION@DEVPATH` header followed by NUL-separated
//! `KEY=VALUE` pairs. Messages re-broadcast by udevd start with a `libudev`
//! magic and carry a binary header; those are not parsed here.

use std::collections::BTreeMap;
use std::path::Path;

use crate::action::UeventAction;
use crate::device::Device;
use crate::error::{Result, UdevError};

const UDEVD_MAGIC: &[u8] = b"libudev\0";

/// One hotplug occurrence: what happened, and the device it happened to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEvent {
    pub action: UeventAction,
    pub device: Device,
}

impl DeviceEvent {
    pub fn new(action: UeventAction, device: Device) -> Self {
        Self { action, device }
    }
}

pub(crate) fn parse_kernel_message(sysfs_root: &Path, buf: &[u8]) -> Result<DeviceEvent> {
    if buf.starts_with(UDEVD_MAGIC) {
        return Err(UdevError::Malformed("udevd message on kernel socket".into()));
    }

    let mut fields = buf.split(|b| *b == 0).filter(|f| !f.is_empty());

    let header = fields
        .next()
        .ok_or_else(|| UdevError::Malformed("empty message".into()))?;
    let header = String::from_utf8_lossy(header);
    let (header_action, header_devpath) = header
        .split_once('@')
        .ok_or_else(|| UdevError::Malformed(format!("bad header: {header}")))?;

    let mut env = BTreeMap::new();
    for field in fields {
        let field = String::from_utf8_lossy(field);
        if let Some((key, value)) = field.split_once('=') {
            env.insert(key.to_string(), value.to_string());
        }
    }

    // The environment is authoritative; the header is only a fallback.
    let action: UeventAction = env
        .get("ACTION")
        .map(String::as_str)
        .unwrap_or(header_action)
        .parse()?;
    env.entry("DEVPATH".to_string())
        .or_insert_with(|| header_devpath.to_string());

    Ok(DeviceEvent::new(
        action,
        Device::from_uevent_env(sysfs_root, env),
    ))
}
