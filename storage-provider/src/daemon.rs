// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};
use zbus::zvariant::ObjectPath;

use crate::error::{ProviderError, Result};

pub const DEFAULT_OBJECT_ROOT: &str = "/org/cosmic/ext/Storage/BlockDevices";
pub const DEFAULT_SUBSYSTEMS: &[&str] = &["block"];

/// Order in which enumerated devices are seeded at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeedOrder {
    /// Whole disks first, then partitions, then stacked devices
    /// (device-mapper, md) that sit on top of other block devices.
    #[default]
    ParentsFirst,
    /// Whatever order sysfs returned.
    Enumeration,
}

/// Shared daemon state handed to every managed object on construction.
#[derive(Debug, Clone)]
pub struct Daemon {
    object_root: String,
    subsystems: Vec<String>,
    seed_order: SeedOrder,
}

impl Daemon {
    pub fn new(object_root: &str) -> Result<Self> {
        let parsed = ObjectPath::try_from(object_root).map_err(|e| {
            ProviderError::InvalidObjectRoot {
                path: object_root.to_string(),
                reason: e.to_string(),
            }
        })?;
        if parsed.as_str() == "/" {
            return Err(ProviderError::InvalidObjectRoot {
                path: object_root.to_string(),
                reason: "objects cannot be exported directly under /".to_string(),
            });
        }

        Ok(Self {
            object_root: object_root.to_string(),
            subsystems: DEFAULT_SUBSYSTEMS.iter().map(|s| s.to_string()).collect(),
            seed_order: SeedOrder::default(),
        })
    }

    pub fn with_subsystems<S: AsRef<str>>(mut self, subsystems: &[S]) -> Result<Self> {
        if subsystems.is_empty() {
            return Err(ProviderError::NoSubsystems);
        }
        self.subsystems = subsystems.iter().map(|s| s.as_ref().to_string()).collect();
        Ok(self)
    }

    pub fn with_seed_order(mut self, seed_order: SeedOrder) -> Self {
        self.seed_order = seed_order;
        self
    }

    pub fn object_root(&self) -> &str {
        &self.object_root
    }

    pub fn subsystems(&self) -> &[String] {
        &self.subsystems
    }

    pub fn seed_order(&self) -> SeedOrder {
        self.seed_order
    }
}
