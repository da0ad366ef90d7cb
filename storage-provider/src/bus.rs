// SPDX-License-Identifier: GPL-3.0-only

//! D-Bus side of the provider: the `Block` interface and the publisher that
//! puts it on a zbus object server.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use async_trait::async_trait;
use zbus::names::InterfaceName;
use zbus::object_server::Interface;
use zbus::{Connection, interface};

use crate::block::{BlockProperties, LinuxBlock};
use crate::error::PublishError;
use crate::object::ManagedObject;
use crate::publisher::ObjectPublisher;

/// Read-only view of a [`LinuxBlock`] served on the bus.
pub struct BlockInterface {
    properties: Arc<RwLock<BlockProperties>>,
}

impl BlockInterface {
    fn new(properties: Arc<RwLock<BlockProperties>>) -> Self {
        Self { properties }
    }

    /// D-Bus name the interface is served under.
    pub fn interface_name() -> InterfaceName<'static> {
        <Self as Interface>::name()
    }

    fn read(&self) -> RwLockReadGuard<'_, BlockProperties> {
        self.properties
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[interface(name = "org.cosmic.ext.Storage.Block")]
impl BlockInterface {
    /// Device node, e.g. `/dev/sda1`
    #[zbus(property)]
    async fn device(&self) -> String {
        self.read().device.clone()
    }

    #[zbus(property)]
    async fn preferred_device(&self) -> String {
        self.read().preferred_device.clone()
    }

    #[zbus(property)]
    async fn device_number(&self) -> u64 {
        self.read().device_number
    }

    /// Size in bytes
    #[zbus(property)]
    async fn size(&self) -> u64 {
        self.read().size
    }

    #[zbus(property)]
    async fn read_only(&self) -> bool {
        self.read().read_only
    }

    /// `disk` or `partition`
    #[zbus(property)]
    async fn dev_type(&self) -> String {
        self.read().dev_type.clone()
    }

    #[zbus(property)]
    async fn sysfs_path(&self) -> String {
        self.read().sysfs_path.clone()
    }

    #[zbus(property)]
    async fn hint_partitionable(&self) -> bool {
        self.read().hint_partitionable
    }

    #[zbus(property)]
    async fn hint_removable(&self) -> bool {
        self.read().hint_removable
    }
}

/// Publishes [`LinuxBlock`]s on a zbus connection's object server.
#[derive(Clone)]
pub struct ZbusPublisher {
    connection: Connection,
}

impl ZbusPublisher {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

#[async_trait]
impl ObjectPublisher<LinuxBlock> for ZbusPublisher {
    async fn export(&self, object: &LinuxBlock) -> Result<(), PublishError> {
        let added = self
            .connection
            .object_server()
            .at(
                object.object_path(),
                BlockInterface::new(object.shared_properties()),
            )
            .await?;

        if !added {
            return Err(PublishError::AlreadyExported(
                object.object_path().to_string(),
            ));
        }
        Ok(())
    }

    async fn unexport(&self, object_path: &str) -> Result<(), PublishError> {
        match self
            .connection
            .object_server()
            .remove::<BlockInterface, _>(object_path)
            .await
        {
            Ok(_) => Ok(()),
            Err(zbus::Error::InterfaceNotFound) => {
                Err(PublishError::NotExported(object_path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn notify_changed(&self, object: &LinuxBlock) -> Result<(), PublishError> {
        let iface_ref = self
            .connection
            .object_server()
            .interface::<_, BlockInterface>(object.object_path())
            .await?;
        let emitter = iface_ref.signal_emitter();
        let iface = iface_ref.get().await;

        iface.device_changed(emitter).await?;
        iface.preferred_device_changed(emitter).await?;
        iface.device_number_changed(emitter).await?;
        iface.size_changed(emitter).await?;
        iface.read_only_changed(emitter).await?;
        iface.dev_type_changed(emitter).await?;
        iface.hint_partitionable_changed(emitter).await?;
        iface.hint_removable_changed(emitter).await?;
        Ok(())
    }
}
