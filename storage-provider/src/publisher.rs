// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;

use crate::error::PublishError;
use crate::object::ManagedObject;

/// Makes managed objects visible to other processes.
#[async_trait]
pub trait ObjectPublisher<O: ManagedObject>: Send + Sync {
    async fn export(&self, object: &O) -> Result<(), PublishError>;

    async fn unexport(&self, object_path: &str) -> Result<(), PublishError>;

    /// Tells subscribers that an exported object's state changed in place.
    async fn notify_changed(&self, _object: &O) -> Result<(), PublishError> {
        Ok(())
    }
}
