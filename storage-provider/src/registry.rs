// SPDX-License-Identifier: GPL-3.0-only

//! Device registry: keeps one published object per present block device.
//!
//! Every event, whether synthesized from startup enumeration or delivered by
//! the kernel, goes through [`DeviceRegistry::handle_event`]. An entry is in
//! the map exactly when its object is exported: insertion happens only after
//! a successful export, and an entry is unexported before it is dropped.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use futures_util::StreamExt;
use storage_udev::{Device, DeviceEventSource, DeviceEventStream, UeventAction};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::daemon::{Daemon, SeedOrder};
use crate::error::{ProviderError, Result};
use crate::object::ManagedObject;
use crate::publisher::ObjectPublisher;

pub struct DeviceRegistry<S, O, P> {
    daemon: Arc<Daemon>,
    source: S,
    publisher: P,
    objects: HashMap<String, O>,
    events: Option<DeviceEventStream>,
}

impl<S, O, P> DeviceRegistry<S, O, P>
where
    S: DeviceEventSource,
    O: ManagedObject,
    P: ObjectPublisher<O>,
{
    pub fn new(daemon: Arc<Daemon>, source: S, publisher: P) -> Self {
        Self {
            daemon,
            source,
            publisher,
            objects: HashMap::new(),
            events: None,
        }
    }

    /// Seeds the registry from the devices present right now, then takes
    /// over the source's event stream for [`DeviceRegistry::run`].
    pub async fn initialize(&mut self) -> Result<()> {
        let mut devices = Vec::new();
        for subsystem in self.daemon.subsystems() {
            devices.extend(self.source.enumerate(subsystem)?);
        }

        let devices = arrange_for_seeding(devices, self.daemon.seed_order());
        info!(
            "Seeding {} devices ({:?} order)",
            devices.len(),
            self.daemon.seed_order()
        );
        for device in &devices {
            self.handle_event(UeventAction::Add, device).await;
        }

        self.events = Some(self.source.subscribe()?);
        info!("Tracking {} devices", self.objects.len());
        Ok(())
    }

    /// Processes hotplug events until `cancel` fires.
    ///
    /// Returns [`ProviderError::EventStreamClosed`] if the source stops
    /// delivering events first, since the registry can no longer follow the
    /// kernel.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        let mut events = self.events.take().ok_or(ProviderError::NotInitialized)?;

        let cancelled = loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break true,
                event = events.next() => match event {
                    Some(event) => self.handle_event(event.action, &event.device).await,
                    None => break false,
                },
            }
        };

        if !cancelled {
            return Err(ProviderError::EventStreamClosed);
        }

        debug!("Device event processing cancelled");
        self.events = Some(events);
        Ok(())
    }

    /// Reconciles the registry with one device event.
    ///
    /// Never fails: problems with a single event are logged and the event is
    /// dropped. The next event for the same device brings it back in sync.
    pub async fn handle_event(&mut self, action: UeventAction, device: &Device) {
        let Some(sysfs_path) = device.sysfs_path() else {
            warn!("Dropping {} event for a device without a sysfs path", action);
            return;
        };

        debug!("{} {}", action, sysfs_path);

        match action {
            UeventAction::Remove => self.remove(sysfs_path).await,
            UeventAction::Move => {
                if let Some(old_path) = device.previous_sysfs_path(self.source.sysfs_root())
                    && old_path != sysfs_path
                {
                    debug!("{} moved to {}", old_path, sysfs_path);
                    self.remove(&old_path).await;
                }
                self.add_or_update(action, sysfs_path, device).await;
            }
            _ => self.add_or_update(action, sysfs_path, device).await,
        }
    }

    async fn add_or_update(&mut self, action: UeventAction, sysfs_path: &str, device: &Device) {
        if let Some(object) = self.objects.get_mut(sysfs_path) {
            object.update(action, device);
            if let Err(e) = self.publisher.notify_changed(object).await {
                warn!(
                    "Failed to announce changes on {}: {}",
                    object.object_path(),
                    e
                );
            }
            return;
        }

        if action != UeventAction::Add {
            debug!("{} for untracked device {}, adding it", action, sysfs_path);
        }

        let object = match O::construct(&self.daemon, device) {
            Ok(object) => object,
            Err(e) => {
                warn!("Could not create object for {}: {}", sysfs_path, e);
                return;
            }
        };

        if let Err(e) = self.publisher.export(&object).await {
            warn!(
                "Failed to export {} for {}: {}",
                object.object_path(),
                sysfs_path,
                e
            );
            object.destroy();
            return;
        }

        trace!("Exported {} for {}", object.object_path(), sysfs_path);
        self.objects.insert(sysfs_path.to_string(), object);
    }

    async fn remove(&mut self, sysfs_path: &str) {
        let Some(object_path) = self
            .objects
            .get(sysfs_path)
            .map(|object| object.object_path().to_string())
        else {
            trace!("Remove for untracked device {}", sysfs_path);
            return;
        };

        // The device is gone either way; an unexport failure must not keep
        // the entry alive.
        if let Err(e) = self.publisher.unexport(&object_path).await {
            warn!("Failed to unexport {}: {}", object_path, e);
        }

        if let Some(object) = self.objects.remove(sysfs_path) {
            object.destroy();
        }
        trace!("Removed {} for {}", object_path, sysfs_path);
    }

    /// Unexports and destroys every tracked object, then releases the source.
    pub async fn shutdown(mut self) {
        info!("Releasing {} devices", self.objects.len());

        for (sysfs_path, object) in self.objects.drain() {
            if let Err(e) = self.publisher.unexport(object.object_path()).await {
                warn!(
                    "Failed to unexport {} for {}: {}",
                    object.object_path(),
                    sysfs_path,
                    e
                );
            }
            object.destroy();
        }
    }

    /// The device source, for callers that need their own device queries.
    pub fn udev_client(&self) -> &S {
        &self.source
    }

    pub fn daemon(&self) -> &Daemon {
        &self.daemon
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, sysfs_path: &str) -> bool {
        self.objects.contains_key(sysfs_path)
    }

    pub fn get(&self, sysfs_path: &str) -> Option<&O> {
        self.objects.get(sysfs_path)
    }

    /// `(sysfs path, object path)` for every tracked device.
    pub fn object_paths(&self) -> impl Iterator<Item = (&str, &str)> {
        self.objects
            .iter()
            .map(|(sysfs_path, object)| (sysfs_path.as_str(), object.object_path()))
    }
}

fn arrange_for_seeding(mut devices: Vec<Device>, order: SeedOrder) -> Vec<Device> {
    if order == SeedOrder::ParentsFirst {
        devices.sort_by_cached_key(seed_rank);
    }
    devices
}

fn seed_rank(device: &Device) -> u8 {
    if has_slaves(device) {
        2
    } else if device.devtype() == Some("partition") {
        1
    } else {
        0
    }
}

fn has_slaves(device: &Device) -> bool {
    device
        .sysfs_path()
        .and_then(|path| std::fs::read_dir(Path::new(path).join("slaves")).ok())
        .is_some_and(|mut entries| entries.next().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    use async_trait::async_trait;
    use storage_udev::{DeviceEvent, UdevError};
    use tokio::sync::mpsc;

    use crate::error::{ObjectError, PublishError};

    static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);
    static DESTROYED: Mutex<Vec<(String, u64)>> = Mutex::new(Vec::new());

    #[derive(Debug)]
    struct FakeObject {
        instance: u64,
        sysfs_path: String,
        object_path: String,
        size: Option<String>,
        updates: Vec<UeventAction>,
    }

    impl ManagedObject for FakeObject {
        fn construct(daemon: &Daemon, device: &Device) -> std::result::Result<Self, ObjectError> {
            let sysfs_path = device.sysfs_path().unwrap_or_default().to_string();
            let name = device
                .name()
                .ok_or_else(|| ObjectError::MissingDeviceName(sysfs_path.clone()))?;
            Ok(Self {
                instance: NEXT_INSTANCE.fetch_add(1, Ordering::SeqCst),
                object_path: format!("{}/block_devices/{}", daemon.object_root(), name),
                sysfs_path,
                size: device.property("SIZE").map(str::to_string),
                updates: Vec::new(),
            })
        }

        fn update(&mut self, action: UeventAction, device: &Device) {
            self.size = device.property("SIZE").map(str::to_string);
            self.updates.push(action);
        }

        fn object_path(&self) -> &str {
            &self.object_path
        }

        fn destroy(self) {
            DESTROYED
                .lock()
                .unwrap()
                .push((self.sysfs_path, self.instance));
        }
    }

    fn destroyed_instances(sysfs_path: &str) -> Vec<u64> {
        DESTROYED
            .lock()
            .unwrap()
            .iter()
            .filter(|(path, _)| path == sysfs_path)
            .map(|(_, instance)| *instance)
            .collect()
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Export(String),
        Unexport(String),
        Notify(String),
    }

    #[derive(Default)]
    struct PublisherState {
        calls: Mutex<Vec<Call>>,
        exported: Mutex<HashSet<String>>,
        fail_export: Mutex<bool>,
        fail_unexport: Mutex<bool>,
    }

    /// Records calls; clones share state so a test can keep a handle after
    /// the registry is consumed.
    #[derive(Clone, Default)]
    struct FakePublisher {
        state: Arc<PublisherState>,
    }

    impl FakePublisher {
        fn set_fail_export(&self, fail: bool) {
            *self.state.fail_export.lock().unwrap() = fail;
        }

        fn set_fail_unexport(&self, fail: bool) {
            *self.state.fail_unexport.lock().unwrap() = fail;
        }

        fn take_calls(&self) -> Vec<Call> {
            std::mem::take(&mut *self.state.calls.lock().unwrap())
        }

        fn exported(&self) -> HashSet<String> {
            self.state.exported.lock().unwrap().clone()
        }

        fn record(&self, call: Call) {
            self.state.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl ObjectPublisher<FakeObject> for FakePublisher {
        async fn export(&self, object: &FakeObject) -> std::result::Result<(), PublishError> {
            let path = object.object_path().to_string();
            self.record(Call::Export(path.clone()));
            if *self.state.fail_export.lock().unwrap() {
                return Err(PublishError::DBus(zbus::Error::Failure("boom".into())));
            }
            if !self.state.exported.lock().unwrap().insert(path.clone()) {
                return Err(PublishError::AlreadyExported(path));
            }
            Ok(())
        }

        async fn unexport(&self, object_path: &str) -> std::result::Result<(), PublishError> {
            self.record(Call::Unexport(object_path.to_string()));
            self.state.exported.lock().unwrap().remove(object_path);
            if *self.state.fail_unexport.lock().unwrap() {
                return Err(PublishError::NotExported(object_path.to_string()));
            }
            Ok(())
        }

        async fn notify_changed(&self, object: &FakeObject) -> std::result::Result<(), PublishError> {
            self.record(Call::Notify(object.object_path().to_string()));
            Ok(())
        }
    }

    struct FakeSource {
        devices: Vec<Device>,
        stream: Option<DeviceEventStream>,
    }

    impl FakeSource {
        fn new(devices: Vec<Device>) -> (Self, mpsc::Sender<DeviceEvent>) {
            let (sender, stream) = DeviceEventStream::channel(16);
            let source = Self {
                devices,
                stream: Some(stream),
            };
            (source, sender)
        }
    }

    impl DeviceEventSource for FakeSource {
        fn enumerate(&self, subsystem: &str) -> storage_udev::Result<Vec<Device>> {
            Ok(self
                .devices
                .iter()
                .filter(|d| d.subsystem() == Some(subsystem))
                .cloned()
                .collect())
        }

        fn subscribe(&mut self) -> storage_udev::Result<DeviceEventStream> {
            self.stream.take().ok_or(UdevError::AlreadySubscribed)
        }

        fn sysfs_root(&self) -> &Path {
            Path::new("/sys")
        }
    }

    type TestRegistry = DeviceRegistry<FakeSource, FakeObject, FakePublisher>;

    const ROOT: &str = "/org/cosmic/ext/Storage/BlockDevices";

    fn block(sysfs_path: &str, name: &str) -> Device {
        Device::new()
            .with_sysfs_path(sysfs_path)
            .with_subsystem("block")
            .with_property("DEVNAME", name)
            .with_property("DEVTYPE", "disk")
    }

    fn partition(sysfs_path: &str, name: &str) -> Device {
        block(sysfs_path, name).with_property("DEVTYPE", "partition")
    }

    fn registry_with(devices: Vec<Device>) -> (TestRegistry, mpsc::Sender<DeviceEvent>) {
        let (source, sender) = FakeSource::new(devices);
        let daemon = Arc::new(Daemon::new(ROOT).unwrap());
        (
            DeviceRegistry::new(daemon, source, FakePublisher::default()),
            sender,
        )
    }

    fn registry() -> TestRegistry {
        registry_with(Vec::new()).0
    }

    fn assert_coupled(registry: &TestRegistry) {
        let mapped: HashSet<String> = registry
            .object_paths()
            .map(|(_, object_path)| object_path.to_string())
            .collect();
        assert_eq!(mapped, registry.publisher().exported());
    }

    #[tokio::test]
    async fn add_publishes_and_maps() {
        let mut registry = registry();
        let sda = block("/sys/devices/add/sda", "sda");

        registry.handle_event(UeventAction::Add, &sda).await;

        assert!(registry.contains("/sys/devices/add/sda"));
        assert_eq!(
            registry.publisher().take_calls(),
            vec![Call::Export(format!("{ROOT}/block_devices/sda"))]
        );
        assert_coupled(&registry);
    }

    #[tokio::test]
    async fn repeated_add_keeps_a_single_object() {
        let mut registry = registry();
        let sda = block("/sys/devices/dup/sda", "sda");

        registry.handle_event(UeventAction::Add, &sda).await;
        let first = registry.get("/sys/devices/dup/sda").unwrap().instance;
        registry.handle_event(UeventAction::Add, &sda).await;
        registry.handle_event(UeventAction::Change, &sda).await;

        assert_eq!(registry.len(), 1);
        let object = registry.get("/sys/devices/dup/sda").unwrap();
        assert_eq!(object.instance, first);
        assert_eq!(object.updates, vec![UeventAction::Add, UeventAction::Change]);
        let exports = registry
            .publisher()
            .take_calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Export(_)))
            .count();
        assert_eq!(exports, 1);
        assert_coupled(&registry);
    }

    #[tokio::test]
    async fn change_is_idempotent() {
        let mut registry = registry();
        let sdb = block("/sys/devices/idem/sdb", "sdb");
        registry.handle_event(UeventAction::Add, &sdb).await;

        let grown = sdb.clone().with_property("SIZE", "2048");
        registry.handle_event(UeventAction::Change, &grown).await;
        let once = registry.get("/sys/devices/idem/sdb").unwrap().size.clone();
        registry.handle_event(UeventAction::Change, &grown).await;
        let twice = registry.get("/sys/devices/idem/sdb").unwrap().size.clone();

        assert_eq!(once.as_deref(), Some("2048"));
        assert_eq!(once, twice);
        assert_eq!(registry.len(), 1);
        assert_coupled(&registry);
    }

    #[tokio::test]
    async fn add_after_remove_creates_a_fresh_instance() {
        let mut registry = registry();
        let sdc = block("/sys/devices/readd/sdc", "sdc");

        registry.handle_event(UeventAction::Add, &sdc).await;
        let first = registry.get("/sys/devices/readd/sdc").unwrap().instance;
        registry.handle_event(UeventAction::Remove, &sdc).await;
        assert!(registry.is_empty());
        assert_coupled(&registry);

        registry.handle_event(UeventAction::Add, &sdc).await;
        let second = registry.get("/sys/devices/readd/sdc").unwrap().instance;

        assert_ne!(first, second);
        assert_eq!(registry.len(), 1);
        assert_eq!(destroyed_instances("/sys/devices/readd/sdc"), vec![first]);
        assert_eq!(
            registry.publisher().take_calls(),
            vec![
                Call::Export(format!("{ROOT}/block_devices/sdc")),
                Call::Unexport(format!("{ROOT}/block_devices/sdc")),
                Call::Export(format!("{ROOT}/block_devices/sdc")),
            ]
        );
        assert_coupled(&registry);
    }

    #[tokio::test]
    async fn orphan_and_duplicate_removes_are_ignored() {
        let mut registry = registry();
        let sdd = block("/sys/devices/orphan/sdd", "sdd");

        registry.handle_event(UeventAction::Remove, &sdd).await;
        assert!(registry.is_empty());
        assert!(registry.publisher().take_calls().is_empty());

        registry.handle_event(UeventAction::Add, &sdd).await;
        registry.handle_event(UeventAction::Remove, &sdd).await;
        registry.handle_event(UeventAction::Remove, &sdd).await;

        let unexports = registry
            .publisher()
            .take_calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Unexport(_)))
            .count();
        assert_eq!(unexports, 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn change_without_add_is_promoted() {
        let mut registry = registry();
        let sde = block("/sys/devices/promote/sde", "sde");

        registry.handle_event(UeventAction::Change, &sde).await;

        assert!(registry.contains("/sys/devices/promote/sde"));
        assert!(registry.get("/sys/devices/promote/sde").unwrap().updates.is_empty());
        assert_eq!(
            registry.publisher().take_calls(),
            vec![Call::Export(format!("{ROOT}/block_devices/sde"))]
        );
        assert_coupled(&registry);
    }

    #[tokio::test]
    async fn failed_export_destroys_and_does_not_map() {
        let mut registry = registry();
        let sdf = block("/sys/devices/exportfail/sdf", "sdf");

        registry.publisher().set_fail_export(true);
        registry.handle_event(UeventAction::Add, &sdf).await;

        assert!(registry.is_empty());
        assert_eq!(destroyed_instances("/sys/devices/exportfail/sdf").len(), 1);
        assert_coupled(&registry);

        registry.publisher().set_fail_export(false);
        registry.handle_event(UeventAction::Change, &sdf).await;
        assert!(registry.contains("/sys/devices/exportfail/sdf"));
        assert_coupled(&registry);
    }

    #[tokio::test]
    async fn failed_unexport_still_forgets_the_device() {
        let mut registry = registry();
        let sdg = block("/sys/devices/unexportfail/sdg", "sdg");
        registry.handle_event(UeventAction::Add, &sdg).await;

        registry.publisher().set_fail_unexport(true);
        registry.handle_event(UeventAction::Remove, &sdg).await;

        assert!(registry.is_empty());
        assert_eq!(destroyed_instances("/sys/devices/unexportfail/sdg").len(), 1);
    }

    #[tokio::test]
    async fn malformed_descriptors_are_dropped() {
        let mut registry = registry();

        let no_path = Device::new().with_subsystem("block").with_property("DEVNAME", "sdh");
        registry.handle_event(UeventAction::Add, &no_path).await;

        let no_name = Device::new()
            .with_sysfs_path("/sys/devices/malformed/noname")
            .with_subsystem("block");
        registry.handle_event(UeventAction::Add, &no_name).await;

        assert!(registry.is_empty());
        assert!(registry.publisher().take_calls().is_empty());

        let sdh = block("/sys/devices/malformed/sdh", "sdh");
        registry.handle_event(UeventAction::Add, &sdh).await;
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn move_rekeys_the_entry() {
        let mut registry = registry();
        let before = block("/sys/devices/virtual/block/dm-0", "dm-0");
        registry.handle_event(UeventAction::Add, &before).await;

        let after = block("/sys/devices/virtual/block/dm-0-renamed", "dm-1")
            .with_property("DEVPATH_OLD", "/devices/virtual/block/dm-0");
        registry.handle_event(UeventAction::Move, &after).await;

        assert!(!registry.contains("/sys/devices/virtual/block/dm-0"));
        assert!(registry.contains("/sys/devices/virtual/block/dm-0-renamed"));
        assert_eq!(registry.len(), 1);
        assert_coupled(&registry);
    }

    #[tokio::test]
    async fn initialize_seeds_every_enumerated_device() {
        let devices = vec![
            block("/sys/devices/seed/c", "sdc"),
            block("/sys/devices/seed/a", "sda"),
            block("/sys/devices/seed/b", "sdb"),
            Device::new()
                .with_sysfs_path("/sys/devices/seed/tty0")
                .with_subsystem("tty")
                .with_property("DEVNAME", "tty0"),
        ];
        let (mut registry, _sender) = registry_with(devices);

        registry.initialize().await.unwrap();

        let mut keys: Vec<_> = registry.object_paths().map(|(k, _)| k.to_string()).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "/sys/devices/seed/a",
                "/sys/devices/seed/b",
                "/sys/devices/seed/c"
            ]
        );
        assert_coupled(&registry);
    }

    #[tokio::test]
    async fn seeding_puts_disks_before_partitions() {
        let devices = vec![
            partition("/sys/devices/order/sda/sda1", "sda1"),
            block("/sys/devices/order/sda", "sda"),
            partition("/sys/devices/order/sda/sda2", "sda2"),
        ];
        let (mut registry, _sender) = registry_with(devices);

        registry.initialize().await.unwrap();

        let exports: Vec<_> = registry
            .publisher()
            .take_calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Export(path) => Some(path),
                _ => None,
            })
            .collect();
        assert_eq!(
            exports,
            vec![
                format!("{ROOT}/block_devices/sda"),
                format!("{ROOT}/block_devices/sda1"),
                format!("{ROOT}/block_devices/sda2"),
            ]
        );
    }

    #[tokio::test]
    async fn enumeration_order_is_kept_when_requested() {
        let devices = vec![
            partition("/sys/devices/raw/sda/sda1", "sda1"),
            block("/sys/devices/raw/sda", "sda"),
        ];
        let (source, _sender) = FakeSource::new(devices);
        let daemon = Arc::new(
            Daemon::new(ROOT)
                .unwrap()
                .with_seed_order(SeedOrder::Enumeration),
        );
        let mut registry = DeviceRegistry::new(daemon, source, FakePublisher::default());

        registry.initialize().await.unwrap();

        assert_eq!(
            registry.publisher().take_calls(),
            vec![
                Call::Export(format!("{ROOT}/block_devices/sda1")),
                Call::Export(format!("{ROOT}/block_devices/sda")),
            ]
        );
    }

    #[tokio::test]
    async fn run_applies_streamed_events_then_fails_when_the_stream_closes() {
        let (mut registry, sender) = registry_with(vec![block("/sys/devices/run/sda", "sda")]);
        registry.initialize().await.unwrap();

        sender
            .send(DeviceEvent::new(
                UeventAction::Add,
                block("/sys/devices/run/sdb", "sdb"),
            ))
            .await
            .unwrap();
        sender
            .send(DeviceEvent::new(
                UeventAction::Remove,
                block("/sys/devices/run/sda", "sda"),
            ))
            .await
            .unwrap();
        drop(sender);

        assert!(matches!(
            registry.run(CancellationToken::new()).await,
            Err(ProviderError::EventStreamClosed)
        ));

        assert!(!registry.contains("/sys/devices/run/sda"));
        assert!(registry.contains("/sys/devices/run/sdb"));
        assert_coupled(&registry);
    }

    #[tokio::test]
    async fn run_returns_on_cancel_and_can_resume() {
        let (mut registry, sender) = registry_with(Vec::new());
        registry.initialize().await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        registry.run(cancel).await.unwrap();

        sender
            .send(DeviceEvent::new(
                UeventAction::Add,
                block("/sys/devices/resume/sda", "sda"),
            ))
            .await
            .unwrap();
        drop(sender);
        assert!(matches!(
            registry.run(CancellationToken::new()).await,
            Err(ProviderError::EventStreamClosed)
        ));

        assert!(registry.contains("/sys/devices/resume/sda"));
    }

    #[tokio::test]
    async fn run_requires_initialize() {
        let mut registry = registry();
        assert!(matches!(
            registry.run(CancellationToken::new()).await,
            Err(ProviderError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn shutdown_unexports_each_object_once() {
        let mut registry = registry();
        for name in ["sda", "sdb", "sdc"] {
            registry
                .handle_event(
                    UeventAction::Add,
                    &block(&format!("/sys/devices/shutdown/{name}"), name),
                )
                .await;
        }
        let publisher = registry.publisher().clone();
        publisher.take_calls();
        let mut expected: Vec<String> = registry
            .object_paths()
            .map(|(_, object_path)| object_path.to_string())
            .collect();

        registry.shutdown().await;

        let mut unexported: Vec<String> = publisher
            .take_calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Unexport(path) => Some(path),
                _ => None,
            })
            .collect();
        unexported.sort();
        expected.sort();
        assert_eq!(unexported, expected);
        assert!(publisher.exported().is_empty());
        for name in ["sda", "sdb", "sdc"] {
            assert_eq!(
                destroyed_instances(&format!("/sys/devices/shutdown/{name}")).len(),
                1
            );
        }
    }
}
