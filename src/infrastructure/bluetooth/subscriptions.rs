//! Subscription Registry
//!
//! Tracks, per device and per data type, the one listener currently
//! subscribed and whether the device confirmed the stream is enabled.
//!
//! Locking: the outer map is only locked to find, create or remove a device's
//! slot table; every slot mutation takes that device's own mutex, so devices
//! never contend with each other. Listeners and transport requests are always
//! invoked after the guard is dropped, which lets a listener unregister itself
//! and lets a transport call back synchronously.
//!
//! Enable and disable writes are queued per stream in the order they were
//! issued. An asynchronous outcome settles the oldest outstanding write of its
//! kind and only takes effect if that write belongs to the live subscription,
//! so a late answer to an earlier subscription never touches a newer one.

use crate::domain::error::{Error, Result};
use crate::domain::events::{DeviceHandle, SensorEvent, StatusEvent, SubscriptionFailure};
use crate::domain::types::DataType;
use crate::infrastructure::bluetooth::protocol::{CharacteristicTable, Command, Route};
use crate::infrastructure::bluetooth::transport::{Submission, Transport};
use crate::infrastructure::bluetooth::{lock, read, write, StatusSender};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// Receives decoded events for one (device, data type) subscription
pub trait SensorListener: Send + Sync {
    fn on_event(&self, event: &SensorEvent);
}

impl<F> SensorListener for F
where
    F: Fn(&SensorEvent) + Send + Sync,
{
    fn on_event(&self, event: &SensorEvent) {
        self(event)
    }
}

/// Outcome reported for an enable or disable write
pub type WriteOutcome = std::result::Result<(), SubscriptionFailure>;

struct Subscription {
    /// Distinguishes this subscription from later ones for the same slot
    id: u64,
    listener: Arc<dyn SensorListener>,
    enabled: bool,
}

/// An enable or disable write still awaiting its outcome
struct Toggle {
    subscription: u64,
    enable: bool,
}

#[derive(Default)]
struct DeviceSlots {
    subscriptions: HashMap<DataType, Subscription>,
    /// Outstanding writes per stream, oldest first
    toggles: HashMap<DataType, VecDeque<Toggle>>,
    /// Set once the table is removed at disconnect
    retired: bool,
}

impl DeviceSlots {
    fn push_toggle(&mut self, data_type: DataType, subscription: u64, enable: bool) {
        self.toggles
            .entry(data_type)
            .or_default()
            .push_back(Toggle {
                subscription,
                enable,
            });
    }

    /// Remove the oldest outstanding write of the given kind that `write`
    /// selects, returning the subscription it was issued for
    fn take_toggle(&mut self, data_type: DataType, enable: bool, write: Write) -> Option<u64> {
        let queue = self.toggles.get_mut(&data_type)?;
        let index = queue
            .iter()
            .position(|t| t.enable == enable && write.selects(t.subscription))?;
        let toggle = queue.remove(index)?;
        if queue.is_empty() {
            self.toggles.remove(&data_type);
        }
        Some(toggle.subscription)
    }
}

/// Which outstanding write an outcome belongs to
#[derive(Debug, Clone, Copy)]
enum Write {
    /// Reported by an upcall: the oldest write of its kind
    Oldest,
    /// Answered by the transport call that issued it
    Issued(u64),
}

impl Write {
    fn selects(self, subscription: u64) -> bool {
        match self {
            Write::Oldest => true,
            Write::Issued(id) => id == subscription,
        }
    }
}

enum Settled {
    /// The write belonged to the live subscription
    Applied,
    /// The write belonged to an earlier subscription
    Stale,
    /// No such write was outstanding
    Unmatched,
}

pub struct SubscriptionRegistry {
    devices: RwLock<HashMap<DeviceHandle, Arc<Mutex<DeviceSlots>>>>,
    next_id: AtomicU64,
    transport: Arc<dyn Transport>,
    table: Arc<CharacteristicTable>,
    status: StatusSender,
}

impl SubscriptionRegistry {
    pub fn new(
        transport: Arc<dyn Transport>,
        table: Arc<CharacteristicTable>,
        status: StatusSender,
    ) -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            transport,
            table,
            status,
        }
    }

    /// Subscribe `listener` to `data_type` events from `device`.
    ///
    /// Fails synchronously only if the slot is taken or `data_type` is not a
    /// stream. If the transport refuses to enable the stream, the subscription
    /// is rolled back and a [`StatusEvent::SubscriptionFailed`] is sent.
    pub fn register(
        &self,
        device: DeviceHandle,
        data_type: DataType,
        listener: impl SensorListener + 'static,
    ) -> Result<()> {
        let route = self
            .table
            .route(data_type)
            .ok_or_else(|| Error::InvalidParameter(format!("{} is not a stream", data_type)))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let listener: Arc<dyn SensorListener> = Arc::new(listener);
        self.with_live_slots(device, |slots| {
            if slots.subscriptions.contains_key(&data_type) {
                return Err(Error::AlreadyRegistered { device, data_type });
            }
            slots.subscriptions.insert(
                data_type,
                Subscription {
                    id,
                    listener,
                    enabled: false,
                },
            );
            // Queued before the write so a synchronous upcall finds it
            slots.push_toggle(data_type, id, true);
            Ok(())
        })?;
        info!("Registered {} listener on {}", data_type, device);

        match self.request_stream(device, data_type, route, true) {
            Submission::Confirmed => {
                self.settle_enable(device, data_type, Write::Issued(id), Ok(()));
            }
            Submission::Pending => {
                debug!("Waiting for {} to confirm {}", device, data_type);
            }
            Submission::Rejected(status) => {
                self.settle_enable(
                    device,
                    data_type,
                    Write::Issued(id),
                    Err(SubscriptionFailure::Gatt(status)),
                );
            }
        }
        Ok(())
    }

    /// Remove the subscription and ask the device to stop the stream
    pub fn unregister(&self, device: DeviceHandle, data_type: DataType) -> Result<()> {
        let removed = self.slots(device).and_then(|slots| {
            let mut slots = lock(&slots);
            let subscription = slots.subscriptions.remove(&data_type)?;
            slots.push_toggle(data_type, subscription.id, false);
            Some(subscription)
        });
        let Some(subscription) = removed else {
            return Err(Error::NotRegistered { device, data_type });
        };

        info!("Unregistered {} listener on {}", data_type, device);
        self.disable(device, data_type, subscription.id);
        Ok(())
    }

    /// Apply an asynchronous enable outcome to the oldest outstanding enable
    pub fn confirm_enabled(&self, device: DeviceHandle, data_type: DataType, outcome: WriteOutcome) {
        self.settle_enable(device, data_type, Write::Oldest, outcome);
    }

    /// Apply an asynchronous disable outcome to the oldest outstanding disable
    pub fn confirm_disabled(
        &self,
        device: DeviceHandle,
        data_type: DataType,
        outcome: WriteOutcome,
    ) {
        self.settle_disable(device, data_type, Write::Oldest, outcome);
    }

    /// Drop every subscription of a device whose link is gone.
    ///
    /// No disable requests are sent since the link no longer exists. The
    /// device's entry is removed, so outcomes of its earlier writes are ignored.
    pub fn cleanup_device(&self, device: DeviceHandle) -> usize {
        let removed = write(&self.devices).remove(&device);
        let Some(slots) = removed else {
            return 0;
        };
        let drained: Vec<(DataType, Subscription)> = {
            let mut slots = lock(&slots);
            slots.retired = true;
            slots.toggles.clear();
            slots.subscriptions.drain().collect()
        };

        for (data_type, subscription) in &drained {
            warn!(
                "{} listener on {} was still registered at disconnect (enabled: {}); dropping it",
                data_type, device, subscription.enabled
            );
        }
        drained.len()
    }

    /// Forcibly unregister every live subscription, e.g. at shutdown
    pub fn cleanup_all(&self) -> usize {
        let devices: Vec<(DeviceHandle, Arc<Mutex<DeviceSlots>>)> = read(&self.devices)
            .iter()
            .map(|(device, slots)| (*device, slots.clone()))
            .collect();

        let mut count = 0;
        for (device, slots) in devices {
            let drained: Vec<(DataType, Subscription)> = {
                let mut slots = lock(&slots);
                let drained: Vec<(DataType, Subscription)> =
                    slots.subscriptions.drain().collect();
                for (data_type, subscription) in &drained {
                    slots.push_toggle(*data_type, subscription.id, false);
                }
                drained
            };
            for (data_type, subscription) in drained {
                warn!("Leaked {} listener on {}; unregistering", data_type, device);
                self.disable(device, data_type, subscription.id);
                count += 1;
            }
        }
        count
    }

    /// Listener for (device, data type), cloned out of the lock
    pub fn listener_for(
        &self,
        device: DeviceHandle,
        data_type: DataType,
    ) -> Option<Arc<dyn SensorListener>> {
        let slots = self.slots(device)?;
        let slots = lock(&slots);
        slots
            .subscriptions
            .get(&data_type)
            .map(|s| s.listener.clone())
    }

    pub fn is_registered(&self, device: DeviceHandle, data_type: DataType) -> bool {
        self.slots(device)
            .is_some_and(|slots| lock(&slots).subscriptions.contains_key(&data_type))
    }

    pub fn is_enabled(&self, device: DeviceHandle, data_type: DataType) -> bool {
        self.slots(device).is_some_and(|slots| {
            lock(&slots)
                .subscriptions
                .get(&data_type)
                .is_some_and(|s| s.enabled)
        })
    }

    fn slots(&self, device: DeviceHandle) -> Option<Arc<Mutex<DeviceSlots>>> {
        read(&self.devices).get(&device).cloned()
    }

    fn slots_or_insert(&self, device: DeviceHandle) -> Arc<Mutex<DeviceSlots>> {
        if let Some(slots) = self.slots(device) {
            return slots;
        }
        write(&self.devices).entry(device).or_default().clone()
    }

    /// Run `f` on the device's current slot table, creating it if needed
    fn with_live_slots<R>(&self, device: DeviceHandle, f: impl FnOnce(&mut DeviceSlots) -> R) -> R {
        loop {
            let slots = self.slots_or_insert(device);
            let mut slots = lock(&slots);
            // Retired tables are already out of the map; the next lookup
            // creates a fresh one
            if !slots.retired {
                return f(&mut slots);
            }
        }
    }

    fn request_stream(
        &self,
        device: DeviceHandle,
        data_type: DataType,
        route: Route,
        enable: bool,
    ) -> Submission {
        match route {
            Route::Descriptor(characteristic) => {
                self.transport
                    .write_notification_descriptor(device, characteristic, enable)
            }
            Route::Command => {
                let command = if enable {
                    Command::Enable { data_type }
                } else {
                    Command::Disable { data_type }
                };
                self.transport.write_characteristic(
                    device,
                    self.table.command_characteristic(),
                    &command.encode(),
                )
            }
        }
    }

    fn disable(&self, device: DeviceHandle, data_type: DataType, id: u64) {
        let Some(route) = self.table.route(data_type) else {
            return;
        };
        match self.request_stream(device, data_type, route, false) {
            Submission::Confirmed => {
                self.settle_disable(device, data_type, Write::Issued(id), Ok(()));
            }
            Submission::Pending => {}
            Submission::Rejected(status) => {
                self.settle_disable(
                    device,
                    data_type,
                    Write::Issued(id),
                    Err(SubscriptionFailure::Gatt(status)),
                );
            }
        }
    }

    fn settle_enable(
        &self,
        device: DeviceHandle,
        data_type: DataType,
        write: Write,
        outcome: WriteOutcome,
    ) {
        let mut rolled_back = None;
        let settled = match self.slots(device) {
            None => Settled::Unmatched,
            Some(slots) => {
                let mut slots = lock(&slots);
                match slots.take_toggle(data_type, true, write) {
                    None => Settled::Unmatched,
                    Some(id) => {
                        let awaiting = slots
                            .subscriptions
                            .get(&data_type)
                            .is_some_and(|s| s.id == id && !s.enabled);
                        if !awaiting {
                            Settled::Stale
                        } else if outcome.is_ok() {
                            if let Some(subscription) = slots.subscriptions.get_mut(&data_type) {
                                subscription.enabled = true;
                            }
                            Settled::Applied
                        } else {
                            rolled_back = slots.subscriptions.remove(&data_type);
                            Settled::Applied
                        }
                    }
                }
            }
        };
        // The listener of a rolled back subscription is released here, unlocked
        drop(rolled_back);

        match (settled, outcome) {
            (Settled::Applied, Ok(())) => {
                info!("{} enabled on {}", data_type, device);
                let _ = self
                    .status
                    .send(StatusEvent::SubscriptionEnabled { device, data_type });
            }
            (Settled::Applied, Err(reason)) => {
                warn!(
                    "Could not enable {} on {} ({}); subscription rolled back",
                    data_type, device, reason
                );
                let _ = self.status.send(StatusEvent::SubscriptionFailed {
                    device,
                    data_type,
                    reason,
                });
            }
            (Settled::Stale, _) => {
                debug!(
                    "Enable outcome for an earlier {} subscription on {} ignored",
                    data_type, device
                );
            }
            (Settled::Unmatched, _) => {
                debug!(
                    "Enable outcome for {} on {} matches no outstanding write",
                    data_type, device
                );
            }
        }
    }

    fn settle_disable(
        &self,
        device: DeviceHandle,
        data_type: DataType,
        write: Write,
        outcome: WriteOutcome,
    ) {
        let matched = self.slots(device).is_some_and(|slots| {
            lock(&slots)
                .take_toggle(data_type, false, write)
                .is_some()
        });

        match (matched, outcome) {
            (true, Ok(())) => debug!("{} disabled on {}", data_type, device),
            (true, Err(reason)) => {
                warn!(
                    "Could not disable {} on {} ({})",
                    data_type, device, reason
                );
                let _ = self.status.send(StatusEvent::UnsubscribeFailed {
                    device,
                    data_type,
                    reason,
                });
            }
            (false, _) => {
                debug!(
                    "Disable outcome for {} on {} matches no outstanding write",
                    data_type, device
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::{ButtonId, ButtonState, SensorData};
    use crate::domain::types::ResponseCode;
    use crate::infrastructure::bluetooth::protocol::{BUTTON_CHAR_UUID, COMMAND_CHAR_UUID};
    use crate::infrastructure::bluetooth::transport::testing::{RecordingTransport, Request};
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc;

    const DEVICE: DeviceHandle = DeviceHandle::from_address(0xA0E5_E900_0001);

    fn setup(
        outcome: Submission,
    ) -> (
        Arc<SubscriptionRegistry>,
        Arc<RecordingTransport>,
        mpsc::UnboundedReceiver<StatusEvent>,
    ) {
        let transport = Arc::new(RecordingTransport::new(outcome));
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = Arc::new(SubscriptionRegistry::new(
            transport.clone(),
            Arc::new(CharacteristicTable::default()),
            tx,
        ));
        (registry, transport, rx)
    }

    fn noop(_: &SensorEvent) {}

    #[test]
    fn test_second_register_is_rejected() {
        let (registry, transport, _rx) = setup(Submission::Pending);

        registry.register(DEVICE, DataType::Button, noop).unwrap();
        let err = registry.register(DEVICE, DataType::Button, noop).unwrap_err();
        assert!(matches!(
            err,
            Error::AlreadyRegistered {
                data_type: DataType::Button,
                ..
            }
        ));

        // Only the first registration reached the transport
        assert_eq!(
            transport.take_requests(),
            vec![Request::Descriptor {
                device: DEVICE,
                characteristic: BUTTON_CHAR_UUID,
                enable: true
            }]
        );
    }

    #[test]
    fn test_second_unregister_is_rejected() {
        let (registry, transport, _rx) = setup(Submission::Pending);

        registry.register(DEVICE, DataType::Button, noop).unwrap();
        registry.unregister(DEVICE, DataType::Button).unwrap();
        assert!(matches!(
            registry.unregister(DEVICE, DataType::Button),
            Err(Error::NotRegistered { .. })
        ));

        let requests = transport.take_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1],
            Request::Descriptor {
                device: DEVICE,
                characteristic: BUTTON_CHAR_UUID,
                enable: false
            }
        );
    }

    #[test]
    fn test_non_stream_type_is_invalid() {
        let (registry, _transport, _rx) = setup(Submission::Pending);
        assert!(matches!(
            registry.register(DEVICE, DataType::GeneralDeviceInformation, noop),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_synchronous_confirmation_enables() {
        let (registry, _transport, mut rx) = setup(Submission::Confirmed);

        registry.register(DEVICE, DataType::Pose6D, noop).unwrap();
        assert!(registry.is_enabled(DEVICE, DataType::Pose6D));
        assert_eq!(
            rx.try_recv().unwrap(),
            StatusEvent::SubscriptionEnabled {
                device: DEVICE,
                data_type: DataType::Pose6D
            }
        );
    }

    #[test]
    fn test_rejected_enable_rolls_back() {
        let (registry, transport, mut rx) = setup(Submission::Rejected(133));

        // Still accepted at the call site
        registry.register(DEVICE, DataType::Pointer, noop).unwrap();
        assert!(!registry.is_registered(DEVICE, DataType::Pointer));
        assert_eq!(
            rx.try_recv().unwrap(),
            StatusEvent::SubscriptionFailed {
                device: DEVICE,
                data_type: DataType::Pointer,
                reason: SubscriptionFailure::Gatt(133)
            }
        );

        transport.set_outcome(Submission::Pending);
        registry.register(DEVICE, DataType::Pointer, noop).unwrap();
        assert!(registry.is_registered(DEVICE, DataType::Pointer));
    }

    #[test]
    fn test_async_confirmation() {
        let (registry, _transport, mut rx) = setup(Submission::Pending);

        registry.register(DEVICE, DataType::Gesture, noop).unwrap();
        assert!(!registry.is_enabled(DEVICE, DataType::Gesture));

        registry.confirm_enabled(DEVICE, DataType::Gesture, Ok(()));
        assert!(registry.is_enabled(DEVICE, DataType::Gesture));
        assert!(matches!(
            rx.try_recv(),
            Ok(StatusEvent::SubscriptionEnabled { .. })
        ));

        // A late failure no longer applies to the enabled subscription
        registry.confirm_enabled(DEVICE, DataType::Gesture, Err(SubscriptionFailure::Gatt(5)));
        assert!(registry.is_registered(DEVICE, DataType::Gesture));
    }

    #[test]
    fn test_async_rejection_rolls_back() {
        let (registry, _transport, mut rx) = setup(Submission::Pending);

        registry.register(DEVICE, DataType::Slider, noop).unwrap();
        registry.confirm_enabled(
            DEVICE,
            DataType::Slider,
            Err(SubscriptionFailure::Rejected(ResponseCode::Unsupported)),
        );
        assert!(!registry.is_registered(DEVICE, DataType::Slider));
        assert!(matches!(
            rx.try_recv(),
            Ok(StatusEvent::SubscriptionFailed {
                reason: SubscriptionFailure::Rejected(ResponseCode::Unsupported),
                ..
            })
        ));
    }

    #[test]
    fn test_data_channel_type_uses_command_frames() {
        let (registry, transport, _rx) = setup(Submission::Pending);

        registry.register(DEVICE, DataType::Slider, noop).unwrap();
        registry.unregister(DEVICE, DataType::Slider).unwrap();

        assert_eq!(
            transport.take_requests(),
            vec![
                Request::Write {
                    device: DEVICE,
                    characteristic: COMMAND_CHAR_UUID,
                    value: vec![0x05, 0x12]
                },
                Request::Write {
                    device: DEVICE,
                    characteristic: COMMAND_CHAR_UUID,
                    value: vec![0x06, 0x12]
                },
            ]
        );
    }

    #[test]
    fn test_cleanup_device_sends_nothing() {
        let (registry, transport, _rx) = setup(Submission::Confirmed);
        let other = DeviceHandle::from_address(0xA0E5_E900_0002);

        registry.register(DEVICE, DataType::Pointer, noop).unwrap();
        registry.register(DEVICE, DataType::Motion6D, noop).unwrap();
        registry.register(other, DataType::Pointer, noop).unwrap();
        transport.take_requests();

        assert_eq!(registry.cleanup_device(DEVICE), 2);
        assert!(transport.take_requests().is_empty());
        assert!(!registry.is_registered(DEVICE, DataType::Pointer));
        assert!(registry.is_registered(other, DataType::Pointer));

        registry.register(DEVICE, DataType::Pointer, noop).unwrap();
        assert!(registry.is_registered(DEVICE, DataType::Pointer));
    }

    #[test]
    fn test_cleanup_all_disables_everything() {
        let (registry, transport, _rx) = setup(Submission::Confirmed);
        let other = DeviceHandle::from_address(0xA0E5_E900_0002);

        registry.register(DEVICE, DataType::Button, noop).unwrap();
        registry.register(other, DataType::RawGyro, noop).unwrap();
        transport.take_requests();

        assert_eq!(registry.cleanup_all(), 2);
        let requests = transport.take_requests();
        assert_eq!(requests.len(), 2);
        assert!(requests.contains(&Request::Descriptor {
            device: DEVICE,
            characteristic: BUTTON_CHAR_UUID,
            enable: false
        }));
        assert!(requests.contains(&Request::Write {
            device: other,
            characteristic: COMMAND_CHAR_UUID,
            value: vec![0x06, 0x02]
        }));
        assert!(!registry.is_registered(other, DataType::RawGyro));
    }

    #[test]
    fn test_listener_can_unregister_itself() {
        let (registry, _transport, _rx) = setup(Submission::Confirmed);
        let calls = Arc::new(AtomicUsize::new(0));

        let inner = registry.clone();
        let counter = calls.clone();
        registry
            .register(DEVICE, DataType::Button, move |event: &SensorEvent| {
                counter.fetch_add(1, Ordering::SeqCst);
                inner.unregister(event.device, DataType::Button).unwrap();
            })
            .unwrap();

        let listener = registry.listener_for(DEVICE, DataType::Button).unwrap();
        listener.on_event(&SensorEvent::new(
            DEVICE,
            SensorData::Button {
                id: ButtonId::Touch0,
                state: ButtonState::Down,
            },
        ));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!registry.is_registered(DEVICE, DataType::Button));
        assert!(registry.listener_for(DEVICE, DataType::Button).is_none());
    }

    #[test]
    fn test_rejected_disable_is_reported() {
        let (registry, transport, mut rx) = setup(Submission::Confirmed);

        registry.register(DEVICE, DataType::Analog, noop).unwrap();
        let _ = rx.try_recv();
        transport.set_outcome(Submission::Rejected(8));
        registry.unregister(DEVICE, DataType::Analog).unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            StatusEvent::UnsubscribeFailed {
                device: DEVICE,
                data_type: DataType::Analog,
                reason: SubscriptionFailure::Gatt(8)
            }
        );
    }

    #[test]
    fn test_late_confirmation_does_not_touch_newer_subscription() {
        let (registry, _transport, mut rx) = setup(Submission::Pending);

        registry.register(DEVICE, DataType::Button, noop).unwrap();
        registry.unregister(DEVICE, DataType::Button).unwrap();
        registry.register(DEVICE, DataType::Button, noop).unwrap();

        // Answer to the first enable write
        registry.confirm_enabled(DEVICE, DataType::Button, Ok(()));
        assert!(registry.is_registered(DEVICE, DataType::Button));
        assert!(!registry.is_enabled(DEVICE, DataType::Button));
        assert!(rx.try_recv().is_err());

        // Answer to the second one
        registry.confirm_enabled(DEVICE, DataType::Button, Err(SubscriptionFailure::Gatt(133)));
        assert!(!registry.is_registered(DEVICE, DataType::Button));
        assert_eq!(
            rx.try_recv().unwrap(),
            StatusEvent::SubscriptionFailed {
                device: DEVICE,
                data_type: DataType::Button,
                reason: SubscriptionFailure::Gatt(133)
            }
        );
    }

    #[test]
    fn test_outcomes_settle_writes_in_order() {
        let (registry, _transport, mut rx) = setup(Submission::Pending);

        registry.register(DEVICE, DataType::Gesture, noop).unwrap();
        registry.unregister(DEVICE, DataType::Gesture).unwrap();
        registry.register(DEVICE, DataType::Gesture, noop).unwrap();

        registry.confirm_enabled(DEVICE, DataType::Gesture, Err(SubscriptionFailure::Gatt(5)));
        registry.confirm_disabled(DEVICE, DataType::Gesture, Ok(()));
        registry.confirm_enabled(DEVICE, DataType::Gesture, Ok(()));

        // Only the second subscription's own answer applied
        assert!(registry.is_enabled(DEVICE, DataType::Gesture));
        assert_eq!(
            rx.try_recv().unwrap(),
            StatusEvent::SubscriptionEnabled {
                device: DEVICE,
                data_type: DataType::Gesture
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_async_disable_failure_is_reported() {
        let (registry, _transport, mut rx) = setup(Submission::Pending);

        registry.register(DEVICE, DataType::Slider, noop).unwrap();
        registry.unregister(DEVICE, DataType::Slider).unwrap();
        registry.confirm_disabled(
            DEVICE,
            DataType::Slider,
            Err(SubscriptionFailure::Rejected(ResponseCode::Failed)),
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            StatusEvent::UnsubscribeFailed {
                device: DEVICE,
                data_type: DataType::Slider,
                reason: SubscriptionFailure::Rejected(ResponseCode::Failed)
            }
        );

        // Nothing left outstanding
        registry.confirm_disabled(DEVICE, DataType::Slider, Err(SubscriptionFailure::Gatt(1)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_cleanup_device_forgets_device() {
        let (registry, _transport, mut rx) = setup(Submission::Pending);

        registry.register(DEVICE, DataType::Pose6D, noop).unwrap();
        assert_eq!(registry.cleanup_device(DEVICE), 1);
        assert!(!read(&registry.devices).contains_key(&DEVICE));
        assert_eq!(registry.cleanup_device(DEVICE), 0);

        // The enable write died with the link
        registry.confirm_enabled(DEVICE, DataType::Pose6D, Ok(()));
        assert!(rx.try_recv().is_err());
        assert!(!read(&registry.devices).contains_key(&DEVICE));
    }
}
