//! Event Dispatcher
//!
//! Entry point for every transport upcall. Notifications are routed by
//! characteristic to the codec and the decoded events to the subscribed
//! listener; link state changes drive the per-device connection state
//! machine:
//!
//! ```text
//! Discovered ──connected──▶ Connected ──disconnected──▶ Disconnected
//!     │                                                      ▲
//!     └──────────── failed / disconnected (ConnectFailed) ───┘
//! ```
//!
//! Nothing here returns an error to the transport: malformed packets are
//! logged and dropped without affecting other devices or subscriptions.

use crate::domain::events::{
    ConnectionState, DeviceHandle, SensorData, SensorEvent, StatusEvent, SubscriptionFailure,
};
use crate::domain::types::CommandType;
use crate::infrastructure::bluetooth::codec;
use crate::infrastructure::bluetooth::protocol::{Channel, CharacteristicTable, ResponseFrame};
use crate::infrastructure::bluetooth::requests::PendingRequests;
use crate::infrastructure::bluetooth::service::ServiceConfig;
use crate::infrastructure::bluetooth::subscriptions::SubscriptionRegistry;
use crate::infrastructure::bluetooth::transport::{LinkState, Submission, Transport, GATT_SUCCESS};
use crate::infrastructure::bluetooth::{lock, StatusSender};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

enum Transition {
    Connected,
    Disconnected,
    ConnectFailed,
    Ignored,
}

pub struct EventDispatcher {
    registry: Arc<SubscriptionRegistry>,
    requests: Arc<PendingRequests>,
    table: Arc<CharacteristicTable>,
    transport: Arc<dyn Transport>,
    links: Mutex<HashMap<DeviceHandle, ConnectionState>>,
    status: StatusSender,
    enable_channels_on_connect: bool,
    log_raw_packets: bool,
}

impl EventDispatcher {
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        requests: Arc<PendingRequests>,
        transport: Arc<dyn Transport>,
        status: StatusSender,
        config: &ServiceConfig,
    ) -> Self {
        Self {
            registry,
            requests,
            table: Arc::new(config.table.clone()),
            transport,
            links: Mutex::new(HashMap::new()),
            status,
            enable_channels_on_connect: config.enable_channels_on_connect,
            log_raw_packets: config.log_raw_packets,
        }
    }

    /// Handle a characteristic notification. Returns how many events reached
    /// a listener.
    pub fn on_characteristic_changed(
        &self,
        device: DeviceHandle,
        characteristic: Uuid,
        bytes: &[u8],
    ) -> usize {
        if self.log_raw_packets {
            debug!("{} {}: {:02X?}", device, characteristic, bytes);
        } else {
            trace!("{} {}: {} bytes", device, characteristic, bytes.len());
        }

        match self.table.channel(&characteristic) {
            Some(Channel::Sensor(data_type)) => match codec::decode(data_type, bytes) {
                Ok(events) => self.deliver(device, events),
                Err(e) => {
                    warn!("Dropping malformed {} packet from {}: {}", data_type, device, e);
                    0
                }
            },
            Some(Channel::Data) => {
                let frame = codec::decode_data_channel(bytes);
                if let Some(e) = &frame.error {
                    warn!("Dropping malformed data record from {}: {}", device, e);
                }
                self.deliver(device, frame.events)
            }
            Some(Channel::Command) => {
                self.on_command_response(device, bytes);
                0
            }
            None => {
                debug!(
                    "Dropping notification from unmapped characteristic {} on {}",
                    characteristic, device
                );
                0
            }
        }
    }

    /// Handle completion of a CCCD write
    pub fn on_descriptor_written(
        &self,
        device: DeviceHandle,
        characteristic: Uuid,
        enabled: bool,
        status: i32,
    ) {
        match self.table.channel(&characteristic) {
            Some(Channel::Sensor(data_type)) => {
                let outcome = if status == GATT_SUCCESS {
                    Ok(())
                } else {
                    Err(SubscriptionFailure::Gatt(status))
                };
                if enabled {
                    self.registry.confirm_enabled(device, data_type, outcome);
                } else {
                    self.registry.confirm_disabled(device, data_type, outcome);
                }
            }
            Some(channel) => {
                if status == GATT_SUCCESS {
                    debug!("{:?} channel notifications set to {} on {}", channel, enabled, device);
                } else {
                    warn!(
                        "Could not set {:?} channel notifications on {} (status {})",
                        channel, device, status
                    );
                }
            }
            None => {
                debug!(
                    "Descriptor write on unmapped characteristic {} of {}",
                    characteristic, device
                );
            }
        }
    }

    /// Record that a connection attempt to `device` has started
    pub fn connection_requested(&self, device: DeviceHandle) {
        let mut links = lock(&self.links);
        if links.get(&device) == Some(&ConnectionState::Connected) {
            debug!("{} is already connected", device);
            return;
        }
        links.insert(device, ConnectionState::Discovered);
    }

    /// Devices without a live or pending link are `Disconnected`
    pub fn connection_state(&self, device: DeviceHandle) -> ConnectionState {
        lock(&self.links)
            .get(&device)
            .copied()
            .unwrap_or(ConnectionState::Disconnected)
    }

    /// Handle a link state change reported by the transport
    pub fn on_connection_state_changed(&self, device: DeviceHandle, state: LinkState, status: i32) {
        let transition = {
            let mut links = lock(&self.links);
            let previous = links.get(&device).copied();
            // Only Discovered and Connected devices are kept
            let transition = match (state, previous) {
                (LinkState::Connected, Some(ConnectionState::Connected)) => Transition::Ignored,
                (LinkState::Connected, _) if status == GATT_SUCCESS => Transition::Connected,
                (LinkState::Connected, _) => Transition::ConnectFailed,
                (LinkState::Disconnected, Some(ConnectionState::Connected)) => {
                    Transition::Disconnected
                }
                (LinkState::Disconnected, Some(ConnectionState::Discovered)) => {
                    Transition::ConnectFailed
                }
                (LinkState::Disconnected, _) => Transition::Ignored,
            };

            match transition {
                Transition::Connected => {
                    links.insert(device, ConnectionState::Connected);
                }
                Transition::Disconnected | Transition::ConnectFailed => {
                    links.remove(&device);
                }
                Transition::Ignored => {}
            }
            transition
        };

        match transition {
            Transition::Connected => self.device_connected(device),
            Transition::Disconnected => self.device_disconnected(device, status),
            Transition::ConnectFailed => {
                warn!("Connection to {} failed (status {})", device, status);
                let _ = self
                    .status
                    .send(StatusEvent::ConnectFailed { device, status });
            }
            Transition::Ignored => {
                debug!(
                    "Ignoring {:?} (status {}) for {} ({:?})",
                    state,
                    status,
                    device,
                    self.connection_state(device)
                );
            }
        }
    }

    fn device_connected(&self, device: DeviceHandle) {
        info!("Device connected: {}", device);
        let _ = self.status.send(StatusEvent::DeviceConnected(device));

        if !self.enable_channels_on_connect {
            return;
        }
        for characteristic in [
            self.table.data_characteristic(),
            self.table.command_characteristic(),
        ] {
            if let Submission::Rejected(status) =
                self.transport
                    .write_notification_descriptor(device, characteristic, true)
            {
                warn!(
                    "Could not enable notifications on {} for {} (status {})",
                    characteristic, device, status
                );
            }
        }
    }

    fn device_disconnected(&self, device: DeviceHandle, status: i32) {
        let dropped = self.registry.cleanup_device(device);
        let aborted = self.requests.abort_device(device);
        info!(
            "Device disconnected: {} (status {}, {} subscriptions dropped, {} requests aborted)",
            device, status, dropped, aborted
        );
        let _ = self
            .status
            .send(StatusEvent::DeviceDisconnected { device, status });
    }

    fn deliver(&self, device: DeviceHandle, events: Vec<SensorData>) -> usize {
        let mut delivered = 0;
        for data in events {
            let data_type = data.data_type();
            match self.registry.listener_for(device, data_type) {
                Some(listener) => {
                    listener.on_event(&SensorEvent::new(device, data));
                    delivered += 1;
                }
                None => debug!("No {} listener on {}; dropping event", data_type, device),
            }
        }
        delivered
    }

    fn on_command_response(&self, device: DeviceHandle, bytes: &[u8]) {
        let frame = match ResponseFrame::decode(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping malformed command response from {}: {}", device, e);
                return;
            }
        };

        let outcome = if frame.code.is_success() {
            Ok(())
        } else {
            Err(SubscriptionFailure::Rejected(frame.code))
        };
        match frame.command {
            CommandType::Enable => {
                self.registry
                    .confirm_enabled(device, frame.data_type, outcome);
            }
            CommandType::Disable => {
                self.registry
                    .confirm_disabled(device, frame.data_type, outcome);
            }
            _ => {
                self.requests.complete(frame.into_response(device));
            }
        }
    }
}
