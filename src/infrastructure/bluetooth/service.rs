//! OpenSpatial Service Module
//!
//! Main service that coordinates subscriptions, device requests and the
//! transport upcalls for every connected OpenSpatial device.

use crate::domain::error::{Error, Result};
use crate::domain::events::{CommandResponse, DeviceHandle, StatusEvent};
use crate::domain::settings::Settings;
use crate::domain::types::{DataType, DeviceParameter};
use crate::infrastructure::bluetooth::{
    dispatcher::EventDispatcher,
    protocol::{CharacteristicTable, Command},
    requests::PendingRequests,
    subscriptions::{SensorListener, SubscriptionRegistry},
    transport::{Availability, LinkState, Submission, Transport, GATT_SUCCESS},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Runtime options of the service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub table: CharacteristicTable,
    pub enable_channels_on_connect: bool,
    /// Log every inbound payload at debug level
    pub log_raw_packets: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            table: CharacteristicTable::default(),
            enable_channels_on_connect: true,
            log_raw_packets: false,
        }
    }
}

impl ServiceConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            table: CharacteristicTable::from_settings(&settings.ble, settings.prefer_data_channel)?,
            enable_channels_on_connect: settings.enable_channels_on_connect,
            log_raw_packets: settings.debug_raw_data_logging,
        })
    }
}

/// Main service coordinating all OpenSpatial operations
pub struct OpenSpatialService {
    transport: Arc<dyn Transport>,
    command_characteristic: uuid::Uuid,
    registry: Arc<SubscriptionRegistry>,
    requests: Arc<PendingRequests>,
    dispatcher: Arc<EventDispatcher>,
}

impl OpenSpatialService {
    /// Create the service over `transport`.
    ///
    /// Returns the service and the receiving end of its status channel.
    pub fn new(
        transport: Arc<dyn Transport>,
        config: &ServiceConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<StatusEvent>)> {
        match transport.availability() {
            Availability::Ready => {}
            Availability::Unavailable => return Err(Error::TransportUnavailable),
            Availability::Disabled => return Err(Error::TransportDisabled),
        }

        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let table = Arc::new(config.table.clone());
        let registry = Arc::new(SubscriptionRegistry::new(
            transport.clone(),
            table.clone(),
            status_tx.clone(),
        ));
        let requests = Arc::new(PendingRequests::new());
        let dispatcher = Arc::new(EventDispatcher::new(
            registry.clone(),
            requests.clone(),
            transport.clone(),
            status_tx,
            config,
        ));

        info!("OpenSpatial service initialized");
        Ok((
            Self {
                transport,
                command_characteristic: table.command_characteristic(),
                registry,
                requests,
                dispatcher,
            },
            status_rx,
        ))
    }

    /// Receiver of the transport's upcalls
    pub fn dispatcher(&self) -> Arc<EventDispatcher> {
        self.dispatcher.clone()
    }

    /// Connect to a device.
    ///
    /// The outcome arrives on the status channel; an immediate refusal by the
    /// transport is also returned.
    pub fn connect(&self, device: DeviceHandle) -> Result<()> {
        self.dispatcher.connection_requested(device);

        match self.transport.connect(device) {
            Submission::Confirmed => {
                self.dispatcher
                    .on_connection_state_changed(device, LinkState::Connected, GATT_SUCCESS);
            }
            Submission::Pending => debug!("Connecting to {}", device),
            Submission::Rejected(status) => {
                self.dispatcher
                    .on_connection_state_changed(device, LinkState::Disconnected, status);
                return Err(Error::Transport { status });
            }
        }
        Ok(())
    }

    pub fn register(
        &self,
        device: DeviceHandle,
        data_type: DataType,
        listener: impl SensorListener + 'static,
    ) -> Result<()> {
        self.registry.register(device, data_type, listener)
    }

    pub fn unregister(&self, device: DeviceHandle, data_type: DataType) -> Result<()> {
        self.registry.unregister(device, data_type)
    }

    pub fn is_enabled(&self, device: DeviceHandle, data_type: DataType) -> bool {
        self.registry.is_enabled(device, data_type)
    }

    pub async fn get_parameter(
        &self,
        device: DeviceHandle,
        data_type: DataType,
        parameter: DeviceParameter,
    ) -> Result<CommandResponse> {
        check_parameter(data_type, parameter)?;
        self.request(
            device,
            Command::GetParameter {
                data_type,
                parameter,
            },
        )
        .await
    }

    /// Set a parameter. A [`ParameterValueReplaced`] code carries the value
    /// the device applied instead.
    ///
    /// [`ParameterValueReplaced`]: crate::domain::types::ResponseCode::ParameterValueReplaced
    pub async fn set_parameter(
        &self,
        device: DeviceHandle,
        data_type: DataType,
        parameter: DeviceParameter,
        value: i32,
    ) -> Result<CommandResponse> {
        check_parameter(data_type, parameter)?;
        self.request(
            device,
            Command::SetParameter {
                data_type,
                parameter,
                value,
            },
        )
        .await
    }

    /// Query the valid range of a parameter; the response values are `[min, max]`
    pub async fn get_parameter_range(
        &self,
        device: DeviceHandle,
        data_type: DataType,
        parameter: DeviceParameter,
    ) -> Result<CommandResponse> {
        check_parameter(data_type, parameter)?;
        self.request(
            device,
            Command::GetParameterRange {
                data_type,
                parameter,
            },
        )
        .await
    }

    /// Query which parameter tags `data_type` supports
    pub async fn get_parameter_identifiers(
        &self,
        device: DeviceHandle,
        data_type: DataType,
    ) -> Result<CommandResponse> {
        self.request(device, Command::GetIdentifiers { data_type })
            .await
    }

    /// Unregister every remaining listener
    pub fn shutdown(&self) -> usize {
        let leaked = self.registry.cleanup_all();
        info!("OpenSpatial service shut down ({} listeners released)", leaked);
        leaked
    }

    async fn request(&self, device: DeviceHandle, command: Command) -> Result<CommandResponse> {
        let response = self.requests.begin(device, &command)?;

        let submission =
            self.transport
                .write_characteristic(device, self.command_characteristic, &command.encode());
        if let Submission::Rejected(status) = submission {
            self.requests.cancel(device, &command);
            warn!(
                "Transport rejected {} for {} on {} (status {})",
                command.command_type(),
                command.data_type(),
                device,
                status
            );
            return Err(Error::Transport { status });
        }

        debug!(
            "Sent {} for {} to {}",
            command.command_type(),
            command.data_type(),
            device
        );
        response.await.map_err(|_| Error::RequestAborted {
            device,
            command: command.command_type(),
            data_type: command.data_type(),
        })
    }
}

fn check_parameter(data_type: DataType, parameter: DeviceParameter) -> Result<()> {
    if parameter.applies_to(data_type) {
        Ok(())
    } else {
        Err(Error::InvalidParameter(format!(
            "{} does not apply to {}",
            parameter, data_type
        )))
    }
}
