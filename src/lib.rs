//! OpenSpatial SDK core
//!
//! Decodes the OpenSpatial BLE protocol spoken by ring and controller
//! wearables and routes the decoded events to per-device listeners.
//!
//! The crate does not own a Bluetooth stack. A platform adapter implements
//! [`Transport`] for outbound requests and forwards its callbacks to the
//! [`EventDispatcher`] returned by [`OpenSpatialService::dispatcher`].
//!
//! ```no_run
//! use openspatial::{DataType, DeviceHandle, OpenSpatialService, SensorEvent, ServiceConfig};
//! use openspatial::infrastructure::replay::ReplayTransport;
//! use std::sync::Arc;
//!
//! let (service, _status) =
//!     OpenSpatialService::new(Arc::new(ReplayTransport), &ServiceConfig::default())?;
//! let ring = DeviceHandle::from_address(0xA0E5_E900_0001);
//! service.connect(ring)?;
//! service.register(ring, DataType::Button, |event: &SensorEvent| {
//!     println!("{:?}", event.data);
//! })?;
//! # Ok::<(), openspatial::Error>(())
//! ```

pub mod domain;
pub mod infrastructure;

pub use domain::error::{DecodeError, Error, Result};
pub use domain::events::{
    ButtonId, ButtonState, CommandResponse, ConnectionState, DeviceHandle, GestureKind,
    SensorData, SensorEvent, SliderKind, StatusEvent, SubscriptionFailure,
};
pub use domain::settings::{Settings, SettingsService};
pub use domain::types::{
    CommandType, DataType, DeviceParameter, GeneralParameter, ResponseCode, SensorParameter,
};
pub use infrastructure::bluetooth::dispatcher::EventDispatcher;
pub use infrastructure::bluetooth::subscriptions::SensorListener;
pub use infrastructure::bluetooth::transport::{Availability, LinkState, Submission, Transport};
pub use infrastructure::bluetooth::{OpenSpatialService, ServiceConfig};
