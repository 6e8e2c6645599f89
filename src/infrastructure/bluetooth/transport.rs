//! BLE Transport Contract
//!
//! The SDK does not own the Bluetooth stack. A platform adapter implements
//! [`Transport`] for the outbound requests and forwards its callbacks to the
//! [`EventDispatcher`](super::dispatcher::EventDispatcher):
//!
//! ```text
//! adapter callback                     dispatcher upcall
//! ----------------------------------   ------------------------------------
//! characteristic value changed     ->  on_characteristic_changed
//! connection state changed         ->  on_connection_state_changed
//! descriptor write completed       ->  on_descriptor_written
//! ```
//!
//! Every request is fire-and-request: the adapter answers with a
//! [`Submission`] and, when it returns [`Submission::Pending`], reports the
//! outcome later through an upcall (or never).

use crate::domain::events::DeviceHandle;
use uuid::Uuid;

/// GATT status for a successful operation
pub const GATT_SUCCESS: i32 = 0;

/// State of the host's Bluetooth stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Ready,
    /// No Bluetooth stack on this host
    Unavailable,
    /// Stack present but the radio is off
    Disabled,
}

/// Immediate answer of the adapter to a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Completed synchronously
    Confirmed,
    /// Accepted; the outcome arrives through an upcall
    Pending,
    /// Refused with a GATT status
    Rejected(i32),
}

/// Link state reported by the adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    Disconnected,
}

pub trait Transport: Send + Sync {
    fn availability(&self) -> Availability {
        Availability::Ready
    }

    /// Open a link and run service discovery
    fn connect(&self, device: DeviceHandle) -> Submission;

    /// Write the client characteristic configuration descriptor
    fn write_notification_descriptor(
        &self,
        device: DeviceHandle,
        characteristic: Uuid,
        enable: bool,
    ) -> Submission;

    fn write_characteristic(
        &self,
        device: DeviceHandle,
        characteristic: Uuid,
        value: &[u8],
    ) -> Submission;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Request {
        Connect(DeviceHandle),
        Descriptor {
            device: DeviceHandle,
            characteristic: Uuid,
            enable: bool,
        },
        Write {
            device: DeviceHandle,
            characteristic: Uuid,
            value: Vec<u8>,
        },
    }

    /// Records every request and answers with a configurable outcome
    pub struct RecordingTransport {
        availability: Availability,
        outcome: Mutex<Submission>,
        requests: Mutex<Vec<Request>>,
    }

    impl RecordingTransport {
        pub fn new(outcome: Submission) -> Self {
            Self::with_availability(Availability::Ready, outcome)
        }

        pub fn with_availability(availability: Availability, outcome: Submission) -> Self {
            Self {
                availability,
                outcome: Mutex::new(outcome),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn set_outcome(&self, outcome: Submission) {
            *self.outcome.lock().unwrap() = outcome;
        }

        pub fn take_requests(&self) -> Vec<Request> {
            std::mem::take(&mut *self.requests.lock().unwrap())
        }

        fn record(&self, request: Request) -> Submission {
            self.requests.lock().unwrap().push(request);
            *self.outcome.lock().unwrap()
        }
    }

    impl Transport for RecordingTransport {
        fn availability(&self) -> Availability {
            self.availability
        }

        fn connect(&self, device: DeviceHandle) -> Submission {
            self.record(Request::Connect(device))
        }

        fn write_notification_descriptor(
            &self,
            device: DeviceHandle,
            characteristic: Uuid,
            enable: bool,
        ) -> Submission {
            self.record(Request::Descriptor {
                device,
                characteristic,
                enable,
            })
        }

        fn write_characteristic(
            &self,
            device: DeviceHandle,
            characteristic: Uuid,
            value: &[u8],
        ) -> Submission {
            self.record(Request::Write {
                device,
                characteristic,
                value: value.to_vec(),
            })
        }
    }
}
