//! Error taxonomy of the SDK.
//!
//! Registration and argument errors are returned synchronously. Transport
//! round-trip failures for enable/disable/connect never surface here; they
//! arrive on the status channel as [`StatusEvent`](crate::domain::events::StatusEvent)s.

use crate::domain::events::DeviceHandle;
use crate::domain::types::{CommandType, DataType};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{data_type} already has a listener on {device}")]
    AlreadyRegistered {
        device: DeviceHandle,
        data_type: DataType,
    },

    #[error("no listener registered for {data_type} on {device}")]
    NotRegistered {
        device: DeviceHandle,
        data_type: DataType,
    },

    #[error("no Bluetooth stack available")]
    TransportUnavailable,

    #[error("Bluetooth radio is disabled")]
    TransportDisabled,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Never produced by the service itself, which drops malformed packets.
    /// Lets callers of [`codec::decode`](crate::infrastructure::bluetooth::codec::decode)
    /// and the frame parsers use `?` in functions returning [`Result`].
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("a {command} request for {data_type} on {device} is already awaiting its response")]
    RequestInFlight {
        device: DeviceHandle,
        command: CommandType,
        data_type: DataType,
    },

    #[error("{command} request for {data_type} on {device} was aborted before a response arrived")]
    RequestAborted {
        device: DeviceHandle,
        command: CommandType,
        data_type: DataType,
    },

    #[error("transport rejected the write (status {status})")]
    Transport { status: i32 },
}

/// A malformed inbound frame. Only the offending packet is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{data_type} payload is {actual} bytes, expected {expected}")]
    Length {
        data_type: DataType,
        expected: usize,
        actual: usize,
    },

    #[error("unmapped {kind} tag {tag:#04X}")]
    UnknownTag { kind: &'static str, tag: u8 },

    #[error("empty frame")]
    Empty,
}

pub type Result<T> = std::result::Result<T, Error>;
