//! OpenSpatial GATT Protocol
//!
//! Characteristic identifiers, the characteristic <-> data type table, and the
//! command / response frames exchanged on the command characteristic.

use crate::domain::error::{DecodeError, Error};
use crate::domain::events::{CommandResponse, DeviceHandle};
use crate::domain::settings::BleSettings;
use crate::domain::types::{CommandType, DataType, DeviceParameter, ResponseCode};
use uuid::Uuid;

/// OpenSpatial BLE Service UUID
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x00000002_0000_1000_8000_a0e5e9000000);

/// Dedicated per-stream characteristics
pub const POSE6D_CHAR_UUID: Uuid = Uuid::from_u128(0x00000205_0000_1000_8000_a0e5e9000000);
pub const BUTTON_CHAR_UUID: Uuid = Uuid::from_u128(0x00000206_0000_1000_8000_a0e5e9000000);
pub const MOTION6D_CHAR_UUID: Uuid = Uuid::from_u128(0x00000207_0000_1000_8000_a0e5e9000000);
pub const POINTER_CHAR_UUID: Uuid = Uuid::from_u128(0x00000208_0000_1000_8000_a0e5e9000000);
pub const GESTURE_CHAR_UUID: Uuid = Uuid::from_u128(0x00000209_0000_1000_8000_a0e5e9000000);
pub const ANALOG_CHAR_UUID: Uuid = Uuid::from_u128(0x0000020a_0000_1000_8000_a0e5e9000000);

/// Generic data channel - records prefixed with a DataType tag
pub const DATA_CHAR_UUID: Uuid = Uuid::from_u128(0x0000020b_0000_1000_8000_a0e5e9000000);

/// Command characteristic - commands are written, responses notified
pub const COMMAND_CHAR_UUID: Uuid = Uuid::from_u128(0x0000020c_0000_1000_8000_a0e5e9000000);

/// What an inbound characteristic carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Dedicated characteristic of one stream
    Sensor(DataType),
    /// Generic data channel
    Data,
    /// Command responses
    Command,
}

/// How a stream is switched on and off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// CCCD write on the stream's own characteristic
    Descriptor(Uuid),
    /// Enable/Disable frame on the command characteristic
    Command,
}

/// Mapping between characteristic UUIDs and protocol channels
#[derive(Debug, Clone)]
pub struct CharacteristicTable {
    service: Uuid,
    sensors: Vec<(DataType, Uuid)>,
    data: Uuid,
    command: Uuid,
    prefer_data_channel: bool,
}

impl Default for CharacteristicTable {
    fn default() -> Self {
        Self {
            service: SERVICE_UUID,
            sensors: vec![
                (DataType::Pose6D, POSE6D_CHAR_UUID),
                (DataType::Button, BUTTON_CHAR_UUID),
                (DataType::Motion6D, MOTION6D_CHAR_UUID),
                (DataType::Pointer, POINTER_CHAR_UUID),
                (DataType::Gesture, GESTURE_CHAR_UUID),
                (DataType::Analog, ANALOG_CHAR_UUID),
            ],
            data: DATA_CHAR_UUID,
            command: COMMAND_CHAR_UUID,
            prefer_data_channel: false,
        }
    }
}

impl CharacteristicTable {
    /// Build the table from configured UUID strings
    pub fn from_settings(ble: &BleSettings, prefer_data_channel: bool) -> Result<Self, Error> {
        Ok(Self {
            service: parse_uuid("service", &ble.service_uuid)?,
            sensors: vec![
                (DataType::Pose6D, parse_uuid("pose6d", &ble.pose6d_char_uuid)?),
                (DataType::Button, parse_uuid("button", &ble.button_char_uuid)?),
                (DataType::Motion6D, parse_uuid("motion6d", &ble.motion6d_char_uuid)?),
                (DataType::Pointer, parse_uuid("pointer", &ble.pointer_char_uuid)?),
                (DataType::Gesture, parse_uuid("gesture", &ble.gesture_char_uuid)?),
                (DataType::Analog, parse_uuid("analog", &ble.analog_char_uuid)?),
            ],
            data: parse_uuid("data", &ble.data_char_uuid)?,
            command: parse_uuid("command", &ble.command_char_uuid)?,
            prefer_data_channel,
        })
    }

    /// GATT service a transport discovers before using the characteristics
    pub fn service(&self) -> Uuid {
        self.service
    }

    pub fn data_characteristic(&self) -> Uuid {
        self.data
    }

    pub fn command_characteristic(&self) -> Uuid {
        self.command
    }

    /// Classify an inbound characteristic; `None` for identifiers not in the table
    pub fn channel(&self, characteristic: &Uuid) -> Option<Channel> {
        if *characteristic == self.data {
            return Some(Channel::Data);
        }
        if *characteristic == self.command {
            return Some(Channel::Command);
        }
        self.sensors
            .iter()
            .find(|(_, uuid)| uuid == characteristic)
            .map(|(data_type, _)| Channel::Sensor(*data_type))
    }

    /// Dedicated characteristic of a stream, if it has one
    pub fn characteristic_for(&self, data_type: DataType) -> Option<Uuid> {
        self.sensors
            .iter()
            .find(|(t, _)| *t == data_type)
            .map(|(_, uuid)| *uuid)
    }

    /// How to enable `data_type`; `None` if it is not a stream
    pub fn route(&self, data_type: DataType) -> Option<Route> {
        if !data_type.is_stream() {
            return None;
        }
        match self.characteristic_for(data_type) {
            Some(uuid) if !self.prefer_data_channel => Some(Route::Descriptor(uuid)),
            _ => Some(Route::Command),
        }
    }
}

fn parse_uuid(name: &str, value: &str) -> Result<Uuid, Error> {
    Uuid::parse_str(value).map_err(|e| {
        Error::InvalidParameter(format!("{} UUID {:?}: {}", name, value, e))
    })
}

/// Outbound command
///
/// # Frame Structure
///
/// ```text
/// [0]     : CommandType tag
/// [1]     : DataType tag
/// [2]     : DeviceParameter tag   (Get / Set / GetRange only)
/// [3-6]   : Value (i32 little-endian, Set only)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    GetParameter {
        data_type: DataType,
        parameter: DeviceParameter,
    },
    SetParameter {
        data_type: DataType,
        parameter: DeviceParameter,
        value: i32,
    },
    GetParameterRange {
        data_type: DataType,
        parameter: DeviceParameter,
    },
    /// List the parameters a data type supports
    GetIdentifiers { data_type: DataType },
    Enable { data_type: DataType },
    Disable { data_type: DataType },
}

impl Command {
    pub fn command_type(&self) -> CommandType {
        match self {
            Self::GetParameter { .. } => CommandType::GetParameter,
            Self::SetParameter { .. } => CommandType::SetParameter,
            Self::GetParameterRange { .. } => CommandType::GetParameterRange,
            Self::GetIdentifiers { .. } => CommandType::GetIdentifiers,
            Self::Enable { .. } => CommandType::Enable,
            Self::Disable { .. } => CommandType::Disable,
        }
    }

    pub fn data_type(&self) -> DataType {
        match *self {
            Self::GetParameter { data_type, .. }
            | Self::SetParameter { data_type, .. }
            | Self::GetParameterRange { data_type, .. }
            | Self::GetIdentifiers { data_type }
            | Self::Enable { data_type }
            | Self::Disable { data_type } => data_type,
        }
    }

    pub fn parameter(&self) -> Option<DeviceParameter> {
        match *self {
            Self::GetParameter { parameter, .. }
            | Self::SetParameter { parameter, .. }
            | Self::GetParameterRange { parameter, .. } => Some(parameter),
            _ => None,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut frame = vec![self.command_type().tag(), self.data_type().tag()];
        if let Some(parameter) = self.parameter() {
            frame.push(parameter.tag());
        }
        if let Self::SetParameter { value, .. } = self {
            frame.extend_from_slice(&value.to_le_bytes());
        }
        frame
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let (command, data_type, parameter, rest) = decode_header(bytes)?;

        let expected_rest = if command == CommandType::SetParameter { 4 } else { 0 };
        if rest.len() != expected_rest {
            return Err(DecodeError::Length {
                data_type,
                expected: bytes.len() - rest.len() + expected_rest,
                actual: bytes.len(),
            });
        }

        let command = match (command, parameter) {
            (CommandType::GetParameter, Some(parameter)) => Self::GetParameter {
                data_type,
                parameter,
            },
            (CommandType::SetParameter, Some(parameter)) => Self::SetParameter {
                data_type,
                parameter,
                value: i32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]),
            },
            (CommandType::GetParameterRange, Some(parameter)) => Self::GetParameterRange {
                data_type,
                parameter,
            },
            (CommandType::GetIdentifiers, _) => Self::GetIdentifiers { data_type },
            (CommandType::Enable, _) => Self::Enable { data_type },
            (CommandType::Disable, _) => Self::Disable { data_type },
            // decode_header always yields a parameter for these
            (_, None) => return Err(DecodeError::Empty),
        };
        Ok(command)
    }
}

/// Response notified on the command characteristic
///
/// # Frame Structure
///
/// ```text
/// [0]     : CommandType tag
/// [1]     : DataType tag
/// [2]     : DeviceParameter tag   (Get / Set / GetRange only)
/// [n]     : ResponseCode tag
/// [n+1..] : Values (i32 little-endian each)
/// ```
///
/// Identifier responses carry the supported parameter tags as values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    pub command: CommandType,
    pub data_type: DataType,
    pub parameter: Option<DeviceParameter>,
    pub code: ResponseCode,
    pub values: Vec<i32>,
}

impl ResponseFrame {
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let (command, data_type, parameter, rest) = decode_header(bytes)?;

        let (&code_tag, values) = rest.split_first().ok_or(DecodeError::Length {
            data_type,
            expected: bytes.len() + 1,
            actual: bytes.len(),
        })?;
        let code = ResponseCode::from_tag(code_tag).ok_or(DecodeError::UnknownTag {
            kind: "response code",
            tag: code_tag,
        })?;

        let remainder = values.len() % 4;
        if remainder != 0 {
            return Err(DecodeError::Length {
                data_type,
                expected: bytes.len() + 4 - remainder,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            command,
            data_type,
            parameter,
            code,
            values: values
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut frame = vec![self.command.tag(), self.data_type.tag()];
        if let Some(parameter) = self.parameter {
            frame.push(parameter.tag());
        }
        frame.push(self.code.tag());
        for value in &self.values {
            frame.extend_from_slice(&value.to_le_bytes());
        }
        frame
    }

    pub fn into_response(self, device: DeviceHandle) -> CommandResponse {
        CommandResponse {
            device,
            command: self.command,
            data_type: self.data_type,
            parameter: self.parameter,
            code: self.code,
            values: self.values,
        }
    }
}

/// Parse `[command][data type]([parameter])`, returning the remaining bytes
fn decode_header(
    bytes: &[u8],
) -> Result<(CommandType, DataType, Option<DeviceParameter>, &[u8]), DecodeError> {
    let (&command_tag, rest) = bytes.split_first().ok_or(DecodeError::Empty)?;
    let command = CommandType::from_tag(command_tag).ok_or(DecodeError::UnknownTag {
        kind: "command",
        tag: command_tag,
    })?;

    let (&data_tag, rest) = rest.split_first().ok_or(DecodeError::Empty)?;
    let data_type = DataType::from_tag(data_tag).ok_or(DecodeError::UnknownTag {
        kind: "data type",
        tag: data_tag,
    })?;

    if !command.has_parameter() {
        return Ok((command, data_type, None, rest));
    }

    let (&parameter_tag, rest) = rest.split_first().ok_or(DecodeError::Length {
        data_type,
        expected: 3,
        actual: bytes.len(),
    })?;
    let parameter =
        DeviceParameter::from_tag(data_type, parameter_tag).ok_or(DecodeError::UnknownTag {
            kind: "parameter",
            tag: parameter_tag,
        })?;

    Ok((command, data_type, Some(parameter), rest))
}
