use crate::domain::types::{CommandType, DataType, DeviceParameter, ResponseCode};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Opaque handle of a connected peer (its 48-bit Bluetooth address).
///
/// Handles are created by the transport; the SDK only indexes by them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceHandle(u64);

impl DeviceHandle {
    pub const fn from_address(address: u64) -> Self {
        Self(address)
    }

    pub const fn address(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0.to_be_bytes();
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[2], b[3], b[4], b[5], b[6], b[7]
        )
    }
}

/// Physical button that produced a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonId {
    Touch0,
    Touch1,
    Touch2,
    Tactile0,
    Tactile1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonState {
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureKind {
    ScrollUp,
    ScrollDown,
    SwipeRight,
    SwipeLeft,
    SwipeDown,
    SwipeUp,
    ClockwiseRotation,
    CounterClockwiseRotation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SliderKind {
    SlideForward,
    SlideBackward,
}

/// Decoded payload of a single sensor event
#[derive(Debug, Clone, PartialEq)]
pub enum SensorData {
    Button {
        id: ButtonId,
        state: ButtonState,
    },
    PointerDelta {
        x: i16,
        y: i16,
    },
    PointerAbsolute {
        x: i16,
        y: i16,
    },
    Gesture(GestureKind),
    /// Position in raw device units, rotation in radians
    Pose6D {
        x: i16,
        y: i16,
        z: i16,
        roll: f32,
        pitch: f32,
        yaw: f32,
    },
    /// Acceleration in g, angular rate in rad/s
    Motion6D {
        accel: [f32; 3],
        gyro: [f32; 3],
    },
    Analog {
        joystick_x: i16,
        joystick_y: i16,
        trigger: i16,
    },
    /// Radians
    Euler {
        roll: f32,
        pitch: f32,
        yaw: f32,
    },
    Translation {
        x: i16,
        y: i16,
        z: i16,
    },
    /// g
    Accelerometer {
        x: f32,
        y: f32,
        z: f32,
    },
    /// rad/s
    Gyroscope {
        x: f32,
        y: f32,
        z: f32,
    },
    /// Raw magnetometer counts
    Compass {
        x: i16,
        y: i16,
        z: i16,
    },
    Slider(SliderKind),
}

impl SensorData {
    /// The stream this payload belongs to
    pub fn data_type(&self) -> DataType {
        match self {
            SensorData::Button { .. } => DataType::Button,
            SensorData::PointerDelta { .. } | SensorData::PointerAbsolute { .. } => {
                DataType::Pointer
            }
            SensorData::Gesture(_) => DataType::Gesture,
            SensorData::Pose6D { .. } => DataType::Pose6D,
            SensorData::Motion6D { .. } => DataType::Motion6D,
            SensorData::Analog { .. } => DataType::Analog,
            SensorData::Euler { .. } => DataType::EulerAngles,
            SensorData::Translation { .. } => DataType::Translations,
            SensorData::Accelerometer { .. } => DataType::RawAccelerometer,
            SensorData::Gyroscope { .. } => DataType::RawGyro,
            SensorData::Compass { .. } => DataType::RawCompass,
            SensorData::Slider(_) => DataType::Slider,
        }
    }
}

/// A decoded event delivered to a listener
#[derive(Debug, Clone, PartialEq)]
pub struct SensorEvent {
    pub device: DeviceHandle,
    /// Creation time (Unix milliseconds)
    pub timestamp: i64,
    pub data: SensorData,
}

impl SensorEvent {
    pub fn new(device: DeviceHandle, data: SensorData) -> Self {
        Self {
            device,
            timestamp: unix_millis(),
            data,
        }
    }

    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }
}

/// Response of the device to a get/set/range/identifier request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    pub device: DeviceHandle,
    pub command: CommandType,
    pub data_type: DataType,
    pub parameter: Option<DeviceParameter>,
    pub code: ResponseCode,
    pub values: Vec<i32>,
}

impl CommandResponse {
    /// The first value, which is the parameter value for get/set responses
    pub fn value(&self) -> Option<i32> {
        self.values.first().copied()
    }
}

/// Link state of a device as seen by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// A connection was requested but has not completed
    Discovered,
    Connected,
    Disconnected,
}

/// Why the device refused to start or stop a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionFailure {
    /// GATT status from the transport
    Gatt(i32),
    /// Response code of an enable/disable command
    Rejected(ResponseCode),
}

impl fmt::Display for SubscriptionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionFailure::Gatt(status) => write!(f, "GATT status {}", status),
            SubscriptionFailure::Rejected(code) => write!(f, "device responded {}", code),
        }
    }
}

/// Asynchronous status reported on the service's status channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    DeviceConnected(DeviceHandle),
    DeviceDisconnected {
        device: DeviceHandle,
        status: i32,
    },
    /// The link never reached the connected state
    ConnectFailed {
        device: DeviceHandle,
        status: i32,
    },
    SubscriptionEnabled {
        device: DeviceHandle,
        data_type: DataType,
    },
    /// The subscription was rolled back
    SubscriptionFailed {
        device: DeviceHandle,
        data_type: DataType,
        reason: SubscriptionFailure,
    },
    UnsubscribeFailed {
        device: DeviceHandle,
        data_type: DataType,
        reason: SubscriptionFailure,
    },
}

pub(crate) fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
