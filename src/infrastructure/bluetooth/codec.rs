//! Sensor Payload Codec
//!
//! Pure functions turning a characteristic payload into zero, one or many
//! [`SensorData`] values. All multi-byte fields are little-endian. A payload
//! whose length does not match its data type's layout is rejected as a whole.
//!
//! # Payload layouts
//!
//! ```text
//! BUTTON        u16 bitmask (see BUTTON_BITS)
//! RELATIVE_XY   i16 x, i16 y [, u8 mode: 0 relative, 1 absolute]
//! GESTURE       u16 opcode, u8 value
//! POSE6D        i16 x, y, z, coded roll, coded pitch, coded yaw
//! MOTION6D      i16 accel x, y, z, gyro x, y, z
//! ANALOG        i16 joystick x, joystick y, trigger
//! EULER_ANGLES  i16 coded roll, pitch, yaw
//! TRANSLATIONS  i16 x, y, z
//! RAW_*         i16 x, y, z
//! SLIDER        u8 value
//! ```
//!
//! The generic data channel carries a sequence of `[DataType tag][payload]`
//! records, see [`decode_data_channel`].

use crate::domain::error::DecodeError;
use crate::domain::events::{ButtonId, ButtonState, GestureKind, SensorData, SliderKind};
use crate::domain::types::DataType;
use std::f32::consts::PI;
use tracing::{debug, trace};

/// Unit conversions applied by the decoders
pub mod scale {
    /// Accelerometer counts per g
    pub const ACCEL_LSB_PER_G: f32 = 8192.0;
    /// Gyroscope counts per deg/s
    pub const GYRO_LSB_PER_DPS: f32 = 16.4;
    /// Divisor of the fixed-point rotation encoding (2^29)
    pub const ROTATION_DIVISOR: f32 = (1u32 << 29) as f32;
}

/// Button bitmask table, in delivery order
pub const BUTTON_BITS: [(u16, ButtonId, ButtonState); 10] = [
    (1 << 0, ButtonId::Touch0, ButtonState::Down),
    (1 << 1, ButtonId::Touch0, ButtonState::Up),
    (1 << 2, ButtonId::Touch1, ButtonState::Down),
    (1 << 3, ButtonId::Touch1, ButtonState::Up),
    (1 << 4, ButtonId::Touch2, ButtonState::Down),
    (1 << 5, ButtonId::Touch2, ButtonState::Up),
    (1 << 6, ButtonId::Tactile0, ButtonState::Down),
    (1 << 7, ButtonId::Tactile0, ButtonState::Up),
    (1 << 8, ButtonId::Tactile1, ButtonState::Down),
    (1 << 9, ButtonId::Tactile1, ButtonState::Up),
];

pub const SCROLL_OPCODE: u16 = 0x1;
pub const DIRECTIONS_OPCODE: u16 = 0x2;

const POINTER_RELATIVE: u8 = 0x0;
const POINTER_ABSOLUTE: u8 = 0x1;

/// Fixed payload length of a stream type on the data channel
pub const fn record_len(data_type: DataType) -> Option<usize> {
    match data_type {
        DataType::Button => Some(2),
        DataType::Pointer => Some(4),
        DataType::Gesture => Some(3),
        DataType::Pose6D | DataType::Motion6D => Some(12),
        DataType::Analog
        | DataType::EulerAngles
        | DataType::Translations
        | DataType::RawAccelerometer
        | DataType::RawGyro
        | DataType::RawCompass => Some(6),
        DataType::Slider => Some(1),
        DataType::GeneralDeviceInformation => None,
    }
}

/// Decode the payload of any stream type
pub fn decode(data_type: DataType, bytes: &[u8]) -> Result<Vec<SensorData>, DecodeError> {
    trace!("Decoding {} payload: {:02X?}", data_type, bytes);

    match data_type {
        DataType::Button => decode_button(bytes),
        DataType::Pointer => decode_pointer(bytes),
        DataType::Gesture => decode_gesture(bytes),
        DataType::Pose6D => decode_pose6d(bytes).map(|d| vec![d]),
        DataType::Motion6D => decode_motion6d(bytes).map(|d| vec![d]),
        DataType::Analog => decode_analog(bytes).map(|d| vec![d]),
        DataType::EulerAngles => decode_euler(bytes).map(|d| vec![d]),
        DataType::Translations => decode_translation(bytes).map(|d| vec![d]),
        DataType::RawAccelerometer => decode_accelerometer(bytes).map(|d| vec![d]),
        DataType::RawGyro => decode_gyroscope(bytes).map(|d| vec![d]),
        DataType::RawCompass => decode_compass(bytes).map(|d| vec![d]),
        DataType::Slider => decode_slider(bytes),
        DataType::GeneralDeviceInformation => Err(DecodeError::UnknownTag {
            kind: "stream data type",
            tag: data_type.tag(),
        }),
    }
}

/// One event per set bit of the mask, in [`BUTTON_BITS`] order
pub fn decode_button(bytes: &[u8]) -> Result<Vec<SensorData>, DecodeError> {
    expect_len(DataType::Button, bytes, 2)?;
    let mask = u16::from_le_bytes([bytes[0], bytes[1]]);

    Ok(BUTTON_BITS
        .iter()
        .filter(|&&(bit, _, _)| mask & bit != 0)
        .map(|&(_, id, state)| SensorData::Button { id, state })
        .collect())
}

/// Relative movement of (0, 0) is a heartbeat and yields no event
pub fn decode_pointer(bytes: &[u8]) -> Result<Vec<SensorData>, DecodeError> {
    let mode = match bytes.len() {
        4 => POINTER_RELATIVE,
        5 => bytes[4],
        actual => {
            return Err(DecodeError::Length {
                data_type: DataType::Pointer,
                expected: 4,
                actual,
            })
        }
    };

    let x = i16_at(bytes, 0);
    let y = i16_at(bytes, 2);

    match mode {
        POINTER_RELATIVE if x == 0 && y == 0 => Ok(Vec::new()),
        POINTER_RELATIVE => Ok(vec![SensorData::PointerDelta { x, y }]),
        POINTER_ABSOLUTE => Ok(vec![SensorData::PointerAbsolute { x, y }]),
        tag => Err(DecodeError::UnknownTag {
            kind: "pointer mode",
            tag,
        }),
    }
}

/// Unknown opcodes and values yield no event
pub fn decode_gesture(bytes: &[u8]) -> Result<Vec<SensorData>, DecodeError> {
    expect_len(DataType::Gesture, bytes, 3)?;
    let opcode = u16::from_le_bytes([bytes[0], bytes[1]]);
    let value = bytes[2];

    match gesture_kind(opcode, value) {
        Some(kind) => Ok(vec![SensorData::Gesture(kind)]),
        None => {
            debug!("Ignoring gesture opcode {:#X} value {:#X}", opcode, value);
            Ok(Vec::new())
        }
    }
}

fn gesture_kind(opcode: u16, value: u8) -> Option<GestureKind> {
    match (opcode, value) {
        (SCROLL_OPCODE, 0x2) => Some(GestureKind::ScrollUp),
        (SCROLL_OPCODE, 0x1) => Some(GestureKind::ScrollDown),
        (DIRECTIONS_OPCODE, 0x1) => Some(GestureKind::SwipeRight),
        (DIRECTIONS_OPCODE, 0x2) => Some(GestureKind::SwipeLeft),
        (DIRECTIONS_OPCODE, 0x3) => Some(GestureKind::SwipeDown),
        (DIRECTIONS_OPCODE, 0x4) => Some(GestureKind::SwipeUp),
        (DIRECTIONS_OPCODE, 0x5) => Some(GestureKind::ClockwiseRotation),
        (DIRECTIONS_OPCODE, 0x6) => Some(GestureKind::CounterClockwiseRotation),
        _ => None,
    }
}

/// Fixed-point rotation: sign-extend, shift left 16, divide by 2^29 (radians)
pub fn decode_rotation(coded: i16) -> f32 {
    ((coded as i32) << 16) as f32 / scale::ROTATION_DIVISOR
}

pub fn decode_pose6d(bytes: &[u8]) -> Result<SensorData, DecodeError> {
    expect_len(DataType::Pose6D, bytes, 12)?;
    Ok(SensorData::Pose6D {
        x: i16_at(bytes, 0),
        y: i16_at(bytes, 2),
        z: i16_at(bytes, 4),
        roll: decode_rotation(i16_at(bytes, 6)),
        pitch: decode_rotation(i16_at(bytes, 8)),
        yaw: decode_rotation(i16_at(bytes, 10)),
    })
}

fn accel_g(raw: i16) -> f32 {
    raw as f32 / scale::ACCEL_LSB_PER_G
}

fn gyro_rad_per_sec(raw: i16) -> f32 {
    (raw as f32 / scale::GYRO_LSB_PER_DPS) * (PI / 180.0)
}

pub fn decode_motion6d(bytes: &[u8]) -> Result<SensorData, DecodeError> {
    expect_len(DataType::Motion6D, bytes, 12)?;
    Ok(SensorData::Motion6D {
        accel: [
            accel_g(i16_at(bytes, 0)),
            accel_g(i16_at(bytes, 2)),
            accel_g(i16_at(bytes, 4)),
        ],
        gyro: [
            gyro_rad_per_sec(i16_at(bytes, 6)),
            gyro_rad_per_sec(i16_at(bytes, 8)),
            gyro_rad_per_sec(i16_at(bytes, 10)),
        ],
    })
}

pub fn decode_analog(bytes: &[u8]) -> Result<SensorData, DecodeError> {
    let [joystick_x, joystick_y, trigger] = triple(DataType::Analog, bytes)?;
    Ok(SensorData::Analog {
        joystick_x,
        joystick_y,
        trigger,
    })
}

pub fn decode_euler(bytes: &[u8]) -> Result<SensorData, DecodeError> {
    let [roll, pitch, yaw] = triple(DataType::EulerAngles, bytes)?;
    Ok(SensorData::Euler {
        roll: decode_rotation(roll),
        pitch: decode_rotation(pitch),
        yaw: decode_rotation(yaw),
    })
}

pub fn decode_translation(bytes: &[u8]) -> Result<SensorData, DecodeError> {
    let [x, y, z] = triple(DataType::Translations, bytes)?;
    Ok(SensorData::Translation { x, y, z })
}

pub fn decode_accelerometer(bytes: &[u8]) -> Result<SensorData, DecodeError> {
    let [x, y, z] = triple(DataType::RawAccelerometer, bytes)?;
    Ok(SensorData::Accelerometer {
        x: accel_g(x),
        y: accel_g(y),
        z: accel_g(z),
    })
}

pub fn decode_gyroscope(bytes: &[u8]) -> Result<SensorData, DecodeError> {
    let [x, y, z] = triple(DataType::RawGyro, bytes)?;
    Ok(SensorData::Gyroscope {
        x: gyro_rad_per_sec(x),
        y: gyro_rad_per_sec(y),
        z: gyro_rad_per_sec(z),
    })
}

pub fn decode_compass(bytes: &[u8]) -> Result<SensorData, DecodeError> {
    let [x, y, z] = triple(DataType::RawCompass, bytes)?;
    Ok(SensorData::Compass { x, y, z })
}

pub fn decode_slider(bytes: &[u8]) -> Result<Vec<SensorData>, DecodeError> {
    expect_len(DataType::Slider, bytes, 1)?;
    match bytes[0] {
        0x1 => Ok(vec![SensorData::Slider(SliderKind::SlideForward)]),
        0x2 => Ok(vec![SensorData::Slider(SliderKind::SlideBackward)]),
        value => {
            debug!("Ignoring slider value {:#X}", value);
            Ok(Vec::new())
        }
    }
}

/// Events decoded from one data channel notification
#[derive(Debug, Default, PartialEq)]
pub struct DataChannelFrame {
    pub events: Vec<SensorData>,
    /// Set when a record was malformed; events before it are still valid
    pub error: Option<DecodeError>,
}

/// Split a data channel notification into `[tag][payload]` records.
///
/// An unknown or non-stream tag ends the frame, since the length of its
/// payload is unknown. A truncated record ends it with a length error.
pub fn decode_data_channel(bytes: &[u8]) -> DataChannelFrame {
    let mut frame = DataChannelFrame::default();
    if bytes.is_empty() {
        frame.error = Some(DecodeError::Empty);
        return frame;
    }

    let mut rest = bytes;
    while let Some((&tag, tail)) = rest.split_first() {
        let Some((data_type, len)) = DataType::from_tag(tag)
            .and_then(|data_type| record_len(data_type).map(|len| (data_type, len)))
        else {
            debug!(
                "Dropping {} trailing bytes after unmapped data tag {:#04X}",
                rest.len(),
                tag
            );
            break;
        };

        if tail.len() < len {
            frame.error = Some(DecodeError::Length {
                data_type,
                expected: len,
                actual: tail.len(),
            });
            break;
        }

        let (payload, next) = tail.split_at(len);
        match decode(data_type, payload) {
            Ok(events) => frame.events.extend(events),
            Err(e) => frame.error = Some(e),
        }
        rest = next;
    }

    frame
}

fn expect_len(data_type: DataType, bytes: &[u8], expected: usize) -> Result<(), DecodeError> {
    if bytes.len() != expected {
        return Err(DecodeError::Length {
            data_type,
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

fn i16_at(bytes: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn triple(data_type: DataType, bytes: &[u8]) -> Result<[i16; 3], DecodeError> {
    expect_len(data_type, bytes, 6)?;
    Ok([i16_at(bytes, 0), i16_at(bytes, 2), i16_at(bytes, 4)])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pointer_bytes(x: i16, y: i16) -> Vec<u8> {
        let mut bytes = x.to_le_bytes().to_vec();
        bytes.extend_from_slice(&y.to_le_bytes());
        bytes
    }

    fn i16s(values: &[i16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_pointer_round_trip() {
        for (x, y) in [(1, 0), (0, -1), (-120, 45), (i16::MAX, i16::MIN)] {
            let events = decode_pointer(&pointer_bytes(x, y)).unwrap();
            assert_eq!(events, vec![SensorData::PointerDelta { x, y }]);
        }
    }

    #[test]
    fn test_pointer_heartbeat_is_suppressed() {
        assert!(decode_pointer(&pointer_bytes(0, 0)).unwrap().is_empty());
    }

    #[test]
    fn test_pointer_absolute_mode() {
        let mut bytes = pointer_bytes(0, 0);
        bytes.push(1);
        assert_eq!(
            decode_pointer(&bytes).unwrap(),
            vec![SensorData::PointerAbsolute { x: 0, y: 0 }]
        );

        bytes[4] = 7;
        assert_eq!(
            decode_pointer(&bytes),
            Err(DecodeError::UnknownTag {
                kind: "pointer mode",
                tag: 7
            })
        );
    }

    #[test]
    fn test_button_empty_mask() {
        assert!(decode_button(&[0, 0]).unwrap().is_empty());
    }

    #[test]
    fn test_button_touch0_down_and_tactile1_up() {
        let mask: u16 = (1 << 0) | (1 << 9);
        let events = decode_button(&mask.to_le_bytes()).unwrap();
        assert_eq!(
            events,
            vec![
                SensorData::Button {
                    id: ButtonId::Touch0,
                    state: ButtonState::Down
                },
                SensorData::Button {
                    id: ButtonId::Tactile1,
                    state: ButtonState::Up
                },
            ]
        );
    }

    #[test]
    fn test_button_bits_outside_table_are_ignored() {
        assert!(decode_button(&0xFC00u16.to_le_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_gesture_lookup() {
        assert_eq!(
            decode_gesture(&[0x01, 0x00, 0x02]).unwrap(),
            vec![SensorData::Gesture(GestureKind::ScrollUp)]
        );
        assert_eq!(
            decode_gesture(&[0x02, 0x00, 0x05]).unwrap(),
            vec![SensorData::Gesture(GestureKind::ClockwiseRotation)]
        );
        assert_eq!(
            decode_gesture(&[0x02, 0x00, 0x04]).unwrap(),
            vec![SensorData::Gesture(GestureKind::SwipeUp)]
        );
    }

    #[test]
    fn test_gesture_unknown_opcode_or_value_yields_nothing() {
        assert!(decode_gesture(&[0x99, 0x00, 0x01]).unwrap().is_empty());
        assert!(decode_gesture(&[0x01, 0x00, 0x07]).unwrap().is_empty());
    }

    #[test]
    fn test_rotation_fixed_point() {
        assert_eq!(decode_rotation(0x4000), ((0x4000i32 << 16) as f32) / 536_870_912.0);
        assert_eq!(decode_rotation(0x4000), 2.0);
        assert_eq!(decode_rotation(-0x4000), -2.0);
        assert_eq!(decode_rotation(1), 1.0 / 8192.0);
        assert_eq!(decode_rotation(i16::MIN), -4.0);
    }

    #[test]
    fn test_pose6d_layout() {
        let data = decode_pose6d(&i16s(&[10, -20, 30, 0x4000, 0, -0x2000])).unwrap();
        assert_eq!(
            data,
            SensorData::Pose6D {
                x: 10,
                y: -20,
                z: 30,
                roll: 2.0,
                pitch: 0.0,
                yaw: -1.0,
            }
        );
    }

    #[test]
    fn test_motion6d_scaling() {
        let data = decode_motion6d(&i16s(&[8192, -8192, 0, 164, 0, -164])).unwrap();
        let SensorData::Motion6D { accel, gyro } = data else {
            panic!("expected motion6d");
        };
        assert_eq!(accel, [1.0, -1.0, 0.0]);
        let ten_dps = 10.0f32.to_radians();
        assert!((gyro[0] - ten_dps).abs() < 1e-6);
        assert_eq!(gyro[1], 0.0);
        assert!((gyro[2] + ten_dps).abs() < 1e-6);
    }

    #[test]
    fn test_raw_sensor_decoders() {
        assert_eq!(
            decode_accelerometer(&i16s(&[8192, 4096, 0])).unwrap(),
            SensorData::Accelerometer {
                x: 1.0,
                y: 0.5,
                z: 0.0
            }
        );
        assert_eq!(
            decode_compass(&i16s(&[-5, 6, 7])).unwrap(),
            SensorData::Compass { x: -5, y: 6, z: 7 }
        );
        assert_eq!(
            decode_analog(&i16s(&[100, -100, 255])).unwrap(),
            SensorData::Analog {
                joystick_x: 100,
                joystick_y: -100,
                trigger: 255
            }
        );
    }

    #[test]
    fn test_slider_values() {
        assert_eq!(
            decode_slider(&[0x2]).unwrap(),
            vec![SensorData::Slider(SliderKind::SlideBackward)]
        );
        assert!(decode_slider(&[0x9]).unwrap().is_empty());
    }

    #[test]
    fn test_length_mismatch_is_decode_failure() {
        assert_eq!(
            decode_pose6d(&[0; 11]),
            Err(DecodeError::Length {
                data_type: DataType::Pose6D,
                expected: 12,
                actual: 11
            })
        );
        assert!(decode_button(&[0, 0, 0]).is_err());
        assert!(decode_pointer(&[0; 3]).is_err());
        assert!(decode(DataType::RawGyro, &[0; 7]).is_err());
    }

    #[test]
    fn test_general_device_information_is_not_decodable() {
        assert!(decode(DataType::GeneralDeviceInformation, &[]).is_err());
    }

    #[test]
    fn test_data_channel_multiple_records() {
        let mut bytes = vec![DataType::EulerAngles.tag()];
        bytes.extend(i16s(&[0x4000, 0, 0]));
        bytes.push(DataType::Slider.tag());
        bytes.push(0x1);
        bytes.push(DataType::Pointer.tag());
        bytes.extend(pointer_bytes(0, 0));

        let frame = decode_data_channel(&bytes);
        assert_eq!(frame.error, None);
        assert_eq!(
            frame.events,
            vec![
                SensorData::Euler {
                    roll: 2.0,
                    pitch: 0.0,
                    yaw: 0.0
                },
                SensorData::Slider(SliderKind::SlideForward),
            ]
        );
    }

    #[test]
    fn test_data_channel_stops_at_unknown_tag() {
        let mut bytes = vec![DataType::Translations.tag()];
        bytes.extend(i16s(&[1, 2, 3]));
        bytes.extend([0xEE, 0x01, 0x02]);

        let frame = decode_data_channel(&bytes);
        assert_eq!(frame.error, None);
        assert_eq!(frame.events, vec![SensorData::Translation { x: 1, y: 2, z: 3 }]);
    }

    #[test]
    fn test_data_channel_truncated_record() {
        let mut bytes = vec![DataType::Slider.tag(), 0x2, DataType::RawGyro.tag()];
        bytes.extend([0, 0]);

        let frame = decode_data_channel(&bytes);
        assert_eq!(frame.events, vec![SensorData::Slider(SliderKind::SlideBackward)]);
        assert_eq!(
            frame.error,
            Some(DecodeError::Length {
                data_type: DataType::RawGyro,
                expected: 6,
                actual: 2
            })
        );
    }

    #[test]
    fn test_data_channel_empty() {
        assert_eq!(decode_data_channel(&[]).error, Some(DecodeError::Empty));
    }
}
