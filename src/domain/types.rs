//! Protocol Type Registry
//!
//! Closed enumerations of the OpenSpatial protocol, each variant bound to the
//! one-byte tag it carries on the wire. The tags are part of the device
//! compatibility contract and must never be renumbered.
//!
//! Lookups in both directions are `match` tables. An unknown tag is not an
//! error: newer firmware may report types this host does not know, so
//! `from_tag` returns `None` and callers skip the value.

use std::fmt;

/// Declares a wire enum with `tag`, `from_tag`, `name`, `ALL` and `Display`.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $tag:literal => $label:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The wire tag of this variant
            pub const fn tag(self) -> u8 {
                match self {
                    $($name::$variant => $tag,)+
                }
            }

            /// Look up a variant by wire tag
            pub const fn from_tag(tag: u8) -> Option<Self> {
                match tag {
                    $($tag => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// Protocol name, as used in logs
            pub const fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

wire_enum! {
    /// Kind of data a device can stream or be queried about
    pub enum DataType {
        RawAccelerometer = 0x01 => "RAW_ACCELEROMETER",
        RawGyro = 0x02 => "RAW_GYRO",
        RawCompass = 0x03 => "RAW_COMPASS",
        EulerAngles = 0x04 => "EULER_ANGLES",
        Translations = 0x05 => "TRANSLATIONS",
        /// Relative XY pointer movement
        Pointer = 0x10 => "RELATIVE_XY",
        Gesture = 0x11 => "GESTURE",
        Slider = 0x12 => "SLIDER",
        Button = 0x20 => "BUTTON",
        Analog = 0x21 => "ANALOG",
        Pose6D = 0x30 => "POSE6D",
        Motion6D = 0x31 => "MOTION6D",
        /// Not a stream; namespaces the general device parameters
        GeneralDeviceInformation = 0x40 => "GENERAL_DEVICE_INFORMATION",
    }
}

impl DataType {
    /// Whether this type produces sensor events a listener can subscribe to
    pub const fn is_stream(self) -> bool {
        !matches!(self, DataType::GeneralDeviceInformation)
    }
}

wire_enum! {
    /// Parameters of the device as a whole
    pub enum GeneralParameter {
        Handedness = 0x01 => "HANDEDNESS",
        Orientation = 0x02 => "ORIENTATION",
        IdleTimeout = 0x03 => "IDLE_TIMEOUT",
        SensorQuantity = 0x04 => "SENSOR_QUANTITY",
    }
}

wire_enum! {
    /// Parameters of an individual sensor stream
    pub enum SensorParameter {
        SampleFrequency = 0x01 => "SAMPLE_FREQUENCY",
        FullScaleRange = 0x02 => "FSR",
        ScaleFactor = 0x03 => "SCALE_FACTOR",
    }
}

/// A queryable or settable device attribute.
///
/// The two families share one tag space. Which family a tag belongs to is
/// decided by the [`DataType`] the parameter is addressed to:
/// [`DataType::GeneralDeviceInformation`] selects [`GeneralParameter`],
/// every stream type selects [`SensorParameter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceParameter {
    General(GeneralParameter),
    Sensor(SensorParameter),
}

impl DeviceParameter {
    pub const fn tag(self) -> u8 {
        match self {
            DeviceParameter::General(p) => p.tag(),
            DeviceParameter::Sensor(p) => p.tag(),
        }
    }

    /// Resolve a tag within the family selected by `data_type`
    pub fn from_tag(data_type: DataType, tag: u8) -> Option<Self> {
        if data_type.is_stream() {
            SensorParameter::from_tag(tag).map(DeviceParameter::Sensor)
        } else {
            GeneralParameter::from_tag(tag).map(DeviceParameter::General)
        }
    }

    /// Whether this parameter may be addressed to `data_type`
    pub fn applies_to(self, data_type: DataType) -> bool {
        match self {
            DeviceParameter::General(_) => !data_type.is_stream(),
            DeviceParameter::Sensor(_) => data_type.is_stream(),
        }
    }
}

impl From<GeneralParameter> for DeviceParameter {
    fn from(p: GeneralParameter) -> Self {
        DeviceParameter::General(p)
    }
}

impl From<SensorParameter> for DeviceParameter {
    fn from(p: SensorParameter) -> Self {
        DeviceParameter::Sensor(p)
    }
}

impl fmt::Display for DeviceParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceParameter::General(p) => p.fmt(f),
            DeviceParameter::Sensor(p) => p.fmt(f),
        }
    }
}

wire_enum! {
    /// Result code carried by every command response
    pub enum ResponseCode {
        Ok = 0x00 => "OK",
        Unsupported = 0x01 => "UNSUPPORTED",
        Failed = 0x02 => "FAILED",
        InvalidDataType = 0x03 => "INVALID_DATATYPE",
        InvalidParameter = 0x04 => "INVALID_PARAMETER",
        InvalidValue = 0x05 => "INVALID_VALUE",
        /// The set was applied with a substituted value (returned in the response)
        ParameterValueReplaced = 0x06 => "PARAMETER_VALUE_REPLACED",
    }
}

impl ResponseCode {
    pub const fn is_success(self) -> bool {
        matches!(self, ResponseCode::Ok | ResponseCode::ParameterValueReplaced)
    }
}

wire_enum! {
    /// Outbound command kinds
    pub enum CommandType {
        GetParameter = 0x01 => "GET_PARAMETER",
        SetParameter = 0x02 => "SET_PARAMETER",
        GetParameterRange = 0x03 => "GET_PARAMETER_RANGE",
        GetIdentifiers = 0x04 => "GET_IDENTIFIERS",
        Enable = 0x05 => "ENABLE",
        Disable = 0x06 => "DISABLE",
    }
}

impl CommandType {
    /// Whether frames of this command carry a [`DeviceParameter`] tag
    pub const fn has_parameter(self) -> bool {
        matches!(
            self,
            CommandType::GetParameter | CommandType::SetParameter | CommandType::GetParameterRange
        )
    }
}
