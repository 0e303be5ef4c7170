use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HeatingCoolingState {
    Off,
    Heat,
    Cool,
    Auto,
}

impl HeatingCoolingState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Heat => "HEAT",
            Self::Cool => "COOL",
            Self::Auto => "AUTO",
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Heat => 1,
            Self::Cool => 2,
            Self::Auto => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Off),
            1 => Some(Self::Heat),
            2 => Some(Self::Cool),
            3 => Some(Self::Auto),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TemperatureDisplayUnits {
    Celsius,
    Fahrenheit,
}

impl TemperatureDisplayUnits {
    pub fn code(self) -> u8 {
        match self {
            Self::Celsius => 0,
            Self::Fahrenheit => 1,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Celsius),
            1 => Some(Self::Fahrenheit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    Name,
    CurrentHeatingCoolingState,
    TargetHeatingCoolingState,
    CurrentTemperature,
    TargetTemperature,
    TemperatureDisplayUnits,
}

impl Characteristic {
    pub const ALL: [Characteristic; 6] = [
        Self::Name,
        Self::CurrentHeatingCoolingState,
        Self::TargetHeatingCoolingState,
        Self::CurrentTemperature,
        Self::TargetTemperature,
        Self::TemperatureDisplayUnits,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::CurrentHeatingCoolingState => "current-heating-cooling-state",
            Self::TargetHeatingCoolingState => "target-heating-cooling-state",
            Self::CurrentTemperature => "current-temperature",
            Self::TargetTemperature => "target-temperature",
            Self::TemperatureDisplayUnits => "temperature-display-units",
        }
    }

    pub fn is_writable(self) -> bool {
        matches!(
            self,
            Self::TargetHeatingCoolingState
                | Self::TargetTemperature
                | Self::TemperatureDisplayUnits
        )
    }
}

impl FromStr for Characteristic {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|characteristic| {
                characteristic.as_str() == normalized
                    || characteristic.as_str().replace('-', "") == normalized
            })
            .ok_or_else(|| format!("unknown characteristic '{value}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CharacteristicValue {
    Text(String),
    Code(u8),
    Float(f32),
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessoryInformation {
    pub manufacturer: &'static str,
    pub model: &'static str,
    #[serde(rename = "serialNumber")]
    pub serial_number: String,
}

impl AccessoryInformation {
    pub fn for_device(id: &str) -> Self {
        Self {
            manufacturer: "Tuya",
            model: "ProWarm Wi-Fi",
            serial_number: id.to_string(),
        }
    }
}
