pub mod config;
pub mod dialect;
pub mod safety;
pub mod state;
pub mod topics;
pub mod types;

pub use config::{BridgeConfig, ConfigError, DeviceConfig, MqttConfig};
pub use dialect::{parse_data_points, Dialect, DpIndex, DpValue, DpWrite, RawDataPoints};
pub use safety::{SafetyAction, SafetyPhase, SafetyPolicy};
pub use state::{
    celsius_to_tenths, tenths_to_celsius, DeviceSnapshot, DeviceState, DeviceUpdate,
    TEMPERATURE_FLOOR_TENTHS_C,
};
pub use topics::{parse_inbound, DeviceTopics, InboundKind};
pub use types::{
    AccessoryInformation, Characteristic, CharacteristicValue, HeatingCoolingState,
    TemperatureDisplayUnits,
};
