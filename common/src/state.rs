use serde::{Deserialize, Serialize};

pub const TEMPERATURE_FLOOR_TENTHS_C: i32 = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceUpdate {
    pub power_on: Option<bool>,
    pub is_heating_active: Option<bool>,
    pub current_temperature_tenths_c: Option<i32>,
    pub target_temperature_tenths_c: Option<i32>,
}

impl DeviceUpdate {
    pub fn is_empty(&self) -> bool {
        self.power_on.is_none()
            && self.is_heating_active.is_none()
            && self.current_temperature_tenths_c.is_none()
            && self.target_temperature_tenths_c.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    #[serde(rename = "powerOn", default)]
    power_on: bool,
    #[serde(rename = "isHeatingActive", default)]
    is_heating_active: bool,
    #[serde(rename = "currentTemperatureTenthsC", default)]
    current_temperature_tenths_c: Option<i32>,
    #[serde(rename = "targetTemperatureTenthsC", default)]
    target_temperature_tenths_c: Option<i32>,

    // Monotonic milliseconds; meaningless across restarts.
    #[serde(skip)]
    pub(crate) heating_since_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    #[serde(rename = "powerOn")]
    pub power_on: bool,
    #[serde(rename = "isHeatingActive")]
    pub is_heating_active: bool,
    #[serde(rename = "currentTemperature")]
    pub current_temperature_c: f32,
    #[serde(rename = "targetTemperature")]
    pub target_temperature_c: f32,
    #[serde(rename = "heatingSinceMs")]
    pub heating_since_ms: Option<u64>,
}

impl DeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn power_on(&self) -> bool {
        self.power_on
    }

    pub fn is_heating_active(&self) -> bool {
        self.is_heating_active
    }

    pub fn current_temperature_tenths_c(&self) -> i32 {
        self.current_temperature_tenths_c
            .unwrap_or(TEMPERATURE_FLOOR_TENTHS_C)
    }

    pub fn target_temperature_tenths_c(&self) -> i32 {
        self.target_temperature_tenths_c
            .unwrap_or(TEMPERATURE_FLOOR_TENTHS_C)
    }

    pub fn heating_since_ms(&self) -> Option<u64> {
        self.heating_since_ms
    }

    /// Merges every field present in `update`, leaving the rest untouched.
    ///
    /// Returns `true` when at least one field was written. Zero or negative
    /// temperatures are dropped so an unset reading never replaces a real one.
    pub fn apply(&mut self, update: &DeviceUpdate) -> bool {
        let mut written = false;

        if let Some(on) = update.power_on {
            self.power_on = on;
            written = true;
        }
        if let Some(active) = update.is_heating_active {
            self.is_heating_active = active;
            written = true;
        }
        if let Some(tenths) = accept_temperature(update.current_temperature_tenths_c) {
            self.current_temperature_tenths_c = Some(tenths);
            written = true;
        }
        if let Some(tenths) = accept_temperature(update.target_temperature_tenths_c) {
            self.target_temperature_tenths_c = Some(tenths);
            written = true;
        }

        written
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            power_on: self.power_on,
            is_heating_active: self.is_heating_active,
            current_temperature_c: tenths_to_celsius(self.current_temperature_tenths_c()),
            target_temperature_c: tenths_to_celsius(self.target_temperature_tenths_c()),
            heating_since_ms: self.heating_since_ms,
        }
    }

    pub fn sanitize(&mut self) {
        self.current_temperature_tenths_c = accept_temperature(self.current_temperature_tenths_c);
        self.target_temperature_tenths_c = accept_temperature(self.target_temperature_tenths_c);
        self.heating_since_ms = None;
    }
}

fn accept_temperature(tenths: Option<i32>) -> Option<i32> {
    tenths
        .filter(|value| *value > 0)
        .map(|value| value.max(TEMPERATURE_FLOOR_TENTHS_C))
}

pub fn tenths_to_celsius(tenths: i32) -> f32 {
    tenths as f32 / 10.0
}

pub fn celsius_to_tenths(celsius: f32) -> i32 {
    (celsius * 10.0).round() as i32
}
