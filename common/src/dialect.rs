use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::state::{DeviceUpdate, TEMPERATURE_FLOOR_TENTHS_C};

pub type DpIndex = u16;

pub type RawDataPoints = BTreeMap<DpIndex, DpValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DpValue {
    Bool(bool),
    Integer(i64),
    Text(String),
    Other(serde_json::Value),
}

impl DpValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Enum-typed DPs arrive as strings on some firmware and as numbers on
    /// others; both compare by their textual form.
    pub fn matches_code(&self, code: &str) -> bool {
        match self {
            Self::Text(text) => text == code,
            Self::Integer(value) => value.to_string() == code,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DpWrite {
    #[serde(rename = "dps")]
    pub dp: DpIndex,
    #[serde(rename = "set")]
    pub value: DpValue,
}

impl DpWrite {
    fn new(dp: DpIndex, value: DpValue) -> Self {
        Self { dp, value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    #[default]
    HalfDegree,
    TenthDegree,
}

#[derive(Debug, Clone, Copy)]
enum ActivityMarker {
    IdleWhen(&'static str),
    ActiveWhen(&'static str),
}

#[derive(Debug)]
struct DpLayout {
    power: DpIndex,
    target: DpIndex,
    current: DpIndex,
    activity: DpIndex,
    marker: ActivityMarker,
    tenths_per_step: i64,
}

const HALF_DEGREE: DpLayout = DpLayout {
    power: 1,
    target: 2,
    current: 3,
    activity: 102,
    marker: ActivityMarker::IdleWhen("0"),
    tenths_per_step: 5,
};

const TENTH_DEGREE: DpLayout = DpLayout {
    power: 101,
    target: 102,
    current: 106,
    activity: 118,
    marker: ActivityMarker::ActiveWhen("heating"),
    tenths_per_step: 1,
};

impl Dialect {
    fn layout(self) -> &'static DpLayout {
        match self {
            Self::HalfDegree => &HALF_DEGREE,
            Self::TenthDegree => &TENTH_DEGREE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HalfDegree => "half-degree",
            Self::TenthDegree => "tenth-degree",
        }
    }

    pub fn decode(self, dps: &RawDataPoints) -> DeviceUpdate {
        let layout = self.layout();

        DeviceUpdate {
            power_on: dps.get(&layout.power).and_then(DpValue::as_bool),
            is_heating_active: dps.get(&layout.activity).map(|value| match layout.marker {
                ActivityMarker::IdleWhen(code) => !value.matches_code(code),
                ActivityMarker::ActiveWhen(code) => value.matches_code(code),
            }),
            current_temperature_tenths_c: dps
                .get(&layout.current)
                .and_then(|value| self.decode_temperature(value)),
            target_temperature_tenths_c: dps
                .get(&layout.target)
                .and_then(|value| self.decode_temperature(value)),
        }
    }

    pub fn encode_set_power(self, on: bool) -> DpWrite {
        DpWrite::new(self.layout().power, DpValue::Bool(on))
    }

    pub fn encode_set_target(self, tenths_c: i32) -> DpWrite {
        let layout = self.layout();
        let tenths = i64::from(tenths_c.max(TEMPERATURE_FLOOR_TENTHS_C));
        let raw = (tenths + layout.tenths_per_step / 2) / layout.tenths_per_step;
        DpWrite::new(layout.target, DpValue::Integer(raw))
    }

    pub fn encode_standby(self) -> DpWrite {
        match self {
            Self::HalfDegree => DpWrite::new(self.layout().activity, DpValue::Integer(0)),
            Self::TenthDegree => self.encode_set_power(false),
        }
    }

    fn decode_temperature(self, value: &DpValue) -> Option<i32> {
        let raw = value.as_integer().filter(|raw| *raw != 0)?;
        let tenths = raw.checked_mul(self.layout().tenths_per_step)?;
        let tenths = i32::try_from(tenths).ok()?;
        Some(tenths.max(TEMPERATURE_FLOOR_TENTHS_C))
    }
}

pub fn parse_data_points(raw: &str) -> Result<RawDataPoints, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let body = match value {
        serde_json::Value::Object(mut envelope)
            if envelope.get("dps").is_some_and(serde_json::Value::is_object) =>
        {
            envelope.remove("dps").unwrap_or_default()
        }
        other => other,
    };

    // Keys that are not DP indices are skipped, not fatal.
    let entries: BTreeMap<String, DpValue> = serde_json::from_value(body)?;
    Ok(entries
        .into_iter()
        .filter_map(|(key, value)| key.trim().parse::<DpIndex>().ok().map(|dp| (dp, value)))
        .collect())
}
