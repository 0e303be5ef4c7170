use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, info};

use prowarm_common::{
    celsius_to_tenths, AccessoryInformation, Characteristic, CharacteristicValue, DeviceConfig,
    DeviceSnapshot, DeviceState, HeatingCoolingState, RawDataPoints, SafetyAction,
    SafetyPolicy, TemperatureDisplayUnits,
};

use crate::{
    client::{ClientError, DeviceClient},
    gateway::CommandGateway,
};

const MAX_TARGET_CELSIUS: f32 = 35.0;

#[derive(Debug, Error)]
pub enum CharacteristicError {
    #[error("{} is read-only", .0.as_str())]
    ReadOnly(Characteristic),
    #[error("invalid value '{value}' for {}", .characteristic.as_str())]
    InvalidValue {
        characteristic: Characteristic,
        value: String,
    },
    #[error(transparent)]
    Device(#[from] ClientError),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStatus {
    #[serde(rename = "lastSyncAt")]
    pub last_sync_at: Option<DateTime<Utc>>,
    #[serde(rename = "consecutiveFailures")]
    pub consecutive_failures: u32,
    #[serde(rename = "lastError")]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessoryView {
    pub uuid: String,
    pub name: String,
    pub id: String,
    pub dialect: &'static str,
    pub information: AccessoryInformation,
    pub state: DeviceSnapshot,
    #[serde(rename = "safetyRemainingMs")]
    pub safety_remaining_ms: Option<u64>,
    pub sync: SyncStatus,
}

pub struct ThermostatAccessory {
    config: DeviceConfig,
    uuid: String,
    client: Arc<dyn DeviceClient>,
    gateway: CommandGateway,
    safety: SafetyPolicy,
    state: Mutex<DeviceState>,
    sync: Mutex<SyncStatus>,
    started: Instant,
}

impl ThermostatAccessory {
    pub fn new(
        config: DeviceConfig,
        uuid: String,
        client: Arc<dyn DeviceClient>,
        initial_state: DeviceState,
    ) -> Self {
        let gateway = CommandGateway::new(client.clone(), config.dialect);
        let safety = SafetyPolicy::new(config.disable_after_seconds);

        Self {
            config,
            uuid,
            client,
            gateway,
            safety,
            state: Mutex::new(initial_state),
            sync: Mutex::new(SyncStatus::default()),
            started: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn client(&self) -> &Arc<dyn DeviceClient> {
        &self.client
    }

    pub fn now_ms(&self) -> u64 {
        self.started
            .elapsed()
            .as_millis()
            .try_into()
            .unwrap_or(u64::MAX)
    }

    pub async fn apply_data_points(&self, dps: &RawDataPoints) -> bool {
        let update = self.config.dialect.decode(dps);
        if update.is_empty() {
            return false;
        }

        let snapshot = {
            let mut state = self.state.lock().await;
            if !state.apply(&update) {
                return false;
            }
            state.snapshot()
        };

        debug!("device synced ({}): {snapshot:?}", self.name());
        true
    }

    pub async fn snapshot(&self) -> DeviceSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn state(&self) -> DeviceState {
        self.state.lock().await.clone()
    }

    pub async fn enforce_safety(&self) -> Result<(), ClientError> {
        let now_ms = self.now_ms();
        let action = {
            let mut state = self.state.lock().await;
            self.safety.tick(&mut state, now_ms)
        };

        let Some(SafetyAction::ForceOff { elapsed_ms }) = action else {
            return Ok(());
        };

        info!(
            "{} heated for {}s, forcing power off",
            self.name(),
            elapsed_ms / 1_000
        );
        self.gateway.set_power(false).await?;

        let mut state = self.state.lock().await;
        self.safety.complete_forced_off(&mut state);
        Ok(())
    }

    pub async fn record_sync_success(&self) {
        let mut sync = self.sync.lock().await;
        sync.last_sync_at = Some(Utc::now());
        sync.consecutive_failures = 0;
        sync.last_error = None;
    }

    pub async fn record_sync_failure(&self, err: &ClientError) {
        let mut sync = self.sync.lock().await;
        sync.consecutive_failures = sync.consecutive_failures.saturating_add(1);
        sync.last_error = Some(err.to_string());
    }

    pub async fn sync_status(&self) -> SyncStatus {
        self.sync.lock().await.clone()
    }

    pub async fn view(&self) -> AccessoryView {
        let now_ms = self.now_ms();
        let (state, safety_remaining_ms) = {
            let state = self.state.lock().await;
            (state.snapshot(), self.safety.remaining_ms(&state, now_ms))
        };

        AccessoryView {
            uuid: self.uuid.clone(),
            name: self.config.name.clone(),
            id: self.config.id.clone(),
            dialect: self.config.dialect.as_str(),
            information: AccessoryInformation::for_device(&self.config.id),
            state,
            safety_remaining_ms,
            sync: self.sync_status().await,
        }
    }

    pub async fn get_characteristic(&self, characteristic: Characteristic) -> CharacteristicValue {
        let snapshot = self.snapshot().await;

        match characteristic {
            Characteristic::Name => CharacteristicValue::Text(self.config.name.clone()),
            Characteristic::CurrentHeatingCoolingState => {
                CharacteristicValue::Code(heating_state(snapshot.is_heating_active).code())
            }
            Characteristic::TargetHeatingCoolingState => {
                CharacteristicValue::Code(heating_state(snapshot.power_on).code())
            }
            Characteristic::CurrentTemperature => {
                CharacteristicValue::Float(snapshot.current_temperature_c)
            }
            Characteristic::TargetTemperature => {
                CharacteristicValue::Float(snapshot.target_temperature_c)
            }
            Characteristic::TemperatureDisplayUnits => {
                CharacteristicValue::Code(TemperatureDisplayUnits::Celsius.code())
            }
        }
    }

    pub async fn set_characteristic(
        &self,
        characteristic: Characteristic,
        value: &str,
    ) -> Result<(), CharacteristicError> {
        let invalid = || CharacteristicError::InvalidValue {
            characteristic,
            value: value.to_string(),
        };

        if !characteristic.is_writable() {
            return Err(CharacteristicError::ReadOnly(characteristic));
        }

        match characteristic {
            Characteristic::TargetHeatingCoolingState => {
                let mode = parse_heating_state(value).ok_or_else(invalid)?;
                debug!("{} target mode -> {}", self.name(), mode.as_str());
                if mode == HeatingCoolingState::Heat {
                    self.gateway.set_power(true).await?;
                } else {
                    self.gateway.set_standby().await?;
                }
            }
            Characteristic::TargetTemperature => {
                let celsius = value
                    .trim()
                    .parse::<f32>()
                    .ok()
                    .filter(|celsius| celsius.is_finite() && *celsius <= MAX_TARGET_CELSIUS)
                    .ok_or_else(invalid)?;
                self.gateway.set_target(celsius_to_tenths(celsius)).await?;
            }
            Characteristic::TemperatureDisplayUnits => {
                let units = value
                    .trim()
                    .parse::<u8>()
                    .ok()
                    .and_then(TemperatureDisplayUnits::from_code);
                // Only Celsius is supported; anything else is acknowledged and dropped.
                if units != Some(TemperatureDisplayUnits::Celsius) {
                    debug!("{} ignoring display units -> {value} ({units:?})", self.name());
                }
            }
            Characteristic::Name
            | Characteristic::CurrentHeatingCoolingState
            | Characteristic::CurrentTemperature => {}
        }
        Ok(())
    }
}

fn heating_state(active: bool) -> HeatingCoolingState {
    if active {
        HeatingCoolingState::Heat
    } else {
        HeatingCoolingState::Off
    }
}

fn parse_heating_state(value: &str) -> Option<HeatingCoolingState> {
    let value = value.trim();
    if let Ok(code) = value.parse::<u8>() {
        return HeatingCoolingState::from_code(code);
    }
    [
        HeatingCoolingState::Off,
        HeatingCoolingState::Heat,
        HeatingCoolingState::Cool,
        HeatingCoolingState::Auto,
    ]
    .into_iter()
    .find(|mode| mode.as_str().eq_ignore_ascii_case(value))
}
