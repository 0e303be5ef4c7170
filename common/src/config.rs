use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dialect::Dialect;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config json: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("device #{index} is missing `{field}`")]
    MissingField { index: usize, field: &'static str },
    #[error("mqtt port must be non-zero")]
    InvalidMqttPort,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceConfig {
    #[serde(default)]
    pub name: String,
    pub id: String,
    pub key: String,
    #[serde(
        rename = "disableAfterSeconds",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub disable_after_seconds: Option<u64>,
    #[serde(default)]
    pub dialect: Dialect,
}

impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("key", &"<redacted>")
            .field("disable_after_seconds", &self.disable_after_seconds)
            .field("dialect", &self.dialect)
            .finish()
    }
}

impl DeviceConfig {
    pub fn sanitize(&mut self) {
        self.id = self.id.trim().to_string();
        self.key = self.key.trim().to_string();
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            self.name = self.id.clone();
        }
    }

    pub fn validate(&self, index: usize) -> Result<(), ConfigError> {
        if self.id.is_empty() {
            return Err(ConfigError::MissingField { index, field: "id" });
        }
        if self.key.is_empty() {
            return Err(ConfigError::MissingField { index, field: "key" });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    #[serde(rename = "clientId")]
    pub client_id: String,
    #[serde(rename = "topicPrefix")]
    pub topic_prefix: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            user: String::new(),
            pass: String::new(),
            client_id: "prowarm-bridge".to_string(),
            topic_prefix: "tuya".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BridgeConfig {
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(rename = "httpPort", default = "default_http_port")]
    pub http_port: u16,
    #[serde(rename = "requestTimeoutMs", default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_platform() -> String {
    "TuyaThermostat".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            platform: default_platform(),
            devices: Vec::new(),
            mqtt: MqttConfig::default(),
            http_port: default_http_port(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl BridgeConfig {
    pub fn from_json(raw: &[u8]) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_slice(raw)?;
        config.sanitize();
        config.validate()?;
        Ok(config)
    }

    pub fn sanitize(&mut self) {
        for device in &mut self.devices {
            device.sanitize();
        }
        self.mqtt.topic_prefix = self.mqtt.topic_prefix.trim_matches('/').to_string();
        if self.mqtt.topic_prefix.is_empty() {
            self.mqtt.topic_prefix = MqttConfig::default().topic_prefix;
        }
        self.request_timeout_ms = self.request_timeout_ms.clamp(500, 60_000);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.port == 0 {
            return Err(ConfigError::InvalidMqttPort);
        }
        for (index, device) in self.devices.iter().enumerate() {
            device.validate(index)?;
        }
        Ok(())
    }
}
