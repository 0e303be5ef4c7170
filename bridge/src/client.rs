use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;

use prowarm_common::{DpWrite, RawDataPoints};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("mqtt error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),
    #[error("device did not answer within {0} ms")]
    Timeout(u64),
    #[error("gateway reported: {0}")]
    Gateway(String),
    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("device event channel closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Data(RawDataPoints),
    Error(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GetOptions {
    pub schema: bool,
}

#[async_trait]
pub trait DeviceClient: Send + Sync {
    fn device_id(&self) -> &str;

    async fn find(&self) -> Result<(), ClientError>;

    async fn connect(&self) -> Result<(), ClientError>;

    async fn get(&self, options: GetOptions) -> Result<RawDataPoints, ClientError>;

    /// Write one data point. Resolves once the write is accepted, not once the
    /// device reports the new value.
    async fn set(&self, write: &DpWrite) -> Result<(), ClientError>;

    fn subscribe(&self) -> broadcast::Receiver<DeviceEvent>;
}
