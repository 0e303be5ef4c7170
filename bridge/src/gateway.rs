use std::sync::Arc;

use tracing::debug;

use prowarm_common::{Dialect, DpWrite};

use crate::client::{ClientError, DeviceClient};

#[derive(Clone)]
pub struct CommandGateway {
    client: Arc<dyn DeviceClient>,
    dialect: Dialect,
}

impl CommandGateway {
    pub fn new(client: Arc<dyn DeviceClient>, dialect: Dialect) -> Self {
        Self { client, dialect }
    }

    pub async fn set_power(&self, on: bool) -> Result<(), ClientError> {
        self.send(self.dialect.encode_set_power(on)).await
    }

    /// Setpoint only; never touches the power data point.
    pub async fn set_target(&self, tenths_c: i32) -> Result<(), ClientError> {
        self.send(self.dialect.encode_set_target(tenths_c)).await
    }

    pub async fn set_standby(&self) -> Result<(), ClientError> {
        self.send(self.dialect.encode_standby()).await
    }

    async fn send(&self, write: DpWrite) -> Result<(), ClientError> {
        debug!(
            "device {} write dp {} = {:?}",
            self.client.device_id(),
            write.dp,
            write.value
        );
        self.client.set(&write).await
    }
}
