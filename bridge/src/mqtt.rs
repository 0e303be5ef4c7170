use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use prowarm_common::{
    parse_data_points, parse_inbound, DeviceConfig, DeviceTopics, DpWrite, InboundKind,
    MqttConfig, RawDataPoints,
};

use crate::client::{ClientError, DeviceClient, DeviceEvent, GetOptions};

const MAX_MQTT_PAYLOAD_BYTES: usize = 4096;
const DEVICE_EVENT_CAPACITY: usize = 32;

type Routes = Arc<RwLock<HashMap<String, broadcast::Sender<DeviceEvent>>>>;

#[derive(Clone)]
pub struct MqttHub {
    mqtt: AsyncClient,
    prefix: String,
    routes: Routes,
    request_timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ConnectRequest<'a> {
    id: &'a str,
    key: &'a str,
    #[serde(rename = "issueGetOnConnect")]
    issue_get_on_connect: bool,
}

impl MqttHub {
    pub fn new(config: &MqttConfig, request_timeout_ms: u64) -> (Self, EventLoop) {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if !config.user.is_empty() {
            options.set_credentials(&config.user, &config.pass);
        }

        let (mqtt, eventloop) = AsyncClient::new(options, 64);
        let hub = Self {
            mqtt,
            prefix: config.topic_prefix.clone(),
            routes: Arc::new(RwLock::new(HashMap::new())),
            request_timeout: Duration::from_millis(request_timeout_ms),
        };
        (hub, eventloop)
    }

    pub async fn subscribe_topics(&self) -> Result<(), ClientError> {
        for topic in DeviceTopics::wildcard(&self.prefix) {
            self.mqtt.subscribe(topic, QoS::AtMostOnce).await?;
        }
        Ok(())
    }

    pub async fn device(&self, config: &DeviceConfig) -> Arc<MqttDeviceClient> {
        let events = {
            let mut routes = self.routes.write().await;
            routes
                .entry(config.id.clone())
                .or_insert_with(|| broadcast::channel(DEVICE_EVENT_CAPACITY).0)
                .clone()
        };

        Arc::new(MqttDeviceClient {
            id: config.id.clone(),
            key: config.key.clone(),
            mqtt: self.mqtt.clone(),
            topics: DeviceTopics::new(&self.prefix, &config.id),
            events,
            request_timeout: self.request_timeout,
        })
    }

    pub fn spawn_event_loop(&self, mut eventloop: EventLoop) {
        let hub = self.clone();
        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Incoming::Publish(message))) => {
                        hub.route(&message.topic, &message.payload).await;
                    }
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                        info!("mqtt connected");
                        for topic in DeviceTopics::wildcard(&hub.prefix) {
                            if let Err(err) = hub.mqtt.try_subscribe(topic, QoS::AtMostOnce) {
                                warn!("mqtt resubscribe failed: {err}");
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!("mqtt poll error: {err}");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        });
    }

    async fn route(&self, topic: &str, payload: &[u8]) {
        let Some((device_id, kind)) = parse_inbound(&self.prefix, topic) else {
            return;
        };

        let Some(sender) = self.routes.read().await.get(device_id).cloned() else {
            debug!("ignoring message for unconfigured device {device_id}");
            return;
        };

        match decode_inbound(kind, payload) {
            // No receivers just means nothing is listening yet.
            Ok(event) => {
                let _ = sender.send(event);
            }
            Err(err) => warn!("dropping message on {topic}: {err}"),
        }
    }
}

fn decode_inbound(kind: InboundKind, payload: &[u8]) -> Result<DeviceEvent, ClientError> {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        return Err(ClientError::Gateway(format!(
            "oversized payload ({} bytes)",
            payload.len()
        )));
    }

    let text = String::from_utf8_lossy(payload);
    match kind {
        InboundKind::DataPoints => Ok(DeviceEvent::Data(parse_data_points(&text)?)),
        InboundKind::Error => Ok(DeviceEvent::Error(text.trim().to_string())),
    }
}

pub struct MqttDeviceClient {
    id: String,
    key: String,
    mqtt: AsyncClient,
    topics: DeviceTopics,
    events: broadcast::Sender<DeviceEvent>,
    request_timeout: Duration,
}

impl MqttDeviceClient {
    async fn publish(&self, topic: &str, body: Vec<u8>) -> Result<(), ClientError> {
        self.mqtt
            .publish(topic, QoS::AtLeastOnce, false, body)
            .await
            .map_err(ClientError::from)
    }
}

#[async_trait]
impl DeviceClient for MqttDeviceClient {
    fn device_id(&self) -> &str {
        &self.id
    }

    async fn find(&self) -> Result<(), ClientError> {
        self.publish(&self.topics.find, b"{}".to_vec()).await
    }

    async fn connect(&self) -> Result<(), ClientError> {
        let request = ConnectRequest {
            id: &self.id,
            key: &self.key,
            issue_get_on_connect: true,
        };
        self.publish(&self.topics.connect, serde_json::to_vec(&request)?)
            .await
    }

    async fn get(&self, options: GetOptions) -> Result<RawDataPoints, ClientError> {
        // Subscribe before asking so the answer cannot slip past.
        let mut events = self.events.subscribe();
        self.publish(&self.topics.get, serde_json::to_vec(&options)?)
            .await?;

        let answer = async {
            loop {
                match events.recv().await {
                    Ok(DeviceEvent::Data(dps)) => return Ok(dps),
                    Ok(DeviceEvent::Error(message)) => return Err(ClientError::Gateway(message)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return Err(ClientError::Closed),
                }
            }
        };

        tokio::time::timeout(self.request_timeout, answer)
            .await
            .map_err(|_| ClientError::Timeout(self.request_timeout.as_millis() as u64))?
    }

    async fn set(&self, write: &DpWrite) -> Result<(), ClientError> {
        self.publish(&self.topics.set, serde_json::to_vec(write)?)
            .await
    }

    fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }
}
