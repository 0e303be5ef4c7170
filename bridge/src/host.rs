use std::{io::ErrorKind, net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

use prowarm_common::BridgeConfig;

use crate::{
    api::{self, AppState},
    cache::{CacheStore, CachedAccessory},
    client::DeviceClient,
    mqtt::MqttHub,
    platform, sync,
};

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut config = load_config().await?;
    apply_env_overrides(&mut config);

    let store = CacheStore::new();
    let mut cache = store.load().await.context("failed to load accessory cache")?;

    let (hub, eventloop) = MqttHub::new(&config.mqtt, config.request_timeout_ms);
    hub.subscribe_topics()
        .await
        .context("failed to queue gateway subscriptions")?;
    hub.spawn_event_loop(eventloop);

    let mut devices = Vec::new();
    for device in platform::unique_devices(&config.devices) {
        let client: Arc<dyn DeviceClient> = hub.device(&device).await;
        devices.push((device, client));
    }

    let accessories = platform::register(devices, &mut cache);
    if let Err(err) = store.save(&cache).await {
        warn!("failed to save accessory cache: {err:#}");
    }

    let tasks: Vec<_> = accessories.iter().cloned().map(sync::start).collect();

    let app = api::router(AppState::new(accessories.clone()));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind bridge server at {addr}"))?;

    info!(
        "bridge listening on http://{addr} with {} accessories",
        accessories.len()
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for task in &tasks {
        task.abort();
    }
    for accessory in &accessories {
        cache.upsert(CachedAccessory {
            uuid: accessory.uuid().to_string(),
            name: accessory.name().to_string(),
            device_id: accessory.id().to_string(),
            state: accessory.state().await,
        });
    }
    cache.retain_registered(accessories.iter().map(|accessory| accessory.uuid()));
    store
        .save(&cache)
        .await
        .context("failed to save accessory cache on shutdown")?;
    info!("bridge stopped");
    Ok(())
}

async fn load_config() -> anyhow::Result<BridgeConfig> {
    let path = std::env::var("PROWARM_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./config.json"));

    match tokio::fs::read(&path).await {
        Ok(raw) => BridgeConfig::from_json(&raw)
            .with_context(|| format!("invalid config at {}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            warn!("no config at {}, starting without devices", path.display());
            Ok(BridgeConfig::default())
        }
        Err(err) => {
            Err(err).with_context(|| format!("failed to read config at {}", path.display()))
        }
    }
}

fn apply_env_overrides(config: &mut BridgeConfig) {
    if let Ok(host) = std::env::var("MQTT_HOST") {
        config.mqtt.host = host;
    }
    if let Some(port) = env_port("MQTT_PORT") {
        config.mqtt.port = port;
    }
    if let Ok(user) = std::env::var("MQTT_USER") {
        config.mqtt.user = user;
    }
    if let Ok(pass) = std::env::var("MQTT_PASS") {
        config.mqtt.pass = pass;
    }
    if let Some(port) = env_port("BRIDGE_HTTP_PORT") {
        config.http_port = port;
    }
}

fn env_port(name: &str) -> Option<u16> {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .filter(|port| *port != 0)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
