use std::{sync::Arc, time::Duration};

use tokio::{
    sync::broadcast::error::RecvError,
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

use crate::{
    accessory::ThermostatAccessory,
    client::{ClientError, DeviceEvent, GetOptions},
};

pub const SYNC_INTERVAL: Duration = Duration::from_secs(5);

pub struct AccessoryTasks {
    pub events: JoinHandle<()>,
    pub sync: JoinHandle<()>,
}

pub fn start(accessory: Arc<ThermostatAccessory>) -> AccessoryTasks {
    let events = spawn_event_loop(accessory.clone());
    spawn_schema_probe(accessory.clone());
    let sync = spawn_sync_loop(accessory, SYNC_INTERVAL);
    AccessoryTasks { events, sync }
}

impl AccessoryTasks {
    pub fn abort(&self) {
        self.events.abort();
        self.sync.abort();
    }
}

pub fn spawn_event_loop(accessory: Arc<ThermostatAccessory>) -> JoinHandle<()> {
    // Subscribe before spawning so nothing published in between is missed.
    let mut events = accessory.client().subscribe();

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(DeviceEvent::Data(dps)) => {
                    accessory.apply_data_points(&dps).await;
                }
                Ok(DeviceEvent::Error(message)) => {
                    warn!("device connection error ({}): {message}", accessory.name());
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("{} dropped {skipped} device events", accessory.name());
                }
                Err(RecvError::Closed) => {
                    info!("{} event stream closed", accessory.name());
                    break;
                }
            }
        }
    })
}

fn spawn_schema_probe(accessory: Arc<ThermostatAccessory>) {
    tokio::spawn(async move {
        match accessory.client().get(GetOptions { schema: true }).await {
            Ok(dps) => debug!("{} schema: {dps:?}", accessory.name()),
            Err(err) => warn!("{} schema request failed: {err}", accessory.name()),
        }
    });
}

/// Ticks never overlap: a slow round trip delays the next tick, and the
/// interval skips whatever it missed instead of bursting.
pub fn spawn_sync_loop(accessory: Arc<ThermostatAccessory>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; the first sync runs one period in.
        interval.tick().await;

        loop {
            interval.tick().await;
            sync_tick(&accessory).await;
        }
    })
}

pub async fn sync_tick(accessory: &ThermostatAccessory) {
    match refresh(accessory).await {
        Ok(()) => accessory.record_sync_success().await,
        Err(err) => {
            warn!("error in device reconnect attempt ({}): {err}", accessory.name());
            accessory.record_sync_failure(&err).await;
        }
    }
}

async fn refresh(accessory: &ThermostatAccessory) -> Result<(), ClientError> {
    let client = accessory.client();
    client.find().await?;
    client.connect().await?;
    let dps = client.get(GetOptions::default()).await?;

    // The event handler merges the same report; merging here as well means the
    // safety check below sees this tick's power state.
    accessory.apply_data_points(&dps).await;

    accessory.enforce_safety().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDeviceClient;
    use prowarm_common::{DeviceConfig, DeviceState, Dialect, DpValue, RawDataPoints};

    fn accessory(
        disable_after_seconds: Option<u64>,
    ) -> (Arc<MockDeviceClient>, Arc<ThermostatAccessory>) {
        let client = Arc::new(MockDeviceClient::new("bf01"));
        let config = DeviceConfig {
            name: "Lounge".to_string(),
            id: "bf01".to_string(),
            key: "k".to_string(),
            disable_after_seconds,
            dialect: Dialect::HalfDegree,
        };
        let accessory = Arc::new(ThermostatAccessory::new(
            config,
            "uuid".to_string(),
            client.clone(),
            DeviceState::new(),
        ));
        (client, accessory)
    }

    fn heating_report() -> RawDataPoints {
        [
            (1, DpValue::Bool(true)),
            (2, DpValue::Integer(44)),
            (3, DpValue::Integer(40)),
            (102, DpValue::Text("1".into())),
        ]
        .into_iter()
        .collect()
    }

    async fn sleep_secs(secs: f64) {
        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_every_five_seconds() {
        let (client, accessory) = accessory(None);
        client.set_report(heating_report()).await;
        spawn_sync_loop(accessory.clone(), SYNC_INTERVAL);

        sleep_secs(4.5).await;
        assert_eq!(client.get_calls(), 0);

        sleep_secs(1.0).await;
        assert_eq!(client.get_calls(), 1);
        assert_eq!(accessory.snapshot().await.target_temperature_c, 22.0);

        sleep_secs(10.0).await;
        assert_eq!(client.get_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_tick_keeps_state_and_schedule() {
        let (client, accessory) = accessory(None);
        client.set_report(heating_report()).await;
        spawn_sync_loop(accessory.clone(), SYNC_INTERVAL);

        sleep_secs(5.5).await;
        let synced = accessory.state().await;
        assert!(synced.power_on());

        client.set_report(RawDataPoints::new()).await;
        client.fail_next(1);
        sleep_secs(5.0).await;
        assert_eq!(client.get_calls(), 2);
        assert_eq!(accessory.state().await, synced);
        assert_eq!(accessory.sync_status().await.consecutive_failures, 1);

        sleep_secs(5.0).await;
        assert_eq!(client.get_calls(), 3);
        assert_eq!(accessory.sync_status().await.consecutive_failures, 0);
        assert_eq!(accessory.state().await, synced);
    }

    #[tokio::test(start_paused = true)]
    async fn forces_power_off_after_threshold() {
        let (client, accessory) = accessory(Some(10));
        client.set_report(heating_report()).await;
        spawn_sync_loop(accessory.clone(), SYNC_INTERVAL);

        // Session observed at t=5; t=10 is 5s in.
        sleep_secs(10.5).await;
        assert!(client.writes().await.is_empty());
        assert_eq!(accessory.state().await.heating_since_ms(), Some(5_000));

        // t=15 reaches the 10s threshold.
        sleep_secs(5.0).await;
        let writes = client.writes().await;
        assert_eq!(writes.len(), 1);
        assert_eq!((writes[0].dp, &writes[0].value), (1, &DpValue::Bool(false)));
        assert_eq!(accessory.state().await.heating_since_ms(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_policy_never_forces_off() {
        let (client, accessory) = accessory(None);
        client.set_report(heating_report()).await;
        spawn_sync_loop(accessory.clone(), SYNC_INTERVAL);

        sleep_secs(30.5).await;

        assert!(client.get_calls() >= 3);
        assert!(client.writes().await.is_empty());
        assert_eq!(accessory.state().await.heating_since_ms(), None);
    }

    #[tokio::test]
    async fn event_handler_applies_pushed_reports() {
        let (client, accessory) = accessory(None);
        let handle = spawn_event_loop(accessory.clone());

        client.emit(DeviceEvent::Error("socket hang up".to_string()));
        client.emit(DeviceEvent::Data(
            [(3, DpValue::Integer(43))].into_iter().collect(),
        ));

        for _ in 0..10 {
            if accessory.snapshot().await.current_temperature_c > 10.0 {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(accessory.snapshot().await.current_temperature_c, 21.5);
        assert!(!handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn connect_failure_skips_refresh_and_safety() {
        let (client, accessory) = accessory(Some(5));
        client.set_report(heating_report()).await;
        spawn_sync_loop(accessory.clone(), SYNC_INTERVAL);

        // t=5: session starts.
        sleep_secs(5.5).await;
        let synced = accessory.state().await;
        assert_eq!(synced.heating_since_ms(), Some(5_000));

        // t=10 would force off, but the connection fails first.
        client.fail_connect_next(1);
        sleep_secs(5.0).await;
        assert_eq!(client.get_calls(), 1);
        assert!(client.writes().await.is_empty());
        assert_eq!(accessory.state().await, synced);
        assert_eq!(accessory.sync_status().await.consecutive_failures, 1);

        // t=15 runs normally.
        sleep_secs(5.0).await;
        assert_eq!(client.get_calls(), 2);
        assert_eq!(client.writes().await.len(), 1);
        assert_eq!(accessory.sync_status().await.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn find_failure_ends_tick_before_get() {
        let (client, accessory) = accessory(None);
        client.fail_find_next(1);

        sync_tick(&accessory).await;
        assert_eq!(client.get_calls(), 0);
        assert_eq!(accessory.sync_status().await.consecutive_failures, 1);

        sync_tick(&accessory).await;
        assert_eq!(client.get_calls(), 1);
        assert_eq!(accessory.sync_status().await.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn direct_tick_records_failure_without_panicking() {
        let (client, accessory) = accessory(Some(10));
        client.fail_next(1);

        sync_tick(&accessory).await;

        assert_eq!(accessory.sync_status().await.consecutive_failures, 1);
        assert_eq!(accessory.state().await, DeviceState::new());
    }
}
