use std::{collections::HashSet, sync::Arc};

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use prowarm_common::{DeviceConfig, DeviceState};

use crate::{
    accessory::ThermostatAccessory,
    cache::{AccessoryCache, CachedAccessory},
    client::DeviceClient,
};

pub fn accessory_uuid(device_id: &str) -> String {
    let digest = Sha256::digest(device_id.as_bytes());
    let hex: String = digest[..16]
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

pub fn unique_devices(devices: &[DeviceConfig]) -> Vec<DeviceConfig> {
    let mut seen = HashSet::new();
    devices
        .iter()
        .filter(|device| {
            let fresh = seen.insert(device.id.clone());
            if !fresh {
                warn!("skipping duplicate device id {} ({})", device.id, device.name);
            }
            fresh
        })
        .cloned()
        .collect()
}

pub fn register(
    devices: Vec<(DeviceConfig, Arc<dyn DeviceClient>)>,
    cache: &mut AccessoryCache,
) -> Vec<Arc<ThermostatAccessory>> {
    let mut accessories = Vec::with_capacity(devices.len());

    for (device, client) in devices {
        let uuid = accessory_uuid(&device.id);
        let state = match cache.find(&uuid) {
            Some(cached) => {
                info!("Restoring existing accessory from cache: {}", cached.name);
                cached.state.clone()
            }
            None => {
                info!("Adding new accessory: {}", device.name);
                DeviceState::new()
            }
        };

        cache.upsert(CachedAccessory {
            uuid: uuid.clone(),
            name: device.name.clone(),
            device_id: device.id.clone(),
            state: state.clone(),
        });

        accessories.push(Arc::new(ThermostatAccessory::new(
            device, uuid, client, state,
        )));
    }

    cache.retain_registered(accessories.iter().map(|accessory| accessory.uuid()));
    accessories
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDeviceClient;
    use prowarm_common::{DeviceUpdate, Dialect};

    fn device(id: &str, name: &str) -> DeviceConfig {
        DeviceConfig {
            name: name.to_string(),
            id: id.to_string(),
            key: "k".to_string(),
            disable_after_seconds: None,
            dialect: Dialect::HalfDegree,
        }
    }

    fn with_client(device: DeviceConfig) -> (DeviceConfig, Arc<dyn DeviceClient>) {
        let client: Arc<dyn DeviceClient> = Arc::new(MockDeviceClient::new(&device.id));
        (device, client)
    }

    #[test]
    fn uuid_is_stable_and_distinct() {
        let first = accessory_uuid("bf01");

        assert_eq!(first, accessory_uuid("bf01"));
        assert_ne!(first, accessory_uuid("bf02"));
        assert_eq!(first.len(), 36);
        assert_eq!(first.matches('-').count(), 4);
    }

    #[test]
    fn duplicate_ids_are_skipped() {
        let devices = unique_devices(&[
            device("bf01", "Lounge"),
            device("bf02", "Hall"),
            device("bf01", "Lounge again"),
        ]);

        let names: Vec<_> = devices.iter().map(|device| device.name.as_str()).collect();
        assert_eq!(names, vec!["Lounge", "Hall"]);
    }

    #[tokio::test]
    async fn cached_accessory_restores_prior_state() {
        let mut prior = DeviceState::new();
        prior.apply(&DeviceUpdate {
            target_temperature_tenths_c: Some(205),
            ..DeviceUpdate::default()
        });
        let mut cache = AccessoryCache::default();
        cache.upsert(CachedAccessory {
            uuid: accessory_uuid("bf01"),
            name: "Lounge".to_string(),
            device_id: "bf01".to_string(),
            state: prior,
        });

        let accessories = register(
            vec![
                with_client(device("bf01", "Lounge")),
                with_client(device("bf02", "Hall")),
            ],
            &mut cache,
        );

        assert_eq!(accessories.len(), 2);
        assert_eq!(accessories[0].snapshot().await.target_temperature_c, 20.5);
        assert_eq!(accessories[1].snapshot().await.target_temperature_c, 10.0);
        assert_eq!(cache.accessories.len(), 2);
        assert!(cache.find(&accessory_uuid("bf02")).is_some());
    }

    #[test]
    fn removed_devices_leave_the_cache() {
        let mut cache = AccessoryCache::default();
        cache.upsert(CachedAccessory {
            uuid: accessory_uuid("gone"),
            name: "Attic".to_string(),
            device_id: "gone".to_string(),
            state: DeviceState::new(),
        });

        register(vec![with_client(device("bf01", "Lounge"))], &mut cache);

        assert_eq!(cache.accessories.len(), 1);
        assert!(cache.find(&accessory_uuid("gone")).is_none());
        assert!(cache.find(&accessory_uuid("bf01")).is_some());
    }
}
