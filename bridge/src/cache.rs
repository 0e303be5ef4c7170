use std::{collections::HashSet, io::ErrorKind, path::PathBuf, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use prowarm_common::DeviceState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedAccessory {
    pub uuid: String,
    pub name: String,
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(default)]
    pub state: DeviceState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessoryCache {
    #[serde(default)]
    pub accessories: Vec<CachedAccessory>,
}

impl AccessoryCache {
    pub fn find(&self, uuid: &str) -> Option<&CachedAccessory> {
        self.accessories.iter().find(|entry| entry.uuid == uuid)
    }

    pub fn upsert(&mut self, entry: CachedAccessory) {
        match self.accessories.iter_mut().find(|cached| cached.uuid == entry.uuid) {
            Some(cached) => *cached = entry,
            None => self.accessories.push(entry),
        }
    }

    pub fn retain_registered<'a>(&mut self, uuids: impl IntoIterator<Item = &'a str>) {
        let registered: HashSet<&str> = uuids.into_iter().collect();
        self.accessories
            .retain(|entry| registered.contains(entry.uuid.as_str()));
    }
}

#[derive(Clone)]
pub struct CacheStore {
    path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl CacheStore {
    pub fn new() -> Self {
        let data_dir = std::env::var("PROWARM_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.prowarm"));
        Self::at(data_dir.join("accessories.json"))
    }

    pub fn at(path: PathBuf) -> Self {
        Self {
            path: Arc::new(path),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn load(&self) -> anyhow::Result<AccessoryCache> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(self.path.as_ref()).await {
            Ok(raw) => {
                let mut cache = serde_json::from_slice::<AccessoryCache>(&raw)?;
                for entry in &mut cache.accessories {
                    entry.state.sanitize();
                }
                Ok(cache)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(AccessoryCache::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn save(&self, cache: &AccessoryCache) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let path = self.path.as_ref().clone();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(cache)?;
        tokio::fs::write(path, payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prowarm_common::{DeviceUpdate, TEMPERATURE_FLOOR_TENTHS_C};

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("prowarm-cache-{}-{name}", std::process::id()))
            .join("accessories.json")
    }

    #[tokio::test]
    async fn missing_file_loads_empty_cache() {
        let store = CacheStore::at(scratch_path("missing"));
        assert_eq!(store.load().await.unwrap(), AccessoryCache::default());
    }

    #[tokio::test]
    async fn saved_cache_loads_back() {
        let path = scratch_path("roundtrip");
        let store = CacheStore::at(path.clone());

        let mut state = DeviceState::new();
        state.apply(&DeviceUpdate {
            power_on: Some(true),
            target_temperature_tenths_c: Some(215),
            ..DeviceUpdate::default()
        });
        let mut cache = AccessoryCache::default();
        cache.upsert(CachedAccessory {
            uuid: "u1".to_string(),
            name: "Lounge".to_string(),
            device_id: "bf01".to_string(),
            state,
        });

        store.save(&cache).await.unwrap();
        let loaded = store.load().await.unwrap();
        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;

        assert_eq!(loaded, cache);
        let entry = loaded.find("u1").unwrap();
        assert!(entry.state.power_on());
        assert_eq!(entry.state.target_temperature_tenths_c(), 215);
        assert_eq!(
            entry.state.current_temperature_tenths_c(),
            TEMPERATURE_FLOOR_TENTHS_C
        );
    }

    #[test]
    fn upsert_replaces_by_uuid() {
        let mut cache = AccessoryCache::default();
        let entry = |name: &str| CachedAccessory {
            uuid: "u1".to_string(),
            name: name.to_string(),
            device_id: "bf01".to_string(),
            state: DeviceState::new(),
        };

        cache.upsert(entry("Old"));
        cache.upsert(entry("New"));

        assert_eq!(cache.accessories.len(), 1);
        assert_eq!(cache.find("u1").unwrap().name, "New");
        assert!(cache.find("u2").is_none());
    }

    #[test]
    fn unregistered_entries_are_dropped() {
        let mut cache = AccessoryCache::default();
        for uuid in ["u1", "u2", "u3"] {
            cache.upsert(CachedAccessory {
                uuid: uuid.to_string(),
                name: uuid.to_string(),
                device_id: uuid.to_string(),
                state: DeviceState::new(),
            });
        }

        cache.retain_registered(["u3", "u1"]);

        let kept: Vec<_> = cache.accessories.iter().map(|entry| entry.uuid.as_str()).collect();
        assert_eq!(kept, vec!["u1", "u3"]);
    }
}
