use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};

use prowarm_common::{DpWrite, RawDataPoints};

use crate::client::{ClientError, DeviceClient, DeviceEvent, GetOptions};

pub struct MockDeviceClient {
    id: String,
    events: broadcast::Sender<DeviceEvent>,
    report: Mutex<RawDataPoints>,
    writes: Mutex<Vec<DpWrite>>,
    get_calls: AtomicU32,
    get_failures: AtomicU32,
    find_failures: AtomicU32,
    connect_failures: AtomicU32,
    fail_writes: AtomicBool,
}

impl MockDeviceClient {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            events: broadcast::channel(16).0,
            report: Mutex::new(RawDataPoints::new()),
            writes: Mutex::new(Vec::new()),
            get_calls: AtomicU32::new(0),
            get_failures: AtomicU32::new(0),
            find_failures: AtomicU32::new(0),
            connect_failures: AtomicU32::new(0),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub async fn set_report(&self, dps: RawDataPoints) {
        *self.report.lock().await = dps;
    }

    pub async fn writes(&self) -> Vec<DpWrite> {
        self.writes.lock().await.clone()
    }

    pub fn get_calls(&self) -> u32 {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, count: u32) {
        self.get_failures.store(count, Ordering::SeqCst);
    }

    pub fn fail_find_next(&self, count: u32) {
        self.find_failures.store(count, Ordering::SeqCst);
    }

    pub fn fail_connect_next(&self, count: u32) {
        self.connect_failures.store(count, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn emit(&self, event: DeviceEvent) {
        let _ = self.events.send(event);
    }

    fn take_failure(
        counter: &AtomicU32,
        err: impl FnOnce() -> ClientError,
    ) -> Result<(), ClientError> {
        let injected = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if injected {
            Err(err())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DeviceClient for MockDeviceClient {
    fn device_id(&self) -> &str {
        &self.id
    }

    async fn find(&self) -> Result<(), ClientError> {
        Self::take_failure(&self.find_failures, || {
            ClientError::Gateway("device not found".to_string())
        })
    }

    async fn connect(&self) -> Result<(), ClientError> {
        Self::take_failure(&self.connect_failures, || {
            ClientError::Gateway("connection refused".to_string())
        })
    }

    async fn get(&self, _options: GetOptions) -> Result<RawDataPoints, ClientError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        Self::take_failure(&self.get_failures, || ClientError::Timeout(5_000))?;
        Ok(self.report.lock().await.clone())
    }

    async fn set(&self, write: &DpWrite) -> Result<(), ClientError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ClientError::Gateway("write rejected".to_string()));
        }
        self.writes.lock().await.push(write.clone());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }
}
