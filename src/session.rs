//! Ties a device id to a live [`GridScheduler`].
//!
//! A session loads the device, its grids and their media, configures the
//! scheduler and republishes whenever [`DeviceSession::refresh`] picks up a
//! configuration change. Load failures never reach the zone timers; they are
//! turned into a persistent [`SessionState`] banner instead.

use log::{debug, error, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::catalog;
use crate::errors::StoreError;
use crate::grid::{GridScheduler, Snapshot};
use crate::model::{Device, Grid, GridLayout, SessionState};
use crate::store::ConfigStore;
use crate::zone::ZoneEvent;

const EVENT_CHANNEL_CAPACITY: usize = 256;

pub struct DeviceSession {
    device_id: String,
    store: Arc<dyn ConfigStore>,
    state: SessionState,
    device: Option<Device>,
    scheduler: Option<GridScheduler>,
    events: broadcast::Sender<ZoneEvent>,
}

impl DeviceSession {
    pub fn new(device_id: &str, store: Arc<dyn ConfigStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            device_id: device_id.to_string(),
            store,
            state: SessionState::Connecting,
            device: None,
            scheduler: None,
            events,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Runs the first load. Equivalent to [`DeviceSession::refresh`].
    pub async fn start(&mut self) -> &SessionState {
        info!("Starting session for device '{}'", self.device_id);
        self.refresh().await
    }

    /// Re-runs the full load-and-configure sequence.
    ///
    /// - Device not found, or no grids: the schedule is torn down and the
    ///   state becomes [`SessionState::DeviceNotConfigured`].
    /// - Backend failure while reading the device or grids: the state becomes
    ///   [`SessionState::Error`] and any running schedule keeps playing.
    /// - Media box or item reads failing: the affected zones keep their
    ///   last-known playlist (or start empty) and the state becomes
    ///   [`SessionState::Error`] naming those zones.
    /// - Otherwise zones are (re)configured and the state is `Running`.
    pub async fn refresh(&mut self) -> &SessionState {
        debug!("Refreshing device '{}'", self.device_id);
        match self.load().await {
            Ok(Some((device, grids))) => {
                let media = catalog::load(self.store.as_ref(), &grids).await;
                let events = self.events.clone();
                let scheduler = self.scheduler.get_or_insert_with(|| GridScheduler::new(events));
                let summary = scheduler.configure(&grids, &media);
                info!(
                    "Device '{}' configured: {} zone(s), created {:?}, restarted {:?}, \
                     updated {:?}, unchanged {:?}, stale {:?}, removed {:?}",
                    device.device_id,
                    scheduler.zone_count(),
                    summary.created,
                    summary.reconfigured,
                    summary.updated,
                    summary.unchanged,
                    summary.kept_stale,
                    summary.removed
                );
                self.device = Some(device);
                self.state = if summary.kept_stale.is_empty() {
                    SessionState::Running
                } else {
                    // Zones keep playing; the banner stays until a clean refresh.
                    let message = format!(
                        "Failed to load media for zone(s) {:?}; showing last-known content",
                        summary.kept_stale
                    );
                    error!("{}", message);
                    SessionState::Error(message)
                };
            }
            Ok(None) => {
                self.teardown();
                let message = format!(
                    "Device '{}' not found. Please configure this device in the admin dashboard.",
                    self.device_id
                );
                warn!("{}", message);
                self.state = SessionState::DeviceNotConfigured(message);
            }
            Err(e) => {
                let message = format!("Failed to load device data: {}", e);
                error!("{}", message);
                if self.scheduler.is_some() {
                    warn!("Keeping the last-known schedule for device '{}'", self.device_id);
                }
                self.state = SessionState::Error(message);
            }
        }
        &self.state
    }

    /// Reads the device and its usable grids. `Ok(None)` means "not configured".
    async fn load(&self) -> Result<Option<(Device, Vec<Grid>)>, StoreError> {
        let Some(device) = self.store.get_device(&self.device_id).await? else {
            return Ok(None);
        };
        let mut grids = self.store.get_grids_for_device(&self.device_id).await?;
        grids.retain(|grid| {
            let valid = grid.zone_position().is_some();
            if !valid {
                warn!(
                    "Dropping grid '{}' with out-of-range position {}",
                    grid.grid_id, grid.position
                );
            }
            valid
        });
        if grids.is_empty() {
            warn!("Device '{}' exists but has no usable grids", self.device_id);
            return Ok(None);
        }
        grids.sort_by_key(|g| g.position);
        let contiguous = grids.iter().enumerate().all(|(i, g)| g.position == i as i64 + 1);
        if !contiguous {
            warn!(
                "Device '{}' grid positions {:?} are not contiguous from 1",
                self.device_id,
                grids.iter().map(|g| g.position).collect::<Vec<_>>()
            );
        }
        Ok(Some((device, grids)))
    }

    fn teardown(&mut self) {
        if let Some(mut scheduler) = self.scheduler.take() {
            info!("Stopping {} zone(s) for device '{}'", scheduler.zone_count(), self.device_id);
            scheduler.stop();
        }
        self.device = None;
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Banner text while the session is in an error state.
    pub fn error_message(&self) -> Option<&str> {
        self.state.error_message()
    }

    pub fn device(&self) -> Option<&Device> {
        self.device.as_ref()
    }

    /// Current item per zone; empty when no schedule is running.
    pub fn snapshot(&self) -> Snapshot {
        self.scheduler.as_ref().map(GridScheduler::snapshot).unwrap_or_default()
    }

    pub fn layout(&self) -> Option<GridLayout> {
        self.scheduler.as_ref().map(GridScheduler::layout)
    }

    pub fn scheduler_mut(&mut self) -> Option<&mut GridScheduler> {
        self.scheduler.as_mut()
    }

    /// Receives a [`ZoneEvent`] every time a zone's current item changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ZoneEvent> {
        self.events.subscribe()
    }

    /// Refreshes every `interval` until `shutdown` resolves, then stops all zones.
    pub async fn run_polling<F>(&mut self, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; the session was just started.
        ticker.tick().await;
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested for device '{}'", self.device_id);
                    break;
                }
                _ = ticker.tick() => {
                    self.refresh().await;
                }
            }
        }
        self.shutdown();
    }

    /// Cancels every zone timer. The session can be restarted with `refresh`.
    pub fn shutdown(&mut self) {
        self.teardown();
        self.state = SessionState::Connecting;
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::memory_store::MemoryStore;
    use crate::model::{MediaBox, MediaItem, MediaItemRecord, MediaType};

    fn populate(store: &MemoryStore) {
        store.create_device("tv_001", "Lobby", 1).unwrap();
        store.put_media_item(&MediaItem::new("m1", MediaType::Image, "one.png", "u"));
        store.put_media_box(MediaBox {
            media_box_id: "box".into(),
            name: "Box".into(),
            media_items: vec!["m1".into()],
        });
        store.assign_media_box("tv_001", 1, "box").unwrap();
    }

    fn store_with_device() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        populate(&store);
        store
    }

    /// Device and grid reads succeed; media box reads fail on demand.
    #[derive(Default)]
    struct BoxOutageStore {
        inner: MemoryStore,
        boxes_down: AtomicBool,
    }

    #[async_trait]
    impl ConfigStore for BoxOutageStore {
        async fn get_device(&self, device_id: &str) -> Result<Option<Device>, StoreError> {
            self.inner.get_device(device_id).await
        }
        async fn get_grids_for_device(&self, device_id: &str) -> Result<Vec<Grid>, StoreError> {
            self.inner.get_grids_for_device(device_id).await
        }
        async fn get_media_box(&self, media_box_id: &str) -> Result<Option<MediaBox>, StoreError> {
            if self.boxes_down.load(Ordering::SeqCst) {
                return Err(StoreError::Generic("connection reset".into()));
            }
            self.inner.get_media_box(media_box_id).await
        }
        async fn get_media_items(
            &self,
            ids: &[String],
        ) -> Result<Vec<MediaItemRecord>, StoreError> {
            self.inner.get_media_items(ids).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_device_is_not_configured() {
        let store = Arc::new(MemoryStore::new());
        let mut session = DeviceSession::new("tv_missing", store);
        let state = session.start().await.clone();
        assert!(matches!(state, SessionState::DeviceNotConfigured(_)));
        assert!(session.error_message().unwrap().contains("tv_missing"));
        assert!(session.snapshot().is_empty());
        assert_eq!(session.layout(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn device_without_grids_is_not_configured() {
        let store = Arc::new(MemoryStore::new());
        store.create_device("tv_001", "Lobby", 1).unwrap();
        store.put_grid(Grid {
            grid_id: "tv_001_grid_1".into(),
            device_id: "tv_001".into(),
            position: 11,
            media_box_id: String::new(),
        });
        let mut session = DeviceSession::new("tv_001", store);
        assert!(matches!(session.start().await, SessionState::DeviceNotConfigured(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn backend_outage_keeps_last_known_snapshot() {
        let store = store_with_device();
        let mut session = DeviceSession::new("tv_001", store.clone());
        assert_eq!(session.start().await, &SessionState::Running);

        store.set_offline(true);
        assert!(matches!(session.refresh().await, SessionState::Error(_)));
        assert_eq!(session.snapshot()[&1].as_ref().unwrap().media_id, "m1");

        store.set_offline(false);
        assert_eq!(session.refresh().await, &SessionState::Running);
        assert_eq!(session.error_message(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn media_box_outage_is_reported_while_zones_keep_playing() {
        let store = Arc::new(BoxOutageStore::default());
        populate(&store.inner);
        let mut session = DeviceSession::new("tv_001", store.clone());
        assert_eq!(session.start().await, &SessionState::Running);

        store.boxes_down.store(true, Ordering::SeqCst);
        assert!(matches!(session.refresh().await, SessionState::Error(_)));
        assert!(session.error_message().unwrap().contains("[1]"));
        assert_eq!(session.snapshot()[&1].as_ref().unwrap().media_id, "m1");

        store.boxes_down.store(false, Ordering::SeqCst);
        assert_eq!(session.refresh().await, &SessionState::Running);
        assert_eq!(session.error_message(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn media_box_outage_on_first_load_starts_zones_empty() {
        let store = Arc::new(BoxOutageStore::default());
        populate(&store.inner);
        store.boxes_down.store(true, Ordering::SeqCst);
        let mut session = DeviceSession::new("tv_001", store);
        assert!(matches!(session.start().await, SessionState::Error(_)));
        assert!(session.error_message().is_some());
        assert_eq!(session.snapshot().get(&1), Some(&None));
        assert_eq!(session.layout(), Some(GridLayout::Single));
    }

    #[tokio::test(start_paused = true)]
    async fn deleting_the_device_tears_down_the_schedule() {
        let store = store_with_device();
        let mut session = DeviceSession::new("tv_001", store.clone());
        session.start().await;
        store.delete_device("tv_001");
        assert!(matches!(session.refresh().await, SessionState::DeviceNotConfigured(_)));
        assert!(session.snapshot().is_empty());
        assert!(session.device().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn polling_picks_up_reassignment_and_stops_on_shutdown() {
        let store = store_with_device();
        store.put_media_item(&MediaItem::new("m2", MediaType::Image, "two.png", "u"));
        store.put_media_box(MediaBox {
            media_box_id: "other".into(),
            name: "Other".into(),
            media_items: vec!["m2".into()],
        });
        let mut session = DeviceSession::new("tv_001", store.clone());
        session.start().await;
        let mut events = session.subscribe();

        store.assign_media_box("tv_001", 1, "other").unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let watcher = tokio::spawn(async move {
            loop {
                let event = events.recv().await.unwrap();
                if event.item.as_ref().map(|i| i.media_id.as_str()) == Some("m2") {
                    let _ = stop_tx.send(());
                    return event;
                }
            }
        });
        session
            .run_polling(Duration::from_secs(30), async {
                let _ = stop_rx.await;
            })
            .await;
        let event = watcher.await.unwrap();
        assert_eq!(event.position, 1);
        assert_eq!(session.state(), &SessionState::Connecting);
        assert!(session.snapshot().is_empty());
    }
}
