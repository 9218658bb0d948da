//! In-process configuration store.
//!
//! Besides serving the player's reads, `MemoryStore` carries the same
//! mutations the admin dashboard performs, so demos, fleet simulations and
//! tests can edit configuration while sessions are running.

use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::errors::StoreError;
use crate::model::{Device, Grid, MediaBox, MediaItem, MediaItemRecord, MAX_GRID_POSITIONS};
use crate::store::ConfigStore;

#[derive(Debug, Default)]
struct Records {
    devices: HashMap<String, Device>,
    grids: HashMap<String, Grid>,
    media_boxes: HashMap<String, MediaBox>,
    media_items: HashMap<String, MediaItemRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Records>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Records> {
        self.records.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Records> {
        self.records.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// While offline, every read fails as if the backend were unreachable.
    pub fn set_offline(&self, offline: bool) {
        info!("MemoryStore offline = {}", offline);
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Generic("backend unavailable".to_string()))
        } else {
            Ok(())
        }
    }

    /// Creates a device with `grid_count` unassigned grids at positions `1..=grid_count`.
    ///
    /// Grid ids are `<device_id>_grid_<position>`.
    pub fn create_device(
        &self,
        device_id: &str,
        location: &str,
        grid_count: u8,
    ) -> Result<Device, StoreError> {
        if grid_count == 0 || grid_count > MAX_GRID_POSITIONS {
            return Err(StoreError::Generic(format!(
                "grid count must be between 1 and {}, got {}",
                MAX_GRID_POSITIONS, grid_count
            )));
        }
        let mut records = self.write();
        if records.devices.contains_key(device_id) {
            return Err(StoreError::Generic(format!("device '{}' already exists", device_id)));
        }
        let grids: Vec<Grid> = (1..=grid_count)
            .map(|position| Grid {
                grid_id: format!("{}_grid_{}", device_id, position),
                device_id: device_id.to_string(),
                position: i64::from(position),
                media_box_id: String::new(),
            })
            .collect();
        let device = Device {
            device_id: device_id.to_string(),
            location: location.to_string(),
            grids: grids.iter().map(|g| g.grid_id.clone()).collect(),
        };
        for grid in grids {
            records.grids.insert(grid.grid_id.clone(), grid);
        }
        records.devices.insert(device_id.to_string(), device.clone());
        info!("Created device '{}' at '{}' with {} grid(s)", device_id, location, grid_count);
        Ok(device)
    }

    pub fn has_device(&self, device_id: &str) -> bool {
        self.read().devices.contains_key(device_id)
    }

    /// Deletes a device and every grid it owns.
    pub fn delete_device(&self, device_id: &str) -> bool {
        let mut records = self.write();
        let removed = records.devices.remove(device_id).is_some();
        records.grids.retain(|_, g| g.device_id != device_id);
        if removed {
            info!("Deleted device '{}' and its grids", device_id);
        }
        removed
    }

    /// Inserts or replaces a grid record as-is.
    pub fn put_grid(&self, grid: Grid) {
        self.write().grids.insert(grid.grid_id.clone(), grid);
    }

    /// Assigns a media box (or `""` to unassign) to a device's grid position.
    pub fn assign_media_box(
        &self,
        device_id: &str,
        position: u8,
        media_box_id: &str,
    ) -> Result<(), StoreError> {
        let mut records = self.write();
        let grid = records
            .grids
            .values_mut()
            .find(|g| g.device_id == device_id && g.position == i64::from(position))
            .ok_or_else(|| {
                StoreError::NotFound(format!("grid {} of device '{}'", position, device_id))
            })?;
        debug!("Grid '{}' media box '{}' -> '{}'", grid.grid_id, grid.media_box_id, media_box_id);
        grid.media_box_id = media_box_id.to_string();
        Ok(())
    }

    pub fn put_media_box(&self, media_box: MediaBox) {
        self.write().media_boxes.insert(media_box.media_box_id.clone(), media_box);
    }

    /// Adds an item to a box. Adding an existing member is a no-op.
    pub fn add_media_to_box(&self, media_box_id: &str, media_id: &str) -> Result<(), StoreError> {
        let mut records = self.write();
        let media_box = records
            .media_boxes
            .get_mut(media_box_id)
            .ok_or_else(|| StoreError::NotFound(format!("media box '{}'", media_box_id)))?;
        if !media_box.add_item(media_id) {
            debug!("Media '{}' already in box '{}'", media_id, media_box_id);
        }
        Ok(())
    }

    pub fn remove_media_from_box(
        &self,
        media_box_id: &str,
        media_id: &str,
    ) -> Result<(), StoreError> {
        let mut records = self.write();
        let media_box = records
            .media_boxes
            .get_mut(media_box_id)
            .ok_or_else(|| StoreError::NotFound(format!("media box '{}'", media_box_id)))?;
        media_box.remove_item(media_id);
        Ok(())
    }

    pub fn put_media_item(&self, item: &MediaItem) {
        self.put_media_item_record(item.to_record());
    }

    pub fn put_media_item_record(&self, record: MediaItemRecord) {
        self.write().media_items.insert(record.media_id.clone(), record);
    }

    pub fn update_media_item_duration(
        &self,
        media_id: &str,
        duration_secs: i64,
    ) -> Result<(), StoreError> {
        let mut records = self.write();
        let record = records
            .media_items
            .get_mut(media_id)
            .ok_or_else(|| StoreError::NotFound(format!("media item '{}'", media_id)))?;
        record.duration = Some(duration_secs);
        Ok(())
    }

    /// Deletes an item. Boxes that still reference it keep the dangling id.
    pub fn delete_media_item(&self, media_id: &str) -> bool {
        let removed = self.write().media_items.remove(media_id).is_some();
        if removed {
            warn!("Deleted media item '{}'; boxes referencing it will skip it", media_id);
        }
        removed
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get_device(&self, device_id: &str) -> Result<Option<Device>, StoreError> {
        self.check_online()?;
        Ok(self.read().devices.get(device_id).cloned())
    }

    async fn get_grids_for_device(&self, device_id: &str) -> Result<Vec<Grid>, StoreError> {
        self.check_online()?;
        let mut grids: Vec<Grid> = self
            .read()
            .grids
            .values()
            .filter(|g| g.device_id == device_id)
            .cloned()
            .collect();
        grids.sort_by_key(|g| g.position);
        Ok(grids)
    }

    async fn get_media_box(&self, media_box_id: &str) -> Result<Option<MediaBox>, StoreError> {
        self.check_online()?;
        Ok(self.read().media_boxes.get(media_box_id).cloned())
    }

    async fn get_media_items(&self, ids: &[String]) -> Result<Vec<MediaItemRecord>, StoreError> {
        self.check_online()?;
        let records = self.read();
        Ok(ids.iter().filter_map(|id| records.media_items.get(id).cloned()).collect())
    }
}
