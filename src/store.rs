//! The read interface the player needs from a configuration backend.
//!
//! Backends: [`crate::http_store::HttpJsonStore`] for the dashboard's JSON
//! files and [`crate::memory_store::MemoryStore`] for demos and tests.

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::model::{Device, Grid, MediaBox, MediaItemRecord};

/// Reads device configuration records by id.
///
/// "Not found" is a normal answer (`Ok(None)` / absent from a list); `Err` is
/// reserved for the backend being unreachable or returning garbage.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_device(&self, device_id: &str) -> Result<Option<Device>, StoreError>;

    async fn get_grids_for_device(&self, device_id: &str) -> Result<Vec<Grid>, StoreError>;

    async fn get_media_box(&self, media_box_id: &str) -> Result<Option<MediaBox>, StoreError>;

    /// Batched lookup. Ids with no matching record are simply absent.
    async fn get_media_items(&self, ids: &[String]) -> Result<Vec<MediaItemRecord>, StoreError>;
}
