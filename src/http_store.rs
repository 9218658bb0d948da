//! Reads device configuration from the admin dashboard's JSON record files.
//!
//! The dashboard keeps one JSON array per collection (`devices.json`,
//! `grids.json`, `media-boxes.json`, `media-items.json`) under a common base
//! URL, typically a raw GitHub path. Every read fetches the whole file; a
//! missing file (404) counts as an empty collection, matching how the
//! dashboard treats a fresh tenant.

use async_trait::async_trait;
use log::{debug, error, info, trace, warn};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::time::Duration;

use crate::errors::StoreError;
use crate::model::{Device, Grid, MediaBox, MediaItemRecord};
use crate::store::ConfigStore;

pub const DEVICES_FILE: &str = "devices.json";
pub const GRIDS_FILE: &str = "grids.json";
pub const MEDIA_BOXES_FILE: &str = "media-boxes.json";
pub const MEDIA_ITEMS_FILE: &str = "media-items.json";

/// HTTP-backed [`ConfigStore`].
#[derive(Clone, Debug)]
pub struct HttpJsonStore {
    client: Client,
    data_url: String,
    api_token: Option<String>,
}

impl HttpJsonStore {
    /// Builds a store reading from `data_url` with the given request timeout.
    #[must_use = "building the HTTP client can fail; the Result must be handled"]
    pub fn new(
        data_url: &str,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, data_url, api_token))
    }

    pub fn with_client(client: Client, data_url: &str, api_token: Option<String>) -> Self {
        Self {
            client,
            data_url: data_url.trim_end_matches('/').to_string(),
            api_token,
        }
    }

    fn url_for(&self, file: &str) -> String {
        format!("{}/{}", self.data_url, file)
    }

    /// Fetches and parses one collection file.
    async fn fetch_collection<T: DeserializeOwned>(
        &self,
        file: &str,
    ) -> Result<Vec<T>, StoreError> {
        let url = self.url_for(file);
        debug!("Fetching collection '{}' from {}", file, url);
        let mut request = self.client.get(&url).header(ACCEPT, "application/json");
        if let Some(token) = &self.api_token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let response = request.send().await.map_err(|e| {
            error!("Request error fetching '{}': {:?}", url, e);
            StoreError::Http(e)
        })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            warn!("Collection '{}' not found at {}; treating it as empty", file, url);
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("N/A (failed to read body: {})", e));
            error!("HTTP error fetching '{}': {} - {}", url, status, body);
            return Err(StoreError::HttpStatus {
                status,
                message: format!("GET {} failed: {}", file, body),
            });
        }

        let bytes = response.bytes().await?;
        let records = serde_json::from_slice::<Vec<T>>(&bytes).map_err(|e| {
            error!("Failed to parse '{}': {}", file, e);
            StoreError::Json(e)
        })?;
        trace!("Collection '{}' holds {} record(s)", file, records.len());
        Ok(records)
    }
}

#[async_trait]
impl ConfigStore for HttpJsonStore {
    async fn get_device(&self, device_id: &str) -> Result<Option<Device>, StoreError> {
        let devices: Vec<Device> = self.fetch_collection(DEVICES_FILE).await?;
        let device = devices.into_iter().find(|d| d.device_id == device_id);
        match &device {
            Some(d) => info!(
                "Fetched device '{}' ({} grid id(s), location '{}')",
                d.device_id,
                d.grids.len(),
                d.location
            ),
            None => warn!("Device '{}' not present in {}", device_id, DEVICES_FILE),
        }
        Ok(device)
    }

    async fn get_grids_for_device(&self, device_id: &str) -> Result<Vec<Grid>, StoreError> {
        let grids: Vec<Grid> = self.fetch_collection(GRIDS_FILE).await?;
        let mut grids: Vec<Grid> = grids.into_iter().filter(|g| g.device_id == device_id).collect();
        grids.sort_by_key(|g| g.position);
        debug!("Device '{}' has {} grid(s)", device_id, grids.len());
        Ok(grids)
    }

    async fn get_media_box(&self, media_box_id: &str) -> Result<Option<MediaBox>, StoreError> {
        let boxes: Vec<MediaBox> = self.fetch_collection(MEDIA_BOXES_FILE).await?;
        Ok(boxes.into_iter().find(|b| b.media_box_id == media_box_id))
    }

    async fn get_media_items(&self, ids: &[String]) -> Result<Vec<MediaItemRecord>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let items: Vec<MediaItemRecord> = self.fetch_collection(MEDIA_ITEMS_FILE).await?;
        let found: Vec<MediaItemRecord> = items
            .into_iter()
            .filter(|i| wanted.contains(i.media_id.as_str()))
            .collect();
        debug!("Resolved {} of {} requested media item id(s)", found.len(), wanted.len());
        Ok(found)
    }
}
