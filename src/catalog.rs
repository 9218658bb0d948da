//! Fetches and indexes the media a device's zones need.
//!
//! Each distinct media box is fetched once, however many zones show it, and
//! all referenced items are then fetched in a single batched lookup. Raw item
//! records are normalized here so nothing downstream deals with missing
//! fields.

use chrono::{DateTime, Utc};
use log::{debug, info, trace, warn};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::model::{DownloadStatus, Grid, MediaBox, MediaItem, MediaItemRecord, MediaType, Position};
use crate::store::ConfigStore;

/// What a zone gets to play after a catalog load.
#[derive(Clone, Debug, PartialEq)]
pub enum ZoneMedia {
    /// The box's resolvable items, in membership order (possibly none).
    Items(Vec<MediaItem>),
    /// The backend read for this zone failed; the previous playlist should be kept.
    Unavailable,
}

/// In-memory index of the boxes and items referenced by a set of grids.
#[derive(Debug, Default)]
pub struct MediaCatalog {
    boxes: HashMap<String, MediaBox>,
    items: HashMap<String, MediaItem>,
    failed_boxes: HashSet<String>,
}

impl MediaCatalog {
    /// Fetches every box referenced by `grids` and the items they list.
    ///
    /// Never fails as a whole: a box whose read fails (or whose items could
    /// not be fetched) is recorded as failed and only its zones degrade.
    pub async fn fetch(store: &dyn ConfigStore, grids: &[Grid]) -> Self {
        let box_ids: BTreeSet<&str> = grids.iter().filter_map(Grid::assigned_box).collect();
        let mut catalog = MediaCatalog::default();

        for box_id in box_ids {
            match store.get_media_box(box_id).await {
                Ok(Some(media_box)) => {
                    trace!(
                        "Fetched media box '{}' with {} member(s)",
                        box_id,
                        media_box.media_items.len()
                    );
                    catalog.boxes.insert(box_id.to_string(), media_box);
                }
                Ok(None) => {
                    warn!("Media box '{}' is assigned to a grid but does not exist", box_id)
                }
                Err(e) => {
                    warn!("Failed to fetch media box '{}': {}", box_id, e);
                    catalog.failed_boxes.insert(box_id.to_string());
                }
            }
        }

        let mut wanted: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for media_box in catalog.boxes.values() {
            for id in &media_box.media_items {
                if seen.insert(id.as_str()) {
                    wanted.push(id.clone());
                }
            }
        }
        if wanted.is_empty() {
            return catalog;
        }

        match store.get_media_items(&wanted).await {
            Ok(records) => {
                for record in records {
                    let item = normalize(record);
                    catalog.items.insert(item.media_id.clone(), item);
                }
                let dangling = wanted.len().saturating_sub(catalog.items.len());
                if dangling > 0 {
                    warn!(
                        "{} media item reference(s) did not resolve and will be skipped",
                        dangling
                    );
                }
                debug!(
                    "Catalog holds {} box(es) and {} item(s)",
                    catalog.boxes.len(),
                    catalog.items.len()
                );
            }
            Err(e) => {
                warn!("Failed to fetch {} media item(s): {}", wanted.len(), e);
                let affected: Vec<String> = catalog
                    .boxes
                    .values()
                    .filter(|b| !b.media_items.is_empty())
                    .map(|b| b.media_box_id.clone())
                    .collect();
                catalog.failed_boxes.extend(affected);
            }
        }
        catalog
    }

    /// Media for one box id, with dangling references dropped.
    pub fn media_for_box(&self, media_box_id: &str) -> ZoneMedia {
        if self.failed_boxes.contains(media_box_id) {
            return ZoneMedia::Unavailable;
        }
        let Some(media_box) = self.boxes.get(media_box_id) else {
            return ZoneMedia::Items(Vec::new());
        };
        ZoneMedia::Items(
            media_box
                .media_items
                .iter()
                .filter_map(|id| self.items.get(id).cloned())
                .collect(),
        )
    }

    /// Media for each valid grid position. Unassigned grids get no items.
    pub fn media_by_position(&self, grids: &[Grid]) -> BTreeMap<Position, ZoneMedia> {
        grids
            .iter()
            .filter_map(|grid| {
                let position = grid.zone_position()?;
                let media = match grid.assigned_box() {
                    Some(box_id) => self.media_for_box(box_id),
                    None => ZoneMedia::Items(Vec::new()),
                };
                Some((position, media))
            })
            .collect()
    }
}

/// Fetches and maps media for `grids` in one step.
pub async fn load(store: &dyn ConfigStore, grids: &[Grid]) -> BTreeMap<Position, ZoneMedia> {
    let catalog = MediaCatalog::fetch(store, grids).await;
    let media = catalog.media_by_position(grids);
    info!(
        "Loaded media for {} zone(s), {} unavailable",
        media.len(),
        media.values().filter(|m| **m == ZoneMedia::Unavailable).count()
    );
    media
}

/// Resolves a raw record's optional and legacy fields into a [`MediaItem`].
pub fn normalize(record: MediaItemRecord) -> MediaItem {
    let filename = record
        .filename
        .filter(|f| !f.trim().is_empty())
        .or_else(|| record.legacy_file_name.filter(|f| !f.trim().is_empty()))
        .or_else(|| {
            record
                .url
                .as_deref()
                .and_then(|u| u.split('?').next())
                .and_then(|u| u.rsplit('/').next())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| record.media_id.clone());

    // Absent type means image; an unrecognized one is guessed from the extension.
    let media_type = match record.type_.as_deref() {
        None => MediaType::Image,
        Some(raw) => MediaType::parse(raw).unwrap_or_else(|| MediaType::from_filename(&filename)),
    };

    let uploaded_at = record
        .uploaded_at
        .as_deref()
        .and_then(|raw| match DateTime::parse_from_rfc3339(raw) {
            Ok(t) => Some(t.with_timezone(&Utc)),
            Err(e) => {
                debug!("Ignoring unparseable uploadedAt '{}' on '{}': {}", raw, record.media_id, e);
                None
            }
        });

    MediaItem {
        duration_secs: record.duration.unwrap_or_else(|| media_type.default_duration_secs()),
        media_type,
        filename,
        url: record.url.unwrap_or_default(),
        file_size: record.file_size,
        uploaded_at,
        local_path: record.local_path,
        is_local: record.is_local.unwrap_or(false),
        download_status: record
            .download_status
            .as_deref()
            .map(DownloadStatus::parse)
            .unwrap_or_default(),
        media_id: record.media_id,
    }
}
