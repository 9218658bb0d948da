//! Defines the core data structures used by the player.
//!
//! The `*Record` types mirror the JSON documents written by the admin
//! dashboard and are deliberately lenient. `MediaItem` is the normalized form
//! every scheduler component works with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A grid zone position, always within `1..=MAX_GRID_POSITIONS` once validated.
pub type Position = u8;

/// Largest number of independently scheduled zones a device can have.
pub const MAX_GRID_POSITIONS: Position = 8;

/// Display time for a video when the record carries none.
pub const DEFAULT_VIDEO_DURATION_SECS: i64 = 30;
/// Display time for an image when the record carries none.
pub const DEFAULT_IMAGE_DURATION_SECS: i64 = 10;

/// A TV or other display device.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_id: String,
    #[serde(default)]
    pub location: String,
    /// Grid ids in display order; the count determines the layout.
    #[serde(default)]
    pub grids: Vec<String>,
}

/// One zone of a device's screen.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Grid {
    pub grid_id: String,
    #[serde(default)]
    pub device_id: String,
    /// Raw position as stored; see [`Grid::zone_position`].
    #[serde(default = "default_position")]
    pub position: i64,
    /// Empty when no media box is assigned.
    #[serde(default)]
    pub media_box_id: String,
}

fn default_position() -> i64 {
    1
}

impl Grid {
    pub fn is_valid_position(position: i64) -> bool {
        (1..=i64::from(MAX_GRID_POSITIONS)).contains(&position)
    }

    /// The validated position, or `None` if the stored value is out of range.
    pub fn zone_position(&self) -> Option<Position> {
        if Self::is_valid_position(self.position) {
            Position::try_from(self.position).ok()
        } else {
            None
        }
    }

    /// The assigned media box id, `None` when unassigned.
    pub fn assigned_box(&self) -> Option<&str> {
        let id = self.media_box_id.trim();
        if id.is_empty() { None } else { Some(id) }
    }
}

/// A named collection of media item ids.
///
/// Membership order is not playback order; playlists are re-sorted by filename.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MediaBox {
    pub media_box_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub media_items: Vec<String>,
}

impl MediaBox {
    /// Adds `media_id` unless it is already a member. Returns whether it was added.
    pub fn add_item(&mut self, media_id: &str) -> bool {
        if self.media_items.iter().any(|id| id == media_id) {
            return false;
        }
        self.media_items.push(media_id.to_string());
        true
    }

    /// Removes every occurrence of `media_id`. Returns whether anything was removed.
    pub fn remove_item(&mut self, media_id: &str) -> bool {
        let before = self.media_items.len();
        self.media_items.retain(|id| id != media_id);
        before != self.media_items.len()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Image,
}

impl MediaType {
    /// Parses a stored type string; `None` for anything unrecognized.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "video" => Some(MediaType::Video),
            "image" => Some(MediaType::Image),
            _ => None,
        }
    }

    /// Infers the type from a file extension, defaulting to image.
    pub fn from_filename(filename: &str) -> Self {
        let ext = filename.rsplit_once('.').map(|(_, e)| e.to_lowercase()).unwrap_or_default();
        match ext.as_str() {
            "mp4" | "avi" | "mov" | "mkv" | "webm" => MediaType::Video,
            _ => MediaType::Image,
        }
    }

    pub fn default_duration_secs(self) -> i64 {
        match self {
            MediaType::Video => DEFAULT_VIDEO_DURATION_SECS,
            MediaType::Image => DEFAULT_IMAGE_DURATION_SECS,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    #[default]
    Pending,
    Downloading,
    Completed,
    Failed,
}

impl DownloadStatus {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "downloading" => DownloadStatus::Downloading,
            "completed" => DownloadStatus::Completed,
            "failed" => DownloadStatus::Failed,
            _ => DownloadStatus::Pending,
        }
    }
}

/// A media item document exactly as the admin backend stores it.
///
/// Older uploads carry `fileName` instead of `filename`, and some records
/// lack a type or duration altogether.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MediaItemRecord {
    pub media_id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(rename = "fileName", default, skip_serializing_if = "Option::is_none")]
    pub legacy_file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_local: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_status: Option<String>,
}

/// A playable asset with every optional field resolved.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct MediaItem {
    pub media_id: String,
    pub media_type: MediaType,
    /// Playback sort key.
    pub filename: String,
    pub url: String,
    /// Seconds the item stays current, as stored. May be invalid (<= 0);
    /// zones clamp it when scheduling.
    pub duration_secs: i64,
    pub file_size: Option<u64>,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub local_path: Option<String>,
    pub is_local: bool,
    pub download_status: DownloadStatus,
}

impl MediaItem {
    /// Builds a normalized item directly, using the type's default duration.
    pub fn new(media_id: &str, media_type: MediaType, filename: &str, url: &str) -> Self {
        Self {
            media_id: media_id.to_string(),
            media_type,
            filename: filename.to_string(),
            url: url.to_string(),
            duration_secs: media_type.default_duration_secs(),
            file_size: None,
            uploaded_at: None,
            local_path: None,
            is_local: false,
            download_status: DownloadStatus::Pending,
        }
    }

    pub fn with_duration(mut self, secs: i64) -> Self {
        self.duration_secs = secs;
        self
    }

    pub fn is_video(&self) -> bool {
        self.media_type == MediaType::Video
    }

    /// Converts back into the stored document shape.
    pub fn to_record(&self) -> MediaItemRecord {
        MediaItemRecord {
            media_id: self.media_id.clone(),
            type_: Some(match self.media_type {
                MediaType::Video => "video".to_string(),
                MediaType::Image => "image".to_string(),
            }),
            filename: Some(self.filename.clone()),
            legacy_file_name: None,
            url: Some(self.url.clone()),
            duration: Some(self.duration_secs),
            file_size: self.file_size,
            uploaded_at: self.uploaded_at.map(|t| t.to_rfc3339()),
            local_path: self.local_path.clone(),
            is_local: Some(self.is_local),
            download_status: Some(
                match self.download_status {
                    DownloadStatus::Pending => "pending",
                    DownloadStatus::Downloading => "downloading",
                    DownloadStatus::Completed => "completed",
                    DownloadStatus::Failed => "failed",
                }
                .to_string(),
            ),
        }
    }
}

/// Screen arrangement chosen from the number of zones.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridLayout {
    Single,
    Two,
    Three,
    Four,
    Six,
    Eight,
    /// Unsupported zone counts fall back to a single column of `n` zones.
    Custom(usize),
}

impl GridLayout {
    pub fn for_zone_count(count: usize) -> Self {
        match count {
            1 => GridLayout::Single,
            2 => GridLayout::Two,
            3 => GridLayout::Three,
            4 => GridLayout::Four,
            6 => GridLayout::Six,
            8 => GridLayout::Eight,
            n => GridLayout::Custom(n),
        }
    }
}

/// Overall state of a device session, surfaced to the renderer.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionState {
    /// Initial state: nothing loaded yet.
    Connecting,
    /// Zones are scheduled and playing.
    Running,
    /// The device id is unknown to the backend. Persistent until a refresh succeeds.
    DeviceNotConfigured(String),
    /// The last load failed; any previously running schedule keeps playing.
    Error(String),
}

impl SessionState {
    /// The human-readable banner text, if the state is an error.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            SessionState::DeviceNotConfigured(msg) | SessionState::Error(msg) => Some(msg),
            _ => None,
        }
    }
}
