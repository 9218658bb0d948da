//! Playback scheduling for a single grid zone.
//!
//! [`ZoneState`] is the pure round-robin state machine. [`ZoneScheduler`]
//! wraps it with a Tokio timer task that advances the zone after each item's
//! duration. Videos and images are timed the same way: `duration_secs` is a
//! scheduling input only, and the scheduler never asks a media player whether
//! playback actually finished.
//!
//! Every timer task carries the generation it was started for. Reconfiguring
//! or manually advancing a zone bumps the generation under the zone's lock
//! before touching the playlist, so a timer that fires concurrently either
//! completes its advance first or finds itself stale and exits.

use log::{debug, trace, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::model::{MediaItem, Position};

/// Shortest time an item may stay current.
pub const MIN_ITEM_DURATION: Duration = Duration::from_secs(1);

/// How long `item` stays current, with non-positive durations clamped to
/// [`MIN_ITEM_DURATION`].
pub fn effective_duration(item: &MediaItem) -> Duration {
    match u64::try_from(item.duration_secs) {
        Ok(secs) if secs > 0 => Duration::from_secs(secs),
        _ => MIN_ITEM_DURATION,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZonePhase {
    /// No playlist, or an empty one.
    Empty,
    /// Displaying `playlist[index]`.
    Showing(usize),
}

/// Round-robin position within one zone's playlist.
#[derive(Clone, Debug, Default)]
pub struct ZoneState {
    playlist: Vec<MediaItem>,
    index: usize,
}

impl ZoneState {
    /// Replaces the playlist and restarts it from the first item.
    pub fn set_playlist(&mut self, items: Vec<MediaItem>) -> ZonePhase {
        self.playlist = items;
        self.index = 0;
        self.phase()
    }

    /// Moves to the next item, wrapping to the start. A single-item playlist
    /// stays on that item. Does nothing when empty.
    pub fn advance(&mut self) -> ZonePhase {
        if !self.playlist.is_empty() {
            self.index = (self.index + 1) % self.playlist.len();
        }
        self.phase()
    }

    /// Swaps in refreshed copies of the same items, keeping the position.
    /// Only meaningful when `items` is the same sequence as the playlist.
    pub fn replace_items(&mut self, items: Vec<MediaItem>) -> ZonePhase {
        self.playlist = items;
        if self.index >= self.playlist.len() {
            self.index = 0;
        }
        self.phase()
    }

    /// Whether `items` lists the same media, by id and filename, in the same order.
    pub fn same_sequence(&self, items: &[MediaItem]) -> bool {
        self.playlist.len() == items.len()
            && self
                .playlist
                .iter()
                .zip(items)
                .all(|(a, b)| a.media_id == b.media_id && a.filename == b.filename)
    }

    pub fn current_item(&self) -> Option<&MediaItem> {
        self.playlist.get(self.index)
    }

    pub fn phase(&self) -> ZonePhase {
        if self.playlist.is_empty() {
            ZonePhase::Empty
        } else {
            ZonePhase::Showing(self.index)
        }
    }

    pub fn playlist(&self) -> &[MediaItem] {
        &self.playlist
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoneEventCause {
    /// The item's duration elapsed (or the zone was advanced manually).
    Advanced,
    /// A new playlist was applied and playback restarted from its first item.
    Reconfigured,
    /// The playlist became empty; the zone now shows "no media".
    Cleared,
}

/// Published whenever a zone's current item is (re)established.
#[derive(Clone, Debug, PartialEq)]
pub struct ZoneEvent {
    pub position: Position,
    pub item: Option<MediaItem>,
    pub cause: ZoneEventCause,
}

#[derive(Debug, Default)]
struct Shared {
    state: ZoneState,
    generation: u64,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Drives one zone's playlist on its own timer.
///
/// Methods that start a timer (`set_playlist` with items, `advance`) must be
/// called from within a Tokio runtime.
#[derive(Debug)]
pub struct ZoneScheduler {
    position: Position,
    shared: Arc<Mutex<Shared>>,
    timer: Option<JoinHandle<()>>,
    events: broadcast::Sender<ZoneEvent>,
}

impl ZoneScheduler {
    pub fn new(position: Position, events: broadcast::Sender<ZoneEvent>) -> Self {
        Self {
            position,
            shared: Arc::new(Mutex::new(Shared::default())),
            timer: None,
            events,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Replaces the playlist. Any pending advance is cancelled, the zone
    /// restarts at index 0 and the timer restarts with that item's duration.
    /// An empty playlist puts the zone in [`ZonePhase::Empty`].
    pub fn set_playlist(&mut self, items: Vec<MediaItem>) {
        for item in items.iter().filter(|i| i.duration_secs <= 0) {
            warn!(
                "Zone {}: '{}' has invalid duration {}s, using {:?}",
                self.position, item.filename, item.duration_secs, MIN_ITEM_DURATION
            );
        }
        let (generation, event) = {
            let mut guard = lock(&self.shared);
            guard.generation += 1;
            let was_showing = guard.state.phase() != ZonePhase::Empty;
            let phase = guard.state.set_playlist(items);
            let cause = match phase {
                ZonePhase::Showing(_) => Some(ZoneEventCause::Reconfigured),
                ZonePhase::Empty if was_showing => Some(ZoneEventCause::Cleared),
                ZonePhase::Empty => None,
            };
            debug!(
                "Zone {}: playlist set ({} item(s)), generation {}",
                self.position,
                guard.state.playlist().len(),
                guard.generation
            );
            (guard.generation, cause.map(|cause| self.event(&guard.state, cause)))
        };
        self.restart_timer(generation);
        if let Some(event) = event {
            let _ = self.events.send(event);
        }
    }

    /// Applies edited metadata (durations, urls, sizes) for the playlist the
    /// zone is already playing. The current item and its pending advance are
    /// kept; a new duration takes effect the next time that item is shown.
    /// Returns `false`, changing nothing, when `items` is a different sequence.
    pub fn update_items(&mut self, items: Vec<MediaItem>) -> bool {
        let mut guard = lock(&self.shared);
        if !guard.state.same_sequence(&items) {
            return false;
        }
        for item in items.iter().filter(|i| i.duration_secs <= 0) {
            warn!(
                "Zone {}: '{}' has invalid duration {}s, using {:?}",
                self.position, item.filename, item.duration_secs, MIN_ITEM_DURATION
            );
        }
        guard.state.replace_items(items);
        debug!("Zone {}: item metadata refreshed in place", self.position);
        true
    }

    /// Advances to the next item immediately and restarts the timer.
    pub fn advance(&mut self) {
        let (generation, event) = {
            let mut guard = lock(&self.shared);
            guard.generation += 1;
            if guard.state.phase() == ZonePhase::Empty {
                trace!("Zone {}: advance ignored, zone is empty", self.position);
                return;
            }
            guard.state.advance();
            (guard.generation, self.event(&guard.state, ZoneEventCause::Advanced))
        };
        self.restart_timer(generation);
        let _ = self.events.send(event);
    }

    pub fn current_item(&self) -> Option<MediaItem> {
        lock(&self.shared).state.current_item().cloned()
    }

    pub fn phase(&self) -> ZonePhase {
        lock(&self.shared).state.phase()
    }

    /// Whether the zone is currently playing exactly `items`.
    pub fn has_playlist(&self, items: &[MediaItem]) -> bool {
        lock(&self.shared).state.playlist() == items
    }

    /// Cancels the pending advance. State is kept but no longer changes.
    pub fn stop(&mut self) {
        lock(&self.shared).generation += 1;
        if let Some(handle) = self.timer.take() {
            handle.abort();
            trace!("Zone {}: timer stopped", self.position);
        }
    }

    fn event(&self, state: &ZoneState, cause: ZoneEventCause) -> ZoneEvent {
        ZoneEvent { position: self.position, item: state.current_item().cloned(), cause }
    }

    fn restart_timer(&mut self, generation: u64) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
        if lock(&self.shared).state.phase() == ZonePhase::Empty {
            return;
        }
        let position = self.position;
        let shared = Arc::clone(&self.shared);
        let events = self.events.clone();
        self.timer = Some(tokio::spawn(run_timer(position, shared, generation, events)));
    }
}

impl Drop for ZoneScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Sleeps for the current item's duration, advances, repeats. Exits as soon
/// as its generation is superseded or the zone empties.
async fn run_timer(
    position: Position,
    shared: Arc<Mutex<Shared>>,
    generation: u64,
    events: broadcast::Sender<ZoneEvent>,
) {
    loop {
        let wait = {
            let guard = lock(&shared);
            if guard.generation != generation {
                return;
            }
            match guard.state.current_item() {
                Some(item) => effective_duration(item),
                None => return,
            }
        };
        tokio::time::sleep(wait).await;

        let event = {
            let mut guard = lock(&shared);
            if guard.generation != generation {
                trace!("Zone {}: stale timer (generation {}) discarded", position, generation);
                return;
            }
            guard.state.advance();
            let item = guard.state.current_item().cloned();
            debug!(
                "Zone {}: advanced to {:?} '{}'",
                position,
                guard.state.phase(),
                item.as_ref().map(|i| i.filename.as_str()).unwrap_or("")
            );
            ZoneEvent { position, item, cause: ZoneEventCause::Advanced }
        };
        // No subscribers is fine; the snapshot is still readable.
        let _ = events.send(event);
    }
}
