//! Composes one [`ZoneScheduler`] per grid position and exposes the
//! renderer-facing snapshot.

use log::{debug, info, warn};
use std::collections::BTreeMap;
use tokio::sync::broadcast;

use crate::catalog::ZoneMedia;
use crate::model::{Grid, GridLayout, MediaItem, Position};
use crate::playlist;
use crate::zone::{ZoneEvent, ZonePhase, ZoneScheduler};

/// Current item per zone position; `None` renders as "no media".
pub type Snapshot = BTreeMap<Position, Option<MediaItem>>;

/// What a call to [`GridScheduler::configure`] did, zone by zone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigureSummary {
    pub created: Vec<Position>,
    pub reconfigured: Vec<Position>,
    pub unchanged: Vec<Position>,
    /// Same box and same items in the same order, with edited details
    /// (e.g. durations) applied without moving the zone's current item.
    pub updated: Vec<Position>,
    /// Zones whose media could not be fetched and keep their last playlist.
    pub kept_stale: Vec<Position>,
    pub removed: Vec<Position>,
}

#[derive(Debug)]
struct ZoneSlot {
    media_box_id: String,
    zone: ZoneScheduler,
}

#[derive(Debug)]
pub struct GridScheduler {
    zones: BTreeMap<Position, ZoneSlot>,
    events: broadcast::Sender<ZoneEvent>,
}

impl GridScheduler {
    pub fn new(events: broadcast::Sender<ZoneEvent>) -> Self {
        Self { zones: BTreeMap::new(), events }
    }

    /// Applies a device's grids and their fetched media.
    ///
    /// A zone restarts from its first item only when its box assignment
    /// changed or the box's ordered items (by id and filename) changed. Edits
    /// to an item's other details are swapped in without moving the zone, and
    /// every other zone keeps playing undisturbed. Zones whose
    /// media is [`ZoneMedia::Unavailable`] keep their previous playlist (a new
    /// zone starts empty). Zones for positions no longer present are stopped.
    pub fn configure(
        &mut self,
        grids: &[Grid],
        media: &BTreeMap<Position, ZoneMedia>,
    ) -> ConfigureSummary {
        let mut summary = ConfigureSummary::default();
        let mut wanted: BTreeMap<Position, &Grid> = BTreeMap::new();
        for grid in grids {
            let Some(position) = grid.zone_position() else {
                warn!(
                    "Grid '{}' has invalid position {}; ignoring it",
                    grid.grid_id, grid.position
                );
                continue;
            };
            if wanted.insert(position, grid).is_some() {
                warn!("Duplicate grid position {}; using grid '{}'", position, grid.grid_id);
            }
        }

        let stale_positions: Vec<Position> =
            self.zones.keys().filter(|p| !wanted.contains_key(p)).copied().collect();
        for position in stale_positions {
            if let Some(mut slot) = self.zones.remove(&position) {
                slot.zone.stop();
                info!("Zone {} removed", position);
                summary.removed.push(position);
            }
        }

        for (position, grid) in wanted {
            let box_id = grid.assigned_box().unwrap_or("").to_string();
            let resolved = match media.get(&position) {
                Some(ZoneMedia::Items(items)) => Some(playlist::resolve(items.clone())),
                Some(ZoneMedia::Unavailable) => None,
                None => Some(Vec::new()),
            };

            match (self.zones.get_mut(&position), resolved) {
                (Some(_), None) => {
                    warn!("Zone {}: media unavailable, keeping last-known playlist", position);
                    summary.kept_stale.push(position);
                }
                (Some(slot), Some(items)) => {
                    if slot.media_box_id == box_id && slot.zone.has_playlist(&items) {
                        debug!("Zone {}: box '{}' unchanged", position, box_id);
                        summary.unchanged.push(position);
                    } else if slot.media_box_id == box_id && slot.zone.update_items(items.clone()) {
                        debug!("Zone {}: box '{}' item details updated in place", position, box_id);
                        summary.updated.push(position);
                    } else {
                        info!(
                            "Zone {}: box '{}' -> '{}' ({} item(s)), restarting",
                            position,
                            slot.media_box_id,
                            box_id,
                            items.len()
                        );
                        slot.media_box_id = box_id;
                        slot.zone.set_playlist(items);
                        summary.reconfigured.push(position);
                    }
                }
                (None, resolved) => {
                    if resolved.is_none() {
                        warn!(
                            "Zone {}: media unavailable and nothing cached, starting empty",
                            position
                        );
                        summary.kept_stale.push(position);
                    }
                    let items = resolved.unwrap_or_default();
                    info!(
                        "Zone {}: created with box '{}' ({} item(s))",
                        position,
                        box_id,
                        items.len()
                    );
                    let mut zone = ZoneScheduler::new(position, self.events.clone());
                    zone.set_playlist(items);
                    self.zones.insert(position, ZoneSlot { media_box_id: box_id, zone });
                    summary.created.push(position);
                }
            }
        }
        summary
    }

    /// Current item of every zone.
    pub fn snapshot(&self) -> Snapshot {
        self.zones.iter().map(|(position, slot)| (*position, slot.zone.current_item())).collect()
    }

    pub fn layout(&self) -> GridLayout {
        GridLayout::for_zone_count(self.zones.len())
    }

    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    pub fn phase(&self, position: Position) -> Option<ZonePhase> {
        self.zones.get(&position).map(|slot| slot.zone.phase())
    }

    pub fn zone_mut(&mut self, position: Position) -> Option<&mut ZoneScheduler> {
        self.zones.get_mut(&position).map(|slot| &mut slot.zone)
    }

    /// Cancels every zone timer and drops all zones.
    pub fn stop(&mut self) {
        for slot in self.zones.values_mut() {
            slot.zone.stop();
        }
        self.zones.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::MediaType;
    use std::time::Duration;

    fn grid(position: i64, media_box_id: &str) -> Grid {
        Grid {
            grid_id: format!("g{}", position),
            device_id: "tv_001".into(),
            position,
            media_box_id: media_box_id.into(),
        }
    }

    fn item(id: &str, filename: &str, secs: i64) -> MediaItem {
        MediaItem::new(id, MediaType::from_filename(filename), filename, "").with_duration(secs)
    }

    fn scheduler() -> GridScheduler {
        let (tx, _) = broadcast::channel(64);
        GridScheduler::new(tx)
    }

    fn box_a() -> ZoneMedia {
        ZoneMedia::Items(vec![item("a2", "B_a.png", 5), item("a1", "A_a.png", 5)])
    }

    fn box_b() -> ZoneMedia {
        ZoneMedia::Items(vec![item("b1", "b1.png", 4), item("b2", "b2.png", 4)])
    }

    #[tokio::test(start_paused = true)]
    async fn configure_resolves_playlists_by_filename() {
        let mut grid_scheduler = scheduler();
        let summary =
            grid_scheduler.configure(&[grid(1, "a"), grid(2, "")], &BTreeMap::from([(1, box_a())]));
        assert_eq!(summary.created, vec![1, 2]);
        let snapshot = grid_scheduler.snapshot();
        assert_eq!(snapshot[&1].as_ref().unwrap().media_id, "a1");
        assert!(snapshot[&2].is_none());
        assert_eq!(grid_scheduler.layout(), GridLayout::Two);
    }

    #[tokio::test(start_paused = true)]
    async fn reconfiguring_one_zone_leaves_others_untouched() {
        let mut grid_scheduler = scheduler();
        let grids = [grid(1, "a"), grid(2, "b")];
        grid_scheduler.configure(&grids, &BTreeMap::from([(1, box_a()), (2, box_b())]));
        tokio::time::sleep(Duration::from_millis(4500)).await;
        assert_eq!(grid_scheduler.phase(2), Some(ZonePhase::Showing(1)));
        assert_eq!(grid_scheduler.phase(1), Some(ZonePhase::Showing(0)));

        let summary = grid_scheduler.configure(
            &[grid(1, "b"), grid(2, "b")],
            &BTreeMap::from([(1, box_b()), (2, box_b())]),
        );
        assert_eq!(summary.reconfigured, vec![1]);
        assert_eq!(summary.unchanged, vec![2]);
        assert_eq!(grid_scheduler.phase(1), Some(ZonePhase::Showing(0)));
        assert_eq!(grid_scheduler.phase(2), Some(ZonePhase::Showing(1)));
        assert_eq!(grid_scheduler.snapshot()[&2].as_ref().unwrap().media_id, "b2");

        // Zone 2's timer was not restarted: it still advances at t=8s.
        tokio::time::sleep(Duration::from_millis(4000)).await;
        assert_eq!(grid_scheduler.phase(2), Some(ZonePhase::Showing(0)));
    }

    #[tokio::test(start_paused = true)]
    async fn changed_items_in_the_same_box_restart_the_zone() {
        let mut grid_scheduler = scheduler();
        grid_scheduler.configure(&[grid(1, "b")], &BTreeMap::from([(1, box_b())]));
        grid_scheduler.zone_mut(1).unwrap().advance();
        let grown = ZoneMedia::Items(vec![
            item("b1", "b1.png", 4),
            item("b2", "b2.png", 4),
            item("b0", "b0.png", 4),
        ]);
        let summary = grid_scheduler.configure(&[grid(1, "b")], &BTreeMap::from([(1, grown)]));
        assert_eq!(summary.reconfigured, vec![1]);
        assert_eq!(grid_scheduler.snapshot()[&1].as_ref().unwrap().media_id, "b0");
    }

    #[tokio::test(start_paused = true)]
    async fn edited_durations_do_not_restart_the_zone() {
        let mut grid_scheduler = scheduler();
        grid_scheduler.configure(&[grid(1, "b")], &BTreeMap::from([(1, box_b())]));
        tokio::time::sleep(Duration::from_millis(4500)).await;
        assert_eq!(grid_scheduler.phase(1), Some(ZonePhase::Showing(1)));

        let edited = ZoneMedia::Items(vec![item("b1", "b1.png", 9), item("b2", "b2.png", 9)]);
        let summary = grid_scheduler.configure(&[grid(1, "b")], &BTreeMap::from([(1, edited)]));
        assert_eq!(summary.updated, vec![1]);
        assert!(summary.reconfigured.is_empty());
        let current = grid_scheduler.snapshot()[&1].clone().unwrap();
        assert_eq!((current.media_id.as_str(), current.duration_secs), ("b2", 9));

        // b2's advance was already scheduled for t=8s.
        tokio::time::sleep(Duration::from_millis(3600)).await;
        assert_eq!(grid_scheduler.phase(1), Some(ZonePhase::Showing(0)));
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_media_keeps_last_known_playlist() {
        let mut grid_scheduler = scheduler();
        grid_scheduler.configure(&[grid(1, "a")], &BTreeMap::from([(1, box_a())]));
        let summary = grid_scheduler.configure(&[grid(1, "a"), grid(2, "b")], &BTreeMap::from([
            (1, ZoneMedia::Unavailable),
            (2, ZoneMedia::Unavailable),
        ]));
        assert_eq!(summary.kept_stale, vec![1, 2]);
        assert_eq!(summary.created, vec![2]);
        assert_eq!(grid_scheduler.snapshot()[&1].as_ref().unwrap().media_id, "a1");
        assert_eq!(grid_scheduler.phase(2), Some(ZonePhase::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_positions_are_removed() {
        let mut grid_scheduler = scheduler();
        grid_scheduler.configure(
            &[grid(1, "a"), grid(2, "b"), grid(3, "")],
            &BTreeMap::from([(1, box_a()), (2, box_b())]),
        );
        let summary = grid_scheduler.configure(&[grid(1, "a")], &BTreeMap::from([(1, box_a())]));
        assert_eq!(summary.removed, vec![2, 3]);
        assert_eq!(grid_scheduler.zone_count(), 1);
        assert_eq!(grid_scheduler.layout(), GridLayout::Single);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_and_duplicate_positions_are_ignored() {
        let mut grid_scheduler = scheduler();
        let mut duplicate = grid(1, "b");
        duplicate.grid_id = "dup".into();
        grid_scheduler.configure(
            &[grid(0, "a"), grid(1, "a"), duplicate, grid(12, "a")],
            &BTreeMap::new(),
        );
        assert_eq!(grid_scheduler.zone_count(), 1);
    }
}
