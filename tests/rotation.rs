//! End-to-end rotation scenarios against the in-memory backend, on a
//! simulated clock.

use std::sync::Arc;
use std::time::Duration;

use castgrid_player::memory_store::MemoryStore;
use castgrid_player::model::{GridLayout, MediaBox, MediaItem, MediaType, SessionState};
use castgrid_player::session::DeviceSession;
use castgrid_player::zone::{ZoneEventCause, ZonePhase};

fn item(id: &str, filename: &str, secs: i64) -> MediaItem {
    let url = format!("https://cdn.example.com/{}", filename);
    MediaItem::new(id, MediaType::from_filename(filename), filename, &url).with_duration(secs)
}

fn media_box(id: &str, members: &[&str]) -> MediaBox {
    MediaBox {
        media_box_id: id.to_string(),
        name: id.to_uppercase(),
        media_items: members.iter().map(|m| m.to_string()).collect(),
    }
}

fn current(session: &DeviceSession, position: u8) -> Option<String> {
    session.snapshot().get(&position).cloned().flatten().map(|i| i.filename)
}

/// tv_001: zone 1 shows a two-item box, zone 2 is unassigned.
fn lobby_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.put_media_item(&item("img", "B_img.jpg", 5));
    store.put_media_item(&item("vid", "A_vid.mp4", 10));
    store.put_media_box(media_box("lobby", &["img", "vid"]));
    store.create_device("tv_001", "Lobby", 2).unwrap();
    store.assign_media_box("tv_001", 1, "lobby").unwrap();
    store
}

#[tokio::test(start_paused = true)]
async fn lobby_device_rotates_by_filename_and_duration() {
    let mut session = DeviceSession::new("tv_001", lobby_store());
    assert_eq!(session.start().await, &SessionState::Running);
    assert_eq!(session.layout(), Some(GridLayout::Two));

    assert_eq!(current(&session, 1).as_deref(), Some("A_vid.mp4"));
    assert_eq!(current(&session, 2), None);

    tokio::time::sleep(Duration::from_millis(9_900)).await;
    assert_eq!(current(&session, 1).as_deref(), Some("A_vid.mp4"));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(current(&session, 1).as_deref(), Some("B_img.jpg"));
    assert_eq!(current(&session, 2), None);

    // B_img.jpg lasts 5s, then the playlist loops.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(current(&session, 1).as_deref(), Some("A_vid.mp4"));
}

#[tokio::test(start_paused = true)]
async fn zones_advance_independently() {
    let store = lobby_store();
    store.put_media_item(&item("fast1", "f1.png", 2));
    store.put_media_item(&item("fast2", "f2.png", 2));
    store.put_media_box(media_box("fast", &["fast1", "fast2"]));
    store.assign_media_box("tv_001", 2, "fast").unwrap();

    let mut session = DeviceSession::new("tv_001", store);
    session.start().await;
    let mut events = session.subscribe();

    let mut zone2_advances = 0;
    let mut zone1_advances = 0;
    let deadline = tokio::time::Instant::now() + Duration::from_millis(9_500);
    while let Ok(Ok(event)) = tokio::time::timeout_at(deadline, events.recv()).await {
        assert_eq!(event.cause, ZoneEventCause::Advanced);
        match event.position {
            1 => zone1_advances += 1,
            2 => zone2_advances += 1,
            other => panic!("unexpected zone {}", other),
        }
    }
    assert_eq!(zone2_advances, 4);
    assert_eq!(zone1_advances, 0);
}

#[tokio::test(start_paused = true)]
async fn reassigning_one_zone_does_not_disturb_the_other() {
    let store = lobby_store();
    store.put_media_item(&item("s1", "s1.png", 3));
    store.put_media_item(&item("s2", "s2.png", 3));
    store.put_media_box(media_box("side", &["s1", "s2"]));
    store.assign_media_box("tv_001", 2, "side").unwrap();

    let mut session = DeviceSession::new("tv_001", store.clone());
    session.start().await;
    tokio::time::sleep(Duration::from_millis(10_500)).await;
    assert_eq!(current(&session, 1).as_deref(), Some("B_img.jpg"));
    let zone2_before = session.scheduler_mut().unwrap().phase(2);
    assert_eq!(zone2_before, Some(ZonePhase::Showing(1)));

    store.assign_media_box("tv_001", 1, "side").unwrap();
    session.refresh().await;

    assert_eq!(current(&session, 1).as_deref(), Some("s1.png"));
    assert_eq!(session.scheduler_mut().unwrap().phase(2), zone2_before);
    assert_eq!(current(&session, 2).as_deref(), Some("s2.png"));
}

#[tokio::test(start_paused = true)]
async fn deleted_items_are_skipped_and_empty_boxes_show_nothing() {
    let store = lobby_store();
    store.put_media_box(media_box("empty", &[]));
    store.assign_media_box("tv_001", 2, "empty").unwrap();
    store.delete_media_item("vid");

    let mut session = DeviceSession::new("tv_001", store);
    session.start().await;
    assert_eq!(current(&session, 1).as_deref(), Some("B_img.jpg"));
    assert_eq!(session.scheduler_mut().unwrap().phase(2), Some(ZonePhase::Empty));

    // One valid item left: it is re-shown every 5s without changing.
    tokio::time::sleep(Duration::from_secs(16)).await;
    assert_eq!(current(&session, 1).as_deref(), Some("B_img.jpg"));
    assert_eq!(current(&session, 2), None);
}

#[tokio::test(start_paused = true)]
async fn edited_duration_applies_without_restarting_the_zone() {
    let store = lobby_store();
    let mut session = DeviceSession::new("tv_001", store.clone());
    session.start().await;
    tokio::time::sleep(Duration::from_secs(4)).await;

    store.update_media_item_duration("img", 0).unwrap();
    assert_eq!(session.refresh().await, &SessionState::Running);
    assert_eq!(current(&session, 1).as_deref(), Some("A_vid.mp4"));

    // A_vid.mp4 keeps its original 10s slot.
    tokio::time::sleep(Duration::from_millis(6_100)).await;
    assert_eq!(current(&session, 1).as_deref(), Some("B_img.jpg"));

    // B_img.jpg now lasts the clamped minimum of one second.
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert_eq!(current(&session, 1).as_deref(), Some("A_vid.mp4"));
}

#[tokio::test(start_paused = true)]
async fn unconfigured_device_recovers_after_provisioning() {
    let store = Arc::new(MemoryStore::new());
    let mut session = DeviceSession::new("tv_new", store.clone());
    assert!(matches!(session.start().await, SessionState::DeviceNotConfigured(_)));

    store.create_device("tv_new", "Cafe", 1).unwrap();
    assert_eq!(session.refresh().await, &SessionState::Running);
    assert_eq!(session.layout(), Some(GridLayout::Single));
    assert_eq!(current(&session, 1), None);
}
