//! Demo content for trying the player without a backend.

use log::info;

use crate::errors::StoreError;
use crate::memory_store::MemoryStore;
use crate::model::{MediaBox, MediaItem, MediaType};

pub const DEMO_BOX_ID: &str = "demo_box_1";

fn demo_items() -> Vec<MediaItem> {
    vec![
        MediaItem::new(
            "demo_media_1",
            MediaType::Video,
            "A_welcome_video.mp4",
            "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/BigBuckBunny.mp4",
        )
        .with_duration(30),
        MediaItem::new(
            "demo_media_2",
            MediaType::Image,
            "B_menu_image.jpg",
            "https://picsum.photos/1920/1080?random=1",
        )
        .with_duration(5),
        MediaItem::new(
            "demo_media_3",
            MediaType::Image,
            "C_promotion_banner.png",
            "https://picsum.photos/1920/1080?random=2",
        )
        .with_duration(8),
    ]
}

/// Seeds `store` with one demo box and a two-zone device showing it.
///
/// Does nothing if `device_id` already exists.
pub fn seed(store: &MemoryStore, device_id: &str) -> Result<(), StoreError> {
    let items = demo_items();
    for item in &items {
        store.put_media_item(item);
    }
    store.put_media_box(MediaBox {
        media_box_id: DEMO_BOX_ID.to_string(),
        name: "Demo Content Box".to_string(),
        media_items: items.iter().map(|i| i.media_id.clone()).collect(),
    });
    if store.has_device(device_id) {
        return Ok(());
    }
    store.create_device(device_id, "Demo Lobby", 2)?;
    store.assign_media_box(device_id, 1, DEMO_BOX_ID)?;
    store.assign_media_box(device_id, 2, DEMO_BOX_ID)?;
    info!("Demo data seeded for device '{}'", device_id);
    Ok(())
}
