//! Playback ordering for a zone.
//!
//! Content producers control order by naming files (`A_intro.mp4`,
//! `B_menu.jpg`), so a playlist is the box's items sorted by filename,
//! case-insensitively, with plain lexicographic comparison (`item10` sorts
//! before `item2`).

use crate::model::MediaItem;

/// Returns `items` in playback order.
///
/// The sort is stable: items with equal filenames keep their input order.
pub fn resolve(mut items: Vec<MediaItem>) -> Vec<MediaItem> {
    items.sort_by_cached_key(|item| item.filename.to_lowercase());
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::MediaType;

    fn item(id: &str, filename: &str) -> MediaItem {
        MediaItem::new(id, MediaType::from_filename(filename), filename, "")
    }

    fn names(items: &[MediaItem]) -> Vec<&str> {
        items.iter().map(|i| i.filename.as_str()).collect()
    }

    #[test]
    fn sorts_case_insensitively() {
        let playlist = resolve(vec![item("1", "B.jpg"), item("2", "a.mp4"), item("3", "C.png")]);
        assert_eq!(names(&playlist), vec!["a.mp4", "B.jpg", "C.png"]);
    }

    #[test]
    fn sort_is_lexicographic_not_numeric() {
        let playlist = resolve(vec![
            item("1", "slide2.png"),
            item("2", "slide10.png"),
            item("3", "slide1.png"),
        ]);
        assert_eq!(names(&playlist), vec!["slide1.png", "slide10.png", "slide2.png"]);
    }

    #[test]
    fn equal_filenames_keep_input_order() {
        let playlist = resolve(vec![
            item("first", "Same.png"),
            item("x", "a.png"),
            item("second", "same.png"),
        ]);
        let ids: Vec<&str> = playlist.iter().map(|i| i.media_id.as_str()).collect();
        assert_eq!(ids, vec!["x", "first", "second"]);
    }

    #[test]
    fn empty_input_yields_empty_playlist() {
        assert!(resolve(Vec::new()).is_empty());
    }
}
