//! Device identifiers for unprovisioned displays.
//!
//! Ids look like `tv_a7f3k9m2_2024`: a random part from a v4 UUID and the
//! last four digits of the millisecond clock. Location-based ids insert a
//! short cleaned location, e.g. `tv_lobby_a7f3k9_2024`.

use chrono::Utc;
use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

fn random_hex(len: usize) -> String {
    Uuid::new_v4().simple().to_string().chars().take(len).collect()
}

fn timestamp_suffix() -> String {
    format!("{:04}", Utc::now().timestamp_millis().rem_euclid(10_000))
}

pub fn generate() -> String {
    format!("tv_{}_{}", random_hex(8), timestamp_suffix())
}

pub fn generate_for_location(location: &str) -> String {
    let clean: String = location
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(6)
        .collect();
    if clean.is_empty() {
        return generate();
    }
    format!("tv_{}_{}_{}", clean, random_hex(6), timestamp_suffix())
}

pub fn is_valid(device_id: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"^tv_[a-zA-Z0-9]+(_[a-zA-Z0-9]+)?_[0-9]{4}$")
                .expect("device id pattern is valid")
        })
        .is_match(device_id)
}

/// The location part of a location-based id.
pub fn location_of(device_id: &str) -> Option<&str> {
    let parts: Vec<&str> = device_id.split('_').collect();
    if parts.len() >= 4 && parts[0] == "tv" {
        Some(parts[1])
    } else {
        None
    }
}
