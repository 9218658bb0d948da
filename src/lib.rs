//! Multi-zone content rotation for CastGrid displays.
//!
//! A [`session::DeviceSession`] loads a device's grids from a
//! [`store::ConfigStore`], resolves each zone's playlist and runs one
//! independent timer-driven [`zone::ZoneScheduler`] per zone. Renderers read
//! [`session::DeviceSession::snapshot`] or subscribe to zone events.

pub mod catalog;
pub mod config;
pub mod demo;
pub mod device_id;
pub mod errors;
pub mod grid;
pub mod http_store;
pub mod memory_store;
pub mod model;
pub mod playlist;
pub mod session;
pub mod store;
pub mod zone;
