// src/lib.rs
//! Location Tracker Library
//!
//! Tracks position fixes from a live gpsd feed or from recorded routes,
//! raises alerts when entering or leaving circular geofences, and replays
//! routes at a configurable speed.

pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod geo;
pub mod geofence;
pub mod playback;
pub mod position;
pub mod route;
pub mod runtime;
pub mod schedule;
pub mod source;
pub mod tracker;

// Re-export main types for convenience
pub use error::{FenceError, PlayerError, Result, TrackerError};
pub use geofence::{Geofence, GeofenceEvent, GeofenceMonitor};
pub use playback::{PlayerState, RoutePlayer};
pub use position::PositionSample;
pub use route::Route;
pub use tracker::LocationTracker;
