// src/error.rs
//! Error types for the location tracker

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackerError>;

/// Rejected geofence creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FenceError {
    #[error("Please enter a name for the geofence")]
    InvalidName,
    #[error("Radius must be at least 10 meters")]
    InvalidRadius,
    #[error("No current location available. Start tracking first.")]
    NoReferencePosition,
}

/// Rejected playback start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlayerError {
    #[error("No route to playback")]
    EmptyRoute,
    #[error("Playback already running, stop it first")]
    AlreadyActive,
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Geofence error: {0}")]
    Fence(#[from] FenceError),
    #[error("Playback error: {0}")]
    Playback(#[from] PlayerError),
    #[error("No route data to save")]
    NoHistory,
    #[error("Error: {0}")]
    Other(String),
}
