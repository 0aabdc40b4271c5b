// src/display/mod.rs
//! Rendering and notification collaborators
//!
//! The tracker core never draws anything itself. It describes what changed
//! as [`MapCommand`]s and asks a [`Notifier`] to deliver geofence alerts.

pub mod terminal;

use crate::geofence::{FenceEventKind, Geofence, GeofenceEvent, GeofenceId};
use crate::position::PositionSample;

pub const NOTIFICATION_TITLE: &str = "Location Alert";

/// Where a displayed sample came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOrigin {
    Live,
    Playback,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapCommand {
    /// Move the marker, draw the accuracy circle and extend the path
    ShowPosition {
        sample: PositionSample,
        origin: SampleOrigin,
    },
    DrawFence(Geofence),
    RemoveFence(GeofenceId),
    GeofenceEvent {
        fence_name: String,
        event: GeofenceEvent,
    },
    /// Remove the transient marker left by route playback
    ClearPlaybackMarker,
}

pub trait Renderer {
    fn render(&mut self, command: MapCommand);
}

/// Platform delivery of user alerts; whether delivery succeeds is not the
/// caller's concern.
pub trait Notifier {
    fn notify(&mut self, title: &str, message: &str);
}

impl<R: Renderer + ?Sized> Renderer for &mut R {
    fn render(&mut self, command: MapCommand) {
        (**self).render(command);
    }
}

impl<N: Notifier + ?Sized> Notifier for &mut N {
    fn notify(&mut self, title: &str, message: &str) {
        (**self).notify(title, message);
    }
}

/// Human readable alert text for a fence transition
pub fn notification_message(fence_name: &str, kind: FenceEventKind) -> String {
    match kind {
        FenceEventKind::Entered => format!("Entered geofence: {}", fence_name),
        FenceEventKind::Left => format!("Left geofence: {}", fence_name),
    }
}

/// Renderer that keeps every command, for headless runs and tests
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub commands: Vec<MapCommand>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples shown so far, in order, with their origin
    pub fn shown(&self) -> Vec<(SampleOrigin, &PositionSample)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                MapCommand::ShowPosition { sample, origin } => Some((*origin, sample)),
                _ => None,
            })
            .collect()
    }
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, command: MapCommand) {
        self.commands.push(command);
    }
}

/// Notifier that keeps every message
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub messages: Vec<String>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&mut self, _title: &str, message: &str) {
        self.messages.push(message.to_string());
    }
}
