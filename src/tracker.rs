// src/tracker.rs
//! Session state for one tracking run
//!
//! Owns the history trail, the geofence monitor and the route player, and
//! forwards what happens to the renderer and notifier it was built with.

use crate::display::{notification_message, MapCommand, Notifier, Renderer, SampleOrigin, NOTIFICATION_TITLE};
use crate::error::{FenceError, PlayerError, Result, TrackerError};
use crate::geofence::{GeofenceEvent, GeofenceId, GeofenceMonitor};
use crate::playback::RoutePlayer;
use crate::position::{AccuracyFilter, LocationHistory, PositionSample};
use crate::route::Route;
use crate::schedule::{ScheduleTick, Scheduler};
use chrono::{Local, Utc};
use std::num::NonZeroU32;
use tracing::{info, warn};

pub struct LocationTracker<S: Scheduler, R: Renderer, N: Notifier> {
    history: LocationHistory,
    filter: AccuracyFilter,
    fences: GeofenceMonitor,
    player: RoutePlayer<S>,
    renderer: R,
    notifier: N,
}

impl<S: Scheduler, R: Renderer, N: Notifier> LocationTracker<S, R, N> {
    pub fn new(player: RoutePlayer<S>, renderer: R, notifier: N) -> Self {
        Self {
            history: LocationHistory::new(),
            filter: AccuracyFilter::default(),
            fences: GeofenceMonitor::new(),
            player,
            renderer,
            notifier,
        }
    }

    pub fn with_filter(mut self, filter: AccuracyFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Use a restored fence set and draw every fence
    pub fn with_fences(mut self, fences: GeofenceMonitor) -> Self {
        self.fences = fences;
        for fence in self.fences.list() {
            self.renderer.render(MapCommand::DrawFence(fence.clone()));
        }
        self
    }

    pub fn history(&self) -> &LocationHistory {
        &self.history
    }

    pub fn fences(&self) -> &GeofenceMonitor {
        &self.fences
    }

    pub fn player(&self) -> &RoutePlayer<S> {
        &self.player
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Feed a live fix. Returns the geofence events it caused, or `None`
    /// when the fix was dropped by the accuracy filter.
    pub fn on_position(&mut self, sample: PositionSample) -> Option<Vec<GeofenceEvent>> {
        if !self.filter.accepts(&sample, &self.history) {
            warn!(
                accuracy_m = %sample.accuracy_meters,
                threshold_m = %self.filter.threshold(),
                "low_accuracy_position_ignored"
            );
            return None;
        }

        self.history.push(sample.clone());
        self.renderer.render(MapCommand::ShowPosition {
            sample: sample.clone(),
            origin: SampleOrigin::Live,
        });
        Some(self.evaluate(&sample))
    }

    /// Feed a playback tick; an emitted sample is evaluated against the
    /// fences like a live one.
    pub fn on_tick(&mut self, tick: ScheduleTick) -> Vec<GeofenceEvent> {
        match self.player.on_tick(tick, &mut self.renderer) {
            Some(sample) => self.evaluate(&sample),
            None => Vec::new(),
        }
    }

    fn evaluate(&mut self, sample: &PositionSample) -> Vec<GeofenceEvent> {
        let events = self.fences.evaluate(sample);

        for event in &events {
            let Some(fence) = self.fences.get(event.geofence_id) else {
                continue;
            };
            let message = notification_message(fence.name(), event.kind);
            info!(fence = %fence.name(), kind = ?event.kind, "geofence_alert");

            self.notifier.notify(NOTIFICATION_TITLE, &message);
            self.renderer.render(MapCommand::GeofenceEvent {
                fence_name: fence.name().to_string(),
                event: event.clone(),
            });
        }

        events
    }

    /// Create a fence around the latest position
    pub fn create_fence(&mut self, name: &str, radius_meters: f64) -> std::result::Result<GeofenceId, FenceError> {
        let fence = self.fences.add_fence(name, radius_meters, self.history.last())?;
        let id = fence.id();
        self.renderer.render(MapCommand::DrawFence(fence.clone()));
        Ok(id)
    }

    /// Returns whether a fence was removed
    pub fn delete_fence(&mut self, id: GeofenceId) -> bool {
        if self.fences.remove_fence(id).is_none() {
            return false;
        }
        self.renderer.render(MapCommand::RemoveFence(id));
        true
    }

    /// Snapshot the history as a route; a blank name gets a dated default
    pub fn save_route(&self, name: &str) -> Result<Route> {
        if self.history.is_empty() {
            return Err(TrackerError::NoHistory);
        }

        let name = match name.trim() {
            "" => format!("Route {}", Local::now().format("%Y-%m-%d %H:%M")),
            trimmed => trimmed.to_string(),
        };
        let route = self.history.to_route(name, Utc::now());
        info!(route = %route.name, samples = route.len(), "route_saved");
        Ok(route)
    }

    /// Replace the history with a loaded route
    pub fn load_route(&mut self, route: Route) {
        info!(route = %route.name, samples = route.len(), "route_loaded");
        self.history.replace(route.samples);
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn start_playback(&mut self, route: Route, speed: NonZeroU32) -> std::result::Result<(), PlayerError> {
        self.player.start(route, speed).map(|_| ())
    }

    /// Replay the current history
    pub fn play_history(&mut self, speed: NonZeroU32) -> std::result::Result<(), PlayerError> {
        let route = self.history.to_route("History".to_string(), Utc::now());
        self.start_playback(route, speed)
    }

    pub fn pause_playback(&mut self) {
        self.player.pause();
    }

    pub fn resume_playback(&mut self) {
        self.player.resume();
    }

    pub fn toggle_playback_pause(&mut self) {
        self.player.toggle_pause();
    }

    pub fn set_playback_speed(&mut self, speed: NonZeroU32) {
        self.player.set_speed(speed);
    }

    pub fn stop_playback(&mut self) {
        self.player.stop(&mut self.renderer);
    }
}
