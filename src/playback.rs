// src/playback.rs
//! Deterministic route playback
//!
//! Replays a recorded route one sample per tick, in recorded order. The
//! speed multiplier only changes the tick period (`1000 / speed` ms), never
//! which samples are shown.

use crate::display::{MapCommand, Renderer, SampleOrigin};
use crate::error::PlayerError;
use crate::position::PositionSample;
use crate::route::Route;
use crate::schedule::{ScheduleHandle, ScheduleId, ScheduleTick, Scheduler};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Playing,
    Paused,
}

/// Shortest tick period; faster multipliers all play at this rate
pub const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);

/// Tick period for a speed multiplier
pub fn tick_period(speed: NonZeroU32) -> Duration {
    (Duration::from_secs(1) / speed.get()).max(MIN_TICK_PERIOD)
}

#[derive(Debug, Clone)]
pub struct PlaybackSession {
    route: Route,
    current_index: usize,
    speed: NonZeroU32,
    paused: bool,
    /// Speed the installed schedule runs at
    scheduled_speed: NonZeroU32,
}

impl PlaybackSession {
    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn speed(&self) -> NonZeroU32 {
        self.speed
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn remaining(&self) -> usize {
        self.route.len().saturating_sub(self.current_index)
    }
}

/// Playback state machine: `Idle -> Playing <-> Paused -> Idle`.
///
/// At most one schedule is installed per session; any previous schedule is
/// cancelled before a new one is installed.
pub struct RoutePlayer<S: Scheduler> {
    scheduler: S,
    session: Option<PlaybackSession>,
    schedule: Option<S::Handle>,
    schedule_id: ScheduleId,
    speed: NonZeroU32,
}

impl<S: Scheduler> RoutePlayer<S> {
    pub fn new(scheduler: S, speed: NonZeroU32) -> Self {
        Self {
            scheduler,
            session: None,
            schedule: None,
            schedule_id: ScheduleId::default(),
            speed,
        }
    }

    pub fn state(&self) -> PlayerState {
        match &self.session {
            None => PlayerState::Idle,
            Some(s) if s.paused => PlayerState::Paused,
            Some(_) => PlayerState::Playing,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    /// Index of the next sample to emit; 0 when idle
    pub fn current_index(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.current_index)
    }

    /// Multiplier used by the next start or resume
    pub fn speed(&self) -> NonZeroU32 {
        self.speed
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn start(&mut self, route: Route, speed: NonZeroU32) -> Result<&PlaybackSession, PlayerError> {
        if self.session.is_some() {
            return Err(PlayerError::AlreadyActive);
        }
        if route.is_empty() {
            return Err(PlayerError::EmptyRoute);
        }

        info!(route = %route.name, samples = route.len(), speed = %speed, "playback_started");

        self.speed = speed;
        self.install_schedule(speed);
        Ok(&*self.session.insert(PlaybackSession {
            route,
            current_index: 0,
            speed,
            paused: false,
            scheduled_speed: speed,
        }))
    }

    /// Handle a tick delivered by the scheduler; ticks from a replaced or
    /// cancelled schedule are ignored.
    pub fn on_tick<R: Renderer + ?Sized>(&mut self, tick: ScheduleTick, renderer: &mut R) -> Option<PositionSample> {
        if self.schedule.is_none() || tick.id != self.schedule_id {
            debug!(tick = %tick.id, current = %self.schedule_id, "stale_tick_ignored");
            return None;
        }
        self.tick(renderer)
    }

    /// Advance playback by one step. Returns the emitted sample, or `None`
    /// when idle, paused, or when this tick completed the route.
    pub fn tick<R: Renderer + ?Sized>(&mut self, renderer: &mut R) -> Option<PositionSample> {
        let session = self.session.as_mut()?;
        if session.paused {
            return None;
        }

        let Some(sample) = session.route.samples.get(session.current_index).cloned() else {
            info!(route = %session.route.name, "playback_completed");
            self.finish(renderer);
            return None;
        };
        session.current_index += 1;

        renderer.render(MapCommand::ShowPosition {
            sample: sample.clone(),
            origin: SampleOrigin::Playback,
        });
        Some(sample)
    }

    pub fn pause(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if !session.paused {
                session.paused = true;
                debug!(index = session.current_index, "playback_paused");
            }
        }
    }

    pub fn resume(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.paused {
            return;
        }
        session.paused = false;
        debug!(index = session.current_index, "playback_resumed");

        // speed changed while paused
        if session.scheduled_speed != self.speed {
            let speed = self.speed;
            session.speed = speed;
            session.scheduled_speed = speed;
            self.install_schedule(speed);
        }
    }

    /// Flip between playing and paused
    pub fn toggle_pause(&mut self) {
        match self.state() {
            PlayerState::Playing => self.pause(),
            PlayerState::Paused => self.resume(),
            PlayerState::Idle => {}
        }
    }

    /// Return to idle, cancel the schedule and clear the playback marker.
    /// Safe to call at any time.
    pub fn stop<R: Renderer + ?Sized>(&mut self, renderer: &mut R) {
        if self.session.is_some() {
            info!(index = self.current_index(), "playback_stopped");
            self.finish(renderer);
        } else {
            self.cancel_schedule();
        }
    }

    /// Change the multiplier. While playing the schedule is replaced at the
    /// new period keeping the position; otherwise the value is stored for the
    /// next start or resume.
    pub fn set_speed(&mut self, speed: NonZeroU32) {
        self.speed = speed;

        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.paused || session.scheduled_speed == speed {
            return;
        }

        session.speed = speed;
        session.scheduled_speed = speed;
        debug!(speed = %speed, index = session.current_index, "playback_speed_changed");
        self.install_schedule(speed);
    }

    fn install_schedule(&mut self, speed: NonZeroU32) {
        self.cancel_schedule();
        self.schedule_id = self.schedule_id.next();
        let handle = self.scheduler.schedule_repeating(self.schedule_id, tick_period(speed));
        self.schedule = Some(handle);
    }

    fn cancel_schedule(&mut self) {
        if let Some(mut handle) = self.schedule.take() {
            handle.cancel();
        }
    }

    fn finish<R: Renderer + ?Sized>(&mut self, renderer: &mut R) {
        self.cancel_schedule();
        self.session = None;
        renderer.render(MapCommand::ClearPlaybackMarker);
    }
}
