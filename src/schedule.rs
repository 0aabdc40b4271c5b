// src/schedule.rs
//! Cancellable repeating schedules that drive route playback
//!
//! A schedule delivers [`ScheduleTick`]s tagged with the [`ScheduleId`] it
//! was installed with. The consumer processes ticks one at a time, so a tick
//! from a schedule that was cancelled after the tick was queued is detected
//! by its id and ignored.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScheduleId(u64);

impl ScheduleId {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One firing of a repeating schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleTick {
    pub id: ScheduleId,
}

/// Handle to an installed schedule. Cancelling is idempotent, and dropping
/// the handle cancels the schedule.
pub trait ScheduleHandle {
    fn cancel(&mut self);
    fn is_cancelled(&self) -> bool;
}

pub trait Scheduler {
    type Handle: ScheduleHandle;

    /// Fire `id` every `period`, first one period from now. A zero period
    /// is raised to the smallest one the timer supports.
    fn schedule_repeating(&mut self, id: ScheduleId, period: Duration) -> Self::Handle;
}

/// Schedules backed by tokio timer tasks, delivering ticks over a channel
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<ScheduleTick>,
}

impl TokioScheduler {
    pub fn new(tx: mpsc::UnboundedSender<ScheduleTick>) -> Self {
        Self { tx }
    }

    /// Scheduler together with the receiving end of its ticks
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ScheduleTick>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl Scheduler for TokioScheduler {
    type Handle = TokioHandle;

    fn schedule_repeating(&mut self, id: ScheduleId, period: Duration) -> TokioHandle {
        let tx = self.tx.clone();
        let period = period.max(Duration::from_millis(1));
        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                trace!(schedule = %id, "schedule_tick");
                if tx.send(ScheduleTick { id }).is_err() {
                    break; // receiver gone
                }
            }
        });

        TokioHandle { task: Some(task) }
    }
}

#[derive(Debug)]
pub struct TokioHandle {
    task: Option<JoinHandle<()>>,
}

impl ScheduleHandle for TokioHandle {
    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn is_cancelled(&self) -> bool {
        self.task.is_none()
    }
}

impl Drop for TokioHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[derive(Debug, Default)]
struct ManualState {
    active: Vec<(ScheduleId, Duration)>,
    installed: usize,
    cancelled: usize,
}

/// Scheduler whose ticks are fired by the caller.
///
/// Keeps track of installed and cancelled schedules so callers can run a
/// playback to completion without waiting on a clock.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    state: Rc<RefCell<ManualState>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tick for the most recently installed live schedule
    pub fn next_tick(&self) -> Option<ScheduleTick> {
        self.state
            .borrow()
            .active
            .last()
            .map(|&(id, _)| ScheduleTick { id })
    }

    pub fn active_period(&self) -> Option<Duration> {
        self.state.borrow().active.last().map(|&(_, period)| period)
    }

    /// Schedules installed and not yet cancelled
    pub fn live_count(&self) -> usize {
        self.state.borrow().active.len()
    }

    pub fn installed_count(&self) -> usize {
        self.state.borrow().installed
    }

    pub fn cancelled_count(&self) -> usize {
        self.state.borrow().cancelled
    }
}

impl Scheduler for ManualScheduler {
    type Handle = ManualHandle;

    fn schedule_repeating(&mut self, id: ScheduleId, period: Duration) -> ManualHandle {
        let mut state = self.state.borrow_mut();
        state.active.push((id, period));
        state.installed += 1;

        ManualHandle {
            id,
            state: Rc::clone(&self.state),
            cancelled: false,
        }
    }
}

#[derive(Debug)]
pub struct ManualHandle {
    id: ScheduleId,
    state: Rc<RefCell<ManualState>>,
    cancelled: bool,
}

impl ScheduleHandle for ManualHandle {
    fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;

        let mut state = self.state.borrow_mut();
        state.active.retain(|&(id, _)| id != self.id);
        state.cancelled += 1;
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl Drop for ManualHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
