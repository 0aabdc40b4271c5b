// src/runtime.rs
//! Drive loops for live tracking and route replay
//!
//! Each loop owns its [`LocationTracker`] and handles one input at a time
//! (a position fix, a playback tick, a keyboard control or Ctrl+C), so the
//! tracker state is never shared between tasks.

use crate::cli::{PlaybackControl, TrackControl};
use crate::config::TrackerConfig;
use crate::display::terminal::{print_fences, print_history, print_share, ConsoleNotifier, TerminalRenderer};
use crate::display::{Notifier, Renderer};
use crate::error::{Result, TrackerError};
use crate::geofence::GeofenceMonitor;
use crate::playback::RoutePlayer;
use crate::position::AccuracyFilter;
use crate::route::Route;
use crate::schedule::{ManualScheduler, Scheduler, TokioScheduler};
use crate::source::GpsdSource;
use crate::tracker::LocationTracker;
use std::io::{BufRead, Write};
use std::num::NonZeroU32;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Follow gpsd until Ctrl+C, `exit` or the end of the stream, optionally
/// saving the trail as a route file. Fence changes made from the keyboard
/// are written to `fences_path`.
pub async fn run_live(
    config: &TrackerConfig,
    fences: GeofenceMonitor,
    fences_path: &Path,
    record: Option<&Path>,
    route_name: &str,
) -> Result<()> {
    let (scheduler, mut ticks) = TokioScheduler::channel();
    let player = RoutePlayer::new(scheduler, config.playback_speed());
    let mut tracker = LocationTracker::new(player, TerminalRenderer::stdout(), ConsoleNotifier::new())
        .with_filter(AccuracyFilter::new(config.accuracy_threshold_m))
        .with_fences(fences);

    let (tx, mut rx) = mpsc::channel(64);
    let source = GpsdSource::new(config.gpsd_host.clone(), config.gpsd_port);
    let reader = source.start(tx).await?;
    let mut controls = spawn_control_reader(TrackControl::parse);
    let mut stdout = std::io::stdout();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            sample = rx.recv() => match sample {
                Some(sample) => {
                    tracker.on_position(sample);
                }
                None => {
                    info!("position_source_ended");
                    break;
                }
            },
            Some(tick) = ticks.recv() => {
                tracker.on_tick(tick);
            }
            Some(control) = controls.recv() => {
                match apply_track_control(&mut tracker, control, fences_path, &mut stdout) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => warn!(error = %e, "track_control_failed"),
                }
            }
            _ = &mut ctrl_c => {
                info!("shutdown_signal_received");
                break;
            }
        }
    }

    tracker.stop_playback();
    source.stop();
    reader.abort();

    print_history(&mut stdout, tracker.history(), config.history_display)?;

    if let Some(path) = record {
        match tracker.save_route(route_name) {
            Ok(route) => {
                route.save_json(path)?;
                info!(path = %path.display(), samples = route.len(), "route_written");
            }
            Err(TrackerError::NoHistory) => warn!("no_positions_recorded"),
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

/// Replay a route in real time. Reads `p`, `s <n>` and `q` lines from
/// stdin while playing.
pub async fn run_replay(fences: GeofenceMonitor, route: Route, speed: NonZeroU32) -> Result<()> {
    let (scheduler, mut ticks) = TokioScheduler::channel();
    let player = RoutePlayer::new(scheduler, speed);
    let mut tracker =
        LocationTracker::new(player, TerminalRenderer::stdout(), ConsoleNotifier::new()).with_fences(fences);

    tracker.start_playback(route, speed)?;
    let mut controls = spawn_control_reader(PlaybackControl::parse);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            Some(tick) = ticks.recv() => {
                tracker.on_tick(tick);
                if !tracker.player().is_active() {
                    break;
                }
            }
            Some(control) = controls.recv() => {
                apply_control(&mut tracker, control);
                if !tracker.player().is_active() {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                tracker.stop_playback();
                break;
            }
        }
    }

    Ok(())
}

/// Replay a route without waiting between samples and return the number of
/// geofence alerts raised.
pub fn run_replay_instant<R: Renderer, N: Notifier>(
    fences: GeofenceMonitor,
    route: Route,
    speed: NonZeroU32,
    renderer: R,
    notifier: N,
) -> Result<usize> {
    let scheduler = ManualScheduler::new();
    let player = RoutePlayer::new(scheduler.clone(), speed);
    let mut tracker = LocationTracker::new(player, renderer, notifier).with_fences(fences);

    tracker.start_playback(route, speed)?;

    let mut alerts = 0;
    while let Some(tick) = scheduler.next_tick() {
        alerts += tracker.on_tick(tick).len();
    }

    info!(alerts, "instant_replay_finished");
    Ok(alerts)
}

fn apply_control<S: Scheduler, R: Renderer, N: Notifier>(
    tracker: &mut LocationTracker<S, R, N>,
    control: PlaybackControl,
) {
    info!(control = ?control, "playback_control");
    match control {
        PlaybackControl::TogglePause => tracker.toggle_playback_pause(),
        PlaybackControl::Speed(speed) => tracker.set_playback_speed(speed),
        PlaybackControl::Stop => tracker.stop_playback(),
    }
}

/// Apply one keyboard command to a live session. Rejected commands are
/// reported on `out`; returns `false` once tracking should end.
pub fn apply_track_control<S: Scheduler, R: Renderer, N: Notifier, W: Write>(
    tracker: &mut LocationTracker<S, R, N>,
    control: TrackControl,
    fences_path: &Path,
    out: &mut W,
) -> Result<bool> {
    match control {
        TrackControl::AddFence { name, radius } => match tracker.create_fence(&name, radius) {
            Ok(id) => {
                tracker.fences().save_json(fences_path)?;
                info!(fence = %id, name = %name.trim(), "fence_saved");
            }
            Err(e) => writeln!(out, "{}", e)?,
        },
        TrackControl::RemoveFence(id) => {
            if tracker.delete_fence(id) {
                tracker.fences().save_json(fences_path)?;
                info!(fence = %id, "fence_deleted");
            } else {
                writeln!(out, "No geofence with id {}", id)?;
            }
        }
        TrackControl::Fences => print_fences(out, tracker.fences().list())?,
        TrackControl::Share => print_share(out, tracker.history().last())?,
        TrackControl::Clear => {
            tracker.clear_history();
            info!("history_cleared");
        }
        TrackControl::Load(path) => match Route::load_json(&path) {
            Ok(route) => tracker.load_route(route),
            Err(e) => writeln!(out, "Could not load {}: {}", path.display(), e)?,
        },
        TrackControl::Play(speed) => {
            let speed = speed.unwrap_or_else(|| tracker.player().speed());
            if let Err(e) = tracker.play_history(speed) {
                writeln!(out, "{}", e)?;
            }
        }
        TrackControl::Playback(control) => apply_control(tracker, control),
        TrackControl::Exit => return Ok(false),
    }
    Ok(true)
}

/// Read controls on a plain thread: a blocking stdin read cannot be
/// cancelled and would hold up runtime shutdown.
fn spawn_control_reader<T: Send + 'static>(parse: fn(&str) -> Option<T>) -> mpsc::Receiver<T> {
    let (tx, rx) = mpsc::channel(8);

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse(&line) {
                Some(control) => {
                    if tx.blocking_send(control).is_err() {
                        break;
                    }
                }
                None => warn!(input = %line.trim(), "unknown_control"),
            }
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{MapCommand, RecordingNotifier, RecordingRenderer, SampleOrigin};
    use crate::position::PositionSample;
    use chrono::Utc;
    use tempfile::tempdir;

    type TestTracker = LocationTracker<ManualScheduler, RecordingRenderer, RecordingNotifier>;

    fn tracker() -> TestTracker {
        let player = RoutePlayer::new(ManualScheduler::new(), NonZeroU32::MIN);
        LocationTracker::new(player, RecordingRenderer::new(), RecordingNotifier::new())
    }

    fn at(lat: f64, lng: f64) -> PositionSample {
        PositionSample::new(lat, lng, 5.0, Utc::now())
    }

    fn control(t: &mut TestTracker, line: &str, fences_path: &Path) -> (bool, String) {
        let control = TrackControl::parse(line).unwrap();
        let mut out = Vec::new();
        let keep_going = apply_track_control(t, control, fences_path, &mut out).unwrap();
        (keep_going, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_fence_at_current_fix_is_saved() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("geofences.json");
        let mut t = tracker();

        let (_, out) = control(&mut t, "f Home 100", &path);
        assert_eq!(out, "No current location available. Start tracking first.\n");
        assert!(!path.exists());

        t.on_position(at(42.0, -71.0));
        let (_, out) = control(&mut t, "f Home 5", &path);
        assert_eq!(out, "Radius must be at least 10 meters\n");

        let (_, out) = control(&mut t, "f Home 100", &path);
        assert!(out.is_empty());
        let saved = GeofenceMonitor::load_json(&path).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved.list()[0].name(), "Home");
        assert_eq!(saved.list()[0].center().lat, 42.0);

        let id = saved.list()[0].id();
        let (_, out) = control(&mut t, &format!("d {}", id), &path);
        assert!(out.is_empty());
        assert!(GeofenceMonitor::load_json(&path).unwrap().is_empty());

        let (_, out) = control(&mut t, &format!("d {}", id), &path);
        assert!(out.starts_with("No geofence with id"));
    }

    #[test]
    fn test_share_clear_and_exit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("geofences.json");
        let mut t = tracker();

        let (_, out) = control(&mut t, "share", &path);
        assert_eq!(out, "No location to share\n");

        t.on_position(at(1.5, 2.5));
        let (keep_going, out) = control(&mut t, "share", &path);
        assert!(keep_going);
        assert!(out.contains("https://www.google.com/maps?q=1.5,2.5"));

        control(&mut t, "clear", &path);
        assert!(t.history().is_empty());

        let (keep_going, _) = control(&mut t, "exit", &path);
        assert!(!keep_going);
    }

    #[test]
    fn test_load_and_play_history() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("geofences.json");
        let mut t = tracker();

        let (_, out) = control(&mut t, "play", &path);
        assert_eq!(out, "No route to playback\n");

        let route_path = dir.path().join("walk.json");
        let route = Route::new("Walk".to_string(), Utc::now(), vec![at(0.0, 0.0), at(0.0, 0.001)]);
        route.save_json(&route_path).unwrap();

        let (_, out) = control(&mut t, &format!("load {}", dir.path().join("none.json").display()), &path);
        assert!(out.starts_with("Could not load"));
        control(&mut t, &format!("load {}", route_path.display()), &path);
        assert_eq!(t.history().len(), 2);

        control(&mut t, "play 4", &path);
        assert_eq!(t.player().speed().get(), 4);
        control(&mut t, "p", &path);
        assert!(t.player().session().unwrap().is_paused());
        control(&mut t, "p", &path);

        while let Some(tick) = t.player().scheduler().next_tick() {
            t.on_tick(tick);
        }
        let played = t
            .renderer()
            .shown()
            .iter()
            .filter(|(origin, _)| *origin == SampleOrigin::Playback)
            .count();
        assert_eq!(played, 2);
        assert_eq!(t.renderer().commands.last(), Some(&MapCommand::ClearPlaybackMarker));
    }
}
