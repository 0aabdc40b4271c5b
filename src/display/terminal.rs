// src/display/terminal.rs
//! Terminal renderer and console notifier

use super::{MapCommand, Notifier, Renderer, SampleOrigin};
use crate::geofence::{FenceEventKind, Geofence};
use crate::position::{AccuracyQuality, LocationHistory, PositionSample};
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, Write};
use tracing::warn;

/// Prints one line per map command
pub struct TerminalRenderer<W: Write> {
    out: W,
}

impl TerminalRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, color: Color, tag: &str, text: &str) -> io::Result<()> {
        execute!(
            self.out,
            SetForegroundColor(color),
            Print(format!("{:<6}", tag)),
            ResetColor,
            Print(text),
            Print("\n")
        )
    }

    fn draw(&mut self, command: &MapCommand) -> io::Result<()> {
        match command {
            MapCommand::ShowPosition { sample, origin } => {
                let (color, tag) = match origin {
                    SampleOrigin::Live => (quality_color(sample.quality()), "LIVE"),
                    SampleOrigin::Playback => (Color::Blue, "PLAY"),
                };
                self.line(color, tag, &format_position(sample))
            }
            MapCommand::DrawFence(fence) => self.line(Color::DarkYellow, "FENCE", &format_fence(fence)),
            MapCommand::RemoveFence(id) => self.line(Color::DarkGrey, "FENCE", &format!("removed {}", id)),
            MapCommand::GeofenceEvent { fence_name, event } => {
                let (color, verb) = match event.kind {
                    FenceEventKind::Entered => (Color::Green, "Entered"),
                    FenceEventKind::Left => (Color::Yellow, "Left"),
                };
                self.line(
                    color,
                    "ALERT",
                    &format!("{} {} at {}", verb, fence_name, event.timestamp.format("%H:%M:%S")),
                )
            }
            MapCommand::ClearPlaybackMarker => self.line(Color::Blue, "PLAY", "playback ended"),
        }
    }
}

impl<W: Write> Renderer for TerminalRenderer<W> {
    fn render(&mut self, command: MapCommand) {
        if let Err(e) = self.draw(&command).and_then(|_| self.out.flush()) {
            warn!(error = %e, "terminal_render_failed");
        }
    }
}

fn quality_color(quality: AccuracyQuality) -> Color {
    match quality {
        AccuracyQuality::Excellent => Color::Green,
        AccuracyQuality::Good => Color::DarkGreen,
        AccuracyQuality::Fair => Color::DarkYellow,
        AccuracyQuality::Poor => Color::Red,
    }
}

/// One-line summary of a fix
pub fn format_position(sample: &PositionSample) -> String {
    let mut text = format!(
        "{} {:>11.6}, {:>11.6}  ±{:.0}m ({})",
        sample.timestamp.format("%H:%M:%S"),
        sample.latitude,
        sample.longitude,
        sample.accuracy_meters,
        sample.quality().description()
    );

    if let Some(alt) = sample.altitude_meters {
        text.push_str(&format!("  alt {:.0}m", alt));
    }
    if let Some(kmh) = sample.speed_kmh() {
        text.push_str(&format!("  {:.1} km/h", kmh));
    }
    if let (Some(heading), Some(point)) = (sample.heading_degrees, sample.compass_point()) {
        text.push_str(&format!("  {:.0}° ({})", heading, point));
    }

    text
}

pub fn format_fence(fence: &Geofence) -> String {
    format!(
        "{}  {:.6}, {:.6} • {}m radius  [{}]",
        fence.name(),
        fence.center().lat,
        fence.center().lng,
        fence.radius_meters(),
        fence.id()
    )
}

/// Print the fence list, one fence per line
pub fn print_fences<W: Write>(out: &mut W, fences: &[Geofence]) -> io::Result<()> {
    if fences.is_empty() {
        return writeln!(out, "No geofences defined");
    }
    for fence in fences {
        writeln!(out, "{}", format_fence(fence))?;
    }
    Ok(())
}

/// Print the newest `count` history entries, newest first
pub fn print_history<W: Write>(out: &mut W, history: &LocationHistory, count: usize) -> io::Result<()> {
    if history.is_empty() {
        return writeln!(out, "No history available");
    }
    let total = history.len();
    for (offset, sample) in history.recent(count).enumerate() {
        writeln!(
            out,
            "#{:<4} {}  {:.6}, {:.6}",
            total - offset,
            sample.timestamp.format("%H:%M:%S"),
            sample.latitude,
            sample.longitude
        )?;
    }
    Ok(())
}

/// Print the share text for the latest fix
pub fn print_share<W: Write>(out: &mut W, latest: Option<&PositionSample>) -> io::Result<()> {
    match latest {
        Some(sample) => writeln!(out, "{}", sample.share_text()),
        None => writeln!(out, "No location to share"),
    }
}

/// Prints alerts to the terminal and rings the bell
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&mut self, title: &str, message: &str) {
        let mut stdout = io::stdout();
        let result = execute!(
            stdout,
            Print("\x07"),
            SetForegroundColor(Color::Magenta),
            Print(format!("{}: ", title)),
            ResetColor,
            Print(message),
            Print("\n")
        );
        if let Err(e) = result {
            warn!(error = %e, "notification_failed");
        }
    }
}
