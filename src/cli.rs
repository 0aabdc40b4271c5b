// src/cli.rs
//! Command line interface definitions

use crate::geofence::GeofenceId;
use crate::route::RouteFormat;
use clap::{Parser, Subcommand};
use std::num::NonZeroU32;
use std::path::PathBuf;

/// Personal location tracker with geofence alerts and route playback
#[derive(Parser, Debug)]
#[command(name = "location-tracker", version, about)]
pub struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Follow a gpsd feed and raise geofence alerts
    Track {
        /// gpsd host (overrides the config file)
        #[arg(long)]
        host: Option<String>,
        /// gpsd port (overrides the config file)
        #[arg(long)]
        port: Option<u16>,
        /// Save the trail as a route file when tracking stops
        #[arg(long)]
        record: Option<PathBuf>,
        /// Name of the recorded route
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Replay a recorded route file
    Replay {
        route: PathBuf,
        /// Speed multiplier (samples per second)
        #[arg(short, long)]
        speed: Option<NonZeroU32>,
        /// Run without waiting between samples
        #[arg(long)]
        instant: bool,
    },
    /// Manage geofences
    Fence {
        #[command(subcommand)]
        command: FenceCommand,
    },
    /// Convert a route file to another format
    Export {
        route: PathBuf,
        /// gpx, geojson, kml, csv or json
        #[arg(short, long, default_value = "gpx")]
        format: RouteFormat,
        /// Output file (defaults to the route name with the format extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum FenceCommand {
    /// List geofences
    List,
    /// Add a geofence centred on the given position
    Add {
        name: String,
        #[arg(short, long, default_value_t = 100.0)]
        radius: f64,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
    },
    /// Remove a geofence by id
    Remove { id: String },
}

/// Keyboard control of a running replay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackControl {
    TogglePause,
    Speed(NonZeroU32),
    Stop,
}

impl PlaybackControl {
    /// Parse one input line: `p`, `s <n>` or `q`
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let command = parts.next()?;
        let control = match command {
            "p" | "pause" | "resume" => PlaybackControl::TogglePause,
            "q" | "quit" | "stop" => PlaybackControl::Stop,
            "s" | "speed" => PlaybackControl::Speed(parts.next()?.parse().ok()?),
            _ => return None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(control)
    }
}

/// Keyboard commands accepted while tracking live
#[derive(Debug, Clone, PartialEq)]
pub enum TrackControl {
    /// Fence around the latest fix: `f <name> <radius>`
    AddFence { name: String, radius: f64 },
    /// `d <id>`
    RemoveFence(GeofenceId),
    Fences,
    Share,
    Clear,
    /// Replace the trail with a route file: `load <file>`
    Load(PathBuf),
    /// Replay the trail: `play [speed]`
    Play(Option<NonZeroU32>),
    Playback(PlaybackControl),
    Exit,
}

impl TrackControl {
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let control = match parts.next()? {
            "f" | "fence" => {
                let mut args: Vec<&str> = parts.collect();
                let radius = args.pop()?.parse().ok()?;
                return Some(TrackControl::AddFence {
                    name: args.join(" "),
                    radius,
                });
            }
            "d" | "delete" => TrackControl::RemoveFence(parts.next()?.parse().ok()?),
            "fences" => TrackControl::Fences,
            "share" => TrackControl::Share,
            "clear" => TrackControl::Clear,
            "load" => TrackControl::Load(PathBuf::from(parts.next()?)),
            "play" => TrackControl::Play(match parts.next() {
                Some(speed) => Some(speed.parse().ok()?),
                None => None,
            }),
            "exit" => TrackControl::Exit,
            _ => return PlaybackControl::parse(line).map(TrackControl::Playback),
        };
        if parts.next().is_some() {
            return None;
        }
        Some(control)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_replay() {
        let cli = Cli::parse_from(["location-tracker", "replay", "walk.json", "--speed", "4"]);
        match cli.command {
            Command::Replay { route, speed, instant } => {
                assert_eq!(route, PathBuf::from("walk.json"));
                assert_eq!(speed, NonZeroU32::new(4));
                assert!(!instant);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_zero_speed_rejected() {
        assert!(Cli::try_parse_from(["location-tracker", "replay", "walk.json", "--speed", "0"]).is_err());
    }

    #[test]
    fn test_parse_fence_add() {
        let cli = Cli::parse_from([
            "location-tracker", "fence", "add", "Home", "--radius", "50", "--lat", "42.4", "--lng", "-71.1",
        ]);
        match cli.command {
            Command::Fence {
                command: FenceCommand::Add { name, radius, lat, lng },
            } => {
                assert_eq!(name, "Home");
                assert_eq!(radius, 50.0);
                assert_eq!(lat, 42.4);
                assert_eq!(lng, -71.1);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_playback_controls() {
        assert_eq!(PlaybackControl::parse("p"), Some(PlaybackControl::TogglePause));
        assert_eq!(PlaybackControl::parse(" q "), Some(PlaybackControl::Stop));
        assert_eq!(PlaybackControl::parse("s 8"), Some(PlaybackControl::Speed(NonZeroU32::new(8).unwrap())));
        assert_eq!(PlaybackControl::parse("s 0"), None);
        assert_eq!(PlaybackControl::parse("s"), None);
        assert_eq!(PlaybackControl::parse("p now"), None);
        assert_eq!(PlaybackControl::parse(""), None);
    }

    #[test]
    fn test_track_controls() {
        assert_eq!(
            TrackControl::parse("f Corner Shop 40"),
            Some(TrackControl::AddFence {
                name: "Corner Shop".to_string(),
                radius: 40.0
            })
        );
        assert_eq!(
            TrackControl::parse("f 40"),
            Some(TrackControl::AddFence {
                name: String::new(),
                radius: 40.0
            })
        );
        assert_eq!(TrackControl::parse("f Home"), None);

        let id = GeofenceId::generate();
        assert_eq!(TrackControl::parse(&format!("d {}", id)), Some(TrackControl::RemoveFence(id)));
        assert_eq!(TrackControl::parse("d nope"), None);

        assert_eq!(TrackControl::parse("share"), Some(TrackControl::Share));
        assert_eq!(TrackControl::parse("clear"), Some(TrackControl::Clear));
        assert_eq!(TrackControl::parse("fences"), Some(TrackControl::Fences));
        assert_eq!(TrackControl::parse("load walk.json"), Some(TrackControl::Load(PathBuf::from("walk.json"))));
        assert_eq!(TrackControl::parse("play"), Some(TrackControl::Play(None)));
        assert_eq!(TrackControl::parse("play 5"), Some(TrackControl::Play(NonZeroU32::new(5))));
        assert_eq!(TrackControl::parse("play 0"), None);
        assert_eq!(TrackControl::parse("exit"), Some(TrackControl::Exit));
        assert_eq!(
            TrackControl::parse("p"),
            Some(TrackControl::Playback(PlaybackControl::TogglePause))
        );
        assert_eq!(TrackControl::parse("q"), Some(TrackControl::Playback(PlaybackControl::Stop)));
        assert_eq!(TrackControl::parse("share now"), None);
        assert_eq!(TrackControl::parse("jump"), None);
    }
}
