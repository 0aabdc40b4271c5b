// src/main.rs
//! Location Tracker - geofence alerts and route playback from the terminal

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use location_tracker::{
    cli::{Cli, Command, FenceCommand},
    config::TrackerConfig,
    display::terminal::{format_fence, print_fences, ConsoleNotifier, TerminalRenderer},
    geofence::{GeofenceId, GeofenceMonitor},
    route::{Route, RouteFormat},
    runtime, PositionSample,
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default level; logs go to stderr so the
    // terminal renderer owns stdout
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TrackerConfig::load_from(path),
        None => TrackerConfig::load(),
    }
    .context("loading configuration")?;
    let fences_path = config.fences_path()?;

    match cli.command {
        Command::Track { host, port, record, name } => {
            let mut config = config;
            if host.is_some() || port.is_some() {
                let host = host.unwrap_or_else(|| config.gpsd_host.clone());
                let port = port.unwrap_or(config.gpsd_port);
                config.update_gpsd(host, port);
            }
            let fences = load_fences(&fences_path)?;
            info!(fences = fences.len(), host = %config.gpsd_host, port = config.gpsd_port, "tracking_started");
            println!("Controls: f <name> <radius> = fence here, d <id> = delete fence, fences, share, clear,");
            println!("          load <file>, play [speed], p = pause/resume, s <n> = speed, q = stop, exit");
            runtime::run_live(&config, fences, &fences_path, record.as_deref(), &name).await?;
        }
        Command::Replay { route, speed, instant } => {
            let route = Route::load_json(&route).with_context(|| format!("loading route {}", route.display()))?;
            let speed = speed.unwrap_or_else(|| config.playback_speed());
            let fences = load_fences(&fences_path)?;
            info!(
                route = %route.name,
                samples = route.len(),
                duration_s = route.duration().map_or(0, |d| d.num_seconds()),
                speed = %speed,
                "replay_started"
            );

            if instant {
                runtime::run_replay_instant(fences, route, speed, TerminalRenderer::stdout(), ConsoleNotifier::new())?;
            } else {
                println!("Controls: p = pause/resume, s <n> = speed, q = stop");
                runtime::run_replay(fences, route, speed).await?;
            }
        }
        Command::Fence { command } => fence_command(&fences_path, command)?,
        Command::Export { route, format, output } => export_route(&route, format, output)?,
    }

    Ok(())
}

fn load_fences(path: &Path) -> anyhow::Result<GeofenceMonitor> {
    GeofenceMonitor::load_json(path).with_context(|| format!("loading geofences from {}", path.display()))
}

fn fence_command(path: &Path, command: FenceCommand) -> anyhow::Result<()> {
    let mut fences = load_fences(path)?;

    match command {
        FenceCommand::List => {
            print_fences(&mut std::io::stdout(), fences.list())?;
            return Ok(());
        }
        FenceCommand::Add { name, radius, lat, lng } => {
            // a manually entered position stands in for the latest fix
            let reference = PositionSample::new(lat, lng, 0.0, Utc::now());
            let fence = fences.add_fence(&name, radius, Some(&reference))?;
            println!("Added {}", format_fence(fence));
        }
        FenceCommand::Remove { id } => {
            let id: GeofenceId = id.parse().with_context(|| format!("invalid geofence id {}", id))?;
            match fences.remove_fence(id) {
                Some(fence) => println!("Removed {}", fence.name()),
                None => println!("No geofence with id {}", id),
            }
        }
    }

    fences.save_json(path)?;
    Ok(())
}

fn export_route(path: &Path, format: RouteFormat, output: Option<PathBuf>) -> anyhow::Result<()> {
    let route = Route::load_json(path).with_context(|| format!("loading route {}", path.display()))?;
    if route.is_empty() {
        bail!("route {} has no samples", route.name);
    }

    let output = output.unwrap_or_else(|| PathBuf::from(format!("{}.{}", route.file_stem(), format.extension())));
    route.export_to_file(&output, format)?;
    println!(
        "Exported {} ({} points, {:.2} km) as {} to {}",
        route.name,
        route.len(),
        route.total_distance() / 1000.0,
        format.display_name(),
        output.display()
    );
    Ok(())
}
