// src/source/gpsd.rs
//! GPSD client implementation

use crate::error::{Result, TrackerError};
use crate::position::PositionSample;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::TcpStream,
};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct GpsdMessage {
    class: String,
    #[serde(flatten)]
    data: HashMap<String, serde_json::Value>,
}

/// Connect to a gpsd daemon and return a stream reader
pub async fn connect_gpsd(host: &str, port: u16) -> Result<BufReader<TcpStream>> {
    let mut stream = TcpStream::connect(format!("{}:{}", host, port))
        .await
        .map_err(|e| TrackerError::Connection(format!("Failed to connect to gpsd at {}:{}: {}", host, port, e)))?;

    // Send WATCH command to start receiving JSON data
    stream
        .write_all(b"?WATCH={\"enable\":true,\"json\":true}\n")
        .await
        .map_err(|e| TrackerError::Connection(format!("Failed to send WATCH command: {}", e)))?;

    Ok(BufReader::new(stream))
}

/// Parse a single line of gpsd JSON.
///
/// Returns a sample for TPV reports carrying a position; every other report
/// yields `None`.
pub fn parse_gpsd_json(line: &str) -> Result<Option<PositionSample>> {
    let msg: GpsdMessage = serde_json::from_str(line)
        .map_err(|e| TrackerError::Parse(format!("Failed to parse gpsd JSON: {}", e)))?;

    match msg.class.as_str() {
        "TPV" => Ok(parse_tpv_message(&msg.data)),
        "VERSION" => {
            if let Some(version) = msg.data.get("release").and_then(|v| v.as_str()) {
                info!(version = %version, "gpsd_version");
            }
            Ok(None)
        }
        "DEVICES" => {
            if let Some(devices) = msg.data.get("devices").and_then(|v| v.as_array()) {
                for path in devices.iter().filter_map(|d| d.get("path").and_then(|p| p.as_str())) {
                    info!(device = %path, "gpsd_device");
                }
            }
            Ok(None)
        }
        other => {
            debug!(class = %other, "gpsd_report_ignored");
            Ok(None)
        }
    }
}

/// Parse TPV (Time Position Velocity) message
fn parse_tpv_message(msg_data: &HashMap<String, serde_json::Value>) -> Option<PositionSample> {
    let field = |key: &str| msg_data.get(key).and_then(|v| v.as_f64());

    let latitude = field("lat")?;
    let longitude = field("lon")?;

    // Horizontal error estimate: eph, or the larger of the axis errors
    let accuracy = field("eph")
        .or_else(|| match (field("epx"), field("epy")) {
            (Some(x), Some(y)) => Some(x.max(y)),
            (x, y) => x.or(y),
        })
        .unwrap_or(0.0);

    let timestamp = msg_data
        .get("time")
        .and_then(|v| v.as_str())
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    Some(PositionSample {
        latitude,
        longitude,
        accuracy_meters: accuracy,
        altitude_meters: field("altMSL").or_else(|| field("alt")),
        speed_mps: field("speed"),
        heading_degrees: field("track"),
        timestamp,
    })
}
