// src/route.rs
//! Recorded routes: import/export and track formats

use crate::error::{Result, TrackerError};
use crate::geo::distance_meters;
use crate::position::PositionSample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// A named, timestamped sequence of samples in recorded order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub name: String,
    #[serde(alias = "date")]
    pub recorded_at: DateTime<Utc>,
    #[serde(alias = "locations")]
    pub samples: Vec<PositionSample>,
}

impl Route {
    pub fn new(name: String, recorded_at: DateTime<Utc>, samples: Vec<PositionSample>) -> Self {
        Self {
            name,
            recorded_at,
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sum of great-circle legs between consecutive samples, in meters
    pub fn total_distance(&self) -> f64 {
        self.samples
            .windows(2)
            .map(|pair| distance_meters(pair[0].position(), pair[1].position()))
            .sum()
    }

    /// Time between the first and the last sample
    pub fn duration(&self) -> Option<chrono::Duration> {
        let first = self.samples.first()?;
        let last = self.samples.last()?;
        Some(last.timestamp.signed_duration_since(first.timestamp))
    }

    /// File name stem safe for any filesystem
    pub fn file_stem(&self) -> String {
        self.name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        self.export_to_file(path, RouteFormat::Json)
    }

    pub fn export_to_file(&self, path: &Path, format: RouteFormat) -> Result<()> {
        let content = self.render(format)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn render(&self, format: RouteFormat) -> Result<String> {
        if self.samples.is_empty() {
            return Err(TrackerError::NoHistory);
        }

        Ok(match format {
            RouteFormat::Json => serde_json::to_string_pretty(self)?,
            RouteFormat::GPX => self.to_gpx(),
            RouteFormat::GeoJSON => self.to_geojson()?,
            RouteFormat::KML => self.to_kml(),
            RouteFormat::CSV => self.to_csv(),
        })
    }

    fn to_gpx(&self) -> String {
        let mut gpx = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="Location Tracker" xmlns="http://www.topografix.com/GPX/1/1">
"#,
        );
        gpx.push_str("  <trk>\n");
        gpx.push_str(&format!("    <name>{}</name>\n", escape_xml(&self.name)));
        gpx.push_str("    <trkseg>\n");

        for sample in &self.samples {
            gpx.push_str(&format!(
                "      <trkpt lat=\"{}\" lon=\"{}\">\n",
                sample.latitude, sample.longitude
            ));
            if let Some(ele) = sample.altitude_meters {
                gpx.push_str(&format!("        <ele>{}</ele>\n", ele));
            }
            gpx.push_str(&format!("        <time>{}</time>\n", sample.timestamp.to_rfc3339()));
            gpx.push_str("      </trkpt>\n");
        }

        gpx.push_str("    </trkseg>\n  </trk>\n</gpx>\n");
        gpx
    }

    fn to_geojson(&self) -> Result<String> {
        let coordinates: Vec<serde_json::Value> = self
            .samples
            .iter()
            .map(|s| serde_json::json!([s.longitude, s.latitude, s.altitude_meters.unwrap_or(0.0)]))
            .collect();
        let times: Vec<String> = self.samples.iter().map(|s| s.timestamp.to_rfc3339()).collect();

        let feature_collection = serde_json::json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {
                    "type": "LineString",
                    "coordinates": coordinates
                },
                "properties": {
                    "name": self.name,
                    "recordedAt": self.recorded_at.to_rfc3339(),
                    "times": times
                }
            }]
        });

        Ok(serde_json::to_string_pretty(&feature_collection)?)
    }

    fn to_kml(&self) -> String {
        let mut kml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
"#,
        );
        kml.push_str(&format!("    <name>{}</name>\n", escape_xml(&self.name)));
        kml.push_str("    <Placemark>\n");
        kml.push_str(&format!(
            "      <TimeSpan><begin>{}</begin><end>{}</end></TimeSpan>\n",
            self.samples[0].timestamp.to_rfc3339(),
            self.samples[self.samples.len() - 1].timestamp.to_rfc3339()
        ));
        kml.push_str("      <LineString>\n        <coordinates>\n");
        for sample in &self.samples {
            kml.push_str(&format!(
                "          {},{},{}\n",
                sample.longitude,
                sample.latitude,
                sample.altitude_meters.unwrap_or(0.0)
            ));
        }
        kml.push_str("        </coordinates>\n      </LineString>\n");
        kml.push_str("    </Placemark>\n  </Document>\n</kml>\n");
        kml
    }

    fn to_csv(&self) -> String {
        let mut csv = String::from("timestamp,latitude,longitude,accuracy,altitude,speed,heading\n");

        for sample in &self.samples {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{}\n",
                sample.timestamp.to_rfc3339(),
                sample.latitude,
                sample.longitude,
                sample.accuracy_meters,
                optional(sample.altitude_meters),
                optional(sample.speed_mps),
                optional(sample.heading_degrees)
            ));
        }

        csv
    }
}

fn optional(value: Option<f64>) -> String {
    value.map_or(String::new(), |v| v.to_string())
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RouteFormat {
    Json,
    GPX,
    GeoJSON,
    KML,
    CSV,
}

impl RouteFormat {
    pub fn extension(&self) -> &str {
        match self {
            RouteFormat::Json => "json",
            RouteFormat::GPX => "gpx",
            RouteFormat::GeoJSON => "geojson",
            RouteFormat::KML => "kml",
            RouteFormat::CSV => "csv",
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            RouteFormat::Json => "Route JSON",
            RouteFormat::GPX => "GPX (GPS Exchange)",
            RouteFormat::GeoJSON => "GeoJSON",
            RouteFormat::KML => "KML (Keyhole)",
            RouteFormat::CSV => "CSV",
        }
    }
}

impl FromStr for RouteFormat {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(RouteFormat::Json),
            "gpx" => Ok(RouteFormat::GPX),
            "geojson" => Ok(RouteFormat::GeoJSON),
            "kml" => Ok(RouteFormat::KML),
            "csv" => Ok(RouteFormat::CSV),
            other => Err(TrackerError::Parse(format!("Unknown route format: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn route() -> Route {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let mut first = PositionSample::new(42.0, -71.0, 5.0, start);
        first.altitude_meters = Some(100.0);
        let second = PositionSample::new(42.001, -71.0, 8.0, start + chrono::Duration::seconds(30));
        Route::new("Morning <walk>".to_string(), start, vec![first, second])
    }

    #[test]
    fn test_distance_and_duration() {
        let r = route();
        assert!((r.total_distance() - 111.19).abs() < 0.1);
        assert_eq!(r.duration(), Some(chrono::Duration::seconds(30)));
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(route().file_stem(), "Morning__walk_");
    }

    #[test]
    fn test_gpx_export() {
        let gpx = route().render(RouteFormat::GPX).unwrap();
        assert!(gpx.contains("<gpx"));
        assert!(gpx.contains("<name>Morning &lt;walk&gt;</name>"));
        assert!(gpx.contains("<trkpt lat=\"42\" lon=\"-71\">"));
        assert!(gpx.contains("<ele>100</ele>"));
        assert_eq!(gpx.matches("<trkpt").count(), 2);
    }

    #[test]
    fn test_geojson_export() {
        let json = route().render(RouteFormat::GeoJSON).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let geometry = &value["features"][0]["geometry"];
        assert_eq!(geometry["type"], "LineString");
        assert_eq!(geometry["coordinates"][0][0], -71.0);
        assert_eq!(geometry["coordinates"][0][1], 42.0);
    }

    #[test]
    fn test_csv_export() {
        let csv = route().render(RouteFormat::CSV).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("timestamp,latitude,longitude,accuracy,altitude,speed,heading"));
        assert_eq!(lines.next(), Some("2024-05-01T08:00:00+00:00,42,-71,5,100,,"));
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn test_empty_route_not_exported() {
        let empty = Route::new("Empty".to_string(), Utc::now(), Vec::new());
        assert!(matches!(empty.render(RouteFormat::KML), Err(TrackerError::NoHistory)));
    }

    #[test]
    fn test_legacy_route_file() {
        let json = r#"{
            "name": "Old",
            "date": "2024-05-01T08:00:00.000Z",
            "locations": [
                {"lat": 1.0, "lng": 2.0, "timestamp": "2024-05-01T08:00:00.000Z", "accuracy": 10},
                {"lat": 1.5, "lng": 2.5, "timestamp": "2024-05-01T08:00:01.000Z", "accuracy": 12}
            ]
        }"#;

        let r = Route::from_json(json).unwrap();
        assert_eq!(r.name, "Old");
        assert_eq!(r.len(), 2);
        assert_eq!(r.samples[1].latitude, 1.5);
    }

    #[test]
    fn test_invalid_route_file() {
        assert!(Route::from_json(r#"{"name":"x","locations":"nope"}"#).is_err());
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("GPX".parse::<RouteFormat>().unwrap(), RouteFormat::GPX);
        assert_eq!("geojson".parse::<RouteFormat>().unwrap().extension(), "geojson");
        assert!("shp".parse::<RouteFormat>().is_err());
    }
}
