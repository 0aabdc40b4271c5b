// src/geofence.rs
//! Circular geofences with edge-triggered entry/exit detection

use crate::error::{FenceError, Result};
use crate::geo::{distance_meters, LatLng};
use crate::position::PositionSample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};
use uuid::{Builder, Uuid};

/// Smallest radius a fence may be created with
pub const MIN_RADIUS_M: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct GeofenceId(Uuid);

impl GeofenceId {
    /// Time-ordered identifier taken at creation
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Id for a fence saved with a creation time in epoch milliseconds.
    /// The same millisecond value always maps to the same id.
    pub fn from_millis(millis: u64) -> Self {
        Self(Builder::from_unix_timestamp_millis(millis, &[0; 10]).into_uuid())
    }
}

/// Fence files written by older versions used the creation time in
/// milliseconds as the id
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredId {
    Uuid(Uuid),
    Millis(u64),
}

impl<'de> Deserialize<'de> for GeofenceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match StoredId::deserialize(deserializer)? {
            StoredId::Uuid(uuid) => Self(uuid),
            StoredId::Millis(millis) => Self::from_millis(millis),
        })
    }
}

impl fmt::Display for GeofenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for GeofenceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Ok(millis) = s.parse::<u64>() {
            return Ok(Self::from_millis(millis));
        }
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Geofence {
    id: GeofenceId,
    name: String,
    center: LatLng,
    radius_meters: f64,
    inside: bool,
}

impl Geofence {
    pub fn id(&self) -> GeofenceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn center(&self) -> LatLng {
        self.center
    }

    pub fn radius_meters(&self) -> f64 {
        self.radius_meters
    }

    /// Classification against the last evaluated sample
    pub fn is_inside(&self) -> bool {
        self.inside
    }

    pub fn contains(&self, position: LatLng) -> bool {
        distance_meters(position, self.center) <= self.radius_meters
    }

    pub fn to_record(&self) -> FenceRecord {
        FenceRecord {
            id: self.id,
            name: self.name.clone(),
            lat: self.center.lat,
            lng: self.center.lng,
            radius_meters: self.radius_meters,
        }
    }
}

/// Persisted form of a fence; the inside flag is never stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FenceRecord {
    pub id: GeofenceId,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(alias = "radius")]
    pub radius_meters: f64,
}

impl From<FenceRecord> for Geofence {
    fn from(record: FenceRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            center: LatLng::new(record.lat, record.lng),
            radius_meters: record.radius_meters,
            inside: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FenceEventKind {
    Entered,
    Left,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceEvent {
    pub geofence_id: GeofenceId,
    pub kind: FenceEventKind,
    pub timestamp: DateTime<Utc>,
}

/// Owns the fence set and the inside/outside state of every fence
#[derive(Debug, Default)]
pub struct GeofenceMonitor {
    fences: Vec<Geofence>,
}

impl GeofenceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore fences from their persisted form, all outside
    pub fn from_records(records: Vec<FenceRecord>) -> Self {
        Self {
            fences: records.into_iter().map(Geofence::from).collect(),
        }
    }

    /// Create a fence centred on the reference sample.
    ///
    /// The new fence starts outside and is not evaluated against the
    /// reference sample; entry is detected on the next evaluated sample.
    pub fn add_fence(
        &mut self,
        name: &str,
        radius_meters: f64,
        reference: Option<&PositionSample>,
    ) -> std::result::Result<&Geofence, FenceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FenceError::InvalidName);
        }
        // also rejects NaN
        if !(radius_meters >= MIN_RADIUS_M) {
            return Err(FenceError::InvalidRadius);
        }
        let reference = reference.ok_or(FenceError::NoReferencePosition)?;

        let fence = Geofence {
            id: GeofenceId::generate(),
            name: name.to_string(),
            center: reference.position(),
            radius_meters,
            inside: false,
        };

        info!(
            id = %fence.id,
            name = %fence.name,
            lat = %fence.center.lat,
            lng = %fence.center.lng,
            radius_m = %radius_meters,
            "fence_created"
        );

        self.fences.push(fence);
        Ok(&self.fences[self.fences.len() - 1])
    }

    /// Remove a fence; unknown ids are ignored
    pub fn remove_fence(&mut self, id: GeofenceId) -> Option<Geofence> {
        let index = self.fences.iter().position(|f| f.id == id)?;
        let fence = self.fences.remove(index);
        info!(id = %id, name = %fence.name, "fence_removed");
        Some(fence)
    }

    /// Classify the sample against every fence, in insertion order, and
    /// report the fences whose state changed.
    pub fn evaluate(&mut self, sample: &PositionSample) -> Vec<GeofenceEvent> {
        let position = sample.position();
        let mut events = Vec::new();

        for fence in &mut self.fences {
            let distance = distance_meters(position, fence.center);
            let is_inside = distance <= fence.radius_meters;

            let kind = match (is_inside, fence.inside) {
                (true, false) => FenceEventKind::Entered,
                (false, true) => FenceEventKind::Left,
                _ => continue,
            };
            fence.inside = is_inside;

            debug!(
                id = %fence.id,
                name = %fence.name,
                distance_m = %format!("{:.1}", distance),
                kind = ?kind,
                "fence_transition"
            );

            events.push(GeofenceEvent {
                geofence_id: fence.id,
                kind,
                timestamp: sample.timestamp,
            });
        }

        events
    }

    pub fn list(&self) -> &[Geofence] {
        &self.fences
    }

    pub fn get(&self, id: GeofenceId) -> Option<&Geofence> {
        self.fences.iter().find(|f| f.id == id)
    }

    pub fn len(&self) -> usize {
        self.fences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }

    pub fn to_records(&self) -> Vec<FenceRecord> {
        self.fences.iter().map(Geofence::to_record).collect()
    }

    /// Load fences saved with [`GeofenceMonitor::save_json`]; a missing file
    /// is an empty set.
    pub fn load_json(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let contents = std::fs::read_to_string(path)?;
        let records: Vec<FenceRecord> = serde_json::from_str(&contents)?;
        debug!(path = %path.display(), count = records.len(), "fences_loaded");
        Ok(Self::from_records(records))
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.to_records())?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(lat: f64, lng: f64) -> PositionSample {
        PositionSample::new(lat, lng, 5.0, Utc::now())
    }

    fn kinds(events: &[GeofenceEvent]) -> Vec<FenceEventKind> {
        events.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_add_fence_validation() {
        let mut monitor = GeofenceMonitor::new();
        let origin = at(0.0, 0.0);

        assert_eq!(monitor.add_fence("   ", 100.0, Some(&origin)).unwrap_err(), FenceError::InvalidName);
        assert_eq!(monitor.add_fence("Home", 9.9, Some(&origin)).unwrap_err(), FenceError::InvalidRadius);
        assert_eq!(monitor.add_fence("Home", f64::NAN, Some(&origin)).unwrap_err(), FenceError::InvalidRadius);
        assert_eq!(monitor.add_fence("Home", 100.0, None).unwrap_err(), FenceError::NoReferencePosition);
        assert!(monitor.is_empty());

        let fence = monitor.add_fence("  Home ", 10.0, Some(&origin)).unwrap();
        assert_eq!(fence.name(), "Home");
        assert_eq!(fence.radius_meters(), 10.0);
        assert!(!fence.is_inside());
        assert_eq!(monitor.len(), 1);
    }

    #[test]
    fn test_inside_and_outside() {
        let mut monitor = GeofenceMonitor::new();
        let id = monitor.add_fence("Origin", 1000.0, Some(&at(0.0, 0.0))).unwrap().id();

        let fence = monitor.get(id).unwrap();
        assert!(fence.contains(LatLng::new(0.0, 0.0)));
        assert!(!fence.contains(LatLng::new(10.0, 10.0)));
    }

    #[test]
    fn test_edge_triggered_events() {
        let mut monitor = GeofenceMonitor::new();
        let id = monitor.add_fence("Origin", 1000.0, Some(&at(0.0, 0.0))).unwrap().id();

        let mut all = Vec::new();
        for sample in [at(10.0, 10.0), at(0.0, 0.0), at(0.001, 0.001), at(10.0, 10.0)] {
            all.extend(monitor.evaluate(&sample));
        }

        assert_eq!(kinds(&all), vec![FenceEventKind::Entered, FenceEventKind::Left]);
        assert!(all.iter().all(|e| e.geofence_id == id));
        assert!(!monitor.get(id).unwrap().is_inside());
    }

    #[test]
    fn test_created_inside_fires_on_next_evaluation() {
        let mut monitor = GeofenceMonitor::new();
        let here = at(51.5007, -0.1246);
        monitor.add_fence("Here", 50.0, Some(&here)).unwrap();

        // Creating the fence does not classify the reference sample
        assert!(!monitor.list()[0].is_inside());

        let events = monitor.evaluate(&here);
        assert_eq!(kinds(&events), vec![FenceEventKind::Entered]);

        // Steady state: no repeated event
        assert!(monitor.evaluate(&here).is_empty());
    }

    #[test]
    fn test_radius_boundary_is_inside() {
        let center = at(0.0, 0.0);
        let edge = at(0.0, 0.001);
        let radius = distance_meters(edge.position(), center.position());
        assert!(radius > MIN_RADIUS_M);

        let mut monitor = GeofenceMonitor::new();
        monitor.add_fence("Edge", radius, Some(&center)).unwrap();

        // exactly on the circle counts as inside
        assert_eq!(kinds(&monitor.evaluate(&edge)), vec![FenceEventKind::Entered]);
        assert!(monitor.evaluate(&edge).is_empty());

        // ~11 m past the circle
        let beyond = at(0.0, 0.0011);
        assert!(distance_meters(beyond.position(), center.position()) > radius);
        assert_eq!(kinds(&monitor.evaluate(&beyond)), vec![FenceEventKind::Left]);
    }

    #[test]
    fn test_events_follow_insertion_order() {
        let mut monitor = GeofenceMonitor::new();
        let a = monitor.add_fence("A", 500.0, Some(&at(0.0, 0.0))).unwrap().id();
        let b = monitor.add_fence("B", 2000.0, Some(&at(0.0, 0.0))).unwrap().id();
        let c = monitor.add_fence("C", 100.0, Some(&at(5.0, 5.0))).unwrap().id();

        let events = monitor.evaluate(&at(0.0, 0.0));
        let ids: Vec<GeofenceId> = events.iter().map(|e| e.geofence_id).collect();
        assert_eq!(ids, vec![a, b]);
        assert!(!monitor.get(c).unwrap().is_inside());
    }

    #[test]
    fn test_event_timestamp_is_sample_time() {
        let mut monitor = GeofenceMonitor::new();
        monitor.add_fence("Origin", 100.0, Some(&at(0.0, 0.0))).unwrap();

        let sample = at(0.0, 0.0);
        let events = monitor.evaluate(&sample);
        assert_eq!(events[0].timestamp, sample.timestamp);
    }

    #[test]
    fn test_remove_fence() {
        let mut monitor = GeofenceMonitor::new();
        let id = monitor.add_fence("Gone", 100.0, Some(&at(0.0, 0.0))).unwrap().id();

        assert!(monitor.remove_fence(GeofenceId::generate()).is_none());
        assert_eq!(monitor.len(), 1);

        let removed = monitor.remove_fence(id).unwrap();
        assert_eq!(removed.name(), "Gone");
        assert!(monitor.is_empty());
        assert!(monitor.evaluate(&at(0.0, 0.0)).is_empty());
    }

    #[test]
    fn test_records_restore_outside() {
        let mut monitor = GeofenceMonitor::new();
        monitor.add_fence("Home", 100.0, Some(&at(42.0, -71.0))).unwrap();
        monitor.add_fence("Work", 250.0, Some(&at(42.1, -71.1))).unwrap();
        monitor.evaluate(&at(42.0, -71.0));
        assert!(monitor.list()[0].is_inside());

        let json = serde_json::to_string(&monitor.to_records()).unwrap();
        let records: Vec<FenceRecord> = serde_json::from_str(&json).unwrap();
        let restored = GeofenceMonitor::from_records(records);

        assert_eq!(restored.len(), 2);
        for (before, after) in monitor.list().iter().zip(restored.list()) {
            assert_eq!(before.id(), after.id());
            assert_eq!(before.name(), after.name());
            assert_eq!(before.center(), after.center());
            assert_eq!(before.radius_meters(), after.radius_meters());
            assert!(!after.is_inside());
        }
    }

    #[test]
    fn test_numeric_ids_are_stable() {
        let record: FenceRecord =
            serde_json::from_str(r#"{"id": 1718000000000, "name": "Old", "lat": 1.0, "lng": 2.0, "radius": 50}"#)
                .unwrap();
        assert_eq!(record.id, GeofenceId::from_millis(1_718_000_000_000));
        assert_eq!(record.radius_meters, 50.0);
        assert_eq!("1718000000000".parse::<GeofenceId>().unwrap(), record.id);

        // saved again as a uuid string, it reads back unchanged
        let json = serde_json::to_string(&record).unwrap();
        let again: FenceRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(again.id, record.id);
        assert!(GeofenceId::from_millis(1) < GeofenceId::from_millis(2));
    }

    #[test]
    fn test_record_shape() {
        let mut monitor = GeofenceMonitor::new();
        monitor.add_fence("Home", 100.0, Some(&at(42.0, -71.0))).unwrap();

        let value = serde_json::to_value(monitor.to_records()).unwrap();
        let record = &value[0];
        assert_eq!(record["name"], "Home");
        assert_eq!(record["lat"], 42.0);
        assert_eq!(record["lng"], -71.0);
        assert_eq!(record["radiusMeters"], 100.0);
        assert!(record["id"].is_string());
        assert!(record.get("inside").is_none());
    }
}
