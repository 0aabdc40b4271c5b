// src/position.rs
//! Position samples, accuracy grading and the location history trail

use crate::geo::LatLng;
use crate::route::Route;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Samples coarser than this are dropped once a trail exists
pub const DEFAULT_ACCURACY_THRESHOLD_M: f64 = 100.0;

/// One position fix, as delivered by a live source or by route playback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSample {
    #[serde(alias = "lat")]
    pub latitude: f64,
    #[serde(alias = "lng")]
    pub longitude: f64,
    #[serde(alias = "accuracy", default)]
    pub accuracy_meters: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude_meters: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_mps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_degrees: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl PositionSample {
    /// A bare fix with no altitude, speed or heading
    pub fn new(latitude: f64, longitude: f64, accuracy_meters: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_meters,
            altitude_meters: None,
            speed_mps: None,
            heading_degrees: None,
            timestamp,
        }
    }

    pub fn position(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }

    pub fn quality(&self) -> AccuracyQuality {
        AccuracyQuality::from_accuracy(self.accuracy_meters)
    }

    pub fn speed_kmh(&self) -> Option<f64> {
        self.speed_mps.map(|mps| mps * 3.6)
    }

    /// 8-point compass direction of the heading
    pub fn compass_point(&self) -> Option<&'static str> {
        const DIRECTIONS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
        let heading = self.heading_degrees?;
        if !heading.is_finite() {
            return None;
        }
        let index = (heading / 45.0).round().rem_euclid(8.0) as usize;
        Some(DIRECTIONS[index % 8])
    }

    pub fn share_url(&self) -> String {
        format!("https://www.google.com/maps?q={},{}", self.latitude, self.longitude)
    }

    /// Text for sharing the position with someone else
    pub fn share_text(&self) -> String {
        format!(
            "My location: {:.6}, {:.6}\n{}",
            self.latitude,
            self.longitude,
            self.share_url()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccuracyQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl AccuracyQuality {
    pub fn from_accuracy(meters: f64) -> Self {
        match meters {
            m if m <= 20.0 => AccuracyQuality::Excellent,
            m if m <= 50.0 => AccuracyQuality::Good,
            m if m <= 100.0 => AccuracyQuality::Fair,
            _ => AccuracyQuality::Poor,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AccuracyQuality::Excellent => "Excellent",
            AccuracyQuality::Good => "Good",
            AccuracyQuality::Fair => "Fair",
            AccuracyQuality::Poor => "Poor",
        }
    }
}

/// Drops coarse fixes before they reach the tracker core.
///
/// The very first fix is always accepted so that a trail can start even
/// with a poor signal.
#[derive(Debug, Clone, Copy)]
pub struct AccuracyFilter {
    threshold_m: f64,
}

impl AccuracyFilter {
    pub fn new(threshold_m: f64) -> Self {
        Self { threshold_m }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold_m
    }

    pub fn accepts(&self, sample: &PositionSample, history: &LocationHistory) -> bool {
        !(sample.accuracy_meters > self.threshold_m && !history.is_empty())
    }
}

impl Default for AccuracyFilter {
    fn default() -> Self {
        Self::new(DEFAULT_ACCURACY_THRESHOLD_M)
    }
}

/// Trail of accepted samples in arrival order
#[derive(Debug, Clone, Default)]
pub struct LocationHistory {
    samples: Vec<PositionSample>,
}

impl LocationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: PositionSample) {
        self.samples.push(sample);
    }

    pub fn last(&self) -> Option<&PositionSample> {
        self.samples.last()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn samples(&self) -> &[PositionSample] {
        &self.samples
    }

    /// The last `count` samples, newest first
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &PositionSample> {
        self.samples.iter().rev().take(count)
    }

    /// Replace the trail, e.g. with a loaded route
    pub fn replace(&mut self, samples: Vec<PositionSample>) {
        self.samples = samples;
    }

    pub fn to_route(&self, name: String, recorded_at: DateTime<Utc>) -> Route {
        Route::new(name, recorded_at, self.samples.clone())
    }
}
