use crate::config::MapCenter;
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Functional category of a road. Drives base volume and capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoadClass {
    Arterial,
    Collector,
    Local,
}

impl RoadClass {
    pub const ALL: [RoadClass; 3] = [RoadClass::Arterial, RoadClass::Collector, RoadClass::Local];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoadClass::Arterial => "arterial",
            RoadClass::Collector => "collector",
            RoadClass::Local => "local",
        }
    }

    /// Vehicles at which the road counts as fully congested.
    pub fn capacity(&self) -> f64 {
        match self {
            RoadClass::Arterial => 200.0,
            RoadClass::Collector => 100.0,
            RoadClass::Local => 50.0,
        }
    }

    /// Range the simulator draws the base vehicle count from.
    pub fn base_volume_range(&self) -> RangeInclusive<u32> {
        match self {
            RoadClass::Arterial => 50..=150,
            RoadClass::Collector => 20..=80,
            RoadClass::Local => 5..=40,
        }
    }

    /// Small integer encoding of the class label used as a model feature.
    /// FNV-1a over the label, modulo 100, so it never changes between runs.
    pub fn feature_code(&self) -> f64 {
        let mut hash: u32 = 0x811c_9dc5;
        for byte in self.as_str().bytes() {
            hash ^= byte as u32;
            hash = hash.wrapping_mul(0x0100_0193);
        }
        (hash % 100) as f64
    }
}

impl fmt::Display for RoadClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(EngineError::InvalidConfig(format!(
                "coordinate ({}, {}) is out of range",
                lat, lon
            )));
        }
        Ok(Self { lat, lon })
    }

    fn offset(center: MapCenter, dlat: f64, dlon: f64) -> Self {
        Self {
            lat: center.lat + dlat,
            lon: center.lng + dlon,
        }
    }
}

/// A static road segment between two intersections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadSegment {
    pub id: String,
    pub name: String,
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub road_class: RoadClass,
}

impl RoadSegment {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        start: GeoPoint,
        end: GeoPoint,
        road_class: RoadClass,
    ) -> Result<Self> {
        let start = GeoPoint::new(start.lat, start.lon)?;
        let end = GeoPoint::new(end.lat, end.lon)?;
        Ok(Self {
            id: id.into(),
            name: name.into(),
            start,
            end,
            road_class,
        })
    }

    /// Planar length in meters: Euclidean distance in degrees times 111 km.
    pub fn distance_meters(&self) -> f64 {
        let dlat = self.end.lat - self.start.lat;
        let dlon = self.end.lon - self.start.lon;
        (dlat * dlat + dlon * dlon).sqrt() * 111_000.0
    }
}

/// Builds the 15-segment demo network around `center`:
/// five arterials along the diagonal, five collector cross streets and five local avenues.
/// Fails when a segment end falls outside valid latitude/longitude.
pub fn create_road_segments(center: MapCenter) -> Result<Vec<RoadSegment>> {
    type Layout = (&'static str, &'static str, (f64, f64), (f64, f64), RoadClass);
    const LAYOUT: [Layout; 15] = [
        // Arterials (north-south diagonal)
        ("R001", "Main Street", (0.0, 0.0), (0.001, 0.001), RoadClass::Arterial),
        ("R002", "Broadway", (0.001, 0.001), (0.002, 0.002), RoadClass::Arterial),
        ("R003", "Park Avenue", (0.002, 0.002), (0.003, 0.003), RoadClass::Arterial),
        ("R004", "5th Avenue", (0.003, 0.003), (0.004, 0.004), RoadClass::Arterial),
        ("R005", "Madison Ave", (0.004, 0.004), (0.005, 0.005), RoadClass::Arterial),
        // Cross streets (east-west)
        ("R006", "42nd Street", (0.0, 0.0), (0.0, 0.006), RoadClass::Collector),
        ("R007", "34th Street", (0.001, 0.001), (0.001, 0.005), RoadClass::Collector),
        ("R008", "23rd Street", (0.002, 0.002), (0.002, 0.006), RoadClass::Collector),
        ("R009", "14th Street", (0.003, 0.003), (0.003, 0.005), RoadClass::Collector),
        ("R010", "Houston St", (0.004, 0.004), (0.004, 0.006), RoadClass::Collector),
        // Local avenues
        ("R011", "1st Avenue", (0.0, 0.006), (0.005, 0.006), RoadClass::Local),
        ("R012", "2nd Avenue", (0.0, 0.005), (0.005, 0.005), RoadClass::Local),
        ("R013", "3rd Avenue", (0.0, 0.004), (0.005, 0.004), RoadClass::Local),
        ("R014", "Lexington Ave", (0.0, 0.003), (0.005, 0.003), RoadClass::Local),
        ("R015", "Park Ave South", (0.0, 0.002), (0.005, 0.002), RoadClass::Local),
    ];

    LAYOUT
        .iter()
        .map(|&(id, name, (slat, slon), (elat, elon), class)| {
            RoadSegment::new(
                id,
                name,
                GeoPoint::offset(center, slat, slon),
                GeoPoint::offset(center, elat, elon),
                class,
            )
        })
        .collect()
}
