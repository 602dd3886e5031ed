// src/shared_data.rs

use crate::road_network::segments::{GeoPoint, RoadClass, RoadSegment};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Severity band assigned by the congestion classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CongestionLevel {
    Low,
    Medium,
    High,
}

impl CongestionLevel {
    /// Levels in ascending severity; index = rank of a cluster centroid.
    pub const ORDERED: [CongestionLevel; 3] = [
        CongestionLevel::Low,
        CongestionLevel::Medium,
        CongestionLevel::High,
    ];

    /// Fixed thresholds used whenever clustering is not possible.
    pub fn from_score(score: f64) -> Self {
        if score < 30.0 {
            CongestionLevel::Low
        } else if score < 70.0 {
            CongestionLevel::Medium
        } else {
            CongestionLevel::High
        }
    }
}

impl fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CongestionLevel::Low => "Low",
            CongestionLevel::Medium => "Medium",
            CongestionLevel::High => "High",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentCoordinates {
    pub start: GeoPoint,
    pub end: GeoPoint,
}

/// Traffic on one road at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadState {
    pub road_id: String,
    pub road_name: String,
    pub vehicle_count: u32,
    /// Always within [0, 100].
    pub congestion_score: f64,
    /// Filled in by the classifier, never by the simulator.
    pub congestion_level: Option<CongestionLevel>,
    pub cluster_id: Option<usize>,
    pub timestamp: DateTime<Local>,
    pub coordinates: SegmentCoordinates,
    pub road_class: RoadClass,
}

impl RoadState {
    /// Unclassified state for `segment`. The score is clamped into [0, 100].
    pub fn new(
        segment: &RoadSegment,
        vehicle_count: u32,
        congestion_score: f64,
        timestamp: DateTime<Local>,
    ) -> Self {
        Self {
            road_id: segment.id.clone(),
            road_name: segment.name.clone(),
            vehicle_count,
            congestion_score: congestion_score.clamp(0.0, 100.0),
            congestion_level: None,
            cluster_id: None,
            timestamp,
            coordinates: SegmentCoordinates {
                start: segment.start,
                end: segment.end,
            },
            road_class: segment.road_class,
        }
    }

    pub fn with_classification(mut self, level: CongestionLevel, cluster_id: usize) -> Self {
        self.congestion_level = Some(level);
        self.cluster_id = Some(cluster_id);
        self
    }
}

/// Every road's state at one shared timestamp. Never modified once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficSnapshot {
    pub timestamp: DateTime<Local>,
    pub roads: Vec<RoadState>,
}

impl TrafficSnapshot {
    pub fn new(timestamp: DateTime<Local>, roads: Vec<RoadState>) -> Self {
        Self { timestamp, roads }
    }

    pub fn len(&self) -> usize {
        self.roads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roads.is_empty()
    }

    pub fn total_vehicles(&self) -> u64 {
        self.roads.iter().map(|r| r.vehicle_count as u64).sum()
    }

    pub fn average_congestion(&self) -> f64 {
        if self.roads.is_empty() {
            return 0.0;
        }
        self.roads.iter().map(|r| r.congestion_score).sum::<f64>() / self.roads.len() as f64
    }

    pub fn congestion_scores(&self) -> Vec<f64> {
        self.roads.iter().map(|r| r.congestion_score).collect()
    }
}

/// Latest state per road id. Rebuilt from scratch for every new snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurrentTrafficIndex {
    roads: HashMap<String, RoadState>,
}

impl CurrentTrafficIndex {
    pub fn from_snapshot(snapshot: &TrafficSnapshot) -> Self {
        let roads = snapshot
            .roads
            .iter()
            .map(|road| (road.road_id.clone(), road.clone()))
            .collect();
        Self { roads }
    }

    pub fn get(&self, road_id: &str) -> Option<&RoadState> {
        self.roads.get(road_id)
    }

    pub fn congestion_of(&self, road_id: &str) -> Option<f64> {
        self.roads.get(road_id).map(|r| r.congestion_score)
    }

    pub fn len(&self) -> usize {
        self.roads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roads.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalySeverity {
    Medium,
    High,
}

impl AnomalySeverity {
    /// High when the decision score is below -0.5.
    pub fn from_score(score: f64) -> Self {
        if score < -0.5 {
            AnomalySeverity::High
        } else {
            AnomalySeverity::Medium
        }
    }
}

/// A road flagged as unusual in the latest snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub road_id: String,
    pub road_name: String,
    /// More negative means more anomalous.
    pub anomaly_score: f64,
    pub severity: AnomalySeverity,
    pub vehicle_count: u32,
    pub congestion_score: f64,
    pub coordinates: SegmentCoordinates,
    pub timestamp: DateTime<Local>,
}

impl AnomalyRecord {
    pub fn from_road(road: &RoadState, anomaly_score: f64) -> Self {
        Self {
            road_id: road.road_id.clone(),
            road_name: road.road_name.clone(),
            anomaly_score,
            severity: AnomalySeverity::from_score(anomaly_score),
            vehicle_count: road.vehicle_count,
            congestion_score: road.congestion_score,
            coordinates: road.coordinates,
            timestamp: road.timestamp,
        }
    }
}

/// Rounds to two decimal places, the precision used in every payload.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_levels() {
        assert_eq!(CongestionLevel::from_score(0.0), CongestionLevel::Low);
        assert_eq!(CongestionLevel::from_score(29.99), CongestionLevel::Low);
        assert_eq!(CongestionLevel::from_score(30.0), CongestionLevel::Medium);
        assert_eq!(CongestionLevel::from_score(69.99), CongestionLevel::Medium);
        assert_eq!(CongestionLevel::from_score(70.0), CongestionLevel::High);
        assert_eq!(CongestionLevel::from_score(100.0), CongestionLevel::High);
    }

    #[test]
    fn test_anomaly_severity_boundary() {
        assert_eq!(AnomalySeverity::from_score(-0.51), AnomalySeverity::High);
        assert_eq!(AnomalySeverity::from_score(-0.5), AnomalySeverity::Medium);
        assert_eq!(AnomalySeverity::from_score(-0.01), AnomalySeverity::Medium);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(12.3449), 12.34);
        assert_eq!(round2(66.666), 66.67);
    }
}
