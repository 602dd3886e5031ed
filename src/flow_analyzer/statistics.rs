// statistics.rs
//
// Dashboard payloads: aggregate traffic statistics and model status.

use crate::flow_analyzer::classifier::CongestionDistribution;
use crate::road_network::segments::RoadClass;
use crate::shared_data::{round2, RoadState, TrafficSnapshot};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Number of snapshots in the historical trend.
pub const TREND_LENGTH: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentStats {
    pub total_vehicles: u64,
    pub average_congestion: f64,
    pub total_roads: usize,
    pub timestamp: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadClassStats {
    pub count: usize,
    pub avg_congestion: f64,
    pub total_vehicles: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub timestamp: DateTime<Local>,
    pub avg_congestion: f64,
    pub total_vehicles: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficStats {
    pub current_stats: CurrentStats,
    pub congestion_distribution: CongestionDistribution,
    pub road_type_stats: BTreeMap<RoadClass, RoadClassStats>,
    pub historical_trend: Vec<TrendPoint>,
    pub anomaly_count: usize,
}

impl TrafficStats {
    /// `classified` are the latest snapshot's roads after classification;
    /// `trend` the most recent snapshots, oldest first.
    pub fn compute(
        latest: &TrafficSnapshot,
        classified: &[RoadState],
        trend: &[Arc<TrafficSnapshot>],
        anomaly_count: usize,
    ) -> Self {
        let mut road_type_stats = BTreeMap::new();
        for class in RoadClass::ALL {
            let roads: Vec<&RoadState> = latest
                .roads
                .iter()
                .filter(|r| r.road_class == class)
                .collect();
            if roads.is_empty() {
                continue;
            }
            let total_score: f64 = roads.iter().map(|r| r.congestion_score).sum();
            road_type_stats.insert(
                class,
                RoadClassStats {
                    count: roads.len(),
                    avg_congestion: round2(total_score / roads.len() as f64),
                    total_vehicles: roads.iter().map(|r| r.vehicle_count as u64).sum(),
                },
            );
        }

        let historical_trend = trend
            .iter()
            .map(|s| TrendPoint {
                timestamp: s.timestamp,
                avg_congestion: round2(s.average_congestion()),
                total_vehicles: s.total_vehicles(),
            })
            .collect();

        Self {
            current_stats: CurrentStats {
                total_vehicles: latest.total_vehicles(),
                average_congestion: round2(latest.average_congestion()),
                total_roads: latest.len(),
                timestamp: latest.timestamp,
            },
            congestion_distribution: CongestionDistribution::from_roads(classified),
            road_type_stats,
            historical_trend,
            anomaly_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringStatus {
    pub algorithm: String,
    pub n_clusters: usize,
    pub status: String,
    pub last_training: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyDetectionStatus {
    pub algorithm: String,
    pub contamination: f64,
    pub status: String,
    pub current_anomalies: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteOptimizationStatus {
    pub algorithm: String,
    pub weight_factor: f64,
    pub status: String,
    pub graph_nodes: usize,
    pub graph_edges: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataStatus {
    pub total_snapshots: usize,
    pub current_roads: usize,
    pub last_update: Option<DateTime<Local>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlStatus {
    pub clustering: ClusteringStatus,
    pub anomaly_detection: AnomalyDetectionStatus,
    pub route_optimization: RouteOptimizationStatus,
    pub data_status: DataStatus,
}

/// "active" once a model exists, "waiting" before.
pub fn model_state(ready: bool) -> String {
    let state = if ready { "active" } else { "waiting" };
    state.to_string()
}
