// config.rs
//
// Engine settings. Every value has a default and can be overridden from the
// process environment with the same variable names the dashboard deployment uses.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

// Simulation defaults
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_SIMULATION_SPEED: f64 = 1.0;
pub const DEFAULT_MAX_HISTORY_RECORDS: usize = 200;
pub const INITIAL_TRAINING_SAMPLES: usize = 100;

// Map centre (lower Manhattan)
pub const DEFAULT_MAP_CENTER_LAT: f64 = 40.7128;
pub const DEFAULT_MAP_CENTER_LNG: f64 = -74.0060;

// Model defaults
pub const DEFAULT_N_CLUSTERS: usize = 3;
pub const DEFAULT_RANDOM_STATE: u64 = 42;
pub const DEFAULT_CONTAMINATION: f64 = 0.1;
pub const DEFAULT_N_ESTIMATORS: usize = 100;
pub const DEFAULT_RETRAIN_INTERVAL: u64 = 20;
pub const DEFAULT_TRAINING_WINDOW: usize = 50;
pub const MIN_HISTORY_FOR_ANOMALIES: usize = 10;
pub const DEFAULT_WEIGHT_FACTOR: f64 = 2.0;

/// Which algorithm partitions congestion scores into severity bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusteringAlgorithm {
    KMeans,
    Dbscan,
    Threshold,
}

impl ClusteringAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusteringAlgorithm::KMeans => "kmeans",
            ClusteringAlgorithm::Dbscan => "dbscan",
            ClusteringAlgorithm::Threshold => "threshold",
        }
    }
}

impl FromStr for ClusteringAlgorithm {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kmeans" | "k-means" => Ok(ClusteringAlgorithm::KMeans),
            "dbscan" => Ok(ClusteringAlgorithm::Dbscan),
            "threshold" | "fixed" => Ok(ClusteringAlgorithm::Threshold),
            other => Err(EngineError::InvalidConfig(format!(
                "unknown clustering algorithm '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapCenter {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringConfig {
    pub algorithm: ClusteringAlgorithm,
    pub n_clusters: usize,
    pub random_state: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Expected fraction of outliers in the training window.
    pub contamination: f64,
    pub random_state: u64,
    pub n_estimators: usize,
    /// Retrain after this many appends.
    pub retrain_interval: u64,
    /// Number of most recent snapshots the model is fitted on.
    pub training_window: usize,
    /// Below this many snapshots detection returns nothing.
    pub min_history: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub weight_factor: f64,
}

/// Full engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub auto_refresh_interval_secs: u64,
    pub simulation_speed: f64,
    pub max_history_records: usize,
    pub initial_training_samples: usize,
    pub map_center: MapCenter,
    pub clustering: ClusteringConfig,
    pub anomaly_detection: AnomalyConfig,
    pub route_optimization: RouteConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            simulation_speed: DEFAULT_SIMULATION_SPEED,
            max_history_records: DEFAULT_MAX_HISTORY_RECORDS,
            initial_training_samples: INITIAL_TRAINING_SAMPLES,
            map_center: MapCenter {
                lat: DEFAULT_MAP_CENTER_LAT,
                lng: DEFAULT_MAP_CENTER_LNG,
            },
            clustering: ClusteringConfig {
                algorithm: ClusteringAlgorithm::KMeans,
                n_clusters: DEFAULT_N_CLUSTERS,
                random_state: DEFAULT_RANDOM_STATE,
            },
            anomaly_detection: AnomalyConfig {
                contamination: DEFAULT_CONTAMINATION,
                random_state: DEFAULT_RANDOM_STATE,
                n_estimators: DEFAULT_N_ESTIMATORS,
                retrain_interval: DEFAULT_RETRAIN_INTERVAL,
                training_window: DEFAULT_TRAINING_WINDOW,
                min_history: MIN_HISTORY_FOR_ANOMALIES,
            },
            route_optimization: RouteConfig {
                weight_factor: DEFAULT_WEIGHT_FACTOR,
            },
        }
    }
}

impl EngineConfig {
    /// Builds a configuration from environment variables, keeping the default
    /// for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.auto_refresh_interval_secs =
            env_or("AUTO_REFRESH_INTERVAL", config.auto_refresh_interval_secs);
        config.simulation_speed = env_or("SIMULATION_SPEED", config.simulation_speed);
        config.max_history_records = env_or("MAX_HISTORY_RECORDS", config.max_history_records);
        config.map_center.lat = env_or("MAP_CENTER_LAT", config.map_center.lat);
        config.map_center.lng = env_or("MAP_CENTER_LNG", config.map_center.lng);
        config.clustering.algorithm =
            env_or("CLUSTERING_ALGORITHM", config.clustering.algorithm);
        config.clustering.n_clusters =
            env_or("CLUSTERING_N_CLUSTERS", config.clustering.n_clusters);
        config.clustering.random_state =
            env_or("CLUSTERING_RANDOM_STATE", config.clustering.random_state);
        config.anomaly_detection.contamination =
            env_or("ANOMALY_CONTAMINATION", config.anomaly_detection.contamination);
        config.anomaly_detection.random_state =
            env_or("ANOMALY_RANDOM_STATE", config.anomaly_detection.random_state);
        config.route_optimization.weight_factor =
            env_or("ROUTE_WEIGHT_FACTOR", config.route_optimization.weight_factor);
        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_history_records == 0 {
            return Err(EngineError::InvalidConfig(
                "max_history_records must be at least 1".to_string(),
            ));
        }
        if !self.simulation_speed.is_finite() || self.simulation_speed < 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "simulation_speed must be a non-negative number, got {}",
                self.simulation_speed
            )));
        }
        let contamination = self.anomaly_detection.contamination;
        if !(contamination > 0.0 && contamination <= 0.5) {
            return Err(EngineError::InvalidConfig(format!(
                "contamination must be in (0, 0.5], got {}",
                contamination
            )));
        }
        if self.anomaly_detection.n_estimators == 0 || self.anomaly_detection.training_window == 0
        {
            return Err(EngineError::InvalidConfig(
                "anomaly model needs at least one tree and one training snapshot".to_string(),
            ));
        }
        let MapCenter { lat, lng } = self.map_center;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(EngineError::InvalidConfig(format!(
                "map_center ({}, {}) is not a valid coordinate",
                lat, lng
            )));
        }
        let weight_factor = self.route_optimization.weight_factor;
        if !weight_factor.is_finite() || weight_factor < 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "weight_factor must be a non-negative number, got {}",
                weight_factor
            )));
        }
        if self.clustering.algorithm == ClusteringAlgorithm::KMeans
            && self.clustering.n_clusters != DEFAULT_N_CLUSTERS
        {
            return Err(EngineError::InvalidConfig(format!(
                "kmeans needs exactly {} clusters for Low/Medium/High, got {}",
                DEFAULT_N_CLUSTERS, self.clustering.n_clusters
            )));
        }
        Ok(())
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Ignoring unparsable value '{}' for {}", raw, key);
                default
            }
        },
        Err(_) => default,
    }
}
