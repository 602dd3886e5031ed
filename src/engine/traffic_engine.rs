// traffic_engine.rs
//
// Owns the road network, the snapshot history and the models, and exposes the
// query operations the dashboard calls. Every query reads a consistent
// published state: a new snapshot and its index are swapped in together, and
// model retraining happens after the swap so readers never wait on a fit.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::flow_analyzer::anomaly::AnomalyDetector;
use crate::flow_analyzer::classifier::CongestionClassifier;
use crate::flow_analyzer::route_optimizer::{RouteError, RouteOptimizer, RouteResult};
use crate::flow_analyzer::statistics::{
    model_state, AnomalyDetectionStatus, ClusteringStatus, DataStatus, MlStatus,
    RouteOptimizationStatus, TrafficStats, TREND_LENGTH,
};
use crate::road_network::{create_road_segments, LocationTable, RoadNetwork, RoadSegment};
use crate::shared_data::{AnomalyRecord, CurrentTrafficIndex, RoadState, TrafficSnapshot};
use crate::simulation_engine::{TrafficHistory, TrafficSimulator};
use chrono::{DateTime, Local};
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Latest snapshot together with the index built from it.
#[derive(Debug, Default)]
struct PublishedState {
    snapshot: Option<Arc<TrafficSnapshot>>,
    index: CurrentTrafficIndex,
}

pub struct TrafficEngine {
    config: EngineConfig,
    simulator: TrafficSimulator,
    network: Mutex<RoadNetwork>,
    history: RwLock<TrafficHistory>,
    published: RwLock<Arc<PublishedState>>,
    classifier: CongestionClassifier,
    detector: AnomalyDetector,
    optimizer: RouteOptimizer,
    rng: Mutex<SmallRng>,
    appends: AtomicU64,
}

impl TrafficEngine {
    /// Engine over the default demo network, seeded from the OS.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_rng(config, SmallRng::from_os_rng())
    }

    /// Engine over the default demo network with an injected RNG.
    pub fn with_rng(config: EngineConfig, rng: SmallRng) -> Result<Self> {
        config.validate()?;
        let segments = create_road_segments(config.map_center)?;
        let locations = LocationTable::for_map_center(config.map_center);
        Self::with_network(config, segments, locations, rng)
    }

    /// Engine over a custom network. Generates `initial_training_samples`
    /// snapshots and trains the models before returning.
    pub fn with_network(
        config: EngineConfig,
        segments: Vec<RoadSegment>,
        locations: LocationTable,
        rng: SmallRng,
    ) -> Result<Self> {
        config.validate()?;
        let network = RoadNetwork::new(&segments, locations);
        info!(
            "Road network built: {} nodes, {} edges",
            network.node_count(),
            network.edge_count()
        );

        let engine = Self {
            simulator: TrafficSimulator::new(segments, config.simulation_speed),
            network: Mutex::new(network),
            history: RwLock::new(TrafficHistory::new(config.max_history_records)),
            published: RwLock::new(Arc::new(PublishedState::default())),
            classifier: CongestionClassifier::from_config(&config.clustering),
            detector: AnomalyDetector::new(config.anomaly_detection.clone()),
            optimizer: RouteOptimizer::new(config.route_optimization.weight_factor),
            rng: Mutex::new(rng),
            appends: AtomicU64::new(0),
            config,
        };
        engine.generate_initial_data();
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn generate_initial_data(&self) {
        let samples = self.config.initial_training_samples;
        if samples == 0 {
            return;
        }
        info!("Generating {} initial traffic snapshots", samples);
        for i in 0..samples {
            let snapshot = self.simulate_at(Local::now());
            self.append_snapshot(snapshot);
            if i % 20 == 0 {
                debug!("Generated {}/{} training samples", i, samples);
            }
        }
        self.train_detector();
        info!("Initial training completed");
    }

    fn simulate_at(&self, at: DateTime<Local>) -> TrafficSnapshot {
        let mut rng = self.rng.lock();
        self.simulator.simulate_snapshot(at, &mut *rng)
    }

    /// Appends to the history and publishes the snapshot with a fresh index.
    /// Returns the number of appends since the last reset.
    fn append_snapshot(&self, snapshot: TrafficSnapshot) -> u64 {
        let snapshot = Arc::new(snapshot);
        let state = Arc::new(PublishedState {
            index: CurrentTrafficIndex::from_snapshot(&snapshot),
            snapshot: Some(Arc::clone(&snapshot)),
        });
        {
            let mut history = self.history.write();
            if history.append(snapshot).is_some() {
                debug!("History full, evicted oldest snapshot");
            }
            *self.published.write() = state;
        }
        self.appends.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn train_detector(&self) {
        let window = self
            .history
            .read()
            .window(self.config.anomaly_detection.training_window);
        if window.len() < self.config.anomaly_detection.min_history {
            debug!(
                "Skipping anomaly training: {} snapshots, need {}",
                window.len(),
                self.config.anomaly_detection.min_history
            );
            return;
        }
        if let Err(e) = self.detector.train(&window) {
            warn!("Anomaly model training failed, keeping previous model: {}", e);
        }
    }

    /// Records an externally produced snapshot as the newest state and
    /// retrains the anomaly model when it is due.
    pub fn record_snapshot(&self, snapshot: TrafficSnapshot) {
        let appends = self.append_snapshot(snapshot);
        let history_len = self.history.read().len();
        if self.detector.should_retrain(appends, history_len) {
            self.train_detector();
        }
    }

    /// One simulation tick at the current wall-clock time.
    pub fn update_traffic_simulation(&self) {
        self.update_traffic_simulation_at(Local::now());
    }

    pub fn update_traffic_simulation_at(&self, at: DateTime<Local>) {
        let snapshot = self.simulate_at(at);
        debug!(
            "Simulated {} roads at {}, {} vehicles",
            snapshot.len(),
            at,
            snapshot.total_vehicles()
        );
        self.record_snapshot(snapshot);
    }

    /// Clears history and models, then regenerates the initial data.
    pub fn reset_simulation(&self) {
        {
            let mut history = self.history.write();
            history.clear();
            *self.published.write() = Arc::new(PublishedState::default());
        }
        self.appends.store(0, Ordering::SeqCst);
        self.detector.reset();
        self.generate_initial_data();
        info!("Traffic simulation reset");
    }

    fn published(&self) -> Arc<PublishedState> {
        self.published.read().clone()
    }

    pub fn latest_snapshot(&self) -> Option<Arc<TrafficSnapshot>> {
        self.published().snapshot.clone()
    }

    pub fn snapshot_count(&self) -> usize {
        self.history.read().len()
    }

    /// Latest snapshot's roads with congestion level and cluster id.
    /// Empty before the first snapshot.
    pub fn get_current_traffic(&self) -> Vec<RoadState> {
        match self.latest_snapshot() {
            Some(snapshot) => self.classifier.classify_snapshot(&snapshot),
            None => Vec::new(),
        }
    }

    /// Roads of the latest snapshot the anomaly model flags. Empty while the
    /// history is shorter than the minimum or no model has been fitted yet;
    /// scoring failures are returned.
    pub fn detect_anomalies(&self) -> Result<Vec<AnomalyRecord>> {
        let Some(snapshot) = self.latest_snapshot() else {
            return Ok(Vec::new());
        };
        let history_len = self.snapshot_count();
        match self.detector.detect(history_len, &snapshot) {
            Ok(anomalies) => Ok(anomalies),
            Err(EngineError::InsufficientHistory {
                available,
                required,
            }) => {
                debug!(
                    "Anomaly detection needs {} snapshots, have {}",
                    required, available
                );
                Ok(Vec::new())
            }
            Err(EngineError::ModelNotTrained) => {
                debug!("Anomaly model not trained yet");
                Ok(Vec::new())
            }
            Err(e) => {
                warn!("Anomaly scoring failed: {}", e);
                Err(e)
            }
        }
    }

    fn anomaly_count(&self) -> usize {
        self.detect_anomalies().map(|a| a.len()).unwrap_or(0)
    }

    /// Least-congested route between two locations.
    pub fn get_optimized_route(
        &self,
        start: &str,
        end: &str,
    ) -> std::result::Result<RouteResult, RouteError> {
        let state = self.published();
        let mut network = self.network.lock();
        let result = self.optimizer.optimize(&mut network, &state.index, start, end);
        if let Err(e) = &result {
            warn!("Route {} -> {} failed: {}", start, end, e);
        }
        result
    }

    /// `None` before the first snapshot.
    pub fn get_traffic_stats(&self) -> Option<TrafficStats> {
        let latest = self.latest_snapshot()?;
        let classified = self.classifier.classify_snapshot(&latest);
        let trend = self.history.read().window(TREND_LENGTH);
        Some(TrafficStats::compute(
            &latest,
            &classified,
            &trend,
            self.anomaly_count(),
        ))
    }

    pub fn get_available_locations(&self) -> Vec<String> {
        self.network.lock().locations().names()
    }

    pub fn get_ml_status(&self) -> MlStatus {
        let state = self.published();
        let snapshot_count = self.snapshot_count();
        let (graph_nodes, graph_edges) = {
            let network = self.network.lock();
            (network.node_count(), network.edge_count())
        };

        MlStatus {
            clustering: ClusteringStatus {
                algorithm: self.classifier.algorithm().to_string(),
                n_clusters: self.classifier.n_clusters(),
                status: model_state(snapshot_count > 0),
                last_training: snapshot_count,
            },
            anomaly_detection: AnomalyDetectionStatus {
                algorithm: "isolation_forest".to_string(),
                contamination: self.detector.config().contamination,
                status: model_state(self.detector.is_trained()),
                current_anomalies: self.anomaly_count(),
            },
            route_optimization: RouteOptimizationStatus {
                algorithm: "dijkstra".to_string(),
                weight_factor: self.optimizer.weight_factor(),
                status: model_state(graph_edges > 0),
                graph_nodes,
                graph_edges,
            },
            data_status: DataStatus {
                total_snapshots: snapshot_count,
                current_roads: state.index.len(),
                last_update: state.snapshot.as_ref().map(|s| s.timestamp),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn engine(initial: usize) -> TrafficEngine {
        let mut config = EngineConfig::default();
        config.initial_training_samples = initial;
        TrafficEngine::with_rng(config, SmallRng::seed_from_u64(42)).unwrap()
    }

    #[test]
    fn test_initial_fill_publishes_and_trains() {
        let engine = engine(100);
        assert_eq!(engine.snapshot_count(), 100);
        assert_eq!(engine.get_current_traffic().len(), 15);
        assert!(engine.detector.is_trained());
    }

    #[test]
    fn test_empty_engine_answers_with_nothing() {
        let engine = engine(0);
        assert!(engine.get_current_traffic().is_empty());
        assert!(engine.detect_anomalies().unwrap().is_empty());
        assert!(engine.get_traffic_stats().is_none());
        assert_eq!(engine.get_ml_status().data_status.last_update, None);
    }

    #[test]
    fn test_tick_carries_requested_timestamp() {
        let engine = engine(0);
        let at = Local.with_ymd_and_hms(2024, 5, 6, 8, 15, 0).unwrap();
        engine.update_traffic_simulation_at(at);
        let traffic = engine.get_current_traffic();
        assert!(traffic.iter().all(|r| r.timestamp == at));
        assert!(traffic.iter().all(|r| r.congestion_level.is_some()));
    }

    #[test]
    fn test_invalid_map_center_is_rejected() {
        let mut config = EngineConfig::default();
        config.map_center.lat = f64::NAN;
        assert!(matches!(
            TrafficEngine::with_rng(config, SmallRng::seed_from_u64(1)),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_untrained_model_yields_no_anomalies() {
        let engine = engine(12);
        engine.detector.reset();
        assert!(engine.snapshot_count() >= engine.config.anomaly_detection.min_history);
        assert_eq!(engine.detect_anomalies(), Ok(Vec::new()));
        assert_eq!(engine.get_ml_status().anomaly_detection.status, "waiting");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = EngineConfig::default();
        config.max_history_records = 0;
        assert!(matches!(
            TrafficEngine::with_rng(config, SmallRng::seed_from_u64(1)),
            Err(EngineError::InvalidConfig(_))
        ));
    }
}
