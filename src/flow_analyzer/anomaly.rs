// anomaly.rs
//
// Per-road anomaly detection. Each road state becomes a feature row
// [vehicle_count, congestion_score, road class code]; rows are standardised
// and scored by an isolation forest trained on the recent history.

use crate::config::AnomalyConfig;
use crate::error::{EngineError, Result};
use crate::flow_analyzer::isolation_forest::{FittedForest, IsolationForest};
use crate::shared_data::{AnomalyRecord, RoadState, TrafficSnapshot};
use log::{debug, info};
use parking_lot::RwLock;
use std::sync::Arc;

pub const FEATURE_COUNT: usize = 3;

pub fn feature_row(road: &RoadState) -> Vec<f64> {
    vec![
        road.vehicle_count as f64,
        road.congestion_score,
        road.road_class.feature_code(),
    ]
}

/// Zero-mean, unit-variance scaling per column. Constant columns keep a
/// scale of 1 so they map to 0 instead of dividing by zero.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let width = rows
            .first()
            .map(Vec::len)
            .ok_or_else(|| EngineError::ModelScoring("no rows to scale".to_string()))?;
        if rows.iter().any(|r| r.len() != width) {
            return Err(EngineError::ModelScoring(
                "rows have different widths".to_string(),
            ));
        }

        let n = rows.len() as f64;
        let means: Vec<f64> = (0..width)
            .map(|c| rows.iter().map(|r| r[c]).sum::<f64>() / n)
            .collect();
        let scales = (0..width)
            .map(|c| {
                let variance = rows.iter().map(|r| (r[c] - means[c]).powi(2)).sum::<f64>() / n;
                let std = variance.sqrt();
                if std > f64::EPSILON {
                    std
                } else {
                    1.0
                }
            })
            .collect();
        Ok(Self { means, scales })
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter()
            .map(|row| {
                if row.len() != self.means.len() {
                    return Err(EngineError::ModelScoring(format!(
                        "scaler expects {} features, got {}",
                        self.means.len(),
                        row.len()
                    )));
                }
                Ok(row
                    .iter()
                    .zip(self.means.iter().zip(&self.scales))
                    .map(|(v, (mean, scale))| (v - mean) / scale)
                    .collect())
            })
            .collect()
    }
}

/// A scaler and forest fitted together on one training window.
#[derive(Debug, Clone)]
pub struct AnomalyModel {
    scaler: StandardScaler,
    forest: FittedForest,
    training_rows: usize,
}

impl AnomalyModel {
    pub fn fit(config: &AnomalyConfig, window: &[Arc<TrafficSnapshot>]) -> Result<Self> {
        let rows: Vec<Vec<f64>> = window
            .iter()
            .flat_map(|snapshot| snapshot.roads.iter().map(feature_row))
            .collect();
        let scaler = StandardScaler::fit(&rows)?;
        let scaled = scaler.transform(&rows)?;
        let forest = IsolationForest::new(
            config.n_estimators,
            config.contamination,
            config.random_state,
        )
        .fit(&scaled)?;
        Ok(Self {
            scaler,
            forest,
            training_rows: rows.len(),
        })
    }

    pub fn training_rows(&self) -> usize {
        self.training_rows
    }

    /// Decision score per road, in snapshot order. Negative means anomalous.
    pub fn decision_scores(&self, snapshot: &TrafficSnapshot) -> Result<Vec<f64>> {
        let rows: Vec<Vec<f64>> = snapshot.roads.iter().map(feature_row).collect();
        let scaled = self.scaler.transform(&rows)?;
        self.forest.decision_function(&scaled)
    }
}

/// Holds the current model. Training builds a new model off to the side and
/// swaps it in, so scoring never waits on a fit.
pub struct AnomalyDetector {
    config: AnomalyConfig,
    model: RwLock<Option<Arc<AnomalyModel>>>,
}

impl AnomalyDetector {
    pub fn new(config: AnomalyConfig) -> Self {
        Self {
            config,
            model: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &AnomalyConfig {
        &self.config
    }

    pub fn is_trained(&self) -> bool {
        self.model.read().is_some()
    }

    pub fn training_rows(&self) -> Option<usize> {
        self.model.read().as_ref().map(|m| m.training_rows())
    }

    /// Retrain every `retrain_interval` appends, or as soon as enough history
    /// exists when no model has been trained yet.
    pub fn should_retrain(&self, appends: u64, history_len: usize) -> bool {
        if history_len < self.config.min_history {
            return false;
        }
        if !self.is_trained() {
            return true;
        }
        self.config.retrain_interval > 0 && appends % self.config.retrain_interval == 0
    }

    /// Fits on `window` and installs the result. On error the previous model
    /// stays in place.
    pub fn train(&self, window: &[Arc<TrafficSnapshot>]) -> Result<()> {
        let model = AnomalyModel::fit(&self.config, window)?;
        info!(
            "Anomaly model trained on {} rows from {} snapshots",
            model.training_rows(),
            window.len()
        );
        *self.model.write() = Some(Arc::new(model));
        Ok(())
    }

    pub fn reset(&self) {
        *self.model.write() = None;
    }

    /// Flags roads of `snapshot` whose decision score is negative.
    pub fn detect(
        &self,
        history_len: usize,
        snapshot: &TrafficSnapshot,
    ) -> Result<Vec<AnomalyRecord>> {
        if history_len < self.config.min_history {
            return Err(EngineError::InsufficientHistory {
                available: history_len,
                required: self.config.min_history,
            });
        }
        let model = self.model.read().clone().ok_or(EngineError::ModelNotTrained)?;

        let scores = model.decision_scores(snapshot)?;
        let anomalies: Vec<AnomalyRecord> = snapshot
            .roads
            .iter()
            .zip(scores)
            .filter(|(_, score)| *score < 0.0)
            .map(|(road, score)| AnomalyRecord::from_road(road, score))
            .collect();
        debug!(
            "{} of {} roads flagged as anomalous",
            anomalies.len(),
            snapshot.len()
        );
        Ok(anomalies)
    }
}
