// classifier.rs
//
// Assigns every road in a snapshot a congestion level and a cluster id. The
// partitioning algorithm is pluggable; fixed thresholds are used whenever there
// are too few samples or the selected algorithm fails.

use crate::config::{ClusteringAlgorithm, ClusteringConfig};
use crate::error::{EngineError, Result};
use crate::flow_analyzer::kmeans::{dbscan, KMeans};
use crate::shared_data::{CongestionLevel, RoadState, TrafficSnapshot};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// With this many scores or fewer, clustering is skipped.
pub const MIN_CLUSTERING_SAMPLES: usize = 3;

pub const DBSCAN_EPS: f64 = 0.5;
pub const DBSCAN_MIN_SAMPLES: usize = 5;

/// Level and cluster for one score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub level: CongestionLevel,
    pub cluster_id: usize,
}

impl ClusterAssignment {
    pub fn from_threshold(score: f64) -> Self {
        Self {
            level: CongestionLevel::from_score(score),
            cluster_id: 0,
        }
    }
}

/// A way of partitioning congestion scores. Implementations return exactly one
/// assignment per input score, in input order.
pub trait ClassificationStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn classify(&self, scores: &[f64]) -> Result<Vec<ClusterAssignment>>;
}

#[derive(Debug, Clone, Default)]
pub struct ThresholdStrategy;

impl ClassificationStrategy for ThresholdStrategy {
    fn name(&self) -> &'static str {
        ClusteringAlgorithm::Threshold.as_str()
    }

    fn classify(&self, scores: &[f64]) -> Result<Vec<ClusterAssignment>> {
        Ok(scores
            .iter()
            .map(|&s| ClusterAssignment::from_threshold(s))
            .collect())
    }
}

/// k-means with three clusters. Centroids are ranked ascending and the rank
/// picks the level, so the lowest centroid is always `Low`.
#[derive(Debug, Clone)]
pub struct KMeansStrategy {
    model: KMeans,
}

impl KMeansStrategy {
    pub fn new(n_clusters: usize, random_state: u64) -> Self {
        Self {
            model: KMeans::new(n_clusters, random_state),
        }
    }
}

impl ClassificationStrategy for KMeansStrategy {
    fn name(&self) -> &'static str {
        ClusteringAlgorithm::KMeans.as_str()
    }

    fn classify(&self, scores: &[f64]) -> Result<Vec<ClusterAssignment>> {
        if self.model.n_clusters != CongestionLevel::ORDERED.len() {
            return Err(EngineError::ModelScoring(format!(
                "cannot map {} clusters onto {} levels",
                self.model.n_clusters,
                CongestionLevel::ORDERED.len()
            )));
        }
        let fit = self.model.fit(scores)?;
        let rank_of = centroid_ranks(&fit.centroids);

        Ok(fit
            .labels
            .iter()
            .map(|&label| {
                let rank = rank_of[label];
                ClusterAssignment {
                    level: CongestionLevel::ORDERED[rank],
                    cluster_id: rank,
                }
            })
            .collect())
    }
}

/// Rank of each cluster by ascending centroid. Equal centroids keep their
/// cluster index order.
fn centroid_ranks(centroids: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..centroids.len()).collect();
    order.sort_by(|&a, &b| centroids[a].total_cmp(&centroids[b]));
    let mut rank_of = vec![0usize; order.len()];
    for (rank, &cluster) in order.iter().enumerate() {
        rank_of[cluster] = rank;
    }
    rank_of
}

/// DBSCAN supplies cluster ids only; levels still come from the thresholds.
/// Noise points land in cluster 0.
#[derive(Debug, Clone)]
pub struct DbscanStrategy {
    pub eps: f64,
    pub min_samples: usize,
}

impl Default for DbscanStrategy {
    fn default() -> Self {
        Self {
            eps: DBSCAN_EPS,
            min_samples: DBSCAN_MIN_SAMPLES,
        }
    }
}

impl ClassificationStrategy for DbscanStrategy {
    fn name(&self) -> &'static str {
        ClusteringAlgorithm::Dbscan.as_str()
    }

    fn classify(&self, scores: &[f64]) -> Result<Vec<ClusterAssignment>> {
        if scores.iter().any(|s| !s.is_finite()) {
            return Err(EngineError::ModelScoring(
                "dbscan input contains non-finite values".to_string(),
            ));
        }
        let labels = dbscan(scores, self.eps, self.min_samples);
        Ok(scores
            .iter()
            .zip(labels)
            .map(|(&score, label)| ClusterAssignment {
                level: CongestionLevel::from_score(score),
                cluster_id: label.unwrap_or(0),
            })
            .collect())
    }
}

/// Per-level road counts of a classified snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CongestionDistribution {
    #[serde(rename = "Low")]
    pub low: usize,
    #[serde(rename = "Medium")]
    pub medium: usize,
    #[serde(rename = "High")]
    pub high: usize,
}

impl CongestionDistribution {
    pub fn from_roads(roads: &[RoadState]) -> Self {
        let mut distribution = Self::default();
        for level in roads.iter().filter_map(|r| r.congestion_level) {
            match level {
                CongestionLevel::Low => distribution.low += 1,
                CongestionLevel::Medium => distribution.medium += 1,
                CongestionLevel::High => distribution.high += 1,
            }
        }
        distribution
    }

    pub fn total(&self) -> usize {
        self.low + self.medium + self.high
    }
}

pub struct CongestionClassifier {
    strategy: Box<dyn ClassificationStrategy>,
    n_clusters: usize,
}

impl CongestionClassifier {
    pub fn new(strategy: Box<dyn ClassificationStrategy>, n_clusters: usize) -> Self {
        Self {
            strategy,
            n_clusters,
        }
    }

    pub fn from_config(config: &ClusteringConfig) -> Self {
        let strategy: Box<dyn ClassificationStrategy> = match config.algorithm {
            ClusteringAlgorithm::KMeans => Box::new(KMeansStrategy::new(
                config.n_clusters,
                config.random_state,
            )),
            ClusteringAlgorithm::Dbscan => Box::new(DbscanStrategy::default()),
            ClusteringAlgorithm::Threshold => Box::new(ThresholdStrategy),
        };
        Self::new(strategy, config.n_clusters)
    }

    pub fn algorithm(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    /// One assignment per score. Never fails: small inputs and strategy errors
    /// both fall back to the fixed thresholds.
    pub fn classify_scores(&self, scores: &[f64]) -> Vec<ClusterAssignment> {
        let fallback = || ThresholdStrategy.classify(scores).unwrap_or_default();

        if scores.len() <= MIN_CLUSTERING_SAMPLES {
            debug!(
                "Only {} congestion scores, using fixed thresholds",
                scores.len()
            );
            return fallback();
        }

        match self.strategy.classify(scores) {
            Ok(assignments) if assignments.len() == scores.len() => assignments,
            Ok(assignments) => {
                warn!(
                    "{} returned {} assignments for {} scores, using fixed thresholds",
                    self.strategy.name(),
                    assignments.len(),
                    scores.len()
                );
                fallback()
            }
            Err(e) => {
                warn!(
                    "{} classification failed, using fixed thresholds: {}",
                    self.strategy.name(),
                    e
                );
                fallback()
            }
        }
    }

    /// Copies of the snapshot's roads with level and cluster id filled in.
    pub fn classify_snapshot(&self, snapshot: &TrafficSnapshot) -> Vec<RoadState> {
        let assignments = self.classify_scores(&snapshot.congestion_scores());
        snapshot
            .roads
            .iter()
            .zip(assignments)
            .map(|(road, a)| road.clone().with_classification(a.level, a.cluster_id))
            .collect()
    }
}
