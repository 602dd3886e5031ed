pub mod anomaly;
pub mod classifier;
pub mod isolation_forest;
pub mod kmeans;
pub mod route_optimizer;
pub mod statistics;

// Re-export the items the engine works with
pub use anomaly::{AnomalyDetector, AnomalyModel, StandardScaler};
pub use classifier::{
    ClassificationStrategy, ClusterAssignment, CongestionClassifier, CongestionDistribution,
};
pub use route_optimizer::{RouteError, RouteOptimizer, RouteResult, RouteSegment};
pub use statistics::{MlStatus, TrafficStats};
