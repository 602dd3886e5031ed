use thiserror::Error;

/// Errors raised by the traffic analytics engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// A symbolic location has no entry in the lookup table or no node in the graph.
    #[error("no road network node found for location '{location}'")]
    NodeNotFound { location: String },

    #[error("no path exists between {start} and {end}")]
    NoPathExists { start: String, end: String },

    /// Not enough data for a model; callers fall back to a fixed behaviour.
    #[error("insufficient history: {available} samples available, {required} required")]
    InsufficientHistory { available: usize, required: usize },

    /// No model has been fitted since start-up or the last reset.
    #[error("model is not trained yet")]
    ModelNotTrained,

    #[error("model scoring failed: {0}")]
    ModelScoring(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
