pub mod config;
pub mod engine;
pub mod error;
pub mod flow_analyzer;
pub mod monitoring;
pub mod road_network;
pub mod shared_data;
pub mod simulation_engine;

pub use config::EngineConfig;
pub use engine::TrafficEngine;
pub use error::{EngineError, Result};
