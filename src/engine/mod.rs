pub mod traffic_engine;

pub use traffic_engine::TrafficEngine;
