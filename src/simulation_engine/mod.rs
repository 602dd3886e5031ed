// simulation_engine/mod.rs
pub mod history;
pub mod simulator;

pub use history::TrafficHistory;
pub use simulator::TrafficSimulator;
