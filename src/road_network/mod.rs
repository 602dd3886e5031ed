// road_network/mod.rs
pub mod graph;
pub mod locations;
pub mod segments;

pub use graph::{NodeId, RoadEdge, RoadNetwork};
pub use locations::LocationTable;
pub use segments::{create_road_segments, GeoPoint, RoadClass, RoadSegment};
