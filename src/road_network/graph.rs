// graph.rs
//
// Undirected road graph. Intersections are identified by coordinates rounded to
// four decimal places; segment endpoints closer than that collapse into one node.

use crate::error::{EngineError, Result};
use crate::road_network::locations::LocationTable;
use crate::road_network::segments::{RoadClass, RoadSegment};
use crate::shared_data::CurrentTrafficIndex;
use petgraph::algo::astar;
use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

const NODE_PRECISION: f64 = 10_000.0;

/// Intersection identity: latitude and longitude in units of 1e-4 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    lat_e4: i64,
    lon_e4: i64,
}

impl NodeId {
    pub fn from_coords(lat: f64, lon: f64) -> Self {
        Self {
            lat_e4: (lat * NODE_PRECISION).round() as i64,
            lon_e4: (lon * NODE_PRECISION).round() as i64,
        }
    }

    pub fn lat(&self) -> f64 {
        self.lat_e4 as f64 / NODE_PRECISION
    }

    pub fn lon(&self) -> f64 {
        self.lon_e4 as f64 / NODE_PRECISION
    }

    pub fn coordinates(&self) -> [f64; 2] {
        [self.lat(), self.lon()]
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4},{:.4}", self.lat(), self.lon())
    }
}

impl FromStr for NodeId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let not_found = || EngineError::NodeNotFound {
            location: s.to_string(),
        };
        let (lat, lon) = s.split_once(',').ok_or_else(not_found)?;
        let lat: f64 = lat.trim().parse().map_err(|_| not_found())?;
        let lon: f64 = lon.trim().parse().map_err(|_| not_found())?;
        Ok(NodeId::from_coords(lat, lon))
    }
}

/// A road between two intersections.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadEdge {
    pub road_id: String,
    pub road_name: String,
    pub road_class: RoadClass,
    /// Static length in meters.
    pub distance: f64,
    /// Travel cost used by the shortest-path search, refreshed per query.
    pub congestion_weight: f64,
}

impl RoadEdge {
    fn base_weight(&self) -> f64 {
        self.distance / 1000.0
    }
}

/// Road network graph plus the symbolic locations routes can start and end at.
#[derive(Debug, Clone)]
pub struct RoadNetwork {
    graph: UnGraph<NodeId, RoadEdge>,
    nodes: HashMap<NodeId, NodeIndex>,
    locations: LocationTable,
}

impl RoadNetwork {
    /// Builds the graph from the static segment list. A second segment between
    /// the same pair of nodes replaces the first.
    pub fn new(segments: &[RoadSegment], locations: LocationTable) -> Self {
        let mut network = Self {
            graph: UnGraph::default(),
            nodes: HashMap::new(),
            locations,
        };

        for segment in segments {
            let from = network.node_index(NodeId::from_coords(segment.start.lat, segment.start.lon));
            let to = network.node_index(NodeId::from_coords(segment.end.lat, segment.end.lon));
            let distance = segment.distance_meters();
            network.graph.update_edge(
                from,
                to,
                RoadEdge {
                    road_id: segment.id.clone(),
                    road_name: segment.name.clone(),
                    road_class: segment.road_class,
                    distance,
                    congestion_weight: distance / 1000.0,
                },
            );
        }

        network
    }

    fn node_index(&mut self, id: NodeId) -> NodeIndex {
        if let Some(&index) = self.nodes.get(&id) {
            return index;
        }
        let index = self.graph.add_node(id);
        self.nodes.insert(id, index);
        index
    }

    /// Resolves a symbolic location (or a literal "lat,lon" node key) to a node.
    pub fn nearest_node(&self, location: &str) -> Result<NodeId> {
        let not_found = || EngineError::NodeNotFound {
            location: location.to_string(),
        };
        if self.nodes.is_empty() {
            return Err(not_found());
        }

        let candidate = match self.locations.resolve(location) {
            Some(node) => node,
            None => location.parse::<NodeId>().map_err(|_| not_found())?,
        };
        if self.nodes.contains_key(&candidate) {
            Ok(candidate)
        } else {
            Err(not_found())
        }
    }

    /// Recomputes every edge's congestion weight as
    /// `distance_km * (1 + congestion / 100 * weight_factor)`.
    /// Roads missing from `traffic` keep a multiplier of 1.
    pub fn refresh_weights(&mut self, traffic: &CurrentTrafficIndex, weight_factor: f64) {
        for edge in self.graph.edge_weights_mut() {
            let multiplier = traffic
                .congestion_of(&edge.road_id)
                .map(|score| 1.0 + (score / 100.0) * weight_factor)
                .unwrap_or(1.0);
            edge.congestion_weight = edge.base_weight() * multiplier;
        }
    }

    /// Dijkstra over the current congestion weights. Returns the total weight
    /// and the node sequence, or `None` when `end` is unreachable.
    pub fn shortest_path(&self, start: NodeId, end: NodeId) -> Option<(f64, Vec<NodeId>)> {
        let start_index = *self.nodes.get(&start)?;
        let end_index = *self.nodes.get(&end)?;
        let (cost, path) = astar(
            &self.graph,
            start_index,
            |node| node == end_index,
            |edge| edge.weight().congestion_weight,
            |_| 0.0,
        )?;
        let path = path.into_iter().map(|index| self.graph[index]).collect();
        Some((cost, path))
    }

    pub fn edge_between(&self, a: NodeId, b: NodeId) -> Option<&RoadEdge> {
        let a = *self.nodes.get(&a)?;
        let b = *self.nodes.get(&b)?;
        let edge = self.graph.find_edge(a, b)?;
        self.graph.edge_weight(edge)
    }

    pub fn edges(&self) -> impl Iterator<Item = &RoadEdge> {
        self.graph.edge_weights()
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Canonical "lat,lon" keys of all nodes, in insertion order.
    pub fn node_keys(&self) -> Vec<String> {
        self.graph.node_weights().map(|id| id.to_string()).collect()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn locations(&self) -> &LocationTable {
        &self.locations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::road_network::segments::{create_road_segments, GeoPoint};
    use crate::shared_data::{CurrentTrafficIndex, RoadState, TrafficSnapshot};
    use chrono::Local;

    fn default_network() -> RoadNetwork {
        let center = EngineConfig::default().map_center;
        RoadNetwork::new(
            &create_road_segments(center).unwrap(),
            LocationTable::for_map_center(center),
        )
    }

    fn segment(id: &str, start: (f64, f64), end: (f64, f64)) -> RoadSegment {
        RoadSegment::new(
            id,
            format!("Road {}", id),
            GeoPoint::new(start.0, start.1).unwrap(),
            GeoPoint::new(end.0, end.1).unwrap(),
            RoadClass::Collector,
        )
        .unwrap()
    }

    fn index_with(scores: &[(&RoadSegment, f64)]) -> CurrentTrafficIndex {
        let now = Local::now();
        let roads = scores
            .iter()
            .map(|(segment, score)| RoadState::new(segment, 10, *score, now))
            .collect();
        CurrentTrafficIndex::from_snapshot(&TrafficSnapshot::new(now, roads))
    }

    #[test]
    fn test_default_network_shape() {
        let network = default_network();
        assert_eq!(network.node_count(), 19);
        assert_eq!(network.edge_count(), 15);
    }

    #[test]
    fn test_node_id_display_and_parse() {
        let node = NodeId::from_coords(40.71281, -74.00604);
        assert_eq!(node.to_string(), "40.7128,-74.0060");
        assert_eq!("40.7128,-74.0060".parse::<NodeId>().unwrap(), node);
        assert!("not a node".parse::<NodeId>().is_err());
    }

    #[test]
    fn test_close_endpoints_collapse_into_one_node() {
        let a = NodeId::from_coords(1.00001, 2.00001);
        let b = NodeId::from_coords(1.00002, 2.00002);
        assert_eq!(a, b);
    }

    #[test]
    fn test_nearest_node_unknown_location_is_an_error() {
        let network = default_network();
        let err = network.nearest_node("Nowhere").unwrap_err();
        assert_eq!(
            err,
            EngineError::NodeNotFound {
                location: "Nowhere".to_string()
            }
        );
    }

    #[test]
    fn test_nearest_node_on_empty_graph() {
        let network = RoadNetwork::new(&[], LocationTable::new());
        assert!(network.nearest_node("A").is_err());
    }

    #[test]
    fn test_nearest_node_accepts_node_key() {
        let network = default_network();
        let a = network.nearest_node("A").unwrap();
        assert_eq!(network.nearest_node(&a.to_string()).unwrap(), a);
    }

    #[test]
    fn test_every_location_pair_is_connected() {
        let network = default_network();
        let names = network.locations().names();
        for from in &names {
            for to in &names {
                let start = network.nearest_node(from).unwrap();
                let end = network.nearest_node(to).unwrap();
                assert!(
                    network.shortest_path(start, end).is_some(),
                    "{} -> {} has no path",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_refresh_weights_applies_congestion() {
        let step = 1000.0 / 111_000.0;
        let ab = segment("AB", (0.0, 0.0), (step, 0.0));
        let bc = segment("BC", (step, 0.0), (3.0 * step, 0.0));
        let mut network = RoadNetwork::new(&[ab.clone(), bc.clone()], LocationTable::new());

        network.refresh_weights(&index_with(&[(&ab, 50.0), (&bc, 0.0)]), 2.0);

        let a = NodeId::from_coords(0.0, 0.0);
        let b = NodeId::from_coords(step, 0.0);
        let c = NodeId::from_coords(3.0 * step, 0.0);
        assert!((network.edge_between(a, b).unwrap().congestion_weight - 2.0).abs() < 1e-9);
        assert!((network.edge_between(b, c).unwrap().congestion_weight - 2.0).abs() < 1e-9);

        let (cost, path) = network.shortest_path(a, c).unwrap();
        assert!((cost - 4.0).abs() < 1e-9);
        assert_eq!(path, vec![a, b, c]);
    }

    #[test]
    fn test_missing_road_keeps_base_weight() {
        let ab = segment("AB", (0.0, 0.0), (0.01, 0.0));
        let mut network = RoadNetwork::new(&[ab], LocationTable::new());
        network.refresh_weights(&CurrentTrafficIndex::default(), 2.0);
        let edge = network.edges().next().unwrap();
        assert!((edge.congestion_weight - edge.distance / 1000.0).abs() < 1e-12);
    }

    #[test]
    fn test_congestion_steers_the_path() {
        // Two ways from S to T: a direct but congested road, and a longer free detour.
        let direct = segment("DIRECT", (0.0, 0.0), (0.0, 0.01));
        let up = segment("UP", (0.0, 0.0), (0.005, 0.005));
        let down = segment("DOWN", (0.005, 0.005), (0.0, 0.01));
        let mut network = RoadNetwork::new(
            &[direct.clone(), up.clone(), down.clone()],
            LocationTable::new(),
        );
        let s = NodeId::from_coords(0.0, 0.0);
        let t = NodeId::from_coords(0.0, 0.01);

        network.refresh_weights(&CurrentTrafficIndex::default(), 2.0);
        assert_eq!(network.shortest_path(s, t).unwrap().1.len(), 2);

        network.refresh_weights(&index_with(&[(&direct, 100.0), (&up, 0.0), (&down, 0.0)]), 2.0);
        assert_eq!(network.shortest_path(s, t).unwrap().1.len(), 3);
    }

    #[test]
    fn test_disconnected_nodes_have_no_path() {
        let left = segment("L", (0.0, 0.0), (0.0, 0.01));
        let right = segment("R", (1.0, 1.0), (1.0, 1.01));
        let network = RoadNetwork::new(&[left, right], LocationTable::new());
        assert!(network
            .shortest_path(NodeId::from_coords(0.0, 0.0), NodeId::from_coords(1.0, 1.0))
            .is_none());
    }

    #[test]
    fn test_shortest_path_is_reproducible() {
        let mut network = default_network();
        let index = CurrentTrafficIndex::default();
        let a = network.nearest_node("A").unwrap();
        let d = network.nearest_node("D").unwrap();
        network.refresh_weights(&index, 2.0);
        let first = network.shortest_path(a, d);
        network.refresh_weights(&index, 2.0);
        let second = network.shortest_path(a, d);
        assert_eq!(first, second);
    }
}
