// route_optimizer.rs
//
// Congestion-aware routing between two symbolic locations.

use crate::error::EngineError;
use crate::road_network::graph::{NodeId, RoadNetwork};
use crate::shared_data::{round2, CurrentTrafficIndex};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One traversed edge of a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSegment {
    pub from: [f64; 2],
    pub to: [f64; 2],
    pub road_name: String,
    pub road_id: String,
    /// Meters.
    pub distance: f64,
    pub congestion_score: f64,
    /// Seconds, derived from the edge's congestion weight.
    pub estimated_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    pub path_coordinates: Vec<[f64; 2]>,
    pub route_details: Vec<RouteSegment>,
    /// Meters, two decimals.
    pub total_distance: f64,
    /// Minutes, two decimals.
    pub estimated_time: f64,
    pub start_node: String,
    pub end_node: String,
}

impl RouteResult {
    fn empty_at(node: NodeId) -> Self {
        Self {
            path_coordinates: vec![node.coordinates()],
            route_details: Vec::new(),
            total_distance: 0.0,
            estimated_time: 0.0,
            start_node: node.to_string(),
            end_node: node.to_string(),
        }
    }
}

/// Structured routing failure, serialisable for API consumers.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum RouteError {
    #[error("unknown location '{location}'")]
    UnknownLocation {
        location: String,
        available_locations: Vec<String>,
        known_nodes: Vec<String>,
    },
    #[error("no path exists between {start_node} and {end_node}")]
    NoPath { start_node: String, end_node: String },
}

impl From<RouteError> for EngineError {
    fn from(err: RouteError) -> Self {
        match err {
            RouteError::UnknownLocation { location, .. } => EngineError::NodeNotFound { location },
            RouteError::NoPath {
                start_node,
                end_node,
            } => EngineError::NoPathExists {
                start: start_node,
                end: end_node,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteOptimizer {
    weight_factor: f64,
}

impl RouteOptimizer {
    pub fn new(weight_factor: f64) -> Self {
        Self { weight_factor }
    }

    pub fn weight_factor(&self) -> f64 {
        self.weight_factor
    }

    /// Refreshes the edge weights from `traffic` and finds the cheapest route.
    /// Takes the network mutably so the refresh and the search see the same weights.
    pub fn optimize(
        &self,
        network: &mut RoadNetwork,
        traffic: &CurrentTrafficIndex,
        start: &str,
        end: &str,
    ) -> Result<RouteResult, RouteError> {
        let start_node = resolve(network, start)?;
        let end_node = resolve(network, end)?;

        if start_node == end_node {
            return Ok(RouteResult::empty_at(start_node));
        }

        network.refresh_weights(traffic, self.weight_factor);
        let no_path = || RouteError::NoPath {
            start_node: start_node.to_string(),
            end_node: end_node.to_string(),
        };
        let (_, path) = network
            .shortest_path(start_node, end_node)
            .ok_or_else(no_path)?;

        let mut route_details = Vec::with_capacity(path.len().saturating_sub(1));
        let mut total_distance = 0.0;
        let mut total_seconds = 0.0;
        for pair in path.windows(2) {
            let edge = network.edge_between(pair[0], pair[1]).ok_or_else(no_path)?;
            let estimated_time = edge.congestion_weight * 60.0;
            total_distance += edge.distance;
            total_seconds += estimated_time;
            route_details.push(RouteSegment {
                from: pair[0].coordinates(),
                to: pair[1].coordinates(),
                road_name: edge.road_name.clone(),
                road_id: edge.road_id.clone(),
                distance: edge.distance,
                congestion_score: traffic.congestion_of(&edge.road_id).unwrap_or(0.0),
                estimated_time,
            });
        }

        debug!(
            "Route {} -> {}: {} segments, {:.1} m",
            start_node,
            end_node,
            route_details.len(),
            total_distance
        );

        Ok(RouteResult {
            path_coordinates: path.iter().map(NodeId::coordinates).collect(),
            route_details,
            total_distance: round2(total_distance),
            estimated_time: round2(total_seconds / 60.0),
            start_node: start_node.to_string(),
            end_node: end_node.to_string(),
        })
    }
}

fn resolve(network: &RoadNetwork, location: &str) -> Result<NodeId, RouteError> {
    network
        .nearest_node(location)
        .map_err(|_| RouteError::UnknownLocation {
            location: location.to_string(),
            available_locations: network.locations().names(),
            known_nodes: network.node_keys(),
        })
}
