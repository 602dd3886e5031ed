use crate::config::MapCenter;
use crate::road_network::graph::NodeId;

/// Fixed table of symbolic place names that route queries can use.
#[derive(Debug, Clone, Default)]
pub struct LocationTable {
    entries: Vec<(String, NodeId)>,
}

impl LocationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Letters A-D plus the arterial street names, placed relative to `center`.
    pub fn for_map_center(center: MapCenter) -> Self {
        let at = |dlat: f64, dlon: f64| NodeId::from_coords(center.lat + dlat, center.lng + dlon);
        let mut table = Self::new();
        table.insert("A", at(0.0, 0.0));
        table.insert("B", at(0.005, 0.005));
        table.insert("C", at(0.002, 0.002));
        table.insert("D", at(0.004, 0.006));
        table.insert("Main Street", at(0.0, 0.0));
        table.insert("Broadway", at(0.001, 0.001));
        table.insert("Park Avenue", at(0.002, 0.002));
        table.insert("5th Avenue", at(0.003, 0.003));
        table.insert("Madison Ave", at(0.004, 0.004));
        table
    }

    /// Adds or replaces a named location.
    pub fn insert(&mut self, name: impl Into<String>, node: NodeId) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = node,
            None => self.entries.push((name, node)),
        }
    }

    pub fn resolve(&self, name: &str) -> Option<NodeId> {
        let wanted = sanitize_location_name(name);
        self.entries
            .iter()
            .find(|(known, _)| *known == wanted)
            .map(|(_, node)| *node)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Keeps letters, digits, whitespace, '-' and '_', then trims.
pub fn sanitize_location_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
        .collect::<String>()
        .trim()
        .to_string()
}
