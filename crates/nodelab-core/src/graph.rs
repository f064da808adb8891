use crate::{Error, NodeIdMap, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A directed citation graph keyed by dense node indices.
///
/// Uses petgraph's directed graph internally. Nodes are added the first time
/// they appear as an edge endpoint; repeated edges collapse into one, so the
/// result is a simple digraph.
///
/// # Example
///
/// ```rust
/// use nodelab_core::CitationGraph;
///
/// let mut g = CitationGraph::new();
/// g.add_edge(0, 1);
/// g.add_edge(1, 2);
/// g.add_edge(0, 1);
///
/// assert_eq!(g.node_count(), 3);
/// assert_eq!(g.edge_count(), 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationGraph {
    /// The underlying directed graph; node weight is the dense node index.
    graph: DiGraph<usize, ()>,

    /// Dense node index -> petgraph node index.
    #[serde(skip, default)]
    node_index: HashMap<usize, NodeIndex>,
}

impl Default for CitationGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl CitationGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_index: HashMap::new(),
        }
    }

    /// Build from `(source, target)` index pairs.
    pub fn from_edges(edges: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let mut g = Self::new();
        for (u, v) in edges {
            g.add_edge(u, v);
        }
        g
    }

    /// Parse an edge list of original IDs (two tokens per line), translating
    /// both endpoints through `map`. An endpoint absent from the map is fatal.
    pub fn from_edge_reader<R: BufRead>(reader: R, map: &NodeIdMap, origin: &Path) -> Result<Self> {
        let mut g = Self::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let parts: Vec<&str> = line.split_whitespace().collect();
            let [src, dst] = parts.as_slice() else {
                return Err(Error::parse(
                    origin,
                    lineno + 1,
                    format!("expected 2 node ids, found {}", parts.len()),
                ));
            };
            g.add_edge(map.resolve(src)?, map.resolve(dst)?);
        }
        Ok(g)
    }

    pub fn from_edge_file(path: impl AsRef<Path>, map: &NodeIdMap) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        Self::from_edge_reader(reader, map, path)
    }

    /// Rebuild the lookup index after deserialization.
    pub(crate) fn rebuild_indexes(&mut self) {
        self.node_index = self
            .graph
            .node_indices()
            .map(|idx| (self.graph[idx], idx))
            .collect();
    }

    fn get_or_create_node(&mut self, node: usize) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(&node) {
            return idx;
        }
        let idx = self.graph.add_node(node);
        self.node_index.insert(node, idx);
        idx
    }

    /// Add a directed edge; a repeated edge is a no-op.
    pub fn add_edge(&mut self, source: usize, target: usize) {
        let s = self.get_or_create_node(source);
        let t = self.get_or_create_node(target);
        self.graph.update_edge(s, t, ());
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.graph.node_weights().copied()
    }

    /// Edges as `(source, target)` node indices, in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.graph
            .raw_edges()
            .iter()
            .map(|e| (self.graph[e.source()], self.graph[e.target()]))
    }

    pub fn contains_node(&self, node: usize) -> bool {
        self.node_index.contains_key(&node)
    }

    pub fn has_edge(&self, source: usize, target: usize) -> bool {
        let (Some(&s), Some(&t)) = (self.node_index.get(&source), self.node_index.get(&target))
        else {
            return false;
        };
        self.graph.find_edge(s, t).is_some()
    }

    pub fn out_degree(&self, node: usize) -> usize {
        self.degree(node, Direction::Outgoing)
    }

    pub fn in_degree(&self, node: usize) -> usize {
        self.degree(node, Direction::Incoming)
    }

    fn degree(&self, node: usize, dir: Direction) -> usize {
        match self.node_index.get(&node) {
            Some(&idx) => self.graph.neighbors_directed(idx, dir).count(),
            None => 0,
        }
    }

    /// Get the underlying petgraph for advanced operations.
    pub fn as_petgraph(&self) -> &DiGraph<usize, ()> {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn id_map(ids: &str) -> NodeIdMap {
        NodeIdMap::from_content_reader(Cursor::new(ids)).unwrap()
    }

    #[test]
    fn test_edges_translated_through_map() {
        let map = id_map("35\n1033\n103482\n");
        let g = CitationGraph::from_edge_reader(
            Cursor::new("35 1033\n35 103482\n1033 103482\n"),
            &map,
            Path::new("cora.edges"),
        )
        .unwrap();

        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edges().collect::<Vec<_>>(), vec![(0, 1), (0, 2), (1, 2)]);
        assert!(g.has_edge(0, 2));
        assert!(!g.has_edge(2, 0));
        assert_eq!(g.out_degree(0), 2);
        assert_eq!(g.in_degree(2), 2);
    }

    #[test]
    fn test_unknown_endpoint_is_fatal() {
        let map = id_map("a\nb\n");
        let err =
            CitationGraph::from_edge_reader(Cursor::new("a b\nb c\n"), &map, Path::new("e"))
                .unwrap_err();
        assert!(matches!(err, Error::UnknownNode(id) if id == "c"));
    }

    #[test]
    fn test_malformed_line() {
        let map = id_map("a\nb\n");
        let err = CitationGraph::from_edge_reader(Cursor::new("a b a\n"), &map, Path::new("e"))
            .unwrap_err();
        assert!(matches!(err, Error::Parse { line: 1, .. }));
    }

    #[test]
    fn test_nodes_in_first_encounter_order() {
        let g = CitationGraph::from_edges([(5, 2), (2, 9), (5, 9)]);
        assert_eq!(g.nodes().collect::<Vec<_>>(), vec![5, 2, 9]);
        assert!(!g.contains_node(0));
    }
}
