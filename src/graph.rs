//! # Media Graph Module
//!
//! A small typed property graph of musical entities and their relations. It is the
//! raw material for graph-based ranking (see [`crate::algorithm`]).
//!
//! ## Model
//!
//! - **Nodes**: songs, artists, vibes, audio features and genres. Each node has a
//!   stable string id, a display label and the id of the backend it came from.
//!   Nodes never change after insertion apart from their label.
//! - **Edges**: `Similar` and `Related` are undirected and traversed both ways;
//!   `Next`, `HasFeature` and `HasGenre` only run from source to target.
//!
//! Inserting an edge whose endpoints are not both in the graph is a contract
//! violation and is rejected, so the graph never holds dangling edges.
//!
//! ## Snapshots
//!
//! A graph can be saved to and loaded from JSON ([`GraphSnapshot`]). Loading
//! replays every insertion through the validating API.
//!
//! ```
//! use vibegraph::graph::{EdgeType, MediaGraph, Node, NodeType};
//!
//! let mut graph = MediaGraph::new();
//! graph.add_node(Node::new("a", NodeType::Song, "Intro", "spotify"))?;
//! graph.add_node(Node::new("b", NodeType::Song, "Outro", "spotify"))?;
//! graph.add_edge("a", "b", EdgeType::Similar, Some(0.8))?;
//!
//! // Similar is undirected, so `b` sees `a` too.
//! let back = graph.neighbors("b", &[EdgeType::Similar]);
//! assert_eq!(back[0].node.id, "a");
//! # Ok::<(), vibegraph::error::GraphError>(())
//! ```

use crate::error::GraphError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Graph handle shared between the engine and whatever feeds the graph.
pub type SharedGraph = Arc<RwLock<MediaGraph>>;

/// Weight used for edges inserted without one.
pub const DEFAULT_EDGE_WEIGHT: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Song,
    Artist,
    Vibe,
    AudioFeature,
    Genre,
}

impl NodeType {
    /// Display color for this node type.
    pub const fn color(self) -> &'static str {
        match self {
            Self::Song => "#1DB954",
            Self::Artist => "#FF6B6B",
            Self::Vibe => "#A78BFA",
            Self::AudioFeature => "#FBBF24",
            Self::Genre => "#38BDF8",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Song => "SONG",
            Self::Artist => "ARTIST",
            Self::Vibe => "VIBE",
            Self::AudioFeature => "AUDIO_FEATURE",
            Self::Genre => "GENRE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    Similar,
    Next,
    Related,
    HasFeature,
    HasGenre,
}

impl EdgeType {
    pub const ALL: [EdgeType; 5] = [
        Self::Similar,
        Self::Next,
        Self::Related,
        Self::HasFeature,
        Self::HasGenre,
    ];

    /// Directed edges are only followed from source to target.
    pub const fn is_directed(self) -> bool {
        matches!(self, Self::Next | Self::HasFeature | Self::HasGenre)
    }

    /// Display color for this edge type.
    pub const fn color(self) -> &'static str {
        match self {
            Self::Similar => "#22C55E",
            Self::Next => "#F97316",
            Self::Related => "#94A3B8",
            Self::HasFeature => "#EAB308",
            Self::HasGenre => "#0EA5E9",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Similar => "SIMILAR",
            Self::Next => "NEXT",
            Self::Related => "RELATED",
            Self::HasFeature => "HAS_FEATURE",
            Self::HasGenre => "HAS_GENRE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub label: String,
    /// Id of the backend this entity came from.
    pub origin: String,
}

impl Node {
    pub fn new(id: &str, node_type: NodeType, label: &str, origin: &str) -> Self {
        Self {
            id: id.to_string(),
            node_type,
            label: label.to_string(),
            origin: origin.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl Edge {
    pub fn weight_or_default(&self) -> f64 {
        self.weight.unwrap_or(DEFAULT_EDGE_WEIGHT)
    }
}

/// A node reached from another one, with the edge that led there.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor<'a> {
    pub node: &'a Node,
    pub edge: &'a Edge,
}

/// One traversable step out of a node: the edge index and the node on the other end.
#[derive(Debug, Clone, Copy)]
struct Step {
    edge: usize,
    other: usize,
}

/// Serialized form of a graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// In-memory typed graph. Nodes and edges keep their insertion order.
#[derive(Debug, Clone, Default)]
pub struct MediaGraph {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    edges: Vec<Edge>,
    steps: Vec<Vec<Step>>,
}

impl MediaGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap the graph for sharing with a [`crate::engine::RecommendationEngine`].
    pub fn shared(self) -> SharedGraph {
        Arc::new(RwLock::new(self))
    }

    /// Insert a node.
    ///
    /// # Errors
    ///
    /// [`GraphError::DuplicateNode`] if a node with the same id exists. Use
    /// [`MediaGraph::refresh_label`] to rename an existing node.
    pub fn add_node(&mut self, node: Node) -> Result<(), GraphError> {
        if self.index.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        log::trace!("Adding {} node `{}'", node.node_type, node.id);
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        self.steps.push(Vec::new());
        Ok(())
    }

    /// Insert an edge between two existing nodes.
    ///
    /// # Errors
    ///
    /// - [`GraphError::DanglingEdge`] if either endpoint is missing.
    /// - [`GraphError::InvalidWeight`] for a negative or non-finite weight.
    pub fn add_edge(
        &mut self,
        from: &str,
        to: &str,
        edge_type: EdgeType,
        weight: Option<f64>,
    ) -> Result<(), GraphError> {
        let dangling = |missing: &str| GraphError::DanglingEdge {
            from: from.to_string(),
            to: to.to_string(),
            missing: missing.to_string(),
        };
        let from_idx = *self.index.get(from).ok_or_else(|| dangling(from))?;
        let to_idx = *self.index.get(to).ok_or_else(|| dangling(to))?;

        if let Some(w) = weight {
            if !w.is_finite() || w < 0.0 {
                return Err(GraphError::InvalidWeight {
                    from: from.to_string(),
                    to: to.to_string(),
                    weight: w,
                });
            }
        }

        let edge_idx = self.edges.len();
        self.edges.push(Edge {
            from: from.to_string(),
            to: to.to_string(),
            edge_type,
            weight,
        });

        self.steps[from_idx].push(Step {
            edge: edge_idx,
            other: to_idx,
        });
        if !edge_type.is_directed() && from_idx != to_idx {
            self.steps[to_idx].push(Step {
                edge: edge_idx,
                other: from_idx,
            });
        }
        Ok(())
    }

    /// Replace a node's display label; the only mutation a node allows.
    pub fn refresh_label(&mut self, id: &str, label: &str) -> Result<(), GraphError> {
        let idx = *self
            .index
            .get(id)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))?;
        self.nodes[idx].label = label.to_string();
        Ok(())
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// First node of `node_type` whose label matches `label`, ignoring case.
    pub fn find_by_label(&self, node_type: NodeType, label: &str) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|n| n.node_type == node_type && n.label.eq_ignore_ascii_case(label))
    }

    /// Nodes adjacent to `id` across edges whose type is in `filter`.
    ///
    /// Directed edges are only followed forwards. An unknown `id` has no
    /// neighbors. Results follow edge insertion order.
    pub fn neighbors(&self, id: &str, filter: &[EdgeType]) -> Vec<Neighbor<'_>> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        self.steps_from(idx)
            .filter(|(_, edge)| filter.contains(&edge.edge_type))
            .map(|(other, edge)| Neighbor {
                node: &self.nodes[other],
                edge,
            })
            .collect()
    }

    pub(crate) fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub(crate) fn node_at(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    /// Traversable steps out of the node at `idx` as `(neighbor index, edge)`.
    pub(crate) fn steps_from(&self, idx: usize) -> impl Iterator<Item = (usize, &Edge)> + '_ {
        self.steps[idx]
            .iter()
            .map(move |step| (step.other, &self.edges[step.edge]))
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }

    /// Rebuild a graph from a snapshot, validating every insertion.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        for node in snapshot.nodes {
            graph.add_node(node)?;
        }
        for edge in snapshot.edges {
            graph.add_edge(&edge.from, &edge.to, edge.edge_type, edge.weight)?;
        }
        Ok(graph)
    }

    /// Load a JSON graph snapshot from disk.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read graph snapshot {}", path.display()))?;
        let snapshot: GraphSnapshot = serde_json::from_str(&content)
            .with_context(|| format!("Invalid graph snapshot JSON in {}", path.display()))?;
        let graph = Self::from_snapshot(snapshot)
            .with_context(|| format!("Graph snapshot {} is inconsistent", path.display()))?;
        log::info!(
            "Loaded graph with {} nodes and {} edges from {}",
            graph.node_count(),
            graph.edge_count(),
            path.display()
        );
        Ok(graph)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write graph snapshot {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(id: &str) -> Node {
        Node::new(id, NodeType::Song, id, "spotify")
    }

    fn sample_graph() -> MediaGraph {
        let mut graph = MediaGraph::new();
        for id in ["a", "b", "c"] {
            graph.add_node(song(id)).unwrap();
        }
        graph
            .add_node(Node::new("rock", NodeType::Genre, "Rock", "spotify"))
            .unwrap();
        graph.add_edge("a", "b", EdgeType::Similar, Some(0.8)).unwrap();
        graph.add_edge("b", "c", EdgeType::Next, None).unwrap();
        graph.add_edge("a", "rock", EdgeType::HasGenre, None).unwrap();
        graph
    }

    #[test]
    fn test_dangling_edge_rejected() {
        let mut graph = sample_graph();
        let err = graph
            .add_edge("a", "ghost", EdgeType::Similar, None)
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::DanglingEdge {
                from: "a".to_string(),
                to: "ghost".to_string(),
                missing: "ghost".to_string(),
            }
        );
        assert_eq!(graph.edge_count(), 3, "Rejected edge must not be stored");
    }

    #[test]
    fn test_duplicate_node_rejected_but_label_refreshes() {
        let mut graph = sample_graph();
        assert!(matches!(
            graph.add_node(song("a")),
            Err(GraphError::DuplicateNode(id)) if id == "a"
        ));

        graph.refresh_label("a", "Renamed").unwrap();
        assert_eq!(graph.node("a").unwrap().label, "Renamed");
        assert!(graph.refresh_label("ghost", "x").is_err());
    }

    #[test]
    fn test_invalid_weight_rejected() {
        let mut graph = sample_graph();
        assert!(graph.add_edge("a", "c", EdgeType::Similar, Some(-1.0)).is_err());
        assert!(graph
            .add_edge("a", "c", EdgeType::Similar, Some(f64::NAN))
            .is_err());
    }

    #[test]
    fn test_undirected_edges_traverse_both_ways() {
        let graph = sample_graph();
        let from_b: Vec<_> = graph
            .neighbors("b", &[EdgeType::Similar])
            .iter()
            .map(|n| n.node.id.clone())
            .collect();
        assert_eq!(from_b, vec!["a"]);
    }

    #[test]
    fn test_directed_edges_only_forward() {
        let graph = sample_graph();
        assert_eq!(graph.neighbors("b", &[EdgeType::Next]).len(), 1);
        assert!(graph.neighbors("c", &[EdgeType::Next]).is_empty());
        assert!(graph.neighbors("rock", &[EdgeType::HasGenre]).is_empty());
    }

    #[test]
    fn test_neighbor_filter_and_unknown_node() {
        let graph = sample_graph();
        assert_eq!(graph.neighbors("a", &EdgeType::ALL).len(), 2);
        assert_eq!(graph.neighbors("a", &[EdgeType::HasGenre]).len(), 1);
        assert!(graph.neighbors("ghost", &EdgeType::ALL).is_empty());
    }

    #[test]
    fn test_snapshot_replay_preserves_order() {
        let graph = sample_graph();
        let rebuilt = MediaGraph::from_snapshot(graph.snapshot()).unwrap();
        assert_eq!(rebuilt.snapshot(), graph.snapshot());
    }

    #[test]
    fn test_snapshot_with_dangling_edge_fails() {
        let snapshot: GraphSnapshot = serde_json::from_str(
            r#"{
                "nodes": [{"id": "a", "type": "SONG", "label": "A", "origin": "spotify"}],
                "edges": [{"from": "a", "to": "b", "type": "SIMILAR", "weight": 0.5}]
            }"#,
        )
        .unwrap();
        assert!(matches!(
            MediaGraph::from_snapshot(snapshot),
            Err(GraphError::DanglingEdge { .. })
        ));
    }

    #[test]
    fn test_json_roundtrip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        sample_graph().save_json(&path).unwrap();
        let loaded = MediaGraph::load_json(&path).unwrap();
        assert_eq!(loaded.node_count(), 4);
        assert_eq!(loaded.edge_count(), 3);
    }

    #[test]
    fn test_colors_are_stable_per_type() {
        assert_eq!(NodeType::Song.color(), NodeType::Song.color());
        assert_ne!(NodeType::Song.color(), NodeType::Artist.color());
        assert_ne!(EdgeType::Similar.color(), EdgeType::Next.color());
    }

    #[test]
    fn test_find_by_label_ignores_case() {
        let mut graph = MediaGraph::new();
        graph
            .add_node(Node::new("v1", NodeType::Vibe, "Calm", "local"))
            .unwrap();
        assert_eq!(graph.find_by_label(NodeType::Vibe, "calm").unwrap().id, "v1");
        assert!(graph.find_by_label(NodeType::Genre, "calm").is_none());
    }
}
