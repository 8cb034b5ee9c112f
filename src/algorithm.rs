//! Graph ranking for music recommendations.
//!
//! Scores every song reachable from a seed set within two hops and orders them.

use crate::graph::{EdgeType, MediaGraph, NodeType};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Expansion never goes deeper than this, to keep ranking latency predictable.
pub const MAX_DEPTH: u32 = 2;

/// Default multiplicative discount applied per hop.
pub const DEFAULT_DEPTH_DECAY: f64 = 0.5;

/// Relations followed while ranking. Feature and genre links only describe songs.
pub const TRAVERSED_EDGES: [EdgeType; 3] = [EdgeType::Similar, EdgeType::Related, EdgeType::Next];

/// Tunable ranking parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingConfig {
    /// Per-hop discount, kept inside the open interval (0, 1).
    pub depth_decay: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            depth_decay: DEFAULT_DEPTH_DECAY,
        }
    }
}

impl RankingConfig {
    pub fn with_decay(depth_decay: f64) -> Self {
        Self { depth_decay }
    }

    /// The decay actually used; out-of-range values fall back to the default.
    #[must_use]
    pub fn effective_decay(&self) -> f64 {
        if self.depth_decay > 0.0 && self.depth_decay < 1.0 {
            self.depth_decay
        } else {
            log::warn!(
                "Depth decay {} outside (0, 1), using {}",
                self.depth_decay,
                DEFAULT_DEPTH_DECAY
            );
            DEFAULT_DEPTH_DECAY
        }
    }
}

/// A ranked candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredNode {
    pub id: String,
    pub score: f64,
    /// Hop count at which the node was first reached.
    pub depth: u32,
}

/// Rank songs reachable from `seeds`.
///
/// Breadth-first expansion up to [`MAX_DEPTH`] hops across
/// [`TRAVERSED_EDGES`]. Every traversal of an edge from the frontier at depth
/// `d - 1` into a node at depth `d` adds `weight * decay^d` to that node. A node
/// is expanded once, from the depth where it was first reached.
///
/// - Seeds never appear in the output.
/// - Only `Song` nodes are returned, though other node types carry the walk.
/// - Ordering is by descending score, ties by node insertion order.
/// - Unknown seed ids are ignored; with no known seeds the result is empty.
///
/// # Examples
///
/// ```
/// use vibegraph::algorithm::{rank, RankingConfig};
/// use vibegraph::graph::{EdgeType, MediaGraph, Node, NodeType};
///
/// let mut graph = MediaGraph::new();
/// graph.add_node(Node::new("a", NodeType::Song, "A", "spotify")).unwrap();
/// graph.add_node(Node::new("b", NodeType::Song, "B", "spotify")).unwrap();
/// graph.add_edge("a", "b", EdgeType::Similar, Some(0.8)).unwrap();
///
/// let ranked = rank(&graph, &["a".to_string()], &RankingConfig::default());
/// assert_eq!(ranked.len(), 1);
/// assert_eq!(ranked[0].id, "b");
/// assert!((ranked[0].score - 0.4).abs() < 1e-12);
/// ```
#[must_use]
pub fn rank(graph: &MediaGraph, seeds: &[String], config: &RankingConfig) -> Vec<ScoredNode> {
    let mut seed_set = HashSet::new();
    let mut frontier = Vec::new();
    for seed in seeds {
        if let Some(idx) = graph.index_of(seed) {
            if seed_set.insert(idx) {
                frontier.push(idx);
            }
        }
    }
    if frontier.is_empty() {
        return Vec::new();
    }

    let decay = config.effective_decay();
    let mut scores: HashMap<usize, (f64, u32)> = HashMap::new();
    let mut discovered = seed_set.clone();

    for depth in 1..=MAX_DEPTH {
        let factor = decay.powi(depth as i32);
        let mut next = Vec::new();

        for &from in &frontier {
            for (to, edge) in graph.steps_from(from) {
                if !TRAVERSED_EDGES.contains(&edge.edge_type) || seed_set.contains(&to) {
                    continue;
                }
                let entry = scores.entry(to).or_insert((0.0, depth));
                entry.0 += edge.weight_or_default() * factor;

                if discovered.insert(to) {
                    next.push(to);
                }
            }
        }

        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    let mut ranked: Vec<(usize, f64, u32)> = scores
        .into_iter()
        .filter(|(idx, _)| graph.node_at(*idx).node_type == NodeType::Song)
        .map(|(idx, (score, depth))| (idx, score, depth))
        .collect();

    ranked.sort_by(|(a_idx, a_score, _), (b_idx, b_score, _)| {
        b_score
            .partial_cmp(a_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a_idx.cmp(b_idx))
    });

    log::trace!("Ranked {} candidates from {} seeds", ranked.len(), seed_set.len());

    ranked
        .into_iter()
        .map(|(idx, score, depth)| ScoredNode {
            id: graph.node_at(idx).id.clone(),
            score,
            depth,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;

    fn graph_with(
        nodes: &[(&str, NodeType)],
        edges: &[(&str, &str, EdgeType, Option<f64>)],
    ) -> MediaGraph {
        let mut graph = MediaGraph::new();
        for (id, kind) in nodes {
            graph.add_node(Node::new(id, *kind, id, "spotify")).unwrap();
        }
        for (from, to, kind, weight) in edges {
            graph.add_edge(from, to, *kind, *weight).unwrap();
        }
        graph
    }

    fn ids(ranked: &[ScoredNode]) -> Vec<&str> {
        ranked.iter().map(|n| n.id.as_str()).collect()
    }

    fn seeds(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_single_similar_edge() {
        let graph = graph_with(
            &[("a", NodeType::Song), ("b", NodeType::Song)],
            &[("a", "b", EdgeType::Similar, Some(0.8))],
        );
        let ranked = rank(&graph, &seeds(&["a"]), &RankingConfig::default());
        assert_eq!(ids(&ranked), vec!["b"]);
        assert!((ranked[0].score - 0.8 * DEFAULT_DEPTH_DECAY).abs() < 1e-12);
        assert_eq!(ranked[0].depth, 1);
    }

    #[test]
    fn test_seeds_never_recommended() {
        let graph = graph_with(
            &[("a", NodeType::Song), ("b", NodeType::Song)],
            &[
                ("a", "b", EdgeType::Similar, Some(1.0)),
                ("b", "a", EdgeType::Next, Some(1.0)),
            ],
        );
        let ranked = rank(&graph, &seeds(&["a", "b"]), &RankingConfig::default());
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_second_hop_is_discounted_twice() {
        let graph = graph_with(
            &[("a", NodeType::Song), ("b", NodeType::Song), ("c", NodeType::Song)],
            &[
                ("a", "b", EdgeType::Next, Some(1.0)),
                ("b", "c", EdgeType::Next, Some(1.0)),
            ],
        );
        let ranked = rank(&graph, &seeds(&["a"]), &RankingConfig::with_decay(0.5));
        assert_eq!(ids(&ranked), vec!["b", "c"]);
        assert!((ranked[1].score - 0.25).abs() < 1e-12);
        assert_eq!(ranked[1].depth, 2);
    }

    #[test]
    fn test_depth_is_bounded() {
        let graph = graph_with(
            &[
                ("a", NodeType::Song),
                ("b", NodeType::Song),
                ("c", NodeType::Song),
                ("d", NodeType::Song),
            ],
            &[
                ("a", "b", EdgeType::Next, None),
                ("b", "c", EdgeType::Next, None),
                ("c", "d", EdgeType::Next, None),
            ],
        );
        let ranked = rank(&graph, &seeds(&["a"]), &RankingConfig::default());
        assert!(!ids(&ranked).contains(&"d"), "Third hop must not be reached");
    }

    #[test]
    fn test_directed_next_not_followed_backwards() {
        let graph = graph_with(
            &[("a", NodeType::Song), ("b", NodeType::Song)],
            &[("b", "a", EdgeType::Next, None)],
        );
        assert!(rank(&graph, &seeds(&["a"]), &RankingConfig::default()).is_empty());
    }

    #[test]
    fn test_non_song_nodes_carry_walk_but_are_excluded() {
        let graph = graph_with(
            &[("calm", NodeType::Vibe), ("artist", NodeType::Artist), ("s1", NodeType::Song)],
            &[
                ("calm", "artist", EdgeType::Related, None),
                ("artist", "s1", EdgeType::Related, None),
            ],
        );
        let ranked = rank(&graph, &seeds(&["calm"]), &RankingConfig::default());
        assert_eq!(ids(&ranked), vec!["s1"]);
    }

    #[test]
    fn test_genre_and_feature_edges_ignored() {
        let graph = graph_with(
            &[("a", NodeType::Song), ("rock", NodeType::Genre), ("b", NodeType::Song)],
            &[
                ("a", "rock", EdgeType::HasGenre, None),
                ("b", "rock", EdgeType::HasGenre, None),
            ],
        );
        assert!(rank(&graph, &seeds(&["a"]), &RankingConfig::default()).is_empty());
    }

    #[test]
    fn test_scores_accumulate_across_paths() {
        let graph = graph_with(
            &[
                ("a", NodeType::Song),
                ("x", NodeType::Song),
                ("b", NodeType::Song),
                ("c", NodeType::Song),
            ],
            &[
                ("a", "b", EdgeType::Similar, Some(0.2)),
                ("x", "b", EdgeType::Similar, Some(0.2)),
                ("a", "c", EdgeType::Similar, Some(0.3)),
            ],
        );
        let ranked = rank(&graph, &seeds(&["a", "x"]), &RankingConfig::default());
        assert_eq!(ids(&ranked), vec!["b", "c"]);
        assert!((ranked[0].score - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_ties_break_by_insertion_order() {
        let graph = graph_with(
            &[("a", NodeType::Song), ("z", NodeType::Song), ("m", NodeType::Song)],
            &[
                ("a", "m", EdgeType::Similar, Some(0.5)),
                ("a", "z", EdgeType::Similar, Some(0.5)),
            ],
        );
        let ranked = rank(&graph, &seeds(&["a"]), &RankingConfig::default());
        assert_eq!(ids(&ranked), vec!["z", "m"]);
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let graph = graph_with(
            &[
                ("a", NodeType::Song),
                ("b", NodeType::Song),
                ("c", NodeType::Song),
                ("d", NodeType::Song),
            ],
            &[
                ("a", "b", EdgeType::Similar, Some(0.4)),
                ("a", "c", EdgeType::Related, Some(0.4)),
                ("c", "d", EdgeType::Next, Some(0.9)),
            ],
        );
        let first = rank(&graph, &seeds(&["a"]), &RankingConfig::default());
        for _ in 0..20 {
            assert_eq!(rank(&graph, &seeds(&["a"]), &RankingConfig::default()), first);
        }
    }

    #[test]
    fn test_unknown_seeds_and_bad_decay() {
        let graph = graph_with(&[("a", NodeType::Song)], &[]);
        assert!(rank(&graph, &seeds(&["ghost"]), &RankingConfig::default()).is_empty());
        assert_eq!(RankingConfig::with_decay(1.5).effective_decay(), DEFAULT_DEPTH_DECAY);
        assert_eq!(RankingConfig::with_decay(0.0).effective_decay(), DEFAULT_DEPTH_DECAY);
    }
}
