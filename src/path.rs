use crate::graph::{AssemblyGraph, EdgeId, NodeId};
use std::fmt;
use thiserror::Error;

/// How a path is bounded within its first and last nodes. Positions are
/// 1-based and inclusive; `Whole` spans from the first base of the first
/// node to the last base of the last node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathBounds {
    Whole,
    Partial { start: usize, end: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("a path must contain at least one node")]
    Empty,
    #[error("nodes {0} and {1} are not joined by an edge in that direction")]
    MissingEdge(String, String),
}

/// An ordered sequence of nodes connected by consecutive edges, with
/// optional clipping of the first node's start and the last node's end.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    nodes: Vec<NodeId>,
    edges: Vec<EdgeId>,
    bounds: PathBounds,
}

impl Path {
    /// Build a whole-node path, checking that every consecutive node pair
    /// is joined by an edge in the stated direction.
    pub fn from_ordered_nodes(graph: &AssemblyGraph, nodes: Vec<NodeId>) -> Result<Path, PathError> {
        if nodes.is_empty() {
            return Err(PathError::Empty);
        }
        let mut edges = Vec::with_capacity(nodes.len() - 1);
        for pair in nodes.windows(2) {
            let edge = graph.find_edge(pair[0], pair[1]).ok_or_else(|| {
                PathError::MissingEdge(
                    graph.node(pair[0]).name().to_string(),
                    graph.node(pair[1]).name().to_string(),
                )
            })?;
            edges.push(edge);
        }
        Ok(Path {
            nodes,
            edges,
            bounds: PathBounds::Whole,
        })
    }

    /// Replace the path's end clipping.
    pub fn with_bounds(mut self, bounds: PathBounds) -> Path {
        self.bounds = bounds;
        self
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    pub fn bounds(&self) -> PathBounds {
        self.bounds
    }

    /// 1-based position of the first included base of the first node.
    pub fn start_position(&self) -> usize {
        match self.bounds {
            PathBounds::Whole => 1,
            PathBounds::Partial { start, .. } => start,
        }
    }

    /// 1-based position of the last included base of the last node.
    pub fn end_position(&self, graph: &AssemblyGraph) -> usize {
        match self.bounds {
            PathBounds::Whole => self
                .nodes
                .last()
                .map(|&n| graph.node(n).length())
                .unwrap_or(0),
            PathBounds::Partial { end, .. } => end,
        }
    }

    /// Total sequence length: node lengths minus edge overlaps, reduced
    /// further by any end clipping.
    pub fn length(&self, graph: &AssemblyGraph) -> usize {
        let mut length: i64 = self
            .nodes
            .iter()
            .map(|&n| graph.node(n).length() as i64)
            .sum();
        for &e in &self.edges {
            length -= graph.edge(e).overlap() as i64;
        }
        if let Some(&last) = self.nodes.last() {
            length -= self.start_position() as i64 - 1;
            length -= graph.node(last).length() as i64 - self.end_position(graph) as i64;
        }
        length.max(0) as usize
    }

    /// The traversed sequence: the first node from its start position,
    /// each later node with its incoming edge's overlap skipped, and the
    /// tail clipped to the end position.
    pub fn sequence(&self, graph: &AssemblyGraph) -> Vec<u8> {
        let mut sequence = Vec::new();
        for (i, &node) in self.nodes.iter().enumerate() {
            let node_seq = graph.node(node).sequence();
            let skip = if i == 0 {
                self.start_position() - 1
            } else {
                graph.edge(self.edges[i - 1]).overlap()
            };
            if skip < node_seq.len() {
                sequence.extend_from_slice(&node_seq[skip..]);
            }
        }
        if let Some(&last) = self.nodes.last() {
            let trailing = graph.node(last).length() - self.end_position(graph).min(graph.node(last).length());
            sequence.truncate(sequence.len().saturating_sub(trailing));
        }
        sequence
    }

    /// Human-readable form, e.g. `3+, 5-, 7+ (12..80)`.
    pub fn describe(&self, graph: &AssemblyGraph) -> String {
        let names: Vec<&str> = self.nodes.iter().map(|&n| graph.node(n).name()).collect();
        match self.bounds {
            PathBounds::Whole => names.join(", "),
            PathBounds::Partial { start, end } => {
                format!("{} ({start}..{end})", names.join(", "))
            }
        }
    }
}

impl fmt::Display for PathBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathBounds::Whole => write!(f, "whole"),
            PathBounds::Partial { start, end } => write!(f, "{start}..{end}"),
        }
    }
}
