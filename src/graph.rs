use serde::Serialize;
use std::fmt;

/// Handle to a node record in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u32);

/// Handle to an edge record in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EdgeId(u32);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl EdgeId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Reference to a hit owned by a query: (query index, hit index).
pub type HitRef = (usize, usize);

/// How an edge's overlap length was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapType {
    Unknown,
    Manual,
    AutoExact,
    /// Auto-detection ran and found no exact overlap in range.
    Undetermined,
}

/// An oriented sequence fragment. Every node belongs to a strand pair;
/// its name carries a trailing `+` or `-` sign.
#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    sequence: Vec<u8>,
    depth: f64,
    reverse_complement: NodeId,
    edges: Vec<EdgeId>,
    hits: Vec<HitRef>,
    /// Whether the rendering collaborator currently draws this node.
    pub drawn: bool,
}

impl Node {
    /// Full name including the trailing strand sign.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_without_sign(&self) -> &str {
        &self.name[..self.name.len().saturating_sub(1)]
    }

    pub fn sign(&self) -> char {
        self.name.chars().last().unwrap_or('+')
    }

    pub fn is_positive(&self) -> bool {
        self.sign() == '+'
    }

    pub fn is_negative(&self) -> bool {
        self.sign() == '-'
    }

    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    pub fn length(&self) -> usize {
        self.sequence.len()
    }

    pub fn depth(&self) -> f64 {
        self.depth
    }

    pub fn reverse_complement(&self) -> NodeId {
        self.reverse_complement
    }

    /// Edges incident to this node, entering and leaving alike.
    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    /// Hits recorded on this node by the most recent search.
    pub fn hits(&self) -> &[HitRef] {
        &self.hits
    }

    pub fn has_hits(&self) -> bool {
        !self.hits.is_empty()
    }

    /// 1-based base lookup, mirroring hit coordinates.
    pub fn base_at(&self, position: usize) -> Option<u8> {
        if position == 0 {
            return None;
        }
        self.sequence.get(position - 1).copied()
    }
}

/// A directed adjacency between two oriented nodes, with the number of
/// bases shared between the end of the start node and the start of the
/// end node.
#[derive(Debug, Clone)]
pub struct Edge {
    start: NodeId,
    end: NodeId,
    reverse_complement: EdgeId,
    overlap: usize,
    overlap_type: OverlapType,
}

impl Edge {
    pub fn start_node(&self) -> NodeId {
        self.start
    }

    pub fn end_node(&self) -> NodeId {
        self.end
    }

    pub fn reverse_complement(&self) -> EdgeId {
        self.reverse_complement
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn overlap_type(&self) -> OverlapType {
        self.overlap_type
    }
}

/// Compute the reverse complement of a DNA sequence.
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&base| match base {
            b'A' | b'a' => b'T',
            b'T' | b't' => b'A',
            b'C' | b'c' => b'G',
            b'G' | b'g' => b'C',
            b'N' | b'n' => b'N',
            _ => base,
        })
        .collect()
}

/// Strand-paired assembly graph. Nodes and edges live in arenas owned by
/// the graph; handles are indices into them. Both members of a
/// reverse-complement pair are allocated in one call with their
/// cross-references wired before either handle is returned, so there is
/// never a half-linked pair.
#[derive(Debug, Default)]
pub struct AssemblyGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl AssemblyGraph {
    pub fn new() -> Self {
        AssemblyGraph::default()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.index()]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(|i| NodeId(i as u32))
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        (0..self.edges.len()).map(|i| EdgeId(i as u32))
    }

    /// Look a node up by its signed name.
    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.name == name)
            .map(|i| NodeId(i as u32))
    }

    /// Add both strands of a node. The positive node gets `sequence` and
    /// the negative node its reverse complement. Returns (positive,
    /// negative) handles.
    pub fn add_node_pair(&mut self, name: &str, sequence: Vec<u8>, depth: f64) -> (NodeId, NodeId) {
        let pos = NodeId(self.nodes.len() as u32);
        let neg = NodeId(self.nodes.len() as u32 + 1);
        let rc_sequence = reverse_complement(&sequence);
        self.nodes.push(Node {
            name: format!("{name}+"),
            sequence,
            depth,
            reverse_complement: neg,
            edges: Vec::new(),
            hits: Vec::new(),
            drawn: false,
        });
        self.nodes.push(Node {
            name: format!("{name}-"),
            sequence: rc_sequence,
            depth,
            reverse_complement: pos,
            edges: Vec::new(),
            hits: Vec::new(),
            drawn: false,
        });
        (pos, neg)
    }

    /// Add a palindromic node that is its own reverse complement.
    pub fn add_palindromic_node(&mut self, name: &str, sequence: Vec<u8>, depth: f64) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            name: format!("{name}+"),
            sequence,
            depth,
            reverse_complement: id,
            edges: Vec::new(),
            hits: Vec::new(),
            drawn: false,
        });
        id
    }

    /// Add an edge from `start` to `end` and, unless the edge is its own
    /// reverse complement, its twin from rc(end) to rc(start). Returns the
    /// handle of the requested edge.
    pub fn add_edge(&mut self, start: NodeId, end: NodeId, overlap: usize) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        let rc_start = self.nodes[end.index()].reverse_complement;
        let rc_end = self.nodes[start.index()].reverse_complement;
        let own_reverse_complement = rc_start == start && rc_end == end;

        if own_reverse_complement {
            self.edges.push(Edge {
                start,
                end,
                reverse_complement: id,
                overlap,
                overlap_type: OverlapType::Unknown,
            });
            self.attach_edge(id, start);
            self.attach_edge(id, end);
        } else {
            let twin = EdgeId(id.0 + 1);
            self.edges.push(Edge {
                start,
                end,
                reverse_complement: twin,
                overlap,
                overlap_type: OverlapType::Unknown,
            });
            self.edges.push(Edge {
                start: rc_start,
                end: rc_end,
                reverse_complement: id,
                overlap,
                overlap_type: OverlapType::Unknown,
            });
            self.attach_edge(id, start);
            self.attach_edge(id, end);
            self.attach_edge(twin, rc_start);
            self.attach_edge(twin, rc_end);
        }
        id
    }

    fn attach_edge(&mut self, edge: EdgeId, node: NodeId) {
        let edges = &mut self.nodes[node.index()].edges;
        if !edges.contains(&edge) {
            edges.push(edge);
        }
    }

    /// Set the overlap on an edge and its reverse-complement twin.
    pub fn set_overlap(&mut self, id: EdgeId, overlap: usize, overlap_type: OverlapType) {
        let twin = self.edges[id.index()].reverse_complement;
        self.edges[id.index()].overlap = overlap;
        self.edges[id.index()].overlap_type = overlap_type;
        self.edges[twin.index()].overlap = overlap;
        self.edges[twin.index()].overlap_type = overlap_type;
    }

    /// Find the edge running from `from` to `to`, if one exists.
    pub fn find_edge(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        self.nodes[from.index()]
            .edges
            .iter()
            .copied()
            .find(|&e| self.edges[e.index()].start == from && self.edges[e.index()].end == to)
    }

    pub fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
        self.find_edge(from, to).is_some()
    }

    /// The node at the opposite end of an edge from `node`. The caller
    /// must pass one of the edge's two endpoints.
    pub fn other_endpoint(&self, edge: EdgeId, node: NodeId) -> NodeId {
        let e = &self.edges[edge.index()];
        if node == e.start {
            e.end
        } else {
            e.start
        }
    }

    /// Edges leading away from `node` (node is the edge's start).
    pub fn leaving_edges(&self, node: NodeId) -> Vec<EdgeId> {
        self.nodes[node.index()]
            .edges
            .iter()
            .copied()
            .filter(|&e| self.edges[e.index()].start == node)
            .collect()
    }

    /// Edges leading into `node` (node is the edge's end).
    pub fn entering_edges(&self, node: NodeId) -> Vec<EdgeId> {
        self.nodes[node.index()]
            .edges
            .iter()
            .copied()
            .filter(|&e| self.edges[e.index()].end == node)
            .collect()
    }

    /// Whether an edge is the positive member of its twin pair. Exactly
    /// one of an edge and its reverse complement is positive; edges that
    /// are their own reverse complement are always positive.
    pub fn is_positive_edge(&self, id: EdgeId) -> bool {
        let edge = &self.edges[id.index()];
        let start = &self.nodes[edge.start.index()];
        let end = &self.nodes[edge.end.index()];

        if start.is_positive() && end.is_positive() {
            return true;
        }
        if start.is_negative() && end.is_negative() {
            return false;
        }
        if edge.reverse_complement == id {
            return true;
        }

        // One endpoint of each sign: an arbitrary but consistent choice,
        // made against the twin's starting-node name so the two members
        // of the pair always disagree.
        let twin = &self.edges[edge.reverse_complement.index()];
        let twin_start = &self.nodes[twin.start.index()];
        start.name > twin_start.name
    }

    /// Whether an edge should be drawn. In double-stranded mode any edge
    /// between two drawn nodes is visible; in single-stranded mode a node
    /// or its reverse complement counts as drawn, and only the positive
    /// member of each edge pair is shown.
    pub fn edge_is_visible(&self, id: EdgeId, double_mode: bool) -> bool {
        let edge = &self.edges[id.index()];
        let start = &self.nodes[edge.start.index()];
        let end = &self.nodes[edge.end.index()];

        if double_mode {
            return start.drawn && end.drawn;
        }

        let draw = (start.drawn || self.nodes[start.reverse_complement.index()].drawn)
            && (end.drawn || self.nodes[end.reverse_complement.index()].drawn);
        draw && self.is_positive_edge(id)
    }

    pub fn set_drawn(&mut self, node: NodeId, drawn: bool) {
        self.nodes[node.index()].drawn = drawn;
    }

    pub fn clear_hits(&mut self) {
        for node in &mut self.nodes {
            node.hits.clear();
        }
    }

    pub fn add_hit_to_node(&mut self, node: NodeId, hit: HitRef) {
        self.nodes[node.index()].hits.push(hit);
    }
}
