use crate::graph::NodeId;
use crate::scinot::SciNot;
use serde::Serialize;

/// Whether a query is a nucleotide or protein sequence. Protein query
/// coordinates are in amino acids and are scaled by three when compared
/// against nucleotide path lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceType {
    Nucleotide,
    Protein,
}

/// Display colour handed to the rendering collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Colour {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Colour { r, g, b }
    }
}

/// A single alignment of a query against one node, as reported by the
/// external aligner. All coordinates are 1-based and inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub node: NodeId,
    pub node_start: usize,
    pub node_end: usize,
    pub query_start: usize,
    pub query_end: usize,
    pub alignment_length: usize,
    pub percent_identity: f64,
    pub mismatches: usize,
    pub gap_opens: usize,
    pub e_value: SciNot,
}

impl Hit {
    /// Length of the hit along its node.
    pub fn node_span(&self) -> usize {
        self.node_end - self.node_start + 1
    }

    /// Fraction of the query lying before this hit's start.
    pub fn query_start_fraction(&self, query_length: usize) -> f64 {
        if query_length == 0 {
            return 0.0;
        }
        (self.query_start - 1) as f64 / query_length as f64
    }

    /// Fraction of the query covered through this hit's end.
    pub fn query_end_fraction(&self, query_length: usize) -> f64 {
        if query_length == 0 {
            return 0.0;
        }
        self.query_end as f64 / query_length as f64
    }
}

/// A named query sequence owning the hits found for it.
#[derive(Debug, Clone)]
pub struct Query {
    name: String,
    sequence: Vec<u8>,
    sequence_type: SequenceType,
    hits: Vec<Hit>,
    shown: bool,
    colour: Colour,
}

impl Query {
    pub fn new(name: &str, sequence: Vec<u8>, sequence_type: SequenceType) -> Self {
        Query {
            name: name.to_string(),
            sequence,
            sequence_type,
            hits: Vec::new(),
            shown: true,
            colour: Colour::new(128, 0, 200),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    pub fn length(&self) -> usize {
        self.sequence.len()
    }

    pub fn sequence_type(&self) -> SequenceType {
        self.sequence_type
    }

    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    pub fn add_hit(&mut self, hit: Hit) {
        self.hits.push(hit);
    }

    pub fn clear_hits(&mut self) {
        self.hits.clear();
    }

    pub fn is_shown(&self) -> bool {
        self.shown
    }

    pub fn set_shown(&mut self, shown: bool) {
        self.shown = shown;
    }

    pub fn colour(&self) -> Colour {
        self.colour
    }

    pub fn set_colour(&mut self, colour: Colour) {
        self.colour = colour;
    }

    /// Fraction of the query spanned by the union of the given hits.
    /// Overlapping hits are only counted once.
    pub fn fraction_covered_by_hits(&self, hits: &[&Hit]) -> f64 {
        if self.sequence.is_empty() {
            return 0.0;
        }
        let length = self.sequence.len();
        let mut covered = bitvec::bitvec![0; length];
        for hit in hits {
            let start = hit.query_start.saturating_sub(1);
            let end = hit.query_end.min(length);
            for i in start..end {
                covered.set(i, true);
            }
        }
        covered.count_ones() as f64 / length as f64
    }
}
