use crate::graph::{AssemblyGraph, NodeId};
use crate::path::{Path, PathBounds};
use crate::query::{Hit, Query, SequenceType};
use crate::scinot::SciNot;
use crate::settings::Settings;
use crate::trace::{trace_paths, Cancelled, Direction, SearchMonitor};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Overlap in bases between two hits taken in path order.
///
/// Hits on the same node are intersected directly. Hits on adjacent nodes
/// are intersected after translating the second hit into the first hit's
/// node frame by `(first node length − edge overlap)`. Hits on nodes that
/// are neither identical nor directly connected never overlap.
pub fn hit_overlap(graph: &AssemblyGraph, hit1: &Hit, hit2: &Hit) -> usize {
    let (hit1_start, hit1_end, hit2_start, hit2_end): (i64, i64, i64, i64);

    if hit1.node == hit2.node {
        hit1_start = hit1.node_start as i64 - 1;
        hit1_end = hit1.node_end as i64;
        hit2_start = hit2.node_start as i64 - 1;
        hit2_end = hit2.node_end as i64;
    } else if let Some(edge) = graph.find_edge(hit1.node, hit2.node) {
        let shift = graph.node(hit1.node).length() as i64 - graph.edge(edge).overlap() as i64;
        hit1_start = hit1.node_start as i64;
        hit1_end = hit1.node_end as i64;
        hit2_start = hit2.node_start as i64 + shift;
        hit2_end = hit2.node_end as i64 + shift;
    } else {
        return 0;
    }

    (hit1_end.min(hit2_end) - hit1_start.max(hit2_start)).max(0) as usize
}

/// A read-only binding of one path to one query: the ordered subsequence
/// of the query's hits consistent with traversing the path, plus the
/// metrics used to rank candidate paths against each other.
#[derive(Debug, Clone)]
pub struct QueryPath<'a> {
    graph: &'a AssemblyGraph,
    path: Path,
    query: &'a Query,
    hits: Vec<&'a Hit>,
}

impl<'a> QueryPath<'a> {
    /// Walk the path and keep the hits consistent with traversing it.
    ///
    /// For each node in path order the query's hits on that node are
    /// considered in ascending query-start order. A hit is admitted only
    /// if it lies inside the path's clipped region when its node is the
    /// first or last of the path, and its query start strictly exceeds
    /// the query start of the previously admitted hit.
    pub fn new(graph: &'a AssemblyGraph, path: Path, query: &'a Query) -> Self {
        let start_position = path.start_position();
        let end_position = path.end_position(graph);
        let node_count = path.nodes().len();

        let mut hits: Vec<&Hit> = Vec::new();
        let mut previous_query_start = None;

        for (i, &node) in path.nodes().iter().enumerate() {
            let mut node_hits: Vec<&Hit> =
                query.hits().iter().filter(|h| h.node == node).collect();
            node_hits.sort_by_key(|h| h.query_start);

            for hit in node_hits {
                if i == 0 && hit.node_start < start_position {
                    continue;
                }
                if i == node_count - 1 && hit.node_end > end_position {
                    continue;
                }
                if previous_query_start.map_or(true, |p| hit.query_start > p) {
                    previous_query_start = Some(hit.query_start);
                    hits.push(hit);
                }
            }
        }

        QueryPath {
            graph,
            path,
            query,
            hits,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn query(&self) -> &Query {
        self.query
    }

    pub fn hits(&self) -> &[&'a Hit] {
        &self.hits
    }

    /// Hit-length-weighted mean percent identity.
    pub fn mean_hit_percent_identity(&self) -> f64 {
        let mut total_length = 0usize;
        let mut sum = 0.0;
        for hit in &self.hits {
            total_length += hit.alignment_length;
            sum += hit.percent_identity * hit.alignment_length as f64;
        }
        if total_length == 0 {
            0.0
        } else {
            sum / total_length as f64
        }
    }

    /// Product of all hit e-values. A hit that overlaps its neighbours in
    /// path order has its e-value raised to `(len − removed) / len`
    /// first, where `removed` takes half the overlap with each neighbour,
    /// so no stretch of the alignment is counted twice.
    pub fn evalue_product(&self) -> SciNot {
        let mut product = SciNot::one();

        for (i, hit) in self.hits.iter().enumerate() {
            let mut evalue = hit.e_value;

            let mut length_to_remove = 0.0;
            if i > 0 {
                length_to_remove += hit_overlap(self.graph, self.hits[i - 1], hit) as f64 / 2.0;
            }
            if i + 1 < self.hits.len() {
                length_to_remove += hit_overlap(self.graph, hit, self.hits[i + 1]) as f64 / 2.0;
            }
            if length_to_remove > 0.0 {
                let span = hit.node_span() as f64;
                evalue = evalue.power((span - length_to_remove) / span);
            }

            product = product * evalue;
        }

        product
    }

    /// Length the path should have if it matched the query perfectly:
    /// the query span between the first and last hits, in bases.
    fn hit_query_length(&self) -> Option<usize> {
        let first = self.hits.first()?;
        let last = self.hits.last()?;
        let mut length = last.query_end - first.query_start + 1;
        if self.query.sequence_type() == SequenceType::Protein {
            length *= 3;
        }
        Some(length)
    }

    /// How far the path's length strays from the length its hits call
    /// for, as a fraction of the latter. Paths with no hits report the
    /// maximal discrepancy so ranking stays total.
    pub fn relative_length_discrepancy(&self) -> f64 {
        match self.hit_query_length() {
            None => f64::MAX,
            Some(expected) => {
                let discrepancy = self.path.length(self.graph) as i64 - expected as i64;
                discrepancy as f64 / expected as f64
            }
        }
    }

    /// Path length over expected length: 1 is a perfect match, below 1
    /// too short, above 1 too long.
    pub fn relative_path_length(&self) -> Option<f64> {
        self.hit_query_length()
            .map(|expected| self.path.length(self.graph) as f64 / expected as f64)
    }

    /// Path length minus expected length in bases.
    pub fn absolute_path_length_difference(&self) -> Option<i64> {
        self.hit_query_length()
            .map(|expected| self.path.length(self.graph) as i64 - expected as i64)
    }

    /// 1-based query position of the first admitted hit.
    pub fn query_start(&self) -> Option<usize> {
        self.hits.first().map(|h| h.query_start)
    }

    /// 1-based query position of the last admitted hit.
    pub fn query_end(&self) -> Option<usize> {
        self.hits.last().map(|h| h.query_end)
    }

    /// Fraction of the query covered by the whole path, i.e. everything
    /// between the first hit's start and the last hit's end.
    pub fn path_query_coverage(&self) -> f64 {
        let (Some(start), Some(end)) = (self.query_start(), self.query_end()) else {
            return 0.0;
        };
        let query_length = self.query.length();
        if query_length == 0 {
            return 0.0;
        }
        let not_included = (start - 1) + (query_length - end);
        1.0 - not_included as f64 / query_length as f64
    }

    /// Fraction of the query covered by the admitted hits themselves.
    pub fn hits_query_coverage(&self) -> f64 {
        self.query.fraction_covered_by_hits(&self.hits)
    }

    pub fn total_hit_mismatches(&self) -> usize {
        self.hits.iter().map(|h| h.mismatches).sum()
    }

    pub fn total_hit_gap_opens(&self) -> usize {
        self.hits.iter().map(|h| h.gap_opens).sum()
    }

    /// Strict ranking over candidate paths; `Less` means this path ranks
    /// better than `other`. Compares the e-value product, then mean
    /// percent identity, then the absolute relative length discrepancy,
    /// then hit query coverage; paths equal on all four are unordered.
    pub fn ranking_cmp(&self, other: &Self) -> Ordering {
        rank_keys(
            &(
                self.evalue_product(),
                self.mean_hit_percent_identity(),
                self.relative_length_discrepancy().abs(),
                self.hits_query_coverage(),
            ),
            &(
                other.evalue_product(),
                other.mean_hit_percent_identity(),
                other.relative_length_discrepancy().abs(),
                other.hits_query_coverage(),
            ),
        )
    }
}

/// Comparison chain shared by `ranking_cmp` and candidate sorting:
/// (e-value product, mean identity, |relative discrepancy|, coverage).
fn rank_keys(a: &(SciNot, f64, f64, f64), b: &(SciNot, f64, f64, f64)) -> Ordering {
    if a.0 != b.0 {
        return a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal);
    }
    if a.1 != b.1 {
        return b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal);
    }
    if a.2 != b.2 {
        return a.2.partial_cmp(&b.2).unwrap_or(Ordering::Equal);
    }
    if a.3 != b.3 {
        return b.3.partial_cmp(&a.3).unwrap_or(Ordering::Equal);
    }
    Ordering::Equal
}

/// Find the best-ranked paths through the graph that explain where
/// `query` sits.
///
/// Candidates are seeded at every node bearing one of the query's hits
/// and extended forward with the bounded tracer, then trimmed back to
/// the last node carrying an admitted hit and clipped to the first and
/// last admitted hits. Each candidate is scored independently (scoring is pure, so the
/// fan-out runs in parallel) and the ranked best `max_query_paths` are
/// returned.
pub fn find_query_paths<'a>(
    graph: &'a AssemblyGraph,
    query: &'a Query,
    settings: &Settings,
    monitor: &dyn SearchMonitor,
) -> Result<Vec<QueryPath<'a>>, Cancelled> {
    let hit_nodes: HashSet<NodeId> = query.hits().iter().map(|h| h.node).collect();

    let mut candidates: HashSet<Vec<NodeId>> = HashSet::new();
    for &seed in &hit_nodes {
        candidates.insert(vec![seed]);
        for edge in graph.leaving_edges(seed) {
            for tail in trace_paths(
                graph,
                edge,
                Direction::Forward,
                settings.max_path_search_steps,
                monitor,
            )? {
                let mut nodes = Vec::with_capacity(tail.len() + 1);
                nodes.push(seed);
                nodes.extend(tail);
                while nodes
                    .last()
                    .map_or(false, |last| !hit_nodes.contains(last))
                {
                    nodes.pop();
                }
                candidates.insert(nodes);
            }
        }
    }

    // A candidate may still end on nodes whose hits are all rejected by
    // the monotonic admission rule. Drop trailing nodes until the last
    // node carries an admitted hit, so the end clip lands on the node it
    // belongs to; trimming can collapse candidates onto each other, so
    // collect back into a set.
    let trimmed: HashSet<Vec<NodeId>> = candidates
        .into_iter()
        .filter_map(|mut nodes| loop {
            let path = Path::from_ordered_nodes(graph, nodes.clone()).ok()?;
            let admitted = QueryPath::new(graph, path, query);
            let last = *admitted.hits().last()?;
            if last.node == *nodes.last()? {
                return Some(nodes);
            }
            nodes.pop();
        })
        .collect();

    let mut ranked: Vec<(QueryPath<'a>, (SciNot, f64, f64, f64))> = trimmed
        .par_iter()
        .filter_map(|nodes| {
            let path = Path::from_ordered_nodes(graph, nodes.clone()).ok()?;
            let unclipped = QueryPath::new(graph, path.clone(), query);
            let first = unclipped.hits().first()?;
            let last = unclipped.hits().last()?;
            let clipped = path.with_bounds(PathBounds::Partial {
                start: first.node_start,
                end: last.node_end,
            });
            let query_path = QueryPath::new(graph, clipped, query);
            if query_path.hits().is_empty() {
                return None;
            }
            let key = (
                query_path.evalue_product(),
                query_path.mean_hit_percent_identity(),
                query_path.relative_length_discrepancy().abs(),
                query_path.hits_query_coverage(),
            );
            Some((query_path, key))
        })
        .collect();

    ranked.sort_by(|a, b| rank_keys(&a.1, &b.1));
    ranked.truncate(settings.max_query_paths);
    Ok(ranked.into_iter().map(|(query_path, _)| query_path).collect())
}
