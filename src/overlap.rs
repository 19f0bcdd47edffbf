use crate::graph::{AssemblyGraph, EdgeId, OverlapType};
use crate::settings::Settings;
use log::debug;
use rand::Rng;

/// Try to determine the exact overlap between an edge's two nodes.
///
/// Every length in `[min, max]` (capped at the shorter node) is tested,
/// starting from a pseudo-random offset and wrapping, so the search is not
/// biased toward either end of the range. The first length for which the
/// start node's tail matches the end node's head base-for-base is kept on
/// the edge and its twin. Finding nothing is not an error: the overlap is
/// set to zero and the edge tagged undetermined for later manual
/// correction.
pub fn auto_determine_exact_overlap(graph: &mut AssemblyGraph, id: EdgeId, settings: &Settings) {
    let edge = graph.edge(id);
    let start_len = graph.node(edge.start_node()).length();
    let end_len = graph.node(edge.end_node()).length();
    let shorter = start_len.min(end_len);

    if shorter < settings.min_auto_find_edge_overlap {
        graph.set_overlap(id, 0, OverlapType::Undetermined);
        debug!(
            "edge {id}: nodes too short for overlap search (shorter node is {shorter} bases)"
        );
        return;
    }

    let min = settings.min_auto_find_edge_overlap.min(shorter);
    let max = settings.max_auto_find_edge_overlap.min(shorter);
    if max < min {
        graph.set_overlap(id, 0, OverlapType::Undetermined);
        debug!("edge {id}: empty overlap search range [{min}, {max}]");
        return;
    }

    let mut test = rand::thread_rng().gen_range(min..=max);
    for _ in min..=max {
        if test_exact_overlap(graph, id, test) {
            graph.set_overlap(id, test, OverlapType::AutoExact);
            return;
        }
        test += 1;
        if test > max {
            test = min;
        }
    }

    graph.set_overlap(id, 0, OverlapType::Undetermined);
    debug!("edge {id}: no exact overlap found in [{min}, {max}]");
}

/// Whether `overlap` bases at the end of the start node exactly match the
/// same number of bases at the start of the end node.
pub fn test_exact_overlap(graph: &AssemblyGraph, id: EdgeId, overlap: usize) -> bool {
    let edge = graph.edge(id);
    let start_seq = graph.node(edge.start_node()).sequence();
    let end_seq = graph.node(edge.end_node()).sequence();
    if overlap > start_seq.len() || overlap > end_seq.len() {
        return false;
    }
    let offset = start_seq.len() - overlap;
    (0..overlap).all(|j| start_seq[offset + j] == end_seq[j])
}
