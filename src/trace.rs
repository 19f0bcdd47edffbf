use crate::graph::{AssemblyGraph, EdgeId, NodeId};
use thiserror::Error;

/// Direction of travel: forward follows edges from start node to end
/// node, backward follows them the other way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Cooperative checkpoint called once per branch expansion, so a
/// supervising context can keep its event loop responsive and request
/// cancellation of a long bounded search. Returning false aborts the
/// search.
pub trait SearchMonitor {
    fn checkpoint(&self) -> bool;
}

/// Monitor that never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl SearchMonitor for NeverCancel {
    fn checkpoint(&self) -> bool {
        true
    }
}

/// A search was cut short by its monitor. Partial results are discarded.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("the search was cancelled")]
pub struct Cancelled;

fn next_node(graph: &AssemblyGraph, edge: EdgeId, direction: Direction) -> NodeId {
    match direction {
        Direction::Forward => graph.edge(edge).end_node(),
        Direction::Backward => graph.edge(edge).start_node(),
    }
}

fn origin_node(graph: &AssemblyGraph, edge: EdgeId, direction: Direction) -> NodeId {
    match direction {
        Direction::Forward => graph.edge(edge).start_node(),
        Direction::Backward => graph.edge(edge).end_node(),
    }
}

fn next_edges_in_path(graph: &AssemblyGraph, node: NodeId, direction: Direction) -> Vec<EdgeId> {
    match direction {
        Direction::Forward => graph.leaving_edges(node),
        Direction::Backward => graph.entering_edges(node),
    }
}

fn times_node_in_path(node: NodeId, path: &[NodeId]) -> usize {
    path.iter().filter(|&&n| n == node).count()
}

/// Enumerate every path reachable from `start_edge` within `steps` hops.
///
/// A branch's path is recorded when its steps run out, when there are no
/// further edges in the required direction, or when the next node would
/// close a loop back to the starting node. A branch is abandoned outright
/// once a candidate node already appears twice in the path so far; that
/// bound keeps repeat structures finite while still allowing one
/// round-trip through a tandem repeat.
///
/// Recorded paths begin at the node the starting edge leads to; the
/// origin node itself is not included.
pub fn trace_paths(
    graph: &AssemblyGraph,
    start_edge: EdgeId,
    direction: Direction,
    steps: usize,
    monitor: &dyn SearchMonitor,
) -> Result<Vec<Vec<NodeId>>, Cancelled> {
    let starting_node = origin_node(graph, start_edge, direction);
    let mut all_paths = Vec::new();

    // Each frame mirrors one recursive call: the edge about to be
    // followed, the path accumulated before following it, and the steps
    // left. An explicit stack keeps large step budgets off the call
    // stack.
    let mut stack: Vec<(EdgeId, Vec<NodeId>, usize)> = vec![(start_edge, Vec::new(), steps)];

    while let Some((edge, mut path_so_far, steps_remaining)) = stack.pop() {
        if !monitor.checkpoint() {
            return Err(Cancelled);
        }

        path_so_far.push(next_node(graph, edge, direction));

        if steps_remaining <= 1 {
            all_paths.push(path_so_far);
            continue;
        }

        let next_edges = next_edges_in_path(graph, *path_so_far.last().unwrap(), direction);
        if next_edges.is_empty() {
            all_paths.push(path_so_far);
            continue;
        }

        for next_edge in next_edges {
            let next_next = next_node(graph, next_edge, direction);

            // A full loop back to the starting node completes the path.
            if next_next == starting_node {
                all_paths.push(path_so_far.clone());
                continue;
            }

            if times_node_in_path(next_next, &path_so_far) < 2 {
                stack.push((next_edge, path_so_far.clone(), steps_remaining - 1));
            }
        }
    }

    Ok(all_paths)
}

/// Check that every branch from `start_edge` reaches `target` (or, when
/// `include_reverse_complement` is set, the target's reverse complement)
/// within `steps` hops.
///
/// A branch that loops back to the search origin fails immediately: such
/// a path could be circular DNA that never contains the target. A branch
/// that runs out of steps or edges before reaching the target also fails.
/// Branches abandoned by the twice-in-path loop bound are neither
/// successes nor failures.
pub fn leads_only_to_node(
    graph: &AssemblyGraph,
    start_edge: EdgeId,
    direction: Direction,
    steps: usize,
    target: NodeId,
    include_reverse_complement: bool,
    monitor: &dyn SearchMonitor,
) -> Result<bool, Cancelled> {
    let origin = origin_node(graph, start_edge, direction);
    let mut stack: Vec<(EdgeId, Vec<NodeId>, usize)> = vec![(start_edge, vec![origin], steps)];

    while let Some((edge, mut path_so_far, steps_remaining)) = stack.pop() {
        if !monitor.checkpoint() {
            return Err(Cancelled);
        }

        let next = next_node(graph, edge, direction);
        path_so_far.push(next);

        // Landed back on the origin: a loop around that may not contain
        // the target at all.
        if next == path_so_far[0] {
            return Ok(false);
        }

        if next == target {
            continue;
        }
        if include_reverse_complement && graph.node(next).reverse_complement() == target {
            continue;
        }

        if steps_remaining <= 1 {
            return Ok(false);
        }

        let next_edges = next_edges_in_path(graph, next, direction);
        if next_edges.is_empty() {
            return Ok(false);
        }

        for next_edge in next_edges {
            let next_next = next_node(graph, next_edge, direction);
            if times_node_in_path(next_next, &path_so_far) < 2 {
                stack.push((next_edge, path_so_far.clone(), steps_remaining - 1));
            }
        }
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::AssemblyGraph;
    use std::cell::Cell;

    fn node(graph: &mut AssemblyGraph, name: &str, len: usize) -> NodeId {
        graph.add_node_pair(name, vec![b'A'; len], 1.0).0
    }

    /// Monitor that cancels after a fixed number of checkpoints.
    struct CancelAfter(Cell<usize>);

    impl SearchMonitor for CancelAfter {
        fn checkpoint(&self) -> bool {
            let left = self.0.get();
            self.0.set(left.saturating_sub(1));
            left > 0
        }
    }

    #[test]
    fn test_trace_linear_chain() {
        let mut graph = AssemblyGraph::new();
        let a = node(&mut graph, "1", 10);
        let b = node(&mut graph, "2", 10);
        let c = node(&mut graph, "3", 10);
        let e = graph.add_edge(a, b, 0);
        graph.add_edge(b, c, 0);

        let paths = trace_paths(&graph, e, Direction::Forward, 10, &NeverCancel).unwrap();
        assert_eq!(paths, vec![vec![b, c]]);
    }

    #[test]
    fn test_trace_respects_step_budget() {
        let mut graph = AssemblyGraph::new();
        let a = node(&mut graph, "1", 10);
        let b = node(&mut graph, "2", 10);
        let c = node(&mut graph, "3", 10);
        let d = node(&mut graph, "4", 10);
        let e = graph.add_edge(a, b, 0);
        graph.add_edge(b, c, 0);
        graph.add_edge(c, d, 0);

        let paths = trace_paths(&graph, e, Direction::Forward, 2, &NeverCancel).unwrap();
        assert_eq!(paths, vec![vec![b, c]]);
    }

    #[test]
    fn test_trace_fork_records_each_branch() {
        let mut graph = AssemblyGraph::new();
        let a = node(&mut graph, "1", 10);
        let b = node(&mut graph, "2", 10);
        let c = node(&mut graph, "3", 10);
        let d = node(&mut graph, "4", 10);
        let e = graph.add_edge(a, b, 0);
        graph.add_edge(b, c, 0);
        graph.add_edge(b, d, 0);

        let mut paths = trace_paths(&graph, e, Direction::Forward, 5, &NeverCancel).unwrap();
        paths.sort();
        assert_eq!(paths, vec![vec![b, c], vec![b, d]]);
    }

    #[test]
    fn test_trace_backward() {
        let mut graph = AssemblyGraph::new();
        let a = node(&mut graph, "1", 10);
        let b = node(&mut graph, "2", 10);
        let c = node(&mut graph, "3", 10);
        graph.add_edge(a, b, 0);
        let e = graph.add_edge(b, c, 0);

        let paths = trace_paths(&graph, e, Direction::Backward, 5, &NeverCancel).unwrap();
        assert_eq!(paths, vec![vec![b, a]]);
    }

    #[test]
    fn test_trace_loop_closure_completes_path() {
        let mut graph = AssemblyGraph::new();
        let a = node(&mut graph, "1", 10);
        let b = node(&mut graph, "2", 10);
        let e = graph.add_edge(a, b, 0);
        graph.add_edge(b, a, 0);

        let paths = trace_paths(&graph, e, Direction::Forward, 10, &NeverCancel).unwrap();
        assert_eq!(paths, vec![vec![b]]);
    }

    #[test]
    fn test_trace_loop_bound_on_cycle() {
        // a -> b -> c -> b: b may repeat once, never twice.
        let mut graph = AssemblyGraph::new();
        let a = node(&mut graph, "1", 10);
        let b = node(&mut graph, "2", 10);
        let c = node(&mut graph, "3", 10);
        let e = graph.add_edge(a, b, 0);
        graph.add_edge(b, c, 0);
        graph.add_edge(c, b, 0);

        // With a large budget every branch is eventually abandoned by the
        // loop bound rather than running forever.
        let paths = trace_paths(&graph, e, Direction::Forward, 50, &NeverCancel).unwrap();
        for path in &paths {
            assert!(times_node_in_path(b, path) <= 2, "path {path:?} repeats b");
            assert!(times_node_in_path(c, path) <= 2, "path {path:?} repeats c");
        }

        // A small budget records the single round-trip through the repeat.
        let paths = trace_paths(&graph, e, Direction::Forward, 4, &NeverCancel).unwrap();
        assert_eq!(paths, vec![vec![b, c, b, c]]);
    }

    #[test]
    fn test_trace_self_loop_terminates() {
        let mut graph = AssemblyGraph::new();
        let a = node(&mut graph, "1", 10);
        let b = node(&mut graph, "2", 10);
        let e = graph.add_edge(a, b, 0);
        graph.add_edge(b, b, 0);

        let paths = trace_paths(&graph, e, Direction::Forward, 50, &NeverCancel).unwrap();
        for path in &paths {
            assert!(times_node_in_path(b, path) <= 2);
        }

        let paths = trace_paths(&graph, e, Direction::Forward, 2, &NeverCancel).unwrap();
        assert_eq!(paths, vec![vec![b, b]]);
    }

    #[test]
    fn test_trace_cancellation() {
        let mut graph = AssemblyGraph::new();
        let a = node(&mut graph, "1", 10);
        let b = node(&mut graph, "2", 10);
        let c = node(&mut graph, "3", 10);
        let e = graph.add_edge(a, b, 0);
        graph.add_edge(b, c, 0);

        assert_eq!(
            trace_paths(&graph, e, Direction::Forward, 10, &CancelAfter(Cell::new(1))),
            Err(Cancelled)
        );
    }

    #[test]
    fn test_leads_only_to_node_simple() {
        let mut graph = AssemblyGraph::new();
        let a = node(&mut graph, "1", 10);
        let b = node(&mut graph, "2", 10);
        let c = node(&mut graph, "3", 10);
        let e = graph.add_edge(a, b, 0);
        graph.add_edge(b, c, 0);

        assert!(leads_only_to_node(&graph, e, Direction::Forward, 5, c, false, &NeverCancel).unwrap());
        let unrelated = node(&mut graph, "4", 10);
        let e = graph.find_edge(a, b).unwrap();
        assert!(
            !leads_only_to_node(&graph, e, Direction::Forward, 5, unrelated, false, &NeverCancel)
                .unwrap()
        );
    }

    #[test]
    fn test_leads_only_fails_on_divergent_branch() {
        let mut graph = AssemblyGraph::new();
        let a = node(&mut graph, "1", 10);
        let b = node(&mut graph, "2", 10);
        let c = node(&mut graph, "3", 10);
        let d = node(&mut graph, "4", 10);
        let e = graph.add_edge(a, b, 0);
        graph.add_edge(b, c, 0);
        graph.add_edge(b, d, 0);

        // One branch dead-ends at d without touching c.
        assert!(
            !leads_only_to_node(&graph, e, Direction::Forward, 5, c, false, &NeverCancel).unwrap()
        );
    }

    #[test]
    fn test_leads_only_succeeds_when_all_branches_converge() {
        let mut graph = AssemblyGraph::new();
        let a = node(&mut graph, "1", 10);
        let b = node(&mut graph, "2", 10);
        let c = node(&mut graph, "3", 10);
        let d = node(&mut graph, "4", 10);
        let t = node(&mut graph, "5", 10);
        let e = graph.add_edge(a, b, 0);
        graph.add_edge(b, c, 0);
        graph.add_edge(b, d, 0);
        graph.add_edge(c, t, 0);
        graph.add_edge(d, t, 0);

        assert!(leads_only_to_node(&graph, e, Direction::Forward, 5, t, false, &NeverCancel).unwrap());
    }

    #[test]
    fn test_leads_only_reverse_complement_target() {
        let mut graph = AssemblyGraph::new();
        let a = node(&mut graph, "1", 10);
        let b = node(&mut graph, "2", 10);
        let (c_pos, c_neg) = graph.add_node_pair("3", vec![b'A'; 10], 1.0);
        let e = graph.add_edge(a, b, 0);
        graph.add_edge(b, c_neg, 0);

        assert!(
            !leads_only_to_node(&graph, e, Direction::Forward, 5, c_pos, false, &NeverCancel)
                .unwrap()
        );
        assert!(
            leads_only_to_node(&graph, e, Direction::Forward, 5, c_pos, true, &NeverCancel).unwrap()
        );
    }

    #[test]
    fn test_leads_only_fails_on_loop_to_origin() {
        let mut graph = AssemblyGraph::new();
        let a = node(&mut graph, "1", 10);
        let b = node(&mut graph, "2", 10);
        let c = node(&mut graph, "3", 10);
        let e = graph.add_edge(a, b, 0);
        graph.add_edge(b, a, 0);
        let _ = c;

        assert!(!leads_only_to_node(&graph, e, Direction::Forward, 10, c, false, &NeverCancel)
            .unwrap());
    }

    #[test]
    fn test_leads_only_step_exhaustion_fails() {
        let mut graph = AssemblyGraph::new();
        let a = node(&mut graph, "1", 10);
        let b = node(&mut graph, "2", 10);
        let c = node(&mut graph, "3", 10);
        let d = node(&mut graph, "4", 10);
        let e = graph.add_edge(a, b, 0);
        graph.add_edge(b, c, 0);
        graph.add_edge(c, d, 0);

        assert!(leads_only_to_node(&graph, e, Direction::Forward, 3, d, false, &NeverCancel).unwrap());
        assert!(
            !leads_only_to_node(&graph, e, Direction::Forward, 2, d, false, &NeverCancel).unwrap()
        );
    }
}
