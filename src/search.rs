use crate::annotation::{Annotation, AnnotationGroup, AnnotationStore, AnnotationView};
use crate::graph::AssemblyGraph;
use crate::query::{Hit, Query};
use crate::trace::{Cancelled, SearchMonitor};
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("required search tool not found: {0}")]
    ToolNotFound(String),
    #[error("a database build is already in progress")]
    BuildInProgress,
    #[error("a search is already in progress")]
    SearchInProgress,
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
    #[error("the aligner failed: {0}")]
    AlignerFailed(String),
}

/// Shared cancellation signal between the session and a worker running an
/// aligner step. Cloning yields a handle to the same flag, so a
/// supervising thread can keep a handle and signal an in-flight run.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        CancelFlag::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

impl SearchMonitor for CancelFlag {
    fn checkpoint(&self) -> bool {
        !self.is_cancelled()
    }
}

/// An external alignment backend. Implementations wrap a real tool; tests
/// substitute a stub.
pub trait Aligner {
    /// Verify the backing tools are available before any work starts.
    fn check_tools(&self) -> Result<(), SearchError>;

    /// Build the search database from the graph's node sequences.
    fn build_database(
        &mut self,
        graph: &AssemblyGraph,
        cancel: &CancelFlag,
    ) -> Result<(), SearchError>;

    /// Align every query against the database. The outer vector is
    /// parallel to `queries`.
    fn run_search(
        &mut self,
        graph: &AssemblyGraph,
        queries: &[Query],
        cancel: &CancelFlag,
    ) -> Result<Vec<Vec<Hit>>, SearchError>;
}

/// One search session: the loaded queries, the aligner, and the state
/// needed to refuse overlapping runs and to cancel a running step.
///
/// Every method takes `&self`, so the session can be shared across
/// threads: one thread drives a build or search while another rejects a
/// second run or cancels the first. Callers own the `CancelFlag` handed
/// to each run and may clone it for a supervising thread.
pub struct GraphSearch<A: Aligner> {
    aligner: Mutex<A>,
    queries: Mutex<Vec<Query>>,
    annotation_group_name: String,
    build_cancel: Mutex<Option<CancelFlag>>,
    search_cancel: Mutex<Option<CancelFlag>>,
}

/// Continue with the data as-is if a panicking holder poisoned the lock.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Register a run's cancel flag in `slot`, or refuse if one is already
/// registered.
fn claim(slot: &Mutex<Option<CancelFlag>>, cancel: &CancelFlag, busy: SearchError) -> Result<(), SearchError> {
    let mut slot = lock(slot);
    if slot.is_some() {
        return Err(busy);
    }
    *slot = Some(cancel.clone());
    Ok(())
}

fn release(slot: &Mutex<Option<CancelFlag>>) {
    *lock(slot) = None;
}

impl<A: Aligner> GraphSearch<A> {
    pub fn new(aligner: A) -> Self {
        GraphSearch {
            aligner: Mutex::new(aligner),
            queries: Mutex::new(Vec::new()),
            annotation_group_name: "Search hits".to_string(),
            build_cancel: Mutex::new(None),
            search_cancel: Mutex::new(None),
        }
    }

    pub fn queries(&self) -> Vec<Query> {
        lock(&self.queries).clone()
    }

    pub fn query(&self, name: &str) -> Option<Query> {
        lock(&self.queries).iter().find(|q| q.name() == name).cloned()
    }

    pub fn add_query(&self, query: Query) {
        lock(&self.queries).push(query);
    }

    pub fn set_query_shown(&self, name: &str, shown: bool) {
        if let Some(query) = lock(&self.queries).iter_mut().find(|q| q.name() == name) {
            query.set_shown(shown);
        }
    }

    /// Build the aligner's database. Fails fast if a build is already in
    /// flight or the tools are missing. The caller keeps `cancel` (or a
    /// clone) to stop the run from another thread.
    pub fn build_database(
        &self,
        graph: &AssemblyGraph,
        cancel: &CancelFlag,
    ) -> Result<(), SearchError> {
        claim(&self.build_cancel, cancel, SearchError::BuildInProgress)?;
        let result = {
            let mut aligner = lock(&self.aligner);
            aligner
                .check_tools()
                .and_then(|()| aligner.build_database(graph, cancel))
        };
        release(&self.build_cancel);
        result
    }

    /// Align the loaded queries and attach the resulting hits to both the
    /// queries and the graph's nodes. Earlier hits are replaced
    /// wholesale; a cancelled or failed run leaves them untouched.
    pub fn run_search(
        &self,
        graph: &mut AssemblyGraph,
        cancel: &CancelFlag,
    ) -> Result<(), SearchError> {
        claim(&self.search_cancel, cancel, SearchError::SearchInProgress)?;
        let result = {
            let queries = lock(&self.queries);
            let mut aligner = lock(&self.aligner);
            aligner
                .check_tools()
                .and_then(|()| aligner.run_search(graph, &queries, cancel))
        };
        release(&self.search_cancel);
        self.apply_hits(graph, result?);
        Ok(())
    }

    fn apply_hits(&self, graph: &mut AssemblyGraph, hit_lists: Vec<Vec<Hit>>) {
        graph.clear_hits();
        let mut queries = lock(&self.queries);
        for query in queries.iter_mut() {
            query.clear_hits();
        }

        let mut total = 0usize;
        for (qi, hits) in hit_lists.into_iter().enumerate() {
            for hit in hits {
                let node = hit.node;
                let hi = queries[qi].hits().len();
                queries[qi].add_hit(hit);
                graph.add_hit_to_node(node, (qi, hi));
                total += 1;
            }
        }
        info!(
            "search finished: {total} hits across {} queries",
            queries.len()
        );
    }

    /// Signal the in-flight build, if any.
    pub fn cancel_build(&self) {
        if let Some(flag) = &*lock(&self.build_cancel) {
            flag.cancel();
        }
    }

    /// Signal the in-flight search, if any.
    pub fn cancel_search(&self) {
        if let Some(flag) = &*lock(&self.search_cancel) {
            flag.cancel();
        }
    }

    /// The one-call convenience flow: build the database, run the search,
    /// and refresh the hit annotations for every shown query. One flag
    /// cancels whichever step is running.
    pub fn auto_search(
        &self,
        graph: &mut AssemblyGraph,
        store: &mut AnnotationStore,
        cancel: &CancelFlag,
    ) -> Result<(), SearchError> {
        self.build_database(graph, cancel)?;
        self.run_search(graph, cancel)?;
        self.query_changed(graph, "all", store);
        Ok(())
    }

    /// Rebuild the hit annotation group after the selected query (or the
    /// set of shown queries, for `"all"`) changed.
    ///
    /// Walks the graph's per-node hit lists rather than the queries, so
    /// each node's annotations come out in the order its hits were
    /// attached. Every annotation carries both a solid view in the
    /// query's colour and a rainbow view positioned by the hit's place
    /// within the query.
    pub fn query_changed(
        &self,
        graph: &AssemblyGraph,
        query_name: &str,
        store: &mut AnnotationStore,
    ) {
        let queries = lock(&self.queries);
        let mut group = AnnotationGroup::new(&self.annotation_group_name);

        for node in graph.node_ids() {
            for &(qi, hi) in graph.node(node).hits() {
                let query = &queries[qi];
                if !query.is_shown() {
                    continue;
                }
                if query_name != "all" && query.name() != query_name {
                    continue;
                }
                let hit = &query.hits()[hi];
                group.add(
                    node,
                    Annotation {
                        start: hit.node_start,
                        end: hit.node_end,
                        label: query.name().to_string(),
                        views: vec![
                            AnnotationView::Solid {
                                colour: query.colour(),
                            },
                            AnnotationView::Rainbow {
                                start_fraction: hit.query_start_fraction(query.length()),
                                end_fraction: hit.query_end_fraction(query.length()),
                            },
                        ],
                    },
                );
            }
        }

        store.replace_group(group);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeId;
    use crate::query::SequenceType;
    use crate::scinot::SciNot;
    use std::thread;
    use std::time::Duration;

    /// Aligner whose behaviour is scripted per test.
    struct StubAligner {
        tools_ok: bool,
        hits_per_query: Vec<Vec<Hit>>,
        fail_search: bool,
    }

    impl StubAligner {
        fn new() -> Self {
            StubAligner {
                tools_ok: true,
                hits_per_query: Vec::new(),
                fail_search: false,
            }
        }
    }

    impl Aligner for StubAligner {
        fn check_tools(&self) -> Result<(), SearchError> {
            if self.tools_ok {
                Ok(())
            } else {
                Err(SearchError::ToolNotFound("makeblastdb".to_string()))
            }
        }

        fn build_database(
            &mut self,
            _graph: &AssemblyGraph,
            cancel: &CancelFlag,
        ) -> Result<(), SearchError> {
            if cancel.is_cancelled() {
                return Err(SearchError::Cancelled(Cancelled));
            }
            Ok(())
        }

        fn run_search(
            &mut self,
            _graph: &AssemblyGraph,
            _queries: &[Query],
            cancel: &CancelFlag,
        ) -> Result<Vec<Vec<Hit>>, SearchError> {
            if cancel.is_cancelled() || self.fail_search {
                return Err(SearchError::Cancelled(Cancelled));
            }
            Ok(self.hits_per_query.clone())
        }
    }

    /// Aligner that blocks until its cancel flag is raised, standing in
    /// for a long-lived external tool run.
    struct BlockingAligner {
        started: Arc<AtomicBool>,
    }

    impl BlockingAligner {
        fn wait_for_cancel(&self, cancel: &CancelFlag) -> SearchError {
            self.started.store(true, Ordering::Relaxed);
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
            SearchError::Cancelled(Cancelled)
        }
    }

    impl Aligner for BlockingAligner {
        fn check_tools(&self) -> Result<(), SearchError> {
            Ok(())
        }

        fn build_database(
            &mut self,
            _graph: &AssemblyGraph,
            cancel: &CancelFlag,
        ) -> Result<(), SearchError> {
            Err(self.wait_for_cancel(cancel))
        }

        fn run_search(
            &mut self,
            _graph: &AssemblyGraph,
            _queries: &[Query],
            cancel: &CancelFlag,
        ) -> Result<Vec<Vec<Hit>>, SearchError> {
            Err(self.wait_for_cancel(cancel))
        }
    }

    fn wait_for(flag: &AtomicBool) {
        for _ in 0..5000 {
            if flag.load(Ordering::Relaxed) {
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        panic!("worker never reached the aligner");
    }

    fn hit(node: NodeId, node_start: usize, node_end: usize) -> Hit {
        Hit {
            node,
            node_start,
            node_end,
            query_start: 1,
            query_end: node_end - node_start + 1,
            alignment_length: node_end - node_start + 1,
            percent_identity: 100.0,
            mismatches: 0,
            gap_opens: 0,
            e_value: SciNot::new(1.0, -30),
        }
    }

    fn graph_with_node() -> (AssemblyGraph, NodeId) {
        let mut graph = AssemblyGraph::new();
        let (n, _) = graph.add_node_pair("1", vec![b'A'; 100], 1.0);
        (graph, n)
    }

    #[test]
    fn test_missing_tools_fail_before_any_work() {
        let (graph, _) = graph_with_node();
        let mut aligner = StubAligner::new();
        aligner.tools_ok = false;
        let search = GraphSearch::new(aligner);
        assert!(matches!(
            search.build_database(&graph, &CancelFlag::new()),
            Err(SearchError::ToolNotFound(_))
        ));
        // The failed attempt released its in-progress slot.
        assert!(matches!(
            search.build_database(&graph, &CancelFlag::new()),
            Err(SearchError::ToolNotFound(_))
        ));
    }

    #[test]
    fn test_build_refuses_second_run_and_cancels_in_flight() {
        let (graph, _) = graph_with_node();
        let started = Arc::new(AtomicBool::new(false));
        let search = GraphSearch::new(BlockingAligner {
            started: started.clone(),
        });
        let flag = CancelFlag::new();

        thread::scope(|scope| {
            let worker = scope.spawn(|| search.build_database(&graph, &flag));
            wait_for(&started);

            assert!(matches!(
                search.build_database(&graph, &CancelFlag::new()),
                Err(SearchError::BuildInProgress)
            ));

            search.cancel_build();
            assert!(matches!(
                worker.join().unwrap(),
                Err(SearchError::Cancelled(_))
            ));
        });
    }

    #[test]
    fn test_search_refuses_second_run_and_cancels_in_flight() {
        let (mut busy_graph, _) = graph_with_node();
        let (mut other_graph, _) = graph_with_node();
        let started = Arc::new(AtomicBool::new(false));
        let search = GraphSearch::new(BlockingAligner {
            started: started.clone(),
        });
        let flag = CancelFlag::new();

        thread::scope(|scope| {
            let worker = scope.spawn(|| search.run_search(&mut busy_graph, &flag));
            wait_for(&started);

            assert!(matches!(
                search.run_search(&mut other_graph, &CancelFlag::new()),
                Err(SearchError::SearchInProgress)
            ));

            search.cancel_search();
            assert!(matches!(
                worker.join().unwrap(),
                Err(SearchError::Cancelled(_))
            ));
        });
    }

    #[test]
    fn test_run_search_attaches_hits_to_queries_and_nodes() {
        let (mut graph, n) = graph_with_node();
        let mut aligner = StubAligner::new();
        aligner.hits_per_query = vec![vec![hit(n, 1, 50), hit(n, 60, 90)]];
        let search = GraphSearch::new(aligner);
        search.add_query(Query::new("q", vec![b'A'; 100], SequenceType::Nucleotide));

        search.run_search(&mut graph, &CancelFlag::new()).unwrap();
        assert_eq!(search.query("q").unwrap().hits().len(), 2);
        assert_eq!(graph.node(n).hits(), &[(0, 0), (0, 1)]);
    }

    #[test]
    fn test_run_search_replaces_earlier_hits() {
        let (mut graph, n) = graph_with_node();
        let mut aligner = StubAligner::new();
        aligner.hits_per_query = vec![vec![hit(n, 1, 50)]];
        let search = GraphSearch::new(aligner);
        search.add_query(Query::new("q", vec![b'A'; 100], SequenceType::Nucleotide));

        search.run_search(&mut graph, &CancelFlag::new()).unwrap();
        search.run_search(&mut graph, &CancelFlag::new()).unwrap();
        assert_eq!(search.query("q").unwrap().hits().len(), 1);
        assert_eq!(graph.node(n).hits().len(), 1);
    }

    #[test]
    fn test_failed_search_leaves_session_usable() {
        let (mut graph, n) = graph_with_node();
        let mut aligner = StubAligner::new();
        aligner.fail_search = true;
        aligner.hits_per_query = vec![vec![hit(n, 1, 50)]];
        let search = GraphSearch::new(aligner);
        search.add_query(Query::new("q", vec![b'A'; 100], SequenceType::Nucleotide));

        assert!(matches!(
            search.run_search(&mut graph, &CancelFlag::new()),
            Err(SearchError::Cancelled(_))
        ));
        // The in-progress slot was released, so a retry runs.
        search.aligner.lock().unwrap().fail_search = false;
        search.run_search(&mut graph, &CancelFlag::new()).unwrap();
        assert_eq!(search.query("q").unwrap().hits().len(), 1);
    }

    #[test]
    fn test_query_changed_builds_annotations_for_shown_queries() {
        let (mut graph, n) = graph_with_node();
        let mut aligner = StubAligner::new();
        aligner.hits_per_query = vec![vec![hit(n, 1, 50)], vec![hit(n, 51, 100)]];
        let search = GraphSearch::new(aligner);
        search.add_query(Query::new("q1", vec![b'A'; 50], SequenceType::Nucleotide));
        search.add_query(Query::new("q2", vec![b'A'; 50], SequenceType::Nucleotide));
        search.run_search(&mut graph, &CancelFlag::new()).unwrap();

        let mut store = AnnotationStore::new();
        search.query_changed(&graph, "all", &mut store);
        let group = store.group("Search hits").unwrap();
        assert_eq!(group.annotations_for(n).len(), 2);

        // Selecting one query narrows the group.
        search.query_changed(&graph, "q2", &mut store);
        let group = store.group("Search hits").unwrap();
        assert_eq!(group.annotations_for(n).len(), 1);
        assert_eq!(group.annotations_for(n)[0].label, "q2");
        assert_eq!(group.annotations_for(n)[0].start, 51);
        assert_eq!(store.groups().len(), 1);

        // Hidden queries drop out of "all".
        search.set_query_shown("q1", false);
        search.query_changed(&graph, "all", &mut store);
        let group = store.group("Search hits").unwrap();
        assert_eq!(group.annotations_for(n).len(), 1);
        assert_eq!(group.annotations_for(n)[0].label, "q2");
    }

    #[test]
    fn test_auto_search_runs_the_whole_flow() {
        let (mut graph, n) = graph_with_node();
        let mut aligner = StubAligner::new();
        aligner.hits_per_query = vec![vec![hit(n, 1, 100)]];
        let search = GraphSearch::new(aligner);
        search.add_query(Query::new("q", vec![b'A'; 100], SequenceType::Nucleotide));

        let mut store = AnnotationStore::new();
        search
            .auto_search(&mut graph, &mut store, &CancelFlag::new())
            .unwrap();
        let group = store.group("Search hits").unwrap();
        let annotations = group.annotations_for(n);
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].end, 100);
        assert_eq!(annotations[0].views.len(), 2);
    }

    #[test]
    fn test_cancel_flag_round_trip() {
        let flag = CancelFlag::new();
        assert!(flag.checkpoint());
        let handle = flag.clone();
        handle.cancel();
        assert!(flag.is_cancelled());
        assert!(!flag.checkpoint());
        flag.reset();
        assert!(flag.checkpoint());
    }
}
