use serde::{Deserialize, Serialize};

/// Knobs supplied by the embedding application. The core never loads
/// these from anywhere itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Smallest overlap length tried by exact-overlap auto-detection.
    pub min_auto_find_edge_overlap: usize,
    /// Largest overlap length tried by exact-overlap auto-detection.
    pub max_auto_find_edge_overlap: usize,
    /// Maximum number of nodes a bounded path search may traverse.
    pub max_path_search_steps: usize,
    /// Number of ranked query paths kept per query.
    pub max_query_paths: usize,
    /// Double-stranded display mode draws both strands of every node.
    pub double_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            min_auto_find_edge_overlap: 10,
            max_auto_find_edge_overlap: 100,
            max_path_search_steps: 6,
            max_query_paths: 8,
            double_mode: false,
        }
    }
}
