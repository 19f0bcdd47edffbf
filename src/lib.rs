//! Graph search and path scoring for assembly graphs.
//!
//! The graph holds every node twice, once per strand, with edges mirrored
//! so forward and reverse-complement traversal stay consistent. On top of
//! that sit a bounded path tracer, aligner-hit bookkeeping, and the
//! query-path machinery that reconciles hits against candidate paths and
//! ranks the results.

pub mod annotation;
pub mod graph;
pub mod overlap;
pub mod path;
pub mod query;
pub mod query_path;
pub mod scinot;
pub mod search;
pub mod settings;
pub mod trace;
