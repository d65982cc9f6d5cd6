//! Asset graph module: raw records, the node arena and its queries,
//! and the builder that turns one into the other.

pub mod builder;
pub mod engine;
pub mod types;

pub use builder::{build_graph, scan_and_build, scan_stats, ScanStats};
pub use engine::{DependencyGraph, GraphStats, MODULE_ROOT_NAME, ROOT_NAME};
pub use petgraph::graph::NodeIndex;
pub use types::{AssetNode, AssetRecord, EdgeKind, NodeKind, Reach, RecordSet};
