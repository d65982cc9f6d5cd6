//! Graph builder. Turns a finished record set into a dependency graph.
//!
//! Pass 1 lays out the folder hierarchy and creates one leaf per record
//! that has a path. Pass 2 resolves reference tokens into leaf-to-leaf
//! edges. The module view is filed after pass 1 so every leaf already has
//! its directory parent as primary parent.

use petgraph::graph::NodeIndex;
use std::path::Path;
use tracing::{debug, info};

use super::engine::DependencyGraph;
use super::types::{AssetRecord, RecordSet};
use crate::config::CompiledConfig;
use crate::scanner::{self, CancelToken, IdentityLookup, PackageRoot, ScanOutcome, ScanResult};

/// Build a fresh graph from `records`.
pub fn build_graph(records: &RecordSet) -> DependencyGraph {
    let mut graph = DependencyGraph::new();

    // Pass 1: structure.
    let mut placed: Vec<(NodeIndex, &AssetRecord)> = Vec::with_capacity(records.len());
    for record in records.iter() {
        let Some(path) = record.path.as_deref() else {
            continue;
        };
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((file_name, dirs)) = segments.split_last() else {
            debug!(path, "record path has no segments, skipping");
            continue;
        };

        let mut parent = graph.root();
        for dir in dirs {
            parent = graph.child_folder(parent, dir);
        }
        let identity = record.identity.as_deref().unwrap_or_default();
        let leaf = graph.add_leaf(parent, file_name, identity, record.size);
        placed.push((leaf, record));
    }

    // Module view: same leaves, second parent.
    for (leaf, record) in &placed {
        if let Some(module) = record.module.as_deref() {
            let modules = graph.ensure_module_root();
            let folder = graph.child_folder(modules, module);
            graph.file_under(folder, *leaf);
        }
    }

    // Pass 2: edges.
    let mut edges = 0usize;
    let mut unresolved = 0usize;
    for (leaf, record) in &placed {
        for token in &record.references {
            match graph.find_by_identity(token) {
                Some(target) => {
                    graph.add_dependency(*leaf, target);
                    edges += 1;
                }
                None => unresolved += 1,
            }
        }
    }

    let stats = graph.stats();
    info!(
        folders = stats.folder_count,
        leaves = stats.leaf_count,
        edges,
        unresolved,
        "graph built"
    );
    graph
}

/// Scan `roots` and build the graph in one go. `None` if cancelled.
pub fn scan_and_build(
    roots: &[PackageRoot],
    config: &CompiledConfig,
    lookup: &dyn IdentityLookup,
    cancel: &CancelToken,
) -> Option<(DependencyGraph, ScanResult)> {
    match scanner::scan(roots, config, lookup, cancel) {
        ScanOutcome::Completed(result) => Some((build_graph(&result.records), result)),
        ScanOutcome::Cancelled => None,
    }
}

/// Count what a scan of `roots` would look at, without reading any file.
pub fn scan_stats(roots: &[PackageRoot], config: &CompiledConfig) -> ScanStats {
    let mut stats = ScanStats::default();
    for root in roots {
        if config.ignores_package(&root.name) {
            stats.ignored_packages += 1;
            continue;
        }
        stats.packages += 1;
        for file in scanner::discover_files(root, config) {
            stats.total_files += 1;
            if config.is_content_scannable(&file) {
                stats.content_files += 1;
            }
            if !config.sidecar_for(&file).exists() {
                stats.without_sidecar += 1;
            }
        }
    }
    stats
}

#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    pub packages: usize,
    pub ignored_packages: usize,
    pub total_files: usize,
    pub content_files: usize,
    pub without_sidecar: usize,
}

impl std::fmt::Display for ScanStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Found {} files in {} packages ({} ignored): {} scanned for references, {} without sidecar",
            self.total_files,
            self.packages,
            self.ignored_packages,
            self.content_files,
            self.without_sidecar
        )
    }
}

/// Whether `path` looks like a project root with an `Assets` directory.
pub fn is_project_root(path: &Path) -> bool {
    path.join("Assets").is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(identity: Option<&str>, path: Option<&str>, size: u64, refs: &[&str]) -> AssetRecord {
        AssetRecord {
            identity: identity.map(str::to_string),
            path: path.map(str::to_string),
            size,
            references: refs.iter().map(|r| r.to_string()).collect(),
            package: path.and_then(|p| p.split('/').next()).map(str::to_string),
            module: None,
        }
    }

    #[test]
    fn test_two_assets_in_one_package() {
        let records: RecordSet = vec![
            record(Some("g1"), Some("P/X.prefab"), 10, &["g2"]),
            record(Some("g2"), Some("P/Y.mat"), 32, &[]),
        ]
        .into_iter()
        .collect();

        let graph = build_graph(&records);
        let root = graph.root();
        let p = graph.find_by_path("P").unwrap();
        let x = graph.find_by_identity("g1").unwrap();
        let y = graph.find_by_identity("g2").unwrap();

        assert_eq!(graph.children(root), vec![p]);
        assert_eq!(graph.children(p).len(), 2);
        assert!(graph.depends_on_cached(x, y));
        assert!(!graph.depends_on_cached(y, x));
        assert_eq!(graph.size(root), 42);
        assert_eq!(graph.size(root), graph.size(x) + graph.size(y));
    }

    #[test]
    fn test_pathless_records_are_not_leaves() {
        let records: RecordSet = vec![
            record(Some("g1"), Some("P/a.asset"), 1, &["g2", "g3"]),
            record(Some("g2"), None, 0, &[]),
            record(Some("g3"), Some("Q/b.asset"), 2, &[]),
        ]
        .into_iter()
        .collect();

        let graph = build_graph(&records);
        assert_eq!(graph.stats().leaf_count, 2);
        assert_eq!(graph.find_by_identity("g2"), None);

        let a = graph.find_by_identity("g1").unwrap();
        let b = graph.find_by_identity("g3").unwrap();
        assert_eq!(graph.dependencies(a), vec![b]);
    }

    #[test]
    fn test_unidentified_leaf_keeps_its_references() {
        let records: RecordSet = vec![
            record(None, Some("P/orphan.prefab"), 3, &["g2"]),
            record(Some("g2"), Some("P/t.mat"), 4, &[]),
        ]
        .into_iter()
        .collect();

        let graph = build_graph(&records);
        let orphan = graph.find_by_path("P/orphan.prefab").unwrap();
        let target = graph.find_by_identity("g2").unwrap();
        assert_eq!(graph.node(orphan).unwrap().identity(), None);
        assert!(graph.depends_on_cached(orphan, target));
    }

    #[test]
    fn test_nested_folders_are_shared() {
        let records: RecordSet = vec![
            record(Some("g1"), Some("Assets/Art/Tex/a.png"), 1, &[]),
            record(Some("g2"), Some("Assets/Art/Tex/b.png"), 1, &[]),
            record(Some("g3"), Some("Assets/Art/c.mat"), 1, &["g1"]),
        ]
        .into_iter()
        .collect();

        let graph = build_graph(&records);
        let art = graph.find_by_path("Assets/Art").unwrap();
        let tex = graph.find_by_path("Assets/Art/Tex").unwrap();
        let c = graph.find_by_identity("g3").unwrap();

        assert_eq!(graph.children(tex).len(), 2);
        assert_eq!(graph.size(art), 3);
        assert!(graph.depends_on_cached(c, tex));
        assert!(graph.is_my_parent(tex, art));
    }

    #[test]
    fn test_module_view_adds_second_parent() {
        let mut a = record(Some("g1"), Some("Pkg/Runtime/a.asset"), 5, &[]);
        a.module = Some("Pkg.Runtime".to_string());
        let b = record(Some("g2"), Some("Pkg/b.asset"), 7, &[]);
        let records: RecordSet = vec![a, b].into_iter().collect();

        let graph = build_graph(&records);
        let modules = graph.module_root().unwrap();
        let runtime = graph.children(modules)[0];
        let leaf = graph.find_by_identity("g1").unwrap();

        assert_eq!(graph.name(runtime), "Pkg.Runtime");
        assert_eq!(graph.parents(leaf).len(), 2);
        assert_eq!(graph.parents(leaf)[1], runtime);
        assert_eq!(graph.size(modules), 5);
        assert_eq!(graph.size(graph.root()), 12);
        assert!(!graph.is_my_parent(leaf, runtime));
    }

    #[test]
    fn test_cyclic_records_build_and_query() {
        let records: RecordSet = vec![
            record(Some("g1"), Some("P/a"), 1, &["g2"]),
            record(Some("g2"), Some("P/b"), 1, &["g1"]),
        ]
        .into_iter()
        .collect();

        let graph = build_graph(&records);
        let a = graph.find_by_identity("g1").unwrap();
        let b = graph.find_by_identity("g2").unwrap();
        assert!(graph.depends_on_cached(a, b));
        assert!(graph.depends_on_cached(b, a));
        assert_eq!(graph.dependency_cycles(), vec![vec![a, b]]);
    }
}
