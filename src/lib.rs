//! # assetdeps
//!
//! Asset dependency graph for projects whose files are identified by
//! sidecar metadata.
//!
//! Every asset file has a `<file>.meta` sidecar declaring its identity
//! token. Content files reference other assets by those tokens. assetdeps
//! scans a set of package roots, turns what it finds into raw records,
//! builds a folder hierarchy over them and answers dependency queries.
//!
//! ## Key Features
//!
//! - **Parallel scan**: Package roots are scanned concurrently and share one identity map
//! - **Static analysis**: Missing, duplicated and dangling identities are reported
//! - **Memoized queries**: Reachability answers are cached per querying node
//! - **Cycle tolerant**: Circular references terminate and are listed
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use assetdeps::{AssetGraphContext, CancelToken, NoLookup, PackageRoot, ScanConfig};
//!
//! let config = ScanConfig::default().compile().unwrap();
//! let roots = vec![PackageRoot::project("Assets", "MyGame/Assets")];
//!
//! let mut context = AssetGraphContext::new();
//! context.scan(&roots, &config, &NoLookup, &CancelToken::new());
//!
//! let (graph, _root) = context.root_node().unwrap();
//! let scene = graph.find_by_path("Assets/Scenes/Main.unity").unwrap();
//! let texture = graph.find_by_path("Assets/Art/Hero.png").unwrap();
//! println!("{}", graph.depends_on_cached(scene, texture));
//! ```

pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod persistence;
pub mod report;
pub mod scanner;

// Re-exports for convenience
pub use error::{AssetDepsError, Result};

pub use config::{CompiledConfig, ScanConfig};
pub use context::{AssetGraphContext, PackageSource, ScanStatus};
pub use graph::{
    build_graph, scan_and_build, AssetRecord, DependencyGraph, EdgeKind, GraphStats, NodeIndex,
    NodeKind, RecordSet,
};
pub use persistence::ScanSnapshot;
pub use report::{DanglingReference, StaticAnalysisReport};
pub use scanner::{
    scan, CancelToken, IdentityLookup, NoLookup, PackageRoot, ScanOutcome, ScanResult,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;

    const SCENE: &str = "11111111111111111111111111111111";
    const PREFAB: &str = "22222222222222222222222222222222";
    const MATERIAL: &str = "33333333333333333333333333333333";
    const TEXTURE: &str = "44444444444444444444444444444444";
    const SHADER: &str = "55555555555555555555555555555555";
    const BUILTIN: &str = "0000000000000000f000000000000000";
    const GONE: &str = "99999999999999999999999999999999";

    fn write_asset(dir: &Path, rel: &str, body: &str, identity: Option<&str>) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, body).unwrap();
        if let Some(identity) = identity {
            let meta = format!("fileFormatVersion: 2\nguid: {identity}\n");
            fs::write(dir.join(format!("{rel}.meta")), meta).unwrap();
        }
    }

    /// A small project: Assets plus one package that provides the shader.
    fn project(dir: &Path) -> Vec<PackageRoot> {
        let assets = dir.join("Assets");
        let package = dir.join("Packages/com.studio.shaders");

        write_asset(
            &assets,
            "Scenes/Main.unity",
            &format!("m_Prefab: {{fileID: 100, guid: {PREFAB}, type: 3}}\n"),
            Some(SCENE),
        );
        write_asset(
            &assets,
            "Prefabs/Hero.prefab",
            &format!(
                "m_Materials:\n- {{fileID: 2100000, guid: {MATERIAL}, type: 2}}\n\
                 m_Mesh: {{fileID: 10202, guid: {BUILTIN}, type: 0}}\n"
            ),
            Some(PREFAB),
        );
        write_asset(
            &assets,
            "Art/Hero.mat",
            &format!(
                "m_Shader: {{fileID: 4800000, guid: {SHADER}, type: 3}}\n\
                 m_Texture: {{fileID: 2800000, guid: {TEXTURE}, type: 3}}\n\
                 m_Old: {{fileID: 1, guid: {GONE}, type: 3}}\n"
            ),
            Some(MATERIAL),
        );
        write_asset(&assets, "Art/Hero.png", "PNGDATA", Some(TEXTURE));
        write_asset(&assets, "Art/Unused.png", "PNG", None);
        write_asset(&package, "Shaders/Lit.shader", "Shader \"Lit\" {}", Some(SHADER));
        write_asset(
            &package,
            "Shaders/Studio.Shaders.asmdef",
            "{ \"name\": \"Studio.Shaders\" }",
            Some("66666666666666666666666666666666"),
        );

        vec![
            PackageRoot::project("Assets", assets),
            PackageRoot::package("com.studio.shaders", package),
        ]
    }

    #[test]
    fn test_scan_project_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let roots = project(dir.path());
        let config = ScanConfig::default().compile().unwrap();
        let lookup: HashMap<String, String> =
            [(BUILTIN.to_string(), "Library/Builtin/Cube.fbx".to_string())].into();

        let mut context = AssetGraphContext::new();
        let status = context.scan(&roots, &config, &lookup, &CancelToken::new());
        assert_eq!(status, ScanStatus::Completed { generation: 1 });

        let report = context.report().unwrap();
        assert_eq!(report.missing_identity(), ["Assets/Art/Unused.png"]);
        assert!(report.duplicated_identity().is_empty());
        assert_eq!(report.dangling_references().len(), 1);
        assert_eq!(report.dangling_references()[0].identity, GONE);
        assert_eq!(
            report.dangling_references()[0].referrers,
            vec!["Assets/Art/Hero.mat".to_string()]
        );

        let (graph, root) = context.root_node().unwrap();
        let scene = graph.find_by_identity(SCENE).unwrap();
        let texture = graph.find_by_path("Assets/Art/Hero.png").unwrap();
        let shader = graph.find_by_identity(SHADER).unwrap();
        let builtin = graph.find_by_path("Library/Builtin/Cube.fbx").unwrap();
        let unused = graph.find_by_path("Assets/Art/Unused.png").unwrap();
        let shaders_pkg = graph.find_by_path("com.studio.shaders").unwrap();

        // Transitive across packages, and into folders.
        assert!(graph.depends_on_cached(scene, texture));
        assert!(graph.depends_on_cached(scene, shader));
        assert!(graph.depends_on_cached(scene, shaders_pkg));
        assert!(graph.depends_on_cached(scene, builtin));
        assert!(!graph.depends_on_cached(scene, unused));
        assert!(!graph.depends_on_cached(texture, scene));

        // Lookup-resolved record is a zero-size leaf.
        assert_eq!(graph.size(builtin), 0);
        assert_eq!(graph.node(unused).unwrap().identity(), None);

        // Root size is the sum of every leaf in the hierarchy.
        let total: u64 = graph
            .leaves()
            .filter(|&leaf| graph.is_my_parent(leaf, root))
            .map(|leaf| graph.size(leaf))
            .sum();
        assert_eq!(graph.size(root), total);

        // The shader package's files also sit in the module view.
        let modules = graph.module_root().unwrap();
        assert_eq!(graph.name(graph.children(modules)[0]), "Studio.Shaders");
        assert_eq!(graph.parents(shader).len(), 2);
    }

    #[test]
    fn test_duplicate_identity_keeps_first_path() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("P");
        write_asset(&p, "a.asset", "A", Some(PREFAB));
        write_asset(
            &p,
            "b.asset",
            &format!("ref: {{guid: {TEXTURE}}}"),
            Some(PREFAB),
        );
        let roots = vec![PackageRoot::package("P", p)];
        let config = ScanConfig::default().compile().unwrap();

        let result = scan(&roots, &config, &NoLookup, &CancelToken::new())
            .completed()
            .unwrap();
        let duplicates = result.report.duplicated_identity();
        assert_eq!(
            duplicates.get(PREFAB).unwrap(),
            &vec!["P/a.asset".to_string(), "P/b.asset".to_string()]
        );
        let bound = result.records.get(PREFAB).unwrap();
        assert_eq!(bound.path.as_deref(), Some("P/a.asset"));

        let graph = build_graph(&result.records);
        assert_eq!(graph.stats().leaf_count, 1);
        assert!(graph.find_by_path("P/b.asset").is_none());
    }

    #[test]
    fn test_scan_and_build_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let roots = project(dir.path());
        let config = ScanConfig::default().compile().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(scan_and_build(&roots, &config, &NoLookup, &cancel).is_none());
    }

    #[test]
    fn test_cycle_between_prefabs_terminates() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("P");
        write_asset(&p, "A.prefab", &format!("guid: {MATERIAL}"), Some(PREFAB));
        write_asset(&p, "B.prefab", &format!("guid: {PREFAB}"), Some(MATERIAL));
        let roots = vec![PackageRoot::package("P", p)];
        let config = ScanConfig::default().compile().unwrap();

        let (graph, _) = scan_and_build(&roots, &config, &NoLookup, &CancelToken::new()).unwrap();
        let a = graph.find_by_identity(PREFAB).unwrap();
        let b = graph.find_by_identity(MATERIAL).unwrap();
        assert!(graph.depends_on_cached(a, b));
        assert!(graph.depends_on_cached(b, a));
        assert_eq!(graph.dependency_cycles().len(), 1);
    }
}
