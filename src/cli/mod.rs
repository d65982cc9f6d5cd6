//! CLI module for assetdeps.
//!
//! Commands:
//! - Scan: scan, stats
//! - Query: depends, size, tree, dependents
//! - Findings: report, unused, cycles

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use crate::context::PackageSource;
use crate::error::{AssetDepsError, Result};
use crate::graph::{DependencyGraph, NodeIndex};
use crate::scanner::PackageRoot;

/// Directory of the project's own assets, relative to the project root.
pub const ASSETS_DIR: &str = "Assets";
/// Directory holding embedded packages, relative to the project root.
pub const PACKAGES_DIR: &str = "Packages";

#[derive(Parser)]
#[command(name = "assetdeps")]
#[command(about = "Asset dependency graph for sidecar-identified projects")]
pub struct Cli {
    /// Project root directory (default: current directory)
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,

    /// Scan config (default: <root>/.assetdeps/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    // ─── Scan ─────────────────────────────────────────────────────
    /// Scan the project and persist the result
    Scan {
        /// Only count what would be scanned
        #[arg(long)]
        dry_run: bool,
    },

    /// Show graph statistics
    Stats,

    // ─── Query ────────────────────────────────────────────────────
    /// Does <from> depend on <to>?
    Depends {
        /// Logical path or identity token
        from: String,
        /// Logical path or identity token
        to: String,
    },

    /// Total size of a file or folder
    Size {
        /// Logical path or identity token
        path: String,
    },

    /// Print the folder hierarchy
    Tree {
        /// Folder to start from (default: root)
        path: Option<String>,

        /// Levels to descend
        #[arg(short, long, default_value = "2")]
        depth: usize,

        /// Walk the module view instead of directories
        #[arg(short, long)]
        modules: bool,
    },

    /// Files that depend on a file or folder
    Dependents {
        /// Logical path or identity token
        path: String,
    },

    // ─── Findings ─────────────────────────────────────────────────
    /// Static analysis findings of the last scan
    Report,

    /// Files nothing else depends on
    Unused,

    /// Groups of files that depend on each other
    Cycles,
}

// ─── Package Discovery ──────────────────────────────────────────

/// Roots of a project laid out as `Assets/` plus one directory per package
/// under `Packages/`.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl PackageSource for ProjectLayout {
    fn resolve(&self) -> Result<Vec<PackageRoot>> {
        let mut roots = Vec::new();
        let assets = self.root.join(ASSETS_DIR);
        if assets.is_dir() {
            roots.push(PackageRoot::project(ASSETS_DIR, assets));
        }

        let packages = self.root.join(PACKAGES_DIR);
        if packages.is_dir() {
            let mut found: Vec<PathBuf> = fs::read_dir(&packages)?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .collect();
            found.sort();
            for path in found {
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                roots.push(PackageRoot::package(name.to_string(), path.clone()));
            }
        }

        if roots.is_empty() {
            return Err(AssetDepsError::PackageSource(format!(
                "no {ASSETS_DIR} or {PACKAGES_DIR} directory under {}",
                self.root.display()
            )));
        }
        debug!(roots = roots.len(), "package roots resolved");
        Ok(roots)
    }
}

// ─── Node Addressing ────────────────────────────────────────────

/// Resolve a logical path or identity token to a node. An empty query or
/// `/` is the root.
pub fn resolve_node(graph: &DependencyGraph, query: &str) -> Result<NodeIndex> {
    let trimmed = query.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(graph.root());
    }
    graph
        .find_by_identity(trimmed)
        .or_else(|| graph.find_by_path(trimmed))
        .ok_or_else(|| AssetDepsError::UnknownNode(query.to_string()))
}

/// A node as printed by query commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSummary {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    pub size: u64,
}

impl NodeSummary {
    pub fn of(graph: &DependencyGraph, idx: NodeIndex) -> Self {
        Self {
            path: graph.path_of(idx),
            identity: graph
                .node(idx)
                .and_then(|n| n.identity())
                .map(str::to_string),
            size: graph.size(idx),
        }
    }
}

/// One level of `tree` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeEntry {
    pub name: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeEntry>,
}

/// The hierarchy below `idx`, `depth` levels deep.
pub fn tree(graph: &DependencyGraph, idx: NodeIndex, depth: usize) -> TreeEntry {
    let children = if depth == 0 {
        Vec::new()
    } else {
        graph
            .children(idx)
            .into_iter()
            .map(|child| tree(graph, child, depth - 1))
            .collect()
    };
    TreeEntry {
        name: graph.name(idx).to_string(),
        size: graph.size(idx),
        children,
    }
}
