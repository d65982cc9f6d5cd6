//! The dependency graph engine.
//!
//! Nodes live in a petgraph arena and are addressed by [`NodeIndex`]; two
//! handles are the same node iff they are equal. Folder containment and
//! leaf-to-leaf dependencies are both edges, distinguished by [`EdgeKind`].
//!
//! Reachability queries are memoized per querying node. Containment is
//! acyclic, dependencies may not be: a pair whose evaluation is still in
//! progress reads as `false`, which is what stops evaluation from looping
//! on a cycle.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::types::*;

/// Name of the directory hierarchy's root folder.
pub const ROOT_NAME: &str = "Root";
/// Name of the module view's root folder.
pub const MODULE_ROOT_NAME: &str = "Modules";

/// The asset dependency graph: arena, hierarchy roots and lookup indexes.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<AssetNode, EdgeKind>,
    root: NodeIndex,
    module_root: Option<NodeIndex>,
    /// (parent, child name) -> child folder, for folder reuse while building.
    folder_index: HashMap<(NodeIndex, String), NodeIndex>,
    /// Identity token -> leaf.
    identity_index: HashMap<String, NodeIndex>,
    /// Logical path -> node (folders and leaves of the directory hierarchy).
    path_index: HashMap<String, NodeIndex>,
}

/// One pending evaluation of `node depends on <other>`.
struct Frame {
    node: NodeIndex,
    candidates: Vec<NodeIndex>,
    next: usize,
}

/// What one candidate contributes to the frame being evaluated.
enum Step {
    Hit,
    Miss,
    Descend,
}

impl DependencyGraph {
    /// Create a graph holding only an empty root folder.
    pub fn new() -> Self {
        let mut graph = DiGraph::new();
        let root = graph.add_node(AssetNode::folder(ROOT_NAME));
        Self {
            graph,
            root,
            module_root: None,
            folder_index: HashMap::new(),
            identity_index: HashMap::new(),
            path_index: HashMap::new(),
        }
    }

    // ─── Construction ───────────────────────────────────────────

    /// Child folder of `parent` named `name`, created if it does not exist.
    pub(crate) fn child_folder(&mut self, parent: NodeIndex, name: &str) -> NodeIndex {
        if let Some(&idx) = self.folder_index.get(&(parent, name.to_string())) {
            return idx;
        }
        let idx = self.graph.add_node(AssetNode::folder(name));
        self.graph.add_edge(parent, idx, EdgeKind::Contains);
        self.folder_index.insert((parent, name.to_string()), idx);
        if let Some(path) = self.logical_path_of(parent, name) {
            self.path_index.entry(path).or_insert(idx);
        }
        idx
    }

    /// Add a leaf under `parent`. An empty identity is not indexed.
    pub(crate) fn add_leaf(
        &mut self,
        parent: NodeIndex,
        name: &str,
        identity: &str,
        size: u64,
    ) -> NodeIndex {
        let idx = self.graph.add_node(AssetNode::leaf(name, identity, size));
        self.graph.add_edge(parent, idx, EdgeKind::Contains);
        if !identity.is_empty() {
            self.identity_index.entry(identity.to_string()).or_insert(idx);
        }
        if let Some(path) = self.logical_path_of(parent, name) {
            self.path_index.entry(path).or_insert(idx);
        }
        idx
    }

    /// File an existing node under an additional parent. The first parent
    /// stays the primary one.
    pub(crate) fn file_under(&mut self, parent: NodeIndex, child: NodeIndex) {
        self.graph.add_edge(parent, child, EdgeKind::Contains);
    }

    pub(crate) fn add_dependency(&mut self, from: NodeIndex, to: NodeIndex) {
        self.graph.add_edge(from, to, EdgeKind::DependsOn);
    }

    /// Root of the module view, created on first use.
    pub(crate) fn ensure_module_root(&mut self) -> NodeIndex {
        match self.module_root {
            Some(idx) => idx,
            None => {
                let idx = self.graph.add_node(AssetNode::folder(MODULE_ROOT_NAME));
                self.module_root = Some(idx);
                idx
            }
        }
    }

    // ─── Structure ──────────────────────────────────────────────

    /// Root folder of the directory hierarchy.
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    /// Root folder of the module view, if any asset belongs to a module.
    pub fn module_root(&self) -> Option<NodeIndex> {
        self.module_root
    }

    pub fn node(&self, idx: NodeIndex) -> Option<&AssetNode> {
        self.graph.node_weight(idx)
    }

    pub fn name(&self, idx: NodeIndex) -> &str {
        self.graph
            .node_weight(idx)
            .map(|n| n.name.as_str())
            .unwrap_or_default()
    }

    pub fn is_leaf(&self, idx: NodeIndex) -> bool {
        self.node(idx).is_some_and(AssetNode::is_leaf)
    }

    pub fn is_folder(&self, idx: NodeIndex) -> bool {
        self.node(idx).is_some_and(AssetNode::is_folder)
    }

    /// Children of a folder, in insertion order. Empty for leaves.
    pub fn children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.ordered(idx, Direction::Outgoing, EdgeKind::Contains)
    }

    /// Parents in the order they were recorded; the first is the primary one.
    pub fn parents(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.ordered(idx, Direction::Incoming, EdgeKind::Contains)
    }

    pub fn primary_parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .filter(|e| *e.weight() == EdgeKind::Contains)
            .min_by_key(|e| e.id())
            .map(|e| e.source())
    }

    /// Direct dependency targets of a leaf, in insertion order.
    pub fn dependencies(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.ordered(idx, Direction::Outgoing, EdgeKind::DependsOn)
    }

    /// Leaves with a direct dependency on `idx`.
    pub fn direct_dependents(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.ordered(idx, Direction::Incoming, EdgeKind::DependsOn)
    }

    /// Neighbors over `kind` edges. Edge indexes grow with insertion and
    /// edges are never removed, so sorting by them restores insertion order.
    fn ordered(&self, idx: NodeIndex, dir: Direction, kind: EdgeKind) -> Vec<NodeIndex> {
        let mut edges: Vec<(EdgeIndex, NodeIndex)> = self
            .graph
            .edges_directed(idx, dir)
            .filter(|e| *e.weight() == kind)
            .map(|e| {
                let other = match dir {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                (e.id(), other)
            })
            .collect();
        edges.sort_by_key(|(id, _)| *id);
        edges.into_iter().map(|(_, other)| other).collect()
    }

    // ─── Lookup ─────────────────────────────────────────────────

    pub fn find_by_identity(&self, identity: &str) -> Option<NodeIndex> {
        self.identity_index.get(identity).copied()
    }

    /// Node at a logical path such as `Assets/Textures/wall.png`.
    pub fn find_by_path(&self, path: &str) -> Option<NodeIndex> {
        self.path_index.get(path.trim_end_matches('/')).copied()
    }

    /// Logical path of a node, following primary parents. Empty for roots.
    pub fn path_of(&self, idx: NodeIndex) -> String {
        let mut segments = Vec::new();
        let mut current = Some(idx);
        while let Some(node) = current {
            let parent = self.primary_parent(node);
            if parent.is_none() {
                break;
            }
            segments.push(self.name(node));
            current = parent;
        }
        segments.reverse();
        segments.join("/")
    }

    fn logical_path_of(&self, parent: NodeIndex, name: &str) -> Option<String> {
        if self.module_root.is_some_and(|m| self.is_my_parent(parent, m) || parent == m) {
            return None;
        }
        let base = self.path_of(parent);
        Some(if base.is_empty() {
            name.to_string()
        } else {
            format!("{base}/{name}")
        })
    }

    // ─── Size ───────────────────────────────────────────────────

    /// Leaf: its recorded size. Folder: sum over children, recomputed on
    /// every call.
    pub fn size(&self, idx: NodeIndex) -> u64 {
        match self.node(idx).map(|n| &n.kind) {
            Some(NodeKind::Leaf { size, .. }) => *size,
            Some(NodeKind::Folder) => self.children(idx).into_iter().map(|c| self.size(c)).sum(),
            None => 0,
        }
    }

    // ─── Reachability ───────────────────────────────────────────

    /// Whether `other` is reached from `idx` by following primary parents.
    ///
    /// Only the first parent is walked at every level; a node filed under a
    /// second hierarchy does not see that hierarchy's folders as ancestors.
    pub fn is_my_parent(&self, idx: NodeIndex, other: NodeIndex) -> bool {
        let mut current = self.primary_parent(idx);
        while let Some(parent) = current {
            if parent == other {
                return true;
            }
            current = self.primary_parent(parent);
        }
        false
    }

    /// Memoized form of [`depends_on`](Self::depends_on), scoped to `idx`.
    ///
    /// A pair whose evaluation is still in progress reads as `false`. The
    /// first query that closes a dependency cycle can therefore under-report
    /// for the pair still being evaluated, and that answer is what gets cached.
    pub fn depends_on_cached(&self, idx: NodeIndex, other: NodeIndex) -> bool {
        match self.cached(idx, other) {
            Some(reach) => reach.observed(),
            None => self.evaluate(idx, other),
        }
    }

    /// Evaluate `idx depends on other` afresh for `idx`. Sub-queries go
    /// through each node's cache.
    ///
    /// - Leaf: `other` is a direct target, a primary ancestor of a direct
    ///   target, or reachable from a direct target.
    /// - Folder: any child depends on `other`.
    /// - Never true for `idx == other`.
    pub fn depends_on(&self, idx: NodeIndex, other: NodeIndex) -> bool {
        self.evaluate(idx, other)
    }

    fn cached(&self, idx: NodeIndex, other: NodeIndex) -> Option<Reach> {
        self.node(idx)
            .and_then(|n| n.cache.borrow().get(&other).copied())
    }

    fn store(&self, idx: NodeIndex, other: NodeIndex, reach: Reach) {
        if let Some(node) = self.node(idx) {
            node.cache.borrow_mut().insert(other, reach);
        }
    }

    /// Depth-first evaluation on an explicit stack, so long dependency chains
    /// cannot exhaust the call stack.
    fn evaluate(&self, start: NodeIndex, other: NodeIndex) -> bool {
        if start == other || self.node(start).is_none() {
            self.store(start, other, Reach::Computed(false));
            return false;
        }

        let mut stack = vec![self.open_frame(start, other)];
        while let Some(frame) = stack.last_mut() {
            let Some(&candidate) = frame.candidates.get(frame.next) else {
                // Exhausted without a hit.
                let node = frame.node;
                stack.pop();
                self.store(node, other, Reach::Computed(false));
                continue;
            };
            frame.next += 1;
            let node = frame.node;

            match self.step(node, candidate, other) {
                Step::Miss => {}
                Step::Descend => {
                    let child = self.open_frame(candidate, other);
                    stack.push(child);
                }
                Step::Hit => {
                    // Every pending frame is waiting on the one above it.
                    for frame in stack.drain(..) {
                        self.store(frame.node, other, Reach::Computed(true));
                    }
                    return true;
                }
            }
        }
        false
    }

    fn open_frame(&self, node: NodeIndex, other: NodeIndex) -> Frame {
        self.store(node, other, Reach::InProgress);
        let candidates = if self.is_leaf(node) {
            self.dependencies(node)
        } else {
            self.children(node)
        };
        Frame {
            node,
            candidates,
            next: 0,
        }
    }

    fn step(&self, node: NodeIndex, candidate: NodeIndex, other: NodeIndex) -> Step {
        if self.is_leaf(node) {
            if candidate == node {
                warn!(
                    node = %self.path_of(node),
                    "leaf lists itself as a dependency, ignoring"
                );
                return Step::Miss;
            }
            if candidate == other || self.is_my_parent(candidate, other) {
                return Step::Hit;
            }
        }

        if candidate == other {
            // A node never depends on itself.
            return Step::Miss;
        }
        match self.cached(candidate, other) {
            Some(reach) if reach.observed() => Step::Hit,
            Some(_) => Step::Miss,
            None => Step::Descend,
        }
    }

    // ─── Aggregate queries ──────────────────────────────────────

    /// All leaves that (transitively) depend on `target`.
    pub fn dependents_of(&self, target: NodeIndex) -> Vec<NodeIndex> {
        self.leaves()
            .filter(|&leaf| self.depends_on_cached(leaf, target))
            .collect()
    }

    /// Leaves nothing depends on directly.
    pub fn unreferenced_leaves(&self) -> Vec<NodeIndex> {
        self.leaves()
            .filter(|&leaf| {
                !self
                    .graph
                    .edges_directed(leaf, Direction::Incoming)
                    .any(|e| *e.weight() == EdgeKind::DependsOn)
            })
            .collect()
    }

    /// Groups of leaves that depend on each other in a cycle, including
    /// leaves with a dependency on themselves.
    pub fn dependency_cycles(&self) -> Vec<Vec<NodeIndex>> {
        let deps: DiGraph<(), ()> = self.graph.filter_map(
            |_, _| Some(()),
            |_, kind| (*kind == EdgeKind::DependsOn).then_some(()),
        );
        let mut cycles: Vec<Vec<NodeIndex>> = tarjan_scc(&deps)
            .into_iter()
            .filter(|scc| scc.len() > 1 || deps.contains_edge(scc[0], scc[0]))
            .map(|mut scc| {
                scc.sort();
                scc
            })
            .collect();
        cycles.sort();
        debug!(cycles = cycles.len(), "dependency cycles found");
        cycles
    }

    /// All leaves, in arena order.
    pub fn leaves(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph
            .node_indices()
            .filter(|&idx| self.graph[idx].is_leaf())
    }

    pub fn stats(&self) -> GraphStats {
        let mut folder_count = 0;
        let mut leaf_count = 0;
        for node in self.graph.node_weights() {
            if node.is_leaf() {
                leaf_count += 1;
            } else {
                folder_count += 1;
            }
        }
        let dependency_count = self
            .graph
            .edge_weights()
            .filter(|kind| **kind == EdgeKind::DependsOn)
            .count();

        GraphStats {
            folder_count,
            leaf_count,
            dependency_count,
            total_size: self.size(self.root),
        }
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    /// Folders, including hierarchy roots.
    pub folder_count: usize,
    pub leaf_count: usize,
    pub dependency_count: usize,
    /// Size of the directory hierarchy's root.
    pub total_size: u64,
}
