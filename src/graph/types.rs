//! Core types for the asset dependency graph.
//!
//! Raw scan output ([`AssetRecord`], [`RecordSet`]) and the node/edge data
//! stored in the graph arena.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use petgraph::graph::NodeIndex;

/// One asset as discovered by the scanner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Identity token declared by the sidecar. `None` when the file had none.
    pub identity: Option<String>,
    /// Logical path (`<package>/<relative>`), `None` for identities that were
    /// only ever referenced (built-in or missing assets).
    pub path: Option<String>,
    /// File size in bytes.
    pub size: u64,
    /// Reference tokens, unique, in first-seen order.
    pub references: Vec<String>,
    /// Package the file was found in.
    pub package: Option<String>,
    /// Logical module (nearest assembly definition), if any.
    pub module: Option<String>,
}

impl AssetRecord {
    /// A record for an identity seen before (or without) its file.
    pub fn placeholder(identity: &str) -> Self {
        Self {
            identity: Some(identity.to_string()),
            ..Self::default()
        }
    }

    /// Append a reference unless it is already present or names this record.
    pub fn add_reference(&mut self, token: &str) {
        if self.identity.as_deref() == Some(token) {
            return;
        }
        if !self.references.iter().any(|r| r == token) {
            self.references.push(token.to_string());
        }
    }

    pub fn is_bound(&self) -> bool {
        self.path.is_some()
    }
}

/// The finished record map of one scan.
///
/// Identified records are keyed by identity; files without an identity are
/// kept separately so they still enter the graph by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSet {
    by_identity: BTreeMap<String, AssetRecord>,
    unidentified: Vec<AssetRecord>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an identified record. Records without an identity
    /// go to the unidentified list.
    pub fn insert(&mut self, record: AssetRecord) {
        match record.identity.clone() {
            Some(identity) => {
                self.by_identity.insert(identity, record);
            }
            None => self.unidentified.push(record),
        }
    }

    pub fn get(&self, identity: &str) -> Option<&AssetRecord> {
        self.by_identity.get(identity)
    }

    pub fn get_mut(&mut self, identity: &str) -> Option<&mut AssetRecord> {
        self.by_identity.get_mut(identity)
    }

    /// Identified records in identity order, then unidentified ones in scan order.
    pub fn iter(&self) -> impl Iterator<Item = &AssetRecord> {
        self.by_identity.values().chain(self.unidentified.iter())
    }

    pub fn identified(&self) -> impl Iterator<Item = (&String, &AssetRecord)> {
        self.by_identity.iter()
    }

    /// Remove an identified record.
    pub fn remove(&mut self, identity: &str) -> Option<AssetRecord> {
        self.by_identity.remove(identity)
    }

    pub fn unidentified(&self) -> &[AssetRecord] {
        &self.unidentified
    }

    pub fn len(&self) -> usize {
        self.by_identity.len() + self.unidentified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<AssetRecord> for RecordSet {
    fn from_iter<I: IntoIterator<Item = AssetRecord>>(iter: I) -> Self {
        let mut set = RecordSet::new();
        for record in iter {
            set.insert(record);
        }
        set
    }
}

/// What a graph node stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Directory (or module) aggregating children.
    Folder,
    /// One concrete asset file. `identity` is empty when the file had none.
    Leaf { identity: String, size: u64 },
}

/// The kind of an edge in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Folder contains a child (Folder -> Folder/Leaf).
    Contains,
    /// Leaf references another leaf (Leaf -> Leaf).
    DependsOn,
}

/// Memo slot state for one (node, other) pair. A missing slot is uncomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reach {
    /// Evaluation started but has not finished; reads as `false`.
    InProgress,
    Computed(bool),
}

impl Reach {
    pub fn observed(self) -> bool {
        matches!(self, Reach::Computed(true))
    }
}

/// Data stored in a graph node.
#[derive(Debug)]
pub struct AssetNode {
    pub name: String,
    pub kind: NodeKind,
    /// Reachability memo for queries issued by this node.
    pub(crate) cache: RefCell<HashMap<NodeIndex, Reach>>,
}

impl AssetNode {
    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Folder,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn leaf(name: impl Into<String>, identity: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Leaf {
                identity: identity.into(),
                size,
            },
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.kind, NodeKind::Folder)
    }

    /// Identity of a leaf; `None` for folders and identity-less leaves.
    pub fn identity(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Leaf { identity, .. } if !identity.is_empty() => Some(identity),
            _ => None,
        }
    }
}
