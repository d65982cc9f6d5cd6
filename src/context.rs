//! The current-graph context.
//!
//! Owns the records of the last successful scan and the graph built from
//! them. A scan or refresh replaces the graph wholesale (and with it every
//! reachability cache); nothing is patched in place.

use std::path::Path;
use tracing::{debug, info};

use crate::config::CompiledConfig;
use crate::error::{AssetDepsError, Result};
use crate::graph::{build_graph, DependencyGraph, NodeIndex, RecordSet};
use crate::persistence::ScanSnapshot;
use crate::report::StaticAnalysisReport;
use crate::scanner::{self, CancelToken, IdentityLookup, PackageRoot, ScanOutcome, ScanResult};

/// Supplies the package list to scan. Fetching it (a package manager
/// query, a manifest, a directory listing) is entirely up to the implementor.
pub trait PackageSource {
    fn resolve(&self) -> Result<Vec<PackageRoot>>;
}

impl PackageSource for Vec<PackageRoot> {
    fn resolve(&self) -> Result<Vec<PackageRoot>> {
        Ok(self.clone())
    }
}

/// Outcome of [`AssetGraphContext::scan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Completed { generation: u64 },
    Cancelled,
}

/// Holds the current scan result and dependency graph.
#[derive(Debug, Default)]
pub struct AssetGraphContext {
    scan: Option<ScanResult>,
    graph: Option<DependencyGraph>,
    /// Bumped on every published scan or load.
    generation: u64,
    /// Generation the current graph was built from.
    graph_generation: u64,
}

impl AssetGraphContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context seeded with a previously persisted scan.
    pub fn from_snapshot(snapshot: ScanSnapshot) -> Self {
        let mut context = Self::new();
        context.publish(snapshot.result);
        context
    }

    /// Load a persisted scan from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::from_snapshot(ScanSnapshot::load(path)?))
    }

    /// Persist the current scan. Fails if nothing has been scanned yet.
    pub fn save(&self, path: &Path) -> Result<()> {
        let result = self
            .scan
            .clone()
            .ok_or(AssetDepsError::NotScanned)?;
        ScanSnapshot::new(result).save(path)
    }

    /// Scan `roots`. On cancellation the previous records, graph and
    /// generation are left exactly as they were.
    pub fn scan(
        &mut self,
        roots: &[PackageRoot],
        config: &CompiledConfig,
        lookup: &dyn IdentityLookup,
        cancel: &CancelToken,
    ) -> ScanStatus {
        match scanner::scan(roots, config, lookup, cancel) {
            ScanOutcome::Completed(result) => {
                self.publish(result);
                ScanStatus::Completed {
                    generation: self.generation,
                }
            }
            ScanOutcome::Cancelled => {
                info!(generation = self.generation, "scan cancelled, keeping current graph");
                ScanStatus::Cancelled
            }
        }
    }

    /// Resolve the package list, then scan it.
    pub fn scan_packages(
        &mut self,
        source: &dyn PackageSource,
        config: &CompiledConfig,
        lookup: &dyn IdentityLookup,
        cancel: &CancelToken,
    ) -> Result<ScanStatus> {
        let roots = source.resolve()?;
        if cancel.is_cancelled() {
            return Ok(ScanStatus::Cancelled);
        }
        Ok(self.scan(&roots, config, lookup, cancel))
    }

    fn publish(&mut self, result: ScanResult) {
        self.scan = Some(result);
        self.graph = None;
        self.generation += 1;
        debug!(generation = self.generation, "scan published");
    }

    /// The current graph and its root, built from the last scan if stale.
    /// `None` before any scan.
    pub fn root_node(&mut self) -> Option<(&DependencyGraph, NodeIndex)> {
        let graph = self.graph()?;
        let root = graph.root();
        Some((graph, root))
    }

    /// The current graph, built from the last scan if stale.
    pub fn graph(&mut self) -> Option<&DependencyGraph> {
        let stale = self.graph.is_none() || self.graph_generation != self.generation;
        if stale {
            let records = &self.scan.as_ref()?.records;
            self.graph = Some(build_graph(records));
            self.graph_generation = self.generation;
        }
        self.graph.as_ref()
    }

    /// Drop the current graph and every cache in it, and rebuild from the
    /// last scan's records.
    pub fn refresh(&mut self) -> Option<&DependencyGraph> {
        self.graph = None;
        self.graph()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn records(&self) -> Option<&RecordSet> {
        self.scan.as_ref().map(|s| &s.records)
    }

    pub fn report(&self) -> Option<&StaticAnalysisReport> {
        self.scan.as_ref().map(|s| &s.report)
    }
}
