//! Corpus scanner. Reads sidecar-identified files and produces raw records.
//!
//! Package roots are scanned in parallel. They share one identity -> record
//! map, so a reference seen before its target is scanned still ends up as a
//! single record per identity. Cancellation is checked once per root and
//! once at the end; a cancelled scan publishes nothing.

pub mod tokens;
mod walk;

use dashmap::DashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::CompiledConfig;
use crate::graph::types::{AssetRecord, RecordSet};
use crate::report::StaticAnalysisReport;
use walk::DiscoveredFile;

/// Whether a root is the project itself or an installed package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootKind {
    Project,
    Package,
}

/// One top-level directory to scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRoot {
    /// Package name; also the first segment of every logical path below it.
    pub name: String,
    pub path: PathBuf,
    pub kind: RootKind,
}

impl PackageRoot {
    pub fn project(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: RootKind::Project,
        }
    }

    pub fn package(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: RootKind::Package,
        }
    }
}

/// Resolves identities that no scanned file declares (built-in resources,
/// assets living outside the scanned roots).
pub trait IdentityLookup: Sync {
    fn path_for(&self, identity: &str) -> Option<String>;
}

/// Lookup that resolves nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookup;

impl IdentityLookup for NoLookup {
    fn path_for(&self, _identity: &str) -> Option<String> {
        None
    }
}

impl IdentityLookup for HashMap<String, String> {
    fn path_for(&self, identity: &str) -> Option<String> {
        self.get(identity).cloned()
    }
}

impl IdentityLookup for BTreeMap<String, String> {
    fn path_for(&self, identity: &str) -> Option<String> {
        self.get(identity).cloned()
    }
}

/// Cooperative cancellation flag shared between a scan and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Records and findings of a completed scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub records: RecordSet,
    pub report: StaticAnalysisReport,
}

/// How a scan ended.
#[derive(Debug)]
pub enum ScanOutcome {
    Completed(ScanResult),
    Cancelled,
}

impl ScanOutcome {
    pub fn completed(self) -> Option<ScanResult> {
        match self {
            ScanOutcome::Completed(result) => Some(result),
            ScanOutcome::Cancelled => None,
        }
    }
}

/// Per-root output that is not shared through the record map.
#[derive(Debug, Default)]
struct RootScan {
    report: StaticAnalysisReport,
    unidentified: Vec<AssetRecord>,
    files: usize,
    skipped: usize,
}

/// Scanner over a set of package roots.
pub struct Scanner<'a> {
    config: &'a CompiledConfig,
    lookup: &'a dyn IdentityLookup,
}

impl<'a> Scanner<'a> {
    pub fn new(config: &'a CompiledConfig, lookup: &'a dyn IdentityLookup) -> Self {
        Self { config, lookup }
    }

    /// Scan all roots. Returns [`ScanOutcome::Cancelled`] if `cancel` fires
    /// before the record map is finalized.
    pub fn scan(&self, roots: &[PackageRoot], cancel: &CancelToken) -> ScanOutcome {
        let records: DashMap<String, AssetRecord> = DashMap::new();

        // Logical paths start with the root name, so two roots sharing a
        // name would alias each other's files.
        let mut names = HashSet::new();
        let roots: Vec<&PackageRoot> = roots
            .iter()
            .filter(|root| {
                let first = names.insert(root.name.as_str());
                if !first {
                    warn!(
                        package = %root.name,
                        path = %root.path.display(),
                        "duplicate package name, skipping root"
                    );
                }
                first
            })
            .collect();

        let per_root: Vec<Option<RootScan>> = roots
            .par_iter()
            .map(|root| {
                if cancel.is_cancelled() {
                    return None;
                }
                Some(self.scan_root(root, &records))
            })
            .collect();

        if cancel.is_cancelled() || per_root.iter().any(Option::is_none) {
            info!("scan cancelled, discarding partial results");
            return ScanOutcome::Cancelled;
        }

        let mut report = StaticAnalysisReport::new();
        let mut set: RecordSet = records.into_iter().map(|(_, record)| record).collect();
        let (mut files, mut skipped) = (0, 0);
        for root_scan in per_root.into_iter().flatten() {
            files += root_scan.files;
            skipped += root_scan.skipped;
            report.merge(root_scan.report);
            for record in root_scan.unidentified {
                set.insert(record);
            }
        }

        self.resolve_unbound(&mut set, &mut report);
        report.normalize();

        info!(
            roots = roots.len(),
            files,
            skipped,
            records = set.len(),
            findings = %report.summary(),
            "scan complete"
        );

        ScanOutcome::Completed(ScanResult {
            records: set,
            report,
        })
    }

    fn scan_root(&self, root: &PackageRoot, records: &DashMap<String, AssetRecord>) -> RootScan {
        let mut out = RootScan::default();
        if self.config.ignores_package(&root.name) {
            debug!(package = %root.name, "package ignored by pattern");
            return out;
        }

        let files = walk::discover(root, self.config);
        debug!(package = %root.name, files = files.len(), "scanning package root");
        self.scan_files(root, &files, records, &mut out);
        out
    }

    fn scan_files(
        &self,
        root: &PackageRoot,
        files: &[DiscoveredFile],
        records: &DashMap<String, AssetRecord>,
        out: &mut RootScan,
    ) {
        for file in files {
            if self.scan_file(root, file, records, out) {
                out.files += 1;
            } else {
                out.skipped += 1;
            }
        }
    }

    /// Scan one file. Returns false if the file could not be read.
    fn scan_file(
        &self,
        root: &PackageRoot,
        file: &DiscoveredFile,
        records: &DashMap<String, AssetRecord>,
        out: &mut RootScan,
    ) -> bool {
        let size = match fs::metadata(&file.path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!(file = %file.path.display(), error = %e, "unreadable file, skipping");
                return false;
            }
        };

        let content_tokens = if self.config.is_content_scannable(&file.path) {
            match fs::read(&file.path) {
                Ok(bytes) => tokens::extract_tokens(&String::from_utf8_lossy(&bytes)),
                Err(e) => {
                    warn!(file = %file.path.display(), error = %e, "unreadable file, skipping");
                    return false;
                }
            }
        } else {
            Vec::new()
        };

        let mut sidecar_tokens = read_sidecar(&self.config.sidecar_for(&file.path));
        let identity = if sidecar_tokens.is_empty() {
            None
        } else {
            Some(sidecar_tokens.remove(0))
        };
        let references = sidecar_tokens.into_iter().chain(content_tokens);

        match identity {
            Some(identity) => {
                let references: Vec<String> = references.collect();
                // Placeholders first: no other entry may be touched while the
                // own entry's guard is held.
                for token in &references {
                    ensure_placeholder(records, token);
                }

                let mut entry = records
                    .entry(identity.clone())
                    .or_insert_with(|| AssetRecord::placeholder(&identity));
                match entry.path.clone() {
                    None => {
                        entry.path = Some(file.logical.clone());
                        entry.size = size;
                        entry.package = Some(root.name.clone());
                        entry.module = file.module.clone();
                    }
                    Some(existing) if existing == file.logical => {}
                    Some(existing) => {
                        warn!(
                            identity = %identity,
                            first = %existing,
                            duplicate = %file.logical,
                            "duplicated identity, keeping first path"
                        );
                        out.report.record_duplicate(&identity, &existing, &file.logical);
                        return true;
                    }
                }
                for token in &references {
                    entry.add_reference(token);
                }
            }
            None => {
                debug!(file = %file.logical, "no identity found");
                out.report.record_missing_identity(file.logical.clone());
                let mut record = AssetRecord {
                    identity: None,
                    path: Some(file.logical.clone()),
                    size,
                    references: Vec::new(),
                    package: Some(root.name.clone()),
                    module: file.module.clone(),
                };
                for token in references {
                    ensure_placeholder(records, &token);
                    record.add_reference(&token);
                }
                out.unidentified.push(record);
            }
        }
        true
    }

    /// Bind path-less identities through the lookup; report the rest as
    /// dangling. A placeholder no record references (left behind by a
    /// rejected duplicate) is dropped instead.
    fn resolve_unbound(&self, set: &mut RecordSet, report: &mut StaticAnalysisReport) {
        let unbound: Vec<String> = set
            .identified()
            .filter(|(_, record)| !record.is_bound())
            .map(|(identity, _)| identity.clone())
            .collect();
        if unbound.is_empty() {
            return;
        }

        let mut referrers: HashMap<String, Vec<String>> = HashMap::new();
        for record in set.iter() {
            let Some(path) = record.path.as_deref() else {
                continue;
            };
            for token in &record.references {
                referrers
                    .entry(token.clone())
                    .or_default()
                    .push(path.to_string());
            }
        }

        for identity in unbound {
            let Some(mut by) = referrers.remove(&identity) else {
                debug!(identity = %identity, "unreferenced placeholder dropped");
                set.remove(&identity);
                continue;
            };
            match self.lookup.path_for(&identity) {
                Some(path) => {
                    debug!(identity = %identity, path = %path, "resolved through lookup");
                    if let Some(record) = set.get_mut(&identity) {
                        record.path = Some(path);
                    }
                }
                None => {
                    by.sort();
                    report.record_dangling(identity, by);
                }
            }
        }
    }
}

/// Convenience wrapper around [`Scanner::scan`].
pub fn scan(
    roots: &[PackageRoot],
    config: &CompiledConfig,
    lookup: &dyn IdentityLookup,
    cancel: &CancelToken,
) -> ScanOutcome {
    Scanner::new(config, lookup).scan(roots, cancel)
}

/// Files a scan of `root` would consider, in scan order.
pub fn discover_files(root: &PackageRoot, config: &CompiledConfig) -> Vec<PathBuf> {
    walk::discover(root, config)
        .into_iter()
        .map(|file| file.path)
        .collect()
}

fn ensure_placeholder(records: &DashMap<String, AssetRecord>, token: &str) {
    if !records.contains_key(token) {
        records
            .entry(token.to_string())
            .or_insert_with(|| AssetRecord::placeholder(token));
    }
}

/// Tokens of a sidecar file. Missing or unreadable sidecars yield none.
fn read_sidecar(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(text) => tokens::extract_tokens(&text),
        Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            warn!(file = %path.display(), error = %e, "unreadable sidecar");
            Vec::new()
        }
    }
}
