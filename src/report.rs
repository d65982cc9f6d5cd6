//! Static analysis findings collected during a scan.
//!
//! Read-only output for whatever presents the graph; nothing here tries to
//! repair the corpus.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An identity referenced by at least one record but never bound to a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DanglingReference {
    pub identity: String,
    /// Logical paths of the records that reference it.
    pub referrers: Vec<String>,
}

/// Anomalies found while scanning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticAnalysisReport {
    /// Files with no resolvable identity.
    missing_identity: Vec<String>,
    /// Identity -> every path that declared it, first-bound path first.
    duplicated_identity: BTreeMap<String, Vec<String>>,
    /// Referenced identities with no file behind them.
    dangling_references: Vec<DanglingReference>,
}

impl StaticAnalysisReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_missing_identity(&mut self, path: impl Into<String>) {
        self.missing_identity.push(path.into());
    }

    /// Record that `identity` was declared by `duplicate` after already being
    /// bound to `first`.
    pub fn record_duplicate(&mut self, identity: &str, first: &str, duplicate: &str) {
        let paths = self
            .duplicated_identity
            .entry(identity.to_string())
            .or_insert_with(|| vec![first.to_string()]);
        if !paths.iter().any(|p| p == duplicate) {
            paths.push(duplicate.to_string());
        }
    }

    pub fn record_dangling(&mut self, identity: impl Into<String>, referrers: Vec<String>) {
        self.dangling_references.push(DanglingReference {
            identity: identity.into(),
            referrers,
        });
    }

    /// Merge findings from another (per-root) report.
    pub fn merge(&mut self, other: StaticAnalysisReport) {
        self.missing_identity.extend(other.missing_identity);
        for (identity, paths) in other.duplicated_identity {
            let entry = self.duplicated_identity.entry(identity).or_default();
            for path in paths {
                if !entry.contains(&path) {
                    entry.push(path);
                }
            }
        }
        self.dangling_references.extend(other.dangling_references);
    }

    /// Sort list findings so reports from parallel scans compare equal.
    pub(crate) fn normalize(&mut self) {
        self.missing_identity.sort();
        self.missing_identity.dedup();
        self.dangling_references
            .sort_by(|a, b| a.identity.cmp(&b.identity));
    }

    pub fn missing_identity(&self) -> &[String] {
        &self.missing_identity
    }

    pub fn duplicated_identity(&self) -> &BTreeMap<String, Vec<String>> {
        &self.duplicated_identity
    }

    pub fn dangling_references(&self) -> &[DanglingReference] {
        &self.dangling_references
    }

    pub fn is_clean(&self) -> bool {
        self.missing_identity.is_empty()
            && self.duplicated_identity.is_empty()
            && self.dangling_references.is_empty()
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            missing_identity: self.missing_identity.len(),
            duplicated_identity: self.duplicated_identity.len(),
            dangling_references: self.dangling_references.len(),
        }
    }
}

/// Finding counts, for status lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub missing_identity: usize,
    pub duplicated_identity: usize,
    pub dangling_references: usize,
}

impl std::fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} missing identities, {} duplicated identities, {} dangling references",
            self.missing_identity, self.duplicated_identity, self.dangling_references
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_report_is_clean() {
        let report = StaticAnalysisReport::new();
        assert!(report.is_clean());
        assert_eq!(report.summary(), ReportSummary::default());
    }

    #[test]
    fn test_duplicate_collects_all_paths_once() {
        let mut report = StaticAnalysisReport::new();
        report.record_duplicate("g1", "P/a.asset", "P/b.asset");
        report.record_duplicate("g1", "P/a.asset", "P/c.asset");
        report.record_duplicate("g1", "P/a.asset", "P/b.asset");

        assert_eq!(report.duplicated_identity().len(), 1);
        assert_eq!(
            report.duplicated_identity()["g1"],
            vec!["P/a.asset", "P/b.asset", "P/c.asset"]
        );
    }

    #[test]
    fn test_merge_and_normalize() {
        let mut a = StaticAnalysisReport::new();
        a.record_missing_identity("Q/z.txt");
        a.record_duplicate("g1", "P/a", "P/b");

        let mut b = StaticAnalysisReport::new();
        b.record_missing_identity("P/y.txt");
        b.record_duplicate("g1", "P/a", "Q/c");
        b.record_dangling("g9", vec!["P/a".to_string()]);

        a.merge(b);
        a.normalize();

        assert_eq!(a.missing_identity(), ["P/y.txt", "Q/z.txt"]);
        assert_eq!(a.duplicated_identity()["g1"], vec!["P/a", "P/b", "Q/c"]);
        assert_eq!(a.dangling_references()[0].identity, "g9");
        assert_eq!(a.summary().to_string(), "2 missing identities, 1 duplicated identities, 1 dangling references");
    }
}
