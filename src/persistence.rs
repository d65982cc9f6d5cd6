//! Snapshot persistence.
//!
//! Only raw records and the report of the last successful scan are
//! persisted. The node graph is always rebuilt from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{AssetDepsError, Result};
use crate::scanner::ScanResult;

/// Directory holding persisted state, relative to the project root.
pub const STATE_DIR: &str = ".assetdeps";
/// Snapshot file name inside [`STATE_DIR`].
pub const SNAPSHOT_FILE: &str = "snapshot.bin";
/// Config file name inside [`STATE_DIR`].
pub const CONFIG_FILE: &str = "config.toml";

/// Bumped whenever the serialized layout changes.
pub const FORMAT_VERSION: u32 = 1;

pub fn state_dir(project_root: &Path) -> PathBuf {
    project_root.join(STATE_DIR)
}

pub fn snapshot_path(project_root: &Path) -> PathBuf {
    state_dir(project_root).join(SNAPSHOT_FILE)
}

pub fn config_path(project_root: &Path) -> PathBuf {
    state_dir(project_root).join(CONFIG_FILE)
}

/// Records and findings of one scan, as written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSnapshot {
    pub format_version: u32,
    pub scanned_at: DateTime<Utc>,
    pub result: ScanResult,
}

impl ScanSnapshot {
    pub fn new(result: ScanResult) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            scanned_at: Utc::now(),
            result,
        }
    }

    /// Write the snapshot with bincode, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, self)?;
        writer.flush()?;
        info!(
            path = %path.display(),
            records = self.result.records.len(),
            "snapshot saved"
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let snapshot: ScanSnapshot = bincode::deserialize_from(reader)?;
        if snapshot.format_version != FORMAT_VERSION {
            return Err(AssetDepsError::IncompatibleSnapshot {
                found: snapshot.format_version,
                expected: FORMAT_VERSION,
            });
        }
        debug!(
            path = %path.display(),
            records = snapshot.result.records.len(),
            "snapshot loaded"
        );
        Ok(snapshot)
    }

    /// The report as pretty JSON, for tools that consume findings.
    pub fn report_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.result.report)?)
    }
}
