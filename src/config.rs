//! Scan configuration.
//!
//! Loaded from `.assetdeps/config.toml` when present. Every field has a
//! default so a partial file (or none at all) is valid.

use globset::{Glob, GlobMatcher};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{AssetDepsError, Result};

/// Extensions whose content is searched for embedded references by default.
/// These are the text-serialized asset formats that name other assets inline.
pub const DEFAULT_CONTENT_EXTENSIONS: &[&str] = &[
    "unity",
    "prefab",
    "asset",
    "mat",
    "controller",
    "overridecontroller",
    "anim",
    "mask",
    "playable",
    "physicmaterial",
    "spriteatlas",
    "lighting",
    "preset",
    "mixer",
    "rendertexture",
    "terrainlayer",
    "shadergraph",
    "shadersubgraph",
    "asmdef",
    "asmref",
];

/// Raw, user-facing scan configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Regexes matched against the logical path (`<package>/<relative>`).
    pub ignore_paths: Vec<String>,
    /// Regexes matched against package names. A match skips the whole root.
    pub ignore_packages: Vec<String>,
    /// Glob matched against each file name.
    pub file_filter: String,
    /// Extensions (without the dot) scanned for embedded references.
    pub content_extensions: Vec<String>,
    /// Extension of the sidecar metadata file that declares identity.
    pub sidecar_extension: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ignore_paths: Vec::new(),
            ignore_packages: Vec::new(),
            file_filter: "*".to_string(),
            content_extensions: DEFAULT_CONTENT_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            sidecar_extension: "meta".to_string(),
        }
    }
}

impl ScanConfig {
    /// Load config from a TOML file, falling back to defaults if the file is
    /// missing or malformed.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(Some(config)) => config,
            Ok(None) => {
                debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!(error = %e, "failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// Load config from a TOML file. `Ok(None)` when the file does not exist.
    pub fn try_load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map(Some)
            .map_err(|e| AssetDepsError::Config {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }

    /// Compile patterns into matchers. Invalid patterns are errors.
    pub fn compile(&self) -> Result<CompiledConfig> {
        let ignore_paths = compile_regexes(&self.ignore_paths)?;
        let ignore_packages = compile_regexes(&self.ignore_packages)?;

        let filter = if self.file_filter.trim().is_empty() {
            "*"
        } else {
            self.file_filter.as_str()
        };
        let file_filter = Glob::new(filter)
            .map_err(|source| AssetDepsError::InvalidFilter {
                filter: filter.to_string(),
                source,
            })?
            .compile_matcher();

        let content_extensions = self
            .content_extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .collect();

        Ok(CompiledConfig {
            ignore_paths,
            ignore_packages,
            file_filter,
            content_extensions,
            sidecar_extension: self.sidecar_extension.trim_start_matches('.').to_string(),
        })
    }
}

fn compile_regexes(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| AssetDepsError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

/// Ready-to-match form of [`ScanConfig`].
#[derive(Debug, Clone)]
pub struct CompiledConfig {
    ignore_paths: Vec<Regex>,
    ignore_packages: Vec<Regex>,
    file_filter: GlobMatcher,
    content_extensions: HashSet<String>,
    sidecar_extension: String,
}

impl CompiledConfig {
    pub fn ignores_path(&self, logical_path: &str) -> bool {
        self.ignore_paths.iter().any(|re| re.is_match(logical_path))
    }

    pub fn ignores_package(&self, package: &str) -> bool {
        self.ignore_packages.iter().any(|re| re.is_match(package))
    }

    pub fn matches_filter(&self, path: &Path) -> bool {
        path.file_name()
            .is_some_and(|name| self.file_filter.is_match(Path::new(name)))
    }

    pub fn is_content_scannable(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.content_extensions.contains(&ext.to_ascii_lowercase()))
    }

    pub fn is_sidecar(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == self.sidecar_extension)
    }

    /// `Foo.prefab` -> `Foo.prefab.meta`
    pub fn sidecar_for(&self, path: &Path) -> std::path::PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".");
        name.push(&self.sidecar_extension);
        name.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_compile() {
        let compiled = ScanConfig::default().compile().unwrap();
        assert!(compiled.matches_filter(Path::new("Assets/a.prefab")));
        assert!(compiled.is_content_scannable(Path::new("Assets/Scene.UNITY")));
        assert!(!compiled.is_content_scannable(Path::new("Assets/tex.png")));
        assert!(compiled.is_sidecar(Path::new("Assets/tex.png.meta")));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ScanConfig = toml::from_str(r#"ignore_paths = ["^Assets/Temp/"]"#).unwrap();
        assert_eq!(config.ignore_paths, vec!["^Assets/Temp/".to_string()]);
        assert_eq!(config.file_filter, "*");
        assert_eq!(config.sidecar_extension, "meta");

        let compiled = config.compile().unwrap();
        assert!(compiled.ignores_path("Assets/Temp/x.asset"));
        assert!(!compiled.ignores_path("Assets/Keep/x.asset"));
    }

    #[test]
    fn test_invalid_regex_is_error() {
        let config = ScanConfig {
            ignore_packages: vec!["(unclosed".to_string()],
            ..ScanConfig::default()
        };
        assert!(matches!(
            config.compile(),
            Err(AssetDepsError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_file_filter_glob() {
        let config = ScanConfig {
            file_filter: "*.prefab".to_string(),
            ..ScanConfig::default()
        };
        let compiled = config.compile().unwrap();
        assert!(compiled.matches_filter(Path::new("deep/dir/Door.prefab")));
        assert!(!compiled.matches_filter(Path::new("deep/dir/Door.mat")));
    }

    #[test]
    fn test_sidecar_for() {
        let compiled = ScanConfig::default().compile().unwrap();
        assert_eq!(
            compiled.sidecar_for(Path::new("a/b.png")),
            std::path::PathBuf::from("a/b.png.meta")
        );
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScanConfig::load(&dir.path().join("config.toml"));
        assert_eq!(config, ScanConfig::default());
    }

    #[test]
    fn test_load_malformed_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "ignore_paths = 12").unwrap();
        assert!(ScanConfig::try_load(&path).is_err());
        assert_eq!(ScanConfig::load(&path), ScanConfig::default());
    }
}
