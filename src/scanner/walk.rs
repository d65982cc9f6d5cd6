//! File discovery for one package root.

use ignore::WalkBuilder;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::PackageRoot;
use crate::config::CompiledConfig;

/// Extension of assembly definition files, which name the logical module of
/// every asset below them.
const MODULE_DEFINITION_EXT: &str = "asmdef";

/// A file eligible for scanning.
#[derive(Debug, Clone)]
pub(crate) struct DiscoveredFile {
    pub path: PathBuf,
    /// `<package>/<relative path>` with forward slashes.
    pub logical: String,
    pub module: Option<String>,
}

/// Walk `root` and return eligible files in file-name order.
///
/// Hidden entries are skipped. VCS ignore files are not consulted: the
/// corpus decides what is an asset, not the repository layout.
pub(crate) fn discover(root: &PackageRoot, config: &CompiledConfig) -> Vec<DiscoveredFile> {
    let files: Vec<PathBuf> = WalkBuilder::new(&root.path)
        .hidden(true)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .ignore(false)
        .parents(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(package = %root.name, error = %e, "unreadable entry, skipping");
                None
            }
        })
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .map(|entry| entry.into_path())
        .collect();

    let modules = module_definitions(&files);

    files
        .into_iter()
        .filter(|path| !config.is_sidecar(path))
        .filter(|path| config.matches_filter(path))
        .filter_map(|path| {
            let logical = logical_path(root, &path)?;
            if config.ignores_path(&logical) {
                debug!(path = %logical, "ignored by path pattern");
                return None;
            }
            let module = module_for(&root.path, &path, &modules);
            Some(DiscoveredFile {
                path,
                logical,
                module,
            })
        })
        .collect()
}

/// Directory -> module name, for every assembly definition under the root.
fn module_definitions(files: &[PathBuf]) -> HashMap<PathBuf, String> {
    let mut modules = HashMap::new();
    for path in files {
        let is_definition = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(MODULE_DEFINITION_EXT));
        if !is_definition {
            continue;
        }
        if let (Some(dir), Some(stem)) = (path.parent(), path.file_stem()) {
            // Several definitions in one directory is a broken project; keep the first.
            modules
                .entry(dir.to_path_buf())
                .or_insert_with(|| stem.to_string_lossy().to_string());
        }
    }
    modules
}

/// Nearest module definition at or above the file's directory, within the root.
fn module_for(root: &Path, path: &Path, modules: &HashMap<PathBuf, String>) -> Option<String> {
    let mut dir = path.parent();
    while let Some(current) = dir {
        if let Some(module) = modules.get(current) {
            return Some(module.clone());
        }
        if current == root {
            break;
        }
        dir = current.parent();
    }
    None
}

fn logical_path(root: &PackageRoot, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(&root.path).ok()?;
    let mut logical = root.name.clone();
    for component in relative.components() {
        logical.push('/');
        logical.push_str(&component.as_os_str().to_string_lossy());
    }
    Some(logical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn test_discover_skips_sidecars_hidden_and_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("Assets");
        touch(&root.join("b.prefab"));
        touch(&root.join("b.prefab.meta"));
        touch(&root.join("a.png"));
        touch(&root.join(".hidden.asset"));
        touch(&root.join("Temp/skip.asset"));

        let config = ScanConfig {
            ignore_paths: vec!["^Assets/Temp/".to_string()],
            ..ScanConfig::default()
        }
        .compile()
        .unwrap();

        let files = discover(&PackageRoot::project("Assets", &root), &config);
        let logical: Vec<&str> = files.iter().map(|f| f.logical.as_str()).collect();
        assert_eq!(logical, vec!["Assets/a.png", "Assets/b.prefab"]);
    }

    #[test]
    fn test_module_is_nearest_definition() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("Pkg");
        touch(&root.join("Runtime/Pkg.Runtime.asmdef"));
        touch(&root.join("Runtime/Sub/thing.asset"));
        touch(&root.join("Runtime/Sub/Editor/Pkg.Editor.asmdef"));
        touch(&root.join("Runtime/Sub/Editor/tool.asset"));
        touch(&root.join("loose.asset"));

        let config = ScanConfig::default().compile().unwrap();
        let files = discover(&PackageRoot::package("Pkg", &root), &config);
        let module_of = |logical: &str| {
            files
                .iter()
                .find(|f| f.logical == logical)
                .and_then(|f| f.module.clone())
        };

        assert_eq!(module_of("Pkg/Runtime/Sub/thing.asset").as_deref(), Some("Pkg.Runtime"));
        assert_eq!(
            module_of("Pkg/Runtime/Sub/Editor/tool.asset").as_deref(),
            Some("Pkg.Editor")
        );
        assert_eq!(module_of("Pkg/loose.asset"), None);
    }

    #[test]
    fn test_walk_error_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScanConfig::default().compile().unwrap();
        let missing = PackageRoot::package("Gone", dir.path().join("Gone"));
        assert!(discover(&missing, &config).is_empty());
    }
}
