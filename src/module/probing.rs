use crate::settings::RuntimeConfig;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File extensions a module metadata image may carry, in lookup order.
pub const MODULE_EXTENSIONS: [&str; 5] = ["module", "json", "yaml", "yml", "bin"];

/// Dependency search state for a single isolation context.
///
/// A `ProbingPaths` is owned by one [`ModuleLoader`](super::ModuleLoader);
/// registering a reference path never affects any other loader.
#[derive(Debug, Clone)]
pub struct ProbingPaths {
    base_dir: PathBuf,
    redirects: Vec<(String, PathBuf)>,
    /// Search roots in priority order, without duplicates
    roots: Vec<PathBuf>,
}

impl ProbingPaths {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            roots: vec![base_dir.clone()],
            base_dir,
            redirects: Vec::new(),
        }
    }

    /// Applies a runtime configuration: redirects plus extra probing roots
    /// relative to the base directory.
    pub fn apply_runtime_config(&mut self, config: &RuntimeConfig) {
        for (name, target) in &config.redirects {
            let target = self.anchor(target);
            debug!("Redirecting module {} to {}", name, target.display());
            self.redirects.push((name.clone(), target));
        }
        for path in &config.probing_paths {
            let root = self.anchor(path);
            self.push_root(root);
        }
    }

    /// Registers a reference path together with all of its subdirectories.
    ///
    /// Hidden directories are skipped. A path that does not exist is logged and
    /// ignored; the dependency it was meant to satisfy will surface as a link
    /// failure instead.
    pub fn register_reference_path(&mut self, path: &Path) {
        let root = self.anchor(path);
        if !root.is_dir() {
            warn!("Reference path is not a directory: {}", root.display());
            return;
        }

        for entry in WalkDir::new(&root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| {
                if e.path() == root {
                    return true;
                }
                !e.file_name().to_string_lossy().starts_with('.')
            })
        {
            match entry {
                Ok(entry) if entry.file_type().is_dir() => {
                    self.push_root(entry.path().to_path_buf());
                }
                Ok(_) => {}
                Err(e) => warn!("Failed to access reference path: {}", e),
            }
        }
    }

    /// Finds the image of the module called `name`.
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        if let Some((_, target)) = self.redirects.iter().find(|(n, _)| n == name) {
            debug!("Module {} resolved through redirect", name);
            return Some(target.clone());
        }

        for root in &self.roots {
            for ext in MODULE_EXTENSIONS {
                let candidate = root.join(format!("{}.{}", name, ext));
                if candidate.is_file() {
                    debug!("Module {} found at {}", name, candidate.display());
                    return Some(candidate);
                }
            }
        }
        None
    }

    /// Number of directories that will be searched.
    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn anchor(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    fn push_root(&mut self, root: PathBuf) {
        if !self.roots.contains(&root) {
            self.roots.push(root);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_locate_in_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("Web.Core.yaml"), "name: Web.Core\n").unwrap();

        let probing = ProbingPaths::new(temp_dir.path().to_path_buf());
        assert_eq!(
            probing.locate("Web.Core"),
            Some(temp_dir.path().join("Web.Core.yaml"))
        );
        assert_eq!(probing.locate("Web.Mvc"), None);
    }

    #[test]
    fn test_extension_priority() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("Lib.json"), "{\"name\": \"Lib\"}").unwrap();
        fs::write(temp_dir.path().join("Lib.module"), "name: Lib\n").unwrap();

        let probing = ProbingPaths::new(temp_dir.path().to_path_buf());
        assert_eq!(probing.locate("Lib"), Some(temp_dir.path().join("Lib.module")));
    }

    #[test]
    fn test_reference_path_is_searched_recursively() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("app");
        let nested = temp_dir.path().join("refs").join("framework").join("v4");
        fs::create_dir_all(&base).unwrap();
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("Web.Http.module"), "name: Web.Http\n").unwrap();

        let mut probing = ProbingPaths::new(base);
        assert_eq!(probing.locate("Web.Http"), None);

        probing.register_reference_path(&temp_dir.path().join("refs"));
        assert_eq!(probing.locate("Web.Http"), Some(nested.join("Web.Http.module")));
    }

    #[test]
    fn test_hidden_directories_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let hidden = temp_dir.path().join("refs").join(".cache");
        fs::create_dir_all(&hidden).unwrap();
        fs::write(hidden.join("Stale.module"), "name: Stale\n").unwrap();

        let mut probing = ProbingPaths::new(temp_dir.path().join("app"));
        probing.register_reference_path(&temp_dir.path().join("refs"));
        assert_eq!(probing.locate("Stale"), None);
    }

    #[test]
    fn test_relative_reference_path_is_anchored_at_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let libs = temp_dir.path().join("libs");
        fs::create_dir_all(&libs).unwrap();
        fs::write(libs.join("Core.module"), "name: Core\n").unwrap();

        let mut probing = ProbingPaths::new(temp_dir.path().to_path_buf());
        probing.register_reference_path(Path::new("libs"));
        assert_eq!(probing.locate("Core"), Some(libs.join("Core.module")));
    }

    #[test]
    fn test_missing_reference_path_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let mut probing = ProbingPaths::new(temp_dir.path().to_path_buf());
        probing.register_reference_path(&temp_dir.path().join("nope"));
        assert_eq!(probing.root_count(), 1);
    }

    #[test]
    fn test_runtime_config_redirects_win() {
        let temp_dir = TempDir::new().unwrap();
        let shared = temp_dir.path().join("shared");
        let bin = temp_dir.path().join("bin");
        fs::create_dir_all(&shared).unwrap();
        fs::create_dir_all(&bin).unwrap();
        fs::write(temp_dir.path().join("Core.module"), "name: Core\n").unwrap();
        fs::write(shared.join("Core.v2.module"), "name: Core\n").unwrap();
        fs::write(bin.join("Extra.module"), "name: Extra\n").unwrap();

        let mut redirects = BTreeMap::new();
        redirects.insert("Core".to_string(), PathBuf::from("shared/Core.v2.module"));
        let config = RuntimeConfig {
            probing_paths: vec![PathBuf::from("bin")],
            redirects,
        };

        let mut probing = ProbingPaths::new(temp_dir.path().to_path_buf());
        probing.apply_runtime_config(&config);

        assert_eq!(probing.locate("Core"), Some(shared.join("Core.v2.module")));
        assert_eq!(probing.locate("Extra"), Some(bin.join("Extra.module")));
    }

    #[test]
    fn test_loaders_do_not_share_registrations() {
        let temp_dir = TempDir::new().unwrap();
        let refs = temp_dir.path().join("refs");
        fs::create_dir_all(&refs).unwrap();
        fs::write(refs.join("Only.module"), "name: Only\n").unwrap();

        let mut first = ProbingPaths::new(temp_dir.path().join("a"));
        let second = ProbingPaths::new(temp_dir.path().join("b"));
        first.register_reference_path(&refs);

        assert!(first.locate("Only").is_some());
        assert!(second.locate("Only").is_none());
    }
}
