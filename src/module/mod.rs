//! Module loading and type-table inspection.
//!
//! A [`ModuleLoader`] belongs to exactly one isolation context. It owns the
//! dependency search state for that context, reads a module's metadata image
//! and links every module it references. The resulting [`LoadedModule`] answers
//! the structural questions entry-point discovery needs: which types are
//! exported, and what each type inherits from or implements.

pub mod metadata;
pub mod probing;

use crate::error::{Error, MissingFile, Result};
use crate::settings::RuntimeConfig;
use log::{debug, info};
use metadata::{ModuleMetadata, TypeDef};
use probing::ProbingPaths;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Loads module images and links their dependencies.
pub struct ModuleLoader {
    probing: ProbingPaths,
}

impl ModuleLoader {
    /// Creates a loader that resolves dependencies relative to `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            probing: ProbingPaths::new(base_dir.into()),
        }
    }

    pub fn with_runtime_config(mut self, config: &RuntimeConfig) -> Self {
        self.probing.apply_runtime_config(config);
        self
    }

    /// Registers additional dependency-resolution roots for this loader only.
    pub fn register_reference_paths(&mut self, paths: &[PathBuf]) {
        for path in paths {
            debug!("Registering reference path: {}", path.display());
            self.probing.register_reference_path(path);
        }
    }

    /// Loads the module at `path` and links all of its references.
    ///
    /// # Errors
    ///
    /// - [`Error::ConfigurationNotFound`] if `path` does not exist
    /// - [`Error::ModuleLoadFailure`] if the image cannot be decoded or a
    ///   referenced module cannot be found or decoded
    pub fn load(&self, path: &Path) -> Result<LoadedModule> {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.probing.base_dir().join(path)
        };
        info!("Loading module: {}", path.display());

        let module = read_image(&path).map_err(|e| match e {
            ImageError::Missing => Error::ConfigurationNotFound {
                what: MissingFile::Module,
                path: path.clone(),
            },
            ImageError::Invalid(message) => Error::module_load(&path, message),
        })?;

        let dependencies = self.link(&path, &module)?;
        debug!(
            "Module {} linked against {} dependencies",
            module.name,
            dependencies.len()
        );

        Ok(LoadedModule::new(path, module, dependencies))
    }

    /// Resolves the transitive closure of `module`'s references.
    fn link(&self, path: &Path, module: &ModuleMetadata) -> Result<Vec<ModuleMetadata>> {
        let mut linked = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(module.name.clone());

        let mut pending: VecDeque<(String, String)> = module
            .references
            .iter()
            .map(|r| (r.clone(), module.name.clone()))
            .collect();

        while let Some((name, required_by)) = pending.pop_front() {
            if !visited.insert(name.clone()) {
                continue;
            }

            let location = self.probing.locate(&name).ok_or_else(|| {
                Error::module_load(
                    path,
                    format!(
                        "dependency '{}' required by '{}' could not be resolved ({} locations searched)",
                        name,
                        required_by,
                        self.probing.root_count()
                    ),
                )
            })?;

            let dependency = read_image(&location).map_err(|e| {
                let reason = match e {
                    ImageError::Missing => "file vanished".to_string(),
                    ImageError::Invalid(message) => message,
                };
                Error::module_load(
                    path,
                    format!(
                        "dependency '{}' at {} could not be loaded: {}",
                        name,
                        location.display(),
                        reason
                    ),
                )
            })?;

            if dependency.name != name {
                return Err(Error::module_load(
                    path,
                    format!(
                        "dependency '{}' at {} declares itself as '{}'",
                        name,
                        location.display(),
                        dependency.name
                    ),
                ));
            }

            debug!("Linked dependency {} from {}", name, location.display());
            pending.extend(
                dependency
                    .references
                    .iter()
                    .map(|r| (r.clone(), dependency.name.clone())),
            );
            linked.push(dependency);
        }

        Ok(linked)
    }
}

enum ImageError {
    Missing,
    Invalid(String),
}

fn read_image(path: &Path) -> std::result::Result<ModuleMetadata, ImageError> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ImageError::Missing,
        _ => ImageError::Invalid(format!("failed to read {}: {}", path.display(), e)),
    })?;
    let content = String::from_utf8(bytes)
        .map_err(|_| ImageError::Invalid("not a metadata image (invalid UTF-8)".to_string()))?;
    ModuleMetadata::decode(&content).map_err(ImageError::Invalid)
}

/// A module and its linked dependencies, indexed by qualified type name.
///
/// Lives only as long as the isolation context that loaded it; nothing borrowed
/// from it is ever sent across the boundary, only names and serialized documents.
#[derive(Debug)]
pub struct LoadedModule {
    path: PathBuf,
    module: ModuleMetadata,
    dependencies: Vec<ModuleMetadata>,
    /// Qualified name -> (module slot, type slot); slot 0 is the main module
    index: HashMap<String, (usize, usize)>,
}

impl LoadedModule {
    pub fn new(path: PathBuf, module: ModuleMetadata, dependencies: Vec<ModuleMetadata>) -> Self {
        let mut loaded = Self {
            path,
            module,
            dependencies,
            index: HashMap::new(),
        };

        let mut index = HashMap::new();
        for (slot, m) in loaded.all_modules().enumerate() {
            for (i, ty) in m.types.iter().enumerate() {
                // First definition wins; the main module shadows its dependencies
                index.entry(ty.full_name()).or_insert((slot, i));
            }
        }
        loaded.index = index;
        loaded
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.module.name
    }

    pub fn dependencies(&self) -> &[ModuleMetadata] {
        &self.dependencies
    }

    /// Every type defined by the main module, exported or not.
    pub fn types(&self) -> &[TypeDef] {
        &self.module.types
    }

    /// Types of the main module visible to other modules.
    pub fn exported_types(&self) -> impl Iterator<Item = &TypeDef> {
        self.module.types.iter().filter(|t| t.exported)
    }

    /// Looks up a type by qualified name in the module or any dependency.
    pub fn find_type(&self, full_name: &str) -> Option<&TypeDef> {
        let (slot, i) = *self.index.get(full_name)?;
        let module = if slot == 0 {
            &self.module
        } else {
            &self.dependencies[slot - 1]
        };
        module.types.get(i)
    }

    /// The transitive base-type chain of `ty`, nearest first.
    ///
    /// A base that is not in the linked type table is still reported by name
    /// but ends the chain.
    pub fn ancestors(&self, ty: &TypeDef) -> Vec<String> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(ty.full_name());

        let mut next = ty.base.clone();
        while let Some(name) = next {
            if !seen.insert(name.clone()) {
                break;
            }
            next = self.find_type(&name).and_then(|base| base.base.clone());
            chain.push(name);
        }
        chain
    }

    /// Every interface `ty` implements: directly, through its base types, or
    /// through interface inheritance.
    pub fn implemented_interfaces(&self, ty: &TypeDef) -> Vec<String> {
        let mut queue: VecDeque<String> = ty.interfaces.iter().cloned().collect();
        for ancestor in self.ancestors(ty) {
            if let Some(base) = self.find_type(&ancestor) {
                queue.extend(base.interfaces.iter().cloned());
            }
        }

        let mut interfaces = Vec::new();
        let mut seen = HashSet::new();
        while let Some(name) = queue.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(def) = self.find_type(&name) {
                queue.extend(def.interfaces.iter().cloned());
                queue.extend(def.base.iter().cloned());
            }
            interfaces.push(name);
        }
        interfaces
    }

    fn all_modules(&self) -> impl Iterator<Item = &ModuleMetadata> {
        std::iter::once(&self.module).chain(self.dependencies.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    const WEB: &str = r#"
name: Web.Http
types:
  - name: IHttpController
    namespace: Web.Http
    kind: interface
  - name: ApiController
    namespace: Web.Http
    abstract: true
    interfaces: [Web.Http.IHttpController]
"#;

    const APP: &str = r#"
name: Shop.Api
references: [Web.Http]
types:
  - name: BaseController
    namespace: Shop.Api
    abstract: true
    base: Web.Http.ApiController
  - name: Orders
    namespace: Shop.Api
    base: Shop.Api.BaseController
  - name: Helper
    namespace: Shop.Api
    exported: false
"#;

    #[test]
    fn test_load_and_link() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "Web.Http.module", WEB);
        let app = write(temp_dir.path(), "Shop.Api.module", APP);

        let loader = ModuleLoader::new(temp_dir.path());
        let module = loader.load(&app).unwrap();

        assert_eq!(module.name(), "Shop.Api");
        assert_eq!(module.dependencies().len(), 1);
        assert_eq!(module.types().len(), 3);
        assert_eq!(module.exported_types().count(), 2);
        assert!(module.find_type("Web.Http.ApiController").is_some());
    }

    #[test]
    fn test_ancestors_and_interfaces_are_transitive() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "Web.Http.module", WEB);
        let app = write(temp_dir.path(), "Shop.Api.module", APP);

        let module = ModuleLoader::new(temp_dir.path()).load(&app).unwrap();
        let orders = module.find_type("Shop.Api.Orders").unwrap();

        assert_eq!(
            module.ancestors(orders),
            vec![
                "Shop.Api.BaseController".to_string(),
                "Web.Http.ApiController".to_string()
            ]
        );
        assert_eq!(
            module.implemented_interfaces(orders),
            vec!["Web.Http.IHttpController".to_string()]
        );
    }

    #[test]
    fn test_unresolved_base_is_reported_by_name() {
        let module = LoadedModule::new(
            PathBuf::from("m.module"),
            ModuleMetadata::decode("name: M\ntypes:\n  - name: A\n    base: Ext.Controller\n").unwrap(),
            Vec::new(),
        );
        let a = &module.types()[0];
        assert_eq!(module.ancestors(a), vec!["Ext.Controller".to_string()]);
    }

    #[test]
    fn test_inheritance_cycle_terminates() {
        let yaml = "name: M\ntypes:\n  - name: A\n    base: B\n    interfaces: [I]\n  - name: B\n    base: A\n  - name: I\n    kind: interface\n    interfaces: [I]\n";
        let module = LoadedModule::new(
            PathBuf::from("m.module"),
            ModuleMetadata::decode(yaml).unwrap(),
            Vec::new(),
        );
        let a = module.find_type("A").unwrap();
        assert_eq!(module.ancestors(a), vec!["B".to_string()]);
        assert_eq!(module.implemented_interfaces(a), vec!["I".to_string()]);
    }

    #[test]
    fn test_missing_module_is_configuration_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let err = ModuleLoader::new(temp_dir.path())
            .load(&temp_dir.path().join("missing.bin"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ConfigurationNotFound { what: MissingFile::Module, .. }
        ));
    }

    #[test]
    fn test_corrupt_module_is_load_failure() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.bin");
        fs::write(&path, [0x4d, 0x5a, 0x90, 0x00, 0xff, 0xfe]).unwrap();

        let err = ModuleLoader::new(temp_dir.path()).load(&path).unwrap_err();
        match err {
            Error::ModuleLoadFailure { path: p, .. } => assert_eq!(p, path),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_dependency_is_load_failure() {
        let temp_dir = TempDir::new().unwrap();
        let app = write(temp_dir.path(), "Shop.Api.module", APP);

        let err = ModuleLoader::new(temp_dir.path()).load(&app).unwrap_err();
        match err {
            Error::ModuleLoadFailure { message, .. } => {
                assert!(message.contains("'Web.Http'"), "{}", message);
                assert!(message.contains("'Shop.Api'"), "{}", message);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_dependency_found_through_reference_path() {
        let temp_dir = TempDir::new().unwrap();
        let app_dir = temp_dir.path().join("app");
        let refs = temp_dir.path().join("packages");
        write(&refs, "web/lib/Web.Http.yaml", WEB);
        let app = write(&app_dir, "Shop.Api.module", APP);

        let mut loader = ModuleLoader::new(&app_dir);
        loader.register_reference_paths(&[refs]);
        let module = loader.load(&app).unwrap();
        assert_eq!(module.dependencies()[0].name, "Web.Http");
    }

    #[test]
    fn test_dependency_name_mismatch_is_load_failure() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "Web.Http.module", "name: Web.Http.Legacy\n");
        let app = write(temp_dir.path(), "Shop.Api.module", APP);

        let err = ModuleLoader::new(temp_dir.path()).load(&app).unwrap_err();
        assert!(matches!(err, Error::ModuleLoadFailure { .. }));
    }

    #[test]
    fn test_reference_cycle_links_once() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "A.module", "name: A\nreferences: [B]\n");
        write(temp_dir.path(), "B.module", "name: B\nreferences: [A, C]\n");
        write(temp_dir.path(), "C.module", "name: C\nreferences: [B]\n");

        let module = ModuleLoader::new(temp_dir.path())
            .load(&temp_dir.path().join("A.module"))
            .unwrap();
        let names: Vec<_> = module.dependencies().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["B", "C"]);
    }
}
