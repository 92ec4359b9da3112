use crate::module::metadata::{short_name, TypeDef};
use crate::module::LoadedModule;
use log::debug;
use std::collections::HashSet;

/// Naming and ancestry markers used to recognise controller types.
#[derive(Debug, Clone)]
pub struct DiscoveryRules {
    /// Short-name suffix that marks an entry point
    pub suffix: String,
    /// Base types or interfaces (short or qualified name) that mark an entry point
    pub ancestor_markers: Vec<String>,
    /// Qualified name of the legacy controller interface that vetoes a match
    pub legacy_interface: String,
}

impl Default for DiscoveryRules {
    fn default() -> Self {
        Self {
            suffix: "Controller".to_string(),
            // Controllers on the newer stack derive from Controller instead of ApiController
            ancestor_markers: vec!["ApiController".to_string(), "Controller".to_string()],
            legacy_interface: "System.Web.Mvc.IController".to_string(),
        }
    }
}

/// Entry-point detector for finding controller types in a loaded module.
///
/// The `EntryPointDetector` works purely on structure: it never needs the web
/// framework itself to be available, only the names of types in the module's
/// ancestry. A type is selected when it is exported, not abstract, and either
///
/// - its short name ends with the controller suffix, or
/// - one of its base types or interfaces is a known controller marker,
///
/// unless it implements the legacy controller interface, which vetoes the match.
pub struct EntryPointDetector {
    rules: DiscoveryRules,
}

/// Why a type was selected as an entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchReason {
    Suffix,
    Ancestry,
}

impl EntryPointDetector {
    pub fn new(rules: DiscoveryRules) -> Self {
        Self { rules }
    }

    /// Returns the qualified names of all entry-point types, in type-table
    /// order and without duplicates.
    ///
    /// A module without exported types yields an empty list.
    pub fn detect(&self, module: &LoadedModule) -> Vec<String> {
        debug!("Detecting entry points in module {}", module.name());

        let mut seen = HashSet::new();
        let names: Vec<String> = module
            .exported_types()
            .filter(|ty| !ty.is_abstract())
            .filter(|ty| self.classify(module, ty).is_some())
            .map(TypeDef::full_name)
            .filter(|name| seen.insert(name.clone()))
            .collect();

        debug!("Detected {} entry points: {:?}", names.len(), names);
        names
    }

    /// Applies the inclusion rules and then the legacy veto to a single type.
    pub fn classify(&self, module: &LoadedModule, ty: &TypeDef) -> Option<MatchReason> {
        let reason = if ty.name.ends_with(&self.rules.suffix) {
            MatchReason::Suffix
        } else if self.has_marker_ancestor(module, ty) {
            MatchReason::Ancestry
        } else {
            return None;
        };

        if self.is_legacy(module, ty) {
            debug!("Skipping legacy controller {}", ty.full_name());
            return None;
        }

        Some(reason)
    }

    fn has_marker_ancestor(&self, module: &LoadedModule, ty: &TypeDef) -> bool {
        module
            .ancestors(ty)
            .into_iter()
            .chain(module.implemented_interfaces(ty))
            .any(|name| self.is_marker(&name))
    }

    fn is_marker(&self, name: &str) -> bool {
        self.rules
            .ancestor_markers
            .iter()
            .any(|marker| marker == name || marker == short_name(name))
    }

    /// Only implemented interfaces are checked; a legacy base class alone does
    /// not veto.
    fn is_legacy(&self, module: &LoadedModule, ty: &TypeDef) -> bool {
        module
            .implemented_interfaces(ty)
            .iter()
            .any(|name| *name == self.rules.legacy_interface)
    }
}

impl Default for EntryPointDetector {
    fn default() -> Self {
        Self::new(DiscoveryRules::default())
    }
}
