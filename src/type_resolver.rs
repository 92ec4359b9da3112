use crate::error::{Error, Result};
use crate::module::metadata::TypeDef;
use crate::module::LoadedModule;
use log::{debug, warn};
use std::collections::HashSet;

/// Type resolver - maps requested entry-point names to types of a loaded module
pub struct TypeResolver<'m> {
    module: &'m LoadedModule,
}

impl<'m> TypeResolver<'m> {
    pub fn new(module: &'m LoadedModule) -> Self {
        Self { module }
    }

    /// Resolve a single entry-point name.
    ///
    /// The name is compared against both qualified and short names and must
    /// match exactly one type. Repeated definitions of the same qualified name
    /// count once, the first one wins.
    pub fn resolve_one(&self, name: &str) -> Result<&'m TypeDef> {
        debug!("Resolving entry point: {}", name);
        let module: &'m LoadedModule = self.module;

        let mut seen = HashSet::new();
        let matches: Vec<&'m TypeDef> = module
            .types()
            .iter()
            .filter(|t| t.name == name || t.full_name() == name)
            .filter(|t| seen.insert(t.full_name()))
            .collect();

        match matches.as_slice() {
            [] => {
                warn!("No type matches entry point: {}", name);
                Err(Error::EntryPointNotFound {
                    name: name.to_string(),
                })
            }
            [single] => Ok(*single),
            many => {
                let candidates: Vec<String> = many.iter().map(|t| t.full_name()).collect();
                warn!("Entry point {} is ambiguous: {:?}", name, candidates);
                Err(Error::AmbiguousEntryPoint {
                    name: name.to_string(),
                    candidates,
                })
            }
        }
    }

    /// Resolve every requested name, stopping at the first one that fails.
    ///
    /// Names that resolve to a type already in the result are dropped, so the
    /// result holds each type once in first-request order.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&'m TypeDef>> {
        let mut resolved = Vec::with_capacity(names.len());
        let mut seen = HashSet::new();

        for name in names {
            let ty = self.resolve_one(name.as_ref())?;
            if seen.insert(ty.full_name()) {
                resolved.push(ty);
            } else {
                debug!("Entry point {} already resolved", name.as_ref());
            }
        }

        debug!("Resolved {} entry points", resolved.len());
        Ok(resolved)
    }
}
