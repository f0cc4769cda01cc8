//! Cross-file resolution of composite type references, `spec.md` §4.5.
//!
//! The resolver is the only piece that touches the lookup library and the
//! recursion machinery; the builder only ever sees it through
//! [`CompositeLookup`]. Mirrors `parse_definition`/`resolve_versioned_data_type`
//! in the original implementation: self-exclusion re-applied at every
//! recursion level, plus memoisation keyed by `(full_name, version)`.

use std::cell::RefCell;
use std::collections::HashMap;

use triomphe::Arc;

use dsdl_parser::{parse_statements, DefinitionDescriptor};

use crate::builder::{self, CompositeLookup};
use crate::compound::CompoundType;
use crate::error::{ErrorKind, FrontendError};
use crate::port_id;
use crate::{ConfigurationOptions, SourceProvider};

type Key = (String, (u16, u16));

pub(crate) struct Resolver<'a> {
    source_provider: &'a dyn SourceProvider,
    options: &'a ConfigurationOptions<'a>,
    memo: RefCell<HashMap<Key, Arc<CompoundType>>>,
    in_progress: RefCell<Vec<Key>>,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(source_provider: &'a dyn SourceProvider, options: &'a ConfigurationOptions<'a>) -> Self {
        Resolver {
            source_provider,
            options,
            memo: RefCell::new(HashMap::new()),
            in_progress: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn parse(
        &self,
        target: &DefinitionDescriptor,
        lookup: &[DefinitionDescriptor],
    ) -> Result<Arc<CompoundType>, FrontendError> {
        let key: Key = (target.full_name.clone(), target.version);

        if let Some(existing) = self.memo.borrow().get(&key) {
            return Ok(existing.clone());
        }
        if self.in_progress.borrow().contains(&key) {
            return Err(FrontendError::new(ErrorKind::UndefinedDataType(format!(
                "{} {}.{} refers to itself, directly or through a cycle of peers",
                target.full_name, target.version.0, target.version.1
            )))
            .stamp_location_if_unknown(&target.path, None));
        }
        if let Err(reason) = validate_version(target.version) {
            return Err(FrontendError::new(ErrorKind::TypeParameter(format!(
                "{reason} for {}",
                target.full_name
            )))
            .stamp_location_if_unknown(&target.path, None));
        }

        self.in_progress.borrow_mut().push(key.clone());
        let result = self.parse_uncached(target, lookup);
        self.in_progress.borrow_mut().pop();

        let compound = Arc::new(result?);
        self.memo.borrow_mut().insert(key, compound.clone());
        Ok(compound)
    }

    fn parse_uncached(
        &self,
        target: &DefinitionDescriptor,
        lookup: &[DefinitionDescriptor],
    ) -> Result<CompoundType, FrontendError> {
        tracing::info!(full_name = %target.full_name, major = target.version.0, minor = target.version.1, "parsing definition");

        // Self-exclusion: re-applied at every level, not frozen at the top.
        let narrowed: Vec<DefinitionDescriptor> =
            lookup.iter().filter(|d| *d != target).cloned().collect();

        let source = self.source_provider.read_source(&target.path).map_err(|e| {
            FrontendError::new(ErrorKind::Internal(format!(
                "failed to read {}: {e}",
                target.path.display()
            )))
        })?;
        let statements = parse_statements(&source)
            .map_err(FrontendError::from)
            .map_err(|e| e.stamp_location_if_unknown(&target.path, None))?;

        let scoped = ScopedLookup { resolver: self, lookup: &narrowed };
        let compound = builder::build(target, &statements, &scoped, self.options)
            .map_err(|e| e.stamp_location_if_unknown(&target.path, None))?;

        if !self.options.allow_unregulated_fixed_port_id {
            port_id::validate_fixed_port_id(&compound)
                .map_err(|e| e.stamp_location_if_unknown(&target.path, None))?;
        }

        tracing::info!(full_name = %target.full_name, "finished parsing definition");
        Ok(compound)
    }
}

/// Both halves of `spec.md` §4.6's version check: `(0, 0)` is never valid,
/// and each component must fit in a byte — the latter is a semantic
/// property, not a file-name-syntax one (see `definition_name.rs`'s
/// `parse_version_component`), so it is deferred all the way to here.
fn validate_version(version: (u16, u16)) -> Result<(), String> {
    let (major, minor) = version;
    if major > 255 || minor > 255 {
        return Err(format!("version number {major}.{minor} exceeds the maximum of 255"));
    }
    if version == (0, 0) {
        return Err("version number (0, 0) is not valid".to_string());
    }
    Ok(())
}

struct ScopedLookup<'a> {
    resolver: &'a Resolver<'a>,
    lookup: &'a [DefinitionDescriptor],
}

impl<'a> CompositeLookup for ScopedLookup<'a> {
    fn resolve_composite(
        &self,
        current_namespace: &str,
        name: &str,
        major: u8,
        minor: Option<u8>,
    ) -> Result<Arc<CompoundType>, FrontendError> {
        let full_name = rebase(current_namespace, name);

        let same_name: Vec<&DefinitionDescriptor> =
            self.lookup.iter().filter(|d| d.full_name == full_name).collect();
        let same_major: Vec<&DefinitionDescriptor> =
            same_name.iter().copied().filter(|d| d.version.0 == major as u16).collect();
        if same_major.is_empty() {
            return Err(FrontendError::new(ErrorKind::UndefinedDataType(format!(
                "no suitable major version of {full_name} found (requested major {major})"
            ))));
        }

        let chosen = match minor {
            Some(minor) => {
                let matches: Vec<&&DefinitionDescriptor> =
                    same_major.iter().filter(|d| d.version.1 == minor as u16).collect();
                match matches.as_slice() {
                    [] => {
                        return Err(FrontendError::new(ErrorKind::UndefinedDataType(format!(
                            "no suitable minor version of {full_name}.{major} found (requested minor {minor})"
                        ))))
                    }
                    [one] => **one,
                    _ => {
                        return Err(FrontendError::new(ErrorKind::Internal(format!(
                            "duplicate peer definitions for {full_name}.{major}.{minor}"
                        ))))
                    }
                }
            }
            None => {
                let highest_minor = same_major.iter().map(|d| d.version.1).max().expect("non-empty");
                let matches: Vec<&&DefinitionDescriptor> =
                    same_major.iter().filter(|d| d.version.1 == highest_minor).collect();
                match matches.as_slice() {
                    [one] => **one,
                    _ => {
                        return Err(FrontendError::new(ErrorKind::Internal(format!(
                            "duplicate peer definitions for {full_name}.{major}.{highest_minor}"
                        ))))
                    }
                }
            }
        };

        self.resolver.parse(chosen, self.lookup)
    }
}

/// A composite reference with no dot in its name is relative to the
/// namespace of the file that names it; anything else is already a full
/// dotted name. `spec.md` §4.5.
fn rebase(current_namespace: &str, name: &str) -> String {
    if name.contains('.') {
        name.to_string()
    } else {
        format!("{current_namespace}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    struct StaticSource(HashMap<PathBuf, String>);

    impl SourceProvider for StaticSource {
        fn read_source(&self, path: &Path) -> std::io::Result<String> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no such source"))
        }
    }

    fn descriptor(full_name: &str, version: (u16, u16), path: &str) -> DefinitionDescriptor {
        let full_namespace = full_name.rsplit_once('.').map(|(ns, _)| ns.to_string()).unwrap_or_default();
        let short_name = full_name.rsplit('.').next().unwrap().to_string();
        DefinitionDescriptor {
            path: PathBuf::from(path),
            short_name,
            full_namespace: full_namespace.clone(),
            full_name: full_name.to_string(),
            version,
            fixed_port_id: None,
            root_namespace: full_name.split('.').next().unwrap().to_string(),
        }
    }

    #[test]
    fn selects_highest_minor_when_unspecified() {
        let low = descriptor("vendor.nested.Empty", (255, 254), "vendor/nested/Empty.255.254.uavcan");
        let high = descriptor("vendor.nested.Empty", (255, 255), "vendor/nested/Empty.255.255.uavcan");
        let target = descriptor("vendor.Uses", (1, 0), "vendor/Uses.1.0.uavcan");

        let mut sources = HashMap::new();
        sources.insert(low.path.clone(), "# empty\n".to_string());
        sources.insert(high.path.clone(), "# empty\n".to_string());
        sources.insert(target.path.clone(), "vendor.nested.Empty.255 e\n".to_string());
        let provider = StaticSource(sources);

        let options = ConfigurationOptions::default();
        let resolver = Resolver::new(&provider, &options);
        let lookup = vec![low, high.clone(), target.clone()];

        let compound = resolver.parse(&target, &lookup).unwrap();
        match &compound.attributes()[0] {
            crate::compound::Attribute::Field { data_type, .. } => {
                assert_eq!(data_type.to_string(), "vendor.nested.Empty.255.255");
            }
            _ => panic!("expected a field"),
        }
    }

    #[test]
    fn exact_minor_not_present_is_undefined_data_type() {
        let low = descriptor("vendor.nested.Empty", (255, 254), "vendor/nested/Empty.255.254.uavcan");
        let target = descriptor("vendor.Uses", (1, 0), "vendor/Uses.1.0.uavcan");

        let mut sources = HashMap::new();
        sources.insert(low.path.clone(), "# empty\n".to_string());
        sources.insert(target.path.clone(), "vendor.nested.Empty.255.255 e\n".to_string());
        let provider = StaticSource(sources);

        let options = ConfigurationOptions::default();
        let resolver = Resolver::new(&provider, &options);
        let lookup = vec![low, target.clone()];

        let err = resolver.parse(&target, &lookup).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UndefinedDataType(_)));
    }

    #[test]
    fn rejects_self_reference() {
        let target = descriptor("vendor.Cyclic", (1, 0), "vendor/Cyclic.1.0.uavcan");
        let mut sources = HashMap::new();
        sources.insert(target.path.clone(), "vendor.Cyclic.1 e\n".to_string());
        let provider = StaticSource(sources);

        let options = ConfigurationOptions::default();
        let resolver = Resolver::new(&provider, &options);
        let lookup = vec![target.clone()];

        let err = resolver.parse(&target, &lookup).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UndefinedDataType(_)));
    }

    #[test]
    fn version_zero_dot_zero_is_rejected() {
        let target = descriptor("vendor.ZeroVersion", (0, 0), "vendor/ZeroVersion.0.0.uavcan");
        let mut sources = HashMap::new();
        sources.insert(target.path.clone(), "# empty\n".to_string());
        let provider = StaticSource(sources);

        let options = ConfigurationOptions::default();
        let resolver = Resolver::new(&provider, &options);
        let lookup = vec![target.clone()];

        let err = resolver.parse(&target, &lookup).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::TypeParameter(_)));
        assert!(err.to_string().contains("version number"));
    }

    #[test]
    fn a_version_component_over_255_is_a_semantic_error_not_a_syntax_one() {
        // `definition_name.rs` happily decodes `256` into a `u16`; the
        // `<= 255` bound is enforced here, at the build stage, per
        // `spec.md` §4.6.
        let target = descriptor("vendor.HugeVersion", (256, 0), "vendor/HugeVersion.256.0.uavcan");
        let mut sources = HashMap::new();
        sources.insert(target.path.clone(), "# empty\n".to_string());
        let provider = StaticSource(sources);

        let options = ConfigurationOptions::default();
        let resolver = Resolver::new(&provider, &options);
        let lookup = vec![target.clone()];

        let err = resolver.parse(&target, &lookup).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::TypeParameter(_)));
        assert!(err.to_string().contains("version number"));
    }
}
