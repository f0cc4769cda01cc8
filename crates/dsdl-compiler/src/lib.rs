//! Type builder, resolver and constant-expression evaluator for the DSDL
//! schema language. `dsdl-parser` turns one file into a statement stream
//! with no notion of types or cross-file references; this crate drives that
//! stream through a builder, resolving composite references through a
//! caller-supplied library of peer definitions, to produce one fully typed,
//! immutable [`CompoundType`].
//!
//! The only I/O this crate performs is reading a source file on demand,
//! through the [`SourceProvider`] the caller supplies — everything else
//! (walking a directory tree, diagnostics formatting, code generation) is
//! the caller's concern.

mod bit_length_set;
mod builder;
mod compound;
mod data_type;
mod error;
mod evaluator;
mod port_id;
mod resolver;
mod value;

use std::fs;
use std::path::Path;

use dsdl_parser::DefinitionDescriptor;

pub use compound::{Attribute, CommonInfo, CompoundType};
pub use data_type::{CastMode, DataType};
pub use error::{ErrorKind, FrontendError};
pub use triomphe::Arc;
pub use value::{Value, ValueSet};

/// Reads a source file by path. The only I/O surface of this crate; a host
/// embedding it in, say, an editor or a build tool can serve from an
/// in-memory overlay instead of the real filesystem.
pub trait SourceProvider {
    fn read_source(&self, path: &Path) -> std::io::Result<String>;
}

/// A [`SourceProvider`] backed directly by [`std::fs`].
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSourceProvider;

impl SourceProvider for FsSourceProvider {
    fn read_source(&self, path: &Path) -> std::io::Result<String> {
        fs::read_to_string(path)
    }
}

/// Invoked by the `print` directive as `(definition, line_number, value-or-none)`,
/// `spec.md` §6.
pub type PrintOutputHandler<'a> = Box<dyn Fn(&DefinitionDescriptor, u32, Option<&Value>) + 'a>;

/// Caller-supplied knobs, `spec.md` §6.
#[derive(Default)]
pub struct ConfigurationOptions<'a> {
    pub print_handler: Option<PrintOutputHandler<'a>>,
    pub allow_unregulated_fixed_port_id: bool,
    pub skip_assertion_checks: bool,
}

/// Parses `target`, resolving composite references against `lookup` (which
/// should include `target` itself; the resolver excludes it before
/// recursing). `spec.md` §4.5, §6.
///
/// Returns an `Arc`, not an owned `CompoundType`: every composite reference
/// reached while resolving `target` is itself handed back wrapped the same
/// way (see [`DataType::Composite`]), so returning by value here would force
/// a deep clone for no reason — the whole point of the immutable-output
/// design in `spec.md` §3's lifecycle section is that a `CompoundType` is
/// shared, never copied.
pub fn parse_definition(
    target: &DefinitionDescriptor,
    lookup: &[DefinitionDescriptor],
    source_provider: &dyn SourceProvider,
    options: &ConfigurationOptions,
) -> Result<Arc<CompoundType>, FrontendError> {
    let resolver = resolver::Resolver::new(source_provider, options);
    resolver.parse(target, lookup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    struct MapSourceProvider(HashMap<PathBuf, String>);

    impl SourceProvider for MapSourceProvider {
        fn read_source(&self, path: &Path) -> std::io::Result<String> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "missing source"))
        }
    }

    fn descriptor(full_name: &str, version: (u16, u16), fixed_port_id: Option<u16>, path: &str) -> DefinitionDescriptor {
        let full_namespace = full_name.rsplit_once('.').map(|(ns, _)| ns.to_string()).unwrap_or_default();
        let short_name = full_name.rsplit('.').next().unwrap().to_string();
        DefinitionDescriptor {
            path: PathBuf::from(path),
            short_name,
            full_namespace,
            full_name: full_name.to_string(),
            version,
            fixed_port_id,
            root_namespace: full_name.split('.').next().unwrap().to_string(),
        }
    }

    #[test]
    fn empty_message_with_fixed_port_id_has_zero_bit_length() {
        let target = descriptor("uavcan.test.Message", (1, 2), Some(65000), "uavcan/test/65000.Message.1.2.uavcan");
        let mut sources = HashMap::new();
        sources.insert(target.path.clone(), "# empty\n".to_string());
        let provider = MapSourceProvider(sources);
        let options = ConfigurationOptions::default();

        let compound = parse_definition(&target, &[target.clone()], &provider, &options).unwrap();
        assert_eq!(compound.full_name(), "uavcan.test.Message");
        assert_eq!(compound.version(), (1, 2));
        assert_eq!(compound.fixed_port_id(), Some(65000));
        assert_eq!(compound.bit_length_set().min(), 0);
        assert_eq!(compound.bit_length_set().max(), 0);
    }

    #[test]
    fn rejects_tagged_union_with_one_variant() {
        let target = descriptor("vendor.OneVariant", (1, 0), None, "vendor/OneVariant.1.0.uavcan");
        let mut sources = HashMap::new();
        sources.insert(target.path.clone(), "@union\nuint2 value\n".to_string());
        let provider = MapSourceProvider(sources);
        let options = ConfigurationOptions::default();

        let err = parse_definition(&target, &[target.clone()], &provider, &options).unwrap_err();
        assert!(err.to_string().contains("tagged union cannot contain less than"));
    }

    #[test]
    fn rejects_unregulated_fixed_port_id_by_default() {
        let target = descriptor("vendor.Unregulated", (1, 0), Some(10000), "vendor/10000.Unregulated.1.0.uavcan");
        let mut sources = HashMap::new();
        sources.insert(target.path.clone(), "# empty\n".to_string());
        let provider = MapSourceProvider(sources);
        let options = ConfigurationOptions::default();

        let err = parse_definition(&target, &[target.clone()], &provider, &options).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidFixedPortId(_)));
    }

    #[test]
    fn allow_unregulated_fixed_port_id_opts_out_of_the_range_check() {
        let target = descriptor("vendor.Unregulated", (1, 0), Some(10000), "vendor/10000.Unregulated.1.0.uavcan");
        let mut sources = HashMap::new();
        sources.insert(target.path.clone(), "# empty\n".to_string());
        let provider = MapSourceProvider(sources);
        let options = ConfigurationOptions { allow_unregulated_fixed_port_id: true, ..Default::default() };

        let compound = parse_definition(&target, &[target.clone()], &provider, &options).unwrap();
        assert_eq!(compound.fixed_port_id(), Some(10000));
    }

    #[test]
    fn bool_constant_rejects_non_boolean_value() {
        let target = descriptor("vendor.BadBool", (1, 0), None, "vendor/BadBool.1.0.uavcan");
        let mut sources = HashMap::new();
        sources.insert(target.path.clone(), "bool BOOLEAN = 0\n".to_string());
        let provider = MapSourceProvider(sources);
        let options = ConfigurationOptions::default();

        let err = parse_definition(&target, &[target.clone()], &provider, &options).unwrap_err();
        assert!(err.to_string().contains("invalid value for boolean constant"));
    }

    #[test]
    fn uint10_constant_out_of_range_is_rejected() {
        let target = descriptor("vendor.BadRange", (1, 0), None, "vendor/BadRange.1.0.uavcan");
        let mut sources = HashMap::new();
        sources.insert(target.path.clone(), "uint10 INTEGRAL = 2000\n".to_string());
        let provider = MapSourceProvider(sources);
        let options = ConfigurationOptions::default();

        let err = parse_definition(&target, &[target.clone()], &provider, &options).unwrap_err();
        assert!(err.to_string().contains("exceeds the range"));
    }

    #[test]
    fn non_ascii_character_literal_on_uint8_is_rejected() {
        let target = descriptor("vendor.BadChar", (1, 0), None, "vendor/BadChar.1.0.uavcan");
        let mut sources = HashMap::new();
        sources.insert(target.path.clone(), "uint8 CH = '\u{0451}'\n".to_string());
        let provider = MapSourceProvider(sources);
        let options = ConfigurationOptions::default();

        let err = parse_definition(&target, &[target.clone()], &provider, &options).unwrap_err();
        assert!(err.to_string().contains("character"));
    }

    #[test]
    fn duplicated_service_response_marker_is_rejected() {
        let target = descriptor("vendor.DoubleMarker", (1, 0), None, "vendor/DoubleMarker.1.0.uavcan");
        let mut sources = HashMap::new();
        sources.insert(target.path.clone(), "uint8 a\n---\nuint8 b\n---\nuint8 c\n".to_string());
        let provider = MapSourceProvider(sources);
        let options = ConfigurationOptions::default();

        let err = parse_definition(&target, &[target.clone()], &provider, &options).unwrap_err();
        assert!(err.to_string().contains("service response marker"));
    }

    #[test]
    fn service_synthesises_request_and_response_names() {
        let target = descriptor("vendor.Svc", (1, 0), None, "vendor/Svc.1.0.uavcan");
        let mut sources = HashMap::new();
        sources.insert(
            target.path.clone(),
            "@union\nuint2 a\nuint2 b\n---\nuint8 status\n".to_string(),
        );
        let provider = MapSourceProvider(sources);
        let options = ConfigurationOptions::default();

        let compound = parse_definition(&target, &[target.clone()], &provider, &options).unwrap();
        let request = compound.request_type().unwrap();
        let response = compound.response_type().unwrap();
        assert_eq!(request.full_name(), "vendor.Svc.Request");
        assert_eq!(response.full_name(), "vendor.Svc.Response");
        assert_eq!(compound.bit_length_set().min(), 0);
        assert_eq!(compound.bit_length_set().max(), 0);
    }

    #[test]
    fn assert_directive_on_offset_matches_spec_example() {
        let target = descriptor("vendor.Asserted", (1, 0), None, "vendor/Asserted.1.0.uavcan");
        let mut sources = HashMap::new();
        sources.insert(
            target.path.clone(),
            "uint8 a\n@assert _offset_ % 8 == {0}\n".to_string(),
        );
        let provider = MapSourceProvider(sources);
        let options = ConfigurationOptions::default();

        assert!(parse_definition(&target, &[target.clone()], &provider, &options).is_ok());
    }

    #[test]
    fn assert_directive_fails_when_offset_not_byte_aligned() {
        let target = descriptor("vendor.Unaligned", (1, 0), None, "vendor/Unaligned.1.0.uavcan");
        let mut sources = HashMap::new();
        sources.insert(
            target.path.clone(),
            "uint7 a\n@assert _offset_ % 8 == {0}\n".to_string(),
        );
        let provider = MapSourceProvider(sources);
        let options = ConfigurationOptions::default();

        let err = parse_definition(&target, &[target.clone()], &provider, &options).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::AssertionCheckFailure(_)));
    }
}
