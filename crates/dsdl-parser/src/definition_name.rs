use std::path::{Path, PathBuf};

use crate::error::FileNameFormatError;

/// Everything the front-end needs to know about one schema file before it has
/// been opened: its identity, not its contents. Built once per file by
/// [`decode_definition_name`] and then handed around by reference (the
/// lookup library the resolver searches is a slice of these).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionDescriptor {
    pub path: PathBuf,
    pub short_name: String,
    pub full_namespace: String,
    pub full_name: String,
    pub version: (u16, u16),
    pub fixed_port_id: Option<u16>,
    pub root_namespace: String,
}

/// Decodes `[<port>.]<ShortName>.<major>.<minor>.uavcan` plus the directory
/// path leading to it, per `spec.md` §4.1.
///
/// `root_dir` is the directory that contains the root namespace directory;
/// `path` must be nested under it. The root namespace is `path`'s first
/// path component below `root_dir`.
pub fn decode_definition_name(
    path: &Path,
    root_dir: &Path,
) -> Result<DefinitionDescriptor, FileNameFormatError> {
    let relative = path.strip_prefix(root_dir).map_err(|_| {
        FileNameFormatError::new(format!(
            "{} is not nested under root directory {}",
            path.display(),
            root_dir.display()
        ))
    })?;

    let mut components: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if components.is_empty() {
        return Err(FileNameFormatError::new("empty file path"));
    }
    let file_name = components.pop().unwrap();
    let root_namespace = components
        .first()
        .cloned()
        .ok_or_else(|| FileNameFormatError::new("file is not inside any namespace directory"))?;
    let full_namespace = components.join(".");

    let (short_name, version, fixed_port_id) = decode_file_name(&file_name)?;
    let full_name = format!("{full_namespace}.{short_name}");

    Ok(DefinitionDescriptor {
        path: path.to_path_buf(),
        short_name,
        full_namespace,
        full_name,
        version,
        fixed_port_id,
        root_namespace,
    })
}

fn decode_file_name(
    file_name: &str,
) -> Result<(String, (u16, u16), Option<u16>), FileNameFormatError> {
    let basename = file_name.strip_suffix(".uavcan").ok_or_else(|| {
        FileNameFormatError::new(format!("{file_name:?} does not end in .uavcan"))
    })?;

    let parts: Vec<&str> = basename.split('.').collect();
    if parts.len() < 3 || parts.len() > 4 {
        return Err(FileNameFormatError::new(format!(
            "expected [<port>.]<ShortName>.<major>.<minor>, found {basename:?}"
        )));
    }

    let minor = parse_version_component(parts[parts.len() - 1])?;
    let major = parse_version_component(parts[parts.len() - 2])?;

    let (name_part, fixed_port_id) = if parts.len() == 4 {
        (parts[1], Some(parse_port_id(parts[0])?))
    } else {
        (parts[0], None)
    };

    validate_short_name(name_part)?;

    Ok((name_part.to_string(), (major, minor), fixed_port_id))
}

/// Accepts any non-negative integer literal; the `<= 255` bound on a version
/// component is a semantic property checked at the build stage (`spec.md`
/// §4.1, §4.6), not a file-name-syntax property, so a merely large number
/// here is not malformed — only a non-digit or empty component is.
fn parse_version_component(text: &str) -> Result<u16, FileNameFormatError> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FileNameFormatError::new(format!(
            "{text:?} is not a valid version number component"
        )));
    }
    text.parse::<u16>()
        .map_err(|_| FileNameFormatError::new(format!("{text:?} is not a valid version number component")))
}

fn parse_port_id(text: &str) -> Result<u16, FileNameFormatError> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FileNameFormatError::new(format!(
            "{text:?} is not a valid fixed port-ID"
        )));
    }
    text.parse::<u32>()
        .ok()
        .filter(|&v| v <= 65535)
        .map(|v| v as u16)
        .ok_or_else(|| FileNameFormatError::new(format!("{text:?} is out of range [0, 65535]")))
}

fn validate_short_name(name: &str) -> Result<(), FileNameFormatError> {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => {
            return Err(FileNameFormatError::new(format!(
                "short name {name:?} must start with a letter"
            )))
        }
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(FileNameFormatError::new(format!(
            "short name {name:?} must consist of letters, digits and underscores"
        )));
    }
    Ok(())
}
