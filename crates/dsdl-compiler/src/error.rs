//! The error taxonomy of `spec.md` §7, flattened into one `kind` enum in the
//! style of the teacher's `DiagnosticData` (one `thiserror` variant per
//! diagnostic, `#[error("...")]` carrying the message) rather than a deep
//! class hierarchy — see "Sum types over dynamic dispatch" in `spec.md` §9.
//!
//! `(path, line)` are filled in exactly once, at the first `parse_definition`
//! boundary the error crosses where they are still unset, mirroring
//! `set_error_location_if_unknown` in the original implementation.

use std::fmt;
use std::path::PathBuf;

use dsdl_parser::{DsdlSyntaxError, FileNameFormatError};

/// The top-level error of this crate. Carries an optional source location;
/// `kind` says which leaf diagnostic fired.
#[derive(Debug, Clone)]
pub struct FrontendError {
    pub path: Option<PathBuf>,
    pub line: Option<u32>,
    pub kind: ErrorKind,
}

impl fmt::Display for FrontendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_with_location())
    }
}

impl std::error::Error for FrontendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl FrontendError {
    pub fn new(kind: ErrorKind) -> Self {
        Self { path: None, line: None, kind }
    }

    pub fn at_line(kind: ErrorKind, line: u32) -> Self {
        Self { path: None, line: Some(line), kind }
    }

    /// Fills in `path`/`line` only if not already set, per §7's propagation
    /// policy: the *innermost* location wins.
    pub fn stamp_location_if_unknown(mut self, path: &std::path::Path, line: Option<u32>) -> Self {
        if self.path.is_none() {
            self.path = Some(path.to_path_buf());
        }
        if self.line.is_none() {
            self.line = line;
        }
        self
    }

    /// `true` for `InternalError`: an invariant broken inside the front-end
    /// rather than a malformed input.
    pub fn is_internal(&self) -> bool {
        matches!(self.kind, ErrorKind::Internal(_))
    }

    fn display_with_location(&self) -> String {
        match (&self.path, self.line) {
            (Some(path), Some(line)) => format!("{}:{line}: {}", path.display(), self.kind),
            (Some(path), None) => format!("{}: {}", path.display(), self.kind),
            (None, Some(line)) => format!("line {line}: {}", self.kind),
            (None, None) => self.kind.to_string(),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// `DSDLSyntaxError`.
    #[error("syntax error: {0}")]
    DsdlSyntax(String),
    /// `FileNameFormatError`.
    #[error("malformed file name: {0}")]
    FileNameFormat(String),
    /// `UndefinedDataTypeError`.
    #[error("undefined data type: {0}")]
    UndefinedDataType(String),
    /// `UndefinedIdentifierError`.
    #[error("undefined identifier: {0}")]
    UndefinedIdentifier(String),
    /// `AssertionCheckFailureError`.
    #[error("assertion check failed: {0}")]
    AssertionCheckFailure(String),
    /// `InvalidDirectiveUsageError`.
    #[error("invalid directive usage: {0}")]
    InvalidDirectiveUsage(String),
    /// `InvalidOperandError`.
    #[error("invalid operand: {0}")]
    InvalidOperand(String),
    /// `InvalidFixedPortIDError`.
    #[error("invalid fixed port-ID: {0}")]
    InvalidFixedPortId(String),
    /// `TypeParameterError`, folded into `SemanticError` at the
    /// `parse_definition` boundary (see `SPEC_FULL.md` §7).
    #[error("invalid type parameter: {0}")]
    TypeParameter(String),
    /// `AttributeNameCollisionError`.
    #[error("multiple attributes under the same name: {0}")]
    AttributeNameCollision(String),
    /// `InternalError`: an invariant was violated inside the front-end.
    #[error("internal error: {0}")]
    Internal(String),
}

pub(crate) type Result<T> = std::result::Result<T, FrontendError>;

impl From<DsdlSyntaxError> for FrontendError {
    fn from(e: DsdlSyntaxError) -> Self {
        FrontendError { path: None, line: e.line, kind: ErrorKind::DsdlSyntax(e.message) }
    }
}

impl From<FileNameFormatError> for FrontendError {
    fn from(e: FileNameFormatError) -> Self {
        FrontendError::new(ErrorKind::FileNameFormat(e.message))
    }
}
