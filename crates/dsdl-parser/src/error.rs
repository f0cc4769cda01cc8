use std::error::Error as StdError;
use std::fmt;

/// A grammar-level failure: a line does not match any recognised statement
/// shape, an expression token stream is malformed, or a file name does not
/// match the `[<port>.]<ShortName>.<major>.<minor>.uavcan` pattern.
///
/// `dsdl-compiler` wraps this into its own `SemanticError`/`DsdlSyntaxError`
/// taxonomy and stamps `(path, line)` onto it; this crate only ever knows
/// about the line it is looking at, not the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DsdlSyntaxError {
    pub message: String,
    pub line: Option<u32>,
}

impl DsdlSyntaxError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(message: impl Into<String>, line: u32) -> Self {
        Self {
            message: message.into(),
            line: Some(line),
        }
    }

    pub fn with_line(mut self, line: u32) -> Self {
        if self.line.is_none() {
            self.line = Some(line);
        }
        self
    }
}

impl fmt::Display for DsdlSyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {line}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl StdError for DsdlSyntaxError {}

/// A malformed schema file name. Kept distinct from [`DsdlSyntaxError`]
/// because `spec.md` §7 gives it its own diagnostic kind
/// (`FileNameFormatError`), even though it is raised by the same crate.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("malformed DSDL file name: {message}")]
pub struct FileNameFormatError {
    pub message: String,
}

impl FileNameFormatError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
