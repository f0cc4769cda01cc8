//! Lexer and grammar for the DSDL schema language: turns one source file
//! into a stream of [`Statement`]s, with no knowledge of types, cross-file
//! references or expression semantics. See `dsdl-compiler` for those.

mod definition_name;
pub mod error;
pub mod expr;
mod lexer;
mod parser;
pub mod statement;
pub mod type_expr;

pub use definition_name::{decode_definition_name, DefinitionDescriptor};
pub use error::{DsdlSyntaxError, FileNameFormatError};
pub use expr::{parse_expr, BinaryOp, Expr, UnaryOp};
pub use parser::parse_statements;
pub use statement::Statement;
pub use type_expr::{ArraySuffix, CastModeKeyword, TypeExpr, TypeExprBase};
