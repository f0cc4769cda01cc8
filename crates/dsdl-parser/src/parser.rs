use crate::error::DsdlSyntaxError;
use crate::statement::{parse_line, Statement};

/// Parses a whole DSDL source file into its stream of statements, skipping
/// blank lines and comment-only lines. Lines are numbered starting from one.
/// `\r\n` is tolerated; a lone `\r` at end of line is stripped.
pub fn parse_statements(source: &str) -> Result<Vec<Statement>, DsdlSyntaxError> {
    let mut statements = Vec::new();
    for (idx, raw_line) in source.lines().enumerate() {
        let line_number = (idx + 1) as u32;
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        if let Some(statement) = parse_line(line, line_number)? {
            statements.push(statement);
        }
    }
    Ok(statements)
}
