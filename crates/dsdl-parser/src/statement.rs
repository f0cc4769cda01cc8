//! One line, one statement. `spec.md` §4.2.

use crate::error::DsdlSyntaxError;
use crate::expr::{parse_expr_tokens, Expr};
use crate::lexer::{Lexer, TokenKind};
use crate::type_expr::{parse_type_expr_prefix, TypeExpr};

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Directive {
        line: u32,
        name: String,
        expr: Option<Expr>,
    },
    ServiceResponseMarker {
        line: u32,
    },
    Field {
        line: u32,
        type_expr: TypeExpr,
        name: String,
    },
    PaddingField {
        line: u32,
        bits: u8,
    },
    Constant {
        line: u32,
        type_expr: TypeExpr,
        name: String,
        value_expr: Expr,
        source_expression_text: String,
    },
}

/// Strips a `#`-to-end-of-line comment, honouring string literals so that a
/// `#` inside a quoted string does not start one.
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (idx, c) in line.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '#' => return &line[..idx],
            _ => {}
        }
    }
    line
}

fn is_response_marker(trimmed: &str) -> bool {
    trimmed.len() >= 3 && trimmed.chars().all(|c| c == '-')
}

/// Parses one non-blank, comment-stripped, trimmed line into a [`Statement`].
pub(crate) fn parse_line(raw_line: &str, line_number: u32) -> Result<Option<Statement>, DsdlSyntaxError> {
    let stripped = strip_comment(raw_line);
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    if is_response_marker(trimmed) {
        return Ok(Some(Statement::ServiceResponseMarker { line: line_number }));
    }

    if let Some(rest) = trimmed.strip_prefix('@') {
        return parse_directive(rest, line_number).map(Some);
    }

    parse_attribute(trimmed, line_number).map(Some)
}

fn parse_directive(rest: &str, line_number: u32) -> Result<Statement, DsdlSyntaxError> {
    let name_len = rest
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_alphanumeric() || *c == '_')
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    if name_len == 0 {
        return Err(DsdlSyntaxError::at_line("expected a directive name after '@'", line_number));
    }
    let name = rest[..name_len].to_string();
    let expr_text = rest[name_len..].trim();
    let expr = if expr_text.is_empty() {
        None
    } else {
        Some(
            crate::expr::parse_expr(expr_text)
                .map_err(|e| e.with_line(line_number))?,
        )
    };
    Ok(Statement::Directive {
        line: line_number,
        name,
        expr,
    })
}

fn parse_attribute(trimmed: &str, line_number: u32) -> Result<Statement, DsdlSyntaxError> {
    let tokens = Lexer::new(trimmed)
        .tokenize()
        .map_err(|e| e.with_line(line_number))?;
    if tokens.is_empty() {
        return Err(DsdlSyntaxError::at_line("empty statement", line_number));
    }

    // Bare `voidN`: exactly one token, a primitive-looking identifier.
    if tokens.len() == 1 && tokens[0].kind == TokenKind::Ident {
        if let Some(bits) = parse_void_width(&tokens[0].text) {
            return Ok(Statement::PaddingField { line: line_number, bits });
        }
        return Err(DsdlSyntaxError::at_line(
            format!("a bare type name {:?} is not a valid padding field", tokens[0].text),
            line_number,
        ));
    }

    let (type_expr, consumed) = parse_type_expr_prefix(&tokens).map_err(|e| e.with_line(line_number))?;
    let rest = &tokens[consumed..];
    let name_token = rest.first().ok_or_else(|| {
        DsdlSyntaxError::at_line("expected an attribute name after the type", line_number)
    })?;

    match name_token.kind {
        TokenKind::Ident if name_token.text.starts_with(|c: char| c.is_ascii_lowercase()) => {
            if rest.len() != 1 {
                return Err(DsdlSyntaxError::at_line(
                    "unexpected tokens after field name",
                    line_number,
                ));
            }
            Ok(Statement::Field {
                line: line_number,
                type_expr,
                name: name_token.text.clone(),
            })
        }
        TokenKind::UpperIdent => {
            let assign = rest.get(1).ok_or_else(|| {
                DsdlSyntaxError::at_line("expected '=' after constant name", line_number)
            })?;
            if assign.kind != TokenKind::Assign {
                return Err(DsdlSyntaxError::at_line(
                    "expected '=' after constant name",
                    line_number,
                ));
            }
            let value_tokens = &rest[2..];
            if value_tokens.is_empty() {
                return Err(DsdlSyntaxError::at_line(
                    "expected a value expression after '='",
                    line_number,
                ));
            }
            let value_expr =
                parse_expr_tokens(value_tokens).map_err(|e| e.with_line(line_number))?;
            let source_expression_text = trimmed[value_tokens[0].offset..].trim().to_string();
            Ok(Statement::Constant {
                line: line_number,
                type_expr,
                name: name_token.text.clone(),
                value_expr,
                source_expression_text,
            })
        }
        _ => Err(DsdlSyntaxError::at_line(
            format!("expected an attribute name, found {:?}", name_token.text),
            line_number,
        )),
    }
}

fn parse_void_width(text: &str) -> Option<u8> {
    let digits = text.strip_prefix("void")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: u32 = digits.parse().ok()?;
    if (1..=64).contains(&n) {
        Some(n as u8)
    } else {
        None
    }
}
