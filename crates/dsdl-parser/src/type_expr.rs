//! Syntax of a type expression: `[cast-mode] base [array-suffix]`, where
//! `base` is either a primitive keyword or a versioned composite reference.
//! `spec.md` §4.2. No knowledge of which primitive names or widths are
//! actually valid lives here; that is `dsdl-compiler::data_type`'s job.

use crate::error::DsdlSyntaxError;
use crate::lexer::{Lexer, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastModeKeyword {
    Saturated,
    Truncated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExprBase {
    /// A bare primitive keyword, e.g. `bool`, `uint8`, `void3`. Unvalidated.
    Primitive(String),
    /// `a.b.C.<major>[.<minor>]`, already split into name and version.
    Composite {
        name: String,
        major: u8,
        minor: Option<u8>,
    },
}

/// The normalized array bound: `[<N]` is folded into `[<=N-1]` at parse time,
/// per `spec.md` §4.2, so downstream code only ever sees one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArraySuffix {
    Fixed(u64),
    VariableInclusiveMax(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeExpr {
    pub cast_mode: Option<CastModeKeyword>,
    pub base: TypeExprBase,
    pub array: Option<ArraySuffix>,
}

pub fn parse_type_expr(source: &str) -> Result<TypeExpr, DsdlSyntaxError> {
    let tokens = Lexer::new(source).tokenize()?;
    let (expr, consumed) = parse_type_expr_prefix(&tokens)?;
    if consumed != tokens.len() {
        return Err(DsdlSyntaxError::new(format!(
            "unexpected trailing content in type expression: {source:?}"
        )));
    }
    Ok(expr)
}

/// Parses as much of a type expression as the token stream allows and
/// reports how many tokens were consumed, leaving the rest (an attribute
/// name, `=`, value expression, ...) for the statement-level parser.
pub(crate) fn parse_type_expr_prefix(
    tokens: &[Token],
) -> Result<(TypeExpr, usize), DsdlSyntaxError> {
    let mut p = TypeExprParser { tokens, pos: 0 };
    let expr = p.parse()?;
    Ok((expr, p.pos))
}

struct TypeExprParser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> TypeExprParser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> &Token {
        let t = &self.tokens[self.pos];
        self.pos += 1;
        t
    }

    fn parse(&mut self) -> Result<TypeExpr, DsdlSyntaxError> {
        let cast_mode = self.parse_cast_mode();
        let base = self.parse_base()?;
        let array = self.parse_array_suffix()?;
        Ok(TypeExpr { cast_mode, base, array })
    }

    fn parse_cast_mode(&mut self) -> Option<CastModeKeyword> {
        let is_cast = matches!(
            self.peek(),
            Some(Token { kind: TokenKind::Ident, text, .. }) if text == "saturated" || text == "truncated"
        );
        if !is_cast {
            return None;
        }
        let token = self.bump();
        Some(match token.text.as_str() {
            "saturated" => CastModeKeyword::Saturated,
            _ => CastModeKeyword::Truncated,
        })
    }

    fn parse_base(&mut self) -> Result<TypeExprBase, DsdlSyntaxError> {
        let first = self
            .peek()
            .cloned()
            .ok_or_else(|| DsdlSyntaxError::new("expected a type name"))?;
        if first.kind != TokenKind::Ident {
            return Err(DsdlSyntaxError::new(format!(
                "expected a type name, found {:?}",
                first.text
            )));
        }
        self.bump();

        if self.peek().map(|t| t.kind) != Some(TokenKind::Dot) {
            return Ok(TypeExprBase::Primitive(first.text));
        }

        // Composite reference: a dotted chain ending in 1 or 2 numeric segments.
        let mut segments: Vec<(String, TokenKind)> = vec![(first.text, TokenKind::Ident)];
        while self.peek().map(|t| t.kind) == Some(TokenKind::Dot) {
            self.bump();
            let seg = self
                .peek()
                .cloned()
                .ok_or_else(|| DsdlSyntaxError::new("expected a path segment after '.'"))?;
            if seg.kind != TokenKind::Ident && seg.kind != TokenKind::Integer {
                return Err(DsdlSyntaxError::new(format!(
                    "unexpected path segment {:?}",
                    seg.text
                )));
            }
            self.bump();
            segments.push((seg.text, seg.kind));
        }

        let n = segments.len();
        let (name_end, major, minor) = if n >= 2
            && segments[n - 1].1 == TokenKind::Integer
            && segments[n - 2].1 == TokenKind::Integer
        {
            (n - 2, parse_u8(&segments[n - 2].0)?, Some(parse_u8(&segments[n - 1].0)?))
        } else if n >= 1 && segments[n - 1].1 == TokenKind::Integer {
            (n - 1, parse_u8(&segments[n - 1].0)?, None)
        } else {
            return Err(DsdlSyntaxError::new(
                "composite type reference is missing a version number",
            ));
        };

        if name_end == 0 {
            return Err(DsdlSyntaxError::new(
                "composite type reference is missing a name",
            ));
        }
        let name = segments[..name_end]
            .iter()
            .map(|(s, _)| s.as_str())
            .collect::<Vec<_>>()
            .join(".");

        Ok(TypeExprBase::Composite { name, major, minor })
    }

    fn parse_array_suffix(&mut self) -> Result<Option<ArraySuffix>, DsdlSyntaxError> {
        if self.peek().map(|t| t.kind) != Some(TokenKind::LBracket) {
            return Ok(None);
        }
        self.bump();

        let suffix = if self.peek().map(|t| t.kind) == Some(TokenKind::Le) {
            self.bump();
            let n = self.expect_integer()?;
            ArraySuffix::VariableInclusiveMax(n)
        } else if self.peek().map(|t| t.kind) == Some(TokenKind::Lt) {
            self.bump();
            let n = self.expect_integer()?;
            let m = n.checked_sub(1).ok_or_else(|| {
                DsdlSyntaxError::new("array bound '[<0]' has no valid maximum capacity")
            })?;
            ArraySuffix::VariableInclusiveMax(m)
        } else {
            let n = self.expect_integer()?;
            ArraySuffix::Fixed(n)
        };

        if self.peek().map(|t| t.kind) != Some(TokenKind::RBracket) {
            return Err(DsdlSyntaxError::new("expected closing ']' in array suffix"));
        }
        self.bump();
        Ok(Some(suffix))
    }

    fn expect_integer(&mut self) -> Result<u64, DsdlSyntaxError> {
        let token = self
            .peek()
            .cloned()
            .ok_or_else(|| DsdlSyntaxError::new("expected an array size"))?;
        if token.kind != TokenKind::Integer {
            return Err(DsdlSyntaxError::new(format!(
                "expected an array size, found {:?}",
                token.text
            )));
        }
        self.bump();
        token
            .text
            .parse::<u64>()
            .map_err(|_| DsdlSyntaxError::new(format!("invalid array size {:?}", token.text)))
    }
}

fn parse_u8(text: &str) -> Result<u8, DsdlSyntaxError> {
    text.parse::<u16>()
        .ok()
        .filter(|&v| v <= 255)
        .map(|v| v as u8)
        .ok_or_else(|| DsdlSyntaxError::new(format!("{text:?} is out of range [0, 255]")))
}
