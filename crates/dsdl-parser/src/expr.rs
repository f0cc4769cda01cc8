//! Constant-expression syntax: tokens in, an [`Expr`] tree out. No semantics
//! live here — see `dsdl-compiler::evaluator` for the operator matrix this
//! tree is interpreted against.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::Zero;

use crate::error::DsdlSyntaxError;
use crate::lexer::{Lexer, Token, TokenKind};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Rational(BigRational),
    /// A single-quoted character literal, kept distinct from a plain
    /// `Rational` even though it evaluates to the same kind of value: the
    /// constant-coercion rules of `spec.md` §4.4 (only `uint8` accepts one,
    /// and only in the ASCII range) apply only when the *literal itself* was
    /// written as a character, not to an arbitrary rational-valued
    /// expression that happens to evaluate to the same number.
    CharLiteral(BigRational),
    Boolean(bool),
    String(String),
    Identifier(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    BitOr,
    BitAnd,
    BitXor,
    Or,
    And,
}

/// Parses one complete expression out of a line fragment. Returns an error
/// if the fragment is not *exactly* one expression (trailing tokens are a
/// syntax error, matching a line-oriented grammar with no statement
/// separator inside an expression).
pub fn parse_expr(source: &str) -> Result<Expr, DsdlSyntaxError> {
    let tokens = Lexer::new(source).tokenize()?;
    if tokens.is_empty() {
        return Err(DsdlSyntaxError::new("expected an expression"));
    }
    parse_expr_tokens(&tokens)
}

/// Parses a complete expression from an already-lexed token slice (used by
/// the statement parser, which lexes a whole line once and hands sub-slices
/// to both the type-expression and expression parsers).
pub(crate) fn parse_expr_tokens(tokens: &[Token]) -> Result<Expr, DsdlSyntaxError> {
    let mut parser = ExprParser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(DsdlSyntaxError::new(format!(
            "unexpected trailing token {:?}",
            parser.tokens[parser.pos].text
        )));
    }
    Ok(expr)
}

struct ExprParser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> &Token {
        let t = &self.tokens[self.pos];
        self.pos += 1;
        t
    }

    fn eat_kind(&mut self, kind: TokenKind) -> bool {
        if self.peek().map(|t| t.kind) == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr, DsdlSyntaxError> {
        let mut left = self.parse_and()?;
        while self.eat_kind(TokenKind::OrOr) {
            let right = self.parse_and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, DsdlSyntaxError> {
        let mut left = self.parse_comparison()?;
        while self.eat_kind(TokenKind::AndAnd) {
            let right = self.parse_comparison()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, DsdlSyntaxError> {
        let mut left = self.parse_bitwise()?;
        loop {
            let op = match self.peek().map(|t| t.kind) {
                Some(TokenKind::Eq2) => BinaryOp::Eq,
                Some(TokenKind::Ne) => BinaryOp::Ne,
                Some(TokenKind::Lt) => BinaryOp::Lt,
                Some(TokenKind::Gt) => BinaryOp::Gt,
                Some(TokenKind::Le) => BinaryOp::Le,
                Some(TokenKind::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.bump();
            let right = self.parse_bitwise()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_bitwise(&mut self) -> Result<Expr, DsdlSyntaxError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek().map(|t| t.kind) {
                Some(TokenKind::Pipe) => BinaryOp::BitOr,
                Some(TokenKind::Amp) => BinaryOp::BitAnd,
                Some(TokenKind::Caret) => BinaryOp::BitXor,
                _ => break,
            };
            self.bump();
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, DsdlSyntaxError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().map(|t| t.kind) {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.bump();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, DsdlSyntaxError> {
        let mut left = self.parse_power()?;
        loop {
            let op = match self.peek().map(|t| t.kind) {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                Some(TokenKind::SlashSlash) => BinaryOp::IntDiv,
                Some(TokenKind::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.bump();
            let right = self.parse_power()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// `**` is right-associative and binds tighter than unary `+`/`-`/`!`,
    /// matching the precedence table in `spec.md` §4.3 (unary operators are
    /// listed *tighter* than `**`).
    fn parse_power(&mut self) -> Result<Expr, DsdlSyntaxError> {
        let base = self.parse_unary_addsub()?;
        if self.eat_kind(TokenKind::StarStar) {
            let exponent = self.parse_power()?;
            Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)))
        } else {
            Ok(base)
        }
    }

    fn parse_unary_addsub(&mut self) -> Result<Expr, DsdlSyntaxError> {
        let op = match self.peek().map(|t| t.kind) {
            Some(TokenKind::Plus) => Some(UnaryOp::Plus),
            Some(TokenKind::Minus) => Some(UnaryOp::Minus),
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let operand = self.parse_unary_addsub()?;
            Ok(Expr::Unary(op, Box::new(operand)))
        } else {
            self.parse_unary_not()
        }
    }

    fn parse_unary_not(&mut self) -> Result<Expr, DsdlSyntaxError> {
        if self.eat_kind(TokenKind::Bang) {
            let operand = self.parse_unary_not()?;
            Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)))
        } else {
            self.parse_atom()
        }
    }

    fn parse_atom(&mut self) -> Result<Expr, DsdlSyntaxError> {
        let token = self
            .peek()
            .cloned()
            .ok_or_else(|| DsdlSyntaxError::new("unexpected end of expression"))?;
        match token.kind {
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_or()?;
                if !self.eat_kind(TokenKind::RParen) {
                    return Err(DsdlSyntaxError::new("expected closing ')'"));
                }
                Ok(inner)
            }
            TokenKind::Integer => {
                self.bump();
                Ok(Expr::Rational(parse_integer_literal(&token.text)?))
            }
            TokenKind::Real => {
                self.bump();
                Ok(Expr::Rational(parse_real_literal(&token.text)?))
            }
            TokenKind::Char => {
                self.bump();
                let code_point = token
                    .text
                    .chars()
                    .next()
                    .ok_or_else(|| DsdlSyntaxError::new("empty character literal"))?;
                Ok(Expr::CharLiteral(BigRational::from_integer(BigInt::from(
                    code_point as u32,
                ))))
            }
            TokenKind::Str => {
                self.bump();
                Ok(Expr::String(token.text))
            }
            TokenKind::True => {
                self.bump();
                Ok(Expr::Boolean(true))
            }
            TokenKind::False => {
                self.bump();
                Ok(Expr::Boolean(false))
            }
            TokenKind::Ident | TokenKind::UpperIdent => {
                self.bump();
                Ok(Expr::Identifier(token.text))
            }
            _ => Err(DsdlSyntaxError::new(format!(
                "unexpected token {:?} in expression",
                token.text
            ))),
        }
    }
}

fn parse_integer_literal(text: &str) -> Result<BigRational, DsdlSyntaxError> {
    let (radix, digits) = if let Some(rest) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        (16, rest)
    } else if let Some(rest) = text.strip_prefix("0o").or_else(|| text.strip_prefix("0O")) {
        (8, rest)
    } else if let Some(rest) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        (2, rest)
    } else {
        (10, text)
    };
    let value = BigInt::parse_bytes(digits.as_bytes(), radix)
        .ok_or_else(|| DsdlSyntaxError::new(format!("invalid integer literal {text:?}")))?;
    Ok(BigRational::from_integer(value))
}

fn parse_real_literal(text: &str) -> Result<BigRational, DsdlSyntaxError> {
    let (mantissa, exponent) = match text.find(['e', 'E']) {
        Some(idx) => (&text[..idx], Some(&text[idx + 1..])),
        None => (text, None),
    };
    let (int_part, frac_part) = match mantissa.find('.') {
        Some(idx) => (&mantissa[..idx], &mantissa[idx + 1..]),
        None => (mantissa, ""),
    };
    let digits: String = format!("{int_part}{frac_part}");
    let numerator = BigInt::parse_bytes(digits.as_bytes(), 10)
        .ok_or_else(|| DsdlSyntaxError::new(format!("invalid real literal {text:?}")))?;
    let mut value = BigRational::new(numerator, BigInt::from(10u32).pow(frac_part.len() as u32));

    if let Some(exp_text) = exponent {
        let exp: i64 = exp_text
            .parse()
            .map_err(|_| DsdlSyntaxError::new(format!("invalid exponent in {text:?}")))?;
        if exp >= 0 {
            value *= BigRational::from_integer(BigInt::from(10u32).pow(exp as u32));
        } else {
            value /= BigRational::from_integer(BigInt::from(10u32).pow((-exp) as u32));
        }
    }
    if value.is_zero() {
        return Ok(BigRational::zero());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(n: i64) -> BigRational {
        BigRational::from_integer(BigInt::from(n))
    }

    #[test]
    fn parses_precedence() {
        // Multiplication binds tighter than addition.
        assert_eq!(
            parse_expr("1 + 2 * 3").unwrap(),
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Rational(r(1))),
                Box::new(Expr::Binary(
                    BinaryOp::Mul,
                    Box::new(Expr::Rational(r(2))),
                    Box::new(Expr::Rational(r(3)))
                ))
            )
        );
    }

    #[test]
    fn unary_minus_binds_tighter_than_power() {
        // spec.md §4.3: unary +/- is tighter than **, so -2 ** 3 == (-2) ** 3.
        assert_eq!(
            parse_expr("-2 ** 3").unwrap(),
            Expr::Binary(
                BinaryOp::Pow,
                Box::new(Expr::Unary(UnaryOp::Minus, Box::new(Expr::Rational(r(2))))),
                Box::new(Expr::Rational(r(3)))
            )
        );
    }

    #[test]
    fn power_is_right_associative() {
        assert_eq!(
            parse_expr("2 ** 3 ** 2").unwrap(),
            Expr::Binary(
                BinaryOp::Pow,
                Box::new(Expr::Rational(r(2))),
                Box::new(Expr::Binary(
                    BinaryOp::Pow,
                    Box::new(Expr::Rational(r(3))),
                    Box::new(Expr::Rational(r(2)))
                ))
            )
        );
    }

    #[test]
    fn real_literal_is_exact() {
        assert_eq!(parse_expr("1.5").unwrap(), Expr::Rational(BigRational::new(3.into(), 2.into())));
    }

    #[test]
    fn char_literal_is_code_point() {
        assert_eq!(parse_expr("'#'").unwrap(), Expr::CharLiteral(r(35)));
    }

    #[test]
    fn rejects_trailing_tokens() {
        assert!(parse_expr("1 2").is_err());
    }
}
