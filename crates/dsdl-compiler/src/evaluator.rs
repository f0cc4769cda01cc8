//! The constant-expression operator matrix, `spec.md` §4.3. The AST shape
//! already encodes precedence (`dsdl_parser::expr`); this module only gives
//! each node its semantics.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};

use dsdl_parser::{BinaryOp, Expr, UnaryOp};

use crate::error::{ErrorKind, FrontendError};
use crate::value::{Value, ValueSet};

/// Supplies the value of an identifier the evaluator cannot resolve itself.
/// `spec.md` §4.3: "Identifiers resolve only for a fixed set of top-level
/// names; currently `_offset_`". Implemented by the builder, which is the
/// only thing that knows the accumulator's current bit-length set.
pub trait Environment {
    fn resolve(&self, name: &str) -> Option<Value>;
}

pub fn evaluate(expr: &Expr, env: &dyn Environment) -> Result<Value, FrontendError> {
    match expr {
        Expr::Rational(r) => Ok(Value::Rational(r.clone())),
        Expr::CharLiteral(r) => Ok(Value::Rational(r.clone())),
        Expr::Boolean(b) => Ok(Value::Boolean(*b)),
        Expr::String(s) => Ok(Value::String(s.clone())),
        Expr::Identifier(name) => env.resolve(name).ok_or_else(|| {
            FrontendError::new(ErrorKind::UndefinedIdentifier(format!(
                "undefined identifier {name:?}"
            )))
        }),
        Expr::Unary(op, operand) => eval_unary(*op, evaluate(operand, env)?),
        Expr::Binary(op, lhs, rhs) => {
            let left = evaluate(lhs, env)?;
            let right = evaluate(rhs, env)?;
            eval_binary(*op, left, right)
        }
    }
}

fn invalid_operand(message: impl Into<String>) -> FrontendError {
    FrontendError::new(ErrorKind::InvalidOperand(message.into()))
}

fn eval_unary(op: UnaryOp, value: Value) -> Result<Value, FrontendError> {
    match (op, value) {
        (UnaryOp::Plus, Value::Rational(r)) => Ok(Value::Rational(r)),
        (UnaryOp::Minus, Value::Rational(r)) => Ok(Value::Rational(-r)),
        (UnaryOp::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
        (op, v) => Err(invalid_operand(format!(
            "unary operator {op:?} is not defined for a {} operand",
            v.type_name()
        ))),
    }
}

fn eval_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, FrontendError> {
    // Elementwise expansion: `(set, any)` or `(any, set)` except when both
    // sides are sets, which is handled by the native set rules below.
    match (&left, &right) {
        (Value::Set(set), other) if !matches!(other, Value::Set(_)) => {
            return elementwise(op, set, other.clone(), true);
        }
        (other, Value::Set(set)) if !matches!(other, Value::Set(_)) => {
            return elementwise(op, set, other.clone(), false);
        }
        _ => {}
    }

    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::IntDiv | BinaryOp::Mod | BinaryOp::Pow => {
            arithmetic(op, left, right)
        }
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
            comparison(op, left, right)
        }
        BinaryOp::BitOr | BinaryOp::BitAnd | BinaryOp::BitXor => bitwise(op, left, right),
        BinaryOp::And | BinaryOp::Or => logical(op, left, right),
    }
}

fn elementwise(op: BinaryOp, set: &ValueSet, other: Value, set_is_left: bool) -> Result<Value, FrontendError> {
    let mut out = std::collections::BTreeSet::new();
    for element in set.iter() {
        let result = if set_is_left {
            eval_binary(op, element.clone(), other.clone())?
        } else {
            eval_binary(op, other.clone(), element.clone())?
        };
        out.insert(result);
    }
    Ok(Value::Set(ValueSet(out)))
}

fn arithmetic(op: BinaryOp, left: Value, right: Value) -> Result<Value, FrontendError> {
    if let (Value::String(a), Value::String(b)) = (&left, &right) {
        if op == BinaryOp::Add {
            return Ok(Value::String(format!("{a}{b}")));
        }
        return Err(invalid_operand("strings support only the '+' operator"));
    }
    let (a, b) = as_rational_pair(op, left, right)?;
    match op {
        BinaryOp::Add => Ok(Value::Rational(a + b)),
        BinaryOp::Sub => Ok(Value::Rational(a - b)),
        BinaryOp::Mul => Ok(Value::Rational(a * b)),
        BinaryOp::Div => {
            if b.is_zero() {
                return Err(invalid_operand("division by zero"));
            }
            Ok(Value::Rational(a / b))
        }
        BinaryOp::IntDiv => {
            if b.is_zero() {
                return Err(invalid_operand("division by zero"));
            }
            Ok(Value::Rational(BigRational::from_integer(floor_div(&a, &b))))
        }
        BinaryOp::Mod => {
            if b.is_zero() {
                return Err(invalid_operand("division by zero"));
            }
            let quotient = floor_div(&a, &b);
            Ok(Value::Rational(a - b * BigRational::from_integer(quotient)))
        }
        BinaryOp::Pow => Ok(Value::Rational(rational_pow(a, b)?)),
        _ => unreachable!("arithmetic() only handles arithmetic operators"),
    }
}

fn as_rational_pair(op: BinaryOp, left: Value, right: Value) -> Result<(BigRational, BigRational), FrontendError> {
    match (left, right) {
        (Value::Rational(a), Value::Rational(b)) => Ok((a, b)),
        (l, r) => Err(invalid_operand(format!(
            "operator {op:?} is not defined for ({}, {})",
            l.type_name(),
            r.type_name()
        ))),
    }
}

fn floor_div(a: &BigRational, b: &BigRational) -> BigInt {
    let q = a / b;
    let trunc = q.trunc().to_integer();
    if q.is_negative() && !q.is_integer() {
        trunc - BigInt::one()
    } else {
        trunc
    }
}

fn rational_pow(base: BigRational, exponent: BigRational) -> Result<BigRational, FrontendError> {
    if !exponent.is_integer() {
        return Err(invalid_operand("'**' requires an integer exponent"));
    }
    let exp = exponent.to_integer();
    if exp.is_negative() {
        if base.is_zero() {
            return Err(invalid_operand("division by zero"));
        }
        let positive = pow_nonnegative(base, -exp);
        Ok(positive.recip())
    } else {
        Ok(pow_nonnegative(base, exp))
    }
}

fn pow_nonnegative(base: BigRational, exponent: BigInt) -> BigRational {
    let mut result = BigRational::one();
    let mut remaining = exponent;
    let mut acc = base;
    while remaining.is_positive() {
        if (&remaining % 2) == BigInt::one() {
            result *= &acc;
        }
        acc = &acc * &acc;
        remaining /= 2;
    }
    result
}

fn comparison(op: BinaryOp, left: Value, right: Value) -> Result<Value, FrontendError> {
    match (left, right) {
        (Value::Rational(a), Value::Rational(b)) => Ok(Value::Boolean(match op {
            BinaryOp::Eq => a == b,
            BinaryOp::Ne => a != b,
            BinaryOp::Lt => a < b,
            BinaryOp::Gt => a > b,
            BinaryOp::Le => a <= b,
            BinaryOp::Ge => a >= b,
            _ => unreachable!(),
        })),
        (Value::Boolean(a), Value::Boolean(b)) => eq_ne_only(op, a == b),
        (Value::String(a), Value::String(b)) => eq_ne_only(op, a == b),
        (Value::Set(a), Value::Set(b)) => Ok(Value::Boolean(match op {
            BinaryOp::Eq => a == b,
            BinaryOp::Ne => a != b,
            BinaryOp::Le => a.0.is_subset(&b.0),
            BinaryOp::Ge => a.0.is_superset(&b.0),
            BinaryOp::Lt => a.0.is_subset(&b.0) && a != b,
            BinaryOp::Gt => a.0.is_superset(&b.0) && a != b,
            _ => unreachable!(),
        })),
        (l, r) => Err(invalid_operand(format!(
            "operator {op:?} is not defined for ({}, {})",
            l.type_name(),
            r.type_name()
        ))),
    }
}

fn eq_ne_only(op: BinaryOp, equal: bool) -> Result<Value, FrontendError> {
    match op {
        BinaryOp::Eq => Ok(Value::Boolean(equal)),
        BinaryOp::Ne => Ok(Value::Boolean(!equal)),
        _ => Err(invalid_operand("only '==' and '!=' are defined for this operand pair")),
    }
}

fn bitwise(op: BinaryOp, left: Value, right: Value) -> Result<Value, FrontendError> {
    match (left, right) {
        (Value::Rational(a), Value::Rational(b)) => {
            if !a.is_integer() || !b.is_integer() {
                return Err(invalid_operand(
                    "bitwise operators require integer (denominator 1) operands",
                ));
            }
            let (a, b) = (a.to_integer(), b.to_integer());
            let result = match op {
                BinaryOp::BitOr => a | b,
                BinaryOp::BitAnd => a & b,
                BinaryOp::BitXor => a ^ b,
                _ => unreachable!(),
            };
            Ok(Value::Rational(BigRational::from_integer(result)))
        }
        (Value::Set(a), Value::Set(b)) => {
            let result = match op {
                BinaryOp::BitOr => a.0.union(&b.0).cloned().collect(),
                BinaryOp::BitAnd => a.0.intersection(&b.0).cloned().collect(),
                BinaryOp::BitXor => a.0.symmetric_difference(&b.0).cloned().collect(),
                _ => unreachable!(),
            };
            Ok(Value::Set(ValueSet(result)))
        }
        (l, r) => Err(invalid_operand(format!(
            "operator {op:?} is not defined for ({}, {})",
            l.type_name(),
            r.type_name()
        ))),
    }
}

fn logical(op: BinaryOp, left: Value, right: Value) -> Result<Value, FrontendError> {
    match (left, right) {
        (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(match op {
            BinaryOp::And => a && b,
            BinaryOp::Or => a || b,
            _ => unreachable!(),
        })),
        (l, r) => Err(invalid_operand(format!(
            "operator {op:?} is not defined for ({}, {})",
            l.type_name(),
            r.type_name()
        ))),
    }
}
